mod common;

use common::*;
use proptest::prelude::*;
use rlzip_compress::Compressor;
use rlzip_decompress::{Decompressor, Error, ErrorKind};
use rlzip_format::{crc32, Level, MAGIC};

#[test]
fn test_lorem_is_the_canonical_paragraph() {
    assert_eq!(LOREM.len(), 445);
    assert!(LOREM.starts_with(b"Lorem ipsum"));
    assert!(LOREM.ends_with(b"laborum."));
}

#[test]
fn test_lorem_level0_roundtrip() {
    let stream = compress(LOREM, 0);
    assert_eq!(&stream[..4], &MAGIC);
    assert_eq!(decompress(&stream).unwrap(), LOREM);
}

#[test]
fn test_lorem_roundtrip_every_level() {
    for level in 0..=9 {
        let stream = compress(LOREM, level);
        assert_eq!(&stream[..4], &MAGIC, "level {level}");
        assert_eq!(decompress(&stream).unwrap(), LOREM, "level {level}");
    }
}

#[test]
fn test_lorem_written_in_four_chunks() {
    let mut c = Compressor::from_level(Level::new(0).unwrap(), u64::MAX).unwrap();
    let stream = compress_chunked(&mut c, LOREM, &[130, 110, 105, 100]);
    assert_eq!(decompress(&stream).unwrap(), LOREM);
}

#[test]
fn test_compressed_stream_fed_in_slices() {
    let stream = compress(LOREM, 0);
    let cuts = [20usize, 40, 60, 100, stream.len()];
    let mut chunks: Vec<&[u8]> = Vec::new();
    let mut start = 0;
    for &cut in &cuts {
        let cut = cut.min(stream.len());
        chunks.push(&stream[start..cut]);
        start = cut;
    }
    assert_eq!(decompress_chunks(&chunks).unwrap(), LOREM);
}

#[test]
fn test_compressed_stream_fed_byte_by_byte() {
    let stream = compress(LOREM, 1);
    let chunks: Vec<&[u8]> = stream.chunks(1).collect();
    assert_eq!(decompress_chunks(&chunks).unwrap(), LOREM);
}

#[test]
fn test_empty_input_roundtrip() {
    for level in [0u8, 1, 6] {
        let stream = compress(b"", level);
        assert_eq!(&stream[..4], &MAGIC);
        assert_eq!(decompress(&stream).unwrap(), b"");
    }
}

#[test]
fn test_single_byte_roundtrip() {
    for level in [0u8, 1, 9] {
        let stream = compress(b"x", level);
        assert_eq!(decompress(&stream).unwrap(), b"x");
    }
}

#[test]
fn test_input_of_exactly_one_dictionary() {
    // 4 KiB dictionary, 4 KiB of patterned input.
    let data: Vec<u8> = (0..4096u32)
        .map(|i| (i % 97) as u8 ^ (i / 251) as u8)
        .collect();
    let mut c = Compressor::new(1 << 12, 36, u64::MAX).unwrap();
    let stream = compress_chunked(&mut c, &data, &[]);
    assert_eq!(decompress(&stream).unwrap(), data);
}

#[test]
fn test_repetitive_text_roundtrip_deep_levels() {
    let mut data = Vec::new();
    for i in 0..200u32 {
        data.extend_from_slice(LOREM);
        data.extend_from_slice(i.to_string().as_bytes());
    }
    for level in [1u8, 5, 9] {
        let stream = compress(&data, level);
        assert!(
            stream.len() * 10 < data.len(),
            "repetitive text should compress well at level {level}"
        );
        assert_eq!(decompress(&stream).unwrap(), data, "level {level}");
    }
}

#[test]
fn test_random_10mib_level0_roundtrip() {
    let data = random_bytes(0x1234_5678, 10 << 20);
    let stream = compress(&data, 0);
    assert_eq!(decompress(&stream).unwrap(), data);
}

#[test]
fn test_random_10mib_level6_roundtrip_and_expansion_bound() {
    let data = random_bytes(0x9E37_79B9, 10 << 20);
    let stream = compress(&data, 6);
    // Incompressible input must not expand by more than 10%.
    assert!(stream.len() as u64 <= data.len() as u64 * 11 / 10);
    assert_eq!(decompress(&stream).unwrap(), data);
}

#[test]
fn test_trailer_fields_match_content() {
    let stream = compress(LOREM, 3);
    let trailer = &stream[stream.len() - 20..];
    let crc = u32::from_le_bytes(trailer[0..4].try_into().unwrap());
    let data_size = u64::from_le_bytes(trailer[4..12].try_into().unwrap());
    let member_size = u64::from_le_bytes(trailer[12..20].try_into().unwrap());
    assert_eq!(crc, crc32(LOREM));
    assert_eq!(data_size, LOREM.len() as u64);
    assert_eq!(member_size, stream.len() as u64);
}

#[test]
fn test_concatenated_streams_decompress_to_concatenation() {
    let a = compress(LOREM, 2);
    let b = compress(b"and now for something completely different", 4);
    let mut joined = a.clone();
    joined.extend_from_slice(&b);
    let mut expected = LOREM.to_vec();
    expected.extend_from_slice(b"and now for something completely different");
    assert_eq!(decompress(&joined).unwrap(), expected);
}

#[test]
fn test_decoder_member_queries() {
    let stream = compress(LOREM, 1);
    let mut d = Decompressor::new();
    let mut out = Vec::new();
    let mut buf = [0u8; 4096];
    d.write(&stream).unwrap();
    d.finish().unwrap();
    loop {
        let n = d.read(&mut buf).unwrap();
        if n == 0 {
            break;
        }
        out.extend_from_slice(&buf[..n]);
    }
    assert!(d.finished());
    assert_eq!(out, LOREM);
    assert_eq!(d.member_version(), 1);
    // Nothing was encoded before finish(), so the member advertises the
    // minimum dictionary rather than the level-1 preset.
    assert_eq!(d.dictionary_size(), 1 << 12);
    assert_eq!(d.data_crc(), crc32(LOREM));
    assert_eq!(d.total_in_size(), stream.len() as u64);
    assert_eq!(d.total_out_size(), LOREM.len() as u64);
}

#[test]
fn test_sync_flush_makes_written_data_decodable() {
    let part_a = b"first half, available before the stream ends;";
    let part_b = b" second half arrives later.";
    let mut c = Compressor::new(1 << 16, 36, u64::MAX).unwrap();
    let mut stream = Vec::new();
    let mut outbuf = vec![0u8; 64 * 1024];

    assert_eq!(c.write(part_a).unwrap(), part_a.len());
    c.sync_flush().unwrap();
    drain_into(&mut c, &mut outbuf, &mut stream);

    // Everything written so far must decode without finishing the member.
    let mut d = Decompressor::new();
    let mut out = Vec::new();
    let mut buf = [0u8; 4096];
    d.write(&stream).unwrap();
    loop {
        let n = d.read(&mut buf).unwrap();
        if n == 0 {
            break;
        }
        out.extend_from_slice(&buf[..n]);
    }
    assert_eq!(out, part_a);
    assert!(!d.member_finished());

    assert_eq!(c.write(part_b).unwrap(), part_b.len());
    c.finish().unwrap();
    let tail_start = stream.len();
    drain_into(&mut c, &mut outbuf, &mut stream);

    d.write(&stream[tail_start..]).unwrap();
    d.finish().unwrap();
    loop {
        let n = d.read(&mut buf).unwrap();
        if n == 0 {
            break;
        }
        out.extend_from_slice(&buf[..n]);
    }
    assert!(d.finished());
    let mut expected = part_a.to_vec();
    expected.extend_from_slice(part_b);
    assert_eq!(out, expected);
}

#[test]
fn test_member_size_limit_splits_members() {
    const LIMIT: u64 = 100_000;
    let data = random_bytes(42, 300 << 10);
    let mut c = Compressor::new(1 << 16, 12, LIMIT).unwrap();
    let mut stream = Vec::new();
    let mut outbuf = vec![0u8; 64 * 1024];
    let mut fed = 0;
    let mut finish_requested = false;
    loop {
        drain_into(&mut c, &mut outbuf, &mut stream);
        if c.finished() {
            break;
        }
        if c.member_finished() {
            c.restart_member(LIMIT).unwrap();
            if finish_requested {
                c.finish().unwrap();
            }
            continue;
        }
        if fed < data.len() {
            fed += c.write(&data[fed..]).unwrap();
        } else if !finish_requested {
            c.finish().unwrap();
            finish_requested = true;
        }
    }
    // Random data cannot fit in one size-capped member.
    assert!(stream.len() as u64 > LIMIT);
    assert_eq!(decompress(&stream).unwrap(), data);
}

#[test]
fn test_truncated_stream_reports_unexpected_eof() {
    let data = random_bytes(7, 1 << 20);
    let stream = compress(&data, 1);
    assert!(stream.len() > 1 << 20);
    let truncated = &stream[..stream.len() - 5];
    let err = decompress(truncated).unwrap_err();
    assert!(matches!(err, Error::UnexpectedEof));
    assert_eq!(err.kind(), ErrorKind::UnexpectedEof);
}

#[test]
fn test_truncated_by_one_trailer_byte() {
    let stream = compress(LOREM, 0);
    let err = decompress(&stream[..stream.len() - 1]).unwrap_err();
    assert!(matches!(err, Error::UnexpectedEof));
}

#[test]
fn test_bit_flip_in_payload_is_a_data_error() {
    let data = random_bytes(99, 1 << 20);
    let mut stream = compress(&data, 1);
    // Flip one bit a quarter of the way in, well past the header.
    let target = stream.len() / 4;
    stream[target] ^= 0x10;
    let err = decompress(&stream).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::DataError);
}

#[test]
fn test_corrupted_trailer_crc_is_a_data_error() {
    let mut stream = compress(LOREM, 2);
    let crc_offset = stream.len() - 20;
    stream[crc_offset] ^= 0xFF;
    let err = decompress(&stream).unwrap_err();
    assert!(matches!(err, Error::CrcMismatch { .. }));
    assert_eq!(err.kind(), ErrorKind::DataError);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn test_fuzz_small_roundtrips(
        data in proptest::collection::vec(any::<u8>(), 0..2048),
        level in 0u8..=2,
    ) {
        let stream = compress(&data, level);
        prop_assert_eq!(decompress(&stream).unwrap(), data);
    }
}

#[test]
fn test_error_still_drains_decoded_bytes() {
    let mut stream = compress(LOREM, 1);
    let crc_offset = stream.len() - 20;
    stream[crc_offset] ^= 0x01;
    let mut d = Decompressor::new();
    d.write(&stream).unwrap();
    d.finish().unwrap();
    let mut out = Vec::new();
    let mut buf = [0u8; 4096];
    let err = loop {
        match d.read(&mut buf) {
            Ok(0) => panic!("expected the CRC mismatch to surface"),
            Ok(n) => out.extend_from_slice(&buf[..n]),
            Err(err) => break err,
        }
    };
    // The member's data decoded fine; only the trailer check failed.
    assert_eq!(out, LOREM);
    assert_eq!(err.kind(), ErrorKind::DataError);
}
