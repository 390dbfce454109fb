#![allow(dead_code)]

use rlzip_compress::Compressor;
use rlzip_decompress::{Decompressor, Error};
use rlzip_format::Level;

/// The classic 445-byte Latin paragraph.
pub const LOREM: &[u8] = b"Lorem ipsum dolor sit amet, consectetur adipiscing \
elit, sed do eiusmod tempor incididunt ut labore et dolore magna aliqua. Ut \
enim ad minim veniam, quis nostrud exercitation ullamco laboris nisi ut \
aliquip ex ea commodo consequat. Duis aute irure dolor in reprehenderit in \
voluptate velit esse cillum dolore eu fugiat nulla pariatur. Excepteur sint \
occaecat cupidatat non proident, sunt in culpa qui officia deserunt mollit \
anim id est laborum.";

/// Deterministic xorshift64* byte stream.
pub fn random_bytes(seed: u64, len: usize) -> Vec<u8> {
    let mut state = seed | 1;
    let mut out = Vec::with_capacity(len);
    while out.len() < len {
        state ^= state >> 12;
        state ^= state << 25;
        state ^= state >> 27;
        let word = state.wrapping_mul(0x2545_F491_4F6C_DD1D);
        out.extend_from_slice(&word.to_le_bytes());
    }
    out.truncate(len);
    out
}

/// Feeds `data` through `c` in `chunks`-sized writes, finishing at the end,
/// and returns the whole compressed stream.
pub fn compress_chunked(c: &mut Compressor, data: &[u8], chunk_sizes: &[usize]) -> Vec<u8> {
    let mut out = Vec::new();
    let mut outbuf = vec![0u8; 64 * 1024];
    let mut fed = 0;
    let mut chunks = chunk_sizes.iter().copied();
    while fed < data.len() {
        let chunk = chunks.next().unwrap_or(data.len() - fed).min(data.len() - fed);
        let mut chunk_fed = 0;
        while chunk_fed < chunk {
            chunk_fed += c.write(&data[fed + chunk_fed..fed + chunk]).unwrap();
            drain_into(c, &mut outbuf, &mut out);
        }
        fed += chunk;
    }
    c.finish().unwrap();
    drain_into(c, &mut outbuf, &mut out);
    assert!(c.member_finished());
    out
}

pub fn drain_into(c: &mut Compressor, outbuf: &mut [u8], out: &mut Vec<u8>) {
    loop {
        let n = c.read(outbuf).unwrap();
        if n == 0 {
            break;
        }
        out.extend_from_slice(&outbuf[..n]);
    }
}

pub fn compress(data: &[u8], level: u8) -> Vec<u8> {
    let mut c = Compressor::from_level(Level::new(level).unwrap(), u64::MAX).unwrap();
    compress_chunked(&mut c, data, &[])
}

/// Feeds the compressed `chunks` in order and finishes, returning the
/// decompressed bytes or the first error (already-decoded bytes are still
/// drained before an error surfaces, but discarded here).
pub fn decompress_chunks(chunks: &[&[u8]]) -> Result<Vec<u8>, Error> {
    let mut d = Decompressor::new();
    let mut out = Vec::new();
    let mut outbuf = vec![0u8; 64 * 1024];
    for chunk in chunks {
        let mut fed = 0;
        while fed < chunk.len() {
            fed += d.write(&chunk[fed..])?;
            loop {
                let n = d.read(&mut outbuf)?;
                if n == 0 {
                    break;
                }
                out.extend_from_slice(&outbuf[..n]);
            }
        }
    }
    d.finish()?;
    loop {
        let n = d.read(&mut outbuf)?;
        if n == 0 {
            break;
        }
        out.extend_from_slice(&outbuf[..n]);
    }
    assert!(d.finished());
    Ok(out)
}

pub fn decompress(stream: &[u8]) -> Result<Vec<u8>, Error> {
    decompress_chunks(&[stream])
}
