use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use rlzip_compress::Compressor;
use rlzip_decompress::Decompressor;
use rlzip_format::Level;

fn sample_data(len: usize) -> Vec<u8> {
    let mut state = 0x0123_4567_89AB_CDEFu64;
    let mut out = Vec::with_capacity(len);
    let words = [
        "stream", "member", "range", "coder", "window", "match", "trailer",
        "dictionary", "probability", "price",
    ];
    while out.len() < len {
        state ^= state >> 12;
        state ^= state << 25;
        state ^= state >> 27;
        out.extend_from_slice(words[(state % 10) as usize].as_bytes());
        out.push(b' ');
    }
    out.truncate(len);
    out
}

fn compress_all(data: &[u8], level: Level) -> Vec<u8> {
    let mut c = Compressor::from_level(level, u64::MAX).unwrap();
    let mut out = Vec::new();
    let mut buf = vec![0u8; 64 * 1024];
    let mut fed = 0;
    while fed < data.len() {
        fed += c.write(&data[fed..]).unwrap();
        loop {
            let n = c.read(&mut buf).unwrap();
            if n == 0 {
                break;
            }
            out.extend_from_slice(&buf[..n]);
        }
    }
    c.finish().unwrap();
    loop {
        let n = c.read(&mut buf).unwrap();
        if n == 0 {
            break;
        }
        out.extend_from_slice(&buf[..n]);
    }
    out
}

fn decompress_all(stream: &[u8]) -> Vec<u8> {
    let mut d = Decompressor::new();
    let mut out = Vec::new();
    let mut buf = vec![0u8; 64 * 1024];
    let mut fed = 0;
    while fed < stream.len() {
        fed += d.write(&stream[fed..]).unwrap();
        loop {
            let n = d.read(&mut buf).unwrap();
            if n == 0 {
                break;
            }
            out.extend_from_slice(&buf[..n]);
        }
    }
    d.finish().unwrap();
    loop {
        let n = d.read(&mut buf).unwrap();
        if n == 0 {
            break;
        }
        out.extend_from_slice(&buf[..n]);
    }
    out
}

fn bench_compress(c: &mut Criterion) {
    let data = sample_data(1 << 20);
    let mut group = c.benchmark_group("compress");
    group.throughput(Throughput::Bytes(data.len() as u64));
    for level in [0u8, 1, 6] {
        group.bench_with_input(BenchmarkId::from_parameter(level), &data, |b, data| {
            let level = Level::new(level).unwrap();
            b.iter(|| compress_all(data, level));
        });
    }
    group.finish();
}

fn bench_decompress(c: &mut Criterion) {
    let data = sample_data(1 << 20);
    let mut group = c.benchmark_group("decompress");
    group.throughput(Throughput::Bytes(data.len() as u64));
    for level in [0u8, 6] {
        let stream = compress_all(&data, Level::new(level).unwrap());
        group.bench_with_input(
            BenchmarkId::from_parameter(level),
            &stream,
            |b, stream| {
                b.iter(|| decompress_all(stream));
            },
        );
    }
    group.finish();
}

criterion_group!(benches, bench_compress, bench_decompress);
criterion_main!(benches);
