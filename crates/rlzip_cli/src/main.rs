use std::{
    fs::File,
    io::{BufReader, BufWriter, Read, Write},
    process::exit,
};

use miette::{miette, IntoDiagnostic};
use rlzip_compress::Compressor;
use rlzip_decompress::Decompressor;
use rlzip_format::Level;

const USAGE: &str = "usage: rlzip [-d] [-0..-9] <input> <output>";

struct Args {
    decompress: bool,
    level: Level,
    input: String,
    output: String,
}

fn parse_args() -> Option<Args> {
    let mut decompress = false;
    let mut level = Level::default();
    let mut files = Vec::new();
    for arg in std::env::args().skip(1) {
        match arg.as_str() {
            "-d" | "--decompress" => decompress = true,
            "-h" | "--help" => return None,
            s if s.len() == 2 && s.starts_with('-') => {
                let digit = s.as_bytes()[1].wrapping_sub(b'0');
                level = Level::new(digit).ok()?;
            }
            _ => files.push(arg),
        }
    }
    let mut files = files.into_iter();
    Some(Args {
        decompress,
        level,
        input: files.next()?,
        output: files.next()?,
    })
}

fn main() -> miette::Result<()> {
    let Some(args) = parse_args() else {
        eprintln!("{USAGE}");
        exit(1);
    };

    let input = File::open(&args.input).into_diagnostic()?;
    let mut reader = BufReader::new(input);
    let output = File::create(&args.output).into_diagnostic()?;
    let mut writer = BufWriter::new(output);

    if args.decompress {
        decompress(&mut reader, &mut writer)
    } else {
        compress(args.level, &mut reader, &mut writer)
    }?;
    writer.flush().into_diagnostic()
}

fn compress(
    level: Level,
    reader: &mut impl Read,
    writer: &mut impl Write,
) -> miette::Result<()> {
    let mut encoder = Compressor::from_level(level, u64::MAX).into_diagnostic()?;
    let mut inbuf = vec![0u8; 64 * 1024];
    let mut outbuf = vec![0u8; 64 * 1024];
    loop {
        let chunk = reader.read(&mut inbuf).into_diagnostic()?;
        if chunk == 0 {
            encoder.finish().into_diagnostic()?;
        } else {
            let mut fed = 0;
            while fed < chunk {
                fed += encoder.write(&inbuf[fed..chunk]).into_diagnostic()?;
                drain(&mut encoder, &mut outbuf, writer)?;
            }
        }
        drain(&mut encoder, &mut outbuf, writer)?;
        if encoder.finished() {
            return Ok(());
        }
    }
}

fn drain(
    encoder: &mut Compressor,
    outbuf: &mut [u8],
    writer: &mut impl Write,
) -> miette::Result<()> {
    loop {
        let n = encoder.read(outbuf).into_diagnostic()?;
        if n == 0 {
            return Ok(());
        }
        writer.write_all(&outbuf[..n]).into_diagnostic()?;
    }
}

fn decompress(reader: &mut impl Read, writer: &mut impl Write) -> miette::Result<()> {
    let mut decoder = Decompressor::new();
    let mut inbuf = vec![0u8; 64 * 1024];
    let mut outbuf = vec![0u8; 64 * 1024];
    loop {
        let chunk = reader.read(&mut inbuf).into_diagnostic()?;
        if chunk == 0 {
            decoder.finish().into_diagnostic()?;
        } else {
            let mut fed = 0;
            while fed < chunk {
                fed += decoder.write(&inbuf[fed..chunk]).into_diagnostic()?;
                pump(&mut decoder, &mut outbuf, writer)?;
            }
        }
        pump(&mut decoder, &mut outbuf, writer)?;
        if decoder.finished() {
            return Ok(());
        }
        if chunk == 0 {
            return Err(miette!("input ended before the stream was complete"));
        }
    }
}

fn pump(
    decoder: &mut Decompressor,
    outbuf: &mut [u8],
    writer: &mut impl Write,
) -> miette::Result<()> {
    loop {
        let n = decoder.read(outbuf).into_diagnostic()?;
        if n == 0 {
            return Ok(());
        }
        writer.write_all(&outbuf[..n]).into_diagnostic()?;
    }
}
