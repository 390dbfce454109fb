use crate::{MAX_DICTIONARY_SIZE, MIN_DICTIONARY_SIZE};

/// Coarse classification of every error the streaming handles can latch,
/// mirroring the container's documented taxonomy. The rich per-crate error
/// enums each map onto one of these kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Invalid parameters or misuse of a handle.
    BadArgument,
    /// Allocation failure. Unused on this allocator (allocation aborts),
    /// kept so the taxonomy round-trips through bindings.
    MemError,
    /// Operation invalid in the handle's current state.
    SequenceError,
    /// Invalid magic, unsupported version, or invalid dictionary-size field
    /// at member start.
    HeaderError,
    /// Stream ended mid-member.
    UnexpectedEof,
    /// Trailer mismatch, out-of-range distance, invalid marker usage, or a
    /// corrupted member discovered mid-stream.
    DataError,
    /// Internal invariant failure; fatal for the handle.
    LibraryError,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let msg = match self {
            Self::BadArgument => "bad argument",
            Self::MemError => "not enough memory",
            Self::SequenceError => "sequence error",
            Self::HeaderError => "header error",
            Self::UnexpectedEof => "unexpected end of input",
            Self::DataError => "data error",
            Self::LibraryError => "library error",
        };
        f.write_str(msg)
    }
}

#[derive(Debug, Clone, thiserror::Error, miette::Diagnostic)]
pub enum Error {
    #[error(
        "Dictionary size {0} is out of range [{MIN_DICTIONARY_SIZE}, {MAX_DICTIONARY_SIZE}]"
    )]
    #[diagnostic(
        code(rlzip::format::dictionary_size_out_of_range),
        help("Valid dictionary sizes span 4 KiB through 512 MiB.")
    )]
    DictionarySizeOutOfRange(u32),

    #[error("Compression level {0} is not in 0..=9")]
    #[diagnostic(
        code(rlzip::format::invalid_level),
        help("The documented presets are levels 0 (fastest) through 9 (best).")
    )]
    InvalidLevel(u8),
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::DictionarySizeOutOfRange(_) | Self::InvalidLevel(_) => {
                ErrorKind::BadArgument
            }
        }
    }
}
