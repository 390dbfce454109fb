use rlzip_format::ErrorKind;

#[derive(Debug, Clone, thiserror::Error, miette::Diagnostic)]
pub enum Error {
    #[error("Input does not begin with a member header")]
    #[diagnostic(
        code(rlzip::decompress::bad_header),
        help("The magic bytes \"LZIP\" were not found where a member must start.")
    )]
    BadHeader,

    #[error("Corrupt member header")]
    #[diagnostic(
        code(rlzip::decompress::corrupt_header),
        help(
            "The bytes at the member boundary resemble a damaged header; the \
             stream is likely corrupted rather than misaligned."
        )
    )]
    CorruptHeader,

    #[error("Unsupported member version {0}")]
    #[diagnostic(
        code(rlzip::decompress::unsupported_version),
        help("Only version 1 members can be decoded.")
    )]
    UnsupportedVersion(u8),

    #[error("Invalid dictionary size in member header")]
    #[diagnostic(
        code(rlzip::decompress::invalid_dictionary_size),
        help("The dictionary-size field decodes outside [4 KiB, 512 MiB].")
    )]
    InvalidDictionarySize,

    #[error("Input ended in the middle of a member")]
    #[diagnostic(
        code(rlzip::decompress::unexpected_eof),
        help("The stream was truncated; the final member is incomplete.")
    )]
    UnexpectedEof,

    #[error("CRC mismatch; stored {stored:08X}, computed {computed:08X}")]
    #[diagnostic(code(rlzip::decompress::crc_mismatch))]
    CrcMismatch { stored: u32, computed: u32 },

    #[error("Data size mismatch; stored {stored}, computed {computed}")]
    #[diagnostic(code(rlzip::decompress::data_size_mismatch))]
    DataSizeMismatch { stored: u64, computed: u64 },

    #[error("Member size mismatch; stored {stored}, computed {computed}")]
    #[diagnostic(code(rlzip::decompress::member_size_mismatch))]
    MemberSizeMismatch { stored: u64, computed: u64 },

    #[error("Match distance {0} is out of range")]
    #[diagnostic(
        code(rlzip::decompress::distance_out_of_range),
        help("A match referenced data before the window start; the member is corrupt.")
    )]
    DistanceOutOfRange(u32),

    #[error("Unsupported marker code {0}")]
    #[diagnostic(
        code(rlzip::decompress::unknown_marker),
        help("Only the end-of-stream and sync-flush markers are defined.")
    )]
    UnknownMarker(usize),

    #[error("Decompressor invariant failure: {0}")]
    #[diagnostic(code(rlzip::decompress::internal))]
    Internal(&'static str),
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::BadHeader
            | Self::UnsupportedVersion(_)
            | Self::InvalidDictionarySize => ErrorKind::HeaderError,
            Self::UnexpectedEof => ErrorKind::UnexpectedEof,
            Self::CorruptHeader
            | Self::CrcMismatch { .. }
            | Self::DataSizeMismatch { .. }
            | Self::MemberSizeMismatch { .. }
            | Self::DistanceOutOfRange(_)
            | Self::UnknownMarker(_) => ErrorKind::DataError,
            Self::Internal(_) => ErrorKind::LibraryError,
        }
    }
}
