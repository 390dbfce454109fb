use rlzip_format::{ErrorKind, MAX_DICTIONARY_SIZE, MIN_DICTIONARY_SIZE};
use rlzip_model::{MAX_MATCH_LEN, MIN_MATCH_LEN_LIMIT};

#[derive(Debug, Clone, thiserror::Error, miette::Diagnostic)]
pub enum Error {
    #[error(
        "Dictionary size {0} is out of range [{MIN_DICTIONARY_SIZE}, {MAX_DICTIONARY_SIZE}]"
    )]
    #[diagnostic(
        code(rlzip::compress::invalid_dictionary_size),
        help("Pick a dictionary between 4 KiB and 512 MiB, or use a preset level.")
    )]
    InvalidDictionarySize(u32),

    #[error(
        "Match length limit {0} is out of range [{MIN_MATCH_LEN_LIMIT}, {MAX_MATCH_LEN}]"
    )]
    #[diagnostic(
        code(rlzip::compress::invalid_match_len_limit),
        help("The match length limit must lie in 5..=273.")
    )]
    InvalidMatchLenLimit(usize),

    #[error("Member size limit {0} is smaller than the minimum {MIN_DICTIONARY_SIZE}")]
    #[diagnostic(
        code(rlzip::compress::invalid_member_size),
        help("A member must be allowed to grow to at least 4 KiB.")
    )]
    InvalidMemberSize(u64),

    #[error("The current member is not finished")]
    #[diagnostic(
        code(rlzip::compress::member_not_finished),
        help(
            "Call finish() and drain the output with read() before restart_member()."
        )
    )]
    MemberNotFinished,

    #[error("Compressor invariant failure: {0}")]
    #[diagnostic(code(rlzip::compress::internal))]
    Internal(&'static str),
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidDictionarySize(_)
            | Self::InvalidMatchLenLimit(_)
            | Self::InvalidMemberSize(_) => ErrorKind::BadArgument,
            Self::MemberNotFinished => ErrorKind::SequenceError,
            Self::Internal(_) => ErrorKind::LibraryError,
        }
    }
}
