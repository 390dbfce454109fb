//! Streaming lzip decompressor: a ring-buffered range decoder drives the
//! LZ member decoder; the orchestrator discovers member headers, verifies
//! trailers, and can re-sync to the next member after corruption.

mod decoder;
mod decompressor;
mod errors;
mod range_decoder;
mod window;

pub use decompressor::Decompressor;
pub use errors::Error;
pub use rlzip_format::ErrorKind;

pub(crate) mod prelude {
    pub use crate::errors::Error;
    pub use rlzip_model::{
        len_state, lit_state, pos_state, BitModel, LenModel, State, DIS_ALIGN_BITS,
        DIS_ALIGN_SIZE, DIS_SLOT_BITS, END_DIS_MODEL, LEN_LOW_SYMBOLS,
        LEN_MID_SYMBOLS, LEN_STATES, MAX_MATCH_LEN, MIN_MATCH_LEN,
        MODELED_DISTANCES, POS_STATES, START_DIS_MODEL, STATES,
    };
}
