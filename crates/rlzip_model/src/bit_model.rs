use crate::{LEN_HIGH_SYMBOLS, LEN_LOW_SYMBOLS, LEN_MID_SYMBOLS, POS_STATES};

/// An adaptive probability cell: the 11-bit probability of the next bit
/// being 0, starting equiprobable and pulled 1/32 of the remaining distance
/// toward the observed bit on every update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BitModel {
    pub probability: u32,
}

impl BitModel {
    pub const TOTAL_BITS: u32 = 11;
    pub const TOTAL: u32 = 1 << Self::TOTAL_BITS;
    pub const MOVE_BITS: u32 = 5;

    pub const fn new() -> Self {
        Self {
            probability: Self::TOTAL / 2,
        }
    }

    /// A 0 bit was coded under this cell.
    #[inline(always)]
    pub fn update_0(&mut self) {
        self.probability += (Self::TOTAL - self.probability) >> Self::MOVE_BITS;
    }

    /// A 1 bit was coded under this cell.
    #[inline(always)]
    pub fn update_1(&mut self) {
        self.probability -= self.probability >> Self::MOVE_BITS;
    }
}

impl Default for BitModel {
    fn default() -> Self {
        Self::new()
    }
}

/// The match-length model: two choice bits selecting among a per-pos-state
/// low tree (lengths 2..=9), a per-pos-state mid tree (10..=17), and a
/// shared high tree (18..=273).
#[derive(Debug, Clone)]
pub struct LenModel {
    pub choice1: BitModel,
    pub choice2: BitModel,
    pub low: [[BitModel; LEN_LOW_SYMBOLS]; POS_STATES],
    pub mid: [[BitModel; LEN_MID_SYMBOLS]; POS_STATES],
    pub high: [BitModel; LEN_HIGH_SYMBOLS],
}

impl LenModel {
    pub fn new() -> Self {
        Self {
            choice1: BitModel::new(),
            choice2: BitModel::new(),
            low: [[BitModel::new(); LEN_LOW_SYMBOLS]; POS_STATES],
            mid: [[BitModel::new(); LEN_MID_SYMBOLS]; POS_STATES],
            high: [BitModel::new(); LEN_HIGH_SYMBOLS],
        }
    }
}

impl Default for LenModel {
    fn default() -> Self {
        Self::new()
    }
}
