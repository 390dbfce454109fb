use crate::match_finder::MatchFinder;
use crate::prelude::*;
use crate::range_encoder::RangeEncoder;
use crate::{MAX_MARKER_SIZE, MAX_MEMBER_SIZE, NUM_REP_DISTANCES};
use rlzip_format::{Crc32, Trailer, MIN_DICTIONARY_SIZE};
use rlzip_model::{distance_slot, DIS_SLOT_BITS, POS_STATES};

/// Model set, CRC and framing logic shared by both encoder bodies.
pub(crate) struct EncoderBase {
    pub mb: MatchFinder,
    pub renc: RangeEncoder,
    pub member_size_limit: u64,
    pub crc: Crc32,

    pub bm_literal: [[BitModel; 0x300]; 1 << 3],
    pub bm_match: [[BitModel; POS_STATES]; STATES],
    pub bm_rep: [BitModel; STATES],
    pub bm_rep0: [BitModel; STATES],
    pub bm_rep1: [BitModel; STATES],
    pub bm_rep2: [BitModel; STATES],
    pub bm_len: [[BitModel; POS_STATES]; STATES],
    pub bm_dis_slot: [[BitModel; 1 << DIS_SLOT_BITS]; LEN_STATES],
    pub bm_dis: [BitModel; (MODELED_DISTANCES - END_DIS_MODEL + 1) as usize],
    pub bm_align: [BitModel; DIS_ALIGN_SIZE],
    pub match_len_model: LenModel,
    pub rep_len_model: LenModel,

    pub reps: [u32; NUM_REP_DISTANCES],
    pub state: State,
    pub member_finished: bool,
}

impl EncoderBase {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        before_size: usize,
        dictionary_size: usize,
        after_size: usize,
        dict_factor: usize,
        num_prev_positions23: usize,
        pos_array_factor: usize,
        min_free_bytes: usize,
        member_size: u64,
    ) -> Result<Self, Error> {
        let mb = MatchFinder::new(
            before_size,
            dictionary_size,
            after_size,
            dict_factor,
            num_prev_positions23,
            pos_array_factor,
        );
        let renc = RangeEncoder::new(mb.dictionary_size as u32, min_free_bytes)
            .map_err(|_| Error::InvalidDictionarySize(dictionary_size as u32))?;
        let mut eb = Self {
            mb,
            renc,
            member_size_limit: 0,
            crc: Crc32::new(),
            bm_literal: [[BitModel::new(); 0x300]; 1 << 3],
            bm_match: [[BitModel::new(); POS_STATES]; STATES],
            bm_rep: [BitModel::new(); STATES],
            bm_rep0: [BitModel::new(); STATES],
            bm_rep1: [BitModel::new(); STATES],
            bm_rep2: [BitModel::new(); STATES],
            bm_len: [[BitModel::new(); POS_STATES]; STATES],
            bm_dis_slot: [[BitModel::new(); 1 << DIS_SLOT_BITS]; LEN_STATES],
            bm_dis: [BitModel::new(); (MODELED_DISTANCES - END_DIS_MODEL + 1) as usize],
            bm_align: [BitModel::new(); DIS_ALIGN_SIZE],
            match_len_model: LenModel::new(),
            rep_len_model: LenModel::new(),
            reps: [0; NUM_REP_DISTANCES],
            state: State::new(),
            member_finished: false,
        };
        eb.reset(member_size);
        Ok(eb)
    }

    /// Reinitializes every model and stages a fresh member header.
    pub fn reset(&mut self, member_size: u64) {
        self.mb.reset();
        self.member_size_limit = member_size
            .max(u64::from(MIN_DICTIONARY_SIZE))
            .min(MAX_MEMBER_SIZE)
            - Trailer::SIZE as u64
            - MAX_MARKER_SIZE as u64;
        self.crc = Crc32::new();
        self.bm_literal = [[BitModel::new(); 0x300]; 1 << 3];
        self.bm_match = [[BitModel::new(); POS_STATES]; STATES];
        self.bm_rep = [BitModel::new(); STATES];
        self.bm_rep0 = [BitModel::new(); STATES];
        self.bm_rep1 = [BitModel::new(); STATES];
        self.bm_rep2 = [BitModel::new(); STATES];
        self.bm_len = [[BitModel::new(); POS_STATES]; STATES];
        self.bm_dis_slot = [[BitModel::new(); 1 << DIS_SLOT_BITS]; LEN_STATES];
        self.bm_dis =
            [BitModel::new(); (MODELED_DISTANCES - END_DIS_MODEL + 1) as usize];
        self.bm_align = [BitModel::new(); DIS_ALIGN_SIZE];
        self.match_len_model = LenModel::new();
        self.rep_len_model = LenModel::new();
        self.renc.reset(self.mb.dictionary_size as u32);
        self.reps = [0; NUM_REP_DISTANCES];
        self.state = State::new();
        self.member_finished = false;
    }

    pub fn member_finished(&self) -> bool {
        self.member_finished && self.renc.is_empty()
    }

    pub fn crc(&self) -> u32 {
        self.crc.value()
    }

    #[inline]
    pub fn price_literal(&self, prev_byte: u8, symbol: u8) -> i32 {
        price_symbol8(&self.bm_literal[lit_state(prev_byte)], u32::from(symbol))
    }

    #[inline]
    pub fn price_matched_literal(&self, prev_byte: u8, symbol: u8, match_byte: u8) -> i32 {
        price_matched(
            &self.bm_literal[lit_state(prev_byte)],
            u32::from(symbol),
            u32::from(match_byte),
        )
    }

    #[inline]
    pub fn encode_literal(&mut self, prev_byte: u8, symbol: u8) {
        self.renc.encode_tree(
            &mut self.bm_literal[lit_state(prev_byte)],
            u32::from(symbol),
            8,
        );
    }

    #[inline]
    pub fn encode_matched_literal(&mut self, prev_byte: u8, symbol: u8, match_byte: u8) {
        self.renc.encode_matched(
            &mut self.bm_literal[lit_state(prev_byte)],
            u32::from(symbol),
            u32::from(match_byte),
        );
    }

    /// Emits a (distance, length) pair: the length, the distance slot, and
    /// the slot's extra bits (modeled low bits or direct bits + align tree).
    pub fn encode_pair(&mut self, dis: u32, len: usize, pos_state: usize) {
        let dis_slot = u32::from(distance_slot(dis));
        self.renc
            .encode_len(&mut self.match_len_model, len, pos_state);
        self.renc.encode_tree(
            &mut self.bm_dis_slot[len_state(len)],
            dis_slot,
            DIS_SLOT_BITS,
        );

        if dis_slot >= START_DIS_MODEL {
            let direct_bits = (dis_slot >> 1) - 1;
            let base = (2 | (dis_slot & 1)) << direct_bits;
            let direct_dis = dis - base;

            if dis_slot < END_DIS_MODEL {
                self.renc.encode_tree_reversed(
                    &mut self.bm_dis[(base - dis_slot) as usize..],
                    direct_dis,
                    direct_bits,
                );
            } else {
                self.renc.encode(
                    direct_dis >> DIS_ALIGN_BITS,
                    direct_bits - DIS_ALIGN_BITS,
                );
                self.renc.encode_tree_reversed(
                    &mut self.bm_align,
                    direct_dis,
                    DIS_ALIGN_BITS,
                );
            }
        }
    }

    pub fn price_shortrep(&self, state: State, pos_state: usize) -> i32 {
        price0(self.bm_rep0[state.index()])
            + price0(self.bm_len[state.index()][pos_state])
    }

    pub fn price_rep(&self, rep: usize, state: State, pos_state: usize) -> i32 {
        if rep == 0 {
            return price0(self.bm_rep0[state.index()])
                + price1(self.bm_len[state.index()][pos_state]);
        }
        let mut price = price1(self.bm_rep0[state.index()]);
        if rep == 1 {
            price += price0(self.bm_rep1[state.index()]);
        } else {
            price += price1(self.bm_rep1[state.index()]);
            price += price_bit(self.bm_rep2[state.index()], rep == 3);
        }
        price
    }

    /// Closes the member if the staging buffer has room: EOS marker, coder
    /// flush, trailer.
    pub fn try_full_flush(&mut self) {
        if self.member_finished
            || self.renc.free_bytes()
                < MAX_MARKER_SIZE + self.renc.ff_count() + Trailer::SIZE
        {
            return;
        }
        self.member_finished = true;
        tracing::debug!(
            data_position = self.mb.data_position(),
            member_position = self.renc.member_position(),
            "closing member"
        );
        let pos_state = pos_state(self.mb.data_position());
        let state = self.state.index();
        self.renc
            .encode_bit(&mut self.bm_match[state][pos_state], true);
        self.renc.encode_bit(&mut self.bm_rep[state], false);
        self.encode_pair(0xFFFF_FFFF, MIN_MATCH_LEN, pos_state);
        self.renc.flush();
        let mut trailer = Trailer::new();
        trailer.set_data_crc(self.crc());
        trailer.set_data_size(self.mb.data_position());
        trailer.set_member_size(self.renc.member_position() + Trailer::SIZE as u64);
        for &b in trailer.as_bytes() {
            self.renc.put_byte(b);
        }
    }

    /// Emits sync-flush markers until the member grew enough for the
    /// decoder to re-prime its code register from fresh bytes.
    pub fn try_sync_flush(&mut self) {
        let min_size = self.renc.ff_count() + MAX_MARKER_SIZE;
        if self.member_finished || self.renc.free_bytes() < min_size + MAX_MARKER_SIZE {
            return;
        }
        self.mb.sync_flush_pending = false;
        tracing::debug!(data_position = self.mb.data_position(), "sync flush");
        let pos_state = pos_state(self.mb.data_position());
        let state = self.state.index();
        let old_mpos = self.renc.member_position();
        loop {
            self.renc
                .encode_bit(&mut self.bm_match[state][pos_state], true);
            self.renc.encode_bit(&mut self.bm_rep[state], false);
            self.encode_pair(0xFFFF_FFFF, MIN_MATCH_LEN + 1, pos_state);
            self.renc.flush();
            if self.renc.member_position() - old_mpos >= min_size as u64 {
                break;
            }
        }
    }
}
