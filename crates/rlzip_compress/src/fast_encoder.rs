use crate::encoder_base::EncoderBase;
use crate::prelude::*;
use crate::{MAX_MARKER_SIZE, NUM_REP_DISTANCES};

/// Greedy single-hash encoder used for level 0: one chain walk per
/// position, rep extensions checked against the best hash match, literals
/// otherwise.
pub(crate) struct FastEncoder {
    pub eb: EncoderBase,
    key4: u32,
}

const FAST_DICTIONARY_SIZE: usize = 65536;
const LEN_LIMIT: usize = 16;

impl FastEncoder {
    pub fn new(member_size: u64) -> Result<Self, Error> {
        let eb = EncoderBase::new(
            0,
            FAST_DICTIONARY_SIZE,
            MAX_MATCH_LEN,
            16,
            0,
            1,
            MAX_MARKER_SIZE,
            member_size,
        )?;
        Ok(Self { eb, key4: 0 })
    }

    pub fn reset(&mut self, member_size: u64) {
        self.eb.reset(member_size);
    }

    fn reset_key4(&mut self) {
        self.key4 = 0;
        for i in 0..3.min(self.eb.mb.available_bytes()) {
            self.key4 = (self.key4 << 4) ^ u32::from(self.eb.mb.buffer[i]);
        }
    }

    /// Inserts the next `n` positions into the hash chain without searching.
    fn update_and_move(&mut self, n: usize) -> bool {
        let mb = &mut self.eb.mb;
        for _ in 0..n {
            if mb.available_bytes() >= 4 {
                self.key4 = ((self.key4 << 4)
                    ^ u32::from(mb.buffer[mb.pos + 3]))
                    & mb.key4_mask;
                let head = mb.prev_position(self.key4 as usize);
                mb.set_link(mb.cyclic_pos, head);
                mb.set_prev_position(self.key4 as usize, mb.pos as i32 + 1);
            } else {
                mb.set_link(mb.cyclic_pos, 0);
            }
            if !mb.move_pos() {
                return false;
            }
        }
        true
    }

    /// One chain lookup bounded to 4 steps; returns the best length found
    /// and its wire distance.
    fn longest_match_len(&mut self, distance: &mut i32) -> usize {
        let mb = &mut self.eb.mb;
        let mut idx0 = mb.cyclic_pos;
        let pos1 = mb.pos as i32 + 1;
        let mut maxlen = 0usize;
        let available = mb.available_bytes().min(MAX_MATCH_LEN);
        if available < LEN_LIMIT {
            mb.set_link(idx0, 0);
            return 0;
        }

        self.key4 =
            ((self.key4 << 4) ^ u32::from(mb.buffer[mb.pos + 3])) & mb.key4_mask;
        let mut newpos1 = mb.prev_position(self.key4 as usize);
        mb.set_prev_position(self.key4 as usize, pos1);

        let mut count = 4;
        loop {
            count -= 1;
            if newpos1 <= 0 || count < 0 {
                mb.set_link(idx0, 0);
                break;
            }
            let delta = (pos1 - newpos1) as usize;
            if delta > mb.dictionary_size {
                mb.set_link(idx0, 0);
                break;
            }
            let new_idx = (mb.cyclic_pos
                + if mb.cyclic_pos >= delta {
                    0
                } else {
                    mb.dictionary_size + 1
                })
                - delta;

            if mb.buffer[mb.pos + maxlen - delta] == mb.buffer[mb.pos + maxlen] {
                let mut len = 0;
                while len < available
                    && mb.buffer[mb.pos + len - delta] == mb.buffer[mb.pos + len]
                {
                    len += 1;
                }
                if maxlen < len {
                    maxlen = len;
                    *distance = delta as i32 - 1;
                    if maxlen >= LEN_LIMIT {
                        let link = mb.link(new_idx);
                        mb.set_link(idx0, link);
                        break;
                    }
                }
            }

            mb.set_link(idx0, newpos1);
            idx0 = new_idx;
            newpos1 = mb.link(idx0);
        }
        maxlen
    }

    pub fn encode_member(&mut self) -> Result<(), Error> {
        if self.eb.member_finished {
            return Ok(());
        }
        if self.eb.renc.member_position() >= self.eb.member_size_limit {
            self.eb.try_full_flush();
            return Ok(());
        }

        if self.eb.mb.data_position() == 0 && !self.eb.mb.data_finished() {
            if !self.eb.mb.enough_available_bytes() || !self.eb.renc.enough_free_bytes()
            {
                return Ok(());
            }
            let cur_byte = self.eb.mb.peek(0);
            let st = self.eb.state.index();
            self.eb
                .renc
                .encode_bit(&mut self.eb.bm_match[st][0], false);
            self.eb.encode_literal(0, cur_byte);
            self.eb.crc.update_byte(cur_byte);
            self.reset_key4();
            if !self.update_and_move(1) {
                return Err(Error::Internal("match finder overran its stream"));
            }
        }

        let mut rep = 0usize;
        while !self.eb.mb.data_finished()
            && self.eb.renc.member_position() < self.eb.member_size_limit
        {
            if !self.eb.mb.enough_available_bytes() || !self.eb.renc.enough_free_bytes()
            {
                return Ok(());
            }
            let mut match_distance = 0i32;
            let main_len = self.longest_match_len(&mut match_distance);
            let ps = pos_state(self.eb.mb.data_position());
            let st = self.eb.state.index();

            let mut len = 0usize;
            for i in 0..NUM_REP_DISTANCES {
                let tlen = self.eb.mb.true_match_len(0, self.eb.reps[i] as usize + 1);
                if tlen > len {
                    len = tlen;
                    rep = i;
                }
            }
            if len > MIN_MATCH_LEN && len + 3 > main_len {
                // A rep extension beats the hash match.
                let start = self.eb.mb.pos;
                self.eb.crc.update(&self.eb.mb.buffer[start..start + len]);
                self.eb
                    .renc
                    .encode_bit(&mut self.eb.bm_match[st][ps], true);
                self.eb.renc.encode_bit(&mut self.eb.bm_rep[st], true);
                self.eb.renc.encode_bit(&mut self.eb.bm_rep0[st], rep != 0);
                if rep == 0 {
                    self.eb.renc.encode_bit(&mut self.eb.bm_len[st][ps], true);
                } else {
                    self.eb.renc.encode_bit(&mut self.eb.bm_rep1[st], rep > 1);
                    if rep > 1 {
                        self.eb.renc.encode_bit(&mut self.eb.bm_rep2[st], rep > 2);
                    }
                    let distance = self.eb.reps[rep];
                    for i in (1..=rep).rev() {
                        self.eb.reps[i] = self.eb.reps[i - 1];
                    }
                    self.eb.reps[0] = distance;
                }
                self.eb.state = self.eb.state.set_rep();
                self.eb
                    .renc
                    .encode_len(&mut self.eb.rep_len_model, len, ps);
                if !self.eb.mb.move_pos() || !self.update_and_move(len - 1) {
                    return Err(Error::Internal("match finder overran its stream"));
                }
                continue;
            }

            if main_len > MIN_MATCH_LEN {
                let start = self.eb.mb.pos;
                self.eb
                    .crc
                    .update(&self.eb.mb.buffer[start..start + main_len]);
                self.eb
                    .renc
                    .encode_bit(&mut self.eb.bm_match[st][ps], true);
                self.eb.renc.encode_bit(&mut self.eb.bm_rep[st], false);
                self.eb.state = self.eb.state.set_match();
                for i in (1..NUM_REP_DISTANCES).rev() {
                    self.eb.reps[i] = self.eb.reps[i - 1];
                }
                self.eb.reps[0] = match_distance as u32;
                self.eb.encode_pair(match_distance as u32, main_len, ps);
                if !self.eb.mb.move_pos() || !self.update_and_move(main_len - 1) {
                    return Err(Error::Internal("match finder overran its stream"));
                }
                continue;
            }

            let prev_byte = self.eb.mb.peek(1);
            let cur_byte = self.eb.mb.peek(0);
            let match_byte = self.eb.mb.peek(self.eb.reps[0] as usize + 1);
            if !self.eb.mb.move_pos() {
                return Err(Error::Internal("match finder overran its stream"));
            }
            self.eb.crc.update_byte(cur_byte);

            if match_byte == cur_byte {
                // The rep0 byte repeats: emit a short rep when it prices
                // below the literal.
                let short_rep_price = price1(self.eb.bm_match[st][ps])
                    + price1(self.eb.bm_rep[st])
                    + price0(self.eb.bm_rep0[st])
                    + price0(self.eb.bm_len[st][ps]);
                let mut price = price0(self.eb.bm_match[st][ps]);
                if self.eb.state.is_char() {
                    price += self.eb.price_literal(prev_byte, cur_byte);
                } else {
                    price +=
                        self.eb.price_matched_literal(prev_byte, cur_byte, match_byte);
                }
                if short_rep_price < price {
                    self.eb
                        .renc
                        .encode_bit(&mut self.eb.bm_match[st][ps], true);
                    self.eb.renc.encode_bit(&mut self.eb.bm_rep[st], true);
                    self.eb.renc.encode_bit(&mut self.eb.bm_rep0[st], false);
                    self.eb.renc.encode_bit(&mut self.eb.bm_len[st][ps], false);
                    self.eb.state = self.eb.state.set_short_rep();
                    continue;
                }
            }

            self.eb
                .renc
                .encode_bit(&mut self.eb.bm_match[st][ps], false);
            if self.eb.state.is_char() {
                self.eb.encode_literal(prev_byte, cur_byte);
            } else {
                self.eb.encode_matched_literal(prev_byte, cur_byte, match_byte);
            }
            self.eb.state = self.eb.state.set_char();
        }

        self.eb.try_full_flush();
        Ok(())
    }
}
