use crate::encoder_base::EncoderBase;
use crate::match_finder::Pair;
use crate::prelude::*;
use crate::prices::LenPrices;
use crate::NUM_REP_DISTANCES;
use rlzip_format::{real_bits, CRC32_TABLE, MAX_DICTIONARY_BITS};
use rlzip_model::{distance_slot, DIS_SLOTS, POS_STATES};

const MAX_NUM_TRIALS: usize = 1 << 13;

const SINGLE_STEP_TRIAL: i32 = -2;
const DUAL_STEP_TRIAL: i32 = -1;

const NUM_PREV_POSITIONS2: usize = 1 << 10;
const NUM_PREV_POSITIONS3: usize = 1 << 16;

const POS_STATE_MASK_US: usize = POS_STATES - 1;

/// One cell of the optimizer's dynamic program, keyed by byte offset from
/// the position where optimization started.
///
/// `dis4` encodes the step that reaches this offset cheapest: −1 a literal,
/// 0..=3 one of the rep distances, anything above is a wire distance + 4.
/// `prev_index2` distinguishes single-step trials from the two composite
/// shapes (literal+rep0, and match/rep+literal+rep0).
///
/// After the backward pass the array is rewritten in place into emission
/// records: `price` holds the symbol length and `dis4` its distance code.
#[derive(Debug, Clone, Copy)]
struct Trial {
    state: State,
    price: i32,
    dis4: i32,
    prev_index: i32,
    prev_index2: i32,
    reps: [u32; NUM_REP_DISTANCES],
}

impl Default for Trial {
    fn default() -> Self {
        Self {
            state: State::new(),
            price: 0,
            dis4: 0,
            prev_index: 0,
            prev_index2: SINGLE_STEP_TRIAL,
            reps: [0; NUM_REP_DISTANCES],
        }
    }
}

impl Trial {
    #[inline(always)]
    fn update(&mut self, price: i32, dis4: i32, prev_index: i32) {
        if price < self.price {
            self.price = price;
            self.dis4 = dis4;
            self.prev_index = prev_index;
            self.prev_index2 = SINGLE_STEP_TRIAL;
        }
    }

    #[inline(always)]
    fn update2(&mut self, price: i32, prev_index: i32) {
        if price < self.price {
            self.price = price;
            self.dis4 = 0;
            self.prev_index = prev_index;
            self.prev_index2 = DUAL_STEP_TRIAL;
        }
    }

    #[inline(always)]
    fn update3(&mut self, price: i32, dis4: i32, prev_index: i32, prev_index2: i32) {
        if price < self.price {
            self.price = price;
            self.dis4 = dis4;
            self.prev_index = prev_index;
            self.prev_index2 = prev_index2;
        }
    }
}

fn mtf_reps(dis4: i32, reps: &mut [u32; NUM_REP_DISTANCES]) {
    if dis4 >= NUM_REP_DISTANCES as i32 {
        reps[3] = reps[2];
        reps[2] = reps[1];
        reps[1] = reps[0];
        reps[0] = (dis4 - NUM_REP_DISTANCES as i32) as u32;
    } else if dis4 > 0 {
        let distance = reps[dis4 as usize];
        for i in (1..=dis4 as usize).rev() {
            reps[i] = reps[i - 1];
        }
        reps[0] = distance;
    }
}

/// The price-optimizing encoder used for levels 1..=9.
pub(crate) struct Encoder {
    pub eb: EncoderBase,
    cycles: i32,
    match_len_limit: usize,
    match_len_prices: LenPrices,
    rep_len_prices: LenPrices,
    pending_num_pairs: usize,
    pairs: Box<[Pair; MAX_MATCH_LEN + 1]>,
    trials: Vec<Trial>,

    dis_slot_prices: [[i32; 2 * MAX_DICTIONARY_BITS as usize]; LEN_STATES],
    dis_prices: [[i32; MODELED_DISTANCES as usize]; LEN_STATES],
    align_prices: [i32; DIS_ALIGN_SIZE],
    num_dis_slots: usize,
    price_counter: i32,
    dis_price_counter: i32,
    align_price_counter: i32,
    been_flushed: bool,
}

impl Encoder {
    pub fn new(
        dictionary_size: u32,
        match_len_limit: usize,
        member_size: u64,
    ) -> Result<Self, Error> {
        let before_size = MAX_NUM_TRIALS;
        // Includes the lookahead the two-step trials may touch.
        let after_size = MAX_NUM_TRIALS + 2 * MAX_MATCH_LEN + 1;
        let eb = EncoderBase::new(
            before_size,
            dictionary_size as usize,
            after_size,
            2,
            NUM_PREV_POSITIONS2 + NUM_PREV_POSITIONS3,
            2,
            2 * MAX_NUM_TRIALS,
            member_size,
        )?;
        let num_dis_slots = 2 * real_bits(dictionary_size - 1) as usize;
        let mut trials = vec![Trial::default(); MAX_NUM_TRIALS];
        trials[1].prev_index = 0;
        trials[1].prev_index2 = SINGLE_STEP_TRIAL;
        Ok(Self {
            eb,
            cycles: if match_len_limit < MAX_MATCH_LEN {
                16 + match_len_limit as i32 / 2
            } else {
                256
            },
            match_len_limit,
            match_len_prices: LenPrices::new(match_len_limit),
            rep_len_prices: LenPrices::new(match_len_limit),
            pending_num_pairs: 0,
            pairs: Box::new([Pair::default(); MAX_MATCH_LEN + 1]),
            trials,
            dis_slot_prices: [[0; 2 * MAX_DICTIONARY_BITS as usize]; LEN_STATES],
            dis_prices: [[0; MODELED_DISTANCES as usize]; LEN_STATES],
            align_prices: [0; DIS_ALIGN_SIZE],
            num_dis_slots,
            price_counter: 0,
            dis_price_counter: 0,
            align_price_counter: 0,
            been_flushed: false,
        })
    }

    pub fn reset(&mut self, member_size: u64) {
        self.eb.reset(member_size);
        self.match_len_prices.reset();
        self.rep_len_prices.reset();
        self.pending_num_pairs = 0;
        self.price_counter = 0;
        self.dis_price_counter = 0;
        self.align_price_counter = 0;
        self.been_flushed = false;
    }

    /// Walks the binary tree behind the 4-byte hash of the current position,
    /// recording candidates of increasing length, then inserts the position.
    /// With `collect` false it only maintains the tree.
    fn get_match_pairs(&mut self, collect: bool) -> usize {
        let mut idx0 = self.eb.mb.cyclic_pos << 1;
        let mut idx1 = idx0 + 1;
        let mut len = 0usize;
        let mut len0 = 0usize;
        let mut len1 = 0usize;
        let mut maxlen = 3usize;
        let mut num_pairs = 0usize;
        let pos = self.eb.mb.pos;
        let pos1 = pos as i32 + 1;
        let min_pos: i32 = if pos > self.eb.mb.dictionary_size {
            (pos - self.eb.mb.dictionary_size) as i32
        } else {
            0
        };

        let mut len_limit = self.match_len_limit;
        if len_limit > self.eb.mb.available_bytes() {
            self.been_flushed = true;
            len_limit = self.eb.mb.available_bytes();
            if len_limit < 4 {
                self.eb.mb.set_link(idx0, 0);
                self.eb.mb.set_link(idx1, 0);
                return 0;
            }
        }

        let tmp = CRC32_TABLE[self.eb.mb.buffer[pos] as usize]
            ^ u32::from(self.eb.mb.buffer[pos + 1]);
        let key2 = (tmp & (NUM_PREV_POSITIONS2 as u32 - 1)) as usize;
        let tmp = tmp ^ (u32::from(self.eb.mb.buffer[pos + 2]) << 8);
        let key3 =
            NUM_PREV_POSITIONS2 + (tmp & (NUM_PREV_POSITIONS3 as u32 - 1)) as usize;
        let key4 = NUM_PREV_POSITIONS2
            + NUM_PREV_POSITIONS3
            + ((tmp ^ (CRC32_TABLE[self.eb.mb.buffer[pos + 3] as usize] << 5))
                & self.eb.mb.key4_mask) as usize;

        let mut collecting = collect;
        if collecting {
            let np2 = self.eb.mb.prev_position(key2);
            let np3 = self.eb.mb.prev_position(key3);
            if np2 > min_pos && self.eb.mb.buffer[np2 as usize - 1] == self.eb.mb.buffer[pos]
            {
                self.pairs[0] = Pair { dis: pos as i32 - np2, len: 2 };
                maxlen = 2;
                num_pairs = 1;
            }
            if np2 != np3
                && np3 > min_pos
                && self.eb.mb.buffer[np3 as usize - 1] == self.eb.mb.buffer[pos]
            {
                maxlen = 3;
                self.pairs[num_pairs].dis = pos as i32 - np3;
                num_pairs += 1;
            }
            if num_pairs > 0 {
                let delta = (self.pairs[num_pairs - 1].dis + 1) as usize;
                while maxlen < len_limit
                    && self.eb.mb.buffer[pos + maxlen - delta]
                        == self.eb.mb.buffer[pos + maxlen]
                {
                    maxlen += 1;
                }
                self.pairs[num_pairs - 1].len = maxlen;
                if maxlen < 3 {
                    maxlen = 3;
                }
                if maxlen >= len_limit {
                    collecting = false;
                }
            }
        }

        self.eb.mb.set_prev_position(key2, pos1);
        self.eb.mb.set_prev_position(key3, pos1);
        let mut newpos1 = self.eb.mb.prev_position(key4);
        self.eb.mb.set_prev_position(key4, pos1);

        let mut count = self.cycles;
        loop {
            count -= 1;
            if newpos1 <= min_pos || count < 0 {
                self.eb.mb.set_link(idx0, 0);
                self.eb.mb.set_link(idx1, 0);
                break;
            }

            if self.been_flushed {
                len = 0;
            }
            let delta = (pos1 - newpos1) as usize;
            let new_idx = ((self.eb.mb.cyclic_pos
                + if self.eb.mb.cyclic_pos >= delta {
                    0
                } else {
                    self.eb.mb.dictionary_size + 1
                })
                - delta)
                << 1;

            if self.eb.mb.buffer[pos + len - delta] == self.eb.mb.buffer[pos + len] {
                len += 1;
                while len < len_limit
                    && self.eb.mb.buffer[pos + len - delta] == self.eb.mb.buffer[pos + len]
                {
                    len += 1;
                }
                if collecting && maxlen < len {
                    self.pairs[num_pairs] = Pair { dis: delta as i32 - 1, len };
                    maxlen = len;
                    num_pairs += 1;
                }
                if len >= len_limit {
                    let left = self.eb.mb.link(new_idx);
                    let right = self.eb.mb.link(new_idx + 1);
                    self.eb.mb.set_link(idx0, left);
                    self.eb.mb.set_link(idx1, right);
                    break;
                }
            }
            if self.eb.mb.buffer[pos + len - delta] < self.eb.mb.buffer[pos + len] {
                self.eb.mb.set_link(idx0, newpos1);
                idx0 = new_idx + 1;
                newpos1 = self.eb.mb.link(idx0);
                len0 = len;
                if len1 < len {
                    len = len1;
                }
            } else {
                self.eb.mb.set_link(idx1, newpos1);
                idx1 = new_idx;
                newpos1 = self.eb.mb.link(idx1);
                len1 = len;
                if len0 < len {
                    len = len0;
                }
            }
        }
        num_pairs
    }

    /// Reads the candidates for the current position; the last pair is
    /// re-extended past the match length limit so the greedy cut sees its
    /// true length.
    fn read_match_distances(&mut self) -> usize {
        let num_pairs = self.get_match_pairs(true);
        if num_pairs > 0 {
            let len = self.pairs[num_pairs - 1].len;
            if len == self.match_len_limit && len < MAX_MATCH_LEN {
                let dis = self.pairs[num_pairs - 1].dis;
                self.pairs[num_pairs - 1].len =
                    self.eb.mb.true_match_len(len, dis as usize + 1);
            }
        }
        num_pairs
    }

    fn move_and_update(&mut self, mut n: usize) -> bool {
        loop {
            if !self.eb.mb.move_pos() {
                return false;
            }
            n -= 1;
            if n == 0 {
                break;
            }
            self.get_match_pairs(false);
        }
        true
    }

    /// Rewrites `trials[0..cur]` from a best-price graph into a forward
    /// emission sequence: each visited record ends up holding the symbol
    /// length in `price` and the distance code in `dis4`.
    fn backward(&mut self, mut cur: usize) {
        let mut dis4 = self.trials[cur].dis4;
        while cur > 0 {
            let prev_index = self.trials[cur].prev_index;
            let prev_index2 = self.trials[cur].prev_index2;

            if prev_index2 != SINGLE_STEP_TRIAL {
                let pt = &mut self.trials[prev_index as usize];
                pt.dis4 = -1;
                pt.prev_index = prev_index - 1;
                pt.prev_index2 = SINGLE_STEP_TRIAL;
                if prev_index2 >= 0 {
                    let pt2 = &mut self.trials[prev_index as usize - 1];
                    pt2.dis4 = dis4;
                    dis4 = 0;
                    pt2.prev_index = prev_index2;
                    pt2.prev_index2 = SINGLE_STEP_TRIAL;
                }
            }
            let prev_index = prev_index as usize;
            self.trials[prev_index].price = (cur - prev_index) as i32;
            let tmp = self.trials[prev_index].dis4;
            self.trials[prev_index].dis4 = dis4;
            dis4 = tmp;
            cur = prev_index;
        }
    }

    fn update_distance_prices(&mut self) {
        for dis in START_DIS_MODEL as usize..MODELED_DISTANCES as usize {
            let dis_slot = u32::from(DIS_SLOTS[dis]);
            let direct_bits = (dis_slot >> 1) - 1;
            let base = (2 | (dis_slot & 1)) << direct_bits;
            let price = price_symbol_reversed(
                &self.eb.bm_dis[(base - dis_slot) as usize..],
                dis as u32 - base,
                direct_bits,
            );
            for len_state in 0..LEN_STATES {
                self.dis_prices[len_state][dis] = price;
            }
        }

        for len_state in 0..LEN_STATES {
            let bmds = &self.eb.bm_dis_slot[len_state];
            for slot in 0..END_DIS_MODEL as usize {
                self.dis_slot_prices[len_state][slot] =
                    price_symbol6(bmds, slot as u32);
            }
            for slot in END_DIS_MODEL as usize..self.num_dis_slots {
                self.dis_slot_prices[len_state][slot] = price_symbol6(bmds, slot as u32)
                    + ((((slot as i32 >> 1) - 1) - DIS_ALIGN_BITS as i32)
                        << PRICE_SHIFT_BITS);
            }
            for dis in 0..START_DIS_MODEL as usize {
                self.dis_prices[len_state][dis] = self.dis_slot_prices[len_state][dis];
            }
            for dis in START_DIS_MODEL as usize..MODELED_DISTANCES as usize {
                self.dis_prices[len_state][dis] +=
                    self.dis_slot_prices[len_state][DIS_SLOTS[dis] as usize];
            }
        }
    }

    #[inline]
    fn price_rep0_len(&self, len: usize, state: State, pos_state: usize) -> i32 {
        self.eb.price_rep(0, state, pos_state)
            + self.rep_len_prices.price(len, pos_state)
    }

    #[inline]
    fn price_pair(&self, dis: u32, len: usize, pos_state: usize) -> i32 {
        let price = self.match_len_prices.price(len, pos_state);
        let ls = len_state(len);
        if dis < MODELED_DISTANCES {
            price + self.dis_prices[ls][dis as usize]
        } else {
            price
                + self.dis_slot_prices[ls][distance_slot(dis) as usize]
                + self.align_prices[(dis as usize) & (DIS_ALIGN_SIZE - 1)]
        }
    }

    /// Builds the cheapest coding of the upcoming bytes as a shortest-path
    /// problem over trials, returning how many input bytes were committed.
    /// On return `trials[0..ahead]` holds the emission records.
    fn sequence_optimizer(
        &mut self,
        reps: [u32; NUM_REP_DISTANCES],
        state: State,
    ) -> Result<usize, Error> {
        let mut num_pairs = if self.pending_num_pairs > 0 {
            std::mem::take(&mut self.pending_num_pairs)
        } else {
            self.read_match_distances()
        };
        let main_len = if num_pairs > 0 { self.pairs[num_pairs - 1].len } else { 0 };

        let mut replens = [0usize; NUM_REP_DISTANCES];
        let mut rep_index = 0;
        for i in 0..NUM_REP_DISTANCES {
            replens[i] = self.eb.mb.true_match_len(0, reps[i] as usize + 1);
            if replens[i] > replens[rep_index] {
                rep_index = i;
            }
        }
        if replens[rep_index] >= self.match_len_limit {
            self.trials[0].price = replens[rep_index] as i32;
            self.trials[0].dis4 = rep_index as i32;
            if !self.move_and_update(replens[rep_index]) {
                return Err(Error::Internal("match finder overran its stream"));
            }
            return Ok(replens[rep_index]);
        }

        if main_len >= self.match_len_limit {
            self.trials[0].price = main_len as i32;
            self.trials[0].dis4 = self.pairs[num_pairs - 1].dis + NUM_REP_DISTANCES as i32;
            if !self.move_and_update(main_len) {
                return Err(Error::Internal("match finder overran its stream"));
            }
            return Ok(main_len);
        }

        let mut num_trials;
        {
            let pos_state = pos_state(self.eb.mb.data_position());
            let match_price = price1(self.eb.bm_match[state.index()][pos_state]);
            let rep_match_price = match_price + price1(self.eb.bm_rep[state.index()]);
            let prev_byte = self.eb.mb.peek(1);
            let cur_byte = self.eb.mb.peek(0);
            let match_byte = self.eb.mb.peek(reps[0] as usize + 1);

            self.trials[1].price = price0(self.eb.bm_match[state.index()][pos_state])
                + if state.is_char() {
                    self.eb.price_literal(prev_byte, cur_byte)
                } else {
                    self.eb.price_matched_literal(prev_byte, cur_byte, match_byte)
                };
            self.trials[1].dis4 = -1;

            if match_byte == cur_byte {
                let price = rep_match_price + self.eb.price_shortrep(state, pos_state);
                self.trials[1].update(price, 0, 0);
            }

            num_trials = main_len.max(replens[rep_index]);

            if num_trials < MIN_MATCH_LEN {
                self.trials[0].price = 1;
                self.trials[0].dis4 = self.trials[1].dis4;
                if !self.eb.mb.move_pos() {
                    return Err(Error::Internal("match finder overran its stream"));
                }
                return Ok(1);
            }

            self.trials[0].state = state;
            self.trials[0].reps = reps;

            for len in MIN_MATCH_LEN..=num_trials {
                self.trials[len].price = INFINITE_PRICE;
            }

            for rep in 0..NUM_REP_DISTANCES {
                if replens[rep] < MIN_MATCH_LEN {
                    continue;
                }
                let price = rep_match_price + self.eb.price_rep(rep, state, pos_state);
                for len in MIN_MATCH_LEN..=replens[rep] {
                    let p = price + self.rep_len_prices.price(len, pos_state);
                    self.trials[len].update(p, rep as i32, 0);
                }
            }

            if main_len > replens[0] {
                let normal_match_price =
                    match_price + price0(self.eb.bm_rep[state.index()]);
                let mut i = 0;
                let mut len = (replens[0] + 1).max(MIN_MATCH_LEN);
                while len > self.pairs[i].len {
                    i += 1;
                }
                loop {
                    let dis = self.pairs[i].dis;
                    let p = normal_match_price
                        + self.price_pair(dis as u32, len, pos_state);
                    self.trials[len].update(p, dis + NUM_REP_DISTANCES as i32, 0);
                    len += 1;
                    if len > self.pairs[i].len {
                        i += 1;
                        if i >= num_pairs {
                            break;
                        }
                    }
                }
            }
        }

        let mut cur = 0usize;
        loop {
            if !self.eb.mb.move_pos() {
                return Err(Error::Internal("match finder overran its stream"));
            }
            cur += 1;
            if cur >= num_trials {
                self.backward(cur);
                return Ok(cur);
            }

            num_pairs = self.read_match_distances();
            let newlen = if num_pairs > 0 { self.pairs[num_pairs - 1].len } else { 0 };
            if newlen >= self.match_len_limit {
                // Greedy cut: a full-length match ahead ends the trial run.
                self.pending_num_pairs = num_pairs;
                self.backward(cur);
                return Ok(cur);
            }

            let cur_state;
            {
                let dis4 = self.trials[cur].dis4;
                let mut prev_index = self.trials[cur].prev_index;
                let prev_index2 = self.trials[cur].prev_index2;

                if prev_index2 == SINGLE_STEP_TRIAL {
                    let st = self.trials[prev_index as usize].state;
                    cur_state = if prev_index + 1 == cur as i32 {
                        if dis4 == 0 {
                            st.set_short_rep()
                        } else {
                            st.set_char()
                        }
                    } else if dis4 < NUM_REP_DISTANCES as i32 {
                        st.set_rep()
                    } else {
                        st.set_match()
                    };
                } else {
                    if prev_index2 == DUAL_STEP_TRIAL {
                        prev_index -= 1;
                    } else {
                        prev_index = prev_index2;
                    }
                    cur_state = State::set_char_rep();
                }
                self.trials[cur].state = cur_state;
                let prev_reps = self.trials[prev_index as usize].reps;
                self.trials[cur].reps = prev_reps;
                mtf_reps(dis4, &mut self.trials[cur].reps);
            }

            let pos_state = pos_state(self.eb.mb.data_position());
            let prev_byte = self.eb.mb.peek(1);
            let cur_byte = self.eb.mb.peek(0);
            let match_byte = self.eb.mb.peek(self.trials[cur].reps[0] as usize + 1);

            let cur_price = self.trials[cur].price;
            let mut next_price =
                cur_price + price0(self.eb.bm_match[cur_state.index()][pos_state]);
            if cur_state.is_char() {
                next_price += self.eb.price_literal(prev_byte, cur_byte);
            } else {
                next_price +=
                    self.eb.price_matched_literal(prev_byte, cur_byte, match_byte);
            }

            self.trials[cur + 1].update(next_price, -1, cur as i32);

            let match_price =
                cur_price + price1(self.eb.bm_match[cur_state.index()][pos_state]);
            let rep_match_price = match_price + price1(self.eb.bm_rep[cur_state.index()]);

            if match_byte == cur_byte
                && self.trials[cur + 1].dis4 != 0
                && self.trials[cur + 1].prev_index2 == SINGLE_STEP_TRIAL
            {
                let price =
                    rep_match_price + self.eb.price_shortrep(cur_state, pos_state);
                if price <= self.trials[cur + 1].price {
                    self.trials[cur + 1].price = price;
                    self.trials[cur + 1].dis4 = 0;
                    self.trials[cur + 1].prev_index = cur as i32;
                }
            }

            let triable_bytes =
                self.eb.mb.available_bytes().min(MAX_NUM_TRIALS - 1 - cur);
            if triable_bytes < MIN_MATCH_LEN {
                continue;
            }

            let len_limit = self.match_len_limit.min(triable_bytes);
            let mut start_len = MIN_MATCH_LEN;
            let pos = self.eb.mb.pos;

            // Literal followed by a rep0 match, priced as one two-step trial.
            if match_byte != cur_byte && self.trials[cur + 1].prev_index != cur as i32 {
                let dis = self.trials[cur].reps[0] as usize + 1;
                let limit = (self.match_len_limit + 1).min(triable_bytes);
                let len = {
                    let buf = &self.eb.mb.buffer;
                    let mut len = 1usize;
                    while len < limit && buf[pos + len - dis] == buf[pos + len] {
                        len += 1;
                    }
                    len - 1
                };
                if len >= MIN_MATCH_LEN {
                    let pos_state2 = (pos_state + 1) & POS_STATE_MASK_US;
                    let state2 = cur_state.set_char();
                    let price = next_price
                        + price1(self.eb.bm_match[state2.index()][pos_state2])
                        + price1(self.eb.bm_rep[state2.index()])
                        + self.price_rep0_len(len, state2, pos_state2);
                    while num_trials < cur + 1 + len {
                        num_trials += 1;
                        self.trials[num_trials].price = INFINITE_PRICE;
                    }
                    self.trials[cur + 1 + len].update2(price, (cur + 1) as i32);
                }
            }

            for rep in 0..NUM_REP_DISTANCES {
                let dis = self.trials[cur].reps[rep] as usize + 1;
                if self.eb.mb.buffer[pos - dis] != self.eb.mb.buffer[pos]
                    || self.eb.mb.buffer[pos + 1 - dis] != self.eb.mb.buffer[pos + 1]
                {
                    continue;
                }
                let len = {
                    let buf = &self.eb.mb.buffer;
                    let mut len = MIN_MATCH_LEN;
                    while len < len_limit && buf[pos + len - dis] == buf[pos + len] {
                        len += 1;
                    }
                    len
                };
                while num_trials < cur + len {
                    num_trials += 1;
                    self.trials[num_trials].price = INFINITE_PRICE;
                }
                let price =
                    rep_match_price + self.eb.price_rep(rep, cur_state, pos_state);
                for i in MIN_MATCH_LEN..=len {
                    let p = price + self.rep_len_prices.price(i, pos_state);
                    self.trials[cur + i].update(p, rep as i32, cur as i32);
                }
                if rep == 0 {
                    start_len = len + 1;
                }

                // Rep match, one literal, then a rep0 match.
                let len2 = {
                    let buf = &self.eb.mb.buffer;
                    let mut len2 = len + 1;
                    let limit = (self.match_len_limit + len2).min(triable_bytes);
                    while len2 < limit && buf[pos + len2 - dis] == buf[pos + len2] {
                        len2 += 1;
                    }
                    len2 - (len + 1)
                };
                if len2 < MIN_MATCH_LEN {
                    continue;
                }

                let mut pos_state2 = (pos_state + len) & POS_STATE_MASK_US;
                let mut state2 = cur_state.set_rep();
                let mut price = price
                    + self.rep_len_prices.price(len, pos_state)
                    + price0(self.eb.bm_match[state2.index()][pos_state2])
                    + self.eb.price_matched_literal(
                        self.eb.mb.buffer[pos + len - 1],
                        self.eb.mb.buffer[pos + len],
                        self.eb.mb.buffer[pos + len - dis],
                    );
                pos_state2 = (pos_state2 + 1) & POS_STATE_MASK_US;
                state2 = state2.set_char();
                price += price1(self.eb.bm_match[state2.index()][pos_state2])
                    + price1(self.eb.bm_rep[state2.index()])
                    + self.price_rep0_len(len2, state2, pos_state2);
                while num_trials < cur + len + 1 + len2 {
                    num_trials += 1;
                    self.trials[num_trials].price = INFINITE_PRICE;
                }
                self.trials[cur + len + 1 + len2].update3(
                    price,
                    rep as i32,
                    (cur + len + 1) as i32,
                    cur as i32,
                );
            }

            if newlen >= start_len && newlen <= len_limit {
                let normal_match_price =
                    match_price + price0(self.eb.bm_rep[cur_state.index()]);

                while num_trials < cur + newlen {
                    num_trials += 1;
                    self.trials[num_trials].price = INFINITE_PRICE;
                }

                let mut i = 0;
                while self.pairs[i].len < start_len {
                    i += 1;
                }
                let mut dis = self.pairs[i].dis;
                let mut len = start_len;
                loop {
                    let price = normal_match_price
                        + self.price_pair(dis as u32, len, pos_state);
                    self.trials[cur + len].update(
                        price,
                        dis + NUM_REP_DISTANCES as i32,
                        cur as i32,
                    );

                    if len == self.pairs[i].len {
                        // Match, one literal, then a rep0 match at the same
                        // distance.
                        let dis2 = dis as usize + 1;
                        let len2 = {
                            let buf = &self.eb.mb.buffer;
                            let mut len2 = len + 1;
                            let limit = (self.match_len_limit + len2).min(triable_bytes);
                            while len2 < limit && buf[pos + len2 - dis2] == buf[pos + len2]
                            {
                                len2 += 1;
                            }
                            len2 - (len + 1)
                        };
                        if len2 >= MIN_MATCH_LEN {
                            let mut pos_state2 = (pos_state + len) & POS_STATE_MASK_US;
                            let mut state2 = cur_state.set_match();
                            let mut price = price
                                + price0(self.eb.bm_match[state2.index()][pos_state2])
                                + self.eb.price_matched_literal(
                                    self.eb.mb.buffer[pos + len - 1],
                                    self.eb.mb.buffer[pos + len],
                                    self.eb.mb.buffer[pos + len - dis2],
                                );
                            pos_state2 = (pos_state2 + 1) & POS_STATE_MASK_US;
                            state2 = state2.set_char();
                            price += price1(self.eb.bm_match[state2.index()][pos_state2])
                                + price1(self.eb.bm_rep[state2.index()])
                                + self.price_rep0_len(len2, state2, pos_state2);

                            while num_trials < cur + len + 1 + len2 {
                                num_trials += 1;
                                self.trials[num_trials].price = INFINITE_PRICE;
                            }
                            self.trials[cur + len + 1 + len2].update3(
                                price,
                                dis + NUM_REP_DISTANCES as i32,
                                (cur + len + 1) as i32,
                                cur as i32,
                            );
                        }
                        i += 1;
                        if i >= num_pairs {
                            break;
                        }
                        dis = self.pairs[i].dis;
                    }
                    len += 1;
                }
            }
        }
    }

    pub fn encode_member(&mut self) -> Result<(), Error> {
        let best = self.match_len_limit > 12;
        let dis_price_count: i32 = if best { 1 } else { 512 };
        let align_price_count: i32 = if best { 1 } else { DIS_ALIGN_SIZE as i32 };
        let price_count: i32 = if self.match_len_limit > 36 { 1013 } else { 4093 };

        if self.eb.member_finished {
            return Ok(());
        }
        if self.eb.renc.member_position() >= self.eb.member_size_limit {
            self.eb.try_full_flush();
            return Ok(());
        }

        if self.eb.mb.data_position() == 0 && !self.eb.mb.data_finished() {
            // The first byte is always coded as a plain literal.
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
            self.get_match_pairs(false);
            if !self.eb.mb.move_pos() {
                return Err(Error::Internal("match finder overran its stream"));
            }
        }

        while !self.eb.mb.data_finished() {
            if !self.eb.mb.enough_available_bytes() || !self.eb.renc.enough_free_bytes()
            {
                return Ok(());
            }
            if self.price_counter <= 0 && self.pending_num_pairs == 0 {
                self.price_counter = price_count;
                if self.dis_price_counter <= 0 {
                    self.dis_price_counter = dis_price_count;
                    self.update_distance_prices();
                }
                if self.align_price_counter <= 0 {
                    self.align_price_counter = align_price_count;
                    for i in 0..DIS_ALIGN_SIZE {
                        self.align_prices[i] = price_symbol_reversed(
                            &self.eb.bm_align,
                            i as u32,
                            DIS_ALIGN_BITS,
                        );
                    }
                }
                self.match_len_prices.update_prices(&self.eb.match_len_model);
                self.rep_len_prices.update_prices(&self.eb.rep_len_model);
            }

            let mut ahead = self.sequence_optimizer(self.eb.reps, self.eb.state)?;
            self.price_counter -= ahead as i32;

            let mut i = 0usize;
            while ahead > 0 {
                let ps = pos_state(self.eb.mb.data_position() - ahead as u64);
                let len = self.trials[i].price as usize;
                let dis = self.trials[i].dis4;
                let st = self.eb.state.index();

                let is_literal = dis < 0;
                self.eb
                    .renc
                    .encode_bit(&mut self.eb.bm_match[st][ps], !is_literal);
                if is_literal {
                    let prev_byte = self.eb.mb.peek(ahead + 1);
                    let cur_byte = self.eb.mb.peek(ahead);
                    self.eb.crc.update_byte(cur_byte);
                    if self.eb.state.is_char() {
                        self.eb.encode_literal(prev_byte, cur_byte);
                    } else {
                        let match_byte =
                            self.eb.mb.peek(ahead + self.eb.reps[0] as usize + 1);
                        self.eb.encode_matched_literal(prev_byte, cur_byte, match_byte);
                    }
                    self.eb.state = self.eb.state.set_char();
                } else {
                    let start = self.eb.mb.pos - ahead;
                    self.eb.crc.update(&self.eb.mb.buffer[start..start + len]);
                    mtf_reps(dis, &mut self.eb.reps);
                    let is_rep = dis < NUM_REP_DISTANCES as i32;
                    self.eb.renc.encode_bit(&mut self.eb.bm_rep[st], is_rep);
                    if is_rep {
                        let is_rep0 = dis == 0;
                        self.eb
                            .renc
                            .encode_bit(&mut self.eb.bm_rep0[st], !is_rep0);
                        if is_rep0 {
                            self.eb
                                .renc
                                .encode_bit(&mut self.eb.bm_len[st][ps], len > 1);
                        } else {
                            self.eb.renc.encode_bit(&mut self.eb.bm_rep1[st], dis > 1);
                            if dis > 1 {
                                self.eb
                                    .renc
                                    .encode_bit(&mut self.eb.bm_rep2[st], dis > 2);
                            }
                        }
                        if len == 1 {
                            self.eb.state = self.eb.state.set_short_rep();
                        } else {
                            self.eb.renc.encode_len(
                                &mut self.eb.rep_len_model,
                                len,
                                ps,
                            );
                            self.rep_len_prices.decrement_counter(ps);
                            self.eb.state = self.eb.state.set_rep();
                        }
                    } else {
                        let dis = (dis - NUM_REP_DISTANCES as i32) as u32;
                        self.eb.encode_pair(dis, len, ps);
                        if dis >= MODELED_DISTANCES {
                            self.align_price_counter -= 1;
                        }
                        self.dis_price_counter -= 1;
                        self.match_len_prices.decrement_counter(ps);
                        self.eb.state = self.eb.state.set_match();
                    }
                }
                ahead -= len;
                i += len;
                if self.eb.renc.member_position() >= self.eb.member_size_limit {
                    if !self.eb.mb.dec_pos(ahead) {
                        return Err(Error::Internal("lookahead exceeded position"));
                    }
                    self.eb.try_full_flush();
                    return Ok(());
                }
            }
        }
        self.eb.try_full_flush();
        Ok(())
    }
}
