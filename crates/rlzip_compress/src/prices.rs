use crate::prelude::*;
use rlzip_model::POS_STATES;

/// Cached prices for every codable length, refreshed lazily: each pos-state
/// keeps a countdown decremented as lengths are emitted, and the low/mid
/// trees are re-priced when it runs out. Short match-length limits re-price
/// rarely (the cache covers few symbols); long limits re-price on every
/// refresh sweep.
#[derive(Debug)]
pub(crate) struct LenPrices {
    len_symbols: usize,
    count: i32,
    prices: [[i32; MAX_LEN_SYMBOLS]; POS_STATES],
    counters: [i32; POS_STATES],
}

impl LenPrices {
    pub fn new(match_len_limit: usize) -> Self {
        let len_symbols = match_len_limit + 1 - MIN_MATCH_LEN;
        Self {
            len_symbols,
            count: if match_len_limit > 12 { 1 } else { len_symbols as i32 },
            prices: [[0; MAX_LEN_SYMBOLS]; POS_STATES],
            counters: [0; POS_STATES],
        }
    }

    pub fn reset(&mut self) {
        self.counters = [0; POS_STATES];
    }

    #[inline(always)]
    pub fn decrement_counter(&mut self, pos_state: usize) {
        self.counters[pos_state] -= 1;
    }

    #[inline(always)]
    pub fn price(&self, len: usize, pos_state: usize) -> i32 {
        self.prices[pos_state][len - MIN_MATCH_LEN]
    }

    pub fn update_prices(&mut self, lm: &LenModel) {
        let mut high_pending = false;
        for pos_state in 0..POS_STATES {
            if self.counters[pos_state] <= 0 {
                self.counters[pos_state] = self.count;
                self.update_low_mid_prices(lm, pos_state);
                high_pending = true;
            }
        }
        if high_pending && self.len_symbols > LEN_LOW_SYMBOLS + LEN_MID_SYMBOLS {
            self.update_high_prices(lm);
        }
    }

    fn update_low_mid_prices(&mut self, lm: &LenModel, pos_state: usize) {
        let pps = &mut self.prices[pos_state];
        let mut tmp = price0(lm.choice1);
        let mut len = 0;
        while len < LEN_LOW_SYMBOLS && len < self.len_symbols {
            pps[len] = tmp + price_symbol3(&lm.low[pos_state], len as u32);
            len += 1;
        }
        if len >= self.len_symbols {
            return;
        }
        tmp = price1(lm.choice1) + price0(lm.choice2);
        while len < LEN_LOW_SYMBOLS + LEN_MID_SYMBOLS && len < self.len_symbols {
            pps[len] = tmp
                + price_symbol3(&lm.mid[pos_state], (len - LEN_LOW_SYMBOLS) as u32);
            len += 1;
        }
    }

    fn update_high_prices(&mut self, lm: &LenModel) {
        let tmp = price1(lm.choice1) + price1(lm.choice2);
        for len in LEN_LOW_SYMBOLS + LEN_MID_SYMBOLS..self.len_symbols {
            let price = tmp
                + price_symbol8(
                    &lm.high,
                    (len - LEN_LOW_SYMBOLS - LEN_MID_SYMBOLS) as u32,
                );
            for pos_state in 0..POS_STATES {
                self.prices[pos_state][len] = price;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fresh_model_prices_grow_with_tree_depth() {
        let lm = LenModel::new();
        let mut lp = LenPrices::new(MAX_MATCH_LEN);
        lp.update_prices(&lm);
        // low lengths: 1 choice bit + 3 tree bits; mid: 2 + 3; high: 2 + 8.
        let bit = price0(BitModel::new());
        assert_eq!(lp.price(MIN_MATCH_LEN, 0), 4 * bit);
        assert_eq!(lp.price(MIN_MATCH_LEN + LEN_LOW_SYMBOLS, 0), 5 * bit);
        assert_eq!(
            lp.price(MIN_MATCH_LEN + LEN_LOW_SYMBOLS + LEN_MID_SYMBOLS, 3),
            10 * bit
        );
    }

    #[test]
    fn test_counters_gate_refresh() {
        let mut lm = LenModel::new();
        let mut lp = LenPrices::new(8);
        lp.update_prices(&lm);
        let before = lp.price(MIN_MATCH_LEN, 1);
        // Skew the model; without exhausting the counter nothing changes.
        for _ in 0..50 {
            lm.choice1.update_1();
        }
        lp.update_prices(&lm);
        assert_eq!(lp.price(MIN_MATCH_LEN, 1), before);
        for _ in 0..lp.count {
            lp.decrement_counter(1);
        }
        lp.update_prices(&lm);
        assert!(lp.price(MIN_MATCH_LEN, 1) > before);
    }
}
