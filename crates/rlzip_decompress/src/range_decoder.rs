use rlzip_format::Header;
use rlzip_io::CircularBuffer;
use rlzip_model::{BitModel, LenModel, LEN_LOW_SYMBOLS, LEN_MID_SYMBOLS};

/// Enough buffered input to decode any single symbol without re-checking.
const MIN_AVAILABLE_BYTES: usize = 10;

/// Range decoder over a ring of not-yet-decoded compressed bytes.
///
/// Once the input side is finished, reads past the end serve 0xFF so a
/// member truncated at the EOS marker still decodes structurally; the
/// trailer check reports the real damage.
#[derive(Debug)]
pub(crate) struct RangeDecoder {
    cb: CircularBuffer,
    pub member_position: u64,
    code: u32,
    range: u32,
    pub at_stream_end: bool,
    pub reload_pending: bool,
}

impl RangeDecoder {
    pub fn new() -> Self {
        Self {
            cb: CircularBuffer::new(65536 + MIN_AVAILABLE_BYTES),
            member_position: 0,
            code: 0,
            range: 0xFFFF_FFFF,
            at_stream_end: false,
            reload_pending: false,
        }
    }

    pub fn finished(&self) -> bool {
        self.at_stream_end && self.cb.is_empty()
    }

    pub fn finish(&mut self) {
        self.at_stream_end = true;
    }

    pub fn enough_available_bytes(&self) -> bool {
        self.cb.used() >= MIN_AVAILABLE_BYTES
    }

    pub fn available_bytes(&self) -> usize {
        self.cb.used()
    }

    pub fn is_empty(&self) -> bool {
        self.cb.is_empty()
    }

    pub fn free_bytes(&self) -> usize {
        if self.at_stream_end {
            return 0;
        }
        self.cb.free()
    }

    /// Discards all buffered input, returning how many input bytes the
    /// member had consumed plus the bytes dropped.
    pub fn purge(&mut self) -> u64 {
        let size = self.member_position + self.cb.used() as u64;
        self.cb.reset();
        self.member_position = 0;
        self.at_stream_end = true;
        size
    }

    pub fn reset(&mut self) {
        self.cb.reset();
        self.member_position = 0;
        self.at_stream_end = false;
        self.reload_pending = false;
    }

    /// Counts buffered-but-unconsumed bytes into `member_position` and
    /// drops them. Used when a member is abandoned mid-stream.
    pub fn discard_buffered(&mut self) {
        self.member_position += self.cb.used() as u64;
        self.cb.reset();
    }

    /// Scans buffered input for a verifiable member header, discarding
    /// bytes before it. Returns whether one was found and how many bytes
    /// were skipped; an incomplete candidate at the buffer end is kept.
    pub fn find_header(&mut self, skipped: &mut u64) -> bool {
        *skipped = 0;
        while let Some(first) = self.cb.peek(0) {
            if first == rlzip_format::MAGIC[0] {
                let mut data = [0u8; Header::SIZE];
                let mut complete = true;
                for (i, slot) in data.iter_mut().enumerate() {
                    match self.cb.peek(i) {
                        Some(b) => *slot = b,
                        None => {
                            complete = false;
                            break;
                        }
                    }
                }
                if !complete {
                    return false;
                }
                if Header::from_bytes(data).verify() {
                    return true;
                }
            }
            self.cb.skip(1);
            *skipped += 1;
        }
        false
    }

    pub fn write(&mut self, buf: &[u8]) -> usize {
        if self.at_stream_end {
            return 0;
        }
        self.cb.write(buf)
    }

    #[inline]
    pub fn get_byte(&mut self) -> u8 {
        if self.finished() {
            return 0xFF;
        }
        self.member_position += 1;
        self.cb.get_byte()
    }

    pub fn read(&mut self, out: &mut [u8]) -> usize {
        let size = self.cb.read(out);
        self.member_position += size as u64;
        size
    }

    pub fn unread(&mut self, size: usize) -> bool {
        if size as u64 > self.member_position || !self.cb.unread(size) {
            return false;
        }
        self.member_position -= size as u64;
        true
    }

    /// Primes the 32-bit code register from the next 5 bytes if a reload is
    /// pending and they are available. The first of the five is consumed
    /// structurally (shifted out of the register). Returns whether decoding
    /// may proceed.
    pub fn try_reload(&mut self) -> bool {
        if self.reload_pending && self.available_bytes() >= 5 {
            self.reload_pending = false;
            self.code = 0;
            for _ in 0..5 {
                self.code = (self.code << 8) | u32::from(self.get_byte());
            }
            self.range = 0xFFFF_FFFF;
        }
        !self.reload_pending
    }

    #[inline(always)]
    pub fn normalize(&mut self) {
        if self.range <= 0x00FF_FFFF {
            self.range <<= 8;
            self.code = (self.code << 8) | u32::from(self.get_byte());
        }
    }

    /// Decodes `num_bits` raw (equiprobable) bits, MSB first.
    pub fn decode(&mut self, num_bits: u32) -> u32 {
        let mut symbol = 0u32;
        for _ in 0..num_bits {
            self.normalize();
            self.range >>= 1;
            let bit = self.code >= self.range;
            symbol = (symbol << 1) | u32::from(bit);
            if bit {
                self.code -= self.range;
            }
        }
        symbol
    }

    #[inline]
    pub fn decode_bit(&mut self, bm: &mut BitModel) -> u32 {
        self.normalize();
        let bound = (self.range >> BitModel::TOTAL_BITS) * bm.probability;
        if self.code < bound {
            bm.update_0();
            self.range = bound;
            0
        } else {
            bm.update_1();
            self.code -= bound;
            self.range -= bound;
            1
        }
    }

    /// Decodes a `num_bits`-wide symbol from the tree rooted at `bm[1]`.
    pub fn decode_tree(&mut self, bm: &mut [BitModel], num_bits: u32) -> u32 {
        let mut symbol = 1u32;
        for _ in 0..num_bits {
            symbol = (symbol << 1) | self.decode_bit(&mut bm[symbol as usize]);
        }
        symbol - (1 << num_bits)
    }

    /// As `decode_tree`, but the symbol's bits come out LSB first.
    pub fn decode_tree_reversed(&mut self, bm: &mut [BitModel], num_bits: u32) -> u32 {
        let mut model = 1u32;
        let mut symbol = 0u32;
        for i in 0..num_bits {
            let bit = self.decode_bit(&mut bm[model as usize]);
            model = (model << 1) + bit;
            symbol |= bit << i;
        }
        symbol
    }

    /// Decodes a literal in the matched context: sub-models are steered by
    /// the byte at distance rep0 until the prediction first fails.
    pub fn decode_matched(&mut self, bm: &mut [BitModel], match_byte: u8) -> u8 {
        let mut symbol = 1u32;
        let mut mask = 0x100u32;
        let mut match_byte = u32::from(match_byte);
        loop {
            match_byte <<= 1;
            let match_bit = match_byte & mask;
            let bit = self.decode_bit(&mut bm[(symbol + match_bit + mask) as usize]);
            symbol = (symbol << 1) | bit;
            if symbol > 0xFF {
                return (symbol & 0xFF) as u8;
            }
            mask &= !(match_bit ^ (bit << 8));
        }
    }

    /// Decodes a match length, returned relative to the 2-byte minimum
    /// (0..=271).
    pub fn decode_len(&mut self, lm: &mut LenModel, pos_state: usize) -> usize {
        if self.decode_bit(&mut lm.choice1) == 0 {
            return self.decode_tree(&mut lm.low[pos_state], 3) as usize;
        }
        if self.decode_bit(&mut lm.choice2) == 0 {
            return LEN_LOW_SYMBOLS + self.decode_tree(&mut lm.mid[pos_state], 3) as usize;
        }
        LEN_LOW_SYMBOLS + LEN_MID_SYMBOLS + self.decode_tree(&mut lm.high, 8) as usize
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rlzip_format::MAGIC;

    #[test]
    fn test_get_byte_past_end_serves_ff() {
        let mut rdec = RangeDecoder::new();
        rdec.write(b"\x01\x02");
        rdec.finish();
        assert_eq!(rdec.get_byte(), 1);
        assert_eq!(rdec.get_byte(), 2);
        assert_eq!(rdec.get_byte(), 0xFF);
        assert_eq!(rdec.get_byte(), 0xFF);
        // Padding bytes do not advance the member position.
        assert_eq!(rdec.member_position, 2);
    }

    #[test]
    fn test_reload_consumes_five_bytes() {
        let mut rdec = RangeDecoder::new();
        rdec.reload_pending = true;
        rdec.write(&[0, 0x12, 0x34]);
        assert!(!rdec.try_reload());
        rdec.write(&[0x56, 0x78]);
        assert!(rdec.try_reload());
        assert_eq!(rdec.code, 0x1234_5678);
        assert_eq!(rdec.member_position, 5);
    }

    #[test]
    fn test_unread_is_bounded_by_member_position() {
        let mut rdec = RangeDecoder::new();
        rdec.write(b"abcdef");
        let mut buf = [0u8; 4];
        rdec.read(&mut buf);
        assert!(rdec.unread(4));
        assert_eq!(rdec.member_position, 0);
        assert!(!rdec.unread(1));
    }

    #[test]
    fn test_find_header_skips_garbage() {
        let mut rdec = RangeDecoder::new();
        let mut stream = b"garbage bytes L here".to_vec();
        stream.extend_from_slice(&MAGIC);
        stream.extend_from_slice(&[1, 20, 99, 98]);
        rdec.write(&stream);
        let mut skipped = 0;
        assert!(rdec.find_header(&mut skipped));
        assert_eq!(skipped, 20);
        let mut found = [0u8; 6];
        rdec.read(&mut found);
        assert_eq!(&found[..4], &MAGIC);
        assert_eq!(found[5], 20);
    }

    #[test]
    fn test_find_header_keeps_incomplete_candidate() {
        let mut rdec = RangeDecoder::new();
        let mut stream = b"xy".to_vec();
        stream.extend_from_slice(&MAGIC[..3]);
        rdec.write(&stream);
        let mut skipped = 0;
        assert!(!rdec.find_header(&mut skipped));
        assert_eq!(skipped, 2);
        // The partial candidate stays buffered for the next write.
        assert_eq!(rdec.available_bytes(), 3);
        rdec.write(&[MAGIC[3], 1, 20]);
        assert!(rdec.find_header(&mut skipped));
        assert_eq!(skipped, 0);
    }

    #[test]
    fn test_purge_accounts_all_input() {
        let mut rdec = RangeDecoder::new();
        rdec.write(b"0123456789");
        let mut buf = [0u8; 4];
        rdec.read(&mut buf);
        assert_eq!(rdec.purge(), 10);
        assert!(rdec.finished());
    }
}
