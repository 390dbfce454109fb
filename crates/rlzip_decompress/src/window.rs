use rlzip_format::Crc32;
use rlzip_model::MAX_MATCH_LEN;

/// Space a single decoded symbol may need.
const MIN_FREE_BYTES: usize = MAX_MATCH_LEN;

/// The decoder's sliding dictionary: a byte ring that is simultaneously the
/// match window and the staging buffer the caller drains. `put` is the
/// decode cursor, `get` the drain cursor; decoding stalls while fewer than
/// `MIN_FREE_BYTES` slots separate them. The CRC of everything decoded is
/// folded in as bytes land.
#[derive(Debug)]
pub(crate) struct Window {
    buf: Box<[u8]>,
    get: usize,
    put: usize,
    dictionary_size: usize,
    partial_data_pos: u64,
    crc: Crc32,
    pos_wrapped: bool,
}

impl Window {
    pub fn new(dictionary_size: u32) -> Self {
        let dictionary_size = dictionary_size as usize;
        let mut buf =
            vec![0; dictionary_size.max(65536) + MIN_FREE_BYTES + 1].into_boxed_slice();
        // prev_byte of the first byte; also peek(0) on a corrupt stream.
        let last = buf.len() - 1;
        buf[last] = 0;
        Self {
            buf,
            get: 0,
            put: 0,
            dictionary_size,
            partial_data_pos: 0,
            crc: Crc32::new(),
            pos_wrapped: false,
        }
    }

    #[inline(always)]
    pub fn used(&self) -> usize {
        if self.get <= self.put {
            self.put - self.get
        } else {
            self.buf.len() + self.put - self.get
        }
    }

    #[inline(always)]
    pub fn free(&self) -> usize {
        self.buf.len() - self.used() - 1
    }

    #[inline(always)]
    pub fn is_empty(&self) -> bool {
        self.get == self.put
    }

    #[inline(always)]
    pub fn enough_free(&self) -> bool {
        self.free() >= MIN_FREE_BYTES
    }

    pub fn data_position(&self) -> u64 {
        self.partial_data_pos + self.put as u64
    }

    pub fn crc(&self) -> u32 {
        self.crc.value()
    }

    /// Whether a match at `distance` stays inside data actually written.
    #[inline]
    pub fn distance_is_valid(&self, distance: u32) -> bool {
        let distance = distance as usize;
        distance < self.dictionary_size && (distance < self.put || self.pos_wrapped)
    }

    #[inline(always)]
    pub fn peek_prev(&self) -> u8 {
        let i = if self.put > 0 { self.put } else { self.buf.len() } - 1;
        self.buf[i]
    }

    #[inline(always)]
    pub fn peek(&self, distance: u32) -> u8 {
        let distance = distance as usize;
        let i = (if self.put > distance { 0 } else { self.buf.len() }) + self.put
            - distance
            - 1;
        self.buf[i]
    }

    #[inline]
    pub fn put_byte(&mut self, b: u8) {
        self.crc.update_byte(b);
        self.buf[self.put] = b;
        self.put += 1;
        if self.put >= self.buf.len() {
            self.partial_data_pos += self.put as u64;
            self.put = 0;
            self.pos_wrapped = true;
        }
    }

    /// Copies `len` bytes from `distance` back, byte-sequentially where the
    /// regions overlap.
    pub fn copy_match(&mut self, distance: u32, len: usize) {
        let distance = distance as usize;
        let lpos = self.put;
        let (i, fast, fast2);
        if lpos > distance {
            i = lpos - distance - 1;
            fast = len < self.buf.len() - lpos;
            fast2 = fast && len <= lpos - i;
        } else {
            i = self.buf.len() + lpos - distance - 1;
            fast = len < self.buf.len() - i; // (i == put) may happen
            fast2 = fast && len <= i - lpos;
        }
        if fast {
            if fast2 {
                self.buf.copy_within(i..i + len, lpos);
            } else {
                for k in 0..len {
                    self.buf[lpos + k] = self.buf[i + k];
                }
            }
            self.crc.update(&self.buf[lpos..lpos + len]);
            self.put += len;
        } else {
            let mut i = i;
            for _ in 0..len {
                self.put_byte(self.buf[i]);
                i += 1;
                if i >= self.buf.len() {
                    i = 0;
                }
            }
        }
    }

    /// Drains decoded bytes to the caller.
    pub fn read(&mut self, out: &mut [u8]) -> usize {
        let mut size = 0;
        if out.is_empty() {
            return 0;
        }
        if self.get > self.put {
            size = (self.buf.len() - self.get).min(out.len());
            out[..size].copy_from_slice(&self.buf[self.get..self.get + size]);
            self.get += size;
            if self.get >= self.buf.len() {
                self.get = 0;
            }
        }
        if self.get < self.put {
            let size2 = (self.put - self.get).min(out.len() - size);
            if size2 > 0 {
                out[size..size + size2]
                    .copy_from_slice(&self.buf[self.get..self.get + size2]);
                self.get += size2;
                size += size2;
            }
        }
        size
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rlzip_format::crc32;

    #[test]
    fn test_put_and_drain() {
        let mut w = Window::new(4096);
        for &b in b"hello" {
            w.put_byte(b);
        }
        assert_eq!(w.data_position(), 5);
        assert_eq!(w.crc(), crc32(b"hello"));
        let mut out = [0u8; 8];
        assert_eq!(w.read(&mut out), 5);
        assert_eq!(&out[..5], b"hello");
        assert!(w.is_empty());
        // Draining does not move the data position.
        assert_eq!(w.data_position(), 5);
    }

    #[test]
    fn test_peek_prev_of_first_byte_is_zero() {
        let w = Window::new(4096);
        assert_eq!(w.peek_prev(), 0);
    }

    #[test]
    fn test_overlapping_copy_repeats_bytes() {
        let mut w = Window::new(4096);
        w.put_byte(b'a');
        w.put_byte(b'b');
        // Wire distance 1 = actual distance 2: extends the pair cyclically.
        w.copy_match(1, 6);
        let mut out = [0u8; 8];
        assert_eq!(w.read(&mut out), 8);
        assert_eq!(&out, b"abababab");
        assert_eq!(w.crc(), crc32(b"abababab"));
    }

    #[test]
    fn test_distance_validity_tracks_written_data() {
        let mut w = Window::new(4096);
        assert!(!w.distance_is_valid(0));
        w.put_byte(1);
        assert!(w.distance_is_valid(0));
        assert!(!w.distance_is_valid(1));
        assert!(!w.distance_is_valid(4096));
    }

    #[test]
    fn test_copy_match_across_ring_boundary() {
        let mut w = Window::new(4096);
        let ring = w.buf.len();
        // Fill close to the end of the ring, draining as we go so free
        // space never runs out.
        let mut written = 0u64;
        let mut scratch = vec![0u8; 4096];
        while written < (ring as u64) - 3 {
            let chunk = (ring as u64 - 3 - written).min(1024) as usize;
            for k in 0..chunk {
                w.put_byte((written as usize + k) as u8);
            }
            written += chunk as u64;
            while w.read(&mut scratch) > 0 {}
        }
        // Wire distance 0 repeats the last byte; this copy crosses the
        // physical end of the buffer.
        w.copy_match(0, 6);
        let mut out = [0u8; 6];
        assert_eq!(w.read(&mut out), 6);
        let last = ((ring as u64 - 4) % 256) as u8;
        assert_eq!(out, [last; 6]);
        assert_eq!(w.data_position(), written + 6);
    }
}
