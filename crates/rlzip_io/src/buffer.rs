/// Fixed-capacity byte ring with independent read (`get`) and write (`put`)
/// cursors. One slot is reserved so that `get == put` always means empty and
/// a full buffer never aliases the empty state.
///
/// Both range-coder halves and the container orchestrators use this as their
/// staging buffer, so it supports rolling the read cursor back (`unread`)
/// and patching bytes that were already written but not yet read.
#[derive(Debug)]
pub struct CircularBuffer {
    buf: Box<[u8]>,
    get: usize,
    put: usize,
}

impl CircularBuffer {
    pub fn new(capacity: usize) -> Self {
        Self {
            buf: vec![0; capacity + 1].into_boxed_slice(),
            get: 0,
            put: 0,
        }
    }

    pub fn reset(&mut self) {
        self.get = 0;
        self.put = 0;
    }

    #[inline(always)]
    pub fn is_empty(&self) -> bool {
        self.get == self.put
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

    #[inline]
    pub fn get_byte(&mut self) -> u8 {
        debug_assert!(!self.is_empty());
        let b = self.buf[self.get];
        self.get += 1;
        if self.get >= self.buf.len() {
            self.get = 0;
        }
        b
    }

    #[inline]
    pub fn put_byte(&mut self, b: u8) {
        debug_assert!(self.free() > 0);
        self.buf[self.put] = b;
        self.put += 1;
        if self.put >= self.buf.len() {
            self.put = 0;
        }
    }

    /// Copies up to `out.len()` bytes into `out`, consuming them. Returns the
    /// number of bytes delivered.
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

    /// Consumes up to `n` bytes without copying them anywhere. Returns the
    /// number of bytes dropped.
    pub fn skip(&mut self, n: usize) -> usize {
        let size = n.min(self.used());
        self.get += size;
        if self.get >= self.buf.len() {
            self.get -= self.buf.len();
        }
        size
    }

    /// Copies as many bytes of `src` as fit, returning how many were
    /// accepted.
    pub fn write(&mut self, src: &[u8]) -> usize {
        let mut size = 0;
        if src.is_empty() {
            return 0;
        }
        if self.put >= self.get {
            let reserve = usize::from(self.get == 0);
            size = (self.buf.len() - self.put - reserve).min(src.len());
            if size > 0 {
                self.buf[self.put..self.put + size].copy_from_slice(&src[..size]);
                self.put += size;
                if self.put >= self.buf.len() {
                    self.put = 0;
                }
            }
        }
        if self.put < self.get {
            let size2 = (self.get - self.put - 1).min(src.len() - size);
            if size2 > 0 {
                self.buf[self.put..self.put + size2]
                    .copy_from_slice(&src[size..size + size2]);
                self.put += size2;
                size += size2;
            }
        }
        size
    }

    /// Rolls the read cursor back by `n` bytes so they can be read again.
    /// Fails if the slots holding them may have been overwritten since.
    pub fn unread(&mut self, n: usize) -> bool {
        if n > self.free() {
            return false;
        }
        if self.get >= n {
            self.get -= n;
        } else {
            self.get = self.buf.len() - n + self.get;
        }
        true
    }

    /// Reads the `i`-th unconsumed byte without advancing the cursor.
    #[inline]
    pub fn peek(&self, i: usize) -> Option<u8> {
        if i >= self.used() {
            return None;
        }
        let mut idx = self.get + i;
        if idx >= self.buf.len() {
            idx -= self.buf.len();
        }
        Some(self.buf[idx])
    }

    /// Overwrites the byte at physical slot `index`. Only meaningful for
    /// bytes written since the last `reset` and not yet wrapped over; the
    /// encoder uses it to fix up the header already staged at the start of
    /// the buffer.
    pub fn patch_byte(&mut self, index: usize, b: u8) {
        self.buf[index] = b;
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;
    use std::collections::VecDeque;

    use super::*;

    #[test]
    fn test_empty_and_full_accounting() {
        let mut cb = CircularBuffer::new(4);
        assert!(cb.is_empty());
        assert_eq!(cb.used(), 0);
        assert_eq!(cb.free(), 4);

        assert_eq!(cb.write(b"abcd"), 4);
        assert_eq!(cb.used(), 4);
        assert_eq!(cb.free(), 0);
        assert_eq!(cb.write(b"e"), 0);

        let mut out = [0u8; 4];
        assert_eq!(cb.read(&mut out), 4);
        assert_eq!(&out, b"abcd");
        assert!(cb.is_empty());
    }

    #[test]
    fn test_wraparound_read_write() {
        let mut cb = CircularBuffer::new(4);
        assert_eq!(cb.write(b"abc"), 3);
        let mut out = [0u8; 2];
        assert_eq!(cb.read(&mut out), 2);
        // put is near the end of the backing store now; this write wraps.
        assert_eq!(cb.write(b"def"), 3);
        let mut out = [0u8; 4];
        assert_eq!(cb.read(&mut out), 4);
        assert_eq!(&out, b"cdef");
    }

    #[test]
    fn test_unread_restores_bytes() {
        let mut cb = CircularBuffer::new(8);
        cb.write(b"abcdef");
        let mut out = [0u8; 4];
        cb.read(&mut out);
        assert!(cb.unread(2));
        let mut out = [0u8; 4];
        assert_eq!(cb.read(&mut out), 4);
        assert_eq!(&out, b"cdef");
    }

    #[test]
    fn test_unread_fails_past_free_space() {
        let mut cb = CircularBuffer::new(4);
        cb.write(b"abcd");
        let mut out = [0u8; 2];
        cb.read(&mut out);
        cb.write(b"ef");
        // All free slots are occupied again; the old bytes are gone.
        assert!(!cb.unread(1));
    }

    #[test]
    fn test_peek_does_not_consume() {
        let mut cb = CircularBuffer::new(8);
        cb.write(b"xyz");
        assert_eq!(cb.peek(0), Some(b'x'));
        assert_eq!(cb.peek(2), Some(b'z'));
        assert_eq!(cb.peek(3), None);
        assert_eq!(cb.used(), 3);
    }

    #[test]
    fn test_skip() {
        let mut cb = CircularBuffer::new(8);
        cb.write(b"abcdef");
        assert_eq!(cb.skip(4), 4);
        assert_eq!(cb.peek(0), Some(b'e'));
        assert_eq!(cb.skip(10), 2);
        assert!(cb.is_empty());
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(500))]

        /// Drives the ring and a VecDeque with the same operation sequence
        /// and checks they stay byte-identical.
        #[test]
        fn test_model_equivalence(
            capacity in 1usize..64,
            ops in proptest::collection::vec(
                (0u8..4, proptest::collection::vec(any::<u8>(), 0..32)),
                0..64,
            )
        ) {
            let mut cb = CircularBuffer::new(capacity);
            let mut model: VecDeque<u8> = VecDeque::new();
            let mut recently_read: Vec<u8> = Vec::new();

            for (op, data) in ops {
                match op {
                    0 => {
                        let accepted = cb.write(&data);
                        prop_assert_eq!(accepted, data.len().min(capacity - model.len()));
                        model.extend(&data[..accepted]);
                    }
                    1 => {
                        let mut out = vec![0u8; data.len()];
                        let delivered = cb.read(&mut out);
                        prop_assert_eq!(delivered, data.len().min(model.len()));
                        let expected: Vec<u8> = model.drain(..delivered).collect();
                        prop_assert_eq!(&out[..delivered], &expected[..]);
                        recently_read.extend(expected);
                    }
                    2 => {
                        // Only roll back over bytes this test actually read;
                        // the ring itself also allows rolling into slots it
                        // never handed out, with stale contents.
                        let n = data.len();
                        if n <= recently_read.len() {
                            let ok = cb.unread(n);
                            prop_assert_eq!(ok, n <= capacity - model.len());
                            if ok {
                                let tail =
                                    recently_read.split_off(recently_read.len() - n);
                                for b in tail.into_iter().rev() {
                                    model.push_front(b);
                                }
                            }
                        }
                    }
                    _ => {
                        prop_assert_eq!(cb.used(), model.len());
                        prop_assert_eq!(cb.free(), capacity - model.len());
                        for (i, b) in model.iter().enumerate() {
                            prop_assert_eq!(cb.peek(i), Some(*b));
                        }
                    }
                }
            }
        }
    }
}
