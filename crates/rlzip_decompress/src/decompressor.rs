use crate::decoder::LzDecoder;
use crate::errors::Error;
use crate::range_decoder::RangeDecoder;
use rlzip_format::{is_valid_dictionary_size, ErrorKind, Header};

/// Streaming lzip decompressor.
///
/// Members are discovered from the stream: each `read` drives header
/// parsing, symbol decoding, and trailer verification as far as buffered
/// input allows. A fatal error latches on the handle, but `read` keeps
/// draining bytes that were already decoded before surfacing it.
pub struct Decompressor {
    rdec: RangeDecoder,
    lz: Option<Box<LzDecoder>>,
    partial_in_size: u64,
    partial_out_size: u64,
    member_header: Header,
    latched: Option<Error>,
    first_header: bool,
    seeking: bool,
}

impl Decompressor {
    pub fn new() -> Self {
        Self {
            rdec: RangeDecoder::new(),
            lz: None,
            partial_in_size: 0,
            partial_out_size: 0,
            member_header: Header::from_bytes([0; Header::SIZE]),
            latched: None,
            first_header: true,
            seeking: false,
        }
    }

    fn latch(&mut self, err: Error) -> Error {
        self.latched = Some(err.clone());
        err
    }

    /// Buffers compressed input; returns how many bytes were accepted.
    /// While re-syncing, garbage before the next valid header is discarded
    /// as it streams in.
    pub fn write(&mut self, buf: &[u8]) -> Result<usize, Error> {
        if let Some(err) = &self.latched {
            return Err(err.clone());
        }
        let mut result = self.rdec.write(buf);
        while self.seeking {
            let mut skipped = 0;
            if self.rdec.find_header(&mut skipped) {
                self.seeking = false;
            }
            self.partial_in_size += skipped;
            if result >= buf.len() {
                break;
            }
            let size2 = self.rdec.write(&buf[result..]);
            if size2 == 0 {
                break;
            }
            result += size2;
        }
        Ok(result)
    }

    /// How many bytes the next `write` can accept.
    pub fn write_size(&self) -> usize {
        if self.latched.is_some() {
            return 0;
        }
        self.rdec.free_bytes()
    }

    /// Delivers decompressed bytes. Returns 0 when more input is needed;
    /// errors are latched and re-returned once buffered output is drained.
    pub fn read(&mut self, buf: &mut [u8]) -> Result<usize, Error> {
        if let Some(err) = self.latched.clone() {
            if let Some(lz) = self.lz.as_mut() {
                if !lz.window_is_empty() {
                    return Ok(lz.read_data(buf));
                }
            }
            return Err(err);
        }
        if self.seeking {
            return Ok(0);
        }

        if self.lz.as_ref().is_some_and(|lz| lz.member_finished()) {
            let lz = self.lz.take().expect("member decoder exists");
            self.partial_out_size += lz.data_position();
        }
        if self.lz.is_none() {
            self.start_member()?;
            if self.lz.is_none() {
                return Ok(0);
            }
        }

        let decode_result = {
            let Self { lz, rdec, .. } = self;
            lz.as_mut().expect("member decoder exists").decode_member(rdec)
        };
        if let Err(err) = decode_result {
            if err.kind() == ErrorKind::UnexpectedEof {
                self.rdec.discard_buffered();
            }
            let err = self.latch(err);
            if self
                .lz
                .as_ref()
                .expect("member decoder exists")
                .window_is_empty()
            {
                return Err(err);
            }
        }
        Ok(self
            .lz
            .as_mut()
            .expect("member decoder exists")
            .read_data(buf))
    }

    /// Reads and validates the next member header, creating the member
    /// decoder. Leaves `self.lz` as `None` when more input is needed.
    fn start_member(&mut self) -> Result<(), Error> {
        self.partial_in_size += self.rdec.member_position;
        self.rdec.member_position = 0;
        if self.rdec.available_bytes() < Header::SIZE + 5 && !self.rdec.at_stream_end {
            return Ok(());
        }
        if self.rdec.finished() && !self.first_header {
            // Clean end of stream after the last member.
            return Ok(());
        }

        let mut data = [0u8; Header::SIZE];
        let rd = self.rdec.read(&mut data);
        self.member_header = Header::from_bytes(data);
        if rd < Header::SIZE || self.rdec.finished() {
            let err = if rd == 0 || self.member_header.verify_prefix(rd) {
                Error::UnexpectedEof
            } else {
                Error::BadHeader
            };
            return Err(self.latch(err));
        }
        if !self.member_header.verify_magic() {
            // Push the whole header back so the caller can inspect it.
            let err = if self.rdec.unread(Header::SIZE) {
                if self.first_header || !self.member_header.corrupt_magic() {
                    Error::BadHeader
                } else {
                    Error::CorruptHeader
                }
            } else {
                Error::Internal("failed to push back a rejected header")
            };
            return Err(self.latch(err));
        }
        if !self.member_header.verify_version() {
            let err = if self.rdec.unread(1) {
                Error::UnsupportedVersion(self.member_header.version())
            } else {
                Error::Internal("failed to push back a rejected header")
            };
            return Err(self.latch(err));
        }
        if !is_valid_dictionary_size(self.member_header.dictionary_size()) {
            let err = if self.rdec.unread(2) {
                Error::InvalidDictionarySize
            } else {
                Error::Internal("failed to push back a rejected header")
            };
            return Err(self.latch(err));
        }
        self.first_header = false;

        if self.rdec.available_bytes() < 5 {
            // The stream ended before the range decoder could be primed.
            self.rdec.discard_buffered();
            return Err(self.latch(Error::UnexpectedEof));
        }
        tracing::debug!(
            dictionary_size = self.member_header.dictionary_size(),
            "member start"
        );
        self.lz = Some(Box::new(LzDecoder::new(self.member_header.dictionary_size())));
        self.rdec.reload_pending = true;
        Ok(())
    }

    /// Marks the input as complete. While re-syncing this abandons the
    /// search and accounts the purged bytes.
    pub fn finish(&mut self) -> Result<(), Error> {
        if let Some(err) = &self.latched {
            return Err(err.clone());
        }
        if self.seeking {
            self.seeking = false;
            self.partial_in_size += self.rdec.purge();
        } else {
            self.rdec.finish();
        }
        Ok(())
    }

    /// Returns the handle to its initial state, clearing any latched error
    /// and all counters.
    pub fn reset(&mut self) {
        self.lz = None;
        self.partial_in_size = 0;
        self.partial_out_size = 0;
        self.rdec.reset();
        self.latched = None;
        self.first_header = true;
        self.seeking = false;
    }

    /// Abandons the current member (if any), clears error state, and skips
    /// buffered input until the next verifiable member header. If none is
    /// buffered yet, subsequent writes keep scanning.
    pub fn sync_to_member(&mut self) {
        self.lz = None;
        let mut skipped = 0;
        if self.rdec.find_header(&mut skipped) {
            self.seeking = false;
        } else if !self.rdec.at_stream_end {
            self.seeking = true;
        } else {
            self.seeking = false;
            self.partial_in_size += self.rdec.purge();
        }
        self.partial_in_size += skipped;
        self.latched = None;
    }

    /// Whether the whole stream was consumed and the last member verified.
    pub fn finished(&self) -> bool {
        self.latched.is_none()
            && self.rdec.finished()
            && self.lz.as_ref().map_or(true, |lz| lz.member_finished())
    }

    /// Whether the current member's trailer has been verified and its data
    /// drained.
    pub fn member_finished(&self) -> bool {
        self.lz.as_ref().is_some_and(|lz| lz.member_finished())
    }

    /// Version byte of the member being (or last) decoded.
    pub fn member_version(&self) -> u8 {
        self.member_header.version()
    }

    /// Dictionary size of the member being (or last) decoded.
    pub fn dictionary_size(&self) -> u32 {
        self.member_header.dictionary_size()
    }

    /// CRC32 of the data decoded from the current member so far.
    pub fn data_crc(&self) -> u32 {
        self.lz.as_ref().map_or(0, |lz| lz.crc())
    }

    /// Uncompressed bytes produced for the current member so far.
    pub fn data_position(&self) -> u64 {
        self.lz.as_ref().map_or(0, |lz| lz.data_position())
    }

    /// Compressed bytes consumed from the current member so far.
    pub fn member_position(&self) -> u64 {
        self.rdec.member_position
    }

    pub fn total_in_size(&self) -> u64 {
        self.partial_in_size + self.rdec.member_position
    }

    pub fn total_out_size(&self) -> u64 {
        self.partial_out_size + self.data_position()
    }

    /// The kind of the latched fatal error, if any.
    pub fn last_error(&self) -> Option<ErrorKind> {
        self.latched.as_ref().map(Error::kind)
    }
}

impl Default for Decompressor {
    fn default() -> Self {
        Self::new()
    }
}
