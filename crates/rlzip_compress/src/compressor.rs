use crate::encoder::Encoder;
use crate::encoder_base::EncoderBase;
use crate::errors::Error;
use crate::fast_encoder::FastEncoder;
use rlzip_format::{ErrorKind, Header, Level, MIN_DICTIONARY_SIZE};
use rlzip_model::{MAX_MATCH_LEN, MIN_MATCH_LEN_LIMIT};

/// The two encoder bodies behind one handle. Level 0's geometry
/// (64 KiB − 1 dictionary, match length limit 16) selects the greedy fast
/// encoder; everything else runs the optimizing one.
enum Engine {
    Normal(Box<Encoder>),
    Fast(Box<FastEncoder>),
}

impl Engine {
    fn base(&self) -> &EncoderBase {
        match self {
            Self::Normal(e) => &e.eb,
            Self::Fast(e) => &e.eb,
        }
    }

    fn base_mut(&mut self) -> &mut EncoderBase {
        match self {
            Self::Normal(e) => &mut e.eb,
            Self::Fast(e) => &mut e.eb,
        }
    }

    fn encode_member(&mut self) -> Result<(), Error> {
        match self {
            Self::Normal(e) => e.encode_member(),
            Self::Fast(e) => e.encode_member(),
        }
    }

    fn reset(&mut self, member_size: u64) {
        match self {
            Self::Normal(e) => e.reset(member_size),
            Self::Fast(e) => e.reset(member_size),
        }
    }
}

/// Streaming lzip compressor.
///
/// Feed input with [`write`](Self::write), drain output with
/// [`read`](Self::read); both return promptly with whatever fits. The codec
/// makes progress inside `read` whenever enough input and output room are
/// available. A fatal error poisons the handle; it is returned from every
/// subsequent call.
pub struct Compressor {
    engine: Engine,
    partial_in_size: u64,
    partial_out_size: u64,
    latched: Option<Error>,
}

impl Compressor {
    /// Opens an encoder producing members of at most `member_size` bytes
    /// (capped at 2^51), with the given dictionary size (rounded up to the
    /// nearest representable value) and match length limit.
    pub fn new(
        dictionary_size: u32,
        match_len_limit: usize,
        member_size: u64,
    ) -> Result<Self, Error> {
        let header = Header::new(dictionary_size)
            .map_err(|_| Error::InvalidDictionarySize(dictionary_size))?;
        if !(MIN_MATCH_LEN_LIMIT..=MAX_MATCH_LEN).contains(&match_len_limit) {
            return Err(Error::InvalidMatchLenLimit(match_len_limit));
        }
        if member_size < u64::from(MIN_DICTIONARY_SIZE) {
            return Err(Error::InvalidMemberSize(member_size));
        }

        let engine = if dictionary_size == 65_535 && match_len_limit == 16 {
            Engine::Fast(Box::new(FastEncoder::new(member_size)?))
        } else {
            Engine::Normal(Box::new(Encoder::new(
                header.dictionary_size(),
                match_len_limit,
                member_size,
            )?))
        };
        Ok(Self {
            engine,
            partial_in_size: 0,
            partial_out_size: 0,
            latched: None,
        })
    }

    /// Opens an encoder with one of the documented presets.
    pub fn from_level(level: Level, member_size: u64) -> Result<Self, Error> {
        Self::new(level.dictionary_size(), level.match_len_limit(), member_size)
    }

    /// Buffers input bytes; returns how many were accepted.
    pub fn write(&mut self, buf: &[u8]) -> Result<usize, Error> {
        if let Some(err) = &self.latched {
            return Err(err.clone());
        }
        Ok(self.engine.base_mut().mb.write(buf))
    }

    /// How many bytes the next `write` can accept.
    pub fn write_size(&self) -> usize {
        if self.latched.is_some() {
            return 0;
        }
        self.engine.base().mb.free_bytes()
    }

    /// Drains compressed bytes, advancing the encoder as input and output
    /// room allow.
    pub fn read(&mut self, buf: &mut [u8]) -> Result<usize, Error> {
        if let Some(err) = &self.latched {
            return Err(err.clone());
        }
        let mut out = self.engine.base_mut().renc.read(buf);
        if out < buf.len() || buf.is_empty() {
            if let Err(err) = self.engine.encode_member() {
                self.latched = Some(err.clone());
                return Err(err);
            }
            let base = self.engine.base_mut();
            if base.mb.sync_flush_pending && base.mb.available_bytes() == 0 {
                base.try_sync_flush();
            }
            out += base.renc.read(&mut buf[out..]);
        }
        Ok(out)
    }

    /// Marks the input as complete; the current member is closed as soon as
    /// the remaining data is encoded and drained.
    pub fn finish(&mut self) -> Result<(), Error> {
        if let Some(err) = &self.latched {
            return Err(err.clone());
        }
        let base = self.engine.base_mut();
        base.mb.finish();
        // A member with no data encoded yet still has its header staged
        // unread; shrink the advertised dictionary to fit what it will hold.
        if base.mb.data_position() == 0
            && base.renc.member_position() == Header::SIZE as u64
        {
            base.mb.adjust_dictionary_size();
            base.renc
                .fix_header_dictionary_size(base.mb.dictionary_size as u32);
        }
        Ok(())
    }

    /// Requests the decoder-visible byte-aligned flush of all input written
    /// so far.
    pub fn sync_flush(&mut self) -> Result<(), Error> {
        if let Some(err) = &self.latched {
            return Err(err.clone());
        }
        let base = self.engine.base_mut();
        if !base.mb.at_stream_end {
            base.mb.sync_flush_pending = true;
        }
        Ok(())
    }

    /// Begins a new member of at most `member_size` bytes. The previous
    /// member must be finished and fully drained; input bytes written but
    /// not yet encoded carry over.
    pub fn restart_member(&mut self, member_size: u64) -> Result<(), Error> {
        if let Some(err) = &self.latched {
            return Err(err.clone());
        }
        if !self.engine.base().member_finished() {
            return Err(Error::MemberNotFinished);
        }
        if member_size < u64::from(MIN_DICTIONARY_SIZE) {
            return Err(Error::InvalidMemberSize(member_size));
        }
        self.partial_in_size += self.engine.base().mb.data_position();
        self.partial_out_size += self.engine.base().renc.member_position();
        self.engine.reset(member_size);
        Ok(())
    }

    /// Whether all input has been encoded and all output drained.
    pub fn finished(&self) -> bool {
        self.latched.is_none()
            && self.engine.base().mb.data_finished()
            && self.engine.base().member_finished()
    }

    /// Whether the current member's trailer has been emitted and drained.
    pub fn member_finished(&self) -> bool {
        self.engine.base().member_finished()
    }

    /// Uncompressed bytes encoded into the current member so far.
    pub fn data_position(&self) -> u64 {
        self.engine.base().mb.data_position()
    }

    /// Compressed bytes produced for the current member so far.
    pub fn member_position(&self) -> u64 {
        self.engine.base().renc.member_position()
    }

    pub fn total_in_size(&self) -> u64 {
        self.partial_in_size + self.data_position()
    }

    pub fn total_out_size(&self) -> u64 {
        self.partial_out_size + self.member_position()
    }

    /// The kind of the latched fatal error, if any.
    pub fn last_error(&self) -> Option<ErrorKind> {
        self.latched.as_ref().map(Error::kind)
    }
}
