use crate::prelude::*;
use crate::range_decoder::RangeDecoder;
use crate::window::Window;
use rlzip_format::Trailer;
use rlzip_model::POS_STATES;

/// Decoder for one member's LZMA stream: consumes symbols from the range
/// decoder, maintains the dictionary window, and verifies the trailer once
/// the end-of-stream marker arrives.
pub(crate) struct LzDecoder {
    window: Window,
    dictionary_size: u32,
    member_finished: bool,
    verify_trailer_pending: bool,
    rep0: u32,
    rep1: u32,
    rep2: u32,
    rep3: u32,
    state: State,

    bm_literal: [[BitModel; 0x300]; 1 << 3],
    bm_match: [[BitModel; POS_STATES]; STATES],
    bm_rep: [BitModel; STATES],
    bm_rep0: [BitModel; STATES],
    bm_rep1: [BitModel; STATES],
    bm_rep2: [BitModel; STATES],
    bm_len: [[BitModel; POS_STATES]; STATES],
    bm_dis_slot: [[BitModel; 1 << DIS_SLOT_BITS]; LEN_STATES],
    bm_dis: [BitModel; (MODELED_DISTANCES - END_DIS_MODEL + 1) as usize],
    bm_align: [BitModel; DIS_ALIGN_SIZE],
    match_len_model: LenModel,
    rep_len_model: LenModel,
}

impl LzDecoder {
    pub fn new(dictionary_size: u32) -> Self {
        Self {
            window: Window::new(dictionary_size),
            dictionary_size,
            member_finished: false,
            verify_trailer_pending: false,
            rep0: 0,
            rep1: 0,
            rep2: 0,
            rep3: 0,
            state: State::new(),
            bm_literal: [[BitModel::new(); 0x300]; 1 << 3],
            bm_match: [[BitModel::new(); POS_STATES]; STATES],
            bm_rep: [BitModel::new(); STATES],
            bm_rep0: [BitModel::new(); STATES],
            bm_rep1: [BitModel::new(); STATES],
            bm_rep2: [BitModel::new(); STATES],
            bm_len: [[BitModel::new(); POS_STATES]; STATES],
            bm_dis_slot: [[BitModel::new(); 1 << DIS_SLOT_BITS]; LEN_STATES],
            bm_dis: [BitModel::new();
                (MODELED_DISTANCES - END_DIS_MODEL + 1) as usize],
            bm_align: [BitModel::new(); DIS_ALIGN_SIZE],
            match_len_model: LenModel::new(),
            rep_len_model: LenModel::new(),
        }
    }

    pub fn member_finished(&self) -> bool {
        self.member_finished && self.window.is_empty()
    }

    pub fn window_is_empty(&self) -> bool {
        self.window.is_empty()
    }

    pub fn crc(&self) -> u32 {
        self.window.crc()
    }

    pub fn data_position(&self) -> u64 {
        self.window.data_position()
    }

    pub fn read_data(&mut self, out: &mut [u8]) -> usize {
        self.window.read(out)
    }

    fn try_verify_trailer(&mut self, rdec: &mut RangeDecoder) -> Result<(), Error> {
        if rdec.available_bytes() < Trailer::SIZE {
            if !rdec.at_stream_end {
                // Keep the pending flag latched; more input may arrive.
                return Ok(());
            }
            return Err(Error::UnexpectedEof);
        }
        self.verify_trailer_pending = false;
        self.member_finished = true;

        let mut data = [0u8; Trailer::SIZE];
        rdec.read(&mut data);
        let trailer = Trailer::from_bytes(data);
        if trailer.data_crc() != self.crc() {
            return Err(Error::CrcMismatch {
                stored: trailer.data_crc(),
                computed: self.crc(),
            });
        }
        if trailer.data_size() != self.data_position() {
            return Err(Error::DataSizeMismatch {
                stored: trailer.data_size(),
                computed: self.data_position(),
            });
        }
        if trailer.member_size() != rdec.member_position {
            return Err(Error::MemberSizeMismatch {
                stored: trailer.member_size(),
                computed: rdec.member_position,
            });
        }
        tracing::debug!(
            data_size = trailer.data_size(),
            member_size = trailer.member_size(),
            "member verified"
        );
        Ok(())
    }

    /// Decodes as much of the member as input and window space allow.
    /// Returning `Ok` means "no error so far": either progress stalled
    /// (call again after more I/O) or the member finished. Errors are
    /// terminal for the member.
    pub fn decode_member(&mut self, rdec: &mut RangeDecoder) -> Result<(), Error> {
        if self.member_finished {
            return Ok(());
        }
        if !rdec.try_reload() {
            if !rdec.at_stream_end {
                return Ok(());
            }
            return Err(Error::UnexpectedEof);
        }
        if self.verify_trailer_pending {
            return self.try_verify_trailer(rdec);
        }

        while !rdec.finished() {
            let pos_state = pos_state(self.window.data_position());
            if !rdec.enough_available_bytes() {
                if !rdec.at_stream_end {
                    return Ok(());
                }
                if rdec.is_empty() {
                    break;
                }
            }
            if !self.window.enough_free() {
                return Ok(());
            }

            let st = self.state.index();
            if rdec.decode_bit(&mut self.bm_match[st][pos_state]) == 0 {
                // literal
                let bm = &mut self.bm_literal[lit_state(self.window.peek_prev())];
                let byte = if self.state.is_char() {
                    rdec.decode_tree(bm, 8) as u8
                } else {
                    rdec.decode_matched(bm, self.window.peek(self.rep0))
                };
                self.state = self.state.set_char();
                self.window.put_byte(byte);
                continue;
            }

            let len;
            if rdec.decode_bit(&mut self.bm_rep[st]) != 0 {
                // repeated match
                if rdec.decode_bit(&mut self.bm_rep0[st]) == 0 {
                    if rdec.decode_bit(&mut self.bm_len[st][pos_state]) == 0 {
                        self.state = self.state.set_short_rep();
                        let byte = self.window.peek(self.rep0);
                        self.window.put_byte(byte);
                        continue;
                    }
                } else {
                    let distance;
                    if rdec.decode_bit(&mut self.bm_rep1[st]) == 0 {
                        distance = self.rep1;
                    } else {
                        if rdec.decode_bit(&mut self.bm_rep2[st]) == 0 {
                            distance = self.rep2;
                        } else {
                            distance = self.rep3;
                            self.rep3 = self.rep2;
                        }
                        self.rep2 = self.rep1;
                    }
                    self.rep1 = self.rep0;
                    self.rep0 = distance;
                }
                self.state = self.state.set_rep();
                len = MIN_MATCH_LEN
                    + rdec.decode_len(&mut self.rep_len_model, pos_state);
            } else {
                // normal match
                len = MIN_MATCH_LEN
                    + rdec.decode_len(&mut self.match_len_model, pos_state);
                let slot =
                    rdec.decode_tree(&mut self.bm_dis_slot[len_state(len)], 6);
                let mut distance = slot;
                if distance >= START_DIS_MODEL {
                    let dis_slot = distance;
                    let direct_bits = (dis_slot >> 1) - 1;
                    distance = (2 | (dis_slot & 1)) << direct_bits;
                    if dis_slot < END_DIS_MODEL {
                        distance += rdec.decode_tree_reversed(
                            &mut self.bm_dis[(distance - dis_slot) as usize..],
                            direct_bits,
                        );
                    } else {
                        distance +=
                            rdec.decode(direct_bits - DIS_ALIGN_BITS) << DIS_ALIGN_BITS;
                        distance +=
                            rdec.decode_tree_reversed(&mut self.bm_align, DIS_ALIGN_BITS);
                        if distance == 0xFFFF_FFFF {
                            // marker, not a real match
                            rdec.normalize();
                            if len == MIN_MATCH_LEN {
                                self.verify_trailer_pending = true;
                                return self.try_verify_trailer(rdec);
                            }
                            if len == MIN_MATCH_LEN + 1 {
                                tracing::debug!("sync-flush marker");
                                rdec.reload_pending = true;
                                if rdec.try_reload() {
                                    continue;
                                }
                                if !rdec.at_stream_end {
                                    return Ok(());
                                }
                                break;
                            }
                            return Err(Error::UnknownMarker(len));
                        }
                    }
                }
                self.rep3 = self.rep2;
                self.rep2 = self.rep1;
                self.rep1 = self.rep0;
                self.rep0 = distance;
                self.state = self.state.set_match();
                if !self.window.distance_is_valid(self.rep0) {
                    return Err(Error::DistanceOutOfRange(self.rep0));
                }
            }
            self.window.copy_match(self.rep0, len);
        }
        Err(Error::UnexpectedEof)
    }
}
