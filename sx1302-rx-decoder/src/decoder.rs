//! Frame decoder
//!
//! [`FrameDecoder`] pops one frame per call from an [`RxBuffer`]. Each call
//! walks the same state machine:
//!
//! ```text
//! Seeking -> HeaderRead -> LengthKnown -> ChecksumVerified -> Accepted
//!    \            \              \                \
//!     +------------+--------------+----------------+-------> Rejected
//! ```
//!
//! The frame length is not known up front: the payload length sits in the
//! head metadata and the timing metric count sits after the payload, so the
//! steps have to run in order.
//!
//! Cursor movement on rejection:
//! - sync word missing: 1 byte, so the next call looks one byte further
//! - truncated frame: none, the rest of the frame needs a new fetch
//! - checksum or range failure: the whole frame, its length being known

use crate::buffer::RxBuffer;
use crate::config::DecoderConfig;
use crate::frame::{self, head, tail, FrameLayout};
use crate::observer::{DecodeEvent, DecodeObserver, LogObserver};
use crate::types::{DecodeError, PacketRecord, Result, RssiDelta};
use crate::{bits, validate};
use byteorder::{ByteOrder, LittleEndian};
use serde::Serialize;

/// States of a single decode call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameState {
    Seeking,
    HeaderRead,
    LengthKnown,
    ChecksumVerified,
    Accepted,
    Rejected,
}

/// Counters accumulated over the lifetime of a decoder
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DecodeStats {
    pub packets_accepted: u64,
    pub sync_misses: u64,
    pub truncated: u64,
    pub checksum_errors: u64,
    pub out_of_range: u64,
    /// Bytes stepped over by rejections
    pub bytes_skipped: u64,
}

impl DecodeStats {
    /// Total number of rejected decode calls
    pub fn rejected(&self) -> u64 {
        self.sync_misses + self.truncated + self.checksum_errors + self.out_of_range
    }

    fn record(&mut self, event: &DecodeEvent) {
        match event {
            DecodeEvent::Accepted { .. } => self.packets_accepted += 1,
            DecodeEvent::Rejected { error, advanced, .. } => {
                self.bytes_skipped += *advanced as u64;
                match error {
                    DecodeError::SyncNotFound { .. } => self.sync_misses += 1,
                    DecodeError::Truncated { .. } => self.truncated += 1,
                    DecodeError::ChecksumMismatch { .. } => self.checksum_errors += 1,
                    DecodeError::OutOfRange { .. } => self.out_of_range += 1,
                    DecodeError::Exhausted | DecodeError::Transport(_) => {}
                }
            }
        }
    }
}

/// Internal step carrying the data each state has gathered
enum Step {
    Seeking,
    HeaderRead { payload_len: usize },
    LengthKnown(FrameLayout),
    ChecksumVerified(FrameLayout),
    Accepted(PacketRecord, FrameLayout),
    Rejected { error: DecodeError, advance: usize },
}

/// Terminal state of one decode call
enum Outcome {
    Accepted(PacketRecord, FrameLayout),
    Rejected { error: DecodeError, advance: usize },
}

impl Step {
    fn state(&self) -> FrameState {
        match self {
            Step::Seeking => FrameState::Seeking,
            Step::HeaderRead { .. } => FrameState::HeaderRead,
            Step::LengthKnown(_) => FrameState::LengthKnown,
            Step::ChecksumVerified(_) => FrameState::ChecksumVerified,
            Step::Accepted(..) => FrameState::Accepted,
            Step::Rejected { .. } => FrameState::Rejected,
        }
    }
}

/// Stateful decoder for RX buffer snapshots
pub struct FrameDecoder {
    config: DecoderConfig,
    stats: DecodeStats,
    observer: Box<dyn DecodeObserver>,
}

impl FrameDecoder {
    /// Create a decoder that reports events through the `log` facade
    pub fn new(config: DecoderConfig) -> Self {
        Self::with_observer(config, LogObserver)
    }

    /// Create a decoder reporting events to `observer`
    pub fn with_observer<O>(config: DecoderConfig, observer: O) -> Self
    where
        O: DecodeObserver + 'static,
    {
        Self {
            config,
            stats: DecodeStats::default(),
            observer: Box::new(observer),
        }
    }

    /// Decoder configuration
    pub fn config(&self) -> &DecoderConfig {
        &self.config
    }

    /// Counters since creation or the last [`FrameDecoder::reset_stats`]
    pub fn stats(&self) -> DecodeStats {
        self.stats
    }

    pub fn reset_stats(&mut self) {
        self.stats = DecodeStats::default();
    }

    /// Decode the frame at the buffer cursor
    ///
    /// On success the cursor moves past the frame. On failure it moves by the
    /// resync step of the error (see the module docs). Returns
    /// [`DecodeError::Exhausted`] without moving once the snapshot is consumed.
    pub fn decode_next(&mut self, buf: &mut RxBuffer) -> Result<PacketRecord> {
        if !buf.has_more() {
            log::trace!("No more data to be parsed");
            return Err(DecodeError::Exhausted);
        }

        let offset = buf.cursor();
        let (outcome, advance, event) = match self.run(buf.as_bytes(), offset) {
            Outcome::Accepted(record, layout) => {
                let event = DecodeEvent::Accepted {
                    offset,
                    frame_len: layout.frame_len(),
                    modem_id: record.modem_id,
                    modem_class: record.modem_class,
                    channel: record.channel,
                    payload_len: record.payload.len(),
                };
                (Ok(record), layout.frame_len(), event)
            }
            Outcome::Rejected { error, advance } => {
                let event = DecodeEvent::Rejected {
                    offset,
                    error: error.clone(),
                    advanced: advance,
                };
                (Err(error), advance, event)
            }
        };

        buf.advance(advance);
        self.stats.record(&event);
        self.observer.on_event(&event);
        outcome
    }

    /// Iterate over decode results until the snapshot is consumed
    ///
    /// The iterator also stops after yielding a `Truncated` error, since the
    /// cursor cannot move past an incomplete frame.
    pub fn packets<'a>(&'a mut self, buf: &'a mut RxBuffer) -> Packets<'a> {
        Packets {
            decoder: self,
            buffer: buf,
            done: false,
        }
    }

    fn run(&self, bytes: &[u8], offset: usize) -> Outcome {
        let mut step = Step::Seeking;
        loop {
            log::trace!("offset {}: {:?}", offset, step.state());
            step = match step {
                Step::Seeking => seek(bytes, offset),
                Step::HeaderRead { payload_len } => probe_length(bytes, offset, payload_len),
                Step::LengthKnown(layout) => verify_checksum(bytes, layout),
                Step::ChecksumVerified(layout) => self.accept(bytes, layout),
                Step::Accepted(record, layout) => return Outcome::Accepted(record, layout),
                Step::Rejected { error, advance } => return Outcome::Rejected { error, advance },
            };
        }
    }

    fn accept(&self, bytes: &[u8], layout: FrameLayout) -> Step {
        let mut record = extract_metadata(bytes, &layout);

        match validate::check_metadata(&record, &self.config) {
            Ok(class) => record.modem_class = class,
            Err(violation) => {
                return Step::Rejected {
                    error: DecodeError::OutOfRange {
                        offset: layout.offset,
                        violation,
                    },
                    advance: layout.frame_len(),
                };
            }
        }

        let payload_start = layout.payload_start();
        record.payload = bytes[payload_start..payload_start + layout.payload_len].to_vec();
        let ts_start = layout.ts_metrics_start();
        record.ts_metrics = bytes[ts_start..ts_start + frame::TS_METRIC_LEN * layout.num_ts_metrics].to_vec();

        Step::Accepted(record, layout)
    }
}

fn truncated(offset: usize, needed: usize, bytes: &[u8]) -> Step {
    Step::Rejected {
        error: DecodeError::Truncated {
            offset,
            needed,
            available: bytes.len() - offset,
        },
        advance: 0,
    }
}

fn seek(bytes: &[u8], offset: usize) -> Step {
    if !frame::is_sync_at(bytes, offset) {
        return Step::Rejected {
            error: DecodeError::SyncNotFound { offset },
            advance: 1,
        };
    }
    if offset + frame::HEAD_METADATA_LEN > bytes.len() {
        return truncated(offset, frame::HEAD_METADATA_LEN, bytes);
    }

    log::trace!("pkt syncword found at index {}", offset);
    Step::HeaderRead {
        payload_len: frame::payload_len_at(bytes, offset),
    }
}

fn probe_length(bytes: &[u8], offset: usize, payload_len: usize) -> Step {
    let needed = frame::num_ts_metrics_needed(payload_len);
    if offset + needed > bytes.len() {
        return truncated(offset, needed, bytes);
    }

    Step::LengthKnown(FrameLayout {
        offset,
        payload_len,
        num_ts_metrics: frame::num_ts_metrics_at(bytes, offset, payload_len),
    })
}

fn verify_checksum(bytes: &[u8], layout: FrameLayout) -> Step {
    if layout.offset + layout.frame_len() > bytes.len() {
        return truncated(layout.offset, layout.frame_len(), bytes);
    }

    let received = bytes[layout.checksum_offset()];
    let computed = frame::checksum(&bytes[layout.offset..layout.checksum_offset()]);
    if received != computed {
        return Step::Rejected {
            error: DecodeError::ChecksumMismatch {
                offset: layout.offset,
                received,
                computed,
            },
            advance: layout.frame_len(),
        };
    }

    log::trace!("Packet checksum OK (0x{:02X})", received);
    Step::ChecksumVerified(layout)
}

/// Pull every metadata field of a checksum-verified frame
///
/// The payload and timing metrics are left empty; they are copied only once
/// the metadata passed validation.
fn extract_metadata(bytes: &[u8], layout: &FrameLayout) -> PacketRecord {
    let h = layout.offset;
    let t = layout.tail_start();

    let freq_offset = (bits::take_bits(bytes, h + head::FREQ_OFFSET_19_16, 0, 4) << 16)
        | (bits::take_bits(bytes, h + head::FREQ_OFFSET_15_8, 0, 8) << 8)
        | bits::take_bits(bytes, h + head::FREQ_OFFSET_7_0, 0, 8);

    PacketRecord {
        modem_id: bits::take_byte(bytes, h + head::MODEM_ID),
        channel: bits::take_byte(bytes, h + head::CHANNEL),
        crc_enabled: bits::take_flag(bytes, h + head::RATE_FLAGS, 0),
        coding_rate: bits::take_bits(bytes, h + head::RATE_FLAGS, 1, 3) as u8,
        datarate: bits::take_bits(bytes, h + head::RATE_FLAGS, 4, 4) as u8,
        frequency_offset_error: bits::sign_extend(freq_offset, 20),
        crc_error: bits::take_flag(bytes, t + tail::STATUS, 0),
        sync_error: bits::take_flag(bytes, t + tail::STATUS, 2),
        header_error: bits::take_flag(bytes, t + tail::STATUS, 3),
        timing_set: bits::take_flag(bytes, t + tail::STATUS, 4),
        snr_average: bits::take_byte(bytes, t + tail::SNR_AVG) as i8,
        rssi_chan_avg: bits::take_byte(bytes, t + tail::RSSI_CHAN),
        rssi_signal_avg: bits::take_byte(bytes, t + tail::RSSI_SIG),
        rssi_chan_delta: RssiDelta {
            max_neg: bits::take_bits(bytes, t + tail::RSSI_CHAN_DELTA, 0, 4) as u8,
            max_pos: bits::take_bits(bytes, t + tail::RSSI_CHAN_DELTA, 4, 4) as u8,
        },
        rssi_signal_delta: RssiDelta {
            max_neg: bits::take_bits(bytes, t + tail::RSSI_SIG_DELTA, 0, 4) as u8,
            max_pos: bits::take_bits(bytes, t + tail::RSSI_SIG_DELTA, 4, 4) as u8,
        },
        timestamp_cnt: LittleEndian::read_u32(&bytes[t + tail::TIMESTAMP..t + tail::TIMESTAMP + 4]),
        rx_crc16: LittleEndian::read_u16(&bytes[t + tail::CRC_PAYLOAD..t + tail::CRC_PAYLOAD + 2]),
        num_ts_metrics: layout.num_ts_metrics as u8,
        ..Default::default()
    }
}

/// Iterator returned by [`FrameDecoder::packets`]
pub struct Packets<'a> {
    decoder: &'a mut FrameDecoder,
    buffer: &'a mut RxBuffer,
    done: bool,
}

impl Iterator for Packets<'_> {
    type Item = Result<PacketRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        match self.decoder.decode_next(self.buffer) {
            Err(DecodeError::Exhausted) => {
                self.done = true;
                None
            }
            Err(err @ DecodeError::Truncated { .. }) => {
                self.done = true;
                Some(Err(err))
            }
            other => Some(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encode::FrameBuilder;
    use crate::types::{ErrorKind, ModemClass, RangeViolation};
    use std::cell::RefCell;
    use std::rc::Rc;

    fn decoder() -> FrameDecoder {
        FrameDecoder::new(DecoderConfig::default())
    }

    fn loaded(bytes: &[u8]) -> RxBuffer {
        let mut buf = RxBuffer::default();
        buf.install(bytes).unwrap();
        buf
    }

    #[test]
    fn test_decode_single_frame() {
        let bytes = FrameBuilder::new(b"payload")
            .modem_id(2)
            .channel(4)
            .coding_rate(3)
            .datarate(9)
            .frequency_offset(-1234)
            .status(true, false, true)
            .timing_set(true)
            .snr(-12)
            .rssi(0x55, 0x60)
            .rssi_deltas(RssiDelta { max_neg: 2, max_pos: 7 }, RssiDelta { max_neg: 15, max_pos: 0 })
            .timestamp(0xDEAD_BEEF)
            .crc16(0xBEEF)
            .ts_metrics(&[0x11, 0x22, 0x33, 0x44])
            .build();
        let mut buf = loaded(&bytes);
        let mut dec = decoder();

        let record = dec.decode_next(&mut buf).unwrap();
        assert_eq!(record.payload, b"payload");
        assert_eq!(record.modem_id, 2);
        assert_eq!(record.modem_class, ModemClass::LoraMultiSf);
        assert_eq!(record.channel, 4);
        assert!(record.crc_enabled);
        assert_eq!(record.coding_rate, 3);
        assert_eq!(record.datarate, 9);
        assert_eq!(record.frequency_offset_error, -1234);
        assert!(record.crc_error);
        assert!(!record.sync_error);
        assert!(record.header_error);
        assert!(record.timing_set);
        assert!(record.has_modem_error());
        assert_eq!(record.snr_average, -12);
        assert_eq!(record.rssi_chan_avg, 0x55);
        assert_eq!(record.rssi_signal_avg, 0x60);
        assert_eq!(record.rssi_chan_delta, RssiDelta { max_neg: 2, max_pos: 7 });
        assert_eq!(record.rssi_signal_delta, RssiDelta { max_neg: 15, max_pos: 0 });
        assert_eq!(record.timestamp_cnt, 0xDEAD_BEEF);
        assert_eq!(record.rx_crc16, 0xBEEF);
        assert_eq!(record.num_ts_metrics, 2);
        assert_eq!(record.ts_metrics, vec![0x11, 0x22, 0x33, 0x44]);

        assert_eq!(buf.cursor(), bytes.len());
        assert!(!buf.has_more());
        assert_eq!(dec.decode_next(&mut buf), Err(DecodeError::Exhausted));
        assert_eq!(dec.stats().packets_accepted, 1);
    }

    #[test]
    fn test_sync_miss_advances_one_byte() {
        let mut bytes = vec![0x00, 0x13];
        bytes.extend(FrameBuilder::new(b"x").build());
        let mut buf = loaded(&bytes);
        let mut dec = decoder();

        assert_eq!(dec.decode_next(&mut buf), Err(DecodeError::SyncNotFound { offset: 0 }));
        assert_eq!(buf.cursor(), 1);
        assert_eq!(dec.decode_next(&mut buf), Err(DecodeError::SyncNotFound { offset: 1 }));
        assert_eq!(buf.cursor(), 2);
        assert_eq!(dec.decode_next(&mut buf).unwrap().payload, b"x");

        let stats = dec.stats();
        assert_eq!(stats.sync_misses, 2);
        assert_eq!(stats.bytes_skipped, 2);
    }

    #[test]
    fn test_half_sync_word_at_end_is_skipped() {
        let mut buf = loaded(&[0x00, 0xA5]);
        let mut dec = decoder();
        assert_eq!(dec.decode_next(&mut buf), Err(DecodeError::SyncNotFound { offset: 0 }));
        assert_eq!(dec.decode_next(&mut buf), Err(DecodeError::SyncNotFound { offset: 1 }));
        assert!(!buf.has_more());
        assert_eq!(dec.decode_next(&mut buf), Err(DecodeError::Exhausted));
    }

    #[test]
    fn test_has_more_loop_ends_after_trailing_sync_byte() {
        let mut snapshot = FrameBuilder::new(b"ok").build();
        snapshot.push(0xA5);
        let mut buf = loaded(&snapshot);
        let mut dec = decoder();

        let mut results = Vec::new();
        for _ in 0..snapshot.len() {
            if !buf.has_more() {
                break;
            }
            results.push(dec.decode_next(&mut buf));
        }
        assert!(!buf.has_more());
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].as_ref().unwrap().payload, b"ok");
        assert_eq!(
            results[1],
            Err(DecodeError::SyncNotFound { offset: snapshot.len() - 1 })
        );
    }

    #[test]
    fn test_lone_garbage_byte_at_end_is_skipped() {
        let mut buf = loaded(&[0x42]);
        let mut dec = decoder();
        assert_eq!(dec.decode_next(&mut buf), Err(DecodeError::SyncNotFound { offset: 0 }));
        assert!(!buf.has_more());
    }

    #[test]
    fn test_truncated_head() {
        let bytes = FrameBuilder::new(b"abc").build();
        let mut buf = loaded(&bytes[..5]);
        let mut dec = decoder();
        assert_eq!(
            dec.decode_next(&mut buf),
            Err(DecodeError::Truncated {
                offset: 0,
                needed: 9,
                available: 5
            })
        );
        assert_eq!(buf.cursor(), 0);
    }

    #[test]
    fn test_truncated_before_metric_count() {
        let bytes = FrameBuilder::new(b"abc").build();
        // Head and payload present, tail cut before the metric count
        let mut buf = loaded(&bytes[..9 + 3 + 5]);
        let mut dec = decoder();
        assert_eq!(
            dec.decode_next(&mut buf),
            Err(DecodeError::Truncated {
                offset: 0,
                needed: 9 + 3 + 13,
                available: 17
            })
        );
        assert_eq!(buf.cursor(), 0);
    }

    #[test]
    fn test_checksum_mismatch_skips_frame() {
        let mut first = FrameBuilder::new(b"abcd").build();
        first[10] ^= 0xFF;
        let first_len = first.len();
        let mut bytes = first;
        bytes.extend(FrameBuilder::new(b"next").build());

        let mut buf = loaded(&bytes);
        let mut dec = decoder();
        let err = dec.decode_next(&mut buf).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ChecksumMismatch);
        assert_eq!(buf.cursor(), first_len);
        assert_eq!(dec.decode_next(&mut buf).unwrap().payload, b"next");
        assert_eq!(dec.stats().checksum_errors, 1);
    }

    #[test]
    fn test_out_of_range_skips_frame() {
        let bytes = FrameBuilder::new(b"abc").datarate(13).build();
        let mut buf = loaded(&bytes);
        let mut dec = decoder();
        assert_eq!(
            dec.decode_next(&mut buf),
            Err(DecodeError::OutOfRange {
                offset: 0,
                violation: RangeViolation::SpreadingFactor { datarate: 13 }
            })
        );
        assert_eq!(buf.cursor(), bytes.len());
        assert_eq!(dec.stats().out_of_range, 1);
    }

    #[test]
    fn test_fsk_record_accepted_without_bounds() {
        let bytes = FrameBuilder::new(b"fsk").modem_id(13).channel(42).datarate(0).build();
        let mut buf = loaded(&bytes);
        let record = decoder().decode_next(&mut buf).unwrap();
        assert_eq!(record.modem_class, ModemClass::Fsk);
        assert_eq!(record.channel, 42);
    }

    #[test]
    fn test_frequency_offset_sign_extension() {
        let mut dec = decoder();
        for (raw, expected) in [(0x80000u32, -524_288i32), (0x00010, 16), (0xFFFFF, -1), (0x7FFFF, 524_287)] {
            let mut buf = loaded(&FrameBuilder::new(&[]).raw_frequency_offset(raw).build());
            let record = dec.decode_next(&mut buf).unwrap();
            assert_eq!(record.frequency_offset_error, expected, "raw 0x{:05X}", raw);
        }
    }

    #[test]
    fn test_packets_iterator_stops_on_truncated() {
        let mut bytes = FrameBuilder::new(b"one").build();
        bytes.push(0x00);
        let second = FrameBuilder::new(b"two").build();
        bytes.extend_from_slice(&second[..second.len() - 3]);

        let mut buf = loaded(&bytes);
        let mut dec = decoder();
        let results: Vec<_> = dec.packets(&mut buf).collect();
        assert_eq!(results.len(), 3);
        assert_eq!(results[0].as_ref().unwrap().payload, b"one");
        assert_eq!(results[1].as_ref().unwrap_err().kind(), ErrorKind::SyncNotFound);
        assert_eq!(results[2].as_ref().unwrap_err().kind(), ErrorKind::Truncated);
        assert!(buf.has_more());
    }

    #[test]
    fn test_observer_sees_every_call() {
        let events = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&events);
        let mut dec = FrameDecoder::with_observer(DecoderConfig::default(), move |event: &DecodeEvent| {
            sink.borrow_mut().push(event.clone());
        });

        let mut bytes = vec![0xFF];
        bytes.extend(FrameBuilder::new(b"ok").channel(1).build());
        let mut buf = loaded(&bytes);
        let accepted = dec.packets(&mut buf).filter_map(|r| r.ok()).count();
        assert_eq!(accepted, 1);

        let events = events.borrow();
        assert_eq!(events.len(), 2);
        assert_eq!(
            events[0],
            DecodeEvent::Rejected {
                offset: 0,
                error: DecodeError::SyncNotFound { offset: 0 },
                advanced: 1
            }
        );
        assert!(matches!(
            events[1],
            DecodeEvent::Accepted {
                offset: 1,
                channel: 1,
                payload_len: 2,
                ..
            }
        ));
    }

    #[test]
    fn test_reset_stats() {
        let mut dec = decoder();
        let mut buf = loaded(&[0x00]);
        let _ = dec.decode_next(&mut buf);
        assert_eq!(dec.stats().rejected(), 1);
        dec.reset_stats();
        assert_eq!(dec.stats(), DecodeStats::default());
    }
}
