//! Frame encoder
//!
//! Builds RX buffer frames the way the concentrator writes them. Used to
//! synthesise captures for replay and to drive the decoder in tests.

use crate::frame::{head, tail, HEAD_METADATA_LEN, MAX_PAYLOAD_LEN, SYNC_WORD, TAIL_METADATA_LEN};
use crate::types::{PacketRecord, RssiDelta};

/// Builder for one wire frame
///
/// Defaults describe a plain LoRa packet: modem 0, channel 0, SF7, CR 4/5,
/// CRC enabled, no timing metrics.
#[derive(Debug, Clone)]
pub struct FrameBuilder {
    record: PacketRecord,
    raw_freq_offset: u32,
}

impl FrameBuilder {
    /// Start a frame carrying `payload` (at most 255 bytes are kept)
    pub fn new(payload: &[u8]) -> Self {
        let payload = payload[..payload.len().min(MAX_PAYLOAD_LEN)].to_vec();
        Self {
            record: PacketRecord {
                crc_enabled: true,
                coding_rate: 1,
                datarate: 7,
                payload,
                ..Default::default()
            },
            raw_freq_offset: 0,
        }
    }

    /// Start from the fields of an existing record
    pub fn from_record(record: &PacketRecord) -> Self {
        let mut builder = Self::new(&record.payload);
        builder.record = PacketRecord {
            payload: builder.record.payload,
            ..record.clone()
        };
        builder.raw_freq_offset = record.frequency_offset_error as u32;
        builder.ts_metrics(&record.ts_metrics)
    }

    pub fn modem_id(mut self, modem_id: u8) -> Self {
        self.record.modem_id = modem_id;
        self
    }

    pub fn channel(mut self, channel: u8) -> Self {
        self.record.channel = channel;
        self
    }

    pub fn crc_enabled(mut self, enabled: bool) -> Self {
        self.record.crc_enabled = enabled;
        self
    }

    /// Coding rate code, 3 bits
    pub fn coding_rate(mut self, coding_rate: u8) -> Self {
        self.record.coding_rate = coding_rate & 0x07;
        self
    }

    /// Datarate / spreading factor code, 4 bits
    pub fn datarate(mut self, datarate: u8) -> Self {
        self.record.datarate = datarate & 0x0F;
        self
    }

    /// Signed frequency offset, stored on 20 bits
    pub fn frequency_offset(mut self, offset: i32) -> Self {
        self.raw_freq_offset = offset as u32;
        self
    }

    /// Raw 20-bit frequency offset field, as the chip writes it
    pub fn raw_frequency_offset(mut self, raw: u32) -> Self {
        self.raw_freq_offset = raw;
        self
    }

    pub fn status(mut self, crc_error: bool, sync_error: bool, header_error: bool) -> Self {
        self.record.crc_error = crc_error;
        self.record.sync_error = sync_error;
        self.record.header_error = header_error;
        self
    }

    pub fn timing_set(mut self, timing_set: bool) -> Self {
        self.record.timing_set = timing_set;
        self
    }

    pub fn snr(mut self, snr: i8) -> Self {
        self.record.snr_average = snr;
        self
    }

    pub fn rssi(mut self, chan_avg: u8, signal_avg: u8) -> Self {
        self.record.rssi_chan_avg = chan_avg;
        self.record.rssi_signal_avg = signal_avg;
        self
    }

    /// RSSI deltas, each value keeps its low nibble
    pub fn rssi_deltas(mut self, chan: RssiDelta, signal: RssiDelta) -> Self {
        self.record.rssi_chan_delta = chan;
        self.record.rssi_signal_delta = signal;
        self
    }

    pub fn timestamp(mut self, timestamp_cnt: u32) -> Self {
        self.record.timestamp_cnt = timestamp_cnt;
        self
    }

    pub fn crc16(mut self, crc: u16) -> Self {
        self.record.rx_crc16 = crc;
        self
    }

    /// Fine timing metric bytes; a trailing odd byte is dropped and at most
    /// 255 entries are kept
    pub fn ts_metrics(mut self, bytes: &[u8]) -> Self {
        let entries = (bytes.len() / 2).min(u8::MAX as usize);
        self.record.num_ts_metrics = entries as u8;
        self.record.ts_metrics = bytes[..entries * 2].to_vec();
        self
    }

    /// Encode the frame, checksum included
    pub fn build(&self) -> Vec<u8> {
        let r = &self.record;
        let mut out = Vec::with_capacity(
            HEAD_METADATA_LEN + r.payload.len() + TAIL_METADATA_LEN + r.ts_metrics.len() + 1,
        );

        let mut head_bytes = [0u8; HEAD_METADATA_LEN];
        head_bytes[..2].copy_from_slice(&SYNC_WORD);
        head_bytes[head::PAYLOAD_LENGTH] = r.payload.len() as u8;
        head_bytes[head::CHANNEL] = r.channel;
        head_bytes[head::RATE_FLAGS] =
            (r.crc_enabled as u8) | ((r.coding_rate & 0x07) << 1) | ((r.datarate & 0x0F) << 4);
        head_bytes[head::MODEM_ID] = r.modem_id;
        let freq = self.raw_freq_offset & 0x000F_FFFF;
        head_bytes[head::FREQ_OFFSET_7_0] = freq as u8;
        head_bytes[head::FREQ_OFFSET_15_8] = (freq >> 8) as u8;
        head_bytes[head::FREQ_OFFSET_19_16] = (freq >> 16) as u8 & 0x0F;
        out.extend_from_slice(&head_bytes);

        out.extend_from_slice(&r.payload);

        let mut tail_bytes = [0u8; TAIL_METADATA_LEN];
        tail_bytes[tail::STATUS] = (r.crc_error as u8)
            | ((r.sync_error as u8) << 2)
            | ((r.header_error as u8) << 3)
            | ((r.timing_set as u8) << 4);
        tail_bytes[tail::SNR_AVG] = r.snr_average as u8;
        tail_bytes[tail::RSSI_CHAN] = r.rssi_chan_avg;
        tail_bytes[tail::RSSI_SIG] = r.rssi_signal_avg;
        tail_bytes[tail::RSSI_CHAN_DELTA] = pack_delta(r.rssi_chan_delta);
        tail_bytes[tail::RSSI_SIG_DELTA] = pack_delta(r.rssi_signal_delta);
        tail_bytes[tail::TIMESTAMP..tail::TIMESTAMP + 4].copy_from_slice(&r.timestamp_cnt.to_le_bytes());
        tail_bytes[tail::CRC_PAYLOAD..tail::CRC_PAYLOAD + 2].copy_from_slice(&r.rx_crc16.to_le_bytes());
        tail_bytes[tail::NUM_TS_METRICS] = r.num_ts_metrics;
        out.extend_from_slice(&tail_bytes);

        out.extend_from_slice(&r.ts_metrics);
        out.push(crate::frame::checksum(&out));
        out
    }
}

fn pack_delta(delta: RssiDelta) -> u8 {
    (delta.max_neg & 0x0F) | ((delta.max_pos & 0x0F) << 4)
}
