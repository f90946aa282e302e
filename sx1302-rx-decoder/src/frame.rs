//! RX buffer frame layout
//!
//! A frame in the RX buffer is laid out as:
//!
//! ```text
//! [ head metadata: 9 bytes, starts with the 2-byte sync word ]
//! [ payload: N bytes                                         ]
//! [ tail metadata: 14 bytes                                  ]
//! [ fine timing metrics: 2 * M bytes                         ]
//! [ checksum: 1 byte                                         ]
//! ```
//!
//! N is read from the head metadata, M from the tail metadata, so the frame
//! length is only known after both have been read.

use crate::bits::take_byte;

/// Two-byte marker every frame starts with
pub const SYNC_WORD: [u8; 2] = [0xA5, 0xC0];

/// Head metadata length, sync word included
pub const HEAD_METADATA_LEN: usize = 9;

/// Tail metadata length
pub const TAIL_METADATA_LEN: usize = 14;

/// Size of one fine timing metric entry
pub const TS_METRIC_LEN: usize = 2;

/// Size of the trailing checksum
pub const CHECKSUM_LEN: usize = 1;

/// Largest payload the length field can describe
pub const MAX_PAYLOAD_LEN: usize = u8::MAX as usize;

/// Length of a frame with an empty payload and no timing metrics
pub const MIN_FRAME_LEN: usize = HEAD_METADATA_LEN + TAIL_METADATA_LEN + CHECKSUM_LEN;

/// Byte offsets inside the head metadata, relative to the frame start
pub mod head {
    pub const PAYLOAD_LENGTH: usize = 2;
    pub const CHANNEL: usize = 3;
    /// CRC enable (bit 0), coding rate (bits 1-3), datarate (bits 4-7)
    pub const RATE_FLAGS: usize = 4;
    pub const MODEM_ID: usize = 5;
    pub const FREQ_OFFSET_7_0: usize = 6;
    pub const FREQ_OFFSET_15_8: usize = 7;
    /// Low nibble only
    pub const FREQ_OFFSET_19_16: usize = 8;
}

/// Byte offsets inside the tail metadata, relative to the end of the payload
pub mod tail {
    /// CRC error (bit 0), sync error (bit 2), header error (bit 3), timing set (bit 4)
    pub const STATUS: usize = 0;
    pub const SNR_AVG: usize = 1;
    pub const RSSI_CHAN: usize = 2;
    pub const RSSI_SIG: usize = 3;
    /// Max negative delta (bits 0-3), max positive delta (bits 4-7)
    pub const RSSI_CHAN_DELTA: usize = 4;
    pub const RSSI_SIG_DELTA: usize = 5;
    /// 4 bytes, little-endian
    pub const TIMESTAMP: usize = 6;
    /// 2 bytes, little-endian
    pub const CRC_PAYLOAD: usize = 10;
    pub const NUM_TS_METRICS: usize = 12;
}

/// Position and size of one frame once its two length fields are known
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameLayout {
    /// Offset of the sync word in the buffer
    pub offset: usize,
    /// Payload length N
    pub payload_len: usize,
    /// Fine timing metric count M
    pub num_ts_metrics: usize,
}

impl FrameLayout {
    /// Number of bytes covered by the checksum: `9 + N + 14 + 2M`
    pub fn checksum_span(&self) -> usize {
        HEAD_METADATA_LEN + self.payload_len + TAIL_METADATA_LEN + TS_METRIC_LEN * self.num_ts_metrics
    }

    /// Total bytes occupied in the buffer, checksum included
    pub fn frame_len(&self) -> usize {
        self.checksum_span() + CHECKSUM_LEN
    }

    /// Absolute offset of the checksum byte
    pub fn checksum_offset(&self) -> usize {
        self.offset + self.checksum_span()
    }

    /// Absolute offset of the first payload byte
    pub fn payload_start(&self) -> usize {
        self.offset + HEAD_METADATA_LEN
    }

    /// Absolute offset of the first tail metadata byte
    pub fn tail_start(&self) -> usize {
        self.payload_start() + self.payload_len
    }

    /// Absolute offset of the first fine timing metric byte
    pub fn ts_metrics_start(&self) -> usize {
        self.tail_start() + TAIL_METADATA_LEN
    }
}

/// True if the sync word starts at `offset`
pub fn is_sync_at(bytes: &[u8], offset: usize) -> bool {
    bytes.get(offset..offset + SYNC_WORD.len()) == Some(&SYNC_WORD[..])
}

/// Payload length field of the frame starting at `offset`
pub fn payload_len_at(bytes: &[u8], offset: usize) -> usize {
    take_byte(bytes, offset + head::PAYLOAD_LENGTH) as usize
}

/// Bytes needed from the frame start to read the timing metric count
pub fn num_ts_metrics_needed(payload_len: usize) -> usize {
    HEAD_METADATA_LEN + payload_len + tail::NUM_TS_METRICS + 1
}

/// Timing metric count of the frame starting at `offset`
pub fn num_ts_metrics_at(bytes: &[u8], offset: usize, payload_len: usize) -> usize {
    take_byte(bytes, offset + HEAD_METADATA_LEN + payload_len + tail::NUM_TS_METRICS) as usize
}

/// 8-bit additive checksum (sum modulo 256)
pub fn checksum(bytes: &[u8]) -> u8 {
    bytes.iter().fold(0u8, |acc, b| acc.wrapping_add(*b))
}

/// Locate the complete frame starting at `offset`, without checking its checksum
///
/// Returns `None` if there is no sync word at `offset` or if the frame does
/// not fit entirely within `bytes`.
pub fn probe(bytes: &[u8], offset: usize) -> Option<FrameLayout> {
    if !is_sync_at(bytes, offset) || offset + HEAD_METADATA_LEN > bytes.len() {
        return None;
    }

    let payload_len = payload_len_at(bytes, offset);
    if offset + num_ts_metrics_needed(payload_len) > bytes.len() {
        return None;
    }

    let layout = FrameLayout {
        offset,
        payload_len,
        num_ts_metrics: num_ts_metrics_at(bytes, offset, payload_len),
    };
    (offset + layout.frame_len() <= bytes.len()).then_some(layout)
}
