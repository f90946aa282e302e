//! Core types for the SX1302 RX buffer decoder
//!
//! This module defines the packet record the decoder emits for every accepted
//! frame, the modem classification used by the sanity checks, and the error
//! types shared by the buffer, the decoder and the hardware boundary.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Result type for decoder operations
pub type Result<T> = std::result::Result<T, DecodeError>;

/// One packet record recovered from a frame of the RX buffer
///
/// Built field by field during a single successful decode call and never
/// modified afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct PacketRecord {
    /// Identifier of the demodulator that produced the frame
    pub modem_id: u8,
    /// Modem family derived from `modem_id` during validation
    pub modem_class: ModemClass,
    /// IF channel the packet was received on
    pub channel: u8,
    /// True if the packet carried a payload CRC
    pub crc_enabled: bool,
    /// Coding rate code (3 bits)
    pub coding_rate: u8,
    /// Spreading factor for LoRa modems, data rate code otherwise (4 bits)
    pub datarate: u8,
    /// Frequency offset error, sign-extended from 20 bits
    pub frequency_offset_error: i32,
    /// Payload CRC check failed in the modem
    pub crc_error: bool,
    /// Sync word check failed in the modem
    pub sync_error: bool,
    /// LoRa explicit header check failed in the modem
    pub header_error: bool,
    /// Fine timing metrics were computed for this packet
    pub timing_set: bool,
    /// Average SNR (two's complement)
    pub snr_average: i8,
    /// Average channel RSSI (raw register units)
    pub rssi_chan_avg: u8,
    /// Average signal RSSI (raw register units)
    pub rssi_signal_avg: u8,
    /// Channel RSSI excursion around the average
    pub rssi_chan_delta: RssiDelta,
    /// Signal RSSI excursion around the average
    pub rssi_signal_delta: RssiDelta,
    /// Free-running 32 MHz counter value at packet reception
    pub timestamp_cnt: u32,
    /// Payload CRC as received
    pub rx_crc16: u16,
    /// Number of 2-byte fine timing metric entries
    pub num_ts_metrics: u8,
    /// Raw fine timing metric bytes (`2 * num_ts_metrics`)
    pub ts_metrics: Vec<u8>,
    /// Payload bytes, copied verbatim
    pub payload: Vec<u8>,
}

impl PacketRecord {
    /// Payload length in bytes
    pub fn size(&self) -> usize {
        self.payload.len()
    }

    /// True if the modem reported any of the CRC, sync or header errors
    pub fn has_modem_error(&self) -> bool {
        self.crc_error || self.sync_error || self.header_error
    }
}

/// Max negative and positive RSSI deltas, one nibble each on the wire
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct RssiDelta {
    pub max_neg: u8,
    pub max_pos: u8,
}

/// Demodulator family a modem id belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModemClass {
    /// One of the multi-SF LoRa demodulators
    #[default]
    LoraMultiSf,
    /// The single-SF "standard" LoRa demodulator
    LoraStandard,
    /// The FSK demodulator
    Fsk,
}

impl ModemClass {
    /// True for both LoRa demodulator kinds
    pub fn is_lora(&self) -> bool {
        matches!(self, ModemClass::LoraMultiSf | ModemClass::LoraStandard)
    }
}

impl fmt::Display for ModemClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModemClass::LoraMultiSf => write!(f, "LoRa multi-SF"),
            ModemClass::LoraStandard => write!(f, "LoRa standard"),
            ModemClass::Fsk => write!(f, "FSK"),
        }
    }
}

/// Reason a checksum-valid frame was judged implausible
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum RangeViolation {
    #[error("modem_id is out of range - {modem_id} (FSK modem id is {fsk_modem_id})")]
    ModemId { modem_id: u8, fsk_modem_id: u8 },

    #[error("channel is out of range - {channel} (channel count is {channel_count})")]
    Channel { channel: u8, channel_count: u8 },

    #[error("SF is out of range - {datarate}")]
    SpreadingFactor { datarate: u8 },
}

/// Failure of the hardware boundary (register or memory access)
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    #[error("Bus access failed: {0}")]
    Bus(String),

    #[error("Snapshot of {len} bytes exceeds RX buffer capacity of {capacity} bytes")]
    Oversized { len: usize, capacity: usize },
}

/// Errors returned by a single decode call
///
/// Every variant is recoverable: the buffer is always left in a well-defined
/// state and the caller may keep decoding or fetch again.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    #[error("No more data to be parsed")]
    Exhausted,

    #[error("Sync word not found at offset {offset}")]
    SyncNotFound { offset: usize },

    #[error("Truncated frame at offset {offset}: need {needed} bytes, {available} available")]
    Truncated {
        offset: usize,
        needed: usize,
        available: usize,
    },

    #[error("Checksum failed at offset {offset} (got: 0x{received:02X} calc: 0x{computed:02X})")]
    ChecksumMismatch {
        offset: usize,
        received: u8,
        computed: u8,
    },

    #[error("Frame at offset {offset} rejected: {violation}")]
    OutOfRange {
        offset: usize,
        violation: RangeViolation,
    },

    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),
}

/// Fieldless mirror of [`DecodeError`], handy for counting and matching
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Exhausted,
    SyncNotFound,
    Truncated,
    ChecksumMismatch,
    OutOfRange,
    Transport,
}

impl DecodeError {
    /// Kind of this error without its payload
    pub fn kind(&self) -> ErrorKind {
        match self {
            DecodeError::Exhausted => ErrorKind::Exhausted,
            DecodeError::SyncNotFound { .. } => ErrorKind::SyncNotFound,
            DecodeError::Truncated { .. } => ErrorKind::Truncated,
            DecodeError::ChecksumMismatch { .. } => ErrorKind::ChecksumMismatch,
            DecodeError::OutOfRange { .. } => ErrorKind::OutOfRange,
            DecodeError::Transport(_) => ErrorKind::Transport,
        }
    }

    /// True if decoding the same snapshot can make progress after this error
    ///
    /// `Truncated` leaves the cursor in place and needs a new fetch, transport
    /// failures clear the buffer, and `Exhausted` means there is nothing left.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            DecodeError::SyncNotFound { .. }
                | DecodeError::ChecksumMismatch { .. }
                | DecodeError::OutOfRange { .. }
        )
    }
}
