//! Decoder configuration types
//!
//! The modem id layout and the channel bound depend on the concentrator
//! build, so they are configuration rather than constants. The defaults match
//! the SX1302 reference design.

use crate::hal::RX_FIFO_CAPACITY;
use serde::{Deserialize, Serialize};

/// Configuration for the frame decoder and the RX buffer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecoderConfig {
    /// Highest modem id of the multi-SF LoRa demodulators
    #[serde(default = "default_lora_modem_id_max")]
    pub lora_modem_id_max: u8,

    /// Modem id of the single-SF LoRa demodulator
    #[serde(default = "default_lora_std_modem_id")]
    pub lora_std_modem_id: u8,

    /// Modem id of the FSK demodulator (highest valid id)
    #[serde(default = "default_fsk_modem_id")]
    pub fsk_modem_id: u8,

    /// Number of IF channels a LoRa packet may report
    #[serde(default = "default_channel_count")]
    pub channel_count: u8,

    /// RX buffer capacity in bytes
    #[serde(default = "default_buffer_capacity")]
    pub buffer_capacity: usize,
}

fn default_lora_modem_id_max() -> u8 {
    11
}

fn default_lora_std_modem_id() -> u8 {
    12
}

fn default_fsk_modem_id() -> u8 {
    13
}

fn default_channel_count() -> u8 {
    10
}

fn default_buffer_capacity() -> usize {
    RX_FIFO_CAPACITY
}

impl Default for DecoderConfig {
    fn default() -> Self {
        Self {
            lora_modem_id_max: default_lora_modem_id_max(),
            lora_std_modem_id: default_lora_std_modem_id(),
            fsk_modem_id: default_fsk_modem_id(),
            channel_count: default_channel_count(),
            buffer_capacity: default_buffer_capacity(),
        }
    }
}

impl DecoderConfig {
    /// Create a new decoder configuration with default settings
    pub fn new() -> Self {
        Self::default()
    }

    /// Modem id layout of the 16-channel FPGA board
    pub fn fpga_16ch() -> Self {
        Self::default().with_modem_ids(15, 16, 17)
    }

    /// Builder method: set the multi-SF max, standard LoRa and FSK modem ids
    pub fn with_modem_ids(mut self, lora_max: u8, lora_std: u8, fsk: u8) -> Self {
        self.lora_modem_id_max = lora_max;
        self.lora_std_modem_id = lora_std;
        self.fsk_modem_id = fsk;
        self
    }

    /// Builder method: set the number of valid IF channels
    pub fn with_channel_count(mut self, channel_count: u8) -> Self {
        self.channel_count = channel_count;
        self
    }

    /// Builder method: set the RX buffer capacity
    pub fn with_buffer_capacity(mut self, capacity: usize) -> Self {
        self.buffer_capacity = capacity;
        self
    }

    /// Check that modem ids are strictly increasing (multi-SF < standard < FSK)
    /// and that the buffer can hold at least one empty frame.
    pub fn is_consistent(&self) -> bool {
        self.lora_modem_id_max < self.lora_std_modem_id
            && self.lora_std_modem_id < self.fsk_modem_id
            && self.buffer_capacity >= crate::frame::MIN_FRAME_LEN
    }
}
