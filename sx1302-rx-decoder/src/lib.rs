//! SX1302 RX Buffer Decoder Library
//!
//! Turns raw snapshots of the SX1302/SX1303 receive FIFO into validated packet
//! records.
//!
//! # Architecture
//!
//! - [`RxBuffer`] owns the fetched snapshot and a read cursor
//! - [`FrameDecoder`] pops one frame per call: sync word, length fields,
//!   checksum, metadata extraction, sanity checks, payload copy
//! - [`RegisterInterface`] is the hardware boundary used to fetch snapshots
//!   and by the [`diagnostics`] helpers
//! - [`ReplayInterface`] implements that boundary over captured snapshots
//!
//! The library does NOT:
//! - Configure the radio or the demodulators
//! - Retry failed bus transfers
//! - Unwrap or rescale the packet timestamp counter
//! - Interpret LoRaWAN payloads
//!
//! # Example Usage
//!
//! ```
//! use sx1302_rx_decoder::{DecoderConfig, FrameBuilder, FrameDecoder, ReplayInterface, RxBuffer};
//!
//! let mut hw = ReplayInterface::new();
//! hw.push_snapshot(FrameBuilder::new(b"hello").datarate(7).build());
//!
//! let config = DecoderConfig::new();
//! let mut buffer = RxBuffer::with_config(&config);
//! let mut decoder = FrameDecoder::new(config);
//!
//! buffer.fetch(&mut hw).unwrap();
//! for packet in decoder.packets(&mut buffer) {
//!     match packet {
//!         Ok(record) => println!("{} bytes on channel {}", record.size(), record.channel),
//!         Err(e) => eprintln!("Decode error: {}", e),
//!     }
//! }
//! ```

// Public modules
pub mod bits;
pub mod buffer;
pub mod config;
pub mod decoder;
pub mod diagnostics;
pub mod encode;
pub mod frame;
pub mod hal;
pub mod observer;
pub mod replay;
pub mod types;
pub mod validate;

// Re-export main types for convenience
pub use buffer::RxBuffer;
pub use config::DecoderConfig;
pub use decoder::{DecodeStats, FrameDecoder, FrameState, Packets};
pub use diagnostics::DiagnosticsError;
pub use encode::FrameBuilder;
pub use hal::{Register, RegisterInterface};
pub use observer::{DecodeEvent, DecodeObserver, LogObserver, NullObserver};
pub use replay::ReplayInterface;
pub use types::{
    DecodeError, ErrorKind, ModemClass, PacketRecord, RangeViolation, Result, RssiDelta,
    TransportError,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
