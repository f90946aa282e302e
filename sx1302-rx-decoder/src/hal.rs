//! Hardware boundary
//!
//! The decoder never talks to the chip directly. Snapshot fetches and the
//! diagnostic helpers go through [`RegisterInterface`], which a SPI/USB
//! backend (or [`crate::replay::ReplayInterface`] offline) implements.

use crate::types::TransportError;
use std::fmt;

/// Base address of the RX buffer in the chip memory map
pub const RX_BUFFER_BASE_ADDR: u16 = 0x4000;

/// RX buffer capacity in bytes
pub const RX_FIFO_CAPACITY: usize = 4096;

/// RX_TOP registers used by the receive path
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Register {
    /// Number of bytes pending in the RX buffer, bits 15-8
    RxBufferNbBytesMsb,
    /// Number of bytes pending in the RX buffer, bits 7-0
    RxBufferNbBytesLsb,
    LastAddrReadMsb,
    LastAddrReadLsb,
    LastAddrWriteMsb,
    LastAddrWriteLsb,
    /// Direct RAM access to the RX buffer (debug only)
    DirectRamIf,
}

impl Register {
    /// Register name as it appears in the chip documentation
    pub fn name(&self) -> &'static str {
        match self {
            Register::RxBufferNbBytesMsb => "RX_TOP_RX_BUFFER_NB_BYTES_MSB",
            Register::RxBufferNbBytesLsb => "RX_TOP_RX_BUFFER_NB_BYTES_LSB",
            Register::LastAddrReadMsb => "RX_TOP_RX_BUFFER_LAST_ADDR_READ_MSB",
            Register::LastAddrReadLsb => "RX_TOP_RX_BUFFER_LAST_ADDR_READ_LSB",
            Register::LastAddrWriteMsb => "RX_TOP_RX_BUFFER_LAST_ADDR_WRITE_MSB",
            Register::LastAddrWriteLsb => "RX_TOP_RX_BUFFER_LAST_ADDR_WRITE_LSB",
            Register::DirectRamIf => "RX_TOP_RX_BUFFER_DIRECT_RAM_IF",
        }
    }
}

impl fmt::Display for Register {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Register and memory access to the concentrator
pub trait RegisterInterface {
    /// Read one 8-bit register
    fn read_register(&mut self, reg: Register) -> Result<u8, TransportError>;

    /// Write one 8-bit register
    fn write_register(&mut self, reg: Register, value: u8) -> Result<(), TransportError>;

    /// Burst-read `dest.len()` bytes starting at `addr`
    ///
    /// With `fifo_mode` set the read drains the RX FIFO; without it the
    /// memory is read in place.
    fn read_memory(&mut self, addr: u16, dest: &mut [u8], fifo_mode: bool) -> Result<(), TransportError>;

    /// Read a 16-bit value split over two registers
    ///
    /// The MSB register must be read first: reading it latches the LSB.
    fn read_register_pair(&mut self, msb: Register, lsb: Register) -> Result<u16, TransportError> {
        let high = self.read_register(msb)?;
        let low = self.read_register(lsb)?;
        Ok(u16::from_be_bytes([high, low]))
    }
}

impl<T: RegisterInterface + ?Sized> RegisterInterface for &mut T {
    fn read_register(&mut self, reg: Register) -> Result<u8, TransportError> {
        (**self).read_register(reg)
    }

    fn write_register(&mut self, reg: Register, value: u8) -> Result<(), TransportError> {
        (**self).write_register(reg, value)
    }

    fn read_memory(&mut self, addr: u16, dest: &mut [u8], fifo_mode: bool) -> Result<(), TransportError> {
        (**self).read_memory(addr, dest, fifo_mode)
    }
}
