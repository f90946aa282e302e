//! In-memory concentrator for offline replay
//!
//! [`ReplayInterface`] serves previously captured RX FIFO snapshots through
//! the same register and memory protocol as the chip, so the fetch path can
//! be exercised without hardware.

use crate::hal::{Register, RegisterInterface, RX_BUFFER_BASE_ADDR, RX_FIFO_CAPACITY};
use crate::types::TransportError;
use std::collections::VecDeque;

/// Replays queued snapshots as if they were arriving in the RX FIFO
#[derive(Debug, Clone)]
pub struct ReplayInterface {
    pending: VecDeque<Vec<u8>>,
    ram: Vec<u8>,
    last_addr_read: u16,
    last_addr_write: u16,
    direct_ram: bool,
    fail_next_read: Option<String>,
    register_reads: Vec<Register>,
    register_writes: Vec<(Register, u8)>,
}

impl ReplayInterface {
    /// Create a replay backend with an empty FIFO
    pub fn new() -> Self {
        Self {
            pending: VecDeque::new(),
            ram: vec![0; RX_FIFO_CAPACITY],
            last_addr_read: 0,
            last_addr_write: 0,
            direct_ram: false,
            fail_next_read: None,
            register_reads: Vec::new(),
            register_writes: Vec::new(),
        }
    }

    /// Create a replay backend with the given snapshots already queued
    pub fn with_snapshots<I>(snapshots: I) -> Self
    where
        I: IntoIterator<Item = Vec<u8>>,
    {
        let mut replay = Self::new();
        for snapshot in snapshots {
            replay.push_snapshot(snapshot);
        }
        replay
    }

    /// Queue one snapshot; the next fetch returns it whole
    ///
    /// The content is also written to the RAM image at the write pointer, as
    /// the chip would. An empty snapshot queues nothing.
    pub fn push_snapshot(&mut self, snapshot: Vec<u8>) {
        if snapshot.is_empty() {
            return;
        }
        for byte in &snapshot {
            let idx = self.last_addr_write as usize % self.ram.len();
            self.ram[idx] = *byte;
            self.last_addr_write = ((idx + 1) % self.ram.len()) as u16;
        }
        self.pending.push_back(snapshot);
    }

    /// Number of snapshots not fetched yet
    pub fn pending_snapshots(&self) -> usize {
        self.pending.len()
    }

    /// Make the next memory read fail with a bus error
    pub fn fail_next_read(&mut self, reason: impl Into<String>) {
        self.fail_next_read = Some(reason.into());
    }

    /// Overwrite the RAM image seen by direct (non-FIFO) reads
    pub fn set_ram(&mut self, offset: usize, bytes: &[u8]) {
        let end = (offset + bytes.len()).min(self.ram.len());
        if offset < end {
            self.ram[offset..end].copy_from_slice(&bytes[..end - offset]);
        }
    }

    /// Last-read and last-write RX buffer pointers
    pub fn pointers(&self) -> (u16, u16) {
        (self.last_addr_read, self.last_addr_write)
    }

    /// True while the direct RAM interface flag is set
    pub fn direct_ram_enabled(&self) -> bool {
        self.direct_ram
    }

    /// Registers read so far, in order
    pub fn register_reads(&self) -> &[Register] {
        &self.register_reads
    }

    /// Register writes so far, in order
    pub fn register_writes(&self) -> &[(Register, u8)] {
        &self.register_writes
    }

    fn head_len(&self) -> u16 {
        self.pending.front().map_or(0, |s| s.len().min(u16::MAX as usize) as u16)
    }
}

impl Default for ReplayInterface {
    fn default() -> Self {
        Self::new()
    }
}

impl RegisterInterface for ReplayInterface {
    fn read_register(&mut self, reg: Register) -> Result<u8, TransportError> {
        self.register_reads.push(reg);
        let [msb, lsb] = match reg {
            Register::RxBufferNbBytesMsb | Register::RxBufferNbBytesLsb => self.head_len().to_be_bytes(),
            Register::LastAddrReadMsb | Register::LastAddrReadLsb => self.last_addr_read.to_be_bytes(),
            Register::LastAddrWriteMsb | Register::LastAddrWriteLsb => self.last_addr_write.to_be_bytes(),
            Register::DirectRamIf => return Ok(self.direct_ram as u8),
        };
        Ok(match reg {
            Register::RxBufferNbBytesMsb | Register::LastAddrReadMsb | Register::LastAddrWriteMsb => msb,
            _ => lsb,
        })
    }

    fn write_register(&mut self, reg: Register, value: u8) -> Result<(), TransportError> {
        self.register_writes.push((reg, value));
        match reg {
            Register::DirectRamIf => {
                self.direct_ram = value != 0;
                Ok(())
            }
            _ => Err(TransportError::Bus(format!("{} is read-only", reg))),
        }
    }

    fn read_memory(&mut self, addr: u16, dest: &mut [u8], fifo_mode: bool) -> Result<(), TransportError> {
        if let Some(reason) = self.fail_next_read.take() {
            return Err(TransportError::Bus(reason));
        }

        let offset = addr
            .checked_sub(RX_BUFFER_BASE_ADDR)
            .ok_or_else(|| TransportError::Bus(format!("address 0x{:04X} is outside the RX buffer", addr)))?
            as usize;

        if fifo_mode {
            if offset != 0 {
                return Err(TransportError::Bus("FIFO reads start at the RX buffer base".into()));
            }
            let snapshot = self
                .pending
                .pop_front()
                .ok_or_else(|| TransportError::Bus("RX FIFO is empty".into()))?;
            if dest.len() > snapshot.len() {
                return Err(TransportError::Bus(format!(
                    "read of {} bytes but only {} queued",
                    dest.len(),
                    snapshot.len()
                )));
            }
            dest.copy_from_slice(&snapshot[..dest.len()]);
            self.last_addr_read =
                ((self.last_addr_read as usize + dest.len()) % self.ram.len()) as u16;
            return Ok(());
        }

        if !self.direct_ram {
            return Err(TransportError::Bus("direct RAM interface is disabled".into()));
        }
        if offset + dest.len() > self.ram.len() {
            return Err(TransportError::Bus(format!(
                "read of {} bytes at offset {} overruns the RX buffer",
                dest.len(),
                offset
            )));
        }
        dest.copy_from_slice(&self.ram[offset..offset + dest.len()]);
        Ok(())
    }
}
