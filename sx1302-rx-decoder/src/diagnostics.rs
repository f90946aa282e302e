//! RX buffer debugging helpers
//!
//! Not part of the receive path. `dump` switches the RX buffer to direct RAM
//! access, which can corrupt the FIFO state, so it must only run while no
//! fetch/decode cycle is in progress. Taking the register interface by
//! `&mut` makes an interleaved fetch impossible.

use crate::hal::{Register, RegisterInterface, RX_BUFFER_BASE_ADDR, RX_FIFO_CAPACITY};
use crate::types::TransportError;
use std::fmt::Write as _;
use std::io::Write;

/// Errors returned by the diagnostic helpers
#[derive(Debug, thiserror::Error)]
pub enum DiagnosticsError {
    #[error("Invalid dump range 0x{start:X}..=0x{end:X} (RX buffer is {capacity} bytes)")]
    InvalidRange { start: u16, end: u16, capacity: usize },

    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Address of the last byte read from the RX buffer
pub fn read_ptr_addr<R: RegisterInterface + ?Sized>(hw: &mut R) -> Result<u16, TransportError> {
    hw.read_register_pair(Register::LastAddrReadMsb, Register::LastAddrReadLsb)
}

/// Address of the last byte written to the RX buffer
pub fn write_ptr_addr<R: RegisterInterface + ?Sized>(hw: &mut R) -> Result<u16, TransportError> {
    hw.read_register_pair(Register::LastAddrWriteMsb, Register::LastAddrWriteLsb)
}

/// Dump RX buffer RAM from `start_addr` to `end_addr` (inclusive) as hex
///
/// Returns the number of bytes dumped. The direct RAM flag is cleared again
/// even if the read fails. The FIFO content should be considered corrupted
/// afterwards.
pub fn dump<R, W>(hw: &mut R, start_addr: u16, end_addr: u16, out: &mut W) -> Result<usize, DiagnosticsError>
where
    R: RegisterInterface + ?Sized,
    W: Write + ?Sized,
{
    if end_addr < start_addr || end_addr as usize >= RX_FIFO_CAPACITY {
        return Err(DiagnosticsError::InvalidRange {
            start: start_addr,
            end: end_addr,
            capacity: RX_FIFO_CAPACITY,
        });
    }

    let count = (end_addr - start_addr) as usize + 1;
    log::info!("Dumping {} bytes, from 0x{:X} to 0x{:X}", count, start_addr, end_addr);

    let mut ram = vec![0u8; count];
    hw.write_register(Register::DirectRamIf, 1)?;
    let read = hw.read_memory(RX_BUFFER_BASE_ADDR + start_addr, &mut ram, false);
    let clear = hw.write_register(Register::DirectRamIf, 0);
    if let Err(err) = read {
        if let Err(clear_err) = clear {
            log::error!("Failed to leave direct RAM mode after a failed dump: {}", clear_err);
        }
        return Err(err.into());
    }
    clear?;

    log::warn!("RX buffer was accessed in direct RAM mode, its content may be corrupted");

    writeln!(out, "{}", hex_line(&ram))?;
    Ok(count)
}

/// Format bytes as space-separated uppercase hex pairs
pub fn hex_line(bytes: &[u8]) -> String {
    let mut line = String::with_capacity(bytes.len() * 3);
    for byte in bytes {
        let _ = write!(line, "{:02X} ", byte);
    }
    line
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::replay::ReplayInterface;

    #[test]
    fn test_hex_line() {
        assert_eq!(hex_line(&[0xA5, 0xC0, 0x01]), "A5 C0 01 ");
        assert_eq!(hex_line(&[]), "");
    }

    #[test]
    fn test_pointer_readback() {
        let mut hw = ReplayInterface::with_snapshots(vec![vec![0u8; 0x0102]]);
        assert_eq!(write_ptr_addr(&mut hw).unwrap(), 0x0102);
        assert_eq!(read_ptr_addr(&mut hw).unwrap(), 0);
        assert_eq!(
            hw.register_reads(),
            &[
                Register::LastAddrWriteMsb,
                Register::LastAddrWriteLsb,
                Register::LastAddrReadMsb,
                Register::LastAddrReadLsb,
            ]
        );
    }

    #[test]
    fn test_dump_toggles_direct_ram() {
        let mut hw = ReplayInterface::new();
        hw.set_ram(0x10, &[0xA5, 0xC0, 0x07]);

        let mut out = Vec::new();
        let count = dump(&mut hw, 0x10, 0x12, &mut out).unwrap();
        assert_eq!(count, 3);
        assert_eq!(String::from_utf8(out).unwrap(), "A5 C0 07 \n");
        assert_eq!(
            hw.register_writes(),
            &[(Register::DirectRamIf, 1), (Register::DirectRamIf, 0)]
        );
        assert!(!hw.direct_ram_enabled());
    }

    #[test]
    fn test_dump_clears_flag_on_read_failure() {
        let mut hw = ReplayInterface::new();
        hw.fail_next_read("SPI error");
        let mut out = Vec::new();
        let err = dump(&mut hw, 0, 15, &mut out).unwrap_err();
        assert!(matches!(err, DiagnosticsError::Transport(_)));
        assert!(!hw.direct_ram_enabled());
        assert!(out.is_empty());
    }

    /// Bus where every memory read fails and only the first register write
    /// succeeds
    struct FlakyBus {
        writes: Vec<(Register, u8)>,
    }

    impl RegisterInterface for FlakyBus {
        fn read_register(&mut self, _reg: Register) -> Result<u8, TransportError> {
            Ok(0)
        }

        fn write_register(&mut self, reg: Register, value: u8) -> Result<(), TransportError> {
            self.writes.push((reg, value));
            if self.writes.len() > 1 {
                return Err(TransportError::Bus("write failed".into()));
            }
            Ok(())
        }

        fn read_memory(&mut self, _addr: u16, _dest: &mut [u8], _fifo_mode: bool) -> Result<(), TransportError> {
            Err(TransportError::Bus("read failed".into()))
        }
    }

    #[test]
    fn test_dump_reports_read_error_when_clear_also_fails() {
        let mut hw = FlakyBus { writes: Vec::new() };
        let mut out = Vec::new();
        let err = dump(&mut hw, 0, 3, &mut out).unwrap_err();
        match err {
            DiagnosticsError::Transport(TransportError::Bus(reason)) => assert_eq!(reason, "read failed"),
            other => panic!("unexpected error: {:?}", other),
        }
        assert_eq!(hw.writes, vec![(Register::DirectRamIf, 1), (Register::DirectRamIf, 0)]);
        assert!(out.is_empty());
    }

    #[test]
    fn test_dump_rejects_bad_ranges() {
        let mut hw = ReplayInterface::new();
        let mut out = Vec::new();
        assert!(matches!(
            dump(&mut hw, 8, 4, &mut out),
            Err(DiagnosticsError::InvalidRange { .. })
        ));
        assert!(matches!(
            dump(&mut hw, 0, 4096, &mut out),
            Err(DiagnosticsError::InvalidRange { .. })
        ));
        assert!(hw.register_writes().is_empty());
    }
}
