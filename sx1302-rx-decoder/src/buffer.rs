//! RX buffer snapshot and read cursor
//!
//! [`RxBuffer`] owns one fixed-capacity byte buffer that is reused for every
//! fetch. A fetch replaces the whole content and rewinds the cursor; only the
//! decoder moves the cursor forward.

use crate::config::DecoderConfig;
use crate::diagnostics::hex_line;
use crate::frame;
use crate::hal::{Register, RegisterInterface, RX_BUFFER_BASE_ADDR, RX_FIFO_CAPACITY};
use crate::types::TransportError;

/// Snapshot of the concentrator RX FIFO with a read cursor
#[derive(Debug, Clone)]
pub struct RxBuffer {
    buffer: Vec<u8>,
    len: usize,
    cursor: usize,
}

impl RxBuffer {
    /// Create an empty buffer able to hold `capacity` bytes
    pub fn new(capacity: usize) -> Self {
        Self {
            buffer: vec![0; capacity],
            len: 0,
            cursor: 0,
        }
    }

    /// Create an empty buffer sized from the decoder configuration
    pub fn with_config(config: &DecoderConfig) -> Self {
        Self::new(config.buffer_capacity)
    }

    /// Clear the content and rewind
    pub fn reset(&mut self) {
        self.buffer.fill(0);
        self.len = 0;
        self.cursor = 0;
    }

    /// Replace the content with `snapshot` and rewind the cursor
    ///
    /// A snapshot larger than the capacity is refused and the buffer is left
    /// empty.
    pub fn install(&mut self, snapshot: &[u8]) -> Result<(), TransportError> {
        self.reset();
        if snapshot.len() > self.capacity() {
            return Err(TransportError::Oversized {
                len: snapshot.len(),
                capacity: self.capacity(),
            });
        }

        self.buffer[..snapshot.len()].copy_from_slice(snapshot);
        self.len = snapshot.len();
        Ok(())
    }

    /// Fetch the bytes currently queued in the RX FIFO
    ///
    /// Returns the number of bytes fetched; 0 means nothing was pending. On
    /// failure the buffer is left empty, never holding stale content.
    pub fn fetch<R: RegisterInterface + ?Sized>(&mut self, hw: &mut R) -> Result<usize, TransportError> {
        self.reset();

        // The byte count is read twice and the larger value kept: a
        // multi-byte read can return a count lower than what is queued.
        let first = Self::pending_bytes(hw)?;
        let second = Self::pending_bytes(hw)?;
        let nb_bytes = first.max(second) as usize;

        if nb_bytes == 0 {
            log::trace!("RX buffer empty, nothing to fetch");
            return Ok(0);
        }
        if nb_bytes > self.capacity() {
            log::error!(
                "RX buffer reports {} bytes, more than its capacity of {}",
                nb_bytes,
                self.capacity()
            );
            return Err(TransportError::Oversized {
                len: nb_bytes,
                capacity: self.capacity(),
            });
        }

        log::debug!("nb_bytes to be fetched: {}", nb_bytes);
        if let Err(err) = hw.read_memory(RX_BUFFER_BASE_ADDR, &mut self.buffer[..nb_bytes], true) {
            log::error!("Failed to read RX buffer: {}", err);
            self.reset();
            return Err(err);
        }

        self.len = nb_bytes;
        log::trace!("RX_BUFFER: {}", hex_line(self.as_bytes()));
        Ok(nb_bytes)
    }

    fn pending_bytes<R: RegisterInterface + ?Sized>(hw: &mut R) -> Result<u16, TransportError> {
        hw.read_register_pair(Register::RxBufferNbBytesMsb, Register::RxBufferNbBytesLsb)
    }

    /// True while the cursor has not reached the end of the snapshot
    pub fn has_more(&self) -> bool {
        self.cursor < self.len
    }

    /// Logical length of the snapshot
    pub fn len(&self) -> usize {
        self.len
    }

    /// True if the snapshot is empty
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Current read position
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// Maximum snapshot size
    pub fn capacity(&self) -> usize {
        self.buffer.len()
    }

    /// Snapshot content
    pub fn as_bytes(&self) -> &[u8] {
        &self.buffer[..self.len]
    }

    /// Snapshot content not yet consumed
    pub fn remaining(&self) -> &[u8] {
        &self.buffer[self.cursor..self.len]
    }

    /// Count the complete frames from the cursor onwards without consuming them
    ///
    /// Frames are chained by their computed length; counting stops at the
    /// first position that does not hold a complete frame. Checksums are not
    /// verified.
    pub fn count_frames(&self) -> usize {
        let bytes = self.as_bytes();
        let mut offset = self.cursor;
        let mut count = 0;
        while let Some(layout) = frame::probe(bytes, offset) {
            count += 1;
            offset += layout.frame_len();
        }
        count
    }

    pub(crate) fn advance(&mut self, n: usize) {
        self.cursor = (self.cursor + n).min(self.len);
    }
}

impl Default for RxBuffer {
    fn default() -> Self {
        Self::new(RX_FIFO_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encode::FrameBuilder;
    use crate::replay::ReplayInterface;

    #[test]
    fn test_new_buffer_is_empty() {
        let buf = RxBuffer::default();
        assert_eq!(buf.capacity(), RX_FIFO_CAPACITY);
        assert!(buf.is_empty());
        assert!(!buf.has_more());
        assert_eq!(buf.cursor(), 0);
    }

    #[test]
    fn test_install_and_reset() {
        let mut buf = RxBuffer::new(16);
        buf.install(&[1, 2, 3]).unwrap();
        assert_eq!(buf.len(), 3);
        assert!(buf.has_more());
        assert_eq!(buf.as_bytes(), &[1, 2, 3]);

        buf.advance(2);
        assert_eq!(buf.remaining(), &[3]);
        buf.advance(10);
        assert_eq!(buf.cursor(), 3);
        assert!(!buf.has_more());

        buf.reset();
        assert!(buf.is_empty());
        assert_eq!(buf.cursor(), 0);
    }

    #[test]
    fn test_install_rewinds_cursor() {
        let mut buf = RxBuffer::new(16);
        buf.install(&[1, 2, 3]).unwrap();
        buf.advance(3);
        buf.install(&[4, 5]).unwrap();
        assert_eq!(buf.cursor(), 0);
        assert_eq!(buf.as_bytes(), &[4, 5]);
    }

    #[test]
    fn test_install_oversized_clears_buffer() {
        let mut buf = RxBuffer::new(4);
        buf.install(&[1, 2]).unwrap();
        let err = buf.install(&[0; 5]).unwrap_err();
        assert_eq!(err, TransportError::Oversized { len: 5, capacity: 4 });
        assert!(buf.is_empty());
    }

    #[test]
    fn test_fetch_from_replay() {
        let frame = FrameBuilder::new(b"hello").build();
        let mut hw = ReplayInterface::new();
        hw.push_snapshot(frame.clone());

        let mut buf = RxBuffer::default();
        assert_eq!(buf.fetch(&mut hw).unwrap(), frame.len());
        assert_eq!(buf.as_bytes(), frame.as_slice());
        assert_eq!(buf.cursor(), 0);

        // FIFO drained
        assert_eq!(buf.fetch(&mut hw).unwrap(), 0);
        assert!(buf.is_empty());
    }

    #[test]
    fn test_fetch_failure_clears_buffer() {
        let mut hw = ReplayInterface::new();
        hw.push_snapshot(FrameBuilder::new(b"one").build());
        hw.push_snapshot(FrameBuilder::new(b"two").build());

        let mut buf = RxBuffer::default();
        buf.fetch(&mut hw).unwrap();
        assert!(!buf.is_empty());

        hw.fail_next_read("SPI error");
        let err = buf.fetch(&mut hw).unwrap_err();
        assert_eq!(err, TransportError::Bus("SPI error".into()));
        assert!(buf.is_empty());
        assert!(!buf.has_more());
    }

    #[test]
    fn test_fetch_oversized_snapshot() {
        let mut hw = ReplayInterface::new();
        hw.push_snapshot(vec![0u8; 64]);

        let mut buf = RxBuffer::new(32);
        let err = buf.fetch(&mut hw).unwrap_err();
        assert_eq!(err, TransportError::Oversized { len: 64, capacity: 32 });
        assert!(buf.is_empty());
    }

    #[test]
    fn test_count_frames() {
        let mut snapshot = FrameBuilder::new(b"a").build();
        snapshot.extend(FrameBuilder::new(b"bb").ts_metrics(&[1, 2, 3, 4]).build());
        let third = FrameBuilder::new(b"ccc").build();
        snapshot.extend_from_slice(&third[..third.len() - 1]);

        let mut buf = RxBuffer::default();
        buf.install(&snapshot).unwrap();
        assert_eq!(buf.count_frames(), 2);

        buf.install(&[0x00, 0xA5, 0xC0]).unwrap();
        assert_eq!(buf.count_frames(), 0);
    }
}
