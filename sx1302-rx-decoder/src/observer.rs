//! Decode event hook
//!
//! The decoder reports every accepted or rejected frame to a
//! [`DecodeObserver`]. Observers only watch: they cannot change what the
//! decoder returns or where the cursor goes.

use crate::types::{DecodeError, ModemClass};

/// Outcome of one decode call, as reported to observers
#[derive(Debug, Clone, PartialEq)]
pub enum DecodeEvent {
    /// A frame passed every check
    Accepted {
        offset: usize,
        frame_len: usize,
        modem_id: u8,
        modem_class: ModemClass,
        channel: u8,
        payload_len: usize,
    },
    /// A decode call failed; `advanced` is how far the cursor moved
    Rejected {
        offset: usize,
        error: DecodeError,
        advanced: usize,
    },
}

/// Receives decode events
pub trait DecodeObserver {
    fn on_event(&mut self, event: &DecodeEvent);
}

impl<F> DecodeObserver for F
where
    F: FnMut(&DecodeEvent),
{
    fn on_event(&mut self, event: &DecodeEvent) {
        self(event)
    }
}

/// Default observer: one `log` record per event
#[derive(Debug, Clone, Copy, Default)]
pub struct LogObserver;

impl DecodeObserver for LogObserver {
    fn on_event(&mut self, event: &DecodeEvent) {
        match event {
            DecodeEvent::Accepted {
                offset,
                frame_len,
                modem_id,
                modem_class,
                channel,
                payload_len,
            } => {
                log::debug!(
                    "pkt accepted at index {} ({} bytes): modem={} ({}) chan={} size={}",
                    offset,
                    frame_len,
                    modem_id,
                    modem_class,
                    channel,
                    payload_len
                );
            }
            DecodeEvent::Rejected { error, advanced, .. } => match error {
                DecodeError::SyncNotFound { .. } => {
                    log::trace!("{}, searching syncword...", error);
                }
                DecodeError::Truncated { .. } => {
                    log::warn!("Aborting truncated message: {}", error);
                }
                DecodeError::ChecksumMismatch { .. } | DecodeError::OutOfRange { .. } => {
                    log::warn!("{} (skipped {} bytes)", error, advanced);
                }
                DecodeError::Exhausted | DecodeError::Transport(_) => {
                    log::debug!("{}", error);
                }
            },
        }
    }
}

/// Observer that ignores every event
#[derive(Debug, Clone, Copy, Default)]
pub struct NullObserver;

impl DecodeObserver for NullObserver {
    fn on_event(&mut self, _event: &DecodeEvent) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_closure_observer() {
        let mut seen = Vec::new();
        {
            let mut observer = |event: &DecodeEvent| {
                if let DecodeEvent::Rejected { advanced, .. } = event {
                    seen.push(*advanced);
                }
            };
            observer.on_event(&DecodeEvent::Rejected {
                offset: 0,
                error: DecodeError::SyncNotFound { offset: 0 },
                advanced: 1,
            });
        }
        assert_eq!(seen, vec![1]);
    }

    #[test]
    fn test_log_observer_handles_every_event() {
        let mut observer = LogObserver;
        observer.on_event(&DecodeEvent::Accepted {
            offset: 0,
            frame_len: 24,
            modem_id: 0,
            modem_class: ModemClass::LoraMultiSf,
            channel: 0,
            payload_len: 0,
        });
        observer.on_event(&DecodeEvent::Rejected {
            offset: 0,
            error: DecodeError::Exhausted,
            advanced: 0,
        });
    }
}
