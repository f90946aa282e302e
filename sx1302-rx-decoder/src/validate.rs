//! Sanity checks on decoded metadata
//!
//! A frame can pass its checksum and still carry implausible metadata. The
//! bounds depend on the modem family: LoRa demodulators report a channel and
//! a spreading factor that can be checked, FSK has no documented bounds.

use crate::config::DecoderConfig;
use crate::types::{ModemClass, PacketRecord, RangeViolation};

/// Lowest LoRa spreading factor
pub const SF_MIN: u8 = 5;

/// Highest LoRa spreading factor
pub const SF_MAX: u8 = 12;

/// Map a modem id to its family, `None` if the id is not a known modem
pub fn classify_modem(modem_id: u8, config: &DecoderConfig) -> Option<ModemClass> {
    if modem_id <= config.lora_modem_id_max {
        Some(ModemClass::LoraMultiSf)
    } else if modem_id == config.lora_std_modem_id {
        Some(ModemClass::LoraStandard)
    } else if modem_id == config.fsk_modem_id {
        Some(ModemClass::Fsk)
    } else {
        None
    }
}

/// Check the metadata of `record` and return its modem family
pub fn check_metadata(record: &PacketRecord, config: &DecoderConfig) -> Result<ModemClass, RangeViolation> {
    let class = classify_modem(record.modem_id, config).ok_or(RangeViolation::ModemId {
        modem_id: record.modem_id,
        fsk_modem_id: config.fsk_modem_id,
    })?;

    if class.is_lora() {
        if record.channel >= config.channel_count {
            return Err(RangeViolation::Channel {
                channel: record.channel,
                channel_count: config.channel_count,
            });
        }
        if !(SF_MIN..=SF_MAX).contains(&record.datarate) {
            return Err(RangeViolation::SpreadingFactor {
                datarate: record.datarate,
            });
        }
    }

    Ok(class)
}
