//! Packet report output
//!
//! Text mode prints one human readable line per packet. JSON mode prints one
//! object per line, stamped with the host reception time.

use crate::config::OutputFormat;
use serde::Serialize;
use std::io::{self, Write};
use sx1302_rx_decoder::diagnostics::hex_line;
use sx1302_rx_decoder::{DecodeStats, PacketRecord};

#[derive(Serialize)]
struct JsonRecord<'a> {
    snapshot: usize,
    received_at: String,
    #[serde(flatten)]
    record: &'a PacketRecord,
}

#[derive(Serialize)]
struct JsonSummary<'a> {
    summary: &'a DecodeStats,
}

/// Writes decoded packets in the selected format
pub struct Reporter<W: Write> {
    out: W,
    format: OutputFormat,
    packets: usize,
}

impl<W: Write> Reporter<W> {
    pub fn new(out: W, format: OutputFormat) -> Self {
        Self {
            out,
            format,
            packets: 0,
        }
    }

    /// Number of packets written so far
    pub fn packets(&self) -> usize {
        self.packets
    }

    /// Write one packet decoded from snapshot number `snapshot`
    pub fn packet(&mut self, snapshot: usize, record: &PacketRecord) -> io::Result<()> {
        self.packets += 1;
        match self.format {
            OutputFormat::Text => writeln!(self.out, "{}", text_line(self.packets, snapshot, record)),
            OutputFormat::Json => {
                let line = JsonRecord {
                    snapshot,
                    received_at: chrono::Utc::now().to_rfc3339(),
                    record,
                };
                serde_json::to_writer(&mut self.out, &line)?;
                writeln!(self.out)
            }
        }
    }

    /// Write the decoder counters and flush
    pub fn summary(&mut self, stats: &DecodeStats) -> io::Result<()> {
        match self.format {
            OutputFormat::Text => {
                writeln!(self.out)?;
                writeln!(self.out, "Summary:")?;
                writeln!(self.out, "  Packets accepted: {}", stats.packets_accepted)?;
                writeln!(self.out, "  Sync misses:      {}", stats.sync_misses)?;
                writeln!(self.out, "  Truncated:        {}", stats.truncated)?;
                writeln!(self.out, "  Checksum errors:  {}", stats.checksum_errors)?;
                writeln!(self.out, "  Out of range:     {}", stats.out_of_range)?;
                writeln!(self.out, "  Bytes skipped:    {}", stats.bytes_skipped)?;
            }
            OutputFormat::Json => {
                serde_json::to_writer(&mut self.out, &JsonSummary { summary: stats })?;
                writeln!(self.out)?;
            }
        }
        self.out.flush()
    }

    #[cfg(test)]
    fn into_inner(self) -> W {
        self.out
    }
}

fn text_line(index: usize, snapshot: usize, r: &PacketRecord) -> String {
    let mut flags = Vec::new();
    if r.crc_error {
        flags.push("CRC_ERR");
    }
    if r.sync_error {
        flags.push("SYNC_ERR");
    }
    if r.header_error {
        flags.push("HDR_ERR");
    }
    if r.timing_set {
        flags.push("TIMING");
    }

    format!(
        "#{} [snap {}] modem {} ({}) ch {} DR {} CR {} crc_en {} freq_off {} snr {} rssi {}/{} ts {} crc 0x{:04X} metrics {} [{}] size {}: {}",
        index,
        snapshot,
        r.modem_id,
        r.modem_class,
        r.channel,
        r.datarate,
        r.coding_rate,
        r.crc_enabled,
        r.frequency_offset_error,
        r.snr_average,
        r.rssi_chan_avg,
        r.rssi_signal_avg,
        r.timestamp_cnt,
        r.rx_crc16,
        r.num_ts_metrics,
        flags.join(","),
        r.size(),
        hex_line(&r.payload).trim_end()
    )
}
