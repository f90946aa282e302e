//! SX1302 RX Buffer Replay CLI
//!
//! Command-line front end for the sx1302-rx-decoder library. Captured RX FIFO
//! snapshots are queued on a replay backend, fetched exactly as from the
//! chip, decoded, and printed as text or JSON lines.

use anyhow::{Context, Result};
use clap::Parser;
use std::io::{self, Write};
use std::path::PathBuf;
use sx1302_rx_decoder::{FrameDecoder, ReplayInterface, RxBuffer, TransportError};

mod capture;
mod config;
mod report;

use config::{AppConfig, OutputFormat};
use report::Reporter;

/// SX1302 RX - Decode captured concentrator RX buffer snapshots
#[derive(Parser, Debug)]
#[command(name = "sx1302-rx")]
#[command(about = "Decode captured SX1302/SX1303 RX buffer snapshots", long_about = None)]
#[command(version)]
struct Args {
    /// Capture file with one hex snapshot per line (can be repeated)
    #[arg(long, value_name = "FILE")]
    capture: Vec<PathBuf>,

    /// Path to configuration file (config.toml)
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Output format
    #[arg(short, long, value_enum)]
    format: Option<OutputFormat>,

    /// Use the modem id layout of the 16-channel FPGA board
    #[arg(long)]
    fpga_16ch: bool,

    /// Stop after this many decoded packets
    #[arg(long, value_name = "COUNT")]
    max_packets: Option<usize>,

    /// Verbosity level (can be repeated: -v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long)]
    quiet: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();

    init_logging(args.verbose, args.quiet);

    log::info!("SX1302 RX CLI v{}", env!("CARGO_PKG_VERSION"));
    log::info!("Using decoder library v{}", sx1302_rx_decoder::VERSION);

    let config = resolve_config(&args)?;
    if config.input.captures.is_empty() {
        println!("SX1302 RX - No capture specified");
        println!("\nQuick Start:");
        println!("  sx1302-rx --capture gateway.hex");
        println!("  sx1302-rx --capture gateway.hex --format json");
        println!("\nWith a configuration file:");
        println!("  sx1302-rx --config config.toml");
        println!("\nUse --help for more options");
        return Ok(());
    }

    let mut snapshots = Vec::new();
    for path in &config.input.captures {
        let loaded = capture::load_capture(path)?;
        log::info!("Loaded {} snapshot(s) from {:?}", loaded.len(), path);
        snapshots.extend(loaded);
    }

    let stdout = io::stdout();
    let mut reporter = Reporter::new(stdout.lock(), config.output.format);
    let mut decoder = FrameDecoder::new(config.decoder.clone());
    let packets = replay(snapshots, &config, &mut decoder, &mut reporter)?;
    log::info!("Decoded {} packet(s)", packets);
    reporter.summary(&decoder.stats())?;

    Ok(())
}

/// Merge the configuration file with the command line; flags win
fn resolve_config(args: &Args) -> Result<AppConfig> {
    let mut config = match &args.config {
        Some(path) => {
            log::info!("Loading configuration from: {:?}", path);
            config::load_config(path)?
        }
        None => AppConfig::default(),
    };

    config.input.captures.extend(args.capture.iter().cloned());
    if let Some(format) = args.format {
        config.output.format = format;
    }
    if args.max_packets.is_some() {
        config.output.max_packets = args.max_packets;
    }
    if args.fpga_16ch {
        let capacity = config.decoder.buffer_capacity;
        config.decoder = sx1302_rx_decoder::DecoderConfig::fpga_16ch().with_buffer_capacity(capacity);
    }

    log::debug!("Decoder configuration: {:?}", config.decoder);
    Ok(config)
}

/// Run every snapshot through the fetch/decode cycle
///
/// Returns the number of packets written.
fn replay<W: Write>(
    snapshots: Vec<Vec<u8>>,
    config: &AppConfig,
    decoder: &mut FrameDecoder,
    reporter: &mut Reporter<W>,
) -> Result<usize> {
    let limit = config.output.max_packets.unwrap_or(usize::MAX);
    let mut hw = ReplayInterface::with_snapshots(snapshots);
    let mut buffer = RxBuffer::with_config(&config.decoder);
    let mut index = 0;

    while hw.pending_snapshots() > 0 && reporter.packets() < limit {
        match buffer.fetch(&mut hw) {
            Ok(nb_bytes) => log::debug!("Snapshot {}: {} bytes", index, nb_bytes),
            Err(err @ TransportError::Oversized { .. }) => {
                return Err(err).with_context(|| {
                    format!("Snapshot {} does not fit the configured RX buffer", index)
                });
            }
            Err(err) => return Err(err).with_context(|| format!("Failed to fetch snapshot {}", index)),
        }

        for result in decoder.packets(&mut buffer) {
            // Rejections are already logged by the decoder
            if let Ok(record) = result {
                reporter.packet(index, &record)?;
                if reporter.packets() >= limit {
                    log::info!("Reached the limit of {} packet(s)", limit);
                    break;
                }
            }
        }
        index += 1;
    }

    Ok(reporter.packets())
}

/// Initialize logging based on verbosity level
fn init_logging(verbose: u8, quiet: bool) {
    use env_logger::Builder;
    use log::LevelFilter;

    let level = if quiet {
        LevelFilter::Error
    } else {
        match verbose {
            0 => LevelFilter::Info,
            1 => LevelFilter::Debug,
            _ => LevelFilter::Trace,
        }
    };

    Builder::new()
        .filter_level(level)
        .format(|buf, record| {
            writeln!(
                buf,
                "[{} {}] {}",
                record.level(),
                record.target(),
                record.args()
            )
        })
        .init();
}
