//! CAN Telemetry CLI Application
//!
//! Command-line front end for the can-telemetry-core library:
//! - `decode`: decode a recorded PCAN trace and print range statistics
//! - `live`: ingest `ID#DLC#B0,B1,...` lines from a device or stdin,
//!   then export the session as TRC and/or CSV

use anyhow::{Context, Result};
use can_telemetry_core::formats::{csv as csv_export, trc, LineAssembler, ReaderSource};
use can_telemetry_core::{
    compute_window_stats, pump, Decoder, Scheduler, StatsWindow, TelemetryHandle, TelemetryStore,
};
use clap::{Parser, Subcommand};
use std::fs::File;
use std::io::{self, Read};
use std::path::{Path, PathBuf};

mod config;
mod report;

use config::AppConfig;

/// CAN Telemetry - Live CAN ingestion, trace decoding and statistics
#[derive(Parser, Debug)]
#[command(name = "can-telemetry")]
#[command(about = "Ingest, decode and analyze CAN telemetry", long_about = None)]
#[command(version)]
struct Args {
    #[command(subcommand)]
    command: Command,

    /// Path to configuration file (config.toml)
    #[arg(short, long, value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    /// Path to JSON dictionary file(s) (can be repeated)
    #[arg(long, value_name = "FILE", global = true)]
    dictionary: Vec<PathBuf>,

    /// Path to DBC file(s) (can be repeated)
    #[arg(long, value_name = "FILE", global = true)]
    dbc: Vec<PathBuf>,

    /// Verbosity level (can be repeated: -v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    quiet: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Decode a PCAN .trc trace and print signal statistics
    Decode {
        /// Trace file to decode
        #[arg(value_name = "TRACE")]
        trace: PathBuf,

        /// Window start in milliseconds (session time)
        #[arg(long, value_name = "MS")]
        from: Option<f64>,

        /// Window end in milliseconds (session time)
        #[arg(long, value_name = "MS")]
        to: Option<f64>,

        /// Signal(s) to decode (can be repeated, default: all)
        #[arg(long, value_name = "NAME")]
        signal: Vec<String>,

        /// Write decoded signals as CSV
        #[arg(long, value_name = "FILE")]
        csv: Option<PathBuf>,
    },

    /// Ingest live frame lines until end of input
    Live {
        /// Line source (default: stdin)
        #[arg(short, long, value_name = "FILE")]
        input: Option<PathBuf>,

        /// Export the session history as a .trc trace
        #[arg(long, value_name = "FILE")]
        trc: Option<PathBuf>,

        /// Export the session history as decoded CSV
        #[arg(long, value_name = "FILE")]
        csv: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    let args = Args::parse();

    init_logging(args.verbose, args.quiet);

    log::info!("CAN Telemetry CLI v{}", env!("CARGO_PKG_VERSION"));
    log::debug!("Using core library v{}", can_telemetry_core::VERSION);

    let mut config = match &args.config {
        Some(path) => {
            log::info!("Loading configuration from: {:?}", path);
            config::load_config(path)?
        }
        None => AppConfig::default(),
    };
    config
        .dictionary
        .json_files
        .extend(args.dictionary.iter().cloned());
    config.dictionary.dbc_files.extend(args.dbc.iter().cloned());

    let decoder = load_decoder(&config)?;

    match args.command {
        Command::Decode {
            trace,
            from,
            to,
            signal,
            csv,
        } => {
            let signals = if signal.is_empty() {
                config.export.signals.clone()
            } else {
                signal
            };
            let csv = csv.or_else(|| config.export.csv.clone());
            decode_mode(&decoder, &trace, from, to, &signals, csv)
        }
        Command::Live { input, trc, csv } => {
            let trc = trc.or_else(|| config.export.trc.clone());
            let csv = csv.or_else(|| config.export.csv.clone());
            live_mode(&decoder, &config, input, trc, csv)
        }
    }
}

/// Build the decoder from every configured dictionary, JSON first
fn load_decoder(config: &AppConfig) -> Result<Decoder> {
    let mut decoder = Decoder::new();

    for path in &config.dictionary.json_files {
        decoder
            .add_json(path)
            .with_context(|| format!("Failed to load dictionary: {:?}", path))?;
    }
    for path in &config.dictionary.dbc_files {
        decoder
            .add_dbc(path)
            .with_context(|| format!("Failed to load DBC: {:?}", path))?;
    }

    let stats = decoder.dictionary_stats();
    log::info!(
        "Dictionary: {} messages, {} signals",
        stats.num_messages,
        stats.num_signals
    );
    Ok(decoder)
}

fn decode_mode(
    decoder: &Decoder,
    trace: &Path,
    from: Option<f64>,
    to: Option<f64>,
    signals: &[String],
    csv: Option<PathBuf>,
) -> Result<()> {
    let selection = (!signals.is_empty()).then_some(signals);

    log::info!("Decoding trace: {:?}", trace);
    let decoded = decoder
        .decode_trace_file(trace, selection)
        .with_context(|| format!("Failed to decode trace: {:?}", trace))?;
    log::info!(
        "{} frames, {} decoded rows",
        decoded.frames.len(),
        decoded.series.len()
    );

    let series = &decoded.series;
    let window = match (from, to, series.time_span()) {
        (None, None, _) => StatsWindow::Session,
        (start, end, Some((first, last))) => StatsWindow::Selection {
            start_ms: start.unwrap_or(first),
            end_ms: end.unwrap_or(last),
        },
        (start, end, None) => StatsWindow::Selection {
            start_ms: start.unwrap_or(0.0),
            end_ms: end.unwrap_or(0.0),
        },
    };

    let stats = compute_window_stats(series, series.signals(), window);
    report::print_stats_table(&stats, &decoder.dictionary());

    if let Some(path) = csv {
        let rows =
            csv_export::write_decoded_file(&decoded.frames, &decoder.dictionary(), selection, &path)
                .with_context(|| format!("Failed to write CSV: {:?}", path))?;
        log::info!("Wrote {} rows to {:?}", rows, path);
    }

    Ok(())
}

fn live_mode(
    decoder: &Decoder,
    config: &AppConfig,
    input: Option<PathBuf>,
    trc_out: Option<PathBuf>,
    csv_out: Option<PathBuf>,
) -> Result<()> {
    let reader: Box<dyn Read> = match &input {
        Some(path) => {
            log::info!("Reading frames from {:?}", path);
            Box::new(File::open(path).with_context(|| format!("Failed to open input: {:?}", path))?)
        }
        None => {
            log::info!("Reading frames from stdin");
            Box::new(io::stdin())
        }
    };

    let handle = TelemetryHandle::new(TelemetryStore::with_system_clock(config.pipeline.clone()));
    let scheduler = Scheduler::spawn(handle.clone(), &config.pipeline)?;

    let mut source = ReaderSource::new(reader);
    let mut assembler = LineAssembler::new();
    let pumped = pump(&mut source, &mut assembler, &handle);

    scheduler.stop();
    let pump_stats = pumped.context("Failed while reading frame lines")?;
    handle.flush()?;
    log::info!(
        "{} lines read, {} accepted, {} rejected, {} malformed",
        pump_stats.lines,
        pump_stats.accepted,
        pump_stats.rejected,
        assembler.malformed()
    );

    let dictionary = decoder.dictionary();
    let (live, store_stats) = handle.with_store(|s| (s.live_messages(&dictionary), s.stats()))?;
    report::print_live_messages(&live);
    report::print_store_stats(&store_stats);

    let history = handle.history()?;
    if let Some(path) = trc_out {
        trc::write_file(&history, &path).with_context(|| format!("Failed to write trace: {:?}", path))?;
        log::info!("Wrote {} frames to {:?}", history.len(), path);
    }
    if let Some(path) = csv_out {
        let rows = csv_export::write_decoded_file(&history, &dictionary, None, &path)
            .with_context(|| format!("Failed to write CSV: {:?}", path))?;
        log::info!("Wrote {} rows to {:?}", rows, path);
    }

    Ok(())
}

/// Initialize logging based on verbosity level
fn init_logging(verbose: u8, quiet: bool) {
    use env_logger::Builder;
    use log::LevelFilter;
    use std::io::Write;

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
