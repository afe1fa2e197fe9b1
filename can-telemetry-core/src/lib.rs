//! CAN Telemetry Library
//!
//! Ingests CAN frames from a live line-oriented bridge or from recorded
//! PCAN-View traces, decodes them through a message/signal dictionary and
//! computes range statistics over the resulting signal time series.
//!
//! # Architecture
//!
//! - [`id`] puts dictionary keys (decimal) and bus IDs (hex) into one space
//! - [`message_decoder`] extracts physical values from payload bits
//! - [`store`] and [`pipeline`] stage live frames, publish them in batches
//!   and age out quiet IDs
//! - [`formats`] reads and writes the live line protocol, `.trc` and CSV
//! - [`series`] and [`stats`] turn frames into time series and summaries
//!
//! # Example Usage
//!
//! ```no_run
//! use can_telemetry_core::{compute_stats, Decoder};
//! use std::path::Path;
//!
//! let mut decoder = Decoder::new();
//! decoder.add_json(Path::new("battery.json")).unwrap();
//!
//! let trace = decoder.decode_trace_file(Path::new("session.trc"), None).unwrap();
//! if let Some((start, end)) = trace.series.time_span() {
//!     let stats = compute_stats(&trace.series, trace.series.signals(), start, end);
//!     for (name, s) in stats {
//!         println!("{}: min={} max={} avg={}", name, s.min, s.max, s.avg);
//!     }
//! }
//! ```

pub mod clock;
pub mod config;
pub mod decoder;
pub mod formats;
pub mod id;
pub mod message_decoder;
pub mod pipeline;
pub mod series;
pub mod signals;
pub mod stats;
pub mod store;
pub mod types;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{EvictionPolicy, PipelineConfig};
pub use decoder::{DecodedTrace, Decoder};
pub use id::{normalize, CanId};
pub use message_decoder::{DecodeError, MessageDecoder};
pub use pipeline::{pump, Scheduler, TelemetryHandle};
pub use series::TimeSeries;
pub use signals::{ByteOrder, Dictionary, DictionaryStats, MessageSpec, SignalSpec};
pub use stats::{compute_stats, compute_window_stats, SignalStats, StatsWindow};
pub use store::{IngestOutcome, LiveMessage, TelemetryStore};
pub use types::{DecodedSignal, Direction, Frame, Result, SignalValue, TelemetryError};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
