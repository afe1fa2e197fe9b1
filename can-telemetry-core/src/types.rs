//! Core types for the CAN telemetry library
//!
//! This module defines the frame shape shared by live ingestion and trace
//! parsing, the per-signal decode result, and the library error type.

use crate::id::CanId;
use serde::Serialize;
use std::fmt;

/// Result type for telemetry operations
pub type Result<T> = std::result::Result<T, TelemetryError>;

/// Maximum payload length of a classic CAN frame
pub const MAX_DLC: usize = 8;

/// Bus direction of a frame as seen by the logging node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Direction {
    /// Frame received from the bus
    Received,
    /// Frame transmitted by the logging node
    Transmitted,
}

impl Direction {
    /// Short token used by trace files (`Rx` / `Tx`)
    pub fn as_token(&self) -> &'static str {
        match self {
            Direction::Received => "Rx",
            Direction::Transmitted => "Tx",
        }
    }

    /// Parse a trace direction token. Matching is exact, as in PCAN-View output.
    pub fn from_token(token: &str) -> Option<Self> {
        match token {
            "Rx" => Some(Direction::Received),
            "Tx" => Some(Direction::Transmitted),
            _ => None,
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_token())
    }
}

/// One observed CAN frame
///
/// Frames are built once (by the ingestion store or the trace parser) and never
/// mutated afterwards; fields are read through accessors. The payload is held
/// inline so `data().len() == dlc()` always holds and never exceeds 8 bytes.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Frame {
    id: CanId,
    dlc: u8,
    data: [u8; MAX_DLC],
    timestamp_ms: f64,
    absolute_timestamp_ms: i64,
    direction: Direction,
    count: u64,
    period_ms: f64,
}

impl Frame {
    /// Build a frame from a normalized ID and payload.
    ///
    /// Payloads longer than 8 bytes are truncated to the first 8. The occurrence
    /// count starts at 1 with a period of 0; use [`Frame::with_occurrence`] to
    /// set them before the frame is handed out.
    pub fn new(
        id: CanId,
        payload: &[u8],
        direction: Direction,
        timestamp_ms: f64,
        absolute_timestamp_ms: i64,
    ) -> Self {
        let dlc = payload.len().min(MAX_DLC);
        let mut data = [0u8; MAX_DLC];
        data[..dlc].copy_from_slice(&payload[..dlc]);

        Self {
            id,
            dlc: dlc as u8,
            data,
            timestamp_ms,
            absolute_timestamp_ms,
            direction,
            count: 1,
            period_ms: 0.0,
        }
    }

    /// Set the running occurrence count and the time since the previous
    /// occurrence of the same ID
    pub fn with_occurrence(mut self, count: u64, period_ms: f64) -> Self {
        self.count = count;
        self.period_ms = period_ms;
        self
    }

    /// Normalized identifier
    pub fn id(&self) -> &CanId {
        &self.id
    }

    /// Data length code (number of payload bytes)
    pub fn dlc(&self) -> u8 {
        self.dlc
    }

    /// Payload bytes in wire order
    pub fn data(&self) -> &[u8] {
        &self.data[..self.dlc as usize]
    }

    /// Session-relative monotonic timestamp in milliseconds
    pub fn timestamp_ms(&self) -> f64 {
        self.timestamp_ms
    }

    /// Wall-clock time in milliseconds since the Unix epoch (display/export only)
    pub fn absolute_timestamp_ms(&self) -> i64 {
        self.absolute_timestamp_ms
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    /// Occurrences of this ID since session start, this frame included
    pub fn count(&self) -> u64 {
        self.count
    }

    /// Milliseconds since the previous frame with the same ID (0 for the first)
    pub fn period_ms(&self) -> f64 {
        self.period_ms
    }

    /// Payload as space-separated upper-case hex bytes
    pub fn data_hex(&self) -> String {
        self.data()
            .iter()
            .map(|b| format!("{:02X}", b))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Outcome of decoding one signal out of a frame
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SignalValue {
    /// Physical value after scale and offset
    Physical(f64),
    /// No frame for the owning message has been seen
    Missing,
    /// The frame was present but the signal could not be extracted
    Error,
}

impl SignalValue {
    /// Physical value, if one was decoded
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            SignalValue::Physical(v) => Some(*v),
            SignalValue::Missing | SignalValue::Error => None,
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, SignalValue::Error)
    }
}

impl fmt::Display for SignalValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SignalValue::Physical(v) => write!(f, "{}", v),
            SignalValue::Missing => write!(f, "---"),
            SignalValue::Error => write!(f, "ERR"),
        }
    }
}

/// A decoded signal together with its display formatting
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedSignal {
    /// Signal name from the dictionary
    pub name: String,
    /// Decoded value or sentinel
    pub value: SignalValue,
    /// Value rendered with the signal's display precision (no unit)
    pub formatted: String,
    /// Engineering unit, empty when the dictionary declares none
    pub unit: String,
}

/// Errors that can occur in the telemetry core
#[derive(Debug, thiserror::Error)]
pub enum TelemetryError {
    #[error("Failed to parse dictionary: {0}")]
    DictionaryParseError(String),

    #[error("Failed to parse DBC file: {0}")]
    DbcParseError(String),

    #[error("Invalid signal definition: {0}")]
    InvalidSignalDefinition(String),

    #[error("Trace input contains no lines")]
    EmptyTrace,

    #[error("Telemetry store lock poisoned during {0}")]
    StorePoisoned(&'static str),

    #[error("CSV export error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}
