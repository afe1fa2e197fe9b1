//! Materialized signal time series
//!
//! Frames are replayed in order through the dictionary. Each signal keeps its
//! last known value, and a row is emitted whenever a frame updates at least
//! one tracked signal, so a row holds the full carried-forward state at that
//! instant.

use crate::id::CanId;
use crate::message_decoder::MessageDecoder;
use crate::signals::database::{Dictionary, SignalSpec};
use crate::types::Frame;
use std::collections::{HashMap, HashSet};

/// Tracked signal columns and which message feeds each one
#[derive(Debug, Clone)]
pub struct ColumnPlan<'d> {
    names: Vec<String>,
    by_id: HashMap<CanId, Vec<(usize, &'d SignalSpec)>>,
}

impl<'d> ColumnPlan<'d> {
    /// Columns for every dictionary signal whose message appears in `frames`,
    /// in dictionary order. `selection` keeps only the named signals.
    pub fn new(dictionary: &'d Dictionary, frames: &[Frame], selection: Option<&[String]>) -> Self {
        let observed: HashSet<&CanId> = frames.iter().map(|f| f.id()).collect();
        let mut names = Vec::new();
        let mut by_id: HashMap<CanId, Vec<(usize, &'d SignalSpec)>> = HashMap::new();

        for (id, message) in dictionary.messages() {
            if !observed.contains(id) {
                continue;
            }
            for signal in message.signals.values() {
                if selection.is_some_and(|wanted| !wanted.iter().any(|n| *n == signal.name)) {
                    continue;
                }
                by_id
                    .entry(id.clone())
                    .or_default()
                    .push((names.len(), signal));
                names.push(signal.name.clone());
            }
        }

        Self { names, by_id }
    }

    /// Column names in order
    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// Columns fed by a message ID
    pub fn columns_for(&self, id: &CanId) -> Option<&[(usize, &'d SignalSpec)]> {
        self.by_id.get(id).map(Vec::as_slice)
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

/// One time-series row: timestamp plus one slot per column
#[derive(Debug, Clone, PartialEq)]
pub struct SeriesRow {
    pub time_ms: f64,
    pub values: Vec<Option<f64>>,
}

/// Rows sorted by time, columns named by signal
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TimeSeries {
    signals: Vec<String>,
    rows: Vec<SeriesRow>,
}

impl TimeSeries {
    pub fn new(signals: Vec<String>) -> Self {
        Self {
            signals,
            rows: Vec::new(),
        }
    }

    /// Build from `(time, value-per-column)` rows
    pub fn from_rows<I>(signals: Vec<String>, rows: I) -> Self
    where
        I: IntoIterator<Item = (f64, Vec<Option<f64>>)>,
    {
        let mut series = Self::new(signals);
        for (time_ms, values) in rows {
            series.push(time_ms, values);
        }
        series
    }

    /// Replay frames through the dictionary with carry-forward semantics
    pub fn from_frames(frames: &[Frame], dictionary: &Dictionary, selection: Option<&[String]>) -> Self {
        let plan = ColumnPlan::new(dictionary, frames, selection);
        let mut series = Self::new(plan.names().to_vec());
        let mut current: Vec<Option<f64>> = vec![None; plan.names().len()];

        for frame in frames {
            let Some(columns) = plan.columns_for(frame.id()) else {
                continue;
            };

            let mut updated = false;
            for &(col, signal) in columns {
                if let Ok(value) = MessageDecoder::decode_signal(frame.data(), signal) {
                    current[col] = Some(value);
                    updated = true;
                }
            }

            if updated {
                series.push(frame.timestamp_ms(), current.clone());
            }
        }

        log::debug!(
            "Built time series: {} signals, {} rows",
            series.signals.len(),
            series.rows.len()
        );
        series
    }

    /// Insert a row, keeping rows ordered by time. Rows with equal times keep
    /// insertion order. Missing slots are padded with `None`.
    ///
    /// Rows with a non-finite time have no place in the ordering and are
    /// ignored.
    pub fn push(&mut self, time_ms: f64, mut values: Vec<Option<f64>>) {
        if !time_ms.is_finite() {
            log::trace!("Ignoring series row at non-finite time {}", time_ms);
            return;
        }
        values.resize(self.signals.len(), None);
        let row = SeriesRow { time_ms, values };

        match self.rows.last() {
            Some(last) if last.time_ms > time_ms => {
                let at = self.rows.partition_point(|r| r.time_ms <= time_ms);
                self.rows.insert(at, row);
            }
            _ => self.rows.push(row),
        }
    }

    pub fn signals(&self) -> &[String] {
        &self.signals
    }

    /// Column index of a signal
    pub fn column(&self, name: &str) -> Option<usize> {
        self.signals.iter().position(|s| s == name)
    }

    pub fn rows(&self) -> &[SeriesRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// First and last row times
    pub fn time_span(&self) -> Option<(f64, f64)> {
        Some((self.rows.first()?.time_ms, self.rows.last()?.time_ms))
    }

    /// Rows with `start <= time <= end`
    pub fn window(&self, start_ms: f64, end_ms: f64) -> &[SeriesRow] {
        let lo = self.rows.partition_point(|r| r.time_ms < start_ms);
        let hi = self.rows.partition_point(|r| r.time_ms <= end_ms);
        if lo >= hi {
            return &[];
        }
        &self.rows[lo..hi]
    }
}
