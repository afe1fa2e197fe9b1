//! Main decoder API
//!
//! The [`Decoder`] owns the active dictionary and is the entry point for
//! loading dictionaries and decoding recorded traces. Loading a dictionary
//! builds a new merged one and swaps it in whole, so an `Arc<Dictionary>`
//! handed out earlier stays valid and unchanged.

use crate::formats::trc;
use crate::message_decoder::MessageDecoder;
use crate::series::TimeSeries;
use crate::signals::database::{Dictionary, DictionaryStats, MessageSpec};
use crate::types::{DecodedSignal, Frame, Result};
use std::path::Path;
use std::sync::Arc;

/// A parsed trace together with its time series
#[derive(Debug, Clone)]
pub struct DecodedTrace {
    pub frames: Vec<Frame>,
    pub series: TimeSeries,
}

/// The main decoder struct - entry point for all decoding operations
#[derive(Debug, Clone, Default)]
pub struct Decoder {
    dictionary: Arc<Dictionary>,
}

impl Decoder {
    /// Create a decoder with an empty dictionary
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_dictionary(dictionary: Dictionary) -> Self {
        Self {
            dictionary: Arc::new(dictionary),
        }
    }

    /// Load a JSON dictionary and merge it over the current one
    ///
    /// # Example
    /// ```no_run
    /// use can_telemetry_core::Decoder;
    /// use std::path::Path;
    ///
    /// let mut decoder = Decoder::new();
    /// decoder.add_json(Path::new("battery.json")).unwrap();
    /// ```
    pub fn add_json(&mut self, path: &Path) -> Result<()> {
        let loaded = Dictionary::from_json_file(path)?;
        self.merge(loaded);
        Ok(())
    }

    /// Load a DBC file and merge it over the current dictionary
    pub fn add_dbc(&mut self, path: &Path) -> Result<()> {
        log::info!("Loading DBC file: {:?}", path);
        let loaded = Dictionary::from_dbc_file(path)?;
        self.merge(loaded);
        log::info!("DBC file loaded successfully: {:?}", path);
        Ok(())
    }

    /// Replace the dictionary with `self ∪ other`, `other` winning collisions
    pub fn merge(&mut self, other: Dictionary) {
        self.dictionary = Arc::new(self.dictionary.merged(&other));
    }

    /// Shared handle to the active dictionary
    pub fn dictionary(&self) -> Arc<Dictionary> {
        Arc::clone(&self.dictionary)
    }

    pub fn dictionary_stats(&self) -> DictionaryStats {
        self.dictionary.stats()
    }

    /// Decode a frame against the active dictionary
    pub fn decode_frame(&self, frame: &Frame) -> Option<(&MessageSpec, Vec<DecodedSignal>)> {
        MessageDecoder::decode_frame(frame, &self.dictionary)
    }

    /// Build the carried-forward time series for frames
    pub fn time_series(&self, frames: &[Frame], selection: Option<&[String]>) -> TimeSeries {
        TimeSeries::from_frames(frames, &self.dictionary, selection)
    }

    /// Parse a `.trc` file and materialize its time series
    pub fn decode_trace_file(&self, path: &Path, selection: Option<&[String]>) -> Result<DecodedTrace> {
        let frames = trc::parse_file(path)?;
        let series = self.time_series(&frames, selection);
        Ok(DecodedTrace { frames, series })
    }

    /// Parse trace text and materialize its time series
    pub fn decode_trace(&self, text: &str, selection: Option<&[String]>) -> Result<DecodedTrace> {
        let frames = trc::parse(text)?;
        let series = self.time_series(&frames, selection);
        Ok(DecodedTrace { frames, series })
    }
}
