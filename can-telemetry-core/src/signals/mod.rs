//! Message/signal dictionary and its loaders
//!
//! Dictionaries come from JSON files keyed by decimal CAN ID or from
//! Vector DBC files; both end up in the same [`Dictionary`].

pub mod database;
pub mod dbc;

pub use database::{ByteOrder, Dictionary, DictionaryStats, MessageSpec, SignalSpec};
