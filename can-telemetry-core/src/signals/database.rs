//! Message/signal dictionary
//!
//! A read-only catalog from normalized CAN ID to message definition. The
//! dictionary is authored with decimal-string keys; every key is routed through
//! [`normalize`] once at load time so lookups by bus ID are a plain map access.
//! A dictionary is never patched in place: merging or reloading produces a new
//! value that callers swap in whole.

use crate::id::{normalize, CanId};
use crate::types::{Result, TelemetryError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// Highest bit index of an 8-byte payload
const MAX_BIT_INDEX: usize = 63;

/// Bit numbering convention of a signal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ByteOrder {
    /// Little-endian (Intel format)
    LittleEndian,
    /// Big-endian (Motorola format)
    BigEndian,
}

/// Declaration of one physical signal inside a message payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignalSpec {
    /// Signal name, unique within its message
    #[serde(default)]
    pub name: String,
    /// Start bit (LSB for Intel, MSB for Motorola)
    pub start_bit: u16,
    /// Width in bits, 1..=64
    pub length: u16,
    #[serde(rename = "isLittleEndian", with = "little_endian_flag")]
    pub byte_order: ByteOrder,
    #[serde(rename = "isSigned", default)]
    pub signed: bool,
    #[serde(default = "default_scale")]
    pub scale: f64,
    #[serde(default)]
    pub offset: f64,
    /// Declared physical minimum (informational)
    #[serde(default)]
    pub min: f64,
    /// Declared physical maximum (informational)
    #[serde(default)]
    pub max: f64,
    /// Engineering unit, empty if none
    #[serde(default)]
    pub unit: String,
}

fn default_scale() -> f64 {
    1.0
}

/// Dictionary files store byte order as an `isLittleEndian` flag
mod little_endian_flag {
    use super::ByteOrder;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(order: &ByteOrder, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_bool(*order == ByteOrder::LittleEndian)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<ByteOrder, D::Error> {
        Ok(if bool::deserialize(deserializer)? {
            ByteOrder::LittleEndian
        } else {
            ByteOrder::BigEndian
        })
    }
}

impl SignalSpec {
    /// Unsigned little-endian signal with unit scale, handy for tests and tools
    pub fn new(name: impl Into<String>, start_bit: u16, length: u16, byte_order: ByteOrder) -> Self {
        Self {
            name: name.into(),
            start_bit,
            length,
            byte_order,
            signed: false,
            scale: 1.0,
            offset: 0.0,
            min: 0.0,
            max: 0.0,
            unit: String::new(),
        }
    }

    pub fn with_signed(mut self, signed: bool) -> Self {
        self.signed = signed;
        self
    }

    pub fn with_scaling(mut self, scale: f64, offset: f64) -> Self {
        self.scale = scale;
        self.offset = offset;
        self
    }

    pub fn with_unit(mut self, unit: impl Into<String>) -> Self {
        self.unit = unit.into();
        self
    }

    /// Absolute payload bit positions read for this signal, most significant
    /// signal bit last for Intel and first for Motorola.
    pub fn bit_positions(&self) -> Vec<usize> {
        let start = self.start_bit as usize;
        let length = self.length as usize;
        match self.byte_order {
            ByteOrder::LittleEndian => (start..start + length).collect(),
            ByteOrder::BigEndian => {
                let mut positions = Vec::with_capacity(length);
                let mut current = start;
                for _ in 0..length {
                    positions.push(current);
                    if current % 8 == 0 {
                        current += 15;
                    } else {
                        current -= 1;
                    }
                }
                positions
            }
        }
    }

    /// Check the declaration against an 8-byte payload
    pub fn validate(&self) -> Result<()> {
        if self.length == 0 || self.length > 64 {
            return Err(TelemetryError::InvalidSignalDefinition(format!(
                "signal '{}' has length {}, expected 1..=64",
                self.name, self.length
            )));
        }

        if let Some(pos) = self.bit_positions().into_iter().find(|p| *p > MAX_BIT_INDEX) {
            return Err(TelemetryError::InvalidSignalDefinition(format!(
                "signal '{}' reaches bit {} beyond an 8-byte payload",
                self.name, pos
            )));
        }

        if !self.scale.is_finite() || !self.offset.is_finite() {
            return Err(TelemetryError::InvalidSignalDefinition(format!(
                "signal '{}' has a non-finite scale or offset",
                self.name
            )));
        }

        Ok(())
    }
}

/// A message definition: name, declared length and its signals
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageSpec {
    pub name: String,
    #[serde(default)]
    pub dlc: u8,
    #[serde(default)]
    pub signals: BTreeMap<String, SignalSpec>,
}

impl MessageSpec {
    pub fn new(name: impl Into<String>, dlc: u8) -> Self {
        Self {
            name: name.into(),
            dlc,
            signals: BTreeMap::new(),
        }
    }

    /// Add a signal keyed by its own name
    pub fn with_signal(mut self, signal: SignalSpec) -> Self {
        self.signals.insert(signal.name.clone(), signal);
        self
    }

    /// Name without a leading `LV_ID_0x<hex>_` tag, underscores shown as spaces
    pub fn display_name(&self) -> String {
        let name = strip_id_tag(&self.name);
        name.replace('_', " ").trim().to_string()
    }
}

fn strip_id_tag(name: &str) -> &str {
    let Some(prefix) = name.get(..8) else {
        return name;
    };
    if !prefix[..7].eq_ignore_ascii_case("LV_ID_0") || !prefix.ends_with(['x', 'X']) {
        return name;
    }

    let rest = &name[8..];
    let hex_len = rest.bytes().take_while(|b| b.is_ascii_hexdigit()).count();
    if hex_len == 0 {
        return name;
    }
    rest[hex_len..].strip_prefix('_').unwrap_or(name)
}

/// The dictionary: normalized CAN ID → message definition
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Dictionary {
    messages: BTreeMap<CanId, MessageSpec>,
}

impl Dictionary {
    /// Create an empty dictionary
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from authored entries keyed by decimal (or hex) ID strings.
    ///
    /// Signal names are filled from their map keys when missing. Invalid signal
    /// declarations are dropped with a warning so the rest of the message
    /// still decodes.
    pub fn from_entries<K, I>(entries: I) -> Self
    where
        K: AsRef<str>,
        I: IntoIterator<Item = (K, MessageSpec)>,
    {
        let mut messages = BTreeMap::new();

        for (key, mut message) in entries {
            let id = normalize(key.as_ref(), false);
            if !id.is_valid() {
                log::warn!("Dictionary key {:?} is not a CAN ID, skipping message '{}'", key.as_ref(), message.name);
                continue;
            }

            message.signals = std::mem::take(&mut message.signals)
                .into_iter()
                .filter_map(|(sig_key, mut signal)| {
                    if signal.name.is_empty() {
                        signal.name = sig_key.clone();
                    }
                    match signal.validate() {
                        Ok(()) => Some((sig_key, signal)),
                        Err(e) => {
                            log::warn!("Dropping signal in message '{}': {}", message.name, e);
                            None
                        }
                    }
                })
                .collect();

            messages.insert(id, message);
        }

        Self { messages }
    }

    /// Parse a JSON dictionary (`{"<decimal id>": {name, dlc, signals}}`)
    pub fn from_json_str(json: &str) -> Result<Self> {
        let entries: BTreeMap<String, MessageSpec> = serde_json::from_str(json)
            .map_err(|e| TelemetryError::DictionaryParseError(e.to_string()))?;
        Ok(Self::from_entries(entries))
    }

    /// Load a JSON dictionary file
    pub fn from_json_file(path: &Path) -> Result<Self> {
        log::info!("Loading dictionary: {:?}", path);
        let content = std::fs::read_to_string(path)?;
        let dictionary = Self::from_json_str(&content).map_err(|e| match e {
            TelemetryError::DictionaryParseError(msg) => {
                TelemetryError::DictionaryParseError(format!("{:?}: {}", path, msg))
            }
            other => other,
        })?;
        log::info!("Loaded {} messages from {:?}", dictionary.messages.len(), path);
        Ok(dictionary)
    }

    /// Load a Vector DBC file
    pub fn from_dbc_file(path: &Path) -> Result<Self> {
        let entries = crate::signals::dbc::parse_dbc_file(path)?;
        Ok(Self::from_entries(entries))
    }

    /// New dictionary holding both; `other` wins where IDs collide
    pub fn merged(&self, other: &Dictionary) -> Dictionary {
        let mut messages = self.messages.clone();
        for (id, message) in &other.messages {
            messages.insert(id.clone(), message.clone());
        }
        Dictionary { messages }
    }

    /// Message definition for a normalized ID
    pub fn get(&self, id: &CanId) -> Option<&MessageSpec> {
        self.messages.get(id)
    }

    /// All messages in ascending ID order
    pub fn messages(&self) -> impl Iterator<Item = (&CanId, &MessageSpec)> {
        self.messages.iter()
    }

    /// Find all messages declaring a signal with the given name
    pub fn find_signal(&self, signal_name: &str) -> Vec<(&CanId, &SignalSpec)> {
        self.messages
            .iter()
            .filter_map(|(id, msg)| msg.signals.get(signal_name).map(|sig| (id, sig)))
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Get dictionary statistics
    pub fn stats(&self) -> DictionaryStats {
        DictionaryStats {
            num_messages: self.messages.len(),
            num_signals: self.messages.values().map(|m| m.signals.len()).sum(),
        }
    }
}

/// Dictionary statistics
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DictionaryStats {
    /// Total number of message definitions
    pub num_messages: usize,
    /// Total number of signal definitions
    pub num_signals: usize,
}
