//! CAN identifier normalization
//!
//! Dictionary keys are authored as decimal strings while bus sources always
//! report hexadecimal IDs, sometimes with a `0x` prefix, an `h` suffix or
//! hardware flag bits (extended, RTR, error) set above bit 28. Everything is
//! routed through [`normalize`] into one masked, upper-case hexadecimal key
//! space so the two sides compare equal.

use serde::Serialize;
use std::cmp::Ordering;
use std::fmt;

/// Mask keeping the 29 identifier bits of an extended CAN ID
pub const CAN_ID_MASK: u32 = 0x1FFF_FFFF;

/// Highest standard (11-bit) identifier
pub const MAX_STANDARD_ID: u32 = 0x7FF;

/// Canonical CAN identifier: masked, upper-case hex, no prefix, no padding.
///
/// An input that could not be parsed keeps its cleaned text (trimmed and
/// upper-cased). Such an ID never matches a dictionary entry. Re-normalizing a
/// canonical ID with `force_hex = true` yields the same ID.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct CanId(String);

/// Raw identifier as handed to [`normalize`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RawId<'a> {
    Numeric(u64),
    Text(&'a str),
}

impl From<u32> for RawId<'_> {
    fn from(value: u32) -> Self {
        RawId::Numeric(value as u64)
    }
}

impl From<u64> for RawId<'_> {
    fn from(value: u64) -> Self {
        RawId::Numeric(value)
    }
}

impl<'a> From<&'a str> for RawId<'a> {
    fn from(value: &'a str) -> Self {
        RawId::Text(value)
    }
}

impl<'a> From<&'a String> for RawId<'a> {
    fn from(value: &'a String) -> Self {
        RawId::Text(value.as_str())
    }
}

impl<'a> From<&'a CanId> for RawId<'a> {
    fn from(value: &'a CanId) -> Self {
        RawId::Text(value.as_str())
    }
}

/// Normalize a raw identifier into the canonical masked hex form.
///
/// `force_hex` must be set for bus-sourced text, where an all-digit ID such as
/// `"10281050"` is still hexadecimal. Dictionary keys use `force_hex = false`,
/// so all-digit strings are read as decimal.
pub fn normalize<'a>(raw: impl Into<RawId<'a>>, force_hex: bool) -> CanId {
    match raw.into() {
        RawId::Numeric(value) => CanId::from_value(value),
        RawId::Text(text) => {
            let cleaned = text.trim().to_uppercase();

            let parsed = if let Some(body) = cleaned.strip_suffix('H') {
                parse_digits(body, 16)
            } else if let Some(body) = cleaned.strip_prefix("0X") {
                parse_digits(body, 16)
            } else if force_hex {
                parse_digits(&cleaned, 16)
            } else if !cleaned.is_empty() && cleaned.bytes().all(|b| b.is_ascii_digit()) {
                parse_digits(&cleaned, 10)
            } else {
                parse_digits(&cleaned, 16)
            };

            match parsed {
                Some(value) => CanId::from_value(value),
                None => CanId(cleaned),
            }
        }
    }
}

/// Parse digits in the given radix, keeping only the low 64 bits.
///
/// Wrapping arithmetic is exact modulo 2^64, which is all the 29-bit mask
/// needs, so arbitrarily long inputs behave like an unbounded integer.
fn parse_digits(digits: &str, radix: u32) -> Option<u64> {
    if digits.is_empty() {
        return None;
    }

    let mut acc: u64 = 0;
    for c in digits.chars() {
        let digit = c.to_digit(radix)?;
        acc = acc.wrapping_mul(radix as u64).wrapping_add(digit as u64);
    }
    Some(acc)
}

impl CanId {
    fn from_value(value: u64) -> Self {
        let masked = (value as u32) & CAN_ID_MASK;
        CanId(format!("{:X}", masked))
    }

    /// Canonical text
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Numeric value, `None` for degraded (unparseable) IDs
    pub fn value(&self) -> Option<u32> {
        if self.0.is_empty() || self.0.len() > 8 || !self.0.bytes().all(|b| b.is_ascii_hexdigit()) {
            return None;
        }
        u32::from_str_radix(&self.0, 16).ok()
    }

    /// True when the ID parsed into the canonical numeric space
    pub fn is_valid(&self) -> bool {
        self.value().is_some()
    }

    /// True for 29-bit identifiers above the standard range
    pub fn is_extended(&self) -> bool {
        self.value().is_some_and(|v| v > MAX_STANDARD_ID)
    }

    /// Zero-padded form for tables: 3 digits for standard IDs, 8 for extended
    pub fn display_padded(&self) -> String {
        match self.value() {
            Some(v) if v <= MAX_STANDARD_ID => format!("{:03X}", v),
            Some(v) => format!("{:08X}", v),
            None => self.0.clone(),
        }
    }

    /// Padded form with a `0x` prefix
    pub fn display_hex(&self) -> String {
        format!("0x{}", self.display_padded())
    }
}

impl fmt::Display for CanId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// Numeric order first so dictionaries iterate like their decimal keys sort;
// degraded IDs go last in text order.
impl Ord for CanId {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self.value(), other.value()) {
            (Some(a), Some(b)) => a.cmp(&b),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => self.0.cmp(&other.0),
        }
    }
}

impl PartialOrd for CanId {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
