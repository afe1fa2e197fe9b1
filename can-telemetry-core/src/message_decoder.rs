//! Message Decoding Engine
//!
//! Extracts signal values from raw CAN payloads based on dictionary signal
//! declarations. Handles bit extraction for both byte orders, sign extension
//! and physical value conversion, plus the display formatting used by tables
//! and exports.
//!
//! Short payloads decode best-effort: any bit that falls outside the
//! available bytes reads as 0.

use crate::signals::database::{ByteOrder, Dictionary, MessageSpec, SignalSpec};
use crate::types::{DecodedSignal, Frame, SignalValue};

/// Per-signal decode failure. Local to one signal, never fatal to a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    #[error("signal length {0} is outside 1..=64")]
    InvalidLength(u16),

    #[error("physical value is not finite")]
    NonFinite,
}

/// Message decoder - extracts signals from CAN payloads
pub struct MessageDecoder;

impl MessageDecoder {
    /// Decode every signal of `message` from the frame payload.
    ///
    /// Signals come back in the message's signal order. A signal that fails
    /// carries [`SignalValue::Error`] and does not stop the others.
    pub fn decode_message(frame: &Frame, message: &MessageSpec) -> Vec<DecodedSignal> {
        message
            .signals
            .values()
            .map(|signal| Self::decode_to_display(frame.data(), signal))
            .collect()
    }

    /// Look the frame's ID up in the dictionary and decode it
    pub fn decode_frame<'d>(
        frame: &Frame,
        dictionary: &'d Dictionary,
    ) -> Option<(&'d MessageSpec, Vec<DecodedSignal>)> {
        let message = dictionary.get(frame.id())?;
        Some((message, Self::decode_message(frame, message)))
    }

    /// Decode a single signal into its physical value
    pub fn decode_signal(data: &[u8], signal: &SignalSpec) -> Result<f64, DecodeError> {
        let raw = Self::extract_raw(data, signal)?;

        let numeric = if signal.signed {
            Self::sign_extend(raw, signal.length as usize) as f64
        } else {
            raw as f64
        };

        let physical = numeric * signal.scale + signal.offset;
        if !physical.is_finite() {
            return Err(DecodeError::NonFinite);
        }
        Ok(physical)
    }

    /// Extract the unsigned raw bits of a signal
    pub fn extract_raw(data: &[u8], signal: &SignalSpec) -> Result<u64, DecodeError> {
        let length = signal.length as usize;
        if length == 0 || length > 64 {
            return Err(DecodeError::InvalidLength(signal.length));
        }

        let start_bit = signal.start_bit as usize;
        Ok(match signal.byte_order {
            ByteOrder::LittleEndian => Self::extract_little_endian(data, start_bit, length),
            ByteOrder::BigEndian => Self::extract_big_endian(data, start_bit, length),
        })
    }

    /// Render a physical value the way tables and exports show it
    pub fn format_value(value: f64, signal: &SignalSpec) -> String {
        if Self::is_flag(signal) {
            return format!("{}", value.round() as i64);
        }
        format!("{:.*}", Self::display_precision(signal), value)
    }

    /// Number of decimals shown for a signal: the fractional digits of its
    /// scale, at least one
    pub fn display_precision(signal: &SignalSpec) -> usize {
        let scale = format!("{}", signal.scale.abs());
        scale
            .split_once('.')
            .map(|(_, fraction)| fraction.len())
            .unwrap_or(0)
            .max(1)
    }

    fn is_flag(signal: &SignalSpec) -> bool {
        signal.length == 1 && !signal.signed && signal.scale == 1.0 && signal.offset == 0.0
    }

    fn decode_to_display(data: &[u8], signal: &SignalSpec) -> DecodedSignal {
        let (value, formatted) = match Self::decode_signal(data, signal) {
            Ok(v) => (SignalValue::Physical(v), Self::format_value(v, signal)),
            Err(e) => {
                log::trace!("Signal '{}' failed to decode: {}", signal.name, e);
                (SignalValue::Error, SignalValue::Error.to_string())
            }
        };

        DecodedSignal {
            name: signal.name.clone(),
            value,
            formatted,
            unit: signal.unit.clone(),
        }
    }

    /// Extract signal with little-endian (Intel) byte order
    ///
    /// - Start bit points to the LSB of the signal
    /// - Bits are numbered LSB-first within each byte
    /// - Signal bit `i` becomes raw bit `i`
    fn extract_little_endian(data: &[u8], start_bit: usize, length: usize) -> u64 {
        let mut result: u64 = 0;

        for i in 0..length {
            let bit_pos = start_bit + i;
            let byte_idx = bit_pos / 8;
            let bit_in_byte = bit_pos % 8;

            if byte_idx < data.len() {
                let bit_value = (data[byte_idx] >> bit_in_byte) & 0x01;
                result |= (bit_value as u64) << i;
            }
        }

        result
    }

    /// Extract signal with big-endian (Motorola) byte order
    ///
    /// - Start bit points to the MSB of the signal
    /// - From a byte boundary (bit index multiple of 8) the walk jumps
    ///   forward 15 positions, otherwise it steps back one
    /// - The first bit read is the top bit of the raw value
    fn extract_big_endian(data: &[u8], start_bit: usize, length: usize) -> u64 {
        let mut result: u64 = 0;
        let mut bit_pos = start_bit;

        for i in 0..length {
            let byte_idx = bit_pos / 8;
            let bit_in_byte = bit_pos % 8;

            if byte_idx < data.len() {
                let bit_value = (data[byte_idx] >> bit_in_byte) & 0x01;
                result |= (bit_value as u64) << (length - 1 - i);
            }

            if bit_pos % 8 == 0 {
                bit_pos += 15;
            } else {
                bit_pos -= 1;
            }
        }

        result
    }

    /// Sign-extend a value from N bits to 64 bits
    ///
    /// If the value's MSB is 1, fill the upper bits with 1s.
    fn sign_extend(value: u64, bit_length: usize) -> i64 {
        if bit_length >= 64 {
            return value as i64;
        }

        let sign_bit = 1u64 << (bit_length - 1);
        if (value & sign_bit) != 0 {
            let mask = !0u64 << bit_length;
            (value | mask) as i64
        } else {
            value as i64
        }
    }
}
