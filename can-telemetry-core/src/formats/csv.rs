//! Decoded-signal CSV export
//!
//! One `timestamp` column (seconds, 3 decimals) followed by one column per
//! dictionary signal whose message occurs in the frames. Each row carries the
//! last formatted value of every column forward; columns not yet seen stay
//! empty and a signal that fails to decode writes `ERR`.

use crate::message_decoder::MessageDecoder;
use crate::series::ColumnPlan;
use crate::signals::database::Dictionary;
use crate::types::{Frame, Result, SignalValue};
use std::io::Write;
use std::path::Path;

/// Write decoded frames as CSV. Returns the number of data rows written.
pub fn write_decoded<W: Write>(
    frames: &[Frame],
    dictionary: &Dictionary,
    selection: Option<&[String]>,
    writer: W,
) -> Result<usize> {
    let plan = ColumnPlan::new(dictionary, frames, selection);
    let mut csv_writer = csv::Writer::from_writer(writer);

    let mut header = Vec::with_capacity(plan.names().len() + 1);
    header.push("timestamp".to_string());
    header.extend(plan.names().iter().cloned());
    csv_writer.write_record(&header)?;

    let mut current = vec![String::new(); plan.names().len()];
    let mut rows = 0;

    for frame in frames {
        let Some(columns) = plan.columns_for(frame.id()) else {
            continue;
        };

        for &(col, signal) in columns {
            current[col] = match MessageDecoder::decode_signal(frame.data(), signal) {
                Ok(value) => MessageDecoder::format_value(value, signal),
                Err(_) => SignalValue::Error.to_string(),
            };
        }

        let mut record = Vec::with_capacity(current.len() + 1);
        record.push(format!("{:.3}", frame.timestamp_ms() / 1000.0));
        record.extend(current.iter().cloned());
        csv_writer.write_record(&record)?;
        rows += 1;
    }

    csv_writer.flush()?;
    Ok(rows)
}

/// Write decoded frames to a CSV file
pub fn write_decoded_file(
    frames: &[Frame],
    dictionary: &Dictionary,
    selection: Option<&[String]>,
    path: &Path,
) -> Result<usize> {
    let file = std::fs::File::create(path)?;
    let rows = write_decoded(frames, dictionary, selection, file)?;
    log::info!("Wrote {} CSV rows to {:?}", rows, path);
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::id::normalize;
    use crate::signals::database::{ByteOrder, MessageSpec, SignalSpec};
    use crate::types::Direction;

    fn frame(id: &str, data: &[u8], t: f64) -> Frame {
        Frame::new(normalize(id, true), data, Direction::Received, t, 0)
    }

    fn export(frames: &[Frame], dictionary: &Dictionary) -> String {
        let mut out = Vec::new();
        write_decoded(frames, dictionary, None, &mut out).unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn test_carry_forward_rows() {
        let dictionary = Dictionary::from_entries(vec![
            (
                "256",
                MessageSpec::new("A", 8)
                    .with_signal(SignalSpec::new("speed", 0, 16, ByteOrder::LittleEndian).with_scaling(0.1, 0.0)),
            ),
            (
                "512",
                MessageSpec::new("B", 8).with_signal(SignalSpec::new("flag", 0, 1, ByteOrder::LittleEndian)),
            ),
        ]);
        let frames = vec![
            frame("100", &[0xE8, 0x03], 1500.0),
            frame("7DF", &[0], 1600.0),
            frame("200", &[0x01], 2250.0),
        ];

        let text = export(&frames, &dictionary);
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines, vec!["timestamp,speed,flag", "1.500,100.0,", "2.250,100.0,1"]);
    }

    #[test]
    fn test_decode_error_writes_sentinel() {
        // Valid declaration whose physical value overflows to infinity
        let huge = SignalSpec::new("huge", 0, 64, ByteOrder::LittleEndian).with_scaling(1e300, 0.0);
        let dictionary = Dictionary::from_entries(vec![("256", MessageSpec::new("A", 8).with_signal(huge))]);
        let frames = vec![frame("100", &[0xFF; 8], 0.0)];

        let text = export(&frames, &dictionary);
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines, vec!["timestamp,huge", "0.000,ERR"]);
    }

    #[test]
    fn test_no_matching_frames() {
        let dictionary = Dictionary::new();
        let text = export(&[frame("1", &[1], 0.0)], &dictionary);
        assert_eq!(text, "timestamp\n");
    }
}
