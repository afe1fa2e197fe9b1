//! PCAN-View `.trc` trace files
//!
//! Reading accepts the v1.1 and v2.0 column layouts (and lines where the
//! layout has to be guessed). Writing always produces v2.0 with the
//! `N,O,T,I,d,l,D` column set.
//!
//! ```text
//! ;$FILEVERSION=1.1                      ;$FILEVERSION=2.0
//!      1)        60.8  Rx  10281050 8 …       1      60.800 DT 10281050 Rx  8 …
//! ```

use crate::id::normalize;
use crate::types::{Direction, Frame, Result, TelemetryError, MAX_DLC};
use chrono::{DateTime, TimeZone, Utc};
use std::io::Write;
use std::path::Path;

/// Days between the spreadsheet epoch (1899-12-30) and the Unix epoch
const EXCEL_EPOCH_OFFSET_DAYS: f64 = 25569.0;
const MS_PER_DAY: f64 = 86_400_000.0;

/// Column template of a trace line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TraceLayout {
    /// `N) O dir ID DLC D…`
    V11,
    /// `N O T ID dir DLC D…`
    V20,
}

impl TraceLayout {
    /// Indices of the ID token, the DLC token and the first data byte
    fn columns(self) -> (usize, usize, usize) {
        match self {
            TraceLayout::V11 => (3, 4, 5),
            TraceLayout::V20 => (3, 5, 6),
        }
    }
}

/// One line recovered from a trace
#[derive(Debug, Clone, PartialEq)]
struct TraceRecord {
    timestamp_ms: f64,
    id: String,
    direction: Direction,
    data: Vec<u8>,
}

/// Outcome of parsing a whole trace
#[derive(Debug, Clone, Default)]
pub struct ParsedTrace {
    pub frames: Vec<Frame>,
    /// Non-blank, non-comment lines that could not be read
    pub skipped_lines: usize,
}

/// Parse trace text into frames.
///
/// Malformed lines are skipped. Fails only when the text has no lines at all.
pub fn parse(text: &str) -> Result<Vec<Frame>> {
    Ok(parse_with_report(text)?.frames)
}

/// Like [`parse`], also reporting how many lines were skipped
pub fn parse_with_report(text: &str) -> Result<ParsedTrace> {
    if text.lines().next().is_none() {
        return Err(TelemetryError::EmptyTrace);
    }

    let parse_wall_ms = Utc::now().timestamp_millis();
    let mut trace = ParsedTrace::default();

    for line in text.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with(';') || trimmed.starts_with('$') {
            continue;
        }

        match parse_line(trimmed) {
            Some(record) => {
                let count = trace.frames.len() as u64 + 1;
                let frame = Frame::new(
                    normalize(record.id.as_str(), true),
                    &record.data,
                    record.direction,
                    record.timestamp_ms,
                    parse_wall_ms,
                )
                .with_occurrence(count, 0.0);
                trace.frames.push(frame);
            }
            None => {
                log::trace!("Skipping trace line: {}", trimmed);
                trace.skipped_lines += 1;
            }
        }
    }

    log::info!(
        "Parsed {} frames from trace ({} lines skipped)",
        trace.frames.len(),
        trace.skipped_lines
    );
    Ok(trace)
}

/// Read and parse a trace file
pub fn parse_file(path: &Path) -> Result<Vec<Frame>> {
    log::info!("Reading trace file: {:?}", path);
    let bytes = std::fs::read(path)?;
    parse(&String::from_utf8_lossy(&bytes))
}

fn parse_line(line: &str) -> Option<TraceRecord> {
    let parts: Vec<&str> = line.split_whitespace().collect();
    if parts.len() < 5 {
        return None;
    }

    let (dir_idx, direction) = parts
        .iter()
        .enumerate()
        .find_map(|(i, token)| Direction::from_token(token).map(|d| (i, d)))?;

    let layout = match dir_idx {
        2 => TraceLayout::V11,
        4 => TraceLayout::V20,
        _ => {
            let dlc_candidate = parts.get(5).and_then(|t| t.parse::<u8>().ok());
            if dlc_candidate.is_some_and(|dlc| dlc as usize <= MAX_DLC) {
                TraceLayout::V20
            } else {
                TraceLayout::V11
            }
        }
    };
    let (id_col, dlc_col, data_col) = layout.columns();

    let timestamp_ms: f64 = parts[1].parse().ok().filter(|t: &f64| t.is_finite())?;

    let dlc = parts.get(dlc_col)?.parse::<u8>().ok()? as usize;
    if dlc > MAX_DLC {
        return None;
    }

    let data = parts
        .get(data_col..data_col + dlc)?
        .iter()
        .map(|token| u8::from_str_radix(token, 16).ok())
        .collect::<Option<Vec<u8>>>()?;

    let raw_id: &str = parts.get(id_col)?;
    let id = raw_id
        .strip_suffix(['h', 'H'])
        .unwrap_or(raw_id)
        .to_string();

    Some(TraceRecord {
        timestamp_ms,
        id,
        direction,
        data,
    })
}

/// Spreadsheet serial date (fractional days since 1899-12-30) of a Unix time
fn excel_serial(unix_ms: i64) -> f64 {
    unix_ms as f64 / MS_PER_DAY + EXCEL_EPOCH_OFFSET_DAYS
}

/// Write frames as a v2.0 trace.
///
/// The start time comes from the first frame's wall-clock timestamp; offsets
/// are the frames' session timestamps.
pub fn write<W: Write>(frames: &[Frame], writer: &mut W) -> Result<()> {
    let start_ms = frames
        .first()
        .map(|f| f.absolute_timestamp_ms())
        .unwrap_or_else(|| Utc::now().timestamp_millis());
    let start: DateTime<Utc> = Utc
        .timestamp_millis_opt(start_ms)
        .single()
        .unwrap_or_else(Utc::now);

    writeln!(writer, ";$FILEVERSION=2.0")?;
    writeln!(writer, ";$STARTTIME={:.10}", excel_serial(start_ms))?;
    writeln!(writer, ";$COLUMNS=N,O,T,I,d,l,D")?;
    writeln!(writer, ";")?;
    writeln!(writer, ";   Start time: {}", start.format("%d/%m/%Y %H:%M:%S%.3f"))?;
    writeln!(writer, ";   Generated by can-telemetry {}", crate::VERSION)?;
    writeln!(writer, ";-------------------------------------------------------------------------------")?;
    writeln!(writer, ";   Message   Time    Type ID     Rx/Tx")?;
    writeln!(writer, ";   Number    Offset  |    [hex]  |  Data Length")?;
    writeln!(writer, ";   |         [ms]    |    |      |  |  Data [hex] ...")?;
    writeln!(writer, ";   |         |       |    |      |  |  |")?;
    writeln!(writer, ";---+-- ------+------ +- --+----- +- +- +- -- -- -- -- -- -- --")?;

    for (index, frame) in frames.iter().enumerate() {
        let row = format!(
            "{:>7} {:>13.3} DT {:>8} {} {:>2} {}",
            index + 1,
            frame.timestamp_ms(),
            frame.id().display_padded(),
            frame.direction(),
            frame.dlc(),
            frame.data_hex()
        );
        writeln!(writer, "{}", row.trim_end())?;
    }

    writer.flush()?;
    Ok(())
}

/// Render frames as v2.0 trace text
pub fn to_string(frames: &[Frame]) -> Result<String> {
    let mut buf = Vec::new();
    write(frames, &mut buf)?;
    Ok(String::from_utf8_lossy(&buf).into_owned())
}

/// Write frames to a trace file
pub fn write_file(frames: &[Frame], path: &Path) -> Result<()> {
    let mut file = std::io::BufWriter::new(std::fs::File::create(path)?);
    write(frames, &mut file)?;
    log::info!("Wrote {} frames to {:?}", frames.len(), path);
    Ok(())
}
