//! Live line protocol
//!
//! Hardware bridges stream one frame per line as `ID#DLC#B0,B1,...` where
//! `ID` is hexadecimal, `DLC` decimal and each byte two hex digits. Chunks
//! arrive with arbitrary boundaries, so [`LineAssembler`] keeps the partial
//! trailing line until its newline shows up.

use std::io::Read;

/// Longest partial line kept while waiting for its newline. A full frame
/// line is under 40 bytes.
pub const MAX_PARTIAL_LINE: usize = 256;

/// One parsed live line, ID not yet normalized
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LiveLine {
    pub id: String,
    pub dlc: u8,
    pub data: Vec<u8>,
}

/// Why a complete line was not turned into a [`LiveLine`]
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LineError {
    #[error("expected ID#DLC#DATA, got {0} field(s)")]
    MissingFields(usize),

    #[error("invalid DLC {0:?}")]
    InvalidDlc(String),

    #[error("invalid data byte {0:?}")]
    InvalidByte(String),
}

/// Parse one complete line (without its newline)
pub fn parse_line(line: &str) -> Result<LiveLine, LineError> {
    let parts: Vec<&str> = line.trim().split('#').collect();
    if parts.len() < 3 {
        return Err(LineError::MissingFields(parts.len()));
    }

    let dlc_text = parts[1].trim();
    let dlc: u8 = dlc_text
        .parse()
        .map_err(|_| LineError::InvalidDlc(dlc_text.to_string()))?;

    let data = parts[2]
        .split(',')
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .map(|token| {
            u8::from_str_radix(token, 16).map_err(|_| LineError::InvalidByte(token.to_string()))
        })
        .collect::<Result<Vec<u8>, LineError>>()?;

    Ok(LiveLine {
        id: parts[0].trim().to_string(),
        dlc,
        data,
    })
}

/// Reassembles newline-delimited lines from arbitrary byte chunks
#[derive(Debug, Default)]
pub struct LineAssembler {
    buffer: Vec<u8>,
    malformed: u64,
}

impl LineAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a chunk and return every frame line it completed.
    ///
    /// Blank and malformed lines are dropped; the trailing partial line stays
    /// buffered for the next chunk unless it outgrows [`MAX_PARTIAL_LINE`],
    /// in which case it is discarded and counted as malformed.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<LiveLine> {
        self.buffer.extend_from_slice(chunk);

        let complete = match self.buffer.iter().rposition(|&b| b == b'\n') {
            Some(last_newline) => {
                let rest = self.buffer.split_off(last_newline + 1);
                std::mem::replace(&mut self.buffer, rest)
            }
            None => Vec::new(),
        };

        if self.buffer.len() > MAX_PARTIAL_LINE {
            log::debug!(
                "Discarding {} bytes without a line terminator",
                self.buffer.len()
            );
            self.buffer.clear();
            self.malformed += 1;
        }

        let mut lines = Vec::new();
        for raw in complete.split(|&b| b == b'\n') {
            let text = String::from_utf8_lossy(raw);
            if text.trim().is_empty() {
                continue;
            }
            match parse_line(&text) {
                Ok(line) => lines.push(line),
                Err(e) => {
                    self.malformed += 1;
                    log::debug!("Dropping live line {:?}: {}", text.trim(), e);
                }
            }
        }
        lines
    }

    /// Bytes waiting for their newline
    pub fn pending_len(&self) -> usize {
        self.buffer.len()
    }

    /// Lines dropped as malformed so far
    pub fn malformed(&self) -> u64 {
        self.malformed
    }

    /// Discard the partial line, e.g. when the transport reconnects
    pub fn clear(&mut self) {
        self.buffer.clear();
    }
}

/// A byte stream delivered in chunks
pub trait ChunkSource {
    /// Next chunk, `None` once the source is exhausted
    fn next_chunk(&mut self) -> Option<std::io::Result<Vec<u8>>>;
}

/// Chunk source over any reader (serial port, socket, file, stdin)
pub struct ReaderSource<R> {
    reader: R,
    chunk_size: usize,
}

impl<R: Read> ReaderSource<R> {
    pub fn new(reader: R) -> Self {
        Self::with_chunk_size(reader, 512)
    }

    pub fn with_chunk_size(reader: R, chunk_size: usize) -> Self {
        Self {
            reader,
            chunk_size: chunk_size.max(1),
        }
    }
}

impl<R: Read> ChunkSource for ReaderSource<R> {
    fn next_chunk(&mut self) -> Option<std::io::Result<Vec<u8>>> {
        let mut buf = vec![0u8; self.chunk_size];
        loop {
            match self.reader.read(&mut buf) {
                Ok(0) => return None,
                Ok(n) => {
                    buf.truncate(n);
                    return Some(Ok(buf));
                }
                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                Err(e) => return Some(Err(e)),
            }
        }
    }
}
