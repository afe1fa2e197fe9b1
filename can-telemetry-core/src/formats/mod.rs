//! Wire and file formats
//!
//! - [`line`]: the live `ID#DLC#B0,B1,...` line protocol
//! - [`trc`]: PCAN-View `.trc` trace files (read and write)
//! - [`csv`]: decoded-signal CSV export

pub mod csv;
pub mod line;
pub mod trc;

pub use line::{ChunkSource, LineAssembler, LiveLine, ReaderSource};
