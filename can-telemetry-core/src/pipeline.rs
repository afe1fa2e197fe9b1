//! Shared store handle and the periodic flush/sweep scheduler
//!
//! Producers (the transport reader) and the scheduler thread share one
//! [`TelemetryStore`] behind a mutex, so ingest, flush, sweep and reset are
//! mutually exclusive. A reset can never interleave with an in-flight flush.

use crate::config::PipelineConfig;
use crate::formats::line::{ChunkSource, LineAssembler};
use crate::store::{IngestOutcome, TelemetryStore};
use crate::types::{Frame, Result, TelemetryError};
use crossbeam_channel::{bounded, select, tick, Sender};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::JoinHandle;

/// Cloneable handle to a shared store
#[derive(Clone)]
pub struct TelemetryHandle {
    store: Arc<Mutex<TelemetryStore>>,
}

impl TelemetryHandle {
    pub fn new(store: TelemetryStore) -> Self {
        Self {
            store: Arc::new(Mutex::new(store)),
        }
    }

    fn lock(&self, operation: &'static str) -> Result<MutexGuard<'_, TelemetryStore>> {
        self.store
            .lock()
            .map_err(|_| TelemetryError::StorePoisoned(operation))
    }

    pub fn ingest(&self, raw_id: &str, dlc: u8, data: &[u8]) -> Result<IngestOutcome> {
        Ok(self.lock("ingest")?.ingest(raw_id, dlc, data))
    }

    pub fn replay(&self, frames: Vec<Frame>) -> Result<usize> {
        Ok(self.lock("replay")?.replay(frames))
    }

    pub fn flush(&self) -> Result<usize> {
        Ok(self.lock("flush")?.flush())
    }

    pub fn sweep_stale(&self) -> Result<usize> {
        Ok(self.lock("sweep")?.sweep_stale())
    }

    pub fn reset(&self) -> Result<()> {
        self.lock("reset")?.reset();
        Ok(())
    }

    pub fn pause(&self) -> Result<()> {
        self.lock("pause")?.pause();
        Ok(())
    }

    pub fn resume(&self) -> Result<()> {
        self.lock("resume")?.resume();
        Ok(())
    }

    /// Copy of the published history
    pub fn history(&self) -> Result<Vec<Frame>> {
        Ok(self.lock("history")?.history())
    }

    /// Copy of the latest-published index
    pub fn published(&self) -> Result<Vec<Frame>> {
        Ok(self.lock("published")?.published())
    }

    /// Run a read-only closure against the store
    pub fn with_store<T>(&self, f: impl FnOnce(&TelemetryStore) -> T) -> Result<T> {
        let store = self.lock("read")?;
        Ok(f(&store))
    }
}

/// Counters from one [`pump`] run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PumpStats {
    pub chunks: u64,
    pub lines: u64,
    pub accepted: u64,
    pub rejected: u64,
}

/// Drain a chunk source into the store until it is exhausted
pub fn pump<S: ChunkSource>(
    source: &mut S,
    assembler: &mut LineAssembler,
    handle: &TelemetryHandle,
) -> Result<PumpStats> {
    let mut stats = PumpStats::default();

    while let Some(chunk) = source.next_chunk() {
        let chunk = chunk?;
        stats.chunks += 1;

        for line in assembler.push(&chunk) {
            stats.lines += 1;
            match handle.ingest(&line.id, line.dlc, &line.data)? {
                IngestOutcome::Accepted => stats.accepted += 1,
                IngestOutcome::Paused | IngestOutcome::InvalidId => stats.rejected += 1,
            }
        }
    }

    log::debug!(
        "Source exhausted: {} chunks, {} lines, {} accepted",
        stats.chunks,
        stats.lines,
        stats.accepted
    );
    Ok(stats)
}

/// Background thread driving `flush` and `sweep_stale` on fixed periods.
///
/// Dropping the scheduler stops the thread and waits for it.
pub struct Scheduler {
    shutdown: Option<Sender<()>>,
    worker: Option<JoinHandle<()>>,
}

impl Scheduler {
    pub fn spawn(handle: TelemetryHandle, config: &PipelineConfig) -> Result<Self> {
        let (shutdown_tx, shutdown_rx) = bounded::<()>(1);
        let flush_ticker = tick(config.flush_interval());
        let sweep_ticker = tick(config.sweep_interval());

        let worker = std::thread::Builder::new()
            .name("telemetry-scheduler".to_string())
            .spawn(move || {
                log::debug!("Scheduler started");
                loop {
                    select! {
                        recv(flush_ticker) -> _ => {
                            if let Err(e) = handle.flush() {
                                log::error!("Flush failed, stopping scheduler: {}", e);
                                break;
                            }
                        }
                        recv(sweep_ticker) -> _ => {
                            if let Err(e) = handle.sweep_stale() {
                                log::error!("Sweep failed, stopping scheduler: {}", e);
                                break;
                            }
                        }
                        recv(shutdown_rx) -> _ => break,
                    }
                }
                log::debug!("Scheduler stopped");
            })?;

        Ok(Self {
            shutdown: Some(shutdown_tx),
            worker: Some(worker),
        })
    }

    /// Stop the thread and wait for it
    pub fn stop(mut self) {
        self.shutdown_and_join();
    }

    fn shutdown_and_join(&mut self) {
        // Dropping the sender disconnects the channel, which also wakes select
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.try_send(());
        }
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                log::error!("Scheduler thread panicked");
            }
        }
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        self.shutdown_and_join();
    }
}
