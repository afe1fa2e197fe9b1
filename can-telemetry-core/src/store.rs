//! Frame ingestion store
//!
//! Live frames arrive one by one through [`TelemetryStore::ingest`] and are
//! staged in a pending batch. A periodic [`TelemetryStore::flush`] publishes
//! the batch into the bounded history and the "latest published" index, and
//! a periodic [`TelemetryStore::sweep_stale`] drops IDs that went quiet.
//!
//! Two per-ID indexes are kept apart: `latest_by_id` feeds the occurrence
//! count and cycle time of the next frame and survives sweeps, while
//! `published` is what "currently live" views read and ages out.

use crate::clock::{Clock, SystemClock};
use crate::config::{EvictionPolicy, PipelineConfig};
use crate::id::{normalize, CanId};
use crate::signals::database::Dictionary;
use crate::types::{Direction, Frame};
use serde::Serialize;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

/// What `ingest` did with a frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngestOutcome {
    /// Staged for the next flush
    Accepted,
    /// Ingestion is paused; nothing changed
    Paused,
    /// The ID normalized to nothing usable
    InvalidId,
}

/// One row of the "currently live" message list
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LiveMessage {
    pub id: CanId,
    /// Dictionary display name
    pub name: String,
    pub count: u64,
    pub period_ms: f64,
    pub last_seen_ms: f64,
}

/// Running counters since the last reset
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StoreStats {
    pub ingested: u64,
    pub dropped_paused: u64,
    pub dropped_invalid: u64,
    pub published: u64,
    pub evicted: u64,
}

/// Ingestion state: pending batch, bounded history and per-ID indexes
pub struct TelemetryStore {
    config: PipelineConfig,
    clock: Arc<dyn Clock>,
    session_origin_ms: f64,
    paused: bool,
    latest_by_id: HashMap<CanId, Frame>,
    pending: Vec<Frame>,
    history: VecDeque<Frame>,
    published: HashMap<CanId, Frame>,
    stats: StoreStats,
}

impl TelemetryStore {
    /// Create a store reading time from `clock`. The session starts now.
    pub fn new(config: PipelineConfig, clock: Arc<dyn Clock>) -> Self {
        let session_origin_ms = clock.monotonic_ms();
        Self {
            config,
            clock,
            session_origin_ms,
            paused: false,
            latest_by_id: HashMap::new(),
            pending: Vec::new(),
            history: VecDeque::new(),
            published: HashMap::new(),
            stats: StoreStats::default(),
        }
    }

    /// Create a store on the system clock
    pub fn with_system_clock(config: PipelineConfig) -> Self {
        Self::new(config, Arc::new(SystemClock::new()))
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Milliseconds since the current session started
    pub fn session_time_ms(&self) -> f64 {
        self.clock.monotonic_ms() - self.session_origin_ms
    }

    pub fn pause(&mut self) {
        if !self.paused {
            log::info!("Ingestion paused");
        }
        self.paused = true;
    }

    pub fn resume(&mut self) {
        if self.paused {
            log::info!("Ingestion resumed");
        }
        self.paused = false;
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    /// Stage one live frame.
    ///
    /// `dlc` caps how many bytes of `data` are taken; a frame never carries
    /// more bytes than were supplied, nor more than 8.
    pub fn ingest(&mut self, raw_id: &str, dlc: u8, data: &[u8]) -> IngestOutcome {
        if self.paused {
            self.stats.dropped_paused += 1;
            return IngestOutcome::Paused;
        }

        let id = normalize(raw_id, true);
        // Blank or space-separated IDs cannot be written back as a single token
        if id.as_str().is_empty() || id.as_str().contains(char::is_whitespace) {
            self.stats.dropped_invalid += 1;
            return IngestOutcome::InvalidId;
        }
        if !id.is_valid() {
            log::debug!("Unparseable CAN ID {:?} kept as {:?}", raw_id, id.as_str());
        }

        let now = self.session_time_ms();
        let (count, period_ms) = match self.latest_by_id.get(&id) {
            Some(prev) => (prev.count() + 1, now - prev.timestamp_ms()),
            None => (1, 0.0),
        };

        let take = (dlc as usize).min(data.len());
        let frame = Frame::new(id.clone(), &data[..take], Direction::Received, now, self.clock.wall_ms())
            .with_occurrence(count, period_ms);

        self.latest_by_id.insert(id, frame.clone());
        self.pending.push(frame);
        self.stats.ingested += 1;
        IngestOutcome::Accepted
    }

    /// Stage already-built frames (trace playback), keeping their own
    /// timestamps and counts
    pub fn replay<I>(&mut self, frames: I) -> usize
    where
        I: IntoIterator<Item = Frame>,
    {
        let mut staged = 0;
        for frame in frames {
            self.latest_by_id.insert(frame.id().clone(), frame.clone());
            self.pending.push(frame);
            staged += 1;
        }
        self.stats.ingested += staged as u64;
        staged
    }

    /// Publish the pending batch. Returns the number of frames published.
    pub fn flush(&mut self) -> usize {
        if self.pending.is_empty() {
            return 0;
        }

        let batch = std::mem::take(&mut self.pending);
        let published = batch.len();

        for frame in &batch {
            self.published.insert(frame.id().clone(), frame.clone());
        }

        let bound = self.config.history_bound();
        match self.config.eviction {
            EvictionPolicy::DropOldest => {
                self.history.extend(batch);
            }
            EvictionPolicy::Reset => {
                if self.history.len() + batch.len() > bound {
                    log::info!(
                        "History bound {} reached, clearing {} frames",
                        bound,
                        self.history.len()
                    );
                    self.stats.evicted += self.history.len() as u64;
                    self.history.clear();
                }
                self.history.extend(batch);
            }
        }

        let excess = self.history.len().saturating_sub(bound);
        if excess > 0 {
            self.history.drain(..excess);
            self.stats.evicted += excess as u64;
        }

        self.stats.published += published as u64;
        published
    }

    /// Drop published entries older than the staleness timeout. Returns the
    /// number removed.
    pub fn sweep_stale(&mut self) -> usize {
        let now = self.session_time_ms();
        let timeout = self.config.stale_timeout_ms as f64;
        let before = self.published.len();

        self.published
            .retain(|_, frame| now - frame.timestamp_ms() <= timeout);

        let removed = before - self.published.len();
        if removed > 0 {
            log::debug!("Swept {} stale IDs", removed);
        }
        removed
    }

    /// Clear all frames and indexes and start a new session
    pub fn reset(&mut self) {
        log::info!(
            "Resetting telemetry store ({} frames in history)",
            self.history.len()
        );
        self.latest_by_id.clear();
        self.pending.clear();
        self.history.clear();
        self.published.clear();
        self.stats = StoreStats::default();
        self.session_origin_ms = self.clock.monotonic_ms();
    }

    /// Copy of the published history, oldest first
    pub fn history(&self) -> Vec<Frame> {
        self.history.iter().cloned().collect()
    }

    pub fn history_len(&self) -> usize {
        self.history.len()
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Latest published frame for an ID, if it has not gone stale
    pub fn latest(&self, id: &CanId) -> Option<&Frame> {
        self.published.get(id)
    }

    /// Copy of the published index in ascending ID order
    pub fn published(&self) -> Vec<Frame> {
        let mut frames: Vec<Frame> = self.published.values().cloned().collect();
        frames.sort_by(|a, b| a.id().cmp(b.id()));
        frames
    }

    /// Dictionary messages currently in the published index, by display name
    pub fn live_messages(&self, dictionary: &Dictionary) -> Vec<LiveMessage> {
        let mut live: Vec<LiveMessage> = self
            .published
            .values()
            .filter_map(|frame| {
                let message = dictionary.get(frame.id())?;
                Some(LiveMessage {
                    id: frame.id().clone(),
                    name: message.display_name(),
                    count: frame.count(),
                    period_ms: frame.period_ms(),
                    last_seen_ms: frame.timestamp_ms(),
                })
            })
            .collect();
        live.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.id.cmp(&b.id)));
        live
    }

    pub fn stats(&self) -> StoreStats {
        self.stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::signals::database::MessageSpec;

    fn store_with(config: PipelineConfig) -> (TelemetryStore, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(1_700_000_000_000));
        (TelemetryStore::new(config, clock.clone()), clock)
    }

    #[test]
    fn test_ingest_counts_and_period() {
        let (mut store, clock) = store_with(PipelineConfig::new());

        assert_eq!(store.ingest("123", 2, &[1, 2]), IngestOutcome::Accepted);
        clock.advance(100.0);
        assert_eq!(store.ingest("0x123", 2, &[3, 4]), IngestOutcome::Accepted);
        assert_eq!(store.pending_len(), 2);
        assert_eq!(store.history_len(), 0);

        assert_eq!(store.flush(), 2);
        let history = store.history();
        assert_eq!(history[0].count(), 1);
        assert_eq!(history[0].period_ms(), 0.0);
        assert_eq!(history[1].count(), 2);
        assert_eq!(history[1].period_ms(), 100.0);
        assert_eq!(history[1].absolute_timestamp_ms(), 1_700_000_000_100);
        assert_eq!(store.pending_len(), 0);
    }

    #[test]
    fn test_dlc_caps_payload() {
        let (mut store, _) = store_with(PipelineConfig::new());
        store.ingest("1", 2, &[1, 2, 3]);
        store.ingest("2", 8, &[9]);
        store.flush();
        let history = store.history();
        assert_eq!(history[0].data(), &[1, 2]);
        assert_eq!(history[1].data(), &[9]);
    }

    #[test]
    fn test_paused_and_invalid_inputs_are_dropped() {
        let (mut store, _) = store_with(PipelineConfig::new());
        store.pause();
        assert_eq!(store.ingest("123", 1, &[0]), IngestOutcome::Paused);
        store.resume();
        assert_eq!(store.ingest("   ", 1, &[0]), IngestOutcome::InvalidId);
        assert_eq!(store.ingest("BAD ID", 1, &[1]), IngestOutcome::InvalidId);
        assert_eq!(store.pending_len(), 0);

        // Degraded single-token IDs are still kept
        assert_eq!(store.ingest("XYZ", 1, &[2]), IngestOutcome::Accepted);

        let stats = store.stats();
        assert_eq!(stats.dropped_paused, 1);
        assert_eq!(stats.dropped_invalid, 2);
    }

    #[test]
    fn test_flush_empty_is_noop() {
        let (mut store, _) = store_with(PipelineConfig::new());
        assert_eq!(store.flush(), 0);
        assert!(store.published().is_empty());
    }

    #[test]
    fn test_drop_oldest_keeps_newest() {
        let (mut store, _) = store_with(PipelineConfig::new().with_max_history(3));
        for i in 0..5u8 {
            store.ingest("100", 1, &[i]);
        }
        store.flush();
        let history = store.history();
        assert_eq!(history.len(), 3);
        assert_eq!(history[0].data(), &[2]);
        assert_eq!(history[2].data(), &[4]);
        assert_eq!(store.stats().evicted, 2);
    }

    #[test]
    fn test_reset_policy_starts_over() {
        let config = PipelineConfig::new()
            .with_max_history(4)
            .with_eviction(EvictionPolicy::Reset);
        let (mut store, _) = store_with(config);

        for i in 0..3u8 {
            store.ingest("100", 1, &[i]);
        }
        store.flush();
        assert_eq!(store.history_len(), 3);

        store.ingest("100", 1, &[10]);
        store.ingest("100", 1, &[11]);
        store.flush();
        let history = store.history();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].data(), &[10]);
    }

    #[test]
    fn test_staleness_boundary() {
        let (mut store, clock) = store_with(PipelineConfig::new());
        clock.set(1_000.0);
        store.ingest("18FF0360", 1, &[1]);
        store.flush();

        clock.set(1_000.0 + 4_999.0);
        assert_eq!(store.sweep_stale(), 0);
        assert!(store.latest(&normalize("18FF0360", true)).is_some());

        clock.set(1_000.0 + 5_001.0);
        assert_eq!(store.sweep_stale(), 1);
        assert!(store.latest(&normalize("18FF0360", true)).is_none());
        // History and occurrence counting are unaffected
        assert_eq!(store.history_len(), 1);
        store.ingest("18FF0360", 1, &[1]);
        store.flush();
        assert_eq!(store.history()[1].count(), 2);
    }

    #[test]
    fn test_reset_clears_everything() {
        let (mut store, clock) = store_with(PipelineConfig::new());
        store.ingest("1", 1, &[1]);
        store.flush();
        store.ingest("1", 1, &[1]);

        clock.advance(500.0);
        store.reset();
        assert_eq!(store.history_len(), 0);
        assert_eq!(store.pending_len(), 0);
        assert!(store.published().is_empty());
        assert_eq!(store.session_time_ms(), 0.0);

        store.ingest("1", 1, &[1]);
        store.flush();
        assert_eq!(store.history()[0].count(), 1);
    }

    #[test]
    fn test_replay_keeps_frame_fields() {
        let (mut store, _) = store_with(PipelineConfig::new());
        let frame = Frame::new(normalize("7DF", true), &[1], Direction::Transmitted, 42.0, 7)
            .with_occurrence(9, 10.0);
        assert_eq!(store.replay(vec![frame.clone()]), 1);
        store.flush();
        assert_eq!(store.history(), vec![frame]);
    }

    #[test]
    fn test_live_messages() {
        let (mut store, _) = store_with(PipelineConfig::new());
        let dictionary = Dictionary::from_entries(vec![
            ("2552758145", MessageSpec::new("LV_ID_0x1827FF81_Odo_Meter", 8)),
            ("256", MessageSpec::new("Battery_Info", 8)),
        ]);
        store.ingest("1827FF81", 8, &[0; 8]);
        store.ingest("100", 8, &[0; 8]);
        store.ingest("7DF", 1, &[0]);
        store.flush();

        let live = store.live_messages(&dictionary);
        let names: Vec<&str> = live.iter().map(|m| m.name.as_str()).collect();
        assert_eq!(names, vec!["Battery Info", "Odo Meter"]);
        assert_eq!(live[1].id.as_str(), "1827FF81");
    }
}
