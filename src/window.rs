//! Sliding time-series window
//!
//! Samples are buffered in timestamp order and evicted once they are older
//! than the window duration relative to the latest timestamp seen. A snapshot
//! is emitted at most once per hop, and never before the stream has spanned a
//! full window since the first sample.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Read-only copy of the window contents at emission time
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WindowSnapshot<T> {
    /// Timestamp of the oldest buffered entry
    pub start: DateTime<Utc>,
    /// Latest timestamp seen when the snapshot was taken
    pub end: DateTime<Utc>,
    /// Entries in timestamp order
    pub entries: Vec<(DateTime<Utc>, T)>,
}

impl<T> WindowSnapshot<T> {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn values(&self) -> impl Iterator<Item = &T> {
        self.entries.iter().map(|(_, v)| v)
    }

    /// Most recent entry by timestamp
    pub fn latest(&self) -> Option<&T> {
        self.entries.last().map(|(_, v)| v)
    }
}

/// Time-bounded buffer with hop-cadenced emission
#[derive(Debug, Clone)]
pub struct TimeSeriesWindow<T> {
    window_duration: Duration,
    hop_duration: Duration,
    entries: VecDeque<(DateTime<Utc>, T)>,
    first_timestamp: Option<DateTime<Utc>>,
    latest_timestamp: Option<DateTime<Utc>>,
    last_emission: Option<DateTime<Utc>>,
}

impl<T: Clone> TimeSeriesWindow<T> {
    pub fn new(window_duration: Duration, hop_duration: Duration) -> Self {
        Self {
            window_duration,
            hop_duration,
            entries: VecDeque::new(),
            first_timestamp: None,
            latest_timestamp: None,
            last_emission: None,
        }
    }

    /// Add a value and return a snapshot if the cadence allows one.
    ///
    /// Out-of-order timestamps are inserted in place; eviction is purely
    /// age-based against the latest timestamp seen.
    pub fn push(&mut self, timestamp: DateTime<Utc>, value: T) -> Option<WindowSnapshot<T>> {
        let latest = match self.latest_timestamp {
            Some(latest) if latest >= timestamp => latest,
            _ => timestamp,
        };
        self.latest_timestamp = Some(latest);
        self.first_timestamp.get_or_insert(timestamp);

        let position = self.entries.partition_point(|(t, _)| *t <= timestamp);
        self.entries.insert(position, (timestamp, value));
        self.evict(latest);

        if self.entries.is_empty() {
            return None;
        }

        let first = self.first_timestamp?;
        if latest - first < self.window_duration {
            return None;
        }
        if let Some(last) = self.last_emission {
            if latest - last < self.hop_duration {
                return None;
            }
        }

        self.last_emission = Some(latest);
        Some(self.snapshot_at(latest))
    }

    /// Current contents regardless of cadence
    pub fn snapshot(&self) -> Option<WindowSnapshot<T>> {
        self.latest_timestamp.map(|latest| self.snapshot_at(latest))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Whether at least one snapshot has been emitted
    pub fn is_primed(&self) -> bool {
        self.last_emission.is_some()
    }

    pub fn first_timestamp(&self) -> Option<DateTime<Utc>> {
        self.first_timestamp
    }

    pub fn latest_timestamp(&self) -> Option<DateTime<Utc>> {
        self.latest_timestamp
    }

    pub fn window_duration(&self) -> Duration {
        self.window_duration
    }

    pub fn hop_duration(&self) -> Duration {
        self.hop_duration
    }

    /// Drop all entries and cadence state
    pub fn reset(&mut self) {
        self.entries.clear();
        self.first_timestamp = None;
        self.latest_timestamp = None;
        self.last_emission = None;
    }

    fn evict(&mut self, latest: DateTime<Utc>) {
        while let Some((t, _)) = self.entries.front() {
            if latest - *t > self.window_duration {
                self.entries.pop_front();
            } else {
                break;
            }
        }
    }

    fn snapshot_at(&self, latest: DateTime<Utc>) -> WindowSnapshot<T> {
        let entries: Vec<_> = self.entries.iter().cloned().collect();
        WindowSnapshot {
            start: entries.first().map(|(t, _)| *t).unwrap_or(latest),
            end: latest,
            entries,
        }
    }
}
