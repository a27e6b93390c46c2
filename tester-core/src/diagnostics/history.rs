//! Rolling diagnostic history for intermittency and trend analysis.

use core::time::Duration;

use heapless::{HistoryBuf, Vec};

use super::{FaultKind, Findings};
use crate::channels::{Channel, VoltageSnapshot};
use crate::time::MonotonicInstant;

/// Default number of analyzed snapshots kept.
pub const DEFAULT_HISTORY_CAPACITY: usize = 100;
/// Entries required before intermittency is evaluated.
pub const INTERMITTENT_MIN_SAMPLES: usize = 10;
/// Entries required before a trend is computed.
pub const TREND_MIN_SAMPLES: usize = 5;
/// Most recent entries considered by [`DiagnosticHistory::trend`].
pub const TREND_WINDOW: usize = 10;
/// Mean shifts smaller than this are reported as [`Trend::Stable`].
pub const TREND_STABLE_BAND_VOLTS: f32 = 0.5;

const INTERMITTENT_LOWER: f32 = 0.1;
const INTERMITTENT_UPPER: f32 = 0.9;

/// One analyzed snapshot.
#[derive(Clone, Debug, PartialEq)]
pub struct HistoryEntry<T> {
    pub timestamp: T,
    pub snapshot: VoltageSnapshot,
    pub findings: Findings,
}

impl<T> HistoryEntry<T> {
    #[must_use]
    pub fn contains(&self, kind: FaultKind) -> bool {
        self.findings.iter().any(|finding| finding.kind == kind)
    }
}

/// Direction of a channel's recent voltage.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Trend {
    Stable,
    Improving,
    Degrading,
}

impl Trend {
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Trend::Stable => "stable",
            Trend::Improving => "improving",
            Trend::Degrading => "degrading",
        }
    }
}

/// Bounded FIFO of analyzed snapshots; the oldest entry is evicted first.
pub struct DiagnosticHistory<T, const CAPACITY: usize = DEFAULT_HISTORY_CAPACITY> {
    ring: HistoryBuf<HistoryEntry<T>, CAPACITY>,
}

impl<T, const CAPACITY: usize> DiagnosticHistory<T, CAPACITY> {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            ring: HistoryBuf::new(),
        }
    }

    /// Appends an entry, evicting the oldest one when full.
    pub fn add(&mut self, timestamp: T, snapshot: VoltageSnapshot, findings: Findings) {
        self.ring.write(HistoryEntry {
            timestamp,
            snapshot,
            findings,
        });
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.ring.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ring.is_empty()
    }

    #[must_use]
    pub const fn capacity(&self) -> usize {
        CAPACITY
    }

    pub fn clear(&mut self) {
        self.ring.clear();
    }

    /// Entries from oldest to newest.
    pub fn entries(&self) -> impl Iterator<Item = &HistoryEntry<T>> + '_ {
        self.ring.oldest_ordered()
    }

    /// Most recently added entry.
    #[must_use]
    pub fn latest(&self) -> Option<&HistoryEntry<T>> {
        self.ring.recent()
    }

    /// Intermittency check with the default minimum of ten samples.
    #[must_use]
    pub fn is_intermittent(&self, kind: FaultKind) -> bool {
        self.is_intermittent_with_minimum(kind, INTERMITTENT_MIN_SAMPLES)
    }

    /// Returns `true` when `kind` shows up in more than 10% and fewer than
    /// 90% of the stored entries. Always `false` below `minimum_samples`.
    #[must_use]
    pub fn is_intermittent_with_minimum(&self, kind: FaultKind, minimum_samples: usize) -> bool {
        let total = self.len();
        if total == 0 || total < minimum_samples {
            return false;
        }
        let occurrences = self.entries().filter(|entry| entry.contains(kind)).count();
        let share = ratio(occurrences, total);
        INTERMITTENT_LOWER < share && share < INTERMITTENT_UPPER
    }

    /// Voltage trend of `channel` over the last ten entries.
    ///
    /// Returns `None` until five entries have been recorded.
    #[must_use]
    pub fn trend(&self, channel: Channel) -> Option<Trend> {
        let total = self.len();
        if total < TREND_MIN_SAMPLES {
            return None;
        }

        let window = total.min(TREND_WINDOW);
        let recent: Vec<f32, TREND_WINDOW> = self
            .entries()
            .skip(total - window)
            .map(|entry| entry.snapshot.get(channel))
            .collect();

        let (first, second) = recent.split_at(recent.len() / 2);
        let delta = mean(second) - mean(first);
        Some(if delta.abs() < TREND_STABLE_BAND_VOLTS {
            Trend::Stable
        } else if delta > 0.0 {
            Trend::Improving
        } else {
            Trend::Degrading
        })
    }
}

impl<T, const CAPACITY: usize> DiagnosticHistory<T, CAPACITY>
where
    T: MonotonicInstant,
{
    /// Time covered by the stored entries.
    #[must_use]
    pub fn span(&self) -> Duration {
        match (self.entries().next(), self.latest()) {
            (Some(oldest), Some(newest)) => {
                newest.timestamp.saturating_duration_since(oldest.timestamp)
            }
            _ => Duration::ZERO,
        }
    }
}

impl<T, const CAPACITY: usize> Default for DiagnosticHistory<T, CAPACITY> {
    fn default() -> Self {
        Self::new()
    }
}

#[allow(clippy::cast_precision_loss)]
fn ratio(part: usize, whole: usize) -> f32 {
    part as f32 / whole as f32
}

#[allow(clippy::cast_precision_loss)]
fn mean(values: &[f32]) -> f32 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f32>() / values.len() as f32
}
