//! Counters over accepted log entries

use crate::Level;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::ser::{Serialize, SerializeMap, Serializer};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::time::Instant;

/// Concurrency-safe log counters.
///
/// The total is a lock-free counter; per-level counts and the error rate
/// share one short critical section.
#[derive(Debug, Default)]
pub struct MetricsCollector {
    total: AtomicI64,
    inner: Mutex<LevelCounts>,
}

#[derive(Debug, Default)]
struct LevelCounts {
    per_level: BTreeMap<Level, i64>,
    last_error: Option<(Instant, DateTime<Utc>)>,
    error_rate: f64,
}

impl MetricsCollector {
    /// Create an empty collector
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Count one accepted entry at `level`.
    ///
    /// Error entries also refresh the error rate, computed as total errors
    /// divided by the seconds elapsed since the previous error. This is an
    /// instantaneous figure that only moves when a new error arrives, not a
    /// windowed rate. The first error leaves the rate at zero.
    pub fn record_log(&self, level: Level) {
        self.total.fetch_add(1, Ordering::Relaxed);

        let mut counts = self.inner.lock();
        let count = counts.per_level.entry(level).or_insert(0);
        *count += 1;
        let count = *count;

        if level == Level::Error {
            let now = Instant::now();
            if let Some((previous, _)) = counts.last_error {
                let elapsed = now.duration_since(previous).as_secs_f64();
                if elapsed > 0.0 {
                    #[allow(clippy::cast_precision_loss)]
                    let errors = count as f64;
                    counts.error_rate = errors / elapsed;
                }
            }
            counts.last_error = Some((now, Utc::now()));
        }
    }

    /// Copy out the current counters
    #[must_use]
    pub fn snapshot(&self) -> MetricsSnapshot {
        let counts = self.inner.lock();
        MetricsSnapshot {
            total_logs: self.total.load(Ordering::Relaxed),
            error_rate: counts.error_rate,
            last_error_at: counts.last_error.map(|(_, at)| at),
            per_level: counts.per_level.clone(),
        }
    }
}

/// A single metric value
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MetricValue {
    /// Counter
    Int(i64),
    /// Rate
    Float(f64),
}

impl Serialize for MetricValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Int(v) => serializer.serialize_i64(*v),
            Self::Float(v) => serializer.serialize_f64(*v),
        }
    }
}

/// Point-in-time copy of the collector.
///
/// Flattens to `total_logs`, `error_rate` and one `logs_<level>` key for
/// every level recorded at least once.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MetricsSnapshot {
    /// Entries counted across all levels
    pub total_logs: i64,
    /// Errors divided by seconds since the previous error
    pub error_rate: f64,
    /// When the most recent error was counted
    pub last_error_at: Option<DateTime<Utc>>,
    /// Counts for levels seen so far
    pub per_level: BTreeMap<Level, i64>,
}

impl MetricsSnapshot {
    /// Count for one level, `None` if never recorded
    #[must_use]
    pub fn level_count(&self, level: Level) -> Option<i64> {
        self.per_level.get(&level).copied()
    }

    /// Look up a flattened key
    #[must_use]
    pub fn get(&self, key: &str) -> Option<MetricValue> {
        match key {
            "total_logs" => Some(MetricValue::Int(self.total_logs)),
            "error_rate" => Some(MetricValue::Float(self.error_rate)),
            _ => {
                let name = key.strip_prefix("logs_")?;
                self.per_level
                    .iter()
                    .find(|(level, _)| level.as_str() == name)
                    .map(|(_, count)| MetricValue::Int(*count))
            }
        }
    }

    /// The flattened key/value view
    #[must_use]
    pub fn to_map(&self) -> BTreeMap<String, MetricValue> {
        let mut map = BTreeMap::new();
        map.insert("total_logs".to_string(), MetricValue::Int(self.total_logs));
        map.insert("error_rate".to_string(), MetricValue::Float(self.error_rate));
        for (level, count) in &self.per_level {
            map.insert(format!("logs_{}", level.as_str()), MetricValue::Int(*count));
        }
        map
    }
}

impl Serialize for MetricsSnapshot {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(2 + self.per_level.len()))?;
        map.serialize_entry("total_logs", &self.total_logs)?;
        map.serialize_entry("error_rate", &self.error_rate)?;
        for (level, count) in &self.per_level {
            map.serialize_entry(&format!("logs_{}", level.as_str()), count)?;
        }
        map.end()
    }
}
