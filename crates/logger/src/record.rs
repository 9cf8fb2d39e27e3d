//! Log entry type handed from producers to the sink

use crate::Level;
use chrono::{DateTime, Utc};
use std::fmt::Display;

/// A single log entry.
///
/// Immutable once built: the producer constructs it, then ownership moves
/// through the queue to the consumer. Nothing mutates it in flight.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEntry {
    timestamp: DateTime<Utc>,
    level: Level,
    message: String,
    fields: Vec<(String, String)>,
}

impl LogEntry {
    /// Create an entry timestamped now
    #[inline]
    pub fn new(level: Level, message: impl Into<String>) -> Self {
        Self {
            timestamp: Utc::now(),
            level,
            message: message.into(),
            fields: Vec::new(),
        }
    }

    /// Builder-style method for appending a key/value pair
    #[must_use]
    pub fn with_field(mut self, key: impl Into<String>, value: impl Display) -> Self {
        self.fields.push((key.into(), value.to_string()));
        self
    }

    /// Builder-style method for appending several key/value pairs in order
    #[must_use]
    pub fn with_fields<K, V, I>(mut self, fields: I) -> Self
    where
        K: Into<String>,
        V: Display,
        I: IntoIterator<Item = (K, V)>,
    {
        self.fields
            .extend(fields.into_iter().map(|(k, v)| (k.into(), v.to_string())));
        self
    }

    /// Builder-style method for overriding the timestamp
    #[must_use]
    pub const fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }

    /// When the entry was created
    #[must_use]
    pub const fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    /// Severity
    #[must_use]
    pub const fn level(&self) -> Level {
        self.level
    }

    /// The message text
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Key/value pairs in insertion order
    #[must_use]
    pub fn fields(&self) -> &[(String, String)] {
        &self.fields
    }
}
