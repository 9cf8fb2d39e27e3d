//! Rotation configuration

use serde::{Deserialize, Serialize};
use std::time::Duration;

const DEFAULT_MAX_SIZE: u64 = 100 * 1024 * 1024;
const DEFAULT_MAX_AGE: Duration = Duration::from_secs(7 * 24 * 60 * 60);
const DEFAULT_MAX_BACKUPS: usize = 3;

/// When to rotate and how many backups to keep.
///
/// A zero value disables the corresponding limit: `max_size_bytes = 0` never
/// rotates on size, `max_age = 0` never rotates on age and `max_backups = 0`
/// keeps every backup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RotationConfig {
    /// Rotate before a write would push the file past this size
    pub max_size_bytes: u64,
    /// Rotate once the file has been open this long
    pub max_age: Duration,
    /// Backups kept after pruning
    pub max_backups: usize,
    /// Gzip backups in the background
    pub compress: bool,
}

impl Default for RotationConfig {
    fn default() -> Self {
        Self {
            max_size_bytes: DEFAULT_MAX_SIZE,
            max_age: DEFAULT_MAX_AGE,
            max_backups: DEFAULT_MAX_BACKUPS,
            compress: false,
        }
    }
}

impl RotationConfig {
    /// No size or age limit, unlimited backups, no compression
    #[must_use]
    pub const fn unbounded() -> Self {
        Self {
            max_size_bytes: 0,
            max_age: Duration::ZERO,
            max_backups: 0,
            compress: false,
        }
    }

    /// Set the size limit
    #[must_use]
    pub const fn with_max_size(mut self, bytes: u64) -> Self {
        self.max_size_bytes = bytes;
        self
    }

    /// Set the age limit
    #[must_use]
    pub const fn with_max_age(mut self, age: Duration) -> Self {
        self.max_age = age;
        self
    }

    /// Set how many backups to keep
    #[must_use]
    pub const fn with_max_backups(mut self, count: usize) -> Self {
        self.max_backups = count;
        self
    }

    /// Enable or disable compression
    #[must_use]
    pub const fn with_compression(mut self, compress: bool) -> Self {
        self.compress = compress;
        self
    }

    /// Whether a write of `incoming` bytes on top of `current` needs a new file
    pub(crate) const fn exceeds_size(&self, current: u64, incoming: u64) -> bool {
        self.max_size_bytes > 0 && current.saturating_add(incoming) > self.max_size_bytes
    }

    /// Whether a file open for `age` needs a new file
    pub(crate) fn exceeds_age(&self, age: Duration) -> bool {
        !self.max_age.is_zero() && age > self.max_age
    }
}
