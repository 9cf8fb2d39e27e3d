use serde::{Deserialize, Serialize};
use std::fmt;

/// Severity of a log entry, ordered from least to most severe
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    /// Very verbose diagnostics
    Trace,
    /// Debugging detail
    Debug,
    /// Normal operation
    Info,
    /// Significant but expected events
    Notice,
    /// Something looks wrong
    Warn,
    /// An operation failed
    Error,
    /// Audit trail records, never filtered by severity
    Audit,
}

impl Level {
    /// All levels in ascending severity
    pub const ALL: [Self; 7] = [
        Self::Trace,
        Self::Debug,
        Self::Info,
        Self::Notice,
        Self::Warn,
        Self::Error,
        Self::Audit,
    ];

    /// Lowercase name, used for metric keys
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Trace => "trace",
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Notice => "notice",
            Self::Warn => "warn",
            Self::Error => "error",
            Self::Audit => "audit",
        }
    }

    /// Uppercase label, used in formatted output
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Trace => "TRACE",
            Self::Debug => "DEBUG",
            Self::Info => "INFO",
            Self::Notice => "NOTICE",
            Self::Warn => "WARN",
            Self::Error => "ERROR",
            Self::Audit => "AUDIT",
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}
