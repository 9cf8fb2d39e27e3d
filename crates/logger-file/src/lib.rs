//! Rotating file sink for `logpipe-logger`
//!
//! [`RotatingWriter`] appends to a log file and rotates it by size or age:
//! - the active file is renamed to `<file>.<YYYYMMDD-HHMMSS>.<seq>`
//! - a fresh file is opened at the original path
//! - backups are optionally gzipped and pruned to `max_backups` on a
//!   per-writer maintenance thread
//!
//! The writer implements [`logpipe_logger::Sink`], so it can be handed
//! straight to a [`logpipe_logger::Logger`].

#![warn(missing_docs, unreachable_pub)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![forbid(unsafe_code)]

mod config;
mod error;
mod maintenance;
pub mod naming;
mod writer;

pub use config::RotationConfig;
pub use error::{Error, Result};
pub use maintenance::MaintenanceStats;
pub use writer::RotatingWriter;
