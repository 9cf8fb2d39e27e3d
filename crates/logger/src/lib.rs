//! In-process structured logging with a non-blocking delivery pipeline.
//!
//! A [`Logger`] instance owns its configuration, metrics and (optionally) an
//! [`AsyncDispatcher`]. Every record flows through the same stages:
//!
//! ```text
//! record -> level filter -> Sampler -> MetricsCollector -> { AsyncDispatcher | Sink }
//! ```
//!
//! The sink is anything implementing [`Sink`]; the file rotation writer in
//! `logpipe-logger-file` is the main one.
#![warn(missing_docs, unreachable_pub)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![forbid(unsafe_code)]

mod config;
mod dispatcher;
mod error;
mod format;
mod level;
mod logger;
mod metrics;
mod record;
mod sampler;
mod sink;

#[cfg(any(test, feature = "test-support"))]
pub mod test_support;

pub use config::LoggerConfig;
pub use dispatcher::{
    AsyncDispatcher, BackpressurePolicy, Deliver, Dispatch, DispatchStats, DispatcherConfig,
    EnqueueError,
};
pub use error::{Error, Result};
pub use format::{Formatter, JsonFormatter, PlainTextFormatter};
pub use level::Level;
pub use logger::{Logger, Outcome};
pub use metrics::{MetricValue, MetricsCollector, MetricsSnapshot};
pub use record::LogEntry;
pub use sampler::{Sampler, should_sample};
pub use sink::{Sink, WriterSink};
