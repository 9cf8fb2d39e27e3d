//! The logger instance: filtering, sampling, metrics and routing

use crate::{
    AsyncDispatcher, Deliver, Dispatch, DispatchStats, DispatcherConfig, Formatter, Level,
    LogEntry, LoggerConfig, MetricsCollector, MetricsSnapshot, PlainTextFormatter, Result, Sink,
};
use parking_lot::RwLock;
use std::fmt::Display;
use std::io;
use std::sync::Arc;

/// What happened to a logged entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Below the configured minimum level
    Filtered,
    /// Rejected by the sampler
    Sampled,
    /// Accepted by the background dispatcher
    Queued,
    /// Written to the sink on the caller's thread
    Written,
    /// Discarded because the dispatcher queue was full
    Dropped,
}

/// Formats entries and writes them to the sink
struct Output {
    sink: Arc<dyn Sink>,
    formatter: Arc<dyn Formatter>,
}

impl Deliver for Output {
    fn deliver(&self, entry: &LogEntry) -> io::Result<()> {
        let mut buf = Vec::with_capacity(128);
        self.formatter.format(entry, &mut buf)?;

        let mut remaining = buf.as_slice();
        while !remaining.is_empty() {
            match self.sink.write(remaining)? {
                0 => {
                    return Err(io::Error::new(
                        io::ErrorKind::WriteZero,
                        "sink accepted no bytes",
                    ));
                }
                n => remaining = remaining.get(n..).unwrap_or_default(),
            }
        }
        Ok(())
    }
}

/// A self-contained logger.
///
/// Each instance owns its configuration, metrics and dispatcher, so several
/// loggers can coexist in one process without sharing state. Dropping the
/// logger stops its dispatcher after delivering everything queued.
pub struct Logger {
    config: RwLock<LoggerConfig>,
    output: Arc<Output>,
    metrics: MetricsCollector,
    dispatcher: RwLock<Option<AsyncDispatcher>>,
}

impl std::fmt::Debug for Logger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Logger")
            .field("config", &*self.config.read())
            .field("dispatcher", &*self.dispatcher.read())
            .finish_non_exhaustive()
    }
}

impl Logger {
    /// Create a logger writing plain text lines to `sink`
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid or the dispatcher
    /// cannot be started.
    pub fn new(config: LoggerConfig, sink: Arc<dyn Sink>) -> Result<Self> {
        Self::with_formatter(config, sink, Arc::new(PlainTextFormatter))
    }

    /// Create a logger with a custom formatter
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid or the dispatcher
    /// cannot be started.
    pub fn with_formatter(
        config: LoggerConfig,
        sink: Arc<dyn Sink>,
        formatter: Arc<dyn Formatter>,
    ) -> Result<Self> {
        let logger = Self {
            config: RwLock::new(LoggerConfig::default()),
            output: Arc::new(Output { sink, formatter }),
            metrics: MetricsCollector::new(),
            dispatcher: RwLock::new(None),
        };
        logger.reconfigure(config)?;
        Ok(logger)
    }

    /// Route one entry through filter, sampler, metrics and delivery
    ///
    /// # Errors
    ///
    /// Returns an error if an inline write (including the queue-full
    /// fallback) fails, or if the dispatcher stopped underneath the call.
    pub fn log(&self, entry: LogEntry) -> Result<Outcome> {
        let config = *self.config.read();

        if entry.level() < config.min_level {
            return Ok(Outcome::Filtered);
        }

        let sampler = config.sampler();
        if sampler.is_active() && !sampler.accepts(entry.message()) {
            return Ok(Outcome::Sampled);
        }

        if config.enable_metrics {
            self.metrics.record_log(entry.level());
        }

        let dispatcher = self.dispatcher.read();
        if let Some(dispatcher) = dispatcher.as_ref() {
            return Ok(match dispatcher.dispatch(entry)? {
                Dispatch::Queued => Outcome::Queued,
                Dispatch::Fallback => Outcome::Written,
                Dispatch::Dropped => Outcome::Dropped,
            });
        }
        drop(dispatcher);

        self.output.deliver(&entry)?;
        Ok(Outcome::Written)
    }

    /// Log a message with key/value pairs
    ///
    /// # Errors
    ///
    /// See [`Logger::log`].
    pub fn record<K, V, I>(
        &self,
        level: Level,
        message: impl Into<String>,
        fields: I,
    ) -> Result<Outcome>
    where
        K: Into<String>,
        V: Display,
        I: IntoIterator<Item = (K, V)>,
    {
        self.log(LogEntry::new(level, message).with_fields(fields))
    }

    /// Log at trace level
    ///
    /// # Errors
    ///
    /// See [`Logger::log`].
    pub fn trace(&self, message: impl Into<String>) -> Result<Outcome> {
        self.log(LogEntry::new(Level::Trace, message))
    }

    /// Log at debug level
    ///
    /// # Errors
    ///
    /// See [`Logger::log`].
    pub fn debug(&self, message: impl Into<String>) -> Result<Outcome> {
        self.log(LogEntry::new(Level::Debug, message))
    }

    /// Log at info level
    ///
    /// # Errors
    ///
    /// See [`Logger::log`].
    pub fn info(&self, message: impl Into<String>) -> Result<Outcome> {
        self.log(LogEntry::new(Level::Info, message))
    }

    /// Log at notice level
    ///
    /// # Errors
    ///
    /// See [`Logger::log`].
    pub fn notice(&self, message: impl Into<String>) -> Result<Outcome> {
        self.log(LogEntry::new(Level::Notice, message))
    }

    /// Log at warn level
    ///
    /// # Errors
    ///
    /// See [`Logger::log`].
    pub fn warn(&self, message: impl Into<String>) -> Result<Outcome> {
        self.log(LogEntry::new(Level::Warn, message))
    }

    /// Log at error level
    ///
    /// # Errors
    ///
    /// See [`Logger::log`].
    pub fn error(&self, message: impl Into<String>) -> Result<Outcome> {
        self.log(LogEntry::new(Level::Error, message))
    }

    /// Log at audit level
    ///
    /// # Errors
    ///
    /// See [`Logger::log`].
    pub fn audit(&self, message: impl Into<String>) -> Result<Outcome> {
        self.log(LogEntry::new(Level::Audit, message))
    }

    /// Replace the configuration.
    ///
    /// A running dispatcher is stopped and fully drained before a new one is
    /// started, so two consumers never share the sink. Producers wait for the
    /// swap to finish. If the new dispatcher fails to start, the rest of the
    /// new settings still apply and the logger delivers inline, with
    /// `async_mode` cleared to match.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid or the dispatcher
    /// cannot be started.
    pub fn reconfigure(&self, config: LoggerConfig) -> Result<()> {
        self.reconfigure_with(config, AsyncDispatcher::start)
    }

    fn reconfigure_with<F>(&self, config: LoggerConfig, start: F) -> Result<()>
    where
        F: FnOnce(DispatcherConfig, Arc<dyn Deliver>) -> Result<AsyncDispatcher>,
    {
        config.validate()?;

        let mut slot = self.dispatcher.write();
        if let Some(previous) = slot.take() {
            previous.stop();
        }

        if let Some(dispatcher_config) = config.async_mode {
            let target: Arc<dyn Deliver> = self.output.clone();
            match start(dispatcher_config, target) {
                Ok(dispatcher) => *slot = Some(dispatcher),
                Err(e) => {
                    *self.config.write() = config.without_async();
                    return Err(e);
                }
            }
        }

        *self.config.write() = config;
        Ok(())
    }

    /// Current configuration
    #[must_use]
    pub fn config(&self) -> LoggerConfig {
        *self.config.read()
    }

    /// Whether a dispatcher is running
    #[must_use]
    pub fn is_async(&self) -> bool {
        self.dispatcher.read().is_some()
    }

    /// Copy of the metrics counters
    #[must_use]
    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    /// Counters of the running dispatcher
    #[must_use]
    pub fn dispatch_stats(&self) -> Option<DispatchStats> {
        self.dispatcher.read().as_ref().map(AsyncDispatcher::stats)
    }

    /// Flush the sink. Entries still queued are not waited for.
    ///
    /// # Errors
    ///
    /// Returns the sink's flush error.
    pub fn flush(&self) -> Result<()> {
        self.output.sink.flush()?;
        Ok(())
    }

    /// Stop the dispatcher, delivering everything queued, then flush the
    /// sink. Later entries are written inline.
    ///
    /// # Errors
    ///
    /// Returns the sink's flush error.
    pub fn shutdown(&self) -> Result<()> {
        if let Some(dispatcher) = self.dispatcher.write().take() {
            dispatcher.stop();
        }
        self.flush()
    }
}
