//! Asynchronous delivery through a bounded queue and one consumer thread
//!
//! Producers never wait on the sink: [`AsyncDispatcher::enqueue`] is a
//! non-blocking attempt, and [`AsyncDispatcher::dispatch`] applies the
//! configured [`BackpressurePolicy`] when the queue is full. The consumer
//! forwards entries in the order they were queued, drains the queue on every
//! flush tick, and drains it once more when stopped.

use crate::{Error, LogEntry, Result};
use crossbeam_channel::{self as channel, Receiver, Sender, TrySendError, select};
use serde::{Deserialize, Serialize};
use std::io;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

const WORKER_THREAD_NAME: &str = "logpipe-dispatch";

/// Final stage that writes an entry out, used both by the consumer thread
/// and by producers on the synchronous fallback path
pub trait Deliver: Send + Sync + 'static {
    /// Deliver one entry
    ///
    /// # Errors
    ///
    /// Returns an error if the entry could not be written.
    fn deliver(&self, entry: &LogEntry) -> io::Result<()>;
}

impl<F> Deliver for F
where
    F: Fn(&LogEntry) -> io::Result<()> + Send + Sync + 'static,
{
    fn deliver(&self, entry: &LogEntry) -> io::Result<()> {
        self(entry)
    }
}

/// What happens to an entry when the queue is full
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BackpressurePolicy {
    /// Write the entry synchronously from the producer. Such entries may
    /// reach the sink before entries still waiting in the queue.
    #[default]
    SyncFallback,
    /// Wait for queue space
    Block,
    /// Discard the entry and count it
    Drop,
}

/// Dispatcher settings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispatcherConfig {
    /// Queue depth
    pub buffer_capacity: usize,
    /// Longest time a queued entry waits before a forced drain
    pub flush_interval: Duration,
    /// Behaviour when the queue is full
    pub backpressure: BackpressurePolicy,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            buffer_capacity: 1000,
            flush_interval: Duration::from_secs(1),
            backpressure: BackpressurePolicy::SyncFallback,
        }
    }
}

impl DispatcherConfig {
    /// Set the queue depth
    #[must_use]
    pub const fn with_buffer_capacity(mut self, capacity: usize) -> Self {
        self.buffer_capacity = capacity;
        self
    }

    /// Set the flush interval; zero disables the periodic drain
    #[must_use]
    pub const fn with_flush_interval(mut self, interval: Duration) -> Self {
        self.flush_interval = interval;
        self
    }

    /// Set the backpressure policy
    #[must_use]
    pub const fn with_backpressure(mut self, policy: BackpressurePolicy) -> Self {
        self.backpressure = policy;
        self
    }

    /// Reject settings the dispatcher cannot run with
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] if the queue depth is zero.
    pub fn validate(&self) -> Result<()> {
        if self.buffer_capacity == 0 {
            return Err(Error::Configuration(
                "buffer_capacity must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Why an entry was not queued. The entry is handed back.
#[derive(Debug, thiserror::Error)]
pub enum EnqueueError {
    /// The queue is at capacity
    #[error("dispatcher queue is full")]
    Full(LogEntry),
    /// The consumer has been stopped
    #[error("dispatcher is stopped")]
    Stopped(LogEntry),
}

impl EnqueueError {
    /// Recover the rejected entry
    #[must_use]
    pub fn into_inner(self) -> LogEntry {
        match self {
            Self::Full(entry) | Self::Stopped(entry) => entry,
        }
    }
}

/// How [`AsyncDispatcher::dispatch`] disposed of an entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatch {
    /// Handed to the consumer thread
    Queued,
    /// Written synchronously because the queue was full
    Fallback,
    /// Discarded because the queue was full
    Dropped,
}

/// Dispatcher counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DispatchStats {
    /// Entries accepted into the queue
    pub queued: u64,
    /// Entries written on the producer's thread because the queue was full
    pub fallback: u64,
    /// Entries discarded by the drop policy
    pub dropped: u64,
    /// Queued entries the consumer delivered
    pub delivered: u64,
    /// Queued entries the consumer failed to deliver
    pub failed: u64,
}

#[derive(Debug, Default)]
struct Counters {
    queued: AtomicU64,
    fallback: AtomicU64,
    dropped: AtomicU64,
    delivered: AtomicU64,
    failed: AtomicU64,
}

impl Counters {
    fn snapshot(&self) -> DispatchStats {
        DispatchStats {
            queued: self.queued.load(Ordering::Relaxed),
            fallback: self.fallback.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
            delivered: self.delivered.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
        }
    }
}

/// Bounded queue drained by a single consumer thread
pub struct AsyncDispatcher {
    config: DispatcherConfig,
    sender: Option<Sender<LogEntry>>,
    stop: Option<Sender<()>>,
    worker: Option<JoinHandle<()>>,
    target: Arc<dyn Deliver>,
    counters: Arc<Counters>,
}

impl std::fmt::Debug for AsyncDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AsyncDispatcher")
            .field("config", &self.config)
            .field("running", &self.is_running())
            .field("stats", &self.stats())
            .finish_non_exhaustive()
    }
}

impl AsyncDispatcher {
    /// Spawn the consumer thread and return the producer handle
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid or the thread cannot
    /// be spawned.
    pub fn start(config: DispatcherConfig, target: Arc<dyn Deliver>) -> Result<Self> {
        config.validate()?;

        let (sender, receiver) = channel::bounded(config.buffer_capacity);
        let (stop_tx, stop_rx) = channel::bounded(1);
        let counters = Arc::new(Counters::default());

        let worker = {
            let target = Arc::clone(&target);
            let counters = Arc::clone(&counters);
            let flush_interval = config.flush_interval;
            thread::Builder::new()
                .name(WORKER_THREAD_NAME.to_string())
                .spawn(move || consume(receiver, stop_rx, flush_interval, &*target, &counters))
                .map_err(Error::Spawn)?
        };

        debug!(
            capacity = config.buffer_capacity,
            flush_interval = ?config.flush_interval,
            policy = ?config.backpressure,
            "dispatcher started"
        );

        Ok(Self {
            config,
            sender: Some(sender),
            stop: Some(stop_tx),
            worker: Some(worker),
            target,
            counters,
        })
    }

    /// Try to queue an entry without waiting
    ///
    /// # Errors
    ///
    /// Returns the entry inside [`EnqueueError`] if the queue is full or the
    /// consumer has stopped.
    pub fn enqueue(&self, entry: LogEntry) -> std::result::Result<(), EnqueueError> {
        let Some(sender) = &self.sender else {
            return Err(EnqueueError::Stopped(entry));
        };

        match sender.try_send(entry) {
            Ok(()) => {
                self.counters.queued.fetch_add(1, Ordering::Relaxed);
                Ok(())
            }
            Err(TrySendError::Full(entry)) => Err(EnqueueError::Full(entry)),
            Err(TrySendError::Disconnected(entry)) => Err(EnqueueError::Stopped(entry)),
        }
    }

    /// Queue an entry, applying the backpressure policy if the queue is full
    ///
    /// # Errors
    ///
    /// Returns the sink error if a synchronous write fails. Under
    /// [`BackpressurePolicy::SyncFallback`] an entry the consumer can no
    /// longer take is written inline; the other policies return
    /// [`Error::DispatcherStopped`] once the consumer is gone.
    pub fn dispatch(&self, entry: LogEntry) -> Result<Dispatch> {
        match self.config.backpressure {
            BackpressurePolicy::SyncFallback => match self.enqueue(entry) {
                Ok(()) => Ok(Dispatch::Queued),
                Err(EnqueueError::Full(entry) | EnqueueError::Stopped(entry)) => {
                    self.counters.fallback.fetch_add(1, Ordering::Relaxed);
                    self.target.deliver(&entry)?;
                    Ok(Dispatch::Fallback)
                }
            },
            BackpressurePolicy::Block => {
                let sender = self.sender.as_ref().ok_or(Error::DispatcherStopped)?;
                sender.send(entry).map_err(|_| Error::DispatcherStopped)?;
                self.counters.queued.fetch_add(1, Ordering::Relaxed);
                Ok(Dispatch::Queued)
            }
            BackpressurePolicy::Drop => match self.enqueue(entry) {
                Ok(()) => Ok(Dispatch::Queued),
                Err(EnqueueError::Full(_)) => {
                    self.counters.dropped.fetch_add(1, Ordering::Relaxed);
                    Ok(Dispatch::Dropped)
                }
                Err(EnqueueError::Stopped(_)) => Err(Error::DispatcherStopped),
            },
        }
    }

    /// Settings this dispatcher was started with
    #[must_use]
    pub const fn config(&self) -> &DispatcherConfig {
        &self.config
    }

    /// Whether the consumer thread is still attached
    #[must_use]
    pub const fn is_running(&self) -> bool {
        self.worker.is_some()
    }

    /// Entries currently waiting in the queue
    #[must_use]
    pub fn pending(&self) -> usize {
        self.sender.as_ref().map_or(0, Sender::len)
    }

    /// Current counters
    #[must_use]
    pub fn stats(&self) -> DispatchStats {
        self.counters.snapshot()
    }

    /// Stop the consumer, blocking until every queued entry is delivered
    pub fn stop(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        let Some(worker) = self.worker.take() else {
            return;
        };

        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
        }
        self.sender = None;

        if worker.join().is_err() {
            warn!("dispatcher consumer panicked before draining");
        }

        debug!(stats = ?self.counters.snapshot(), "dispatcher stopped");
    }
}

impl Drop for AsyncDispatcher {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Consumer loop: forward each entry as it arrives, drain on every tick,
/// drain and exit on stop
#[allow(clippy::needless_pass_by_value)]
fn consume(
    entries: Receiver<LogEntry>,
    stop: Receiver<()>,
    flush_interval: Duration,
    target: &dyn Deliver,
    counters: &Counters,
) {
    let ticker: Receiver<Instant> = if flush_interval.is_zero() {
        channel::never()
    } else {
        channel::tick(flush_interval)
    };

    loop {
        select! {
            recv(entries) -> entry => match entry {
                Ok(entry) => forward(target, &entry, counters),
                Err(_) => break,
            },
            recv(ticker) -> _ => {
                let pending = entries.len();
                for entry in entries.try_iter().take(pending) {
                    forward(target, &entry, counters);
                }
            },
            recv(stop) -> _ => {
                for entry in entries.try_iter() {
                    forward(target, &entry, counters);
                }
                break;
            },
        }
    }
}

fn forward(target: &dyn Deliver, entry: &LogEntry, counters: &Counters) {
    match target.deliver(entry) {
        Ok(()) => {
            counters.delivered.fetch_add(1, Ordering::Relaxed);
        }
        Err(error) => {
            counters.failed.fetch_add(1, Ordering::Relaxed);
            warn!(%error, level = %entry.level(), "failed to deliver queued log entry");
        }
    }
}
