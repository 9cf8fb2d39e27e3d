//! Test support utilities
//!
//! This module provides a sink that captures everything written to it.
//! It's only available when the `test-support` feature is enabled.

use crate::Sink;
use parking_lot::Mutex;
use std::io;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

/// A sink that keeps all written bytes in memory
#[derive(Clone, Debug, Default)]
pub struct MemorySink {
    buffer: Arc<Mutex<Vec<u8>>>,
    writes: Arc<Mutex<usize>>,
    failing: Arc<AtomicBool>,
    delay: Option<Duration>,
}

impl MemorySink {
    /// Create an empty sink
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sleep for `delay` inside every write, simulating a slow device
    #[must_use]
    pub const fn with_write_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Make subsequent writes fail (or succeed again)
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Everything written so far, lossily decoded
    #[must_use]
    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.buffer.lock()).into_owned()
    }

    /// Written lines, without their newlines
    #[must_use]
    pub fn lines(&self) -> Vec<String> {
        self.contents().lines().map(str::to_string).collect()
    }

    /// Check if the output contains a specific string
    #[must_use]
    pub fn contains(&self, text: &str) -> bool {
        self.contents().contains(text)
    }

    /// Number of successful `write` calls
    #[must_use]
    pub fn write_count(&self) -> usize {
        *self.writes.lock()
    }

    /// Discard captured output
    pub fn clear(&self) {
        self.buffer.lock().clear();
    }
}

impl Sink for MemorySink {
    fn write(&self, data: &[u8]) -> io::Result<usize> {
        if let Some(delay) = self.delay {
            thread::sleep(delay);
        }
        if self.failing.load(Ordering::SeqCst) {
            return Err(io::Error::other("memory sink set to fail"));
        }

        self.buffer.lock().extend_from_slice(data);
        *self.writes.lock() += 1;
        Ok(data.len())
    }
}
