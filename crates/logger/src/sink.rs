//! Byte sinks that receive formatted entries

use parking_lot::Mutex;
use std::io::{self, Write};
use std::sync::Arc;

/// Destination for formatted log bytes.
///
/// Implementations serialize concurrent callers internally; the logger may
/// call `write` from producer threads and from the dispatcher thread.
pub trait Sink: Send + Sync + 'static {
    /// Write one formatted entry, returning the number of bytes accepted
    ///
    /// # Errors
    ///
    /// Returns an error if the bytes could not be written.
    fn write(&self, data: &[u8]) -> io::Result<usize>;

    /// Flush any buffered bytes
    ///
    /// # Errors
    ///
    /// Returns an error if flushing fails.
    fn flush(&self) -> io::Result<()> {
        Ok(())
    }
}

impl<S: Sink + ?Sized> Sink for Arc<S> {
    fn write(&self, data: &[u8]) -> io::Result<usize> {
        (**self).write(data)
    }

    fn flush(&self) -> io::Result<()> {
        (**self).flush()
    }
}

/// Adapts any [`io::Write`] into a [`Sink`] by guarding it with a lock
#[derive(Debug, Default)]
pub struct WriterSink<W> {
    writer: Mutex<W>,
}

impl<W: Write + Send + 'static> WriterSink<W> {
    /// Wrap a writer
    pub fn new(writer: W) -> Self {
        Self {
            writer: Mutex::new(writer),
        }
    }

    /// Unwrap the writer
    pub fn into_inner(self) -> W {
        self.writer.into_inner()
    }
}

impl WriterSink<io::Stdout> {
    /// A sink writing to standard output
    #[must_use]
    pub fn stdout() -> Self {
        Self::new(io::stdout())
    }
}

impl WriterSink<io::Stderr> {
    /// A sink writing to standard error
    #[must_use]
    pub fn stderr() -> Self {
        Self::new(io::stderr())
    }
}

impl<W: Write + Send + 'static> Sink for WriterSink<W> {
    fn write(&self, data: &[u8]) -> io::Result<usize> {
        let mut writer = self.writer.lock();
        writer.write_all(data)?;
        Ok(data.len())
    }

    fn flush(&self) -> io::Result<()> {
        self.writer.lock().flush()
    }
}
