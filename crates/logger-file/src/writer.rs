//! Size- and age-based rotating file writer

use crate::maintenance::{MaintenanceStats, MaintenanceWorker};
use crate::{Error, Result, RotationConfig, naming};
use chrono::Utc;
use logpipe_logger::Sink;
use parking_lot::Mutex;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, warn};

#[derive(Debug)]
struct WriterState {
    /// `None` after a failed rotation until the next write reopens it
    file: Option<File>,
    current_size: u64,
    opened_at: Instant,
    next_sequence: u64,
    closed: bool,
}

/// A log file that rotates itself.
///
/// Before each write the writer checks whether the write would push the file
/// past `max_size_bytes`, or whether the file has been open longer than
/// `max_age`. If so, the file is renamed to a timestamped backup and a fresh
/// file is opened at the same path. Compression and retention of backups run
/// on a per-writer maintenance thread and never delay the write.
///
/// Writes and rotations serialize on one lock, so the writer can be shared
/// between threads directly.
#[derive(Debug)]
pub struct RotatingWriter {
    path: PathBuf,
    config: RotationConfig,
    state: Mutex<WriterState>,
    maintenance: MaintenanceWorker,
}

impl RotatingWriter {
    /// Open (or create) the log file at `path` in append mode.
    ///
    /// Missing parent directories are created. Backup sequence numbers
    /// continue after the highest one already on disk.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory or file cannot be created, or the
    /// maintenance thread cannot be started.
    pub fn new(path: impl Into<PathBuf>, config: RotationConfig) -> Result<Self> {
        let path = path.into();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent).map_err(|source| Error::CreateDirectory {
                    path: parent.to_path_buf(),
                    source,
                })?;
            }
        }

        let file = open_append(&path)?;
        let current_size = file.metadata()?.len();
        let next_sequence = naming::next_sequence(&path)?;
        let maintenance = MaintenanceWorker::spawn(path.clone(), config.max_backups)?;

        debug!(
            "Opened log file {} ({current_size} bytes, next backup {next_sequence})",
            path.display()
        );

        Ok(Self {
            path,
            config,
            state: Mutex::new(WriterState {
                file: Some(file),
                current_size,
                opened_at: Instant::now(),
                next_sequence,
                closed: false,
            }),
            maintenance,
        })
    }

    /// Append `data`, rotating first if it is due.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Closed`] after [`close`](Self::close),
    /// [`Error::Rotation`] if the file cannot be renamed to its backup name
    /// and [`Error::Open`] if the file cannot be (re)opened. After either
    /// rotation failure the next write retries opening the file.
    pub fn write(&self, data: &[u8]) -> Result<usize> {
        let mut state = self.state.lock();
        if state.closed {
            return Err(Error::Closed);
        }

        if state.file.is_none() {
            let file = open_append(&self.path)?;
            state.current_size = file.metadata()?.len();
            state.opened_at = Instant::now();
            state.file = Some(file);
        }

        let incoming = data.len() as u64;
        if self.config.exceeds_size(state.current_size, incoming)
            || self.config.exceeds_age(state.opened_at.elapsed())
        {
            self.rotate(&mut state)?;
        }

        let file = state.file.as_mut().ok_or(Error::Closed)?;
        file.write_all(data)?;
        state.current_size += incoming;
        Ok(data.len())
    }

    fn rotate(&self, state: &mut WriterState) -> Result<()> {
        if let Some(file) = state.file.take() {
            if let Err(e) = file.sync_all() {
                warn!("Failed to sync {} before rotation: {e}", self.path.display());
            }
        }

        let backup = naming::backup_path(&self.path, Utc::now(), state.next_sequence);
        state.next_sequence += 1;

        fs::rename(&self.path, &backup).map_err(|source| Error::Rotation {
            from: self.path.clone(),
            to: backup.clone(),
            source,
        })?;
        debug!("Rotated {} to {}", self.path.display(), backup.display());

        if self.config.compress {
            self.maintenance.compress(backup);
        }
        if self.config.max_backups > 0 {
            self.maintenance.prune();
        }

        state.file = Some(open_append(&self.path)?);
        state.current_size = 0;
        state.opened_at = Instant::now();
        Ok(())
    }

    /// Sync the file to disk
    ///
    /// # Errors
    ///
    /// Returns the sync error, or [`Error::Closed`] after `close`.
    pub fn flush(&self) -> Result<()> {
        let state = self.state.lock();
        if state.closed {
            return Err(Error::Closed);
        }
        if let Some(file) = &state.file {
            file.sync_data()?;
        }
        Ok(())
    }

    /// Close the file and wait for pending compression and retention.
    ///
    /// Closing is terminal: later writes fail with [`Error::Closed`]. Closing
    /// twice is a no-op.
    ///
    /// # Errors
    ///
    /// Returns the error from the final sync.
    pub fn close(&self) -> Result<()> {
        let file = {
            let mut state = self.state.lock();
            if state.closed {
                return Ok(());
            }
            state.closed = true;
            state.file.take()
        };

        let synced = file.map_or(Ok(()), |file| file.sync_all());
        self.maintenance.shutdown();
        synced?;
        Ok(())
    }

    /// Block until compression and retention queued so far have finished
    pub fn wait_for_maintenance(&self) {
        self.maintenance.wait();
    }

    /// Bytes in the active file
    #[must_use]
    pub fn current_size(&self) -> u64 {
        self.state.lock().current_size
    }

    /// Path of the active file
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The rotation settings
    #[must_use]
    pub const fn config(&self) -> &RotationConfig {
        &self.config
    }

    /// Compression and retention counters
    #[must_use]
    pub fn maintenance_stats(&self) -> MaintenanceStats {
        self.maintenance.stats()
    }
}

impl Sink for RotatingWriter {
    fn write(&self, data: &[u8]) -> io::Result<usize> {
        Self::write(self, data).map_err(io::Error::from)
    }

    fn flush(&self) -> io::Result<()> {
        Self::flush(self).map_err(io::Error::from)
    }
}

impl Drop for RotatingWriter {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            debug!("Failed to close {}: {e}", self.path.display());
        }
    }
}

fn open_append(path: &Path) -> Result<File> {
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|source| Error::Open {
            path: path.to_path_buf(),
            source,
        })
}
