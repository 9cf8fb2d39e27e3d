//! Background compression and retention for rotated backups
//!
//! Each writer owns one maintenance thread. Jobs run strictly in the order
//! they were submitted, so a prune never races the compression of the backup
//! it is about to count.

use crate::naming::{self, Backup};
use crate::{Error, Result};
use crossbeam_channel::{Receiver, Sender, bounded, unbounded};
use flate2::Compression;
use flate2::write::GzEncoder;
use parking_lot::Mutex;
use serde::Serialize;
use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread::{self, JoinHandle};
use tracing::{debug, warn};

/// Outcome counters of the maintenance thread
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MaintenanceStats {
    /// Backups gzipped successfully
    pub compressed: u64,
    /// Backups that could not be gzipped
    pub compress_failures: u64,
    /// Backups deleted by retention
    pub pruned: u64,
    /// Listing or deletion failures during retention
    pub prune_failures: u64,
}

#[derive(Debug, Default)]
struct Counters {
    compressed: AtomicU64,
    compress_failures: AtomicU64,
    pruned: AtomicU64,
    prune_failures: AtomicU64,
}

impl Counters {
    fn snapshot(&self) -> MaintenanceStats {
        MaintenanceStats {
            compressed: self.compressed.load(Ordering::Relaxed),
            compress_failures: self.compress_failures.load(Ordering::Relaxed),
            pruned: self.pruned.load(Ordering::Relaxed),
            prune_failures: self.prune_failures.load(Ordering::Relaxed),
        }
    }
}

enum Job {
    Compress(PathBuf),
    Prune,
    Barrier(Sender<()>),
}

/// Handle to a writer's maintenance thread
#[derive(Debug)]
pub(crate) struct MaintenanceWorker {
    jobs: Mutex<Option<Sender<Job>>>,
    handle: Mutex<Option<JoinHandle<()>>>,
    counters: Arc<Counters>,
}

impl MaintenanceWorker {
    /// Spawn the thread for the log file at `path`
    pub(crate) fn spawn(path: PathBuf, max_backups: usize) -> Result<Self> {
        let (jobs, receiver) = unbounded();
        let counters = Arc::new(Counters::default());

        let worker_counters = counters.clone();
        let handle = thread::Builder::new()
            .name("logpipe-maintenance".to_string())
            .spawn(move || run(&receiver, &path, max_backups, &worker_counters))
            .map_err(Error::Io)?;

        Ok(Self {
            jobs: Mutex::new(Some(jobs)),
            handle: Mutex::new(Some(handle)),
            counters,
        })
    }

    /// Queue compression of a freshly rotated backup
    pub(crate) fn compress(&self, backup: PathBuf) {
        self.submit(Job::Compress(backup));
    }

    /// Queue a retention pass
    pub(crate) fn prune(&self) {
        self.submit(Job::Prune);
    }

    /// Block until every job submitted so far has run
    pub(crate) fn wait(&self) {
        let (done, finished) = bounded(1);
        if self.submit(Job::Barrier(done)) {
            let _ = finished.recv();
        }
    }

    pub(crate) fn stats(&self) -> MaintenanceStats {
        self.counters.snapshot()
    }

    /// Run the remaining jobs and stop the thread
    pub(crate) fn shutdown(&self) {
        drop(self.jobs.lock().take());
        let handle = self.handle.lock().take();
        if let Some(handle) = handle {
            if handle.join().is_err() {
                warn!("Log maintenance thread panicked");
            }
        }
    }

    fn submit(&self, job: Job) -> bool {
        self.jobs
            .lock()
            .as_ref()
            .is_some_and(|jobs| jobs.send(job).is_ok())
    }
}

impl Drop for MaintenanceWorker {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn run(jobs: &Receiver<Job>, path: &Path, max_backups: usize, counters: &Counters) {
    for job in jobs {
        match job {
            Job::Compress(backup) => match compress_backup(&backup) {
                Ok(()) => {
                    counters.compressed.fetch_add(1, Ordering::Relaxed);
                }
                Err(e) => {
                    warn!("Failed to compress {}: {e}", backup.display());
                    counters.compress_failures.fetch_add(1, Ordering::Relaxed);
                }
            },
            Job::Prune => prune_backups(path, max_backups, counters),
            Job::Barrier(done) => {
                let _ = done.send(());
            }
        }
    }
    debug!("Log maintenance thread for {} stopped", path.display());
}

/// Gzip `backup` into `<backup>.gz` and remove the original.
///
/// A partial archive is removed on failure and the original is kept.
fn compress_backup(backup: &Path) -> io::Result<()> {
    let target = naming::compressed_path(backup);

    if let Err(e) = write_gzip(backup, &target) {
        if let Err(cleanup) = fs::remove_file(&target) {
            if cleanup.kind() != io::ErrorKind::NotFound {
                debug!("Failed to remove partial {}: {cleanup}", target.display());
            }
        }
        return Err(e);
    }

    fs::remove_file(backup)
}

fn write_gzip(source: &Path, target: &Path) -> io::Result<()> {
    let mut input = BufReader::new(File::open(source)?);
    let output = File::create(target)?;
    let mut encoder = GzEncoder::new(BufWriter::new(output), Compression::default());
    io::copy(&mut input, &mut encoder)?;
    let mut output = encoder.finish()?;
    output.flush()?;
    output.get_ref().sync_all()
}

/// Delete the oldest backups beyond `max_backups`. Zero keeps everything.
fn prune_backups(path: &Path, max_backups: usize, counters: &Counters) {
    if max_backups == 0 {
        return;
    }

    let backups = match naming::list_backups(path) {
        Ok(backups) => backups,
        Err(e) => {
            warn!("Failed to list backups of {}: {e}", path.display());
            counters.prune_failures.fetch_add(1, Ordering::Relaxed);
            return;
        }
    };

    // A backup whose compression failed halfway may exist in both forms;
    // both files belong to the same rotation.
    let mut rotations: Vec<Vec<&Backup>> = Vec::new();
    for backup in &backups {
        match rotations.last_mut() {
            Some(group) if group[0].sequence == backup.sequence => group.push(backup),
            _ => rotations.push(vec![backup]),
        }
    }

    let surplus = rotations.len().saturating_sub(max_backups);
    for group in rotations.into_iter().take(surplus) {
        let mut removed = true;
        for backup in group {
            if let Err(e) = fs::remove_file(&backup.path) {
                warn!("Failed to remove backup {}: {e}", backup.path.display());
                counters.prune_failures.fetch_add(1, Ordering::Relaxed);
                removed = false;
            }
        }
        if removed {
            counters.pruned.fetch_add(1, Ordering::Relaxed);
        }
    }
}
