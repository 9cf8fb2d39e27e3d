//! Backup file names
//!
//! A backup of `app.log` is named `app.log.<YYYYMMDD-HHMMSS>.<seq>` with the
//! timestamp in UTC and a six-digit, zero-padded sequence. Compressed
//! backups add `.gz`. Both fields are fixed width, so ordering by name is
//! ordering by age.

use crate::{Error, Result};
use chrono::{DateTime, NaiveDateTime, Utc};
use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

const TIMESTAMP_FORMAT: &str = "%Y%m%d-%H%M%S";
const TIMESTAMP_LEN: usize = 15;
const SEQUENCE_WIDTH: usize = 6;
const COMPRESSED_SUFFIX: &str = ".gz";

/// A backup found next to the active file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Backup {
    /// Full path of the backup
    pub path: PathBuf,
    /// Rotation timestamp as written in the name
    pub stamp: String,
    /// Rotation sequence
    pub sequence: u64,
    /// Whether the backup is gzipped
    pub compressed: bool,
}

impl Backup {
    fn sort_key(&self) -> (&str, u64, bool) {
        (&self.stamp, self.sequence, self.compressed)
    }
}

/// Backup path for `path` rotated at `at` with sequence `sequence`
#[must_use]
pub fn backup_path(path: &Path, at: DateTime<Utc>, sequence: u64) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(format!(
        ".{}.{sequence:0width$}",
        at.format(TIMESTAMP_FORMAT),
        width = SEQUENCE_WIDTH
    ));
    PathBuf::from(name)
}

/// The compressed counterpart of `backup`
#[must_use]
pub fn compressed_path(backup: &Path) -> PathBuf {
    let mut name = OsString::from(backup.as_os_str());
    name.push(COMPRESSED_SUFFIX);
    PathBuf::from(name)
}

/// Parse the part of a backup name that follows `<file>.`.
///
/// Returns `(stamp, sequence, compressed)`, or `None` when the suffix is not
/// a backup written by this crate.
#[must_use]
pub fn parse_backup_suffix(suffix: &str) -> Option<(String, u64, bool)> {
    let (rest, compressed) = match suffix.strip_suffix(COMPRESSED_SUFFIX) {
        Some(rest) => (rest, true),
        None => (suffix, false),
    };
    let (stamp, sequence) = rest.split_once('.')?;

    if stamp.len() != TIMESTAMP_LEN
        || NaiveDateTime::parse_from_str(stamp, TIMESTAMP_FORMAT).is_err()
    {
        return None;
    }
    if sequence.len() < SEQUENCE_WIDTH || !sequence.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }

    Some((stamp.to_string(), sequence.parse().ok()?, compressed))
}

/// All backups of `path`, oldest first.
///
/// Candidates are the entries of the log file's directory whose file name is
/// the log file's name, a dot and a well-formed backup suffix. Matching on
/// file names keeps listing independent of how the directory part of `path`
/// is spelled.
///
/// # Errors
///
/// Returns [`Error::Configuration`] if `path` has no file name, or an I/O
/// error if the directory cannot be read.
pub fn list_backups(path: &Path) -> Result<Vec<Backup>> {
    let name = path.file_name().ok_or_else(|| {
        Error::Configuration(format!("log path has no file name: {}", path.display()))
    })?;
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    let mut prefix = name.as_encoded_bytes().to_vec();
    prefix.push(b'.');

    let mut backups = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                debug!("Skipping unreadable backup candidate: {e}");
                continue;
            }
        };
        let file_name = entry.file_name();
        let Some(suffix) = file_name
            .as_encoded_bytes()
            .strip_prefix(prefix.as_slice())
            .and_then(|suffix| std::str::from_utf8(suffix).ok())
        else {
            continue;
        };
        if let Some((stamp, sequence, compressed)) = parse_backup_suffix(suffix) {
            backups.push(Backup {
                path: dir.join(&file_name),
                stamp,
                sequence,
                compressed,
            });
        }
    }

    backups.sort_by(|a, b| a.sort_key().cmp(&b.sort_key()));
    Ok(backups)
}

/// Sequence to use for the next rotation of `path`
///
/// # Errors
///
/// See [`list_backups`].
pub fn next_sequence(path: &Path) -> Result<u64> {
    Ok(list_backups(path)?
        .iter()
        .map(|backup| backup.sequence + 1)
        .max()
        .unwrap_or(1))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_backup_path_format() {
        let at = Utc.with_ymd_and_hms(2024, 3, 9, 7, 5, 1).unwrap();
        let path = backup_path(Path::new("/var/log/app.log"), at, 42);
        assert_eq!(path, PathBuf::from("/var/log/app.log.20240309-070501.000042"));
        assert_eq!(
            compressed_path(&path),
            PathBuf::from("/var/log/app.log.20240309-070501.000042.gz")
        );
    }

    #[test]
    fn test_parse_rejects_foreign_names() {
        assert_eq!(
            parse_backup_suffix("20240309-070501.000042.gz"),
            Some(("20240309-070501".to_string(), 42, true))
        );
        assert!(parse_backup_suffix("lock").is_none());
        assert!(parse_backup_suffix("20240309-070501").is_none());
        assert!(parse_backup_suffix("2024-03-09.000001").is_none());
        assert!(parse_backup_suffix("20240309-070501.12").is_none());
        assert!(parse_backup_suffix("20240309-070501.00001x").is_none());
    }

    #[test]
    fn test_list_orders_oldest_first() {
        let dir = tempfile::tempdir().unwrap();
        let log = dir.path().join("app.log");
        let early = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let late = Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap();

        let names = [
            backup_path(&log, late, 3),
            compressed_path(&backup_path(&log, early, 2)),
            backup_path(&log, early, 1),
            dir.path().join("app.log.old"),
            dir.path().join("other.log.20240101-000000.000009"),
        ];
        for name in &names {
            fs::write(name, b"x").unwrap();
        }

        let backups = list_backups(&log).unwrap();
        let sequences: Vec<u64> = backups.iter().map(|b| b.sequence).collect();
        assert_eq!(sequences, vec![1, 2, 3]);
        assert!(backups[1].compressed);
        assert_eq!(next_sequence(&log).unwrap(), 4);
    }

    #[test]
    fn test_list_ignores_path_spelling() {
        let dir = tempfile::tempdir().unwrap();
        let at = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        fs::write(backup_path(&dir.path().join("app.log"), at, 7), b"x").unwrap();

        let doubled = PathBuf::from(format!("{}//app.log", dir.path().display()));
        let dotted = dir.path().join(".").join("app.log");
        for spelling in [&doubled, &dotted] {
            let backups = list_backups(spelling).unwrap();
            assert_eq!(backups.len(), 1, "{}", spelling.display());
            assert_eq!(backups[0].sequence, 7);
            assert!(backups[0].path.exists());
            assert_eq!(next_sequence(spelling).unwrap(), 8);
        }
    }

    #[cfg(unix)]
    #[test]
    fn test_list_accepts_non_utf8_names() {
        use std::os::unix::ffi::OsStrExt;

        let dir = tempfile::tempdir().unwrap();
        let log = dir.path().join(std::ffi::OsStr::from_bytes(b"app-\xff.log"));
        let at = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        fs::write(backup_path(&log, at, 1), b"x").unwrap();

        let backups = list_backups(&log).unwrap();
        assert_eq!(backups.len(), 1);
        assert_eq!(next_sequence(&log).unwrap(), 2);
    }

    #[test]
    fn test_next_sequence_without_backups() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(next_sequence(&dir.path().join("fresh.log")).unwrap(), 1);
    }
}
