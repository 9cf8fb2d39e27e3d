//! Rotation, retention and compression against a real directory

use flate2::read::GzDecoder;
use logpipe_logger::{DispatcherConfig, Level, Logger, LoggerConfig, Outcome};
use logpipe_logger_file::{Error, RotatingWriter, RotationConfig, naming};
use std::fs::{self, File};
use std::io::Read;
use std::sync::Arc;
use std::thread;

fn small_files(max_backups: usize) -> RotationConfig {
    RotationConfig::unbounded()
        .with_max_size(100)
        .with_max_backups(max_backups)
}

#[test]
fn test_single_oversized_write_makes_one_backup() {
    let dir = tempfile::tempdir().unwrap();
    let writer = RotatingWriter::new(dir.path().join("app.log"), small_files(3)).unwrap();

    writer.write(&[b'a'; 120]).unwrap();

    let backups = naming::list_backups(writer.path()).unwrap();
    assert_eq!(backups.len(), 1);
    assert!(!backups[0].compressed);
}

#[test]
fn test_retention_converges() {
    let dir = tempfile::tempdir().unwrap();
    let writer = RotatingWriter::new(dir.path().join("app.log"), small_files(3)).unwrap();

    for _ in 0..5 {
        writer.write(&[b'b'; 60]).unwrap();
    }
    writer.wait_for_maintenance();

    let backups = naming::list_backups(writer.path()).unwrap();
    assert!(backups.len() <= 3, "{backups:?}");
    // The newest backups survive.
    assert_eq!(backups.last().unwrap().sequence, 4);
    assert_eq!(writer.maintenance_stats().pruned, 1);
}

#[test]
fn test_compressed_backups_replace_originals() {
    let dir = tempfile::tempdir().unwrap();
    let writer = RotatingWriter::new(
        dir.path().join("app.log"),
        RotationConfig::unbounded()
            .with_max_size(64)
            .with_compression(true),
    )
    .unwrap();

    for i in 0..4 {
        writer.write(format!("{i:-<60}\n").as_bytes()).unwrap();
    }
    writer.wait_for_maintenance();

    let backups = naming::list_backups(writer.path()).unwrap();
    assert_eq!(backups.len(), 3);
    for (i, backup) in backups.iter().enumerate() {
        assert!(backup.compressed, "{backup:?}");
        let mut text = String::new();
        GzDecoder::new(File::open(&backup.path).unwrap())
            .read_to_string(&mut text)
            .unwrap();
        assert_eq!(text, format!("{i:-<60}\n"));
    }

    let stats = writer.maintenance_stats();
    assert_eq!(stats.compressed, 3);
    assert_eq!(stats.compress_failures, 0);
}

#[test]
fn test_compression_and_retention_together() {
    let dir = tempfile::tempdir().unwrap();
    let writer = RotatingWriter::new(
        dir.path().join("app.log"),
        small_files(2).with_compression(true),
    )
    .unwrap();

    for _ in 0..8 {
        writer.write(&[b'c'; 80]).unwrap();
    }
    writer.close().unwrap();

    let backups = naming::list_backups(writer.path()).unwrap();
    assert_eq!(backups.len(), 2);
    assert!(backups.iter().all(|b| b.compressed));
}

#[test]
fn test_retention_with_doubled_separator() {
    let dir = tempfile::tempdir().unwrap();
    let path = format!("{}//app.log", dir.path().display());
    let writer = RotatingWriter::new(&path, small_files(2).with_max_size(10)).unwrap();

    for _ in 0..6 {
        writer.write(b"0123456789").unwrap();
    }
    writer.wait_for_maintenance();

    let on_disk = fs::read_dir(dir.path())
        .unwrap()
        .filter(|entry| {
            let name = entry.as_ref().unwrap().file_name();
            name.to_string_lossy().starts_with("app.log.")
        })
        .count();
    assert_eq!(on_disk, 2);
    assert_eq!(writer.maintenance_stats().pruned, 3);
    drop(writer);

    // A restart with the same spelling keeps numbering after the survivors.
    let writer = RotatingWriter::new(&path, small_files(2).with_max_size(10)).unwrap();
    writer.write(b"0123456789").unwrap();
    writer.write(b"0123456789").unwrap();
    writer.wait_for_maintenance();

    let sequences: Vec<u64> = naming::list_backups(writer.path())
        .unwrap()
        .iter()
        .map(|b| b.sequence)
        .collect();
    assert_eq!(sequences, vec![6, 7]);
}

#[test]
fn test_sequence_resumes_after_restart() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("app.log");

    {
        let writer = RotatingWriter::new(&path, RotationConfig::unbounded().with_max_size(10)).unwrap();
        for _ in 0..3 {
            writer.write(b"0123456789").unwrap();
        }
    }

    let writer = RotatingWriter::new(&path, RotationConfig::unbounded().with_max_size(10)).unwrap();
    writer.write(b"0123456789").unwrap();

    let sequences: Vec<u64> = naming::list_backups(&path)
        .unwrap()
        .iter()
        .map(|b| b.sequence)
        .collect();
    assert_eq!(sequences, vec![1, 2, 3]);
}

#[test]
fn test_concurrent_writers_lose_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let writer = Arc::new(
        RotatingWriter::new(
            dir.path().join("app.log"),
            RotationConfig::unbounded().with_max_size(1_000),
        )
        .unwrap(),
    );

    thread::scope(|scope| {
        for t in 0..4 {
            let writer = &writer;
            scope.spawn(move || {
                for i in 0..100 {
                    writer.write(format!("{t:02}-{i:03}\n").as_bytes()).unwrap();
                }
            });
        }
    });
    writer.close().unwrap();

    let mut total = fs::read_to_string(writer.path()).unwrap();
    for backup in naming::list_backups(writer.path()).unwrap() {
        total.push_str(&fs::read_to_string(&backup.path).unwrap());
    }
    assert_eq!(total.lines().count(), 400);
}

#[test]
fn test_write_after_close_fails() {
    let dir = tempfile::tempdir().unwrap();
    let writer = RotatingWriter::new(dir.path().join("app.log"), RotationConfig::default()).unwrap();
    writer.close().unwrap();

    assert!(matches!(writer.write(b"late"), Err(Error::Closed)));
}

#[test]
fn test_logger_writes_through_rotating_writer() {
    let dir = tempfile::tempdir().unwrap();
    let writer = Arc::new(
        RotatingWriter::new(
            dir.path().join("service.log"),
            RotationConfig::unbounded()
                .with_max_size(2_048)
                .with_max_backups(50),
        )
        .unwrap(),
    );

    let logger = Logger::new(
        LoggerConfig::default()
            .with_min_level(Level::Info)
            .with_metrics(true)
            .with_async(DispatcherConfig::default().with_buffer_capacity(16)),
        writer.clone(),
    )
    .unwrap();

    for i in 0..200 {
        let outcome = logger
            .record(Level::Info, "request handled", [("id", i)])
            .unwrap();
        assert!(matches!(outcome, Outcome::Queued | Outcome::Written));
    }
    logger.debug("filtered out").unwrap();
    logger.shutdown().unwrap();
    writer.wait_for_maintenance();

    let mut lines = fs::read_to_string(writer.path()).unwrap();
    let backups = naming::list_backups(writer.path()).unwrap();
    assert!(!backups.is_empty());
    for backup in backups {
        lines.push_str(&fs::read_to_string(&backup.path).unwrap());
    }
    assert_eq!(lines.lines().count(), 200);
    assert!(!lines.contains("filtered out"));
    assert_eq!(logger.metrics().total_logs, 200);
}
