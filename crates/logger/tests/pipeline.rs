//! End-to-end tests for the logging pipeline

use logpipe_logger::*;
use parking_lot::Mutex;
use std::collections::HashSet;
use std::io;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

#[derive(Default)]
struct Capture {
    lines: Mutex<Vec<String>>,
}

impl Capture {
    fn lines(&self) -> Vec<String> {
        self.lines.lock().clone()
    }
}

impl Sink for Capture {
    fn write(&self, data: &[u8]) -> io::Result<usize> {
        let text = String::from_utf8_lossy(data);
        self.lines
            .lock()
            .extend(text.lines().map(str::to_string));
        Ok(data.len())
    }
}

#[test]
fn test_filter_sample_and_count() {
    let capture = Arc::new(Capture::default());
    let logger = Logger::new(
        LoggerConfig::default()
            .with_min_level(Level::Info)
            .with_sampling(0.5, 7)
            .with_metrics(true),
        capture.clone(),
    )
    .unwrap();

    let mut expected = 0;
    for i in 0..1_000 {
        let message = format!("event {i}");
        let kept = should_sample(&message, 0.5, 7);
        let outcome = logger.info(message).unwrap();
        if kept {
            expected += 1;
            assert_eq!(outcome, Outcome::Written);
        } else {
            assert_eq!(outcome, Outcome::Sampled);
        }
    }
    assert_eq!(logger.debug("below threshold").unwrap(), Outcome::Filtered);

    assert_eq!(capture.lines().len(), expected);
    assert_eq!(logger.metrics().total_logs, i64::try_from(expected).unwrap());
    // Roughly half survive a 0.5 rate.
    assert!((350..650).contains(&expected), "{expected}");
}

#[test]
fn test_error_rate_tracks_errors() {
    let capture = Arc::new(Capture::default());
    let logger = Logger::new(LoggerConfig::default().with_metrics(true), capture).unwrap();

    logger.error("first").unwrap();
    let snapshot = logger.metrics();
    assert!(snapshot.last_error_at.is_some());
    assert!(snapshot.error_rate.abs() < f64::EPSILON);

    thread::sleep(Duration::from_millis(20));
    logger.error("second").unwrap();
    assert!(logger.metrics().error_rate > 0.0);
    assert_eq!(logger.metrics().level_count(Level::Error), Some(2));
}

#[test]
fn test_async_from_many_threads() {
    let capture = Arc::new(Capture::default());
    let logger = Arc::new(
        Logger::new(
            LoggerConfig::default().with_async(
                DispatcherConfig::default()
                    .with_buffer_capacity(8)
                    .with_flush_interval(Duration::from_millis(5)),
            ),
            capture.clone(),
        )
        .unwrap(),
    );

    let handles: Vec<_> = (0..8)
        .map(|t| {
            let logger = logger.clone();
            thread::spawn(move || {
                for i in 0..100 {
                    logger
                        .record(Level::Notice, "work", [("thread", t), ("item", i)])
                        .unwrap();
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    let stats = logger.dispatch_stats().unwrap();
    assert_eq!(stats.queued + stats.fallback, 800);
    logger.shutdown().unwrap();

    let lines = capture.lines();
    assert_eq!(lines.len(), 800);
    let unique: HashSet<&str> = lines
        .iter()
        .filter_map(|line| line.split_once(' ').map(|(_, rest)| rest))
        .collect();
    assert_eq!(unique.len(), 800);
}

#[test]
fn test_dropping_logger_flushes_queue() {
    let capture = Arc::new(Capture::default());
    {
        let logger = Logger::new(
            LoggerConfig::default().with_async(
                DispatcherConfig::default().with_flush_interval(Duration::from_secs(60)),
            ),
            capture.clone(),
        )
        .unwrap();
        for i in 0..25 {
            logger.warn(format!("pending {i}")).unwrap();
        }
    }
    assert_eq!(capture.lines().len(), 25);
}

#[test]
fn test_config_from_json() {
    let config: LoggerConfig = serde_json::from_str(
        r#"{"min_level":"notice","sample_rate":1.0,"enable_metrics":true}"#,
    )
    .unwrap();
    let capture = Arc::new(Capture::default());
    let logger = Logger::new(config, capture.clone()).unwrap();

    assert_eq!(logger.info("hidden").unwrap(), Outcome::Filtered);
    assert_eq!(logger.audit("shown").unwrap(), Outcome::Written);
    assert!(capture.lines()[0].contains("AUDIT shown"));
}
