//! Entry encoders
//!
//! Rendering is deliberately plain: the delivery pipeline only needs a line
//! of bytes per entry. Richer layouts plug in through [`Formatter`].

use crate::LogEntry;
use chrono::SecondsFormat;
use serde_json::{Map, Value};
use std::io::{self, Write};

/// Turns an entry into the bytes handed to a sink
pub trait Formatter: Send + Sync + 'static {
    /// Append the encoded entry, including its trailing newline, to `buf`
    ///
    /// # Errors
    ///
    /// Returns an error if the entry cannot be encoded.
    fn format(&self, entry: &LogEntry, buf: &mut Vec<u8>) -> io::Result<()>;
}

/// `<rfc3339> <LEVEL> <message> key=value ...`
#[derive(Debug, Clone, Copy, Default)]
pub struct PlainTextFormatter;

impl Formatter for PlainTextFormatter {
    fn format(&self, entry: &LogEntry, buf: &mut Vec<u8>) -> io::Result<()> {
        write!(
            buf,
            "{} {} {}",
            entry
                .timestamp()
                .to_rfc3339_opts(SecondsFormat::Millis, true),
            entry.level(),
            entry.message()
        )?;
        for (key, value) in entry.fields() {
            write!(buf, " {key}={value}")?;
        }
        buf.push(b'\n');
        Ok(())
    }
}

/// One JSON object per line
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonFormatter;

impl Formatter for JsonFormatter {
    fn format(&self, entry: &LogEntry, buf: &mut Vec<u8>) -> io::Result<()> {
        let mut object = Map::with_capacity(3 + entry.fields().len());
        object.insert(
            "time".to_string(),
            Value::String(
                entry
                    .timestamp()
                    .to_rfc3339_opts(SecondsFormat::Millis, true),
            ),
        );
        object.insert(
            "level".to_string(),
            Value::String(entry.level().label().to_string()),
        );
        object.insert(
            "msg".to_string(),
            Value::String(entry.message().to_string()),
        );
        for (key, value) in entry.fields() {
            object.insert(key.clone(), Value::String(value.clone()));
        }

        serde_json::to_writer(&mut *buf, &object)?;
        buf.push(b'\n');
        Ok(())
    }
}
