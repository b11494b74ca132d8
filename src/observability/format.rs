//! Log record encoding.
//!
//! A record is `{level, time, caller, function, message, ...fields}`. Field
//! order is preserved so that the fixed keys always lead the line.

use std::fmt;

use chrono::{DateTime, Local};
use serde_json::{Map, Value};
use tracing::field::{Field, Visit};
use tracing::{Level, Metadata};

use crate::config::LogFormat;

const TIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.3f%z";

/// Field name that promotes an error event to a `FATAL` record.
pub const FATAL_FIELD: &str = "fatal";

/// Collects the fields of one event.
#[derive(Debug, Default)]
pub struct RecordVisitor {
    message: String,
    fields: Map<String, Value>,
    fatal: bool,
}

impl RecordVisitor {
    fn insert(&mut self, field: &Field, value: Value) {
        self.fields.insert(field.name().to_string(), value);
    }
}

impl Visit for RecordVisitor {
    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            self.message = value.to_string();
        } else {
            self.insert(field, Value::from(value));
        }
    }

    fn record_bool(&mut self, field: &Field, value: bool) {
        if field.name() == FATAL_FIELD {
            self.fatal = value;
        } else {
            self.insert(field, Value::from(value));
        }
    }

    fn record_i64(&mut self, field: &Field, value: i64) {
        self.insert(field, Value::from(value));
    }

    fn record_u64(&mut self, field: &Field, value: u64) {
        self.insert(field, Value::from(value));
    }

    fn record_f64(&mut self, field: &Field, value: f64) {
        self.insert(field, Value::from(value));
    }

    fn record_error(&mut self, field: &Field, value: &(dyn std::error::Error + 'static)) {
        self.insert(field, Value::from(value.to_string()));
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        if field.name() == "message" {
            self.message = format!("{value:?}");
        } else {
            self.insert(field, Value::from(format!("{value:?}")));
        }
    }
}

/// Capitalized level label.
pub fn level_label(level: &Level, fatal: bool) -> &'static str {
    if fatal && *level == Level::ERROR {
        return "FATAL";
    }
    match *level {
        Level::TRACE => "TRACE",
        Level::DEBUG => "DEBUG",
        Level::INFO => "INFO",
        Level::WARN => "WARN",
        Level::ERROR => "ERROR",
    }
}

/// `dir/file.rs:line`, trimmed to the last two path components.
pub fn short_caller(metadata: &Metadata<'_>) -> String {
    let file = metadata.file().unwrap_or("<unknown>").replace('\\', "/");
    let mut parts = file.rsplit('/');
    let name = parts.next().unwrap_or_default();
    let short = match parts.next() {
        Some(dir) => format!("{dir}/{name}"),
        None => name.to_string(),
    };
    match metadata.line() {
        Some(line) => format!("{short}:{line}"),
        None => short,
    }
}

/// Encode one record as a single line, including the trailing newline.
pub fn encode(
    format: LogFormat,
    time: &DateTime<Local>,
    metadata: &Metadata<'_>,
    record: RecordVisitor,
) -> String {
    let level = level_label(metadata.level(), record.fatal);
    let time = time.format(TIME_FORMAT).to_string();
    let caller = short_caller(metadata);
    let function = metadata.module_path().unwrap_or_else(|| metadata.target());

    match format {
        LogFormat::Json => {
            let mut line = Map::new();
            line.insert("level".into(), Value::from(level));
            line.insert("time".into(), Value::from(time));
            line.insert("caller".into(), Value::from(caller));
            line.insert("function".into(), Value::from(function));
            line.insert("message".into(), Value::from(record.message));
            for (key, value) in record.fields {
                line.insert(key, value);
            }
            let mut out = Value::Object(line).to_string();
            out.push('\n');
            out
        }
        LogFormat::Console => {
            let mut out = format!("{time}\t{level}\t{caller}\t{}", record.message);
            if !record.fields.is_empty() {
                out.push('\t');
                out.push_str(&Value::Object(record.fields).to_string());
            }
            out.push('\n');
            out
        }
    }
}
