//! Host log forwarding
//!
//! The core logs through `tracing`. Hosts that own their own log facility
//! register a [`LoggerSink`] and receive a flattened [`LogRecord`] for every
//! event that passes the sink's threshold.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::error::Result;

/// Severity of a forwarded record, ordered from most to least verbose.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    /// Lowercase name, also valid as an `EnvFilter` directive.
    pub fn as_str(self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One event as seen by the host.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogRecord {
    pub level: LogLevel,
    pub at: DateTime<Utc>,
    /// Module path of the emitting code, e.g. `core_transfer::upload`
    pub target: String,
    pub message: String,
    /// Key/value pairs recorded on the event, sorted by key
    pub fields: BTreeMap<String, String>,
    /// Name of the innermost span the event was emitted in
    pub span: Option<String>,
}

impl LogRecord {
    pub fn new(level: LogLevel, target: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            level,
            at: Utc::now(),
            target: target.into(),
            message: message.into(),
            fields: BTreeMap::new(),
            span: None,
        }
    }

    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.insert(key.into(), value.into());
        self
    }

    pub fn in_span(mut self, span: impl Into<String>) -> Self {
        self.span = Some(span.into());
        self
    }

    pub fn field(&self, key: &str) -> Option<&str> {
        self.fields.get(key).map(String::as_str)
    }

    /// Single-line rendering: `<time> <LEVEL> <target>[<span>]: <message> k=v ...`
    pub fn render(&self) -> String {
        let mut line = format!(
            "{} {:>5} {}",
            self.at.format("%H:%M:%S%.3f"),
            self.level.as_str().to_uppercase(),
            self.target
        );
        if let Some(span) = &self.span {
            line.push('[');
            line.push_str(span);
            line.push(']');
        }
        line.push_str(": ");
        line.push_str(&self.message);
        for (key, value) in &self.fields {
            line.push(' ');
            line.push_str(key);
            line.push('=');
            line.push_str(value);
        }
        line
    }
}

/// Receives records mirrored out of the core's `tracing` pipeline.
///
/// Records reach the sink after the global filter has run, so a sink only
/// narrows further through [`accepts`](LoggerSink::accepts). Implementations
/// must not block: on a runtime the call is spawned as its own task.
///
/// Values are logged as the core recorded them. Paths and session URLs are
/// already stripped or redacted at the call site.
#[async_trait]
pub trait LoggerSink: Send + Sync {
    async fn log(&self, record: LogRecord) -> Result<()>;

    async fn flush(&self) -> Result<()> {
        Ok(())
    }

    /// Whether records at `level` should be built and delivered at all.
    fn accepts(&self, level: LogLevel) -> bool {
        level >= LogLevel::Info
    }
}

/// Writes each record as one line to stderr. Useful for CLIs and tests.
#[derive(Debug, Clone, Copy)]
pub struct StderrSink {
    pub threshold: LogLevel,
}

impl StderrSink {
    pub fn new(threshold: LogLevel) -> Self {
        Self { threshold }
    }
}

impl Default for StderrSink {
    fn default() -> Self {
        Self::new(LogLevel::Info)
    }
}

#[async_trait]
impl LoggerSink for StderrSink {
    async fn log(&self, record: LogRecord) -> Result<()> {
        eprintln!("{}", record.render());
        Ok(())
    }

    fn accepts(&self, level: LogLevel) -> bool {
        level >= self.threshold
    }
}
