//! Log sink abstraction.
//!
//! The observer and the sampling controller only ever need `log(severity, message)`.
//! Production code forwards to `tracing`; tests record the lines and assert on them.

use std::sync::{Arc, Mutex, MutexGuard};

/// Severity of a log line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Severity {
    Info,
    Error,
}

/// Destination for the agent's log lines.
pub trait LogSink: Send + Sync {
    /// Emit one log line.
    fn log(&self, severity: Severity, message: &str);

    fn info(&self, message: &str) {
        self.log(Severity::Info, message);
    }

    fn error(&self, message: &str) {
        self.log(Severity::Error, message);
    }
}

impl<T: LogSink + ?Sized> LogSink for Arc<T> {
    fn log(&self, severity: Severity, message: &str) {
        (**self).log(severity, message);
    }
}

/// Sink that forwards every line to the `tracing` facade under the `envnode` target.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl LogSink for TracingSink {
    fn log(&self, severity: Severity, message: &str) {
        match severity {
            Severity::Info => tracing::info!(target: "envnode", "{}", message),
            Severity::Error => tracing::error!(target: "envnode", "{}", message),
        }
    }
}

/// In-memory sink that keeps every line in order.
///
/// Cloning shares the underlying buffer.
#[derive(Debug, Clone, Default)]
pub struct RecordingSink {
    records: Arc<Mutex<Vec<(Severity, String)>>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<(Severity, String)>> {
        // Records are pushed whole, so a poisoned buffer is still consistent.
        self.records.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// All records so far.
    pub fn records(&self) -> Vec<(Severity, String)> {
        self.lock().clone()
    }

    /// Messages only, in order.
    pub fn messages(&self) -> Vec<String> {
        self.lock().iter().map(|(_, m)| m.clone()).collect()
    }

    /// Severities only, in order.
    pub fn severities(&self) -> Vec<Severity> {
        self.lock().iter().map(|(s, _)| *s).collect()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Drop everything recorded so far.
    pub fn clear(&self) {
        self.lock().clear();
    }
}

impl LogSink for RecordingSink {
    fn log(&self, severity: Severity, message: &str) {
        self.lock().push((severity, message.to_string()));
    }
}
