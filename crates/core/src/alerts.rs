//! Alert log
//!
//! Alerts are raised by the pool monitor, the service self-monitor and the
//! process panic hook. Each one is emitted as a `warn!` event, appended to an
//! alert file and kept in a bounded in-memory buffer for the monitoring
//! endpoint.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::VecDeque;
use std::fs::OpenOptions;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Number of alerts kept in memory
pub const DEFAULT_ALERT_CAPACITY: usize = 100;

/// A single raised alert
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AlertRecord {
    pub timestamp: DateTime<Utc>,
    pub source: String,
    pub message: String,
}

impl AlertRecord {
    /// Line written to the alert file
    pub fn to_log_line(&self) -> String {
        format!("[{}] {}: {}", self.timestamp.to_rfc3339(), self.source, self.message)
    }
}

/// Shared, cloneable alert sink
#[derive(Debug, Clone)]
pub struct AlertLog {
    inner: Arc<AlertLogInner>,
}

#[derive(Debug)]
struct AlertLogInner {
    path: Option<PathBuf>,
    capacity: usize,
    recent: Mutex<VecDeque<AlertRecord>>,
}

impl AlertLog {
    pub fn new(path: Option<PathBuf>) -> Self {
        Self::with_capacity(path, DEFAULT_ALERT_CAPACITY)
    }

    pub fn with_capacity(path: Option<PathBuf>, capacity: usize) -> Self {
        Self {
            inner: Arc::new(AlertLogInner {
                path,
                capacity: capacity.max(1),
                recent: Mutex::new(VecDeque::with_capacity(capacity.max(1))),
            }),
        }
    }

    /// Alert log that never touches the file system
    pub fn in_memory() -> Self {
        Self::new(None)
    }

    pub fn path(&self) -> Option<&Path> {
        self.inner.path.as_deref()
    }

    /// Raise an alert. File errors are logged and swallowed.
    pub fn alert(&self, source: &str, message: impl Into<String>) -> AlertRecord {
        let record = AlertRecord {
            timestamp: Utc::now(),
            source: source.to_string(),
            message: message.into(),
        };

        tracing::warn!(alert_source = %record.source, "ALERT: {}", record.message);

        if let Some(path) = &self.inner.path {
            if let Err(e) = append_line(path, &record.to_log_line()) {
                tracing::error!(path = %path.display(), "Failed to write alert file: {}", e);
            }
        }

        let mut recent = self.inner.recent.lock();
        if recent.len() >= self.inner.capacity {
            recent.pop_front();
        }
        recent.push_back(record.clone());

        record
    }

    /// Most recent alerts, newest first
    pub fn recent(&self, limit: usize) -> Vec<AlertRecord> {
        self.inner.recent.lock().iter().rev().take(limit).cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.inner.recent.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Append one line to a log file, creating parent directories as needed.
pub fn append_line(path: &Path, line: &str) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    writeln!(file, "{}", line)
}

/// Record every panic in the alert log before the previous hook runs.
pub fn install_panic_hook(alerts: AlertLog) {
    let previous = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        let location = info
            .location()
            .map(|l| format!(" at {}:{}", l.file(), l.line()))
            .unwrap_or_default();
        let payload = info
            .payload()
            .downcast_ref::<&str>()
            .map(|s| s.to_string())
            .or_else(|| info.payload().downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "unknown panic payload".to_string());

        alerts.alert("panic", format!("{}{}", payload, location));
        previous(info);
    }));
}
