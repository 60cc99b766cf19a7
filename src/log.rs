//! Bounded in-memory log ring for inspection tooling.
//!
//! Records are pushed by the [`LoggingHook`](crate::LoggingHook) and read
//! back as a snapshot; once the capacity is reached the oldest line is
//! dropped. The buffer uses a mutex for simplicity since contention is
//! expected to be low.

use std::collections::VecDeque;
use std::fmt;
use std::sync::Mutex;

use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

use crate::lock::mutex_lock;

const SOURCE: &str = "log";

/// Severity of a recorded line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Debug => "DEBUG",
            Self::Info => "INFO",
            Self::Warn => "WARN",
            Self::Error => "ERROR",
        };
        f.write_str(label)
    }
}

/// One recorded line.
#[derive(Debug, Clone)]
pub struct LogRecord {
    pub level: LogLevel,
    pub message: String,
    pub timestamp: OffsetDateTime,
}

impl fmt::Display for LogRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.timestamp.format(&Rfc3339) {
            Ok(ts) => write!(f, "{ts} {} {}", self.level, self.message),
            Err(_) => write!(f, "{} {}", self.level, self.message),
        }
    }
}

/// Fixed-capacity ring of log records.
pub struct LogBuffer {
    records: Mutex<VecDeque<LogRecord>>,
    capacity: usize,
}

impl LogBuffer {
    /// Create a buffer holding at most `capacity` records (clamped to 1).
    pub fn new(capacity: usize) -> Self {
        Self {
            records: Mutex::new(VecDeque::new()),
            capacity: capacity.max(1),
        }
    }

    /// Append a record, dropping the oldest line if the buffer is full.
    pub fn record(&self, level: LogLevel, message: impl Into<String>) {
        let mut records = mutex_lock(&self.records, SOURCE, "record");
        if records.len() == self.capacity {
            records.pop_front();
        }
        records.push_back(LogRecord {
            level,
            message: message.into(),
            timestamp: OffsetDateTime::now_utc(),
        });
    }

    /// Copy of the current contents, oldest first.
    pub fn snapshot(&self) -> Vec<LogRecord> {
        mutex_lock(&self.records, SOURCE, "snapshot")
            .iter()
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        mutex_lock(&self.records, SOURCE, "len").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        mutex_lock(&self.records, SOURCE, "clear").clear();
    }
}
