//! Captured log records and their wire representation

use crate::proto::LogEntry;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Free-form metadata attached to a captured record
pub type LogMetadata = BTreeMap<String, serde_json::Value>;

/// Severity of a captured record, derived from the output channel used
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LogLevel {
    /// Debug-level messages
    Debug,
    /// Informational messages
    Info,
    /// Warning conditions
    Warn,
    /// Error conditions
    Error,
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogLevel::Debug => write!(f, "DEBUG"),
            LogLevel::Info => write!(f, "INFO"),
            LogLevel::Warn => write!(f, "WARN"),
            LogLevel::Error => write!(f, "ERROR"),
        }
    }
}

impl FromStr for LogLevel {
    type Err = crate::LogShipError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "DEBUG" | "TRACE" => Ok(LogLevel::Debug),
            "INFO" | "LOG" => Ok(LogLevel::Info),
            "WARN" | "WARNING" => Ok(LogLevel::Warn),
            "ERROR" => Ok(LogLevel::Error),
            other => Err(crate::LogShipError::Config(format!("Unknown log level: {}", other))),
        }
    }
}

/// A single record captured from the host
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CapturedLog {
    /// Unique identifier for this record
    pub id: Uuid,

    /// Capture time
    pub timestamp: DateTime<Utc>,

    /// Severity
    pub level: LogLevel,

    /// Rendered message
    pub message: String,

    /// Additional metadata such as the capture source
    #[serde(default)]
    pub metadata: LogMetadata,
}

impl CapturedLog {
    /// Create a record stamped with the current time
    pub fn new(level: LogLevel, message: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            level,
            message: message.into(),
            metadata: LogMetadata::new(),
        }
    }

    /// Replace the capture time
    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }

    /// Attach a metadata entry
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Capture time as an ISO-8601 string with millisecond precision
    pub fn timestamp_iso(&self) -> String {
        self.timestamp.to_rfc3339_opts(SecondsFormat::Millis, true)
    }

    /// Convert into the record shape accepted by the ingestion service
    pub fn to_wire(&self) -> LogEntry {
        LogEntry {
            message: format!("[{}] {}", self.level, self.message),
            timestamp: self.timestamp_iso(),
        }
    }

    /// Serialize to JSON string
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}
