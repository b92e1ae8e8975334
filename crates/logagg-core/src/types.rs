//! Core types for logagg-core.
//!
//! [`Record`] is the unit of data flowing from producers, through the queue
//! and the workers, into a storage sink.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One log event.
///
/// Records are immutable once built: the fields are private and the queue,
/// workers and sinks only ever move or clone them.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Record {
    timestamp: DateTime<Utc>,
    source: String,
    message: String,
    level: String,
}

impl Record {
    /// Build a record with an explicit timestamp.
    pub fn new(
        timestamp: DateTime<Utc>,
        source: impl Into<String>,
        message: impl Into<String>,
        level: impl Into<String>,
    ) -> Self {
        Self {
            timestamp,
            source: source.into(),
            message: message.into(),
            level: level.into(),
        }
    }

    /// Build a record stamped with the current time.
    pub fn now(
        source: impl Into<String>,
        message: impl Into<String>,
        level: impl Into<String>,
    ) -> Self {
        Self::new(Utc::now(), source, message, level)
    }

    /// When the event occurred.
    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    /// Producer or host that emitted the event.
    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// Severity label. Open set; never validated.
    pub fn level(&self) -> &str {
        &self.level
    }
}

impl std::fmt::Display for Record {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} [{}] {}: {}",
            self.timestamp.to_rfc3339_opts(chrono::SecondsFormat::Millis, true),
            self.level,
            self.source,
            self.message
        )
    }
}
