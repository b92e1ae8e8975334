//! Test builders: ergonomic constructors for `Record` fixtures.
//!
//! These builders are designed for readability in test assertions, not for
//! production use.

use chrono::{DateTime, Duration, TimeZone, Utc};
use logagg::Record;

// ---------------------------------------------------------------------------
// RecordBuilder
// ---------------------------------------------------------------------------

/// Fluent builder for [`Record`] test fixtures.
///
/// ```rust
/// let record = RecordBuilder::new("timeout connecting to db")
///     .level("ERROR")
///     .source("api-7f9b4d")
///     .build();
/// ```
pub struct RecordBuilder {
    timestamp: DateTime<Utc>,
    source: String,
    message: String,
    level: String,
}

impl RecordBuilder {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            timestamp: base_time(),
            source: "test-source".to_string(),
            message: message.into(),
            level: "INFO".to_string(),
        }
    }

    pub fn source(mut self, source: impl Into<String>) -> Self {
        self.source = source.into();
        self
    }

    pub fn level(mut self, level: impl Into<String>) -> Self {
        self.level = level.into();
        self
    }

    pub fn timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }

    pub fn build(self) -> Record {
        Record::new(self.timestamp, self.source, self.message, self.level)
    }
}

/// Fixed reference instant so fixtures compare equal across runs.
pub fn base_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 15, 10, 0, 0).unwrap()
}

// ---------------------------------------------------------------------------
// Corpus helpers
// ---------------------------------------------------------------------------

/// Build `n` records whose messages carry a unique tag (`rec-<i>`), spread
/// over three sources and three levels, one millisecond apart.
pub fn tagged_records(n: usize) -> Vec<Record> {
    (0..n)
        .map(|i| {
            let level = match i % 10 {
                0 => "ERROR",
                1 | 2 => "WARN",
                _ => "INFO",
            };
            RecordBuilder::new(tag(i))
                .source(format!("server-{}", i % 3))
                .level(level)
                .timestamp(base_time() + Duration::milliseconds(i as i64))
                .build()
        })
        .collect()
}

/// The unique message tag used by [`tagged_records`].
pub fn tag(i: usize) -> String {
    format!("rec-{i}")
}
