use chrono::{DateTime, Utc};

/// A single line read from a log source, tagged with where it came from
/// and when the agent observed it.
///
/// `observed_at` is stamped by the source reader at read time, not by the
/// sender at send time — batching and network delay must not affect it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogLine {
    pub content: String,
    pub source_id: String,
    pub observed_at: DateTime<Utc>,
}

impl LogLine {
    pub fn new(content: impl Into<String>, source_id: impl Into<String>, observed_at: DateTime<Utc>) -> Self {
        Self {
            content: content.into(),
            source_id: source_id.into(),
            observed_at,
        }
    }

    /// Approximate wire size in bytes, used to decide when a batch is full
    /// without re-serializing it to JSON just to measure it.
    pub fn approx_size(&self) -> usize {
        self.content.len() + self.source_id.len() + 32
    }
}
