//! Gmail search query construction

use chrono::{DateTime, Duration, Utc};

/// Builder for the `q` parameter of `users.messages.list`
///
/// # Examples:
/// - `from:(news@example.com)` - everything from one sender
/// - `before:1706659200` - received before an instant (epoch seconds)
/// - `larger:10485760` - bigger than 10 MB
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GmailQuery {
    parts: Vec<String>,
}

impl GmailQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_sender(mut self, sender: &str) -> Self {
        self.parts.push(format!("from:({})", sender.trim()));
        self
    }

    /// Gmail reads a bare `YYYY/MM/DD` as midnight Pacific, so send the
    /// exact instant instead
    pub fn before(mut self, cutoff: DateTime<Utc>) -> Self {
        self.parts.push(format!("before:{}", cutoff.timestamp()));
        self
    }

    pub fn larger_than_bytes(mut self, bytes: u64) -> Self {
        self.parts.push(format!("larger:{}", bytes));
        self
    }

    pub fn raw(mut self, term: &str) -> Self {
        let term = term.trim();
        if !term.is_empty() {
            self.parts.push(term.to_string());
        }
        self
    }

    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }

    pub fn build(&self) -> String {
        self.parts.join(" ")
    }
}

/// Instant before which a message counts as older than `older_than_days`
pub fn stale_cutoff(now: DateTime<Utc>, older_than_days: u32) -> DateTime<Utc> {
    now - Duration::days(i64::from(older_than_days))
}

/// Megabytes (binary) to bytes
pub fn megabytes_to_bytes(mb: u64) -> u64 {
    mb.saturating_mul(1024 * 1024)
}
