//! Injectable time source.
//!
//! Every persisted timestamp in the control plane flows through a [`Clock`]
//! so the escalation ladder's time-based transitions are deterministic
//! under test.

use std::sync::{Arc, Mutex};

use chrono::{Duration, Local, NaiveDateTime};

/// Format for every persisted timestamp.
///
/// ISO-8601 local time without offset, at microsecond precision. The audit
/// checksum hashes these exact strings, so the format is load-bearing:
/// entries written under a different format will not verify.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.6f";

/// Compact stamp used in alert and notification filenames.
pub const FILE_STAMP_FORMAT: &str = "%Y%m%d_%H%M%S";

/// Time source handed to every component through the [`crate::Context`].
#[derive(Debug, Clone)]
pub enum Clock {
    /// Wall-clock local time.
    System,
    /// Shared, manually advanced instant. Test-only in practice.
    Fixed(Arc<Mutex<NaiveDateTime>>),
}

impl Default for Clock {
    fn default() -> Self {
        Self::System
    }
}

impl Clock {
    /// Create a fixed clock starting at `start`.
    #[must_use]
    pub fn fixed(start: NaiveDateTime) -> Self {
        Self::Fixed(Arc::new(Mutex::new(start)))
    }

    /// Current instant.
    #[must_use]
    pub fn now(&self) -> NaiveDateTime {
        match self {
            Self::System => Local::now().naive_local(),
            Self::Fixed(instant) => *instant.lock().unwrap_or_else(std::sync::PoisonError::into_inner),
        }
    }

    /// Current instant formatted as a persisted timestamp.
    #[must_use]
    pub fn timestamp(&self) -> String {
        self.now().format(TIMESTAMP_FORMAT).to_string()
    }

    /// Current instant formatted for filenames.
    #[must_use]
    pub fn file_stamp(&self) -> String {
        self.now().format(FILE_STAMP_FORMAT).to_string()
    }

    /// Advance a fixed clock by `delta`. No-op on the system clock.
    pub fn advance(&self, delta: Duration) {
        if let Self::Fixed(instant) = self {
            let mut guard = instant.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
            *guard = *guard + delta;
        }
    }
}

/// Parse a persisted timestamp.
///
/// Accepts the canonical microsecond format and the plain second-precision
/// form, so rows written by external tooling still parse.
#[must_use]
pub fn parse_timestamp(value: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(value, TIMESTAMP_FORMAT)
        .or_else(|_| NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S"))
        .ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn start() -> NaiveDateTime {
        NaiveDateTime::parse_from_str("2025-06-01T08:00:00", "%Y-%m-%dT%H:%M:%S").unwrap()
    }

    #[test]
    fn fixed_clock_advances() {
        let clock = Clock::fixed(start());
        let before = clock.now();
        clock.advance(Duration::hours(24));
        assert_eq!(clock.now() - before, Duration::hours(24));
    }

    #[test]
    fn fixed_clock_is_shared_between_clones() {
        let clock = Clock::fixed(start());
        let other = clock.clone();
        clock.advance(Duration::minutes(5));
        assert_eq!(clock.now(), other.now());
    }

    #[test]
    fn timestamp_round_trips() {
        let clock = Clock::fixed(start());
        let stamp = clock.timestamp();
        assert_eq!(parse_timestamp(&stamp), Some(start()));
    }

    #[test]
    fn second_precision_timestamps_still_parse() {
        assert!(parse_timestamp("2025-06-01T08:00:00").is_some());
        assert!(parse_timestamp("not a timestamp").is_none());
    }
}
