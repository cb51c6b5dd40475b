//! Time utilities and constants for the rate engine.

use chrono::{DateTime, Duration, Utc};

/// Engine timing constants.
pub mod constants {
    use super::Duration;

    /// Stored non-fallback rates younger than this are served without fetching (30 minutes).
    pub fn freshness_threshold() -> Duration {
        Duration::minutes(30)
    }

    /// Oldest stored rate still re-served as a fallback (24 hours).
    pub fn fallback_max_age() -> Duration {
        Duration::hours(24)
    }

    /// Window over which per-source health is computed (24 hours).
    pub fn health_window() -> Duration {
        Duration::hours(24)
    }

    /// Rows kept per rate table by cleanup.
    pub const KEEP_RECORDS: usize = 1000;

    /// Chance that a successful fetch also prunes the table.
    pub const CLEANUP_PROBABILITY: f64 = 0.02;
}

/// A timestamp with timezone (always UTC).
pub type Timestamp = DateTime<Utc>;

/// Get the current timestamp.
pub fn now() -> Timestamp {
    Utc::now()
}

/// Whole minutes elapsed since `timestamp`, never negative.
pub fn age_minutes(timestamp: Timestamp) -> i64 {
    (now() - timestamp).num_minutes().max(0)
}

/// Check if a timestamp is younger than `max_age`.
pub fn is_within(timestamp: Timestamp, max_age: Duration) -> bool {
    now() - timestamp < max_age
}

/// Start of the trailing window of length `window`.
pub fn window_start(window: Duration) -> Timestamp {
    now() - window
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_within() {
        let recent = now() - Duration::minutes(10);
        assert!(is_within(recent, constants::freshness_threshold()));

        let old = now() - Duration::minutes(45);
        assert!(!is_within(old, constants::freshness_threshold()));
        assert!(is_within(old, constants::fallback_max_age()));
    }

    #[test]
    fn test_age_minutes_never_negative() {
        let future = now() + Duration::minutes(5);
        assert_eq!(age_minutes(future), 0);

        let past = now() - Duration::minutes(45);
        assert!((44..=45).contains(&age_minutes(past)));
    }
}
