//! Deadline-bounded retry policy.
//!
//! The decision is a pure function of `(now, updated_at, interval, max_time)`:
//! no process-local timer state, so a restarted worker resumes against the
//! same deadline.

use std::time::Duration;

use time::OffsetDateTime;

/// Floor applied to a zero retry interval so a retry is never a busy loop.
pub const MIN_RETRY_DELAY: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Delay before the next attempt.
    pub interval: Duration,
    /// Deadline measured from the operation's last persisted transition.
    pub max_time: Duration,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Budget remains; invoke the step again after `delay` (always > 0).
    Retry { delay: Duration, elapsed: Duration },
    /// `elapsed >= max_time`; the operation must be failed.
    Exhausted { elapsed: Duration },
}

impl RetryPolicy {
    pub fn new(interval: Duration, max_time: Duration) -> Self {
        Self { interval, max_time }
    }

    pub fn decide(&self, updated_at: OffsetDateTime, now: OffsetDateTime) -> RetryDecision {
        let elapsed = elapsed_since(updated_at, now);
        if elapsed >= self.max_time {
            return RetryDecision::Exhausted { elapsed };
        }
        RetryDecision::Retry {
            delay: self.interval.max(MIN_RETRY_DELAY),
            elapsed,
        }
    }
}

/// Wall-clock time between `since` and `now`. A `since` in the future
/// (clock skew between writers) counts as zero elapsed.
pub fn elapsed_since(since: OffsetDateTime, now: OffsetDateTime) -> Duration {
    let diff = now - since;
    if diff.is_negative() {
        return Duration::ZERO;
    }
    Duration::try_from(diff).unwrap_or(Duration::ZERO)
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    const HOUR: Duration = Duration::from_secs(3600);

    fn policy() -> RetryPolicy {
        RetryPolicy::new(HOUR, 3 * HOUR)
    }

    #[test]
    fn fresh_operation_retries_after_interval() {
        let now = datetime!(2025-01-01 12:00 UTC);
        assert_eq!(
            policy().decide(now, now),
            RetryDecision::Retry {
                delay: HOUR,
                elapsed: Duration::ZERO
            }
        );
    }

    #[test]
    fn retry_allowed_until_deadline() {
        let updated = datetime!(2025-01-01 12:00 UTC);
        let now = datetime!(2025-01-01 14:59:59 UTC);
        assert!(matches!(
            policy().decide(updated, now),
            RetryDecision::Retry { delay, .. } if delay == HOUR
        ));
    }

    #[test]
    fn exhausted_exactly_at_deadline() {
        let updated = datetime!(2025-01-01 12:00 UTC);
        let now = datetime!(2025-01-01 15:00 UTC);
        assert_eq!(
            policy().decide(updated, now),
            RetryDecision::Exhausted { elapsed: 3 * HOUR }
        );
    }

    #[test]
    fn future_updated_at_counts_as_zero_elapsed() {
        let updated = datetime!(2025-01-01 13:00 UTC);
        let now = datetime!(2025-01-01 12:00 UTC);
        assert_eq!(elapsed_since(updated, now), Duration::ZERO);
        assert!(matches!(
            policy().decide(updated, now),
            RetryDecision::Retry { .. }
        ));
    }

    #[test]
    fn zero_interval_is_floored() {
        let now = datetime!(2025-01-01 12:00 UTC);
        let decision = RetryPolicy::new(Duration::ZERO, HOUR).decide(now, now);
        assert_eq!(
            decision,
            RetryDecision::Retry {
                delay: MIN_RETRY_DELAY,
                elapsed: Duration::ZERO
            }
        );
    }

    #[test]
    fn zero_max_time_is_immediately_exhausted() {
        let now = datetime!(2025-01-01 12:00 UTC);
        assert!(matches!(
            RetryPolicy::new(HOUR, Duration::ZERO).decide(now, now),
            RetryDecision::Exhausted { .. }
        ));
    }
}
