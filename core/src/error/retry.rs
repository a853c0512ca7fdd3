/// Retry strategies for the one operation the engine is allowed to retry:
/// acquiring exclusive access to the device.
///
/// Writes are never retried. A pass that fails partway leaves the chunk in
/// a mixed state that only a restart of the whole pass could audit.
use std::time::Duration;

/// Retry strategy trait
pub trait RetryStrategy: Send + Sync {
    /// Determine if another attempt should follow failed attempt number `attempt` (0-based)
    fn should_retry(&self, attempt: u32) -> bool;

    /// Delay before the next attempt
    fn next_delay(&self, attempt: u32) -> Duration;

    /// Total attempts allowed, including the first one
    fn max_attempts(&self) -> u32;
}

/// Fixed-interval strategy: `max_attempts` tries, `interval` apart
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedInterval {
    interval: Duration,
    max_attempts: u32,
}

impl FixedInterval {
    pub fn new(interval: Duration, max_attempts: u32) -> Self {
        Self {
            interval,
            max_attempts: max_attempts.max(1),
        }
    }

    /// 20 attempts, 500ms apart
    pub fn device_lock() -> Self {
        Self::new(Duration::from_millis(500), 20)
    }

    /// Upper bound on time spent sleeping between attempts
    pub fn total_budget(&self) -> Duration {
        self.interval * self.max_attempts.saturating_sub(1)
    }
}

impl Default for FixedInterval {
    fn default() -> Self {
        Self::device_lock()
    }
}

impl RetryStrategy for FixedInterval {
    fn should_retry(&self, attempt: u32) -> bool {
        attempt + 1 < self.max_attempts
    }

    fn next_delay(&self, _attempt: u32) -> Duration {
        self.interval
    }

    fn max_attempts(&self) -> u32 {
        self.max_attempts
    }
}

/// Run `operation` until it succeeds, returns a non-transient error, or the
/// strategy's budget is exhausted. Returns the last error and the attempt count.
pub fn retry_with<T, E, F, P>(
    strategy: &dyn RetryStrategy,
    mut operation: F,
    is_transient: P,
) -> Result<T, (E, u32)>
where
    F: FnMut(u32) -> Result<T, E>,
    P: Fn(&E) -> bool,
{
    let mut attempt = 0u32;
    loop {
        match operation(attempt) {
            Ok(value) => return Ok(value),
            Err(err) => {
                if !is_transient(&err) || !strategy.should_retry(attempt) {
                    return Err((err, attempt + 1));
                }
                std::thread::sleep(strategy.next_delay(attempt));
                attempt += 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[test]
    fn test_fixed_interval_defaults() {
        let strategy = FixedInterval::device_lock();
        assert_eq!(strategy.max_attempts(), 20);
        assert_eq!(strategy.next_delay(0), Duration::from_millis(500));
        assert_eq!(strategy.next_delay(7), Duration::from_millis(500));
        assert_eq!(strategy.total_budget(), Duration::from_millis(500 * 19));
    }

    #[test]
    fn test_fixed_interval_should_retry_boundary() {
        let strategy = FixedInterval::new(Duration::from_millis(1), 3);
        assert!(strategy.should_retry(0));
        assert!(strategy.should_retry(1));
        assert!(!strategy.should_retry(2));
    }

    #[test]
    fn test_zero_attempts_is_clamped_to_one() {
        let strategy = FixedInterval::new(Duration::from_millis(1), 0);
        assert_eq!(strategy.max_attempts(), 1);
        assert!(!strategy.should_retry(0));
    }

    #[test]
    fn test_retry_with_succeeds_after_transient_failures() {
        let strategy = FixedInterval::new(Duration::from_millis(1), 5);
        let calls = Cell::new(0);

        let result = retry_with(
            &strategy,
            |_| {
                calls.set(calls.get() + 1);
                if calls.get() < 3 {
                    Err("busy")
                } else {
                    Ok(42)
                }
            },
            |_| true,
        );

        assert_eq!(result, Ok(42));
        assert_eq!(calls.get(), 3);
    }

    #[test]
    fn test_retry_with_exhausts_budget() {
        let strategy = FixedInterval::new(Duration::from_millis(1), 4);
        let result: Result<(), _> = retry_with(&strategy, |_| Err("busy"), |_| true);
        assert_eq!(result, Err(("busy", 4)));
    }

    #[test]
    fn test_retry_with_stops_on_permanent_error() {
        let strategy = FixedInterval::new(Duration::from_millis(1), 10);
        let calls = Cell::new(0);

        let result: Result<(), _> = retry_with(
            &strategy,
            |_| {
                calls.set(calls.get() + 1);
                Err("not found")
            },
            |e| *e == "busy",
        );

        assert_eq!(result, Err(("not found", 1)));
        assert_eq!(calls.get(), 1);
    }
}
