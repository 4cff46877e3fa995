//! # Dispatcher tuning knobs.
//!
//! [`Config`] defines the timing behavior of a [`Dispatcher`](crate::Dispatcher):
//! how long it may idle with nothing pending, how short its sleep may get,
//! how early a deadline counts as due, and when a pending activation is
//! considered abandoned.
//!
//! # Example
//! ```
//! use std::time::Duration;
//! use eventline::Config;
//!
//! let mut cfg = Config::default();
//! cfg.idle_ceiling = Duration::from_secs(5);
//! cfg.near_due = Duration::from_millis(3);
//!
//! assert_eq!(cfg.near_due, Duration::from_millis(3));
//! ```

use std::time::Duration;

/// Timing configuration for a dispatcher instance.
///
/// All fields bound the dispatcher's own sleep/wake cycle; none of them
/// limits producers, which never block on enqueue.
#[derive(Clone, Copy, Debug)]
pub struct Config {
    /// Longest idle sleep when no deadline is pending.
    pub idle_ceiling: Duration,
    /// Shortest sleep the loop will perform; a smaller computed wait is
    /// clamped up to avoid a busy spin.
    pub min_sleep: Duration,
    /// A pending deadline within this margin of "now" fires immediately
    /// instead of scheduling one more short sleep.
    pub near_due: Duration,
    /// A still-pending activation whose recorded execution time lies this far
    /// in the past is treated as abandoned and cleared on re-activation.
    pub stale_after: Duration,
}

impl Default for Config {
    /// Provides a default configuration:
    /// - `idle_ceiling = 10s`
    /// - `min_sleep = 2ms`
    /// - `near_due = 3ms`
    /// - `stale_after = 5s`
    fn default() -> Self {
        Self {
            idle_ceiling: Duration::from_secs(10),
            min_sleep: Duration::from_millis(2),
            near_due: Duration::from_millis(3),
            stale_after: Duration::from_secs(5),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cfg = Config::default();
        assert_eq!(cfg.idle_ceiling, Duration::from_secs(10));
        assert_eq!(cfg.min_sleep, Duration::from_millis(2));
        assert_eq!(cfg.near_due, Duration::from_millis(3));
        assert_eq!(cfg.stale_after, Duration::from_secs(5));
    }
}
