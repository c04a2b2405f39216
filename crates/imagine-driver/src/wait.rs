//! Status polling
//!
//! The engine has no interrupt line in this design: the host learns about
//! FIFO space and compute completion only by reading status bits. Every
//! such loop goes through [`poll_until`], which pairs a [`WaitStrategy`]
//! (what to do between reads) with a [`PollConfig`] (when to give up).
//!
//! The default configuration never gives up. That matches the hardware
//! contract (the FIFO drains, EOV eventually rises) and keeps the push path
//! free of clock reads.

use crate::error::{ImagineError, Result};
use std::fmt::Debug;
use std::time::{Duration, Instant};

/// What to do between two status reads.
pub trait WaitStrategy: Debug + Send {
    /// Called after the `attempt`-th failed poll (1-based).
    fn wait(&mut self, attempt: u64);
}

/// Busy-spin with a CPU relax hint. Lowest latency.
#[derive(Debug, Clone, Copy, Default)]
pub struct Spin;

impl WaitStrategy for Spin {
    fn wait(&mut self, _attempt: u64) {
        std::hint::spin_loop();
    }
}

/// Sleep a fixed interval between polls.
#[derive(Debug, Clone, Copy)]
pub struct Sleep(pub Duration);

impl WaitStrategy for Sleep {
    fn wait(&mut self, _attempt: u64) {
        std::thread::sleep(self.0);
    }
}

/// Spin for the first few polls, then sleep with exponential backoff.
#[derive(Debug, Clone, Copy)]
pub struct Backoff {
    spins: u64,
    initial: Duration,
    max: Duration,
}

impl Backoff {
    /// Spin `spins` times, then sleep from `initial` doubling up to `max`.
    pub const fn new(spins: u64, initial: Duration, max: Duration) -> Self {
        Self {
            spins,
            initial,
            max,
        }
    }

    /// Sleep interval for a given attempt, `None` while still spinning.
    pub fn interval(&self, attempt: u64) -> Option<Duration> {
        if attempt <= self.spins {
            return None;
        }
        let doublings = u32::try_from(attempt - self.spins - 1).unwrap_or(u32::MAX).min(16);
        Some(self.initial.saturating_mul(1 << doublings).min(self.max))
    }
}

impl Default for Backoff {
    fn default() -> Self {
        Self::new(64, Duration::from_micros(10), Duration::from_millis(1))
    }
}

impl WaitStrategy for Backoff {
    fn wait(&mut self, attempt: u64) {
        match self.interval(attempt) {
            Some(d) => std::thread::sleep(d),
            None => std::hint::spin_loop(),
        }
    }
}

/// Bounds on a status poll. Both unset means wait forever.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PollConfig {
    /// Give up once this much wall time has passed.
    pub deadline: Option<Duration>,
    /// Give up after this many status reads.
    pub max_attempts: Option<u64>,
}

impl PollConfig {
    /// Wait forever.
    pub const fn unbounded() -> Self {
        Self {
            deadline: None,
            max_attempts: None,
        }
    }

    /// Give up after `deadline`.
    #[must_use]
    pub const fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Give up after `attempts` status reads.
    #[must_use]
    pub const fn with_max_attempts(mut self, attempts: u64) -> Self {
        self.max_attempts = Some(attempts);
        self
    }

    /// True if neither bound is set.
    pub const fn is_unbounded(&self) -> bool {
        self.deadline.is_none() && self.max_attempts.is_none()
    }
}

/// Poll `ready` until it returns true.
///
/// Returns the number of failed polls before success.
///
/// # Errors
///
/// Returns [`ImagineError::Timeout`] if a bound in `config` trips first.
pub fn poll_until<W: WaitStrategy + ?Sized>(
    strategy: &mut W,
    config: &PollConfig,
    waiting_for: &'static str,
    mut ready: impl FnMut() -> bool,
) -> Result<u64> {
    let start = config.deadline.map(|d| (Instant::now(), d));
    let mut attempts: u64 = 0;

    loop {
        attempts += 1;
        if ready() {
            return Ok(attempts - 1);
        }

        let attempts_exhausted = config.max_attempts.is_some_and(|max| attempts >= max);
        let deadline_passed = start.is_some_and(|(t0, d)| t0.elapsed() >= d);
        if attempts_exhausted || deadline_passed {
            return Err(ImagineError::Timeout {
                waiting_for,
                attempts,
            });
        }

        strategy.wait(attempts);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Default)]
    struct Recording(Vec<u64>);

    impl WaitStrategy for Recording {
        fn wait(&mut self, attempt: u64) {
            self.0.push(attempt);
        }
    }

    #[test]
    fn ready_immediately() {
        let mut w = Recording::default();
        let n = poll_until(&mut w, &PollConfig::unbounded(), "test", || true).unwrap();
        assert_eq!(n, 0);
        assert!(w.0.is_empty());
    }

    #[test]
    fn waits_between_polls() {
        let mut w = Recording::default();
        let mut left = 3;
        let n = poll_until(&mut w, &PollConfig::unbounded(), "test", || {
            left -= 1;
            left == 0
        })
        .unwrap();
        assert_eq!(n, 2);
        assert_eq!(w.0, vec![1, 2]);
    }

    #[test]
    fn attempt_bound_trips() {
        let mut w = Recording::default();
        let cfg = PollConfig::unbounded().with_max_attempts(5);
        let err = poll_until(&mut w, &cfg, "never", || false).unwrap_err();
        assert!(matches!(
            err,
            ImagineError::Timeout {
                waiting_for: "never",
                attempts: 5
            }
        ));
        assert_eq!(w.0.len(), 4);
    }

    #[test]
    fn deadline_trips() {
        let cfg = PollConfig::unbounded().with_deadline(Duration::from_millis(5));
        let err = poll_until(&mut Sleep(Duration::from_millis(1)), &cfg, "eov", || false)
            .unwrap_err();
        assert!(matches!(err, ImagineError::Timeout { waiting_for: "eov", .. }));
    }

    #[test]
    fn backoff_schedule() {
        let b = Backoff::new(2, Duration::from_micros(10), Duration::from_micros(50));
        assert_eq!(b.interval(1), None);
        assert_eq!(b.interval(2), None);
        assert_eq!(b.interval(3), Some(Duration::from_micros(10)));
        assert_eq!(b.interval(4), Some(Duration::from_micros(20)));
        assert_eq!(b.interval(5), Some(Duration::from_micros(40)));
        assert_eq!(b.interval(6), Some(Duration::from_micros(50)));
        assert_eq!(b.interval(1000), Some(Duration::from_micros(50)));
    }
}
