//! Progress tracking built on two [`Counter`]s. Ported from `diag.Progress`.
//!
//! The original panics on non-positive arguments. This crate keeps the
//! fail-fast requirement (spec §7.1) but expresses it as `Result` rather
//! than an actual panic, which is the idiomatic way a Rust library signals
//! caller-supplied invalid input without crashing the whole process.

use std::sync::Mutex;
use std::time::{Duration, Instant};

use crate::diag::counter::Counter;
use crate::diag::timer::Timer;
use crate::error::ProgressError;

/// ~999 years, matching the Go source's `time.Now().AddDate(999, 0, 0)`
/// sentinel for "no progress yet, can't estimate".
const FAR_FUTURE: Duration = Duration::from_secs(999 * 365 * 24 * 3600);

pub struct Progress {
    current: Counter,
    total: Counter,
    started: Timer,
    last_update: Mutex<Instant>,
}

impl Progress {
    pub fn new(total: f64) -> Result<Self, ProgressError> {
        if total <= 0.0 {
            return Err(ProgressError::NonPositiveTotal(total as i64));
        }
        Ok(Self {
            current: Counter::new(0.0),
            total: Counter::new(total),
            started: Timer::new(),
            last_update: Mutex::new(Instant::now()),
        })
    }

    pub fn add(&self, v: f64) -> Result<(), ProgressError> {
        if v <= 0.0 {
            return Err(ProgressError::NonPositiveDelta(v));
        }
        self.total.add(v);
        Ok(())
    }

    pub fn complete(&self, v: f64) -> Result<(), ProgressError> {
        if v <= 0.0 {
            return Err(ProgressError::NonPositiveDelta(v));
        }
        self.current.add(v);
        *self.last_update.lock().unwrap() = Instant::now();
        Ok(())
    }

    pub fn percent(&self) -> f64 {
        (self.current.value() / self.total.value()) * 100.0
    }

    pub fn remain_time(&self) -> Duration {
        let cur = self.current.value();
        if cur == 0.0 {
            return Duration::ZERO;
        }
        let remain = self.total.value() - cur;
        if remain <= 0.0 {
            // Completed at or past total: nothing left to wait for (spec §8
            // boundary behaviour: "Complete past total yields RemainTime() = 0").
            return Duration::ZERO;
        }
        let passed = self.started.elapsed();
        passed.mul_f64(remain / cur)
    }

    /// Instant at which the progress is estimated to complete.
    pub fn estimated_time(&self) -> Instant {
        let cur = self.current.value();
        if cur == 0.0 {
            return Instant::now() + FAR_FUTURE;
        }
        let passed = self.started.elapsed();
        let time_to_complete = passed.mul_f64(self.total.value() / cur);
        *self.last_update.lock().unwrap() + time_to_complete
    }

    pub fn value(&self) -> (f64, f64, Instant) {
        (
            self.current.value(),
            self.total.value(),
            *self.last_update.lock().unwrap(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_non_positive_total() {
        assert!(Progress::new(0.0).is_err());
        assert!(Progress::new(-1.0).is_err());
    }

    #[test]
    fn rejects_non_positive_deltas() {
        let p = Progress::new(10.0).unwrap();
        assert!(p.add(0.0).is_err());
        assert!(p.complete(-1.0).is_err());
    }

    #[test]
    fn complete_past_total_yields_over_100_percent_and_zero_remain() {
        let p = Progress::new(10.0).unwrap();
        p.complete(20.0).unwrap();
        assert!(p.percent() > 100.0);
        assert_eq!(p.remain_time(), Duration::ZERO);
    }

    #[test]
    fn estimated_time_sentinel_when_nothing_completed() {
        let p = Progress::new(10.0).unwrap();
        let est = p.estimated_time();
        assert!(est > Instant::now() + Duration::from_secs(900 * 365 * 24 * 3600));
    }
}
