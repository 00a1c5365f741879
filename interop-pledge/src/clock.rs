use chrono::{DateTime, Utc};
use std::sync::Mutex;
use std::time::Duration;

/// Source of time for ledgers, deadlines and scans
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;

    fn sleep(&self, duration: Duration);

    /// Block until `deadline` has passed
    fn sleep_until(&self, deadline: DateTime<Utc>) {
        if let Ok(remaining) = (deadline - self.now()).to_std() {
            self.sleep(remaining);
        }
    }
}

/// Wall clock
#[derive(Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }

    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

/// A clock that only moves when told to. Sleeping advances it instantly.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        ManualClock { now: Mutex::new(start) }
    }

    pub fn advance(&self, by: chrono::Duration) {
        if let Ok(mut now) = self.now.lock() {
            *now += by;
        }
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new(Utc::now())
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        match self.now.lock() {
            Ok(now) => *now,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }

    fn sleep(&self, duration: Duration) {
        if let Ok(by) = chrono::Duration::from_std(duration) {
            self.advance(by);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manual_clock_sleeps_instantly() {
        let clock = ManualClock::default();
        let start = clock.now();

        clock.sleep(Duration::from_secs(15));
        assert_eq!(clock.now(), start + chrono::Duration::seconds(15));

        let deadline = start + chrono::Duration::minutes(1);
        clock.sleep_until(deadline);
        assert_eq!(clock.now(), deadline);

        // Deadlines in the past do not move the clock
        clock.sleep_until(start);
        assert_eq!(clock.now(), deadline);
    }
}
