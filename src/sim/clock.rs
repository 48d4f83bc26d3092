//! Tick clock over a UTC time range.

use chrono::{DateTime, Duration, Utc};

/// A simulation clock that walks a fixed number of equally spaced ticks
/// starting at a UTC instant.
///
/// # Examples
///
/// ```
/// use chrono::{TimeZone, Utc};
/// use wind_farm_twin::sim::clock::Clock;
///
/// let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
/// let mut clock = Clock::new(start, 10, 3);
/// let mut seconds = Vec::new();
///
/// clock.run(|_, ts| seconds.push(ts.timestamp() - start.timestamp()));
/// assert_eq!(seconds, vec![0, 10, 20]);
/// ```
#[derive(Debug, Clone)]
pub struct Clock {
    start: DateTime<Utc>,
    tick_seconds: u32,
    /// Current step of the simulation
    current: usize,
    /// Total steps to run in the simulation
    total: usize,
}

impl Clock {
    /// Creates a new clock.
    ///
    /// # Arguments
    ///
    /// * `start` - Timestamp of step 0
    /// * `tick_seconds` - Spacing between steps
    /// * `total` - The total number of steps the clock will run
    pub fn new(start: DateTime<Utc>, tick_seconds: u32, total: usize) -> Self {
        Self {
            start,
            tick_seconds,
            current: 0,
            total,
        }
    }

    /// Clock covering `duration_hours` whole hours.
    pub fn for_hours(start: DateTime<Utc>, tick_seconds: u32, duration_hours: u32) -> Self {
        let per_hour = if tick_seconds == 0 { 0 } else { 3600 / tick_seconds as usize };
        Self::new(start, tick_seconds, per_hour * duration_hours as usize)
    }

    /// Timestamp of step `step`.
    pub fn timestamp_at(&self, step: usize) -> DateTime<Utc> {
        self.start + Duration::seconds(step as i64 * i64::from(self.tick_seconds))
    }

    /// Total number of steps.
    pub fn total(&self) -> usize {
        self.total
    }

    /// Steps not yet ticked.
    pub fn remaining(&self) -> usize {
        self.total - self.current
    }

    /// Advances the clock by one step.
    ///
    /// # Returns
    ///
    /// * `Some((step, timestamp))` - The step before advancing and its timestamp
    /// * `None` - If the clock has reached its total steps
    pub fn tick(&mut self) -> Option<(usize, DateTime<Utc>)> {
        if self.current < self.total {
            let step = self.current;
            self.current += 1;
            Some((step, self.timestamp_at(step)))
        } else {
            None
        }
    }

    /// Runs a function for each remaining step in the clock.
    pub fn run(&mut self, mut f: impl FnMut(usize, DateTime<Utc>)) {
        while let Some((step, ts)) = self.tick() {
            f(step, ts);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn start() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).single().unwrap_or_default()
    }

    #[test]
    fn test_tick() {
        let mut clock = Clock::new(start(), 60, 2);
        assert_eq!(clock.tick(), Some((0, start())));
        assert_eq!(clock.tick(), Some((1, start() + Duration::seconds(60))));
        assert_eq!(clock.tick(), None);
    }

    #[test]
    fn test_for_hours() {
        let clock = Clock::for_hours(start(), 10, 2);
        assert_eq!(clock.total(), 720);
        assert_eq!(clock.timestamp_at(360), start() + Duration::hours(1));
    }

    #[test]
    fn test_empty_clock() {
        let mut clock = Clock::new(start(), 10, 0);
        assert_eq!(clock.tick(), None);

        let mut was_called = false;
        clock.run(|_, _| was_called = true);
        assert!(!was_called);
    }
}
