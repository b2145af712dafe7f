//! Turning the total into the per-day figure that gets printed.

use crate::window::WINDOW_DAYS;
use std::fmt;

/// Total eligible upload duration, expressed per day of the window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DailyAverage {
    total_seconds: u64,
}

impl DailyAverage {
    pub fn from_total_seconds(total_seconds: u64) -> Self {
        Self { total_seconds }
    }

    /// `total / 365`.
    pub fn seconds_per_day(&self) -> f64 {
        self.total_seconds as f64 / WINDOW_DAYS as f64
    }

    /// The per-day figure rounded to whole minutes, split into hours and minutes.
    pub fn hours_and_minutes(&self) -> (u64, u64) {
        let minutes = (self.seconds_per_day() / 60.0).round() as u64;
        (minutes / 60, minutes % 60)
    }
}

impl fmt::Display for DailyAverage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (hours, minutes) = self.hours_and_minutes();
        write!(
            f,
            "Avg. content length per day: {hours} hours {minutes} minutes ({:.3} seconds)",
            self.seconds_per_day()
        )
    }
}
