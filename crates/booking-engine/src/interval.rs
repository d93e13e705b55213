use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// A closed range of calendar days, inclusive on both ends.
///
/// Rentals hand over on the first day and return on the last, so two ranges
/// that share even a single day compete for the item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateInterval {
    /// First rental day
    pub start: NaiveDate,
    /// Last rental day
    pub end: NaiveDate,
}

impl DateInterval {
    /// Builds an interval, returning `None` when `start` is after `end`.
    pub fn new(start: NaiveDate, end: NaiveDate) -> Option<Self> {
        if start > end {
            return None;
        }
        Some(Self { start, end })
    }

    /// Returns true when the two closed intervals share at least one day.
    pub fn overlaps(&self, other: &DateInterval) -> bool {
        self.start <= other.end && other.start <= self.end
    }

    /// Returns true when `day` falls within the interval.
    pub fn contains(&self, day: NaiveDate) -> bool {
        self.start <= day && day <= self.end
    }

    /// Number of rental days covered, counting both boundary days.
    pub fn days(&self) -> i64 {
        (self.end - self.start).num_days() + 1
    }
}
