use std::fmt;

use chrono::NaiveDate;

use crate::error::RollupError;

/// Session count for one (calendar date, hour) bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RollupRow {
    pub date: NaiveDate,
    pub hour: u8,
    pub concurrent: u64,
}

impl RollupRow {
    /// Build a row from the raw column values, rejecting anything outside
    /// 0–23 for the hour or below zero for the count.
    pub fn from_parts(date: NaiveDate, hour: i64, concurrent: i64) -> Result<Self, RollupError> {
        let hour = u8::try_from(hour).ok().filter(|h| *h < 24).ok_or_else(|| {
            RollupError::InvalidRow(format!("hour {} out of range for {}", hour, date))
        })?;
        let concurrent = u64::try_from(concurrent).map_err(|_| {
            RollupError::InvalidRow(format!("negative count {} for {} hour {}", concurrent, date, hour))
        })?;

        Ok(Self { date, hour, concurrent })
    }

    /// Grouping key. Compares chronologically.
    pub fn bucket(&self) -> (NaiveDate, u8) {
        (self.date, self.hour)
    }
}

impl fmt::Display for RollupRow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "date={} hour={} concurrent={}",
            self.date.format("%Y-%m-%d"),
            self.hour,
            self.concurrent
        )
    }
}
