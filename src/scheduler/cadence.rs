//! Job cadences
//!
//! Calendar cadences are evaluated in IST (exchange time). IST has no
//! daylight saving, so every hour and day has a fixed length.

use crate::error::{AppError, Result};
use chrono::{DateTime, Timelike, Utc};
use chrono_tz::Asia::Kolkata;
use std::fmt;
use std::time::Duration;

const SECS_PER_HOUR: u64 = 3600;
const SECS_PER_DAY: u64 = 24 * SECS_PER_HOUR;

/// Longest period an interval job may use
pub const MAX_INTERVAL: Duration = Duration::from_secs(7 * SECS_PER_DAY);

/// When a job fires
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cadence {
    /// Fixed period between fires
    Interval(Duration),
    /// Minute `minute` of every hour
    Hourly { minute: u32 },
    /// `hour:minute` every day
    Daily { hour: u32, minute: u32 },
}

impl Cadence {
    pub fn every(period: Duration) -> Result<Self> {
        let cadence = Cadence::Interval(period);
        cadence.validate()?;
        Ok(cadence)
    }

    pub fn hourly_at(minute: u32) -> Result<Self> {
        let cadence = Cadence::Hourly { minute };
        cadence.validate()?;
        Ok(cadence)
    }

    pub fn daily_at(hour: u32, minute: u32) -> Result<Self> {
        let cadence = Cadence::Daily { hour, minute };
        cadence.validate()?;
        Ok(cadence)
    }

    /// Check a cadence built directly from its variants
    pub fn validate(&self) -> Result<()> {
        match *self {
            Cadence::Interval(period) if period.is_zero() => {
                Err(AppError::Validation("Interval must be non-zero".to_string()))
            }
            Cadence::Interval(period) if period > MAX_INTERVAL => Err(AppError::Validation(
                format!("Interval {:?} exceeds the maximum of {:?}", period, MAX_INTERVAL),
            )),
            Cadence::Hourly { minute } if minute > 59 => {
                Err(AppError::Validation(format!("Invalid minute: {}", minute)))
            }
            Cadence::Daily { hour, minute } if hour > 23 || minute > 59 => {
                Err(AppError::Validation(format!(
                    "Invalid time of day: {:02}:{:02}",
                    hour, minute
                )))
            }
            _ => Ok(()),
        }
    }

    /// Time from `now` until the next fire. Always non-zero.
    pub fn next_delay(&self, now: DateTime<Utc>) -> Duration {
        match *self {
            Cadence::Interval(period) => period,
            Cadence::Hourly { minute } => {
                let now_ist = now.with_timezone(&Kolkata);
                let elapsed = (now_ist.minute() * 60 + now_ist.second()) as u64;
                Self::until(elapsed, minute as u64 * 60, SECS_PER_HOUR, now_ist.nanosecond())
            }
            Cadence::Daily { hour, minute } => {
                let now_ist = now.with_timezone(&Kolkata);
                let elapsed = now_ist.num_seconds_from_midnight() as u64;
                let target = (hour as u64 * 60 + minute as u64) * 60;
                Self::until(elapsed, target, SECS_PER_DAY, now_ist.nanosecond())
            }
        }
    }

    /// Seconds from `elapsed` to `target` within a repeating unit of
    /// `unit` seconds, minus the sub-second part already gone.
    fn until(elapsed: u64, target: u64, unit: u64, nanos: u32) -> Duration {
        let secs = if elapsed < target {
            // Target is later in this unit
            target - elapsed
        } else {
            // Target is in the next unit
            unit - elapsed + target
        };

        let spent = Duration::from_nanos(nanos.min(999_999_999) as u64);
        Duration::from_secs(secs).saturating_sub(spent)
    }
}

impl fmt::Display for Cadence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cadence::Interval(period) => write!(f, "every {:?}", period),
            Cadence::Hourly { minute } => write!(f, "hourly at HH:{:02} IST", minute),
            Cadence::Daily { hour, minute } => write!(f, "daily at {:02}:{:02} IST", hour, minute),
        }
    }
}
