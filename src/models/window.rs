//! Time windows a report is computed over.
//!
//! A window is either an explicit pair of bounds or a relative "hours back"
//! span. Relative windows are resolved against a caller-supplied `now` right
//! before a query is built, so the same `TimeWindow` value can be cached and
//! reused across refresh cycles.

use std::fmt;

use chrono::{NaiveDate, NaiveDateTime, NaiveTime, TimeDelta};
use serde::Serialize;

use crate::errors::ReportError;

/// Format used for bind values and cache keys.
pub const BOUND_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimeWindow {
    Range {
        start: NaiveDateTime,
        end: NaiveDateTime,
    },
    HoursBack(i64),
}

impl TimeWindow {
    pub fn range(start: NaiveDateTime, end: NaiveDateTime) -> Result<Self, ReportError> {
        let window = TimeWindow::Range { start, end };
        window.validate()?;
        Ok(window)
    }

    /// Whole-day window: `start` at midnight through the last second of `end`.
    pub fn dates(start: NaiveDate, end: NaiveDate) -> Result<Self, ReportError> {
        Self::range(start.and_time(NaiveTime::MIN), end_of_day(end))
    }

    pub fn hours_back(hours: i64) -> Result<Self, ReportError> {
        let window = TimeWindow::HoursBack(hours);
        window.validate()?;
        Ok(window)
    }

    /// Parse user-supplied bounds. Each bound may be a date (`2025-07-01`)
    /// or a timestamp (`2025-07-01 08:00:00` or `2025-07-01T08:00:00`);
    /// a date-only end bound covers the whole day.
    pub fn parse(start: &str, end: &str) -> Result<Self, ReportError> {
        let start = parse_bound(start, false)?;
        let end = parse_bound(end, true)?;
        Self::range(start, end)
    }

    /// Window from request parameters: both bounds, or hours back, or
    /// `default_hours` when neither is given. Bounds are parsed but their
    /// order is left to [`TimeWindow::validate`]. Errors describe the
    /// malformed parameter.
    pub fn from_params(
        start: Option<&str>,
        end: Option<&str>,
        hours: Option<i64>,
        default_hours: i64,
    ) -> Result<Self, String> {
        match (start, end, hours) {
            (Some(start), Some(end), None) => {
                let start = parse_bound(start, false).map_err(|e| e.to_string())?;
                let end = parse_bound(end, true).map_err(|e| e.to_string())?;
                Ok(TimeWindow::Range { start, end })
            }
            (None, None, Some(hours)) => Ok(TimeWindow::HoursBack(hours)),
            (None, None, None) => Ok(TimeWindow::HoursBack(default_hours)),
            (_, _, Some(_)) => Err("give either start/end or hours, not both".to_string()),
            _ => Err("start and end must be given together".to_string()),
        }
    }

    pub fn validate(&self) -> Result<(), ReportError> {
        match *self {
            TimeWindow::Range { start, end } if start > end => Err(ReportError::InvalidWindow(
                format!(
                    "start {} is after end {}",
                    start.format(BOUND_FORMAT),
                    end.format(BOUND_FORMAT)
                ),
            )),
            TimeWindow::HoursBack(hours) if hours <= 0 => Err(ReportError::InvalidWindow(
                format!("hours back must be positive, got {}", hours),
            )),
            _ => Ok(()),
        }
    }

    /// Concrete bounds for this window at `now`.
    pub fn resolve(&self, now: NaiveDateTime) -> Result<ResolvedWindow, ReportError> {
        self.validate()?;
        match *self {
            TimeWindow::Range { start, end } => Ok(ResolvedWindow { start, end }),
            TimeWindow::HoursBack(hours) => {
                let start = TimeDelta::try_hours(hours)
                    .and_then(|span| now.checked_sub_signed(span))
                    .ok_or_else(|| {
                        ReportError::InvalidWindow(format!("{} hours back is out of range", hours))
                    })?;
                Ok(ResolvedWindow { start, end: now })
            }
        }
    }
}

/// Cache-key form: explicit bounds for ranges, `hours:N` for relative windows.
impl fmt::Display for TimeWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TimeWindow::Range { start, end } => write!(
                f,
                "{}..{}",
                start.format(BOUND_FORMAT),
                end.format(BOUND_FORMAT)
            ),
            TimeWindow::HoursBack(hours) => write!(f, "hours:{}", hours),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ResolvedWindow {
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
}

impl ResolvedWindow {
    pub fn start_bound(&self) -> String {
        self.start.format(BOUND_FORMAT).to_string()
    }

    pub fn end_bound(&self) -> String {
        self.end.format(BOUND_FORMAT).to_string()
    }
}

fn end_of_day(date: NaiveDate) -> NaiveDateTime {
    date.and_hms_opt(23, 59, 59)
        .unwrap_or_else(|| date.and_time(NaiveTime::MIN))
}

fn parse_bound(raw: &str, is_end: bool) -> Result<NaiveDateTime, ReportError> {
    let raw = raw.trim();
    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return Ok(if is_end {
            end_of_day(date)
        } else {
            date.and_time(NaiveTime::MIN)
        });
    }
    NaiveDateTime::parse_from_str(raw, BOUND_FORMAT)
        .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S"))
        .map_err(|_| ReportError::InvalidWindow(format!("cannot parse '{}' as a date", raw)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_params() {
        assert_eq!(
            TimeWindow::from_params(None, None, None, 24).unwrap(),
            TimeWindow::HoursBack(24)
        );
        assert_eq!(
            TimeWindow::from_params(None, None, Some(-3), 24).unwrap(),
            TimeWindow::HoursBack(-3)
        );
        let inverted = TimeWindow::from_params(Some("2025-08-08"), Some("2025-07-01"), None, 24)
            .unwrap();
        assert!(inverted.validate().is_err());

        assert!(TimeWindow::from_params(Some("2025-07-01"), None, None, 24).is_err());
        assert!(TimeWindow::from_params(Some("2025-07-01"), Some("2025-07-02"), Some(4), 24).is_err());
        assert!(TimeWindow::from_params(Some("yesterday"), Some("2025-07-02"), None, 24).is_err());
    }

    fn at(s: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(s, BOUND_FORMAT).unwrap()
    }

    #[test]
    fn test_dates_cover_whole_end_day() {
        let w = TimeWindow::dates(
            NaiveDate::from_ymd_opt(2025, 7, 1).unwrap(),
            NaiveDate::from_ymd_opt(2025, 8, 8).unwrap(),
        )
        .unwrap();
        let r = w.resolve(at("2025-09-01 00:00:00")).unwrap();
        assert_eq!(r.start_bound(), "2025-07-01 00:00:00");
        assert_eq!(r.end_bound(), "2025-08-08 23:59:59");
    }

    #[test]
    fn test_start_after_end_rejected() {
        let err = TimeWindow::range(at("2025-08-08 00:00:00"), at("2025-07-01 00:00:00"))
            .unwrap_err();
        assert!(matches!(err, ReportError::InvalidWindow(_)));
    }

    #[test]
    fn test_equal_bounds_allowed() {
        let t = at("2025-07-01 12:00:00");
        assert!(TimeWindow::range(t, t).is_ok());
    }

    #[test]
    fn test_non_positive_hours_rejected() {
        assert!(TimeWindow::hours_back(0).is_err());
        assert!(TimeWindow::hours_back(-3).is_err());
        assert!(TimeWindow::hours_back(72).is_ok());
    }

    #[test]
    fn test_hours_back_resolves_against_now() {
        let now = at("2025-08-08 10:00:00");
        let r = TimeWindow::HoursBack(24).resolve(now).unwrap();
        assert_eq!(r.start_bound(), "2025-08-07 10:00:00");
        assert_eq!(r.end, now);
    }

    #[test]
    fn test_huge_hours_back_is_invalid_not_panic() {
        let err = TimeWindow::HoursBack(i64::MAX).resolve(at("2025-08-08 10:00:00"));
        assert!(matches!(err, Err(ReportError::InvalidWindow(_))));
    }

    #[test]
    fn test_resolve_revalidates_hand_built_range() {
        let w = TimeWindow::Range {
            start: at("2025-08-09 00:00:00"),
            end: at("2025-08-08 00:00:00"),
        };
        assert!(w.resolve(at("2025-09-01 00:00:00")).is_err());
    }

    #[test]
    fn test_parse_accepts_dates_and_timestamps() {
        let w = TimeWindow::parse("2025-07-01", "2025-07-02T08:30:00").unwrap();
        assert_eq!(w.to_string(), "2025-07-01 00:00:00..2025-07-02 08:30:00");
        assert!(TimeWindow::parse("yesterday", "2025-07-02").is_err());
    }

    #[test]
    fn test_key_forms() {
        assert_eq!(TimeWindow::HoursBack(6).to_string(), "hours:6");
    }
}
