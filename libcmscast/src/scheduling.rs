//! Publish-time calculation
//!
//! All arithmetic happens in UTC. Nothing here reads the clock; callers
//! pass `now` so results are reproducible.

use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveDateTime, TimeZone, Utc, Weekday};

use crate::{CmscastError, Result};

const MORNING_HOUR: u32 = 9;
const EVENING_HOUR: u32 = 17;
const OPTIMAL_HOUR: u32 = 12;

/// Offset-less formats accepted for custom times, read as UTC
const NAIVE_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
];

/// When a newly created post should first be attempted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScheduleOption {
    Immediate,
    Custom,
    Tomorrow9am,
    Tomorrow5pm,
    /// Business-hours default: noon UTC on the next weekday
    Optimal,
}

impl ScheduleOption {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScheduleOption::Immediate => "immediate",
            ScheduleOption::Custom => "custom",
            ScheduleOption::Tomorrow9am => "tomorrow_9am",
            ScheduleOption::Tomorrow5pm => "tomorrow_5pm",
            ScheduleOption::Optimal => "optimal",
        }
    }
}

/// Unrecognised options fall back to [`ScheduleOption::Optimal`]
impl From<&str> for ScheduleOption {
    fn from(value: &str) -> Self {
        match value.trim().to_lowercase().as_str() {
            "immediate" | "now" => ScheduleOption::Immediate,
            "custom" => ScheduleOption::Custom,
            "tomorrow_9am" => ScheduleOption::Tomorrow9am,
            "tomorrow_5pm" => ScheduleOption::Tomorrow5pm,
            _ => ScheduleOption::Optimal,
        }
    }
}

impl std::fmt::Display for ScheduleOption {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Compute the instant a post should be attempted.
///
/// # Errors
///
/// Returns [`CmscastError::InvalidSchedule`] when `option` is
/// [`ScheduleOption::Custom`] and `custom` is missing or not a date-time.
pub fn compute_scheduled_time(
    option: ScheduleOption,
    custom: Option<&str>,
    now: DateTime<Utc>,
) -> Result<DateTime<Utc>> {
    match option {
        ScheduleOption::Immediate => Ok(now),
        ScheduleOption::Custom => {
            let raw = custom.map(str::trim).filter(|s| !s.is_empty()).ok_or_else(|| {
                CmscastError::InvalidSchedule("custom schedule requires a date-time".to_string())
            })?;
            parse_instant(raw).ok_or_else(|| {
                CmscastError::InvalidSchedule(format!("'{}' is not a valid date-time", raw))
            })
        }
        ScheduleOption::Tomorrow9am => at_hour(now.date_naive() + Duration::days(1), MORNING_HOUR),
        ScheduleOption::Tomorrow5pm => at_hour(now.date_naive() + Duration::days(1), EVENING_HOUR),
        ScheduleOption::Optimal => optimal_time(now),
    }
}

fn optimal_time(now: DateTime<Utc>) -> Result<DateTime<Utc>> {
    let mut candidate = at_hour(now.date_naive(), OPTIMAL_HOUR)?;
    if candidate < now {
        candidate += Duration::days(1);
    }

    // One correction based on the weekday before adjusting. Saturday+2 and
    // Sunday+1 both land on Monday, so no second pass is needed.
    let shift = match candidate.weekday() {
        Weekday::Sat => 2,
        Weekday::Sun => 1,
        _ => 0,
    };

    Ok(candidate + Duration::days(shift))
}

fn at_hour(date: NaiveDate, hour: u32) -> Result<DateTime<Utc>> {
    date.and_hms_opt(hour, 0, 0)
        .map(|naive| Utc.from_utc_datetime(&naive))
        .ok_or_else(|| CmscastError::InvalidSchedule(format!("invalid hour {} on {}", hour, date)))
}

/// RFC 3339, or one of the offset-less ISO-8601 forms taken as UTC
pub fn parse_instant(input: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(input) {
        return Some(dt.with_timezone(&Utc));
    }

    NAIVE_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(input, format).ok())
        .map(|naive| Utc.from_utc_datetime(&naive))
}

/// Instant of the next attempt after a failed dispatch
pub fn retry_at(now: DateTime<Utc>, delay: std::time::Duration) -> DateTime<Utc> {
    now + Duration::from_std(delay).unwrap_or_else(|_| Duration::minutes(5))
}

/// Parse an operator-supplied reschedule time
///
/// Supports:
/// - Absolute times: "2025-11-20T15:00:00Z", "2025-11-20 15:00"
/// - Relative durations: "90m", "2h", "1day"
/// - Natural language: "tomorrow 3pm", "next monday 10am"
///
/// # Errors
///
/// Returns an error if the input matches none of the formats.
pub fn parse_schedule(input: &str, now: DateTime<Utc>) -> Result<DateTime<Utc>> {
    let input = input.trim();
    if input.is_empty() {
        return Err(CmscastError::InvalidInput(
            "Schedule string cannot be empty".to_string(),
        ));
    }

    if let Some(instant) = parse_instant(input) {
        return Ok(instant);
    }

    if let Ok(std_duration) = humantime::parse_duration(input) {
        let duration = Duration::from_std(std_duration)
            .map_err(|_| CmscastError::InvalidInput("Duration out of range".to_string()))?;
        return Ok(now + duration);
    }

    chrono_english::parse_date_string(input, now, chrono_english::Dialect::Us).map_err(|e| {
        CmscastError::InvalidInput(format!("Could not parse schedule string '{}': {}", input, e))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn utc(s: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
    }

    #[test]
    fn test_immediate_is_now() {
        let now = utc("2024-03-05T10:11:12Z");
        assert_eq!(compute_scheduled_time(ScheduleOption::Immediate, None, now).unwrap(), now);
    }

    #[test]
    fn test_tomorrow_9am() {
        let now = utc("2024-01-15T20:00:00Z");
        assert_eq!(
            compute_scheduled_time(ScheduleOption::Tomorrow9am, None, now).unwrap(),
            utc("2024-01-16T09:00:00Z")
        );
    }

    #[test]
    fn test_tomorrow_5pm_crosses_month() {
        let now = utc("2024-01-31T23:59:00Z");
        assert_eq!(
            compute_scheduled_time(ScheduleOption::Tomorrow5pm, None, now).unwrap(),
            utc("2024-02-01T17:00:00Z")
        );
    }

    #[test]
    fn test_optimal_friday_morning_is_same_day_noon() {
        let now = utc("2024-01-12T08:00:00Z");
        assert_eq!(
            compute_scheduled_time(ScheduleOption::Optimal, None, now).unwrap(),
            utc("2024-01-12T12:00:00Z")
        );
    }

    #[test]
    fn test_optimal_saturday_moves_to_monday() {
        let now = utc("2024-01-13T08:00:00Z");
        assert_eq!(
            compute_scheduled_time(ScheduleOption::Optimal, None, now).unwrap(),
            utc("2024-01-15T12:00:00Z")
        );
    }

    #[test]
    fn test_optimal_sunday_moves_to_monday() {
        let now = utc("2024-01-14T08:00:00Z");
        assert_eq!(
            compute_scheduled_time(ScheduleOption::Optimal, None, now).unwrap(),
            utc("2024-01-15T12:00:00Z")
        );
    }

    #[test]
    fn test_optimal_friday_afternoon_rolls_over_weekend() {
        // noon passed, tomorrow is Saturday, +2 lands on Monday
        let now = utc("2024-01-12T13:00:00Z");
        assert_eq!(
            compute_scheduled_time(ScheduleOption::Optimal, None, now).unwrap(),
            utc("2024-01-15T12:00:00Z")
        );
    }

    #[test]
    fn test_optimal_saturday_afternoon_uses_sunday_branch() {
        let now = utc("2024-01-13T13:00:00Z");
        assert_eq!(
            compute_scheduled_time(ScheduleOption::Optimal, None, now).unwrap(),
            utc("2024-01-15T12:00:00Z")
        );
    }

    #[test]
    fn test_optimal_exactly_noon_stays_today() {
        let now = utc("2024-01-10T12:00:00Z");
        assert_eq!(
            compute_scheduled_time(ScheduleOption::Optimal, None, now).unwrap(),
            now
        );
    }

    #[test]
    fn test_custom_rfc3339() {
        let now = utc("2024-01-01T00:00:00Z");
        assert_eq!(
            compute_scheduled_time(ScheduleOption::Custom, Some("2024-06-01T10:00:00Z"), now)
                .unwrap(),
            utc("2024-06-01T10:00:00Z")
        );
    }

    #[test]
    fn test_custom_with_offset_and_naive() {
        let now = utc("2024-01-01T00:00:00Z");
        assert_eq!(
            compute_scheduled_time(ScheduleOption::Custom, Some("2024-06-01T12:00:00+02:00"), now)
                .unwrap(),
            utc("2024-06-01T10:00:00Z")
        );
        assert_eq!(
            compute_scheduled_time(ScheduleOption::Custom, Some("2024-06-01 10:00"), now).unwrap(),
            utc("2024-06-01T10:00:00Z")
        );
    }

    #[test]
    fn test_custom_rejects_garbage_and_missing() {
        let now = utc("2024-01-01T00:00:00Z");
        assert!(matches!(
            compute_scheduled_time(ScheduleOption::Custom, Some("next tuesday-ish"), now),
            Err(CmscastError::InvalidSchedule(_))
        ));
        assert!(matches!(
            compute_scheduled_time(ScheduleOption::Custom, None, now),
            Err(CmscastError::InvalidSchedule(_))
        ));
    }

    #[test]
    fn test_unknown_option_is_optimal() {
        assert_eq!(ScheduleOption::from("whenever"), ScheduleOption::Optimal);
        assert_eq!(ScheduleOption::from("TOMORROW_9AM"), ScheduleOption::Tomorrow9am);
        assert_eq!(ScheduleOption::from("immediate"), ScheduleOption::Immediate);
    }

    #[test]
    fn test_retry_at_uses_fixed_delay() {
        let now = utc("2024-01-01T00:00:00Z");
        assert_eq!(
            retry_at(now, std::time::Duration::from_secs(300)),
            utc("2024-01-01T00:05:00Z")
        );
    }

    #[test]
    fn test_parse_schedule_duration() {
        let now = utc("2024-01-01T00:00:00Z");
        assert_eq!(parse_schedule("2h", now).unwrap(), utc("2024-01-01T02:00:00Z"));
        assert_eq!(parse_schedule("90m", now).unwrap(), utc("2024-01-01T01:30:00Z"));
    }

    #[test]
    fn test_parse_schedule_absolute() {
        let now = utc("2024-01-01T00:00:00Z");
        assert_eq!(
            parse_schedule("2024-02-03T04:05:06Z", now).unwrap(),
            utc("2024-02-03T04:05:06Z")
        );
    }

    #[test]
    fn test_parse_schedule_natural_language() {
        let now = utc("2024-01-01T00:00:00Z");
        let result = parse_schedule("tomorrow", now).unwrap();
        assert!(result > now);
    }

    #[test]
    fn test_parse_schedule_rejects_empty_and_garbage() {
        let now = utc("2024-01-01T00:00:00Z");
        assert!(parse_schedule("", now).is_err());
        assert!(parse_schedule("xyzzy plugh", now).is_err());
    }
}
