//! Start-date arithmetic
//!
//! Computes the effective lower bound for extraction from the configured
//! `start_date` and the optional `limit_events_month` cap, plus the small
//! timestamp conversions the streams need for HubSpot's query parameters.

use crate::error::{Error, Result};
use chrono::{DateTime, Duration, SecondsFormat, Utc};
use tracing::info;

/// Days counted per month when applying `limit_events_month`.
pub const DAYS_PER_MONTH: i64 = 31;

/// Output format of the computed limit date
pub const LIMIT_DATE_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

/// Compute the effective start date.
///
/// Returns `None` when no `start_date` is configured. When a positive
/// `limit_events_month` is set, the result is whichever is later of
/// `start_date` and `now - 31 * limit_events_month` days. The configured
/// string is returned untouched when it wins; otherwise the limit is
/// rendered as `YYYY-MM-DDTHH:MM:SSZ`.
pub fn effective_start_date(
    start_date: Option<&str>,
    limit_events_month: Option<u32>,
    now: DateTime<Utc>,
) -> Result<Option<String>> {
    let Some(start_date) = start_date.filter(|s| !s.is_empty()) else {
        return Ok(None);
    };

    let months = match limit_events_month {
        Some(months) if months > 0 => months,
        _ => return Ok(Some(start_date.to_string())),
    };

    let limit_date = Duration::try_days(DAYS_PER_MONTH * i64::from(months))
        .and_then(|span| now.checked_sub_signed(span))
        .ok_or_else(|| {
            Error::invalid_value(
                "limit_events_month",
                format!("{months} months reaches before the earliest representable date"),
            )
        })?;
    let limit_date_str = limit_date.format(LIMIT_DATE_FORMAT).to_string();

    let start_dt = parse_datetime("start_date", start_date)?;
    let limit_dt = parse_datetime("limit_events_month", &limit_date_str)?;

    if start_dt > limit_dt {
        Ok(Some(start_date.to_string()))
    } else {
        info!(
            "Limiting start_date from {start_date} to {limit_date_str} \
             due to limit_events_month={months}"
        );
        Ok(Some(limit_date_str))
    }
}

/// Parse a timezone-aware ISO-8601 timestamp.
///
/// `field` names the config option or record field in the error message.
pub fn parse_datetime(field: &str, value: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value.trim())
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| {
            Error::invalid_value(field, format!("'{value}' is not an ISO-8601 datetime: {e}"))
        })
}

/// Parse an ISO-8601 timestamp into epoch milliseconds
pub fn to_epoch_millis(field: &str, value: &str) -> Result<i64> {
    parse_datetime(field, value).map(|dt| dt.timestamp_millis())
}

/// Render epoch milliseconds as an RFC 3339 UTC string
pub fn from_epoch_millis(millis: i64) -> Option<String> {
    DateTime::<Utc>::from_timestamp_millis(millis)
        .map(|dt| dt.to_rfc3339_opts(SecondsFormat::Millis, true))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use test_case::test_case;

    fn jan_first_2024() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
    }

    #[test]
    fn test_missing_start_date_is_absent() {
        assert_eq!(effective_start_date(None, None, jan_first_2024()).unwrap(), None);
        assert_eq!(
            effective_start_date(None, Some(3), jan_first_2024()).unwrap(),
            None
        );
        assert_eq!(
            effective_start_date(Some(""), Some(3), jan_first_2024()).unwrap(),
            None
        );
    }

    #[test_case(None ; "no limit")]
    #[test_case(Some(0) ; "zero limit")]
    fn test_without_limit_returns_start_date(limit: Option<u32>) {
        let result =
            effective_start_date(Some("2020-01-01T00:00:00Z"), limit, jan_first_2024()).unwrap();
        assert_eq!(result.as_deref(), Some("2020-01-01T00:00:00Z"));
    }

    #[test]
    fn test_without_limit_does_not_parse() {
        let result = effective_start_date(Some("last tuesday"), None, jan_first_2024()).unwrap();
        assert_eq!(result.as_deref(), Some("last tuesday"));
    }

    #[test]
    fn test_old_start_date_is_clamped() {
        let result =
            effective_start_date(Some("2020-01-01T00:00:00Z"), Some(3), jan_first_2024()).unwrap();
        // 93 days before 2024-01-01
        assert_eq!(result.as_deref(), Some("2023-09-30T00:00:00Z"));
    }

    #[test]
    fn test_recent_start_date_is_kept() {
        let result =
            effective_start_date(Some("2024-12-01T00:00:00Z"), Some(3), jan_first_2024()).unwrap();
        assert_eq!(result.as_deref(), Some("2024-12-01T00:00:00Z"));
    }

    #[test]
    fn test_kept_start_date_is_not_reformatted() {
        let result = effective_start_date(
            Some("2023-12-15T10:30:00.250+02:00"),
            Some(1),
            jan_first_2024(),
        )
        .unwrap();
        assert_eq!(result.as_deref(), Some("2023-12-15T10:30:00.250+02:00"));
    }

    #[test]
    fn test_equal_dates_use_limit() {
        let result =
            effective_start_date(Some("2023-12-01T00:00:00+00:00"), Some(1), jan_first_2024())
                .unwrap();
        assert_eq!(result.as_deref(), Some("2023-12-01T00:00:00Z"));
    }

    #[test]
    fn test_limit_drops_subsecond_precision() {
        let now = Utc.with_ymd_and_hms(2024, 3, 10, 8, 15, 42).unwrap()
            + Duration::milliseconds(987);
        let result = effective_start_date(Some("2000-01-01T00:00:00Z"), Some(2), now).unwrap();
        assert_eq!(result.as_deref(), Some("2024-01-08T08:15:42Z"));
    }

    #[test]
    fn test_malformed_start_date_with_limit_fails() {
        let err = effective_start_date(Some("2020-13-45"), Some(3), jan_first_2024()).unwrap_err();
        assert!(matches!(err, Error::InvalidConfigValue { ref field, .. } if field == "start_date"));
    }

    #[test]
    fn test_naive_start_date_with_limit_fails() {
        assert!(
            effective_start_date(Some("2020-01-01T00:00:00"), Some(3), jan_first_2024()).is_err()
        );
    }

    #[test_case(10_000_000 ; "beyond the calendar")]
    #[test_case(u32::MAX ; "largest value")]
    fn test_huge_limit_is_a_config_error(months: u32) {
        let err = effective_start_date(Some("2020-01-01T00:00:00Z"), Some(months), jan_first_2024())
            .unwrap_err();
        assert!(
            matches!(err, Error::InvalidConfigValue { ref field, .. } if field == "limit_events_month")
        );
    }

    #[test]
    fn test_epoch_millis_conversions() {
        assert_eq!(
            to_epoch_millis("start_date", "2024-01-01T00:00:00Z").unwrap(),
            1_704_067_200_000
        );
        assert_eq!(
            from_epoch_millis(1_704_067_200_000).as_deref(),
            Some("2024-01-01T00:00:00.000Z")
        );
    }
}
