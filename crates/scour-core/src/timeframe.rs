//! Relative timeframe expressions resolved into absolute range clauses.
//!
//! A timeframe is either a keyword (`today`, `week`, `month`, `quarter`,
//! `year`) or `<n><unit>` with unit `h`, `d` or `w`, e.g. `12h` or `2w`.

use chrono::{DateTime, Local, Utc};
use serde_json::json;
use std::time::Duration;

use crate::errors::{QueryError, Result};
use crate::query::{BoolClause, Clause};

const KEYWORDS: [&str; 5] = ["today", "week", "month", "quarter", "year"];

const HOUR: Duration = Duration::from_secs(3600);
const DAY: Duration = Duration::from_secs(24 * 3600);
const WEEK: Duration = Duration::from_secs(7 * 24 * 3600);

/// Event timestamp field holding epoch seconds.
const UNIX_TIME_FIELD: &str = "unixTime";
/// Detection timestamp field holding epoch milliseconds.
const GENERATED_TIME_FIELD: &str = "detectionGeneratedTime";

/// Check a timeframe expression without resolving it.
pub fn validate_timeframe(s: &str) -> Result<()> {
    let tf = s.trim().to_lowercase();
    if tf.is_empty() {
        return Err(QueryError::Timeframe("timeframe cannot be empty".into()));
    }
    if KEYWORDS.contains(&tf.as_str()) {
        return Ok(());
    }
    // Catch keyword typos like "weekk" or "todays" before numeric parsing.
    for kw in KEYWORDS {
        if tf.starts_with(kw) {
            return Err(QueryError::Timeframe(format!(
                "unrecognized timeframe '{}', did you mean '{}'?",
                tf, kw
            )));
        }
    }
    if tf.len() < 2 {
        return Err(QueryError::Timeframe(format!(
            "timeframe '{}' is too short, expected e.g. '12h', '7d' or '2w'",
            tf
        )));
    }
    let (number, unit) = tf.split_at(tf.len() - 1);
    if !matches!(unit, "h" | "d" | "w") {
        return Err(QueryError::Timeframe(format!(
            "unknown timeframe unit '{}', expected 'h', 'd' or 'w'",
            unit
        )));
    }
    match number.parse::<u64>() {
        Ok(n) if n > 0 => Ok(()),
        _ => Err(QueryError::Timeframe(format!(
            "timeframe amount '{}' must be a positive integer",
            number
        ))),
    }
}

/// Resolve a validated timeframe to a duration, relative to the local
/// wall clock (only `today` depends on it).
pub fn parse_timeframe(s: &str) -> Duration {
    parse_timeframe_at(s, Local::now())
}

/// Like [`parse_timeframe`] with an injected reference time, so `today`
/// stays deterministic under test.
pub fn parse_timeframe_at(s: &str, now: DateTime<Local>) -> Duration {
    let tf = s.trim().to_lowercase();
    match tf.as_str() {
        "today" => {
            let midnight = now
                .date_naive()
                .and_hms_opt(0, 0, 0)
                .and_then(|m| m.and_local_timezone(Local).single())
                .unwrap_or(now);
            now.signed_duration_since(midnight)
                .to_std()
                .unwrap_or(Duration::ZERO)
        }
        "week" => 7 * DAY,
        "month" => 30 * DAY,
        "quarter" => 90 * DAY,
        "year" => 365 * DAY,
        _ => {
            let (number, unit) = tf.split_at(tf.len() - 1);
            let n = number.parse::<u32>().unwrap_or(0);
            let base = match unit {
                "h" => HOUR,
                "d" => DAY,
                _ => WEEK,
            };
            n * base
        }
    }
}

/// Build the time-window clause for a query, or `None` for an empty
/// timeframe. The window is expressed as an OR over the two timestamp
/// fields, which record the same instant in different units.
pub fn build_time_query(timeframe: &str, now: DateTime<Utc>) -> Result<Option<Clause>> {
    if timeframe.trim().is_empty() {
        return Ok(None);
    }
    validate_timeframe(timeframe)?;
    let window = parse_timeframe(timeframe);
    let start = now - chrono::Duration::from_std(window).unwrap_or(chrono::Duration::zero());

    let seconds = Clause::range_between(
        UNIX_TIME_FIELD,
        json!(start.timestamp()),
        json!(now.timestamp()),
    );
    let millis = Clause::range_between(
        GENERATED_TIME_FIELD,
        json!(start.timestamp_millis()),
        json!(now.timestamp_millis()),
    );
    Ok(Some(Clause::Bool(BoolClause {
        should: vec![seconds, millis],
        minimum_should_match: Some(1),
        ..BoolClause::default()
    })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn validates_keywords_and_numeric_forms() {
        assert!(validate_timeframe("today").is_ok());
        assert!(validate_timeframe(" WEEK ").is_ok());
        assert!(validate_timeframe("12h").is_ok());
        assert!(validate_timeframe("7D").is_ok());
        assert!(validate_timeframe("2w").is_ok());

        assert!(validate_timeframe("").is_err());
        assert!(validate_timeframe("12x").is_err());
        assert!(validate_timeframe("h").is_err());
        assert!(validate_timeframe("0d").is_err());
        assert!(validate_timeframe("-3h").is_err());
    }

    #[test]
    fn keyword_typos_get_a_suggestion() {
        let err = validate_timeframe("todays").unwrap_err();
        assert!(err.to_string().contains("did you mean 'today'"));
        let err = validate_timeframe("weekk").unwrap_err();
        assert!(err.to_string().contains("did you mean 'week'"));
    }

    #[test]
    fn fixed_windows_resolve_to_expected_durations() {
        assert_eq!(parse_timeframe("week"), Duration::from_secs(168 * 3600));
        assert_eq!(parse_timeframe("month"), Duration::from_secs(720 * 3600));
        assert_eq!(parse_timeframe("12h"), Duration::from_secs(12 * 3600));
        assert_eq!(parse_timeframe("3d"), Duration::from_secs(72 * 3600));
        assert_eq!(parse_timeframe("2w"), Duration::from_secs(336 * 3600));
    }

    #[test]
    fn today_is_elapsed_since_local_midnight() {
        let now = Local.with_ymd_and_hms(2024, 3, 5, 6, 30, 0).unwrap();
        assert_eq!(
            parse_timeframe_at("today", now),
            Duration::from_secs(6 * 3600 + 30 * 60)
        );
    }

    #[test]
    fn time_query_covers_both_timestamp_fields() {
        let now = Utc.with_ymd_and_hms(2024, 3, 5, 12, 0, 0).unwrap();
        let clause = build_time_query("12h", now).unwrap().unwrap();
        let v = serde_json::to_value(&clause).unwrap();
        let should = v["bool"]["should"].as_array().unwrap();
        assert_eq!(should.len(), 2);
        assert_eq!(v["bool"]["minimum_should_match"], 1);

        let start = now.timestamp() - 12 * 3600;
        assert_eq!(should[0]["range"]["unixTime"]["gte"], start);
        assert_eq!(should[0]["range"]["unixTime"]["lte"], now.timestamp());
        assert_eq!(
            should[1]["range"]["detectionGeneratedTime"]["gte"],
            start * 1000
        );
        assert_eq!(
            should[1]["range"]["detectionGeneratedTime"]["lte"],
            now.timestamp_millis()
        );
    }

    #[test]
    fn empty_timeframe_yields_no_clause() {
        let now = Utc::now();
        assert_eq!(build_time_query("", now).unwrap(), None);
        assert_eq!(build_time_query("   ", now).unwrap(), None);
    }

    #[test]
    fn invalid_timeframe_aborts_clause_construction() {
        let now = Utc::now();
        assert!(build_time_query("12x", now).is_err());
    }
}
