use chrono::{DateTime, Datelike, Days, NaiveDate, NaiveDateTime, SecondsFormat, Utc, Weekday};
use serde_json::Value;

const DATE_TIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
];

/// Monday-first weekday names used as grid keys and day labels.
pub const WEEKDAY_NAMES: [&str; 7] = [
    "Monday",
    "Tuesday",
    "Wednesday",
    "Thursday",
    "Friday",
    "Saturday",
    "Sunday",
];

/// Calendar date of an upstream date or timestamp value. Timestamps are
/// reduced to their UTC date.
pub fn parse_date(value: &Value) -> Option<NaiveDate> {
    match value {
        Value::String(s) => parse_date_str(s),
        Value::Number(n) => n
            .as_i64()
            .and_then(DateTime::from_timestamp_millis)
            .map(|dt| dt.date_naive()),
        _ => None,
    }
}

pub fn parse_date_str(s: &str) -> Option<NaiveDate> {
    parse_timestamp_str(s).map(|dt| dt.date_naive())
}

fn parse_timestamp_str(s: &str) -> Option<DateTime<Utc>> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }

    if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return date.and_hms_opt(0, 0, 0).map(|dt| dt.and_utc());
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    DATE_TIME_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(s, format).ok())
        .map(|dt| dt.and_utc())
}

/// Message timestamps are reported as ISO-8601 UTC when they parse, and as
/// the original text otherwise.
pub fn message_timestamp(value: &Value) -> Option<String> {
    let parsed = match value {
        Value::String(s) if s.trim().is_empty() => return None,
        Value::String(s) => parse_timestamp_str(s),
        Value::Number(n) => n.as_i64().and_then(DateTime::from_timestamp_millis),
        _ => return None,
    };

    match parsed {
        Some(dt) => Some(dt.to_rfc3339_opts(SecondsFormat::Millis, true)),
        None => crate::fields::as_text(value),
    }
}

/// `None` when the Monday lies before the earliest representable date.
pub fn monday_of(date: NaiveDate) -> Option<NaiveDate> {
    date.checked_sub_days(Days::new(u64::from(date.weekday().num_days_from_monday())))
}

/// Last day of the inclusive Monday..Sunday week starting at `week_start`.
pub fn week_end(week_start: NaiveDate) -> Option<NaiveDate> {
    week_start.checked_add_days(Days::new(6))
}

pub fn weekday_name(date: NaiveDate) -> &'static str {
    WEEKDAY_NAMES[date.weekday().num_days_from_monday() as usize]
}

pub fn weekday_from_name(name: &str) -> Option<Weekday> {
    match name {
        "Monday" => Some(Weekday::Mon),
        "Tuesday" => Some(Weekday::Tue),
        "Wednesday" => Some(Weekday::Wed),
        "Thursday" => Some(Weekday::Thu),
        "Friday" => Some(Weekday::Fri),
        "Saturday" => Some(Weekday::Sat),
        "Sunday" => Some(Weekday::Sun),
        _ => None,
    }
}

/// Date of `weekday` in the week starting at the Monday `week_start`.
pub fn date_in_week(week_start: NaiveDate, weekday: Weekday) -> Option<NaiveDate> {
    week_start.checked_add_days(Days::new(u64::from(weekday.num_days_from_monday())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn test_parse_date_formats() {
        assert_eq!(parse_date(&json!("2024-01-02")), Some(date("2024-01-02")));
        assert_eq!(
            parse_date(&json!("2024-01-02 08:00:00")),
            Some(date("2024-01-02"))
        );
        assert_eq!(
            parse_date(&json!("2024-01-02T23:30:00-02:00")),
            Some(date("2024-01-03"))
        );
        assert_eq!(
            parse_date(&json!(1704153600000_i64)),
            Some(date("2024-01-02"))
        );
        assert_eq!(parse_date(&json!("next tuesday")), None);
        assert_eq!(parse_date(&json!("2024-13-40")), None);
        assert_eq!(parse_date(&Value::Null), None);
    }

    #[test]
    fn test_message_timestamp() {
        assert_eq!(
            message_timestamp(&json!("2024-03-05 10:15:00")),
            Some("2024-03-05T10:15:00.000Z".to_string())
        );
        assert_eq!(
            message_timestamp(&json!("wczoraj")),
            Some("wczoraj".to_string())
        );
        assert_eq!(message_timestamp(&Value::Null), None);
        assert_eq!(message_timestamp(&json!("")), None);
        assert_eq!(message_timestamp(&json!("  ")), None);
    }

    #[test]
    fn test_week_helpers() {
        // 2024-01-03 is a Wednesday
        assert_eq!(monday_of(date("2024-01-03")), Some(date("2024-01-01")));
        assert_eq!(monday_of(date("2024-01-07")), Some(date("2024-01-01")));
        assert_eq!(monday_of(date("2024-01-01")), Some(date("2024-01-01")));
        assert_eq!(week_end(date("2024-01-01")), Some(date("2024-01-07")));
        assert_eq!(weekday_name(date("2024-01-03")), "Wednesday");
        assert_eq!(
            date_in_week(date("2024-01-01"), Weekday::Fri),
            Some(date("2024-01-05"))
        );
        assert_eq!(weekday_from_name("Sunday"), Some(Weekday::Sun));
        assert_eq!(weekday_from_name("monday"), None);
    }

    #[test]
    fn test_week_helpers_at_calendar_limits() {
        assert_eq!(week_end(NaiveDate::MAX), None);
        assert_eq!(date_in_week(NaiveDate::MAX, Weekday::Sun), None);
        assert_eq!(
            date_in_week(NaiveDate::MAX, Weekday::Mon),
            Some(NaiveDate::MAX)
        );

        let earliest_monday = (0..7)
            .filter_map(|days| NaiveDate::MIN.checked_add_days(Days::new(days)))
            .find(|d| d.weekday() == Weekday::Mon)
            .unwrap();
        assert_eq!(monday_of(earliest_monday), Some(earliest_monday));
        if NaiveDate::MIN.weekday() != Weekday::Mon {
            assert_eq!(monday_of(NaiveDate::MIN), None);
        }
    }
}
