//! Request-scoped filters shared by every endpoint.

use crate::dates::parse_date_str;
use crate::errors::ApiError;
use chrono::NaiveDate;
use serde_json::Value;
use std::collections::HashMap;

/// Inclusive date window; either bound may be open.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DateWindow {
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
}

impl DateWindow {
    pub fn new(from: Option<NaiveDate>, to: Option<NaiveDate>) -> Self {
        DateWindow { from, to }
    }

    pub fn day(date: NaiveDate) -> Self {
        DateWindow::new(Some(date), Some(date))
    }

    pub fn is_active(&self) -> bool {
        self.from.is_some() || self.to.is_some()
    }

    /// Everything passes an inactive window. Within an active window
    /// undated entries never pass.
    pub fn contains(&self, date: Option<NaiveDate>) -> bool {
        if !self.is_active() {
            return true;
        }
        let Some(date) = date else {
            return false;
        };
        self.from.is_none_or(|from| date >= from) && self.to.is_none_or(|to| date <= to)
    }
}

/// Case-insensitive subject substring filter.
#[derive(Clone, Debug, Default)]
pub struct SubjectFilter {
    needle: Option<String>,
}

impl SubjectFilter {
    pub fn new(query: Option<&str>) -> Self {
        SubjectFilter {
            needle: query.filter(|q| !q.is_empty()).map(str::to_lowercase),
        }
    }

    pub fn is_active(&self) -> bool {
        self.needle.is_some()
    }

    /// A missing subject only passes an inactive filter.
    pub fn matches(&self, subject: Option<&str>) -> bool {
        match &self.needle {
            None => true,
            Some(needle) => subject.is_some_and(|s| s.to_lowercase().contains(needle.as_str())),
        }
    }
}

/// Entities carrying the unmodified upstream record next to their
/// canonical fields.
pub trait RawSideChannel {
    fn raw_mut(&mut self) -> &mut Option<Value>;
}

/// Drops the raw record from every item unless it was asked for.
pub fn apply_raw_mode<T: RawSideChannel>(items: &mut [T], include_raw: bool) {
    if include_raw {
        return;
    }
    for item in items {
        *item.raw_mut() = None;
    }
}

/// Decoded query string of a request.
#[derive(Clone, Debug, Default)]
pub struct QueryParams {
    values: HashMap<String, String>,
}

impl QueryParams {
    pub fn parse(query: Option<&str>) -> Self {
        let values = query
            .map(|q| url::form_urlencoded::parse(q.as_bytes()).into_owned().collect())
            .unwrap_or_default();
        QueryParams { values }
    }

    /// Parameter value; empty values count as absent.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.values
            .get(key)
            .map(String::as_str)
            .filter(|v| !v.is_empty())
    }

    /// Only the literal `true` (any case) enables a flag.
    pub fn flag(&self, key: &str) -> bool {
        self.get(key).is_some_and(|v| v.eq_ignore_ascii_case("true"))
    }

    /// Flags that default to on; only `false` (any case) disables them.
    pub fn flag_default_on(&self, key: &str) -> bool {
        !self.get(key).is_some_and(|v| v.eq_ignore_ascii_case("false"))
    }

    pub fn include_raw(&self) -> bool {
        self.flag("includeRaw")
    }

    /// Optional date parameter; a present but unparsable value is rejected
    /// with `error_code`.
    pub fn date(&self, key: &str, error_code: &'static str) -> Result<Option<NaiveDate>, ApiError> {
        match self.get(key) {
            None => Ok(None),
            Some(raw) => parse_date_str(raw)
                .map(Some)
                .ok_or(ApiError::BadRequest(error_code)),
        }
    }

    /// Optional integer parameter; a present but non-numeric value is
    /// rejected with `error_code`.
    pub fn integer<T: std::str::FromStr>(
        &self,
        key: &str,
        error_code: &'static str,
    ) -> Result<Option<T>, ApiError> {
        match self.get(key) {
            None => Ok(None),
            Some(raw) => raw
                .trim()
                .parse()
                .map(Some)
                .map_err(|_| ApiError::BadRequest(error_code)),
        }
    }

    /// `from`/`to` window shared by the ranged endpoints.
    pub fn window(&self) -> Result<DateWindow, ApiError> {
        Ok(DateWindow::new(
            self.date("from", "invalid_from")?,
            self.date("to", "invalid_to")?,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn test_window_is_inclusive() {
        let window = DateWindow::new(Some(date("2024-01-01")), Some(date("2024-01-07")));
        assert!(window.contains(Some(date("2024-01-01"))));
        assert!(window.contains(Some(date("2024-01-07"))));
        assert!(!window.contains(Some(date("2023-12-31"))));
        assert!(!window.contains(Some(date("2024-01-08"))));
        assert!(!window.contains(None));
    }

    #[test]
    fn test_open_windows() {
        let inactive = DateWindow::default();
        assert!(inactive.contains(None));
        assert!(inactive.contains(Some(date("1999-01-01"))));

        let from_only = DateWindow::new(Some(date("2024-01-01")), None);
        assert!(from_only.contains(Some(date("2030-01-01"))));
        assert!(!from_only.contains(Some(date("2023-01-01"))));
        assert!(!from_only.contains(None));
    }

    #[test]
    fn test_subject_filter() {
        let filter = SubjectFilter::new(Some("MAT"));
        assert!(filter.matches(Some("Matematyka")));
        assert!(!filter.matches(Some("Fizyka")));
        assert!(!filter.matches(None));

        let inactive = SubjectFilter::new(Some(""));
        assert!(!inactive.is_active());
        assert!(inactive.matches(None));
    }

    #[test]
    fn test_query_params() {
        let params = QueryParams::parse(Some("includeRaw=TRUE&subject=j%C4%99zyk&autoWeek=no&q="));
        assert!(params.include_raw());
        assert_eq!(params.get("subject"), Some("język"));
        assert!(params.flag_default_on("autoWeek"));
        assert_eq!(params.get("q"), None);

        let params = QueryParams::parse(Some("autoWeek=False&includeRaw=1"));
        assert!(!params.flag_default_on("autoWeek"));
        assert!(!params.include_raw());
    }

    #[test]
    fn test_invalid_parameters_are_rejected() {
        let params = QueryParams::parse(Some("from=2024-01-01&to=soon&page=x"));
        assert!(matches!(
            params.window(),
            Err(ApiError::BadRequest("invalid_to"))
        ));
        assert!(matches!(
            params.integer::<u32>("page", "invalid_page"),
            Err(ApiError::BadRequest("invalid_page"))
        ));
        assert_eq!(
            params.date("from", "invalid_from").unwrap(),
            Some(date("2024-01-01"))
        );
    }
}
