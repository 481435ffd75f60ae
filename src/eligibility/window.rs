use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::eligibility::violation::InvalidInputError;

/// Formats accepted from HTML `datetime-local` inputs, which carry no offset.
const LOCAL_FORMATS: [&str; 2] = ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M"];

/// Proposed start/end of an assignment.
///
/// Ordering is deliberately not enforced here: `start >= end` is reported
/// by the evaluator as `INVALID_WINDOW`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl TimeWindow {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self { start, end }
    }

    pub fn is_ordered(&self) -> bool {
        self.start < self.end
    }

    /// Half-open overlap: a window ending exactly when another starts does
    /// not collide with it.
    pub fn overlaps(&self, other: &TimeWindow) -> bool {
        self.start < other.end && self.end > other.start
    }

    /// Build a window from optional raw boundary values.
    ///
    /// Both absent yields `None`; exactly one present is a caller error.
    pub fn from_parts(
        start: Option<&str>,
        end: Option<&str>,
    ) -> Result<Option<Self>, InvalidInputError> {
        match (start, end) {
            (None, None) => Ok(None),
            (Some(_), None) => Err(InvalidInputError::MissingReference("end_time")),
            (None, Some(_)) => Err(InvalidInputError::MissingReference("start_time")),
            (Some(s), Some(e)) => Ok(Some(Self {
                start: parse_timestamp("start_time", s)?,
                end: parse_timestamp("end_time", e)?,
            })),
        }
    }
}

/// Parse an RFC 3339 timestamp, or a timezone-less local form taken as UTC.
pub fn parse_timestamp(field: &'static str, raw: &str) -> Result<DateTime<Utc>, InvalidInputError> {
    let raw = raw.trim();
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Ok(ts.with_timezone(&Utc));
    }
    LOCAL_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .map(|naive| naive.and_utc())
        .ok_or_else(|| InvalidInputError::MalformedTimestamp {
            field,
            value: raw.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn parses_rfc3339_with_offset() {
        let ts = parse_timestamp("start_time", "2024-01-18T09:00:00+08:00").unwrap();
        assert_eq!(ts, Utc.with_ymd_and_hms(2024, 1, 18, 1, 0, 0).unwrap());
    }

    #[test]
    fn parses_datetime_local_forms() {
        let minutes = parse_timestamp("start_time", "2024-01-18T09:00").unwrap();
        let seconds = parse_timestamp("start_time", "2024-01-18T09:00:00").unwrap();
        assert_eq!(minutes, seconds);
        assert_eq!(minutes, Utc.with_ymd_and_hms(2024, 1, 18, 9, 0, 0).unwrap());
    }

    #[test]
    fn rejects_garbage() {
        let err = parse_timestamp("end_time", "next tuesday").unwrap_err();
        assert_eq!(
            err,
            InvalidInputError::MalformedTimestamp {
                field: "end_time",
                value: "next tuesday".to_string()
            }
        );
    }

    #[test]
    fn from_parts_requires_both_or_neither() {
        assert_eq!(TimeWindow::from_parts(None, None).unwrap(), None);
        assert_eq!(
            TimeWindow::from_parts(Some("2024-01-18T09:00"), None).unwrap_err(),
            InvalidInputError::MissingReference("end_time")
        );
        assert_eq!(
            TimeWindow::from_parts(None, Some("2024-01-18T09:00")).unwrap_err(),
            InvalidInputError::MissingReference("start_time")
        );
    }

    #[test]
    fn equal_bounds_parse_but_are_not_ordered() {
        let w = TimeWindow::from_parts(Some("2024-01-18T09:00"), Some("2024-01-18T09:00"))
            .unwrap()
            .unwrap();
        assert!(!w.is_ordered());
    }

    #[test]
    fn overlap_is_half_open() {
        let at = |h| Utc.with_ymd_and_hms(2024, 1, 18, h, 0, 0).unwrap();
        let morning = TimeWindow::new(at(9), at(12));
        assert!(morning.overlaps(&TimeWindow::new(at(11), at(14))));
        assert!(morning.overlaps(&TimeWindow::new(at(10), at(11))));
        assert!(!morning.overlaps(&TimeWindow::new(at(12), at(15))));
        assert!(!TimeWindow::new(at(12), at(15)).overlaps(&morning));
    }
}
