//! Client-side publication date filtering

use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime, Utc};

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M",
    "%Y/%m/%d %H:%M:%S",
    "%Y/%m/%d %H:%M",
];

const DATE_FORMATS: &[&str] = &[
    "%Y-%m-%d",
    "%Y/%m/%d",
    "%Y%m%d",
    "%Y.%m.%d",
    "%d %B %Y",
    "%d %B, %Y",
    "%B %d, %Y",
    "%B %d %Y",
];

/// Parse a user-supplied date bound.
///
/// The wall-clock reading is taken as UTC: any offset in the input is
/// dropped, not converted. Date-only input means midnight, a bare month
/// means its first day and a bare year means January 1st. Unparseable input
/// is logged and yields `None`, which leaves that side of the window open.
pub fn parse_date_bound(input: &str) -> Option<DateTime<Utc>> {
    let s = input.trim();
    let parsed = parse_wall_clock(s);
    if parsed.is_none() {
        tracing::error!(input, "invalid date bound; ignoring it");
    }
    parsed.map(|naive| naive.and_utc())
}

fn parse_wall_clock(s: &str) -> Option<NaiveDateTime> {
    if s.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.naive_local());
    }
    if let Ok(dt) = DateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%z") {
        return Some(dt.naive_local());
    }
    for fmt in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(dt);
        }
    }
    // "January 2024", tried first: whitespace in a format may match nothing,
    // so "%B %d %Y" would read it as day 20 of year 24.
    if let Some(d) = parse_date(&format!("1 {s}"), "%d %B %Y") {
        return d.and_hms_opt(0, 0, 0);
    }
    for fmt in DATE_FORMATS {
        if let Some(d) = parse_date(s, fmt) {
            return d.and_hms_opt(0, 0, 0);
        }
    }
    // "2024-03" / "2024/03"
    for fmt in ["%Y-%m-%d", "%Y/%m/%d"] {
        let sep = if fmt.contains('-') { '-' } else { '/' };
        if let Some(d) = parse_date(&format!("{s}{sep}01"), fmt) {
            return d.and_hms_opt(0, 0, 0);
        }
    }
    if s.len() == 4 && s.bytes().all(|b| b.is_ascii_digit()) {
        let year = s.parse().ok()?;
        return NaiveDate::from_ymd_opt(year, 1, 1)?.and_hms_opt(0, 0, 0);
    }
    None
}

/// A date with a four-digit year; shorter years come from misreading the input
fn parse_date(s: &str, fmt: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(s, fmt)
        .ok()
        .filter(|d| d.year() >= 1000)
}

/// Closed publication-date interval; a missing bound is open
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DateWindow {
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
}

impl DateWindow {
    /// Build from optional raw strings; bad strings drop their bound
    pub fn parse(from: Option<&str>, to: Option<&str>) -> Self {
        Self {
            from: from.and_then(parse_date_bound),
            to: to.and_then(parse_date_bound),
        }
    }

    pub fn is_open(&self) -> bool {
        self.from.is_none() && self.to.is_none()
    }

    pub fn contains(&self, ts: DateTime<Utc>) -> bool {
        if let Some(from) = self.from {
            if ts < from {
                return false;
            }
        }
        if let Some(to) = self.to {
            if ts > to {
                return false;
            }
        }
        true
    }
}
