use chrono::NaiveDateTime;

use crate::models::SessionEnd;

/// Accepted session timestamp formats, tried in priority order.
///
/// The order matters for ambiguous day/month values: `02/01/2024 ...` parses
/// as 2 January (day-first) because the day-first pattern is tried before
/// the US month-first one.
pub const ACCEPTED_FORMATS: &[&str] = &[
    "%d-%m-%Y %H:%M:%S",
    "%d/%m/%Y %H:%M:%S",
    "%Y-%m-%d %H:%M:%S",
    "%m/%d/%Y %H:%M:%S",
];

/// Parse a session timestamp cell.
///
/// Returns `None` for empty/whitespace cells and for values that fail every
/// accepted format. Callers drop such rows rather than failing the file.
pub fn parse_session_time(value: &str) -> Option<NaiveDateTime> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return None;
    }

    ACCEPTED_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(trimmed, fmt).ok())
}

/// Parse an `EndSession` cell into a [`SessionEnd`].
///
/// Blank and unparsable cells both mean "still open": the original feed
/// leaves the end cell empty while a session is running, and a corrupt end
/// value must not disqualify an otherwise valid row.
pub fn parse_session_end(value: &str) -> SessionEnd {
    match parse_session_time(value) {
        Some(ts) => SessionEnd::At(ts),
        None => SessionEnd::Open,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, Timelike};

    // ── parse_session_time ───────────────────────────────────────────────────

    #[test]
    fn test_parse_day_dash_format() {
        let ts = parse_session_time("15-01-2024 10:30:00").unwrap();
        assert_eq!((ts.day(), ts.month(), ts.year()), (15, 1, 2024));
        assert_eq!((ts.hour(), ts.minute(), ts.second()), (10, 30, 0));
    }

    #[test]
    fn test_parse_day_slash_format() {
        let ts = parse_session_time("15/01/2024 10:30:00").unwrap();
        assert_eq!((ts.day(), ts.month()), (15, 1));
    }

    #[test]
    fn test_parse_iso_format() {
        let ts = parse_session_time("2024-01-15 10:30:00").unwrap();
        assert_eq!((ts.year(), ts.month(), ts.day()), (2024, 1, 15));
    }

    #[test]
    fn test_parse_month_first_format() {
        // Only reachable when the day-first patterns cannot match.
        let ts = parse_session_time("01/15/2024 10:30:00").unwrap();
        assert_eq!((ts.month(), ts.day()), (1, 15));
    }

    #[test]
    fn test_ambiguous_value_prefers_day_first() {
        // 02/01 is valid in both day-first and month-first; the day-first
        // pattern is tried earlier, so this is 2 January.
        let ts = parse_session_time("02/01/2024 00:00:00").unwrap();
        assert_eq!((ts.day(), ts.month()), (2, 1));
    }

    #[test]
    fn test_parse_trims_whitespace() {
        assert!(parse_session_time("  2024-01-15 10:30:00  ").is_some());
    }

    #[test]
    fn test_parse_empty_returns_none() {
        assert!(parse_session_time("").is_none());
        assert!(parse_session_time("   ").is_none());
    }

    #[test]
    fn test_parse_garbage_returns_none() {
        assert!(parse_session_time("not-a-date").is_none());
        assert!(parse_session_time("2024-01-15").is_none()); // date without time
        assert!(parse_session_time("99/99/2024 10:00:00").is_none());
    }

    // ── parse_session_end ────────────────────────────────────────────────────

    #[test]
    fn test_parse_end_blank_is_open() {
        assert_eq!(parse_session_end(""), SessionEnd::Open);
        assert_eq!(parse_session_end("  "), SessionEnd::Open);
    }

    #[test]
    fn test_parse_end_unparsable_is_open() {
        assert_eq!(parse_session_end("corrupt"), SessionEnd::Open);
    }

    #[test]
    fn test_parse_end_valid_is_bounded() {
        match parse_session_end("2024-01-15 10:30:00") {
            SessionEnd::At(ts) => assert_eq!(ts.hour(), 10),
            SessionEnd::Open => panic!("expected bounded end"),
        }
    }
}
