//! Daily forecast alarm and digest assembly.
//!
//! The alarm is polled on a short fixed period and compared against the
//! wall clock at minute resolution. Because several polls land inside the
//! matching minute, a daily dedup gate makes sure the digest goes out once
//! per calendar date.
//!
//! # Clock injection
//! `is_due_at` and `build_digest` take the time explicitly; `is_due` reads
//! the local clock.

use chrono::{Local, NaiveDate, NaiveDateTime, NaiveTime, Timelike};
use std::fmt::Write;

use crate::alert::dedup::DedupGate;
use crate::model::RelayError;
use crate::text::{segment, truncate};

const ALARM_KEY: &str = "forecast-digest";

/// Parses `"H:MM"` or `"HH:MM"` into a time of day.
pub fn parse_alarm_time(text: &str) -> Result<NaiveTime, RelayError> {
    NaiveTime::parse_from_str(text.trim(), "%H:%M")
        .map_err(|e| RelayError::Config(format!("invalid alarm time '{}': {}", text, e)))
}

pub struct DailyAlarm {
    at: NaiveTime,
    gate: DedupGate,
}

impl DailyAlarm {
    pub fn new(at: NaiveTime) -> Self {
        Self {
            at,
            gate: DedupGate::daily(),
        }
    }

    pub fn time(&self) -> NaiveTime {
        self.at
    }

    /// True exactly once per date, on the first check that falls inside the
    /// alarm's minute.
    pub fn is_due_at(&self, now: NaiveDateTime) -> bool {
        now.hour() == self.at.hour()
            && now.minute() == self.at.minute()
            && self.gate.should_fire_at(ALARM_KEY, now.date())
    }

    pub fn is_due(&self) -> bool {
        self.is_due_at(Local::now().naive_local())
    }
}

/// Renders the digest header template for `date`.
///
/// Time-of-day specifiers such as `%H` have nothing to format on a bare
/// date and make chrono fail; that surfaces as a `Config` error instead of
/// a panic.
pub fn render_header(header: &str, date: NaiveDate) -> Result<String, RelayError> {
    let mut rendered = String::new();
    write!(rendered, "{}", date.format(header))
        .map_err(|_| RelayError::Config(format!("forecast.header '{}' cannot be rendered for a date", header)))?;
    Ok(rendered)
}

/// Splits the forecast into chunks of at most `max_bytes` and prepends the
/// dated header as its own first chunk.
///
/// Returns an empty list when there is no forecast text, so a failed fetch
/// sends nothing at all rather than a lone header. A header longer than
/// `max_bytes` is truncated; if nothing of it survives, the body goes out
/// without one.
pub fn build_digest(
    forecast: &str,
    max_bytes: usize,
    header: &str,
    date: NaiveDate,
) -> Result<Vec<String>, RelayError> {
    let mut chunks = segment(forecast, max_bytes);
    if chunks.is_empty() {
        return Ok(chunks);
    }
    let title = truncate(&render_header(header, date)?, max_bytes);
    if !title.is_empty() {
        chunks.insert(0, title);
    }
    Ok(chunks)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at(h: u32, m: u32, s: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 6, 1)
            .unwrap()
            .and_hms_opt(h, m, s)
            .unwrap()
    }

    fn alarm() -> DailyAlarm {
        DailyAlarm::new(parse_alarm_time("7:23").expect("valid alarm time"))
    }

    #[test]
    fn test_parse_alarm_time_accepts_single_digit_hour() {
        assert_eq!(parse_alarm_time("7:23").unwrap(), NaiveTime::from_hms_opt(7, 23, 0).unwrap());
        assert_eq!(parse_alarm_time("18:05").unwrap(), NaiveTime::from_hms_opt(18, 5, 0).unwrap());
    }

    #[test]
    fn test_parse_alarm_time_rejects_garbage() {
        assert!(parse_alarm_time("25:00").is_err());
        assert!(parse_alarm_time("noon").is_err());
    }

    #[test]
    fn test_alarm_fires_once_within_its_minute() {
        let alarm = alarm();
        assert!(!alarm.is_due_at(at(7, 22, 59)));
        assert!(alarm.is_due_at(at(7, 23, 0)));
        assert!(!alarm.is_due_at(at(7, 23, 30)), "second check in the same minute is suppressed");
        assert!(!alarm.is_due_at(at(7, 24, 0)));
    }

    #[test]
    fn test_alarm_rearms_next_day() {
        let alarm = alarm();
        assert!(alarm.is_due_at(at(7, 23, 10)));
        let next_day = NaiveDate::from_ymd_opt(2025, 6, 2)
            .unwrap()
            .and_hms_opt(7, 23, 10)
            .unwrap();
        assert!(alarm.is_due_at(next_day));
    }

    #[test]
    fn test_digest_prepends_dated_header() {
        let date = NaiveDate::from_ymd_opt(2025, 6, 1).unwrap();
        let digest = build_digest("Jasno. Teplo.", 130, "Pocasie pre %-d.%-m.%Y:", date).unwrap();
        assert_eq!(digest, vec!["Pocasie pre 1.6.2025:", "Jasno. Teplo."]);
    }

    #[test]
    fn test_digest_of_empty_forecast_is_empty() {
        let date = NaiveDate::from_ymd_opt(2025, 6, 1).unwrap();
        assert!(build_digest("  ", 130, "Pocasie pre %-d.%-m.%Y:", date).unwrap().is_empty());
    }

    #[test]
    fn test_digest_body_respects_byte_limit() {
        let date = NaiveDate::from_ymd_opt(2025, 6, 1).unwrap();
        let forecast = "Zamračené. Občasný dážď. Na severe ojedinelé búrky. Teplota 18 °C.";
        let digest = build_digest(forecast, 24, "%Y", date).unwrap();
        assert_eq!(digest[0], "2025");
        assert!(digest.len() > 2);
        assert!(digest[1..].iter().all(|c| c.len() <= 24));
    }

    #[test]
    fn test_time_specifier_in_header_is_an_error_not_a_panic() {
        let date = NaiveDate::from_ymd_opt(2025, 6, 1).unwrap();
        let result = build_digest("Jasno.", 130, "Pocasie %d.%m. %H:%M", date);
        assert!(matches!(result, Err(RelayError::Config(_))), "got {:?}", result);
        assert!(render_header("Pocasie %d.%m. %H:%M", date).is_err());
    }

    #[test]
    fn test_overlong_header_is_truncated_to_the_limit() {
        let date = NaiveDate::from_ymd_opt(2025, 6, 1).unwrap();
        let digest = build_digest("Jasno. Teplo.", 16, "Pocasie pre %-d.%-m.%Y:", date).unwrap();
        assert_eq!(digest, vec!["Pocasie pre", "Jasno. Teplo."]);
        assert!(digest.iter().all(|c| c.len() <= 16));
    }

    #[test]
    fn test_header_with_no_fitting_word_is_dropped() {
        let date = NaiveDate::from_ymd_opt(2025, 6, 1).unwrap();
        let digest = build_digest("Jasno.", 6, "Predpoved %Y", date).unwrap();
        assert_eq!(digest, vec!["Jasno."]);
    }
}
