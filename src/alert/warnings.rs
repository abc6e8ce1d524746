//! Warning deduplication and formatting.
//!
//! Each poll hands over the full list of currently published warnings.
//! A warning is announced the first time its identity is seen; the same
//! warning republished on later polls, even with reworded text, stays
//! silent.

use sha2::{Digest, Sha256};

use crate::alert::dedup::DedupGate;
use crate::model::WarningRecord;

/// Stable identity of a warning: hex SHA-256 over type, severity, and
/// validity window. The free text is deliberately excluded.
pub fn warning_identity(record: &WarningRecord) -> String {
    let material = format!(
        "{}_{}_{}_{}",
        record.kind, record.severity, record.start_time, record.end_time
    );
    Sha256::digest(material.as_bytes())
        .iter()
        .map(|b| format!("{:02x}", b))
        .collect()
}

/// `"[{severity}][{type}]: {text}"`
pub fn format_warning(record: &WarningRecord) -> String {
    format!("[{}][{}]: {}", record.severity, record.kind, record.text)
}

pub struct WarningPoller {
    seen: DedupGate,
}

impl WarningPoller {
    pub fn new() -> Self {
        Self {
            seen: DedupGate::persistent(),
        }
    }

    /// Returns the alert text for every warning not announced before, in
    /// feed order.
    pub fn poll(&self, records: &[WarningRecord]) -> Vec<String> {
        records
            .iter()
            .filter(|record| self.seen.should_fire(&warning_identity(record)))
            .map(format_warning)
            .collect()
    }
}

impl Default for WarningPoller {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn warning(kind: &str, severity: &str, text: &str, start: &str) -> WarningRecord {
        WarningRecord {
            kind: kind.to_string(),
            severity: severity.to_string(),
            text: text.to_string(),
            start_time: start.to_string(),
            end_time: "1.6.2025 23:00".to_string(),
        }
    }

    #[test]
    fn test_new_warnings_are_formatted_in_feed_order() {
        let poller = WarningPoller::new();
        let alerts = poller.poll(&[
            warning("thunderstorm", "orange", "Silne burky", "1.6.2025 14:00"),
            warning("wind", "yellow", "Silny vietor", "1.6.2025 12:00"),
        ]);
        assert_eq!(
            alerts,
            vec![
                "[orange][thunderstorm]: Silne burky".to_string(),
                "[yellow][wind]: Silny vietor".to_string(),
            ]
        );
    }

    #[test]
    fn test_repeated_warning_is_suppressed_even_with_new_text() {
        let poller = WarningPoller::new();
        assert_eq!(poller.poll(&[warning("wind", "yellow", "Silny vietor", "12:00")]).len(), 1);
        let again = poller.poll(&[warning("wind", "yellow", "Velmi silny vietor", "12:00")]);
        assert!(again.is_empty(), "identity ignores text, got {:?}", again);
    }

    #[test]
    fn test_changed_window_or_severity_is_a_new_warning() {
        let poller = WarningPoller::new();
        poller.poll(&[warning("wind", "yellow", "Silny vietor", "12:00")]);
        let alerts = poller.poll(&[
            warning("wind", "yellow", "Silny vietor", "12:00"),
            warning("wind", "orange", "Silny vietor", "12:00"),
            warning("wind", "yellow", "Silny vietor", "15:00"),
        ]);
        assert_eq!(alerts.len(), 2);
        assert!(alerts[0].starts_with("[orange][wind]"));
    }

    #[test]
    fn test_duplicates_within_one_batch_fire_once() {
        let poller = WarningPoller::new();
        let w = warning("rain", "yellow", "Dazd", "08:00");
        assert_eq!(poller.poll(&[w.clone(), w]).len(), 1);
    }

    #[test]
    fn test_identity_is_hex_sha256() {
        let id = warning_identity(&warning("rain", "yellow", "a", "08:00"));
        assert_eq!(id.len(), 64);
        assert!(id.chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(id, warning_identity(&warning("rain", "yellow", "b", "08:00")));
    }
}
