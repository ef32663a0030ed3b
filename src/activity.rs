use chrono::{DateTime, Utc};

use crate::models::ActivityLogEntry;
use crate::utils::{parse_optional_timestamp, parse_timestamp};

/// Effective date of a single log entry: the activity date when it parses,
/// otherwise the date the entry was written.
pub fn effective_date(entry: &ActivityLogEntry) -> Option<DateTime<Utc>> {
    parse_optional_timestamp(entry.activity_date.as_deref())
        .or_else(|| parse_timestamp(&entry.created_at))
}

/// Most recent valid date among a project's log entries.
///
/// Returns `None` for an empty list or when no entry has a usable date.
pub fn latest_activity(entries: &[ActivityLogEntry]) -> Option<DateTime<Utc>> {
    let mut candidates: Vec<Option<DateTime<Utc>>> = entries.iter().map(effective_date).collect();
    // Option orders None first, so a descending sort leaves invalid dates last.
    candidates.sort_by(|a, b| b.cmp(a));
    candidates.into_iter().next().flatten()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn entry(id: i64, activity_date: Option<&str>, created_at: &str) -> ActivityLogEntry {
        ActivityLogEntry {
            id,
            project_id: 1,
            activity_date: activity_date.map(str::to_string),
            created_at: created_at.to_string(),
            label: format!("entry {id}"),
        }
    }

    #[test]
    fn empty_list_has_no_activity() {
        assert_eq!(latest_activity(&[]), None);
    }

    #[test]
    fn all_invalid_dates_have_no_activity() {
        let entries = vec![
            entry(1, Some("soon"), "garbage"),
            entry(2, None, ""),
            entry(3, Some(""), "31/12/2023"),
        ];
        assert_eq!(latest_activity(&entries), None);
    }

    #[test]
    fn invalid_entries_are_ignored() {
        let entries = vec![
            entry(1, Some("garbage"), "nope"),
            entry(2, Some("2024-01-10"), "2023-01-01 00:00:00"),
            entry(3, None, "not a date"),
        ];
        assert_eq!(
            latest_activity(&entries),
            Some(Utc.with_ymd_and_hms(2024, 1, 10, 0, 0, 0).unwrap())
        );
    }

    #[test]
    fn falls_back_to_created_at() {
        let entries = vec![
            entry(1, Some("2024-01-10"), "2024-01-10 08:00:00"),
            entry(2, Some("bad"), "2024-02-01 12:00:00"),
        ];
        assert_eq!(
            latest_activity(&entries),
            Some(Utc.with_ymd_and_hms(2024, 2, 1, 12, 0, 0).unwrap())
        );
    }

    #[test]
    fn activity_date_wins_over_created_at() {
        let e = entry(1, Some("2023-06-01"), "2024-06-01 00:00:00");
        assert_eq!(
            effective_date(&e),
            Some(Utc.with_ymd_and_hms(2023, 6, 1, 0, 0, 0).unwrap())
        );
    }
}
