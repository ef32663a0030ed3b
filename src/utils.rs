use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use directories::{BaseDirs, ProjectDirs};
use std::path::PathBuf;

/// Format used for every timestamp this crate writes
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Profile mode for the application (dev or prod)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Profile {
    Dev,
    Prod,
}

impl Profile {
    fn app_name(self) -> &'static str {
        match self {
            Profile::Dev => "research-desk-dev",
            Profile::Prod => "research-desk",
        }
    }
}

/// Get the configuration directory path
/// If profile is Dev, uses "research-desk-dev" instead of "research-desk"
pub fn get_config_dir(profile: Profile) -> Option<PathBuf> {
    ProjectDirs::from("com", "research-desk", profile.app_name())
        .map(|dirs| dirs.config_dir().to_path_buf())
}

/// Get the data directory path
pub fn get_data_dir(profile: Profile) -> Option<PathBuf> {
    ProjectDirs::from("com", "research-desk", profile.app_name())
        .map(|dirs| dirs.data_dir().to_path_buf())
}

/// Expand `~` in a path string to the user's home directory
pub fn expand_path(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = BaseDirs::new().map(|d| d.home_dir().to_path_buf()) {
            return home.join(rest);
        }
    }
    PathBuf::from(path)
}

/// Parse a date string in ISO 8601 format (YYYY-MM-DD)
pub fn parse_date(date_str: &str) -> Result<NaiveDate, chrono::ParseError> {
    NaiveDate::parse_from_str(date_str, "%Y-%m-%d")
}

/// Parse any timestamp text found in project data.
///
/// Accepts RFC 3339, offset-less date-times with either separator (seconds
/// and fractions optional) and bare `YYYY-MM-DD` (read as midnight UTC). Anything else, including empty
/// strings, yields `None`. Activity extraction and ranking both go through
/// this function so malformed dates are treated the same everywhere.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }

    for format in [
        TIMESTAMP_FORMAT,
        "%Y-%m-%dT%H:%M:%S",
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%d %H:%M",
        "%Y-%m-%dT%H:%M",
    ] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(naive.and_utc());
        }
    }

    parse_date(raw)
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

/// Parse an optional timestamp field
pub fn parse_optional_timestamp(raw: Option<&str>) -> Option<DateTime<Utc>> {
    raw.and_then(parse_timestamp)
}

/// Get the current time as a timestamp string
pub fn now_timestamp_string() -> String {
    Utc::now().format(TIMESTAMP_FORMAT).to_string()
}
