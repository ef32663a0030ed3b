use serde::{Deserialize, Serialize};

use crate::utils::now_timestamp_string;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Project {
    pub id: i64,
    pub title: String,
    pub status: String,          // active, writing, ..., see status.rs
    pub role: Option<String>,    // lead, co-author, advisor, ...
    pub journal: Option<String>, // target journal
    pub created_at: String,
    #[serde(default)]
    pub logs: Vec<ActivityLogEntry>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityLogEntry {
    pub id: i64,
    pub project_id: i64,
    pub activity_date: Option<String>, // when the work happened, if recorded
    pub created_at: String,            // when the entry was written
    pub label: String,
}

/// Fields for a log entry that does not exist yet.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NewLogEntry {
    pub activity_date: Option<String>,
    pub label: String,
}

/// A project that has not been stored yet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewProject {
    pub title: String,
    pub status: String,
    pub role: Option<String>,
    pub journal: Option<String>,
    pub created_at: String,
}

impl NewProject {
    pub fn new(title: String) -> Self {
        Self {
            title,
            status: "active".to_string(),
            role: None,
            journal: None,
            created_at: now_timestamp_string(),
        }
    }
}

/// Per-project to-do marker. Every project has exactly one; unpinned
/// projects carry the default value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TodoStatus {
    pub is_pinned: bool,
    pub marked_at: Option<String>,
    pub priority: Option<i64>,
    pub notes: Option<String>,
}

impl TodoStatus {
    /// The value written when a project is freshly pinned.
    pub fn pinned_now() -> Self {
        Self {
            is_pinned: true,
            marked_at: Some(now_timestamp_string()),
            priority: Some(0),
            notes: None,
        }
    }
}

/// One row of the pinned-projects query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PinnedProject {
    pub project_id: i64,
    pub status: TodoStatus,
}

/// Optional filters for the active project list.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProjectFilter {
    pub status: Option<String>,
    pub role: Option<String>,
    pub journal: Option<String>,
}
