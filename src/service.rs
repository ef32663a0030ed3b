use thiserror::Error;

use crate::database::DatabaseError;
use crate::models::{ActivityLogEntry, NewLogEntry, PinnedProject, Project, ProjectFilter};

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("Service unavailable: {0}")]
    Unavailable(String),
    #[error("Project {0} not found")]
    ProjectNotFound(i64),
    #[error("Log entry {0} not found")]
    LogEntryNotFound(i64),
    #[error("Request rejected: {0}")]
    Rejected(String),
    #[error("Storage error: {0}")]
    Storage(#[from] DatabaseError),
}

/// Persistence operations the dashboard depends on.
///
/// Every call may fail; callers treat failures as recoverable.
pub trait ProjectService {
    /// Projects that are not archived, with their activity logs
    fn list_active_projects(&self, filter: &ProjectFilter) -> Result<Vec<Project>, ServiceError>;

    /// To-do markers of every pinned project
    fn list_pinned_projects(&self) -> Result<Vec<PinnedProject>, ServiceError>;

    fn mark_todo(&mut self, project_id: i64) -> Result<(), ServiceError>;

    fn unmark_todo(&mut self, project_id: i64) -> Result<(), ServiceError>;

    /// Change priority and notes of an already pinned project
    fn update_todo(
        &mut self,
        project_id: i64,
        priority: Option<i64>,
        notes: Option<String>,
    ) -> Result<(), ServiceError>;

    fn create_log_entry(
        &mut self,
        project_id: i64,
        entry: &NewLogEntry,
    ) -> Result<ActivityLogEntry, ServiceError>;

    fn update_log_entry(&mut self, entry: &ActivityLogEntry) -> Result<ActivityLogEntry, ServiceError>;

    fn delete_log_entry(&mut self, entry_id: i64) -> Result<(), ServiceError>;
}
