use rusqlite::{Connection, OptionalExtension};
use std::collections::HashMap;
use std::path::PathBuf;
use thiserror::Error;

use crate::models::{
    ActivityLogEntry, NewLogEntry, NewProject, PinnedProject, Project, ProjectFilter, TodoStatus,
};
use crate::service::{ProjectService, ServiceError};
use crate::status::ProjectStatus;
use crate::utils::now_timestamp_string;

#[derive(Debug, Error)]
pub enum DatabaseError {
    #[error("SQLite error: {0}")]
    SqliteError(#[from] rusqlite::Error),
    #[error("Failed to create database directory: {0}")]
    DirectoryError(String),
    #[error("Project {0} not found")]
    ProjectNotFound(i64),
    #[error("Log entry {0} not found")]
    LogEntryNotFound(i64),
    #[error("Project {0} is not on the to-do list")]
    NotPinned(i64),
}

pub struct Database {
    conn: Connection,
}

impl Database {
    /// Create a new database connection and initialize the schema
    pub fn new(path: &str) -> Result<Self, DatabaseError> {
        let db_path = PathBuf::from(path);

        // Create parent directory if it doesn't exist
        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| DatabaseError::DirectoryError(e.to_string()))?;
            }
        }

        let conn = Connection::open(&db_path)?;
        tracing::debug!(path = %db_path.display(), "opened database");

        let db = Database { conn };
        db.initialize_schema()?;

        Ok(db)
    }

    /// Open a throwaway database that lives only as long as the connection
    pub fn open_in_memory() -> Result<Self, DatabaseError> {
        let db = Database {
            conn: Connection::open_in_memory()?,
        };
        db.initialize_schema()?;
        Ok(db)
    }

    /// Initialize the database schema (tables and indexes)
    fn initialize_schema(&self) -> Result<(), DatabaseError> {
        self.conn.execute(
            "CREATE TABLE IF NOT EXISTS projects (
                id              INTEGER PRIMARY KEY AUTOINCREMENT,
                title           TEXT NOT NULL,
                status          TEXT NOT NULL DEFAULT 'active',
                created_at      TEXT NOT NULL,
                updated_at      TEXT NOT NULL
            )",
            [],
        )?;

        self.conn.execute(
            "CREATE TABLE IF NOT EXISTS activity_logs (
                id              INTEGER PRIMARY KEY AUTOINCREMENT,
                project_id      INTEGER NOT NULL,
                activity_date   TEXT,
                label           TEXT NOT NULL,
                created_at      TEXT NOT NULL
            )",
            [],
        )?;

        self.conn.execute(
            "CREATE TABLE IF NOT EXISTS project_todos (
                project_id      INTEGER PRIMARY KEY,
                marked_at       TEXT,
                priority        INTEGER,
                notes           TEXT
            )",
            [],
        )?;

        self.conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_activity_logs_project_id ON activity_logs(project_id)",
            [],
        )?;

        self.conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_projects_status ON projects(status)",
            [],
        )?;

        self.migrate_add_role_and_journal()?;

        Ok(())
    }

    /// Add role and journal columns to project tables created before they existed
    fn migrate_add_role_and_journal(&self) -> Result<(), DatabaseError> {
        fn column_exists(conn: &Connection, table: &str, column: &str) -> Result<bool, DatabaseError> {
            let mut stmt = conn.prepare("SELECT COUNT(*) FROM pragma_table_info(?1) WHERE name = ?2")?;
            let count: i64 = stmt.query_row(rusqlite::params![table, column], |row| row.get(0))?;
            Ok(count > 0)
        }

        for column in ["role", "journal"] {
            if !column_exists(&self.conn, "projects", column)? {
                self.conn
                    .execute(&format!("ALTER TABLE projects ADD COLUMN {column} TEXT"), [])?;
                tracing::info!(column, "migrated projects table");
            }
        }

        Ok(())
    }

    /// Insert a project and return its ID
    pub fn insert_project(&self, project: &NewProject) -> Result<i64, DatabaseError> {
        self.conn.execute(
            "INSERT INTO projects (title, status, role, journal, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            rusqlite::params![
                project.title,
                project.status,
                project.role,
                project.journal,
                project.created_at,
                now_timestamp_string()
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    /// Helper function to map a row to a Project without its logs
    fn row_to_project(row: &rusqlite::Row) -> Result<Project, rusqlite::Error> {
        Ok(Project {
            id: row.get(0)?,
            title: row.get(1)?,
            status: row.get(2)?,
            role: row.get(3)?,
            journal: row.get(4)?,
            created_at: row.get(5)?,
            logs: Vec::new(),
        })
    }

    /// Helper function to map a row to an ActivityLogEntry
    fn row_to_log_entry(row: &rusqlite::Row) -> Result<ActivityLogEntry, rusqlite::Error> {
        Ok(ActivityLogEntry {
            id: row.get(0)?,
            project_id: row.get(1)?,
            activity_date: row.get(2)?,
            label: row.get(3)?,
            created_at: row.get(4)?,
        })
    }

    /// Get a single project by ID, including its logs
    pub fn get_project(&self, id: i64) -> Result<Project, DatabaseError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, title, status, role, journal, created_at FROM projects WHERE id = ?1",
        )?;
        let mut project = stmt
            .query_row(rusqlite::params![id], Self::row_to_project)
            .optional()?
            .ok_or(DatabaseError::ProjectNotFound(id))?;
        project.logs = self.get_logs_for_project(id)?;
        Ok(project)
    }

    /// Get every non-archived project matching the filter, ordered by id
    pub fn get_active_projects(&self, filter: &ProjectFilter) -> Result<Vec<Project>, DatabaseError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, title, status, role, journal, created_at
             FROM projects
             WHERE status != ?1
               AND (?2 IS NULL OR status = ?2)
               AND (?3 IS NULL OR role = ?3)
               AND (?4 IS NULL OR journal = ?4)
             ORDER BY id ASC",
        )?;
        let mut projects = stmt
            .query_map(
                rusqlite::params![
                    ProjectStatus::Archived.as_str(),
                    filter.status,
                    filter.role,
                    filter.journal
                ],
                Self::row_to_project,
            )?
            .collect::<Result<Vec<_>, _>>()?;

        let mut logs = self.get_all_logs()?;
        for project in &mut projects {
            project.logs = logs.remove(&project.id).unwrap_or_default();
        }

        Ok(projects)
    }

    /// Update a project's workflow status
    pub fn update_project_status(&self, id: i64, status: &str) -> Result<(), DatabaseError> {
        let tx = self.conn.unchecked_transaction()?;
        let changed = tx.execute(
            "UPDATE projects SET status = ?1, updated_at = ?2 WHERE id = ?3",
            rusqlite::params![status, now_timestamp_string(), id],
        )?;
        if changed == 0 {
            return Err(DatabaseError::ProjectNotFound(id));
        }
        tx.commit()?;
        Ok(())
    }

    /// Delete a project together with its logs and to-do marker
    pub fn delete_project(&self, id: i64) -> Result<(), DatabaseError> {
        let tx = self.conn.unchecked_transaction()?;
        tx.execute("DELETE FROM activity_logs WHERE project_id = ?1", rusqlite::params![id])?;
        tx.execute("DELETE FROM project_todos WHERE project_id = ?1", rusqlite::params![id])?;
        let changed = tx.execute("DELETE FROM projects WHERE id = ?1", rusqlite::params![id])?;
        if changed == 0 {
            return Err(DatabaseError::ProjectNotFound(id));
        }
        tx.commit()?;
        Ok(())
    }

    fn project_exists(&self, id: i64) -> Result<bool, DatabaseError> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM projects WHERE id = ?1",
            rusqlite::params![id],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    /// Get all log entries of one project, newest entry first
    pub fn get_logs_for_project(&self, project_id: i64) -> Result<Vec<ActivityLogEntry>, DatabaseError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, project_id, activity_date, label, created_at
             FROM activity_logs WHERE project_id = ?1 ORDER BY id DESC",
        )?;
        let logs = stmt
            .query_map(rusqlite::params![project_id], Self::row_to_log_entry)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(logs)
    }

    fn get_all_logs(&self) -> Result<HashMap<i64, Vec<ActivityLogEntry>>, DatabaseError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, project_id, activity_date, label, created_at
             FROM activity_logs ORDER BY id DESC",
        )?;
        let mut grouped: HashMap<i64, Vec<ActivityLogEntry>> = HashMap::new();
        for entry in stmt.query_map([], Self::row_to_log_entry)? {
            let entry = entry?;
            grouped.entry(entry.project_id).or_default().push(entry);
        }
        Ok(grouped)
    }

    /// Get a single log entry by ID
    pub fn get_log_entry(&self, id: i64) -> Result<ActivityLogEntry, DatabaseError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, project_id, activity_date, label, created_at
             FROM activity_logs WHERE id = ?1",
        )?;
        stmt.query_row(rusqlite::params![id], Self::row_to_log_entry)
            .optional()?
            .ok_or(DatabaseError::LogEntryNotFound(id))
    }

    /// Insert a log entry for a project and return the stored entry
    pub fn insert_log_entry(
        &self,
        project_id: i64,
        entry: &NewLogEntry,
    ) -> Result<ActivityLogEntry, DatabaseError> {
        if !self.project_exists(project_id)? {
            return Err(DatabaseError::ProjectNotFound(project_id));
        }
        self.conn.execute(
            "INSERT INTO activity_logs (project_id, activity_date, label, created_at)
             VALUES (?1, ?2, ?3, ?4)",
            rusqlite::params![project_id, entry.activity_date, entry.label, now_timestamp_string()],
        )?;
        self.get_log_entry(self.conn.last_insert_rowid())
    }

    /// Update the label and activity date of an existing log entry
    pub fn update_log_entry(&self, entry: &ActivityLogEntry) -> Result<ActivityLogEntry, DatabaseError> {
        let tx = self.conn.unchecked_transaction()?;
        let changed = tx.execute(
            "UPDATE activity_logs SET activity_date = ?1, label = ?2 WHERE id = ?3",
            rusqlite::params![entry.activity_date, entry.label, entry.id],
        )?;
        if changed == 0 {
            return Err(DatabaseError::LogEntryNotFound(entry.id));
        }
        tx.commit()?;
        self.get_log_entry(entry.id)
    }

    /// Delete a log entry by ID
    pub fn delete_log_entry(&self, id: i64) -> Result<(), DatabaseError> {
        let tx = self.conn.unchecked_transaction()?;
        let changed = tx.execute("DELETE FROM activity_logs WHERE id = ?1", rusqlite::params![id])?;
        if changed == 0 {
            return Err(DatabaseError::LogEntryNotFound(id));
        }
        tx.commit()?;
        Ok(())
    }

    /// Get the to-do markers of all pinned projects
    pub fn get_pinned_projects(&self) -> Result<Vec<PinnedProject>, DatabaseError> {
        let mut stmt = self.conn.prepare(
            "SELECT project_id, marked_at, priority, notes
             FROM project_todos ORDER BY project_id ASC",
        )?;
        let pinned = stmt
            .query_map([], |row| {
                Ok(PinnedProject {
                    project_id: row.get(0)?,
                    status: TodoStatus {
                        is_pinned: true,
                        marked_at: row.get(1)?,
                        priority: row.get(2)?,
                        notes: row.get(3)?,
                    },
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(pinned)
    }

    /// Put a project on the to-do list, resetting priority and notes
    pub fn mark_todo(&self, project_id: i64) -> Result<(), DatabaseError> {
        if !self.project_exists(project_id)? {
            return Err(DatabaseError::ProjectNotFound(project_id));
        }
        self.conn.execute(
            "INSERT INTO project_todos (project_id, marked_at, priority, notes)
             VALUES (?1, ?2, 0, NULL)
             ON CONFLICT(project_id) DO UPDATE SET
                marked_at = excluded.marked_at, priority = 0, notes = NULL",
            rusqlite::params![project_id, now_timestamp_string()],
        )?;
        Ok(())
    }

    /// Take a project off the to-do list. Unpinned projects are left alone.
    pub fn unmark_todo(&self, project_id: i64) -> Result<(), DatabaseError> {
        self.conn.execute(
            "DELETE FROM project_todos WHERE project_id = ?1",
            rusqlite::params![project_id],
        )?;
        Ok(())
    }

    /// Update priority and notes of a pinned project
    pub fn update_todo(
        &self,
        project_id: i64,
        priority: Option<i64>,
        notes: Option<&str>,
    ) -> Result<(), DatabaseError> {
        let changed = self.conn.execute(
            "UPDATE project_todos SET priority = ?1, notes = ?2 WHERE project_id = ?3",
            rusqlite::params![priority, notes, project_id],
        )?;
        if changed == 0 {
            return Err(DatabaseError::NotPinned(project_id));
        }
        Ok(())
    }
}

/// Map storage failures onto the service error vocabulary
fn service_err(err: DatabaseError) -> ServiceError {
    match err {
        DatabaseError::ProjectNotFound(id) => ServiceError::ProjectNotFound(id),
        DatabaseError::LogEntryNotFound(id) => ServiceError::LogEntryNotFound(id),
        DatabaseError::NotPinned(id) => ServiceError::Rejected(format!("project {id} is not pinned")),
        other => ServiceError::Storage(other),
    }
}

impl ProjectService for Database {
    fn list_active_projects(&self, filter: &ProjectFilter) -> Result<Vec<Project>, ServiceError> {
        self.get_active_projects(filter).map_err(service_err)
    }

    fn list_pinned_projects(&self) -> Result<Vec<PinnedProject>, ServiceError> {
        self.get_pinned_projects().map_err(service_err)
    }

    fn mark_todo(&mut self, project_id: i64) -> Result<(), ServiceError> {
        Database::mark_todo(self, project_id).map_err(service_err)
    }

    fn unmark_todo(&mut self, project_id: i64) -> Result<(), ServiceError> {
        Database::unmark_todo(self, project_id).map_err(service_err)
    }

    fn update_todo(
        &mut self,
        project_id: i64,
        priority: Option<i64>,
        notes: Option<String>,
    ) -> Result<(), ServiceError> {
        Database::update_todo(self, project_id, priority, notes.as_deref()).map_err(service_err)
    }

    fn create_log_entry(
        &mut self,
        project_id: i64,
        entry: &NewLogEntry,
    ) -> Result<ActivityLogEntry, ServiceError> {
        self.insert_log_entry(project_id, entry).map_err(service_err)
    }

    fn update_log_entry(&mut self, entry: &ActivityLogEntry) -> Result<ActivityLogEntry, ServiceError> {
        Database::update_log_entry(self, entry).map_err(service_err)
    }

    fn delete_log_entry(&mut self, entry_id: i64) -> Result<(), ServiceError> {
        Database::delete_log_entry(self, entry_id).map_err(service_err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn db_with_project(title: &str, status: &str) -> (Database, i64) {
        let db = Database::open_in_memory().unwrap();
        let mut project = NewProject::new(title.to_string());
        project.status = status.to_string();
        let id = db.insert_project(&project).unwrap();
        (db, id)
    }

    #[test]
    fn schema_is_idempotent() {
        let db = Database::open_in_memory().unwrap();
        db.initialize_schema().unwrap();
        db.initialize_schema().unwrap();
    }

    #[test]
    fn archived_projects_are_not_active() {
        let (db, live) = db_with_project("Live", "active");
        let mut archived = NewProject::new("Old".to_string());
        archived.status = "archived".to_string();
        db.insert_project(&archived).unwrap();

        let projects = db.get_active_projects(&ProjectFilter::default()).unwrap();
        assert_eq!(projects.len(), 1);
        assert_eq!(projects[0].id, live);
    }

    #[test]
    fn filters_by_role_and_journal() {
        let db = Database::open_in_memory().unwrap();
        let mut a = NewProject::new("A".to_string());
        a.role = Some("lead".to_string());
        a.journal = Some("Nature".to_string());
        let a_id = db.insert_project(&a).unwrap();
        let mut b = NewProject::new("B".to_string());
        b.role = Some("co-author".to_string());
        db.insert_project(&b).unwrap();

        let filter = ProjectFilter {
            role: Some("lead".to_string()),
            ..ProjectFilter::default()
        };
        let projects = db.get_active_projects(&filter).unwrap();
        assert_eq!(projects.iter().map(|p| p.id).collect::<Vec<_>>(), vec![a_id]);

        let filter = ProjectFilter {
            journal: Some("Science".to_string()),
            ..ProjectFilter::default()
        };
        assert!(db.get_active_projects(&filter).unwrap().is_empty());
    }

    #[test]
    fn projects_carry_their_logs() {
        let (db, id) = db_with_project("Paper", "writing");
        let entry = NewLogEntry {
            activity_date: Some("2024-02-02".to_string()),
            label: "draft intro".to_string(),
        };
        let stored = db.insert_log_entry(id, &entry).unwrap();
        assert_eq!(stored.project_id, id);

        let project = db.get_project(id).unwrap();
        assert_eq!(project.logs, vec![stored.clone()]);

        let mut edited = stored;
        edited.label = "draft intro and methods".to_string();
        let updated = db.update_log_entry(&edited).unwrap();
        assert_eq!(updated.label, "draft intro and methods");

        db.delete_log_entry(updated.id).unwrap();
        assert!(db.get_project(id).unwrap().logs.is_empty());
        assert!(matches!(
            db.delete_log_entry(updated.id),
            Err(DatabaseError::LogEntryNotFound(_))
        ));
    }

    #[test]
    fn log_entry_for_missing_project_fails() {
        let db = Database::open_in_memory().unwrap();
        let result = db.insert_log_entry(99, &NewLogEntry::default());
        assert!(matches!(result, Err(DatabaseError::ProjectNotFound(99))));
    }

    #[test]
    fn mark_update_unmark_todo() {
        let (db, id) = db_with_project("Grant", "planning");

        db.mark_todo(id).unwrap();
        let pinned = db.get_pinned_projects().unwrap();
        assert_eq!(pinned.len(), 1);
        assert!(pinned[0].status.is_pinned);
        assert_eq!(pinned[0].status.priority, Some(0));

        db.update_todo(id, Some(4), Some("before the deadline")).unwrap();
        let pinned = db.get_pinned_projects().unwrap();
        assert_eq!(pinned[0].status.priority, Some(4));
        assert_eq!(pinned[0].status.notes.as_deref(), Some("before the deadline"));

        db.unmark_todo(id).unwrap();
        assert!(db.get_pinned_projects().unwrap().is_empty());
        assert!(matches!(db.update_todo(id, None, None), Err(DatabaseError::NotPinned(_))));
    }

    #[test]
    fn mark_todo_for_missing_project_maps_to_not_found() {
        let mut db = Database::open_in_memory().unwrap();
        let result = ProjectService::mark_todo(&mut db, 5);
        assert!(matches!(result, Err(ServiceError::ProjectNotFound(5))));
    }

    #[test]
    fn delete_project_cascades() {
        let (db, id) = db_with_project("Gone", "active");
        db.insert_log_entry(id, &NewLogEntry::default()).unwrap();
        db.mark_todo(id).unwrap();

        db.delete_project(id).unwrap();

        assert!(matches!(db.get_project(id), Err(DatabaseError::ProjectNotFound(_))));
        assert!(db.get_pinned_projects().unwrap().is_empty());
        assert!(db.get_logs_for_project(id).unwrap().is_empty());
    }

    #[test]
    fn update_status_of_missing_project_fails() {
        let db = Database::open_in_memory().unwrap();
        assert!(matches!(
            db.update_project_status(3, "completed"),
            Err(DatabaseError::ProjectNotFound(3))
        ));
    }
}
