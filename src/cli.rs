use clap::{Parser, Subcommand};
use serde::Serialize;
use thiserror::Error;

use crate::activity::latest_activity;
use crate::config::Config;
use crate::database::{Database, DatabaseError};
use crate::models::{NewLogEntry, NewProject, Project, TodoStatus};
use crate::mutation::{MutationOutcome, TodoController};
use crate::service::{ProjectService, ServiceError};
use crate::status::{ProjectStatus, UnknownStatus};
use crate::todo_cache::TodoCache;
use crate::utils::parse_date;

#[derive(Parser)]
#[command(name = "rdesk")]
#[command(about = "Research Desk - track research projects and what to work on next")]
#[command(version)]
pub struct Cli {
    /// Custom config file path
    #[arg(short, long)]
    pub config: Option<String>,

    /// Use development mode (uses separate dev config/database)
    #[arg(long)]
    pub dev: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Show the ranked project dashboard (default if no subcommand)
    List {
        /// Only projects with this status
        #[arg(long)]
        status: Option<String>,
        /// Only projects where you have this role
        #[arg(long)]
        role: Option<String>,
        /// Only projects targeting this journal
        #[arg(long)]
        journal: Option<String>,
        /// Print JSON instead of text
        #[arg(long)]
        json: bool,
    },
    /// Add a new project
    Add {
        /// Project title
        title: String,
        /// Workflow status (active, writing, revision, ...)
        #[arg(long, default_value = "active")]
        status: String,
        /// Your role on the project
        #[arg(long)]
        role: Option<String>,
        /// Target journal
        #[arg(long)]
        journal: Option<String>,
    },
    /// Change a project's workflow status
    SetStatus {
        id: i64,
        status: String,
    },
    /// Record activity on a project
    Log {
        /// Project ID
        id: i64,
        /// What was done
        label: String,
        /// When it happened (YYYY-MM-DD), defaults to now
        #[arg(long)]
        date: Option<String>,
    },
    /// Edit an activity log entry
    LogEdit {
        /// Log entry ID
        entry_id: i64,
        #[arg(long)]
        label: Option<String>,
        /// New activity date (YYYY-MM-DD)
        #[arg(long)]
        date: Option<String>,
    },
    /// Delete an activity log entry
    LogDelete {
        entry_id: i64,
    },
    /// Put a project on the to-do list, or take it off
    Todo {
        id: i64,
    },
    /// Set priority and notes of a to-do project
    TodoEdit {
        id: i64,
        #[arg(long)]
        priority: Option<i64>,
        /// New notes; pass an empty string to clear them
        #[arg(long)]
        notes: Option<String>,
    },
    /// Delete a project and its activity log
    Delete {
        id: i64,
    },
}

#[derive(Debug, Error)]
pub enum CliError {
    #[error("Database error: {0}")]
    DatabaseError(#[from] DatabaseError),
    #[error("{0}")]
    ServiceError(#[from] ServiceError),
    #[error("Failed to parse date: {0}")]
    DateParseError(String),
    #[error("{0}")]
    InvalidStatus(#[from] UnknownStatus),
    #[error("Project {0} is not on the active list")]
    ProjectNotActive(i64),
    #[error("Archived projects are not shown on the dashboard")]
    ArchivedNotListed,
    #[error("Failed to serialize output: {0}")]
    OutputError(#[from] serde_json::Error),
}

fn validate_date(date: Option<String>) -> Result<Option<String>, CliError> {
    match date {
        Some(date_str) => {
            parse_date(&date_str).map_err(|e| {
                CliError::DateParseError(format!("Invalid date format '{}': {}", date_str, e))
            })?;
            Ok(Some(date_str))
        }
        None => Ok(None),
    }
}

#[derive(Serialize)]
struct DashboardRow<'a> {
    rank: usize,
    #[serde(flatten)]
    project: &'a Project,
    todo: TodoStatus,
    last_activity: Option<String>,
}

fn format_row(rank: usize, project: &Project, todo: &TodoStatus) -> String {
    let marker = if todo.is_pinned { "★" } else { " " };
    let mut line = format!(
        "{:>3}. {} #{:<4} {} [{}]",
        rank, marker, project.id, project.title, project.status
    );
    if todo.is_pinned {
        line.push_str(&format!(" (priority {})", todo.priority.unwrap_or(0)));
    }
    if let Some(last) = latest_activity(&project.logs) {
        line.push_str(&format!("  last activity {}", last.format("%Y-%m-%d")));
    }
    if let Some(notes) = todo.notes.as_deref().filter(|n| !n.is_empty()) {
        line.push_str(&format!("\n          note: {}", notes));
    }
    line
}

/// Load the dashboard for the given filter
fn load_controller(
    config: &Config,
    db: &Database,
    status: Option<String>,
    role: Option<String>,
    journal: Option<String>,
) -> Result<TodoController, CliError> {
    let filter = config.project_filter(status, role, journal)?;
    if filter.status.as_deref() == Some(ProjectStatus::Archived.as_str()) {
        return Err(CliError::ArchivedNotListed);
    }
    let mut controller = TodoController::new(TodoCache::new()).with_filter(filter);
    controller.refresh(db)?;
    Ok(controller)
}

/// Handle the list command
pub fn handle_list(
    status: Option<String>,
    role: Option<String>,
    journal: Option<String>,
    json: bool,
    config: &Config,
    db: &Database,
) -> Result<(), CliError> {
    let mut controller = load_controller(config, db, status, role, journal)?;
    let cache = controller.cache().clone();
    let ranked = controller.ranked_projects();
    let todos: Vec<TodoStatus> = ranked.iter().map(|p| cache.get(p.id)).collect();

    if json {
        let rows: Vec<DashboardRow> = ranked
            .iter()
            .zip(todos)
            .enumerate()
            .map(|(i, (project, todo))| DashboardRow {
                rank: i + 1,
                project: *project,
                todo,
                last_activity: latest_activity(&project.logs).map(|d| d.to_rfc3339()),
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&rows)?);
        return Ok(());
    }

    if ranked.is_empty() {
        println!("No active projects");
        return Ok(());
    }
    for (i, (project, todo)) in ranked.iter().zip(&todos).enumerate() {
        println!("{}", format_row(i + 1, project, todo));
    }

    Ok(())
}

/// Handle the add command
pub fn handle_add(
    title: String,
    status: String,
    role: Option<String>,
    journal: Option<String>,
    db: &Database,
) -> Result<(), CliError> {
    let status: ProjectStatus = status.parse()?;

    let mut project = NewProject::new(title);
    project.status = status.to_string();
    project.role = role;
    project.journal = journal;

    let id = db.insert_project(&project)?;
    println!("Project created successfully (ID: {})", id);

    Ok(())
}

/// Handle the set-status command
pub fn handle_set_status(id: i64, status: String, db: &Database) -> Result<(), CliError> {
    let status: ProjectStatus = status.parse()?;
    db.update_project_status(id, status.as_str())?;
    println!("Project {} is now {}", id, status);
    Ok(())
}

/// Handle the log command
pub fn handle_log(
    id: i64,
    label: String,
    date: Option<String>,
    db: &mut Database,
) -> Result<(), CliError> {
    let entry = NewLogEntry {
        activity_date: validate_date(date)?,
        label,
    };
    let stored = db.create_log_entry(id, &entry)?;
    println!("Activity logged (entry ID: {})", stored.id);
    Ok(())
}

/// Handle the log-edit command
pub fn handle_log_edit(
    entry_id: i64,
    label: Option<String>,
    date: Option<String>,
    db: &mut Database,
) -> Result<(), CliError> {
    let mut entry = db.get_log_entry(entry_id)?;
    if let Some(label) = label {
        entry.label = label;
    }
    if let Some(date) = validate_date(date)? {
        entry.activity_date = Some(date);
    }
    ProjectService::update_log_entry(db, &entry)?;
    println!("Log entry {} updated", entry_id);
    Ok(())
}

/// Handle the log-delete command
pub fn handle_log_delete(entry_id: i64, db: &mut Database) -> Result<(), CliError> {
    ProjectService::delete_log_entry(db, entry_id)?;
    println!("Log entry {} deleted", entry_id);
    Ok(())
}

/// Report a mutation result. A rejected mutation is not a command failure.
fn report_outcome(outcome: &MutationOutcome, controller: &TodoController) {
    let project_id = outcome.project_id();
    match outcome {
        MutationOutcome::Confirmed { .. } => {
            let pinned = controller.cache().get(project_id).is_pinned;
            if pinned {
                println!("Project {} added to to-do list", project_id);
            } else {
                println!("Project {} removed from to-do list", project_id);
            }
        }
        MutationOutcome::Reverted { .. } => {
            if let Some(message) = outcome.user_message() {
                eprintln!("warning: {}", message);
            }
        }
        MutationOutcome::Superseded { .. } => {
            println!("Update for project {} was superseded", project_id);
        }
    }
}

/// Handle the todo command
pub fn handle_todo(id: i64, config: &Config, db: &mut Database) -> Result<(), CliError> {
    let mut controller = load_controller(config, db, None, None, None)?;
    let project = controller
        .projects()
        .iter()
        .find(|p| p.id == id)
        .cloned()
        .ok_or(CliError::ProjectNotActive(id))?;

    let outcome = controller.toggle_todo(&project, db);
    report_outcome(&outcome, &controller);
    Ok(())
}

/// `--notes ""` clears the notes, omitting the flag keeps them
fn merge_notes(given: Option<String>, current: Option<String>) -> Option<String> {
    match given {
        Some(notes) if notes.trim().is_empty() => None,
        Some(notes) => Some(notes),
        None => current,
    }
}

/// Handle the todo-edit command
pub fn handle_todo_edit(
    id: i64,
    priority: Option<i64>,
    notes: Option<String>,
    config: &Config,
    db: &mut Database,
) -> Result<(), CliError> {
    let mut controller = load_controller(config, db, None, None, None)?;
    let current = controller.cache().get(id);
    let priority = priority.or(current.priority);
    let notes = merge_notes(notes, current.notes);

    let outcome = controller.edit_todo(id, priority, notes, db);
    match &outcome {
        MutationOutcome::Confirmed { .. } => println!("To-do for project {} updated", id),
        _ => report_outcome(&outcome, &controller),
    }
    Ok(())
}

/// Handle the delete command
pub fn handle_delete(id: i64, db: &Database) -> Result<(), CliError> {
    db.delete_project(id)?;
    println!("Project {} deleted", id);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validate_date_accepts_iso_dates() {
        assert_eq!(
            validate_date(Some("2024-02-29".to_string())).unwrap(),
            Some("2024-02-29".to_string())
        );
        assert_eq!(validate_date(None).unwrap(), None);
        assert!(matches!(
            validate_date(Some("29/02/2024".to_string())),
            Err(CliError::DateParseError(_))
        ));
    }

    #[test]
    fn row_shows_pin_priority_and_activity() {
        let project = Project {
            id: 4,
            title: "Survey paper".to_string(),
            status: "writing".to_string(),
            role: None,
            journal: None,
            created_at: "2024-01-01 00:00:00".to_string(),
            logs: vec![crate::models::ActivityLogEntry {
                id: 1,
                project_id: 4,
                activity_date: Some("2024-03-05".to_string()),
                created_at: "2024-03-05 10:00:00".to_string(),
                label: "outline".to_string(),
            }],
        };
        let todo = TodoStatus {
            is_pinned: true,
            marked_at: None,
            priority: Some(2),
            notes: Some("send to coauthors".to_string()),
        };

        let line = format_row(1, &project, &todo);

        assert!(line.contains("★"));
        assert!(line.contains("(priority 2)"));
        assert!(line.contains("last activity 2024-03-05"));
        assert!(line.contains("note: send to coauthors"));
    }

    #[test]
    fn empty_notes_clear_and_missing_notes_keep() {
        let current = Some("draft abstract".to_string());

        assert_eq!(merge_notes(Some(String::new()), current.clone()), None);
        assert_eq!(merge_notes(None, current.clone()), current);
        assert_eq!(
            merge_notes(Some("submit".to_string()), current),
            Some("submit".to_string())
        );
    }

    #[test]
    fn cleared_notes_reach_the_store() {
        let mut db = Database::open_in_memory().unwrap();
        let id = db.insert_project(&NewProject::new("Survey".to_string())).unwrap();
        db.mark_todo(id).unwrap();
        db.update_todo(id, Some(1), Some("old note")).unwrap();

        handle_todo_edit(id, None, Some(String::new()), &Config::default(), &mut db).unwrap();

        let pinned = db.get_pinned_projects().unwrap();
        assert_eq!(pinned[0].status.notes, None);
        assert_eq!(pinned[0].status.priority, Some(1));
    }

    #[test]
    fn archived_filter_is_an_error() {
        let db = Database::open_in_memory().unwrap();
        let result = load_controller(
            &Config::default(),
            &db,
            Some("Archived".to_string()),
            None,
            None,
        );

        assert!(matches!(result, Err(CliError::ArchivedNotListed)));
    }

    #[test]
    fn unknown_filter_status_is_an_error() {
        let db = Database::open_in_memory().unwrap();
        let result = load_controller(&Config::default(), &db, Some("dormant".to_string()), None, None);

        assert!(matches!(result, Err(CliError::InvalidStatus(_))));
    }

    #[test]
    fn cli_parses_todo_edit() {
        let cli = Cli::try_parse_from(["rdesk", "todo-edit", "3", "--priority", "5"]).unwrap();
        match cli.command {
            Some(Commands::TodoEdit { id, priority, notes }) => {
                assert_eq!(id, 3);
                assert_eq!(priority, Some(5));
                assert_eq!(notes, None);
            }
            _ => panic!("expected todo-edit"),
        }
    }
}
