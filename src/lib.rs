pub mod activity;
pub mod cli;
pub mod config;
pub mod database;
pub mod logging;
pub mod models;
pub mod mutation;
pub mod ranking;
pub mod service;
pub mod status;
pub mod todo_cache;
pub mod utils;

pub use config::Config;
pub use database::Database;
pub use models::{ActivityLogEntry, PinnedProject, Project, TodoStatus};
pub use mutation::{MutationOutcome, PendingMutation, TodoController};
pub use service::{ProjectService, ServiceError};
pub use todo_cache::TodoCache;
pub use utils::Profile;
