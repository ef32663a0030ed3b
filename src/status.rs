//! Workflow statuses and their ranking weight.
//!
//! Lower priority values sort first on the dashboard. Status text comes from
//! the store unvalidated, so anything unrecognized maps to
//! [`UNKNOWN_STATUS_PRIORITY`] instead of failing.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Priority for status values outside the known workflow.
pub const UNKNOWN_STATUS_PRIORITY: u32 = 99;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProjectStatus {
    Active,
    Writing,
    Revision,
    Submitted,
    Planning,
    OnHold,
    Completed,
    Published,
    Archived,
}

impl ProjectStatus {
    pub const ALL: [ProjectStatus; 9] = [
        ProjectStatus::Active,
        ProjectStatus::Writing,
        ProjectStatus::Revision,
        ProjectStatus::Submitted,
        ProjectStatus::Planning,
        ProjectStatus::OnHold,
        ProjectStatus::Completed,
        ProjectStatus::Published,
        ProjectStatus::Archived,
    ];

    pub fn priority(self) -> u32 {
        match self {
            ProjectStatus::Active => 0,
            ProjectStatus::Writing => 1,
            ProjectStatus::Revision => 2,
            ProjectStatus::Submitted => 3,
            ProjectStatus::Planning => 4,
            ProjectStatus::OnHold => 5,
            ProjectStatus::Completed => 6,
            ProjectStatus::Published => 7,
            ProjectStatus::Archived => 8,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ProjectStatus::Active => "active",
            ProjectStatus::Writing => "writing",
            ProjectStatus::Revision => "revision",
            ProjectStatus::Submitted => "submitted",
            ProjectStatus::Planning => "planning",
            ProjectStatus::OnHold => "on_hold",
            ProjectStatus::Completed => "completed",
            ProjectStatus::Published => "published",
            ProjectStatus::Archived => "archived",
        }
    }
}

impl fmt::Display for ProjectStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown project status: {0}")]
pub struct UnknownStatus(pub String);

impl FromStr for ProjectStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace(['-', ' '], "_");
        ProjectStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == normalized)
            .ok_or_else(|| UnknownStatus(s.to_string()))
    }
}

/// Ranking weight for raw status text
pub fn status_priority(status: &str) -> u32 {
    status
        .parse::<ProjectStatus>()
        .map(ProjectStatus::priority)
        .unwrap_or(UNKNOWN_STATUS_PRIORITY)
}
