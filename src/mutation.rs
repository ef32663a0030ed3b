//! Optimistic to-do mutations.
//!
//! A mutation has two phases that straddle the service call: `begin_*`
//! writes the expected value into the cache and hands back a
//! [`PendingMutation`]; [`TodoController::complete`] takes the call's result
//! and either keeps the optimistic value or restores the last known good one.
//!
//! Every mutation gets a sequence number. Only the latest mutation issued for
//! a project may touch the cache when it completes; older ones are reported
//! as [`MutationOutcome::Superseded`].

use std::collections::HashMap;

use crate::models::{Project, ProjectFilter, TodoStatus};
use crate::ranking::RankingMemo;
use crate::service::{ProjectService, ServiceError};
use crate::todo_cache::TodoCache;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MutationKind {
    Pin,
    Unpin,
    Edit {
        priority: Option<i64>,
        notes: Option<String>,
    },
}

/// A mutation whose optimistic value is in the cache and whose service call
/// has not been resolved yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingMutation {
    pub project_id: i64,
    pub seq: u64,
    pub kind: MutationKind,
    pub optimistic: TodoStatus,
}

impl PendingMutation {
    /// Issue the service call this mutation stands for
    pub fn send(&self, service: &mut impl ProjectService) -> Result<(), ServiceError> {
        match &self.kind {
            MutationKind::Pin => service.mark_todo(self.project_id),
            MutationKind::Unpin => service.unmark_todo(self.project_id),
            MutationKind::Edit { priority, notes } => {
                service.update_todo(self.project_id, *priority, notes.clone())
            }
        }
    }
}

#[derive(Debug)]
pub enum MutationOutcome {
    /// The service accepted the latest mutation; the optimistic value stands.
    Confirmed { project_id: i64 },
    /// The service rejected the latest mutation; `restored` is back in the cache.
    Reverted {
        project_id: i64,
        restored: TodoStatus,
        error: ServiceError,
    },
    /// A newer mutation for the same project was issued before this one
    /// completed. The cache was left alone.
    Superseded { project_id: i64, seq: u64 },
}

impl MutationOutcome {
    pub fn project_id(&self) -> i64 {
        match self {
            MutationOutcome::Confirmed { project_id }
            | MutationOutcome::Reverted { project_id, .. }
            | MutationOutcome::Superseded { project_id, .. } => *project_id,
        }
    }

    pub fn is_confirmed(&self) -> bool {
        matches!(self, MutationOutcome::Confirmed { .. })
    }

    /// Notification text for a rejected mutation
    pub fn user_message(&self) -> Option<String> {
        match self {
            MutationOutcome::Reverted {
                project_id, error, ..
            } => Some(format!(
                "Could not update to-do for project {project_id}: {error}"
            )),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
struct InFlight {
    latest_seq: u64,
    /// Last value the server is known to hold for this project.
    baseline: TodoStatus,
}

/// Session state behind the dashboard: the project list, the to-do cache and
/// the bookkeeping for mutations in flight.
#[derive(Debug, Default)]
pub struct TodoController {
    cache: TodoCache,
    projects: Vec<Project>,
    projects_generation: u64,
    filter: ProjectFilter,
    next_seq: u64,
    in_flight: HashMap<i64, InFlight>,
    memo: RankingMemo,
}

impl TodoController {
    pub fn new(cache: TodoCache) -> Self {
        Self {
            cache,
            ..Self::default()
        }
    }

    pub fn with_filter(mut self, filter: ProjectFilter) -> Self {
        self.filter = filter;
        self
    }

    pub fn cache(&self) -> &TodoCache {
        &self.cache
    }

    pub fn projects(&self) -> &[Project] {
        &self.projects
    }

    pub fn filter(&self) -> &ProjectFilter {
        &self.filter
    }

    pub fn set_projects(&mut self, projects: Vec<Project>) {
        self.projects = projects;
        self.projects_generation += 1;
    }

    pub fn get_project_todo_status(&self, project: &Project) -> TodoStatus {
        self.cache.get(project.id)
    }

    pub fn is_in_flight(&self, project_id: i64) -> bool {
        self.in_flight.contains_key(&project_id)
    }

    /// Projects in dashboard order, recomputed only when the project list or
    /// the cache changed since the last call
    pub fn ranked_projects(&mut self) -> Vec<&Project> {
        self.memo
            .ranked(&self.projects, self.projects_generation, &self.cache)
    }

    /// Reload projects and to-do markers from the service.
    ///
    /// Both queries must succeed before anything is replaced. Optimistic
    /// values written before the refresh are dropped, and outstanding
    /// mutations will revert to the refreshed value if they fail.
    pub fn refresh(&mut self, service: &impl ProjectService) -> Result<(), ServiceError> {
        let projects = service.list_active_projects(&self.filter)?;
        let pinned = service.list_pinned_projects()?;
        tracing::debug!(
            projects = projects.len(),
            pinned = pinned.len(),
            "refreshed dashboard"
        );

        self.set_projects(projects);
        self.cache.replace_all(pinned);
        for (project_id, flight) in &mut self.in_flight {
            flight.baseline = self.cache.get(*project_id);
        }
        Ok(())
    }

    fn begin(&mut self, project_id: i64, kind: MutationKind, optimistic: TodoStatus) -> PendingMutation {
        self.next_seq += 1;
        let seq = self.next_seq;
        let current = self.cache.get(project_id);

        self.in_flight
            .entry(project_id)
            .and_modify(|flight| {
                tracing::debug!(project_id, superseded = flight.latest_seq, seq, "superseding mutation");
                flight.latest_seq = seq;
            })
            .or_insert(InFlight {
                latest_seq: seq,
                baseline: current,
            });
        self.cache.set(project_id, optimistic.clone());

        PendingMutation {
            project_id,
            seq,
            kind,
            optimistic,
        }
    }

    pub fn begin_pin(&mut self, project_id: i64) -> PendingMutation {
        self.begin(project_id, MutationKind::Pin, TodoStatus::pinned_now())
    }

    pub fn begin_unpin(&mut self, project_id: i64) -> PendingMutation {
        self.begin(project_id, MutationKind::Unpin, TodoStatus::default())
    }

    /// Pin an unpinned project, unpin a pinned one
    pub fn begin_toggle(&mut self, project: &Project) -> PendingMutation {
        if self.cache.get(project.id).is_pinned {
            self.begin_unpin(project.id)
        } else {
            self.begin_pin(project.id)
        }
    }

    pub fn begin_edit(
        &mut self,
        project_id: i64,
        priority: Option<i64>,
        notes: Option<String>,
    ) -> PendingMutation {
        let optimistic = TodoStatus {
            priority,
            notes: notes.clone(),
            ..self.cache.get(project_id)
        };
        self.begin(project_id, MutationKind::Edit { priority, notes }, optimistic)
    }

    /// Apply the service's answer to a pending mutation.
    ///
    /// On failure of the latest mutation the cache is restored before this
    /// returns.
    pub fn complete(
        &mut self,
        pending: PendingMutation,
        result: Result<(), ServiceError>,
    ) -> MutationOutcome {
        let project_id = pending.project_id;

        let is_latest = match self.in_flight.get_mut(&project_id) {
            Some(flight) if flight.latest_seq == pending.seq => true,
            Some(flight) => {
                if result.is_ok() {
                    // The server took this value even though the cache has moved on.
                    flight.baseline = pending.optimistic;
                }
                false
            }
            None => false,
        };

        if !is_latest {
            tracing::debug!(project_id, seq = pending.seq, "discarding stale completion");
            return MutationOutcome::Superseded {
                project_id,
                seq: pending.seq,
            };
        }

        let Some(flight) = self.in_flight.remove(&project_id) else {
            return MutationOutcome::Superseded {
                project_id,
                seq: pending.seq,
            };
        };

        match result {
            Ok(()) => {
                tracing::info!(project_id, kind = ?pending.kind, "to-do mutation confirmed");
                MutationOutcome::Confirmed { project_id }
            }
            Err(error) => {
                tracing::warn!(project_id, kind = ?pending.kind, %error, "to-do mutation failed, reverting");
                self.cache.set(project_id, flight.baseline.clone());
                MutationOutcome::Reverted {
                    project_id,
                    restored: flight.baseline,
                    error,
                }
            }
        }
    }

    fn run(&mut self, pending: PendingMutation, service: &mut impl ProjectService) -> MutationOutcome {
        let result = pending.send(service);
        let outcome = self.complete(pending, result);
        if outcome.is_confirmed() {
            if let Err(error) = self.refresh(&*service) {
                tracing::warn!(%error, "refresh after to-do mutation failed");
            }
        }
        outcome
    }

    /// Toggle a project's to-do flag against the service, optimistically
    pub fn toggle_todo(&mut self, project: &Project, service: &mut impl ProjectService) -> MutationOutcome {
        let pending = self.begin_toggle(project);
        self.run(pending, service)
    }

    /// Change priority and notes of a pinned project, optimistically
    pub fn edit_todo(
        &mut self,
        project_id: i64,
        priority: Option<i64>,
        notes: Option<String>,
        service: &mut impl ProjectService,
    ) -> MutationOutcome {
        let pending = self.begin_edit(project_id, priority, notes);
        self.run(pending, service)
    }
}
