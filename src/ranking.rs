//! Dashboard ordering.
//!
//! Rules, applied in order until one discriminates:
//! 1. pinned projects before everything else
//! 2. between pinned projects, higher to-do priority, then later `marked_at`
//!    (missing or invalid `marked_at` last)
//! 3. lower workflow status priority
//! 4. more recent activity (a project with activity beats one without)
//! 5. more recent creation (unparseable creation dates last)
//!
//! Sorting is stable and never fails on dirty data.

use chrono::{DateTime, Utc};
use std::cmp::Ordering;

use crate::activity::latest_activity;
use crate::models::Project;
use crate::status::status_priority;
use crate::todo_cache::TodoCache;
use crate::utils::{parse_optional_timestamp, parse_timestamp};

/// Everything the comparator looks at, parsed once per project.
#[derive(Debug, Clone, PartialEq, Eq)]
struct RankKey {
    pinned: bool,
    priority: i64,
    marked_at: Option<DateTime<Utc>>,
    status_priority: u32,
    last_activity: Option<DateTime<Utc>>,
    created_at: Option<DateTime<Utc>>,
}

impl RankKey {
    fn new(project: &Project, cache: &TodoCache) -> Self {
        let todo = cache.get(project.id);
        Self {
            pinned: todo.is_pinned,
            priority: todo.priority.unwrap_or(0),
            marked_at: parse_optional_timestamp(todo.marked_at.as_deref()),
            status_priority: status_priority(&project.status),
            last_activity: latest_activity(&project.logs),
            created_at: parse_timestamp(&project.created_at),
        }
    }
}

fn compare_keys(a: &RankKey, b: &RankKey) -> Ordering {
    // `true` sorts after `false`, so compare b to a
    b.pinned
        .cmp(&a.pinned)
        .then_with(|| {
            if a.pinned && b.pinned {
                compare_pinned(a, b)
            } else {
                Ordering::Equal
            }
        })
        .then_with(|| a.status_priority.cmp(&b.status_priority))
        // None < Some, so reversing puts missing dates last
        .then_with(|| b.last_activity.cmp(&a.last_activity))
        .then_with(|| b.created_at.cmp(&a.created_at))
}

fn compare_pinned(a: &RankKey, b: &RankKey) -> Ordering {
    // None < Some, so a missing or unparseable marked_at sorts last
    b.priority
        .cmp(&a.priority)
        .then_with(|| b.marked_at.cmp(&a.marked_at))
}

/// Compare two projects for dashboard order. `Less` means `a` ranks first.
pub fn compare_projects(a: &Project, b: &Project, cache: &TodoCache) -> Ordering {
    compare_keys(&RankKey::new(a, cache), &RankKey::new(b, cache))
}

/// Indices of `projects` in dashboard order
pub fn rank_indices(projects: &[Project], cache: &TodoCache) -> Vec<usize> {
    let keys: Vec<RankKey> = projects.iter().map(|p| RankKey::new(p, cache)).collect();
    let mut order: Vec<usize> = (0..projects.len()).collect();
    // sort_by is stable
    order.sort_by(|&a, &b| compare_keys(&keys[a], &keys[b]));
    order
}

/// Projects in dashboard order
pub fn rank_projects<'a>(projects: &'a [Project], cache: &TodoCache) -> Vec<&'a Project> {
    rank_indices(projects, cache)
        .into_iter()
        .map(|i| &projects[i])
        .collect()
}

/// Remembers the last ranking and recomputes only when the project list or
/// the to-do cache has changed since.
#[derive(Debug, Default)]
pub struct RankingMemo {
    key: Option<(u64, u64)>,
    order: Vec<usize>,
    computations: u64,
}

impl RankingMemo {
    pub fn new() -> Self {
        Self::default()
    }

    /// `projects_generation` must change whenever `projects` does.
    pub fn ranked<'a>(
        &mut self,
        projects: &'a [Project],
        projects_generation: u64,
        cache: &TodoCache,
    ) -> Vec<&'a Project> {
        let key = (projects_generation, cache.generation());
        if self.key != Some(key) || self.order.len() != projects.len() {
            self.order = rank_indices(projects, cache);
            self.key = Some(key);
            self.computations += 1;
        }
        self.order.iter().map(|&i| &projects[i]).collect()
    }

    /// How many times the ranking was actually computed
    pub fn computations(&self) -> u64 {
        self.computations
    }

    pub fn invalidate(&mut self) {
        self.key = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ActivityLogEntry, PinnedProject, TodoStatus};
    use pretty_assertions::assert_eq;

    fn project(id: i64, status: &str, created_at: &str, activity: &[&str]) -> Project {
        Project {
            id,
            title: format!("Project {id}"),
            status: status.to_string(),
            role: None,
            journal: None,
            created_at: created_at.to_string(),
            logs: activity
                .iter()
                .enumerate()
                .map(|(i, date)| ActivityLogEntry {
                    id: id * 100 + i as i64,
                    project_id: id,
                    activity_date: Some(date.to_string()),
                    created_at: "invalid".to_string(),
                    label: "work".to_string(),
                })
                .collect(),
        }
    }

    fn pin(project_id: i64, priority: Option<i64>, marked_at: Option<&str>) -> PinnedProject {
        PinnedProject {
            project_id,
            status: TodoStatus {
                is_pinned: true,
                marked_at: marked_at.map(str::to_string),
                priority,
                notes: None,
            },
        }
    }

    fn ids(ranked: &[&Project]) -> Vec<i64> {
        ranked.iter().map(|p| p.id).collect()
    }

    #[test]
    fn status_is_evaluated_before_recency() {
        let projects = vec![
            project(1, "active", "2023-01-01", &["2024-01-10"]),
            project(2, "active", "2023-01-01", &[]),
            project(3, "completed", "2023-01-01", &["2024-03-01"]),
        ];
        let cache = TodoCache::from_snapshot(vec![pin(2, Some(5), None)]);

        assert_eq!(ids(&rank_projects(&projects, &cache)), vec![2, 1, 3]);
    }

    #[test]
    fn higher_priority_pins_first_without_marked_at() {
        let projects = vec![
            project(1, "active", "2023-01-01", &[]),
            project(2, "active", "2023-01-01", &[]),
        ];
        let cache = TodoCache::from_snapshot(vec![pin(1, Some(0), None), pin(2, Some(5), None)]);

        assert_eq!(ids(&rank_projects(&projects, &cache)), vec![2, 1]);
    }

    #[test]
    fn missing_priority_counts_as_zero() {
        let projects = vec![
            project(1, "active", "2023-01-01", &[]),
            project(2, "active", "2023-01-01", &[]),
        ];
        let cache = TodoCache::from_snapshot(vec![pin(1, None, None), pin(2, Some(-1), None)]);

        assert_eq!(ids(&rank_projects(&projects, &cache)), vec![1, 2]);
    }

    #[test]
    fn later_marked_at_breaks_priority_tie() {
        let projects = vec![
            project(1, "active", "2023-01-01", &[]),
            project(2, "active", "2023-01-01", &[]),
        ];
        let cache = TodoCache::from_snapshot(vec![
            pin(1, Some(2), Some("2024-01-01 10:00:00")),
            pin(2, Some(2), Some("2024-02-01 10:00:00")),
        ]);

        assert_eq!(ids(&rank_projects(&projects, &cache)), vec![2, 1]);
    }

    #[test]
    fn invalid_marked_at_on_both_sides_falls_through() {
        let a = project(1, "active", "2023-01-01", &[]);
        let b = project(2, "writing", "2023-01-01", &[]);
        let cache = TodoCache::from_snapshot(vec![
            pin(1, Some(1), Some("whenever")),
            pin(2, Some(1), None),
        ]);

        assert_eq!(compare_projects(&a, &b, &cache), Ordering::Less);
        assert_eq!(compare_projects(&a, &a, &cache), Ordering::Equal);
    }

    #[test]
    fn valid_marked_at_beats_invalid() {
        let projects = vec![
            project(1, "active", "2023-01-01", &[]),
            project(2, "active", "2023-01-01", &[]),
        ];
        let cache = TodoCache::from_snapshot(vec![
            pin(1, Some(1), Some("whenever")),
            pin(2, Some(1), Some("2020-02-01 10:00:00")),
        ]);

        assert_eq!(ids(&rank_projects(&projects, &cache)), vec![2, 1]);
    }

    #[test]
    fn activity_beats_no_activity() {
        let projects = vec![
            project(1, "writing", "2024-06-01", &[]),
            project(2, "writing", "2020-01-01", &["2021-01-01"]),
        ];
        let cache = TodoCache::new();

        assert_eq!(ids(&rank_projects(&projects, &cache)), vec![2, 1]);
    }

    #[test]
    fn creation_date_is_last_resort() {
        let projects = vec![
            project(1, "planning", "garbage", &[]),
            project(2, "planning", "2022-01-01", &[]),
            project(3, "planning", "2023-01-01", &[]),
        ];
        let cache = TodoCache::new();

        assert_eq!(ids(&rank_projects(&projects, &cache)), vec![3, 2, 1]);
    }

    #[test]
    fn unknown_status_sorts_after_known() {
        let projects = vec![
            project(1, "mystery", "2024-01-01", &["2024-05-01"]),
            project(2, "archived", "2020-01-01", &[]),
        ];
        let cache = TodoCache::new();

        assert_eq!(ids(&rank_projects(&projects, &cache)), vec![2, 1]);
    }

    #[test]
    fn equal_projects_keep_input_order() {
        let projects = vec![
            project(5, "active", "2024-01-01", &[]),
            project(3, "active", "2024-01-01", &[]),
            project(9, "active", "2024-01-01", &[]),
        ];
        let cache = TodoCache::new();

        assert_eq!(ids(&rank_projects(&projects, &cache)), vec![5, 3, 9]);
    }

    #[test]
    fn memo_recomputes_only_on_change() {
        let projects = vec![
            project(1, "active", "2023-01-01", &[]),
            project(2, "active", "2024-01-01", &[]),
        ];
        let mut cache = TodoCache::new();
        let mut memo = RankingMemo::new();

        assert_eq!(ids(&memo.ranked(&projects, 1, &cache)), vec![2, 1]);
        assert_eq!(ids(&memo.ranked(&projects, 1, &cache)), vec![2, 1]);
        assert_eq!(memo.computations(), 1);

        cache.set(1, TodoStatus::pinned_now());
        assert_eq!(ids(&memo.ranked(&projects, 1, &cache)), vec![1, 2]);
        assert_eq!(memo.computations(), 2);

        memo.invalidate();
        memo.ranked(&projects, 1, &cache);
        assert_eq!(memo.computations(), 3);
    }
}
