//! In-memory task repository backed by a versioned store

use std::cmp::Ordering;
use std::collections::BTreeMap;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, warn};
use uuid::Uuid;

use crate::storage::{LoadReport, SkippedRecord, VersionedStore};
use crate::Result;

use super::model::{CreateTaskRequest, Task, TaskCategory, TaskChange, TaskPriority, TaskStatus};

/// Entity slot the task collection persists under.
const TASKS_SLOT: &str = "tasks";

/// Optional constraints combined with logical AND by [`TaskRepository::filter`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskFilter {
    pub priority: Option<TaskPriority>,
    pub status: Option<TaskStatus>,
    pub category: Option<TaskCategory>,
    pub owner_id: Option<Uuid>,
    pub assignee_id: Option<Uuid>,
    pub is_completed: Option<bool>,
}

impl TaskFilter {
    fn matches(&self, task: &Task) -> bool {
        if let Some(priority) = self.priority {
            if task.priority != priority {
                return false;
            }
        }
        if let Some(status) = self.status {
            if task.status != status {
                return false;
            }
        }
        if let Some(category) = self.category {
            if task.category != category {
                return false;
            }
        }
        if let Some(owner_id) = self.owner_id {
            if task.owner_id != owner_id {
                return false;
            }
        }
        if let Some(assignee_id) = self.assignee_id {
            if task.assignee_id != Some(assignee_id) {
                return false;
            }
        }
        if let Some(is_completed) = self.is_completed {
            if task.is_completed() != is_completed {
                return false;
            }
        }
        true
    }
}

/// Field a task list can be ordered by
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SortField {
    Title,
    DueDate,
    CreatedAt,
    Priority,
}

/// Sort direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    Asc,
    Desc,
}

/// Aggregate counts over a task collection
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskStats {
    pub total: usize,
    pub completed: usize,
    pub pending: usize,
    pub by_category: BTreeMap<TaskCategory, usize>,
    pub by_priority: BTreeMap<TaskPriority, usize>,
}

/// Per-category rollup
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryStats {
    pub total: usize,
    pub completed: usize,
}

/// One entry of the category usage ranking
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryCount {
    pub category: TaskCategory,
    pub count: usize,
}

/// In-memory task collection with indexed lookups.
///
/// The whole collection is read from its entity slot at construction and
/// written back after every mutation. Lookups clone records out; the
/// repository keeps exclusive ownership of the stored instances.
pub struct TaskRepository {
    store: VersionedStore,
    tasks: IndexMap<Uuid, Task>,
    load_report: LoadReport,
}

impl TaskRepository {
    /// Load the persisted collection eagerly. Records that fail to
    /// deserialize or validate are skipped, logged, and reported through
    /// [`TaskRepository::load_report`].
    pub fn new(store: VersionedStore) -> Self {
        let snapshots: Vec<serde_json::Value> = store.load(TASKS_SLOT, Vec::new());

        let mut tasks = IndexMap::new();
        let mut skipped = Vec::new();

        for (index, snapshot) in snapshots.into_iter().enumerate() {
            let task: Task = match serde_json::from_value(snapshot) {
                Ok(task) => task,
                Err(e) => {
                    warn!("Skipping task record {}: {}", index, e);
                    skipped.push(SkippedRecord {
                        index,
                        reason: e.to_string(),
                    });
                    continue;
                }
            };
            if let Err(e) = task.validate() {
                warn!("Skipping invalid task record {}: {}", index, e);
                skipped.push(SkippedRecord {
                    index,
                    reason: e.to_string(),
                });
                continue;
            }
            tasks.insert(task.id, task);
        }

        let load_report = LoadReport {
            loaded: tasks.len(),
            skipped,
        };
        debug!(
            "Loaded {} tasks ({} skipped)",
            load_report.loaded,
            load_report.skipped.len()
        );

        Self {
            store,
            tasks,
            load_report,
        }
    }

    /// Outcome of the eager load performed at construction.
    pub fn load_report(&self) -> &LoadReport {
        &self.load_report
    }

    /// Create a validated task and persist the collection.
    pub fn create(&mut self, request: CreateTaskRequest) -> Result<Task> {
        let task = match Task::new(request) {
            Ok(task) => task,
            Err(e) => {
                error!("Failed to create task: {}", e);
                return Err(e);
            }
        };

        self.tasks.insert(task.id, task.clone());
        self.persist();
        debug!("Created task {}", task.id);
        Ok(task)
    }

    pub fn find_by_id(&self, id: Uuid) -> Option<Task> {
        self.tasks.get(&id).cloned()
    }

    /// All tasks in insertion order.
    pub fn find_all(&self) -> Vec<Task> {
        self.tasks.values().cloned().collect()
    }

    pub fn find_by_owner(&self, owner_id: Uuid) -> Vec<Task> {
        self.find_where(|task| task.owner_id == owner_id)
    }

    pub fn find_by_assignee(&self, assignee_id: Uuid) -> Vec<Task> {
        self.find_where(|task| task.assignee_id == Some(assignee_id))
    }

    pub fn find_by_category(&self, category: TaskCategory) -> Vec<Task> {
        self.find_where(|task| task.category == category)
    }

    pub fn find_by_status(&self, status: TaskStatus) -> Vec<Task> {
        self.find_where(|task| task.status == status)
    }

    pub fn find_by_priority(&self, priority: TaskPriority) -> Vec<Task> {
        self.find_where(|task| task.priority == priority)
    }

    pub fn find_by_tag(&self, tag: &str) -> Vec<Task> {
        self.find_where(|task| task.tags.iter().any(|existing| existing == tag))
    }

    /// Tasks whose due date has passed and which are not completed.
    pub fn find_overdue(&self) -> Vec<Task> {
        self.find_where(|task| task.is_overdue())
    }

    /// Open tasks due within the next `within_days` days.
    pub fn find_due_soon(&self, within_days: i64) -> Vec<Task> {
        self.find_where(|task| match task.days_until_due() {
            Some(days) => (0..=within_days).contains(&days) && !task.is_completed(),
            None => false,
        })
    }

    /// Tasks satisfying every supplied constraint.
    pub fn filter(&self, criteria: &TaskFilter) -> Vec<Task> {
        self.find_where(|task| criteria.matches(task))
    }

    /// Case-insensitive substring match over title or description.
    pub fn search(&self, query: &str) -> Vec<Task> {
        let needle = query.to_lowercase();
        self.find_where(|task| {
            task.title.to_lowercase().contains(&needle)
                || task.description.to_lowercase().contains(&needle)
        })
    }

    /// Stable sort over an already-fetched list. Unset due dates sort last
    /// in ascending order; priority uses its semantic weight rather than
    /// the alphabetic order of its name. `Desc` reverses the comparator
    /// result, so ties keep their relative order in both directions.
    pub fn sort(
        &self,
        mut tasks: Vec<Task>,
        field: SortField,
        direction: SortDirection,
    ) -> Vec<Task> {
        tasks.sort_by(|a, b| {
            let ordering = match field {
                SortField::Title => a.title.cmp(&b.title),
                SortField::DueDate => match (a.due_date, b.due_date) {
                    (Some(a_due), Some(b_due)) => a_due.cmp(&b_due),
                    (Some(_), None) => Ordering::Less,
                    (None, Some(_)) => Ordering::Greater,
                    (None, None) => Ordering::Equal,
                },
                SortField::CreatedAt => a.created_at.cmp(&b.created_at),
                SortField::Priority => a.priority.rank().cmp(&b.priority.rank()),
            };
            match direction {
                SortDirection::Asc => ordering,
                SortDirection::Desc => ordering.reverse(),
            }
        });
        tasks
    }

    /// Apply a batch of field operations to one task.
    ///
    /// An unknown id returns `Ok(None)` without touching storage. Changes
    /// are applied to a working copy; the first failure aborts the whole
    /// batch and the stored record keeps its previous state.
    pub fn update(&mut self, id: Uuid, changes: &[TaskChange]) -> Result<Option<Task>> {
        let Some(current) = self.tasks.get(&id) else {
            return Ok(None);
        };

        let mut next = current.clone();
        for change in changes {
            if let Err(e) = next.apply(change) {
                error!("Failed to update task {}: {}", id, e);
                return Err(e);
            }
        }

        self.tasks.insert(id, next.clone());
        self.persist();
        debug!("Updated task {}", id);
        Ok(Some(next))
    }

    /// Remove a task. Returns whether it existed.
    pub fn delete(&mut self, id: Uuid) -> bool {
        if self.tasks.shift_remove(&id).is_none() {
            return false;
        }
        self.persist();
        debug!("Deleted task {}", id);
        true
    }

    /// Drop every task and persist the empty collection.
    pub fn clear_all(&mut self) -> bool {
        self.tasks.clear();
        self.persist();
        true
    }

    /// Aggregate counts, over the whole collection or one owner's share.
    pub fn stats(&self, owner: Option<Uuid>) -> TaskStats {
        let mut stats = TaskStats::default();

        for task in self.scoped(owner) {
            stats.total += 1;
            if task.is_completed() {
                stats.completed += 1;
            }
            *stats.by_category.entry(task.category).or_insert(0) += 1;
            *stats.by_priority.entry(task.priority).or_insert(0) += 1;
        }

        stats.pending = stats.total - stats.completed;
        stats
    }

    /// Per-category totals over the fixed category universe, zero-filled.
    pub fn category_stats(&self, owner: Option<Uuid>) -> BTreeMap<TaskCategory, CategoryStats> {
        let mut stats: BTreeMap<TaskCategory, CategoryStats> = TaskCategory::ALL
            .iter()
            .map(|category| (*category, CategoryStats::default()))
            .collect();

        for task in self.scoped(owner) {
            if let Some(entry) = stats.get_mut(&task.category) {
                entry.total += 1;
                if task.is_completed() {
                    entry.completed += 1;
                }
            }
        }

        stats
    }

    /// Categories ranked by task count, ties keeping the universe order.
    pub fn most_used_categories(&self, owner: Option<Uuid>, limit: usize) -> Vec<CategoryCount> {
        let mut counts: Vec<CategoryCount> = TaskCategory::ALL
            .iter()
            .map(|category| CategoryCount {
                category: *category,
                count: 0,
            })
            .collect();

        for task in self.scoped(owner) {
            if let Some(entry) = counts
                .iter_mut()
                .find(|entry| entry.category == task.category)
            {
                entry.count += 1;
            }
        }

        counts.sort_by(|a, b| b.count.cmp(&a.count));
        counts.truncate(limit);
        counts
    }

    fn find_where(&self, predicate: impl Fn(&Task) -> bool) -> Vec<Task> {
        self.tasks
            .values()
            .filter(|task| predicate(task))
            .cloned()
            .collect()
    }

    fn scoped(&self, owner: Option<Uuid>) -> impl Iterator<Item = &Task> {
        self.tasks
            .values()
            .filter(move |task| owner.map(|owner| task.owner_id == owner).unwrap_or(true))
    }

    fn persist(&self) {
        let snapshot: Vec<&Task> = self.tasks.values().collect();
        if !self.store.save(TASKS_SLOT, &snapshot) {
            warn!("Task collection not persisted; keeping in-memory state");
        }
    }
}
