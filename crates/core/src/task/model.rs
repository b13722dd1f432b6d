//! Task model definitions

use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::Error;
use crate::Result;

const TITLE_MAX_CHARS: usize = 200;
const DESCRIPTION_MAX_CHARS: usize = 1000;

/// Fixed category universe a task can belong to
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskCategory {
    Work,
    Personal,
    Study,
    Health,
    Finance,
    Shopping,
    Other,
}

impl TaskCategory {
    /// Every category, in the canonical display order.
    pub const ALL: [TaskCategory; 7] = [
        TaskCategory::Work,
        TaskCategory::Personal,
        TaskCategory::Study,
        TaskCategory::Health,
        TaskCategory::Finance,
        TaskCategory::Shopping,
        TaskCategory::Other,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TaskCategory::Work => "work",
            TaskCategory::Personal => "personal",
            TaskCategory::Study => "study",
            TaskCategory::Health => "health",
            TaskCategory::Finance => "finance",
            TaskCategory::Shopping => "shopping",
            TaskCategory::Other => "other",
        }
    }

    /// Human-readable name for list headers and summaries.
    pub fn display_name(&self) -> &'static str {
        match self {
            TaskCategory::Work => "Work",
            TaskCategory::Personal => "Personal",
            TaskCategory::Study => "Study",
            TaskCategory::Health => "Health",
            TaskCategory::Finance => "Finance",
            TaskCategory::Shopping => "Shopping",
            TaskCategory::Other => "Other",
        }
    }
}

impl Default for TaskCategory {
    fn default() -> Self {
        Self::Other
    }
}

impl FromStr for TaskCategory {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "work" => Ok(TaskCategory::Work),
            "personal" => Ok(TaskCategory::Personal),
            "study" => Ok(TaskCategory::Study),
            "health" => Ok(TaskCategory::Health),
            "finance" => Ok(TaskCategory::Finance),
            "shopping" => Ok(TaskCategory::Shopping),
            "other" => Ok(TaskCategory::Other),
            other => Err(Error::Validation(format!("Unknown category: {}", other))),
        }
    }
}

/// Task progress state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TaskStatus {
    Pending,
    InProgress,
    Completed,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Pending => "pending",
            TaskStatus::InProgress => "in-progress",
            TaskStatus::Completed => "completed",
        }
    }
}

impl Default for TaskStatus {
    fn default() -> Self {
        Self::Pending
    }
}

impl FromStr for TaskStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "pending" => Ok(TaskStatus::Pending),
            "in-progress" => Ok(TaskStatus::InProgress),
            "completed" => Ok(TaskStatus::Completed),
            other => Err(Error::Validation(format!("Unknown status: {}", other))),
        }
    }
}

/// Task priority level
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskPriority {
    Low,
    Medium,
    High,
}

impl TaskPriority {
    /// Semantic sort weight: high outranks medium outranks low.
    pub fn rank(&self) -> u8 {
        match self {
            TaskPriority::High => 0,
            TaskPriority::Medium => 1,
            TaskPriority::Low => 2,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TaskPriority::Low => "low",
            TaskPriority::Medium => "medium",
            TaskPriority::High => "high",
        }
    }
}

impl Default for TaskPriority {
    fn default() -> Self {
        Self::Medium
    }
}

impl FromStr for TaskPriority {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "low" => Ok(TaskPriority::Low),
            "medium" => Ok(TaskPriority::Medium),
            "high" => Ok(TaskPriority::High),
            other => Err(Error::Validation(format!("Unknown priority: {}", other))),
        }
    }
}

/// A task record with validated fields and derived scheduling state.
///
/// Stored fields serialize in camelCase with ISO-8601 timestamps; the
/// derived accessors (`is_completed`, `is_overdue`, `days_until_due`) are
/// computed on read and never persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub owner_id: Uuid,
    pub assignee_id: Option<Uuid>,
    pub category: TaskCategory,
    pub status: TaskStatus,
    pub priority: TaskPriority,
    pub tags: Vec<String>,
    pub due_date: Option<DateTime<Utc>>,
    pub estimated_hours: f64,
    pub time_spent: f64,
    pub notes: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Task {
    /// Build a validated task from a creation request.
    pub fn new(request: CreateTaskRequest) -> Result<Self> {
        let title = validate_title(&request.title)?;
        let description = match request.description.as_deref() {
            Some(description) => validate_description(description)?,
            None => String::new(),
        };
        let estimated_hours = match request.estimated_hours {
            Some(hours) => validate_hours("Estimated hours", hours)?,
            None => 0.0,
        };

        let mut tags = Vec::new();
        for tag in &request.tags {
            let tag = validate_tag(tag)?;
            if !tags.contains(&tag) {
                tags.push(tag);
            }
        }

        let now = Utc::now();
        Ok(Self {
            id: Uuid::new_v4(),
            title,
            description,
            owner_id: request.owner_id,
            assignee_id: request.assignee_id,
            category: request.category.unwrap_or_default(),
            status: TaskStatus::default(),
            priority: request.priority.unwrap_or_default(),
            tags,
            due_date: request.due_date,
            estimated_hours,
            time_spent: 0.0,
            notes: Vec::new(),
            created_at: now,
            updated_at: now,
        })
    }

    pub fn is_completed(&self) -> bool {
        self.status == TaskStatus::Completed
    }

    /// Whether the due date has passed on a task that is not completed.
    pub fn is_overdue(&self) -> bool {
        match self.due_date {
            Some(due) => due < Utc::now() && !self.is_completed(),
            None => false,
        }
    }

    /// Whole days from now until the due date, truncated toward zero.
    /// Negative once the due date has passed; `None` without a due date.
    pub fn days_until_due(&self) -> Option<i64> {
        self.due_date
            .map(|due| due.signed_duration_since(Utc::now()).num_days())
    }

    pub fn rename(&mut self, title: &str) -> Result<()> {
        self.title = validate_title(title)?;
        self.touch();
        Ok(())
    }

    pub fn set_description(&mut self, description: &str) -> Result<()> {
        self.description = validate_description(description)?;
        self.touch();
        Ok(())
    }

    pub fn set_category(&mut self, category: TaskCategory) {
        self.category = category;
        self.touch();
    }

    pub fn set_priority(&mut self, priority: TaskPriority) {
        self.priority = priority;
        self.touch();
    }

    pub fn set_status(&mut self, status: TaskStatus) {
        self.status = status;
        self.touch();
    }

    pub fn set_due_date(&mut self, due_date: Option<DateTime<Utc>>) {
        self.due_date = due_date;
        self.touch();
    }

    pub fn assign_to(&mut self, assignee_id: Option<Uuid>) {
        self.assignee_id = assignee_id;
        self.touch();
    }

    pub fn set_estimated_hours(&mut self, hours: f64) -> Result<()> {
        self.estimated_hours = validate_hours("Estimated hours", hours)?;
        self.touch();
        Ok(())
    }

    /// Add to the time-spent accumulator.
    pub fn add_time_spent(&mut self, hours: f64) -> Result<()> {
        self.time_spent += validate_hours("Time spent", hours)?;
        self.touch();
        Ok(())
    }

    /// Add a tag; duplicates are ignored.
    pub fn add_tag(&mut self, tag: &str) -> Result<()> {
        let tag = validate_tag(tag)?;
        if !self.tags.contains(&tag) {
            self.tags.push(tag);
        }
        self.touch();
        Ok(())
    }

    /// Remove a tag if present.
    pub fn remove_tag(&mut self, tag: &str) {
        let needle = tag.trim();
        self.tags.retain(|existing| existing != needle);
        self.touch();
    }

    /// Append an entry to the notes log.
    pub fn add_note(&mut self, note: &str) -> Result<()> {
        let note = note.trim();
        if note.is_empty() {
            return Err(Error::Validation("Note cannot be empty".to_string()));
        }
        self.notes.push(note.to_string());
        self.touch();
        Ok(())
    }

    /// Apply one update operation.
    pub fn apply(&mut self, change: &TaskChange) -> Result<()> {
        match change {
            TaskChange::Title(title) => self.rename(title),
            TaskChange::Description(description) => self.set_description(description),
            TaskChange::Category(category) => {
                self.set_category(*category);
                Ok(())
            }
            TaskChange::Priority(priority) => {
                self.set_priority(*priority);
                Ok(())
            }
            TaskChange::Status(status) => {
                self.set_status(*status);
                Ok(())
            }
            TaskChange::DueDate(due_date) => {
                self.set_due_date(*due_date);
                Ok(())
            }
            TaskChange::Assignee(assignee_id) => {
                self.assign_to(*assignee_id);
                Ok(())
            }
            TaskChange::EstimatedHours(hours) => self.set_estimated_hours(*hours),
            TaskChange::AddTimeSpent(hours) => self.add_time_spent(*hours),
            TaskChange::AddTag(tag) => self.add_tag(tag),
            TaskChange::RemoveTag(tag) => {
                self.remove_tag(tag);
                Ok(())
            }
            TaskChange::Note(note) => self.add_note(note),
        }
    }

    /// Check that a deserialized snapshot still holds valid field values.
    pub fn validate(&self) -> Result<()> {
        if self.title.trim().is_empty() {
            return Err(Error::Validation("Task title cannot be empty".to_string()));
        }
        if self.title.chars().count() > TITLE_MAX_CHARS {
            return Err(Error::Validation(format!(
                "Task title cannot exceed {} characters",
                TITLE_MAX_CHARS
            )));
        }
        if self.description.chars().count() > DESCRIPTION_MAX_CHARS {
            return Err(Error::Validation(format!(
                "Task description cannot exceed {} characters",
                DESCRIPTION_MAX_CHARS
            )));
        }
        validate_hours("Estimated hours", self.estimated_hours)?;
        validate_hours("Time spent", self.time_spent)?;
        if self.updated_at < self.created_at {
            return Err(Error::Validation(
                "Task updatedAt cannot precede createdAt".to_string(),
            ));
        }
        Ok(())
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

/// Request payload for creating a task
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateTaskRequest {
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    pub owner_id: Uuid,
    #[serde(default)]
    pub assignee_id: Option<Uuid>,
    #[serde(default)]
    pub category: Option<TaskCategory>,
    #[serde(default)]
    pub priority: Option<TaskPriority>,
    #[serde(default)]
    pub due_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub estimated_hours: Option<f64>,
    #[serde(default)]
    pub tags: Vec<String>,
}

impl CreateTaskRequest {
    pub fn new(title: impl Into<String>, owner_id: Uuid) -> Self {
        Self {
            title: title.into(),
            description: None,
            owner_id,
            assignee_id: None,
            category: None,
            priority: None,
            due_date: None,
            estimated_hours: None,
            tags: Vec::new(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_assignee(mut self, assignee_id: Uuid) -> Self {
        self.assignee_id = Some(assignee_id);
        self
    }

    pub fn with_category(mut self, category: TaskCategory) -> Self {
        self.category = Some(category);
        self
    }

    pub fn with_priority(mut self, priority: TaskPriority) -> Self {
        self.priority = Some(priority);
        self
    }

    pub fn with_due_date(mut self, due_date: DateTime<Utc>) -> Self {
        self.due_date = Some(due_date);
        self
    }

    pub fn with_estimated_hours(mut self, hours: f64) -> Self {
        self.estimated_hours = Some(hours);
        self
    }

    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.push(tag.into());
        self
    }
}

/// One field-level update operation applied through the repository.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "op", content = "value", rename_all = "camelCase")]
pub enum TaskChange {
    Title(String),
    Description(String),
    Category(TaskCategory),
    Priority(TaskPriority),
    Status(TaskStatus),
    DueDate(Option<DateTime<Utc>>),
    Assignee(Option<Uuid>),
    EstimatedHours(f64),
    AddTimeSpent(f64),
    AddTag(String),
    RemoveTag(String),
    Note(String),
}

fn validate_title(title: &str) -> Result<String> {
    let title = title.trim();
    if title.is_empty() {
        return Err(Error::Validation("Task title cannot be empty".to_string()));
    }
    if title.chars().count() > TITLE_MAX_CHARS {
        return Err(Error::Validation(format!(
            "Task title cannot exceed {} characters",
            TITLE_MAX_CHARS
        )));
    }
    Ok(title.to_string())
}

fn validate_description(description: &str) -> Result<String> {
    let description = description.trim();
    if description.chars().count() > DESCRIPTION_MAX_CHARS {
        return Err(Error::Validation(format!(
            "Task description cannot exceed {} characters",
            DESCRIPTION_MAX_CHARS
        )));
    }
    Ok(description.to_string())
}

fn validate_hours(label: &str, hours: f64) -> Result<f64> {
    if !hours.is_finite() || hours < 0.0 {
        return Err(Error::Validation(format!(
            "{} must be a non-negative number",
            label
        )));
    }
    Ok(hours)
}

fn validate_tag(tag: &str) -> Result<String> {
    let tag = tag.trim();
    if tag.is_empty() {
        return Err(Error::Validation("Tag cannot be empty".to_string()));
    }
    Ok(tag.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use serde_json::json;

    fn create_task(title: &str) -> Task {
        Task::new(CreateTaskRequest::new(title, Uuid::new_v4())).unwrap()
    }

    #[test]
    fn test_create_task_defaults() {
        let owner = Uuid::new_v4();
        let task = Task::new(CreateTaskRequest::new("Write report", owner)).unwrap();

        assert_eq!(task.title, "Write report");
        assert_eq!(task.description, "");
        assert_eq!(task.owner_id, owner);
        assert!(task.assignee_id.is_none());
        assert_eq!(task.category, TaskCategory::Other);
        assert_eq!(task.status, TaskStatus::Pending);
        assert_eq!(task.priority, TaskPriority::Medium);
        assert!(task.tags.is_empty());
        assert!(task.due_date.is_none());
        assert_eq!(task.estimated_hours, 0.0);
        assert_eq!(task.time_spent, 0.0);
        assert!(task.notes.is_empty());
        assert!(task.updated_at >= task.created_at);
    }

    #[test]
    fn test_create_task_trims_title_and_rejects_blank() {
        let task = create_task("  Buy milk  ");
        assert_eq!(task.title, "Buy milk");

        let result = Task::new(CreateTaskRequest::new("   ", Uuid::new_v4()));
        assert!(matches!(result, Err(Error::Validation(_))));
    }

    #[test]
    fn test_create_task_rejects_oversized_fields() {
        let long_title = "x".repeat(201);
        let result = Task::new(CreateTaskRequest::new(long_title, Uuid::new_v4()));
        assert!(matches!(result, Err(Error::Validation(_))));

        let long_description = "y".repeat(1001);
        let result = Task::new(
            CreateTaskRequest::new("Valid", Uuid::new_v4()).with_description(long_description),
        );
        assert!(matches!(result, Err(Error::Validation(_))));
    }

    #[test]
    fn test_create_task_with_builders() {
        let assignee = Uuid::new_v4();
        let due = Utc::now() + Duration::days(7);
        let task = Task::new(
            CreateTaskRequest::new("Plan sprint", Uuid::new_v4())
                .with_description("Quarterly planning")
                .with_category(TaskCategory::Work)
                .with_priority(TaskPriority::High)
                .with_assignee(assignee)
                .with_due_date(due)
                .with_estimated_hours(4.5)
                .with_tag("planning")
                .with_tag("planning"),
        )
        .unwrap();

        assert_eq!(task.description, "Quarterly planning");
        assert_eq!(task.category, TaskCategory::Work);
        assert_eq!(task.priority, TaskPriority::High);
        assert_eq!(task.assignee_id, Some(assignee));
        assert_eq!(task.due_date, Some(due));
        assert_eq!(task.estimated_hours, 4.5);
        assert_eq!(task.tags, vec!["planning"]);
    }

    #[test]
    fn test_tag_set_semantics() {
        let mut task = create_task("Tags");

        task.add_tag("urgent").unwrap();
        task.add_tag(" urgent ").unwrap();
        task.add_tag("review").unwrap();
        assert_eq!(task.tags, vec!["urgent", "review"]);

        task.remove_tag("urgent");
        assert_eq!(task.tags, vec!["review"]);

        let result = task.add_tag("   ");
        assert!(matches!(result, Err(Error::Validation(_))));
    }

    #[test]
    fn test_time_spent_accumulates_and_rejects_negative() {
        let mut task = create_task("Time");

        task.add_time_spent(1.5).unwrap();
        task.add_time_spent(2.0).unwrap();
        assert_eq!(task.time_spent, 3.5);

        let result = task.add_time_spent(-1.0);
        assert!(matches!(result, Err(Error::Validation(_))));
        assert_eq!(task.time_spent, 3.5);
    }

    #[test]
    fn test_overdue_requires_past_due_date_and_open_status() {
        let mut task = create_task("Overdue");
        assert!(!task.is_overdue());

        task.set_due_date(Some(Utc::now() - Duration::hours(2)));
        assert!(task.is_overdue());

        task.set_status(TaskStatus::Completed);
        assert!(task.is_completed());
        assert!(!task.is_overdue());
    }

    #[test]
    fn test_days_until_due_truncates_toward_zero() {
        let mut task = create_task("Due");
        assert!(task.days_until_due().is_none());

        task.set_due_date(Some(Utc::now() + Duration::days(3) + Duration::hours(1)));
        assert_eq!(task.days_until_due(), Some(3));

        task.set_due_date(Some(Utc::now() - Duration::hours(36)));
        assert_eq!(task.days_until_due(), Some(-1));
    }

    #[test]
    fn test_mutations_refresh_updated_at() {
        let mut task = create_task("Touch");
        let initial = task.updated_at;

        task.set_priority(TaskPriority::High);
        assert!(task.updated_at >= initial);
        assert!(task.updated_at >= task.created_at);
    }

    #[test]
    fn test_rename_failure_leaves_title_unchanged() {
        let mut task = create_task("Keep me");

        let result = task.rename("   ");
        assert!(matches!(result, Err(Error::Validation(_))));
        assert_eq!(task.title, "Keep me");
    }

    #[test]
    fn test_notes_append_in_order() {
        let mut task = create_task("Notes");

        task.add_note("first").unwrap();
        task.add_note("second").unwrap();
        assert_eq!(task.notes, vec!["first", "second"]);

        let result = task.add_note("  ");
        assert!(matches!(result, Err(Error::Validation(_))));
    }

    #[test]
    fn test_apply_dispatches_field_operations() {
        let mut task = create_task("Apply");

        task.apply(&TaskChange::Title("Renamed".to_string())).unwrap();
        task.apply(&TaskChange::Status(TaskStatus::InProgress)).unwrap();
        task.apply(&TaskChange::AddTimeSpent(2.0)).unwrap();
        task.apply(&TaskChange::AddTag("ops".to_string())).unwrap();

        assert_eq!(task.title, "Renamed");
        assert_eq!(task.status, TaskStatus::InProgress);
        assert_eq!(task.time_spent, 2.0);
        assert_eq!(task.tags, vec!["ops"]);
    }

    #[test]
    fn test_task_serializes_camel_case_without_derived_fields() {
        let task = create_task("Wire shape");
        let value = serde_json::to_value(&task).unwrap();

        assert!(value.get("ownerId").is_some());
        assert!(value.get("createdAt").is_some());
        assert!(value.get("estimatedHours").is_some());
        assert!(value.get("owner_id").is_none());
        assert!(value.get("isOverdue").is_none());
        assert!(value.get("daysUntilDue").is_none());
    }

    #[test]
    fn test_status_serializes_kebab_case() {
        assert_eq!(
            serde_json::to_value(TaskStatus::InProgress).unwrap(),
            json!("in-progress")
        );
        assert_eq!(
            serde_json::from_value::<TaskStatus>(json!("in-progress")).unwrap(),
            TaskStatus::InProgress
        );
    }

    #[test]
    fn test_category_parsing_and_universe_order() {
        assert_eq!(
            " Work ".parse::<TaskCategory>().unwrap(),
            TaskCategory::Work
        );
        assert!("errands".parse::<TaskCategory>().is_err());
        assert_eq!(TaskCategory::ALL[0], TaskCategory::Work);
        assert_eq!(TaskCategory::ALL[6], TaskCategory::Other);
        assert_eq!(TaskCategory::Shopping.display_name(), "Shopping");
    }

    #[test]
    fn test_priority_rank_orders_semantically() {
        assert!(TaskPriority::High.rank() < TaskPriority::Medium.rank());
        assert!(TaskPriority::Medium.rank() < TaskPriority::Low.rank());
    }

    #[test]
    fn test_validate_flags_corrupt_snapshot() {
        let mut task = create_task("Valid");
        assert!(task.validate().is_ok());

        task.title = "  ".to_string();
        assert!(matches!(task.validate(), Err(Error::Validation(_))));

        let mut task = create_task("Valid");
        task.time_spent = -4.0;
        assert!(matches!(task.validate(), Err(Error::Validation(_))));
    }
}
