use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::query::{DateRange, Sort, SortDirection, SortField, SortKey};
use super::record::{Record, RecordFilter};
use super::time::parse_instant;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    InProgress,
    Completed,
    Cancelled,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "in_progress" => Some(Self::InProgress),
            "completed" => Some(Self::Completed),
            "cancelled" => Some(Self::Cancelled),
            _ => None,
        }
    }

    fn rank(&self) -> i64 {
        *self as i64
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskPriority {
    Low,
    Medium,
    High,
    Urgent,
}

impl TaskPriority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Urgent => "urgent",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "low" => Some(Self::Low),
            "medium" => Some(Self::Medium),
            "high" => Some(Self::High),
            "urgent" => Some(Self::Urgent),
            _ => None,
        }
    }

    fn rank(&self) -> i64 {
        *self as i64
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: i64,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub status: TaskStatus,
    pub priority: TaskPriority,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub due_date: Option<String>,
    pub created_at: String,
    pub updated_at: String,
    pub user_id: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assignee_id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
    /// Percent complete, 0-100.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub progress: Option<u8>,
    #[serde(default)]
    pub is_archived: bool,
}

impl Task {
    /// Due strictly before `now` and not completed. Cancelled tasks still count.
    pub fn is_overdue(&self, now: DateTime<Utc>) -> bool {
        self.status != TaskStatus::Completed
            && self
                .due_date
                .as_deref()
                .and_then(parse_instant)
                .is_some_and(|due| due < now)
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags
            .as_ref()
            .is_some_and(|tags| tags.iter().any(|t| t == tag))
    }

    /// Case-insensitive substring match over title and description.
    pub fn mentions(&self, term: &str) -> bool {
        let term = term.to_lowercase();
        self.title.to_lowercase().contains(&term)
            || self
                .description
                .as_ref()
                .is_some_and(|d| d.to_lowercase().contains(&term))
    }
}

/// Payload for creating a task.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewTask {
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub priority: TaskPriority,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub due_date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assignee_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
}

impl NewTask {
    pub fn new(title: impl Into<String>, priority: TaskPriority) -> Self {
        Self {
            title: title.into(),
            description: None,
            priority,
            due_date: None,
            assignee_id: None,
            category: None,
            tags: None,
        }
    }

    /// Copy of an existing task's user-editable fields under a new title.
    pub fn copy_of(task: &Task) -> Self {
        Self {
            title: format!("{} (copy)", task.title),
            description: task.description.clone(),
            priority: task.priority,
            due_date: task.due_date.clone(),
            assignee_id: task.assignee_id,
            category: task.category.clone(),
            tags: task.tags.clone(),
        }
    }
}

/// Partial update; only set fields are sent.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub priority: Option<TaskPriority>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub due_date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assignee_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<TaskStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub progress: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_archived: Option<bool>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskSortField {
    Id,
    Title,
    Status,
    Priority,
    DueDate,
    CreatedAt,
    UpdatedAt,
    Progress,
    Category,
}

impl TaskSortField {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "id" => Some(Self::Id),
            "title" => Some(Self::Title),
            "status" => Some(Self::Status),
            "priority" => Some(Self::Priority),
            "due_date" => Some(Self::DueDate),
            "created_at" => Some(Self::CreatedAt),
            "updated_at" => Some(Self::UpdatedAt),
            "progress" => Some(Self::Progress),
            "category" => Some(Self::Category),
            _ => None,
        }
    }
}

impl SortField for TaskSortField {
    fn as_param(&self) -> &'static str {
        match self {
            Self::Id => "id",
            Self::Title => "title",
            Self::Status => "status",
            Self::Priority => "priority",
            Self::DueDate => "due_date",
            Self::CreatedAt => "created_at",
            Self::UpdatedAt => "updated_at",
            Self::Progress => "progress",
            Self::Category => "category",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TaskFilter {
    pub statuses: Vec<TaskStatus>,
    pub priorities: Vec<TaskPriority>,
    pub search: String,
    pub category: Option<String>,
    pub assignee_id: Option<i64>,
    /// Task must carry at least one of these tags.
    pub tags: Vec<String>,
    pub created: Option<DateRange>,
}

impl RecordFilter<Task> for TaskFilter {
    fn matches(&self, task: &Task) -> bool {
        if !self.statuses.is_empty() && !self.statuses.contains(&task.status) {
            return false;
        }
        if !self.priorities.is_empty() && !self.priorities.contains(&task.priority) {
            return false;
        }
        if !self.search.is_empty() && !task.mentions(&self.search) {
            return false;
        }
        if let Some(category) = &self.category {
            if task.category.as_ref() != Some(category) {
                return false;
            }
        }
        if let Some(assignee) = self.assignee_id {
            if task.assignee_id != Some(assignee) {
                return false;
            }
        }
        if !self.tags.is_empty() && !self.tags.iter().any(|t| task.has_tag(t)) {
            return false;
        }
        if let Some(range) = &self.created {
            if !range.contains(&task.created_at) {
                return false;
            }
        }
        true
    }

    fn query_pairs(&self) -> Vec<(String, String)> {
        let mut pairs = Vec::new();
        for status in &self.statuses {
            pairs.push(("status".to_string(), status.as_str().to_string()));
        }
        for priority in &self.priorities {
            pairs.push(("priority".to_string(), priority.as_str().to_string()));
        }
        if !self.search.is_empty() {
            pairs.push(("search".to_string(), self.search.clone()));
        }
        if let Some(category) = &self.category {
            pairs.push(("category".to_string(), category.clone()));
        }
        if let Some(assignee) = self.assignee_id {
            pairs.push(("assignee_id".to_string(), assignee.to_string()));
        }
        for tag in &self.tags {
            pairs.push(("tags".to_string(), tag.clone()));
        }
        if let Some(range) = &self.created {
            pairs.extend(range.query_pairs());
        }
        pairs
    }
}

impl Record for Task {
    type Filter = TaskFilter;
    type SortField = TaskSortField;

    const ENDPOINT: &'static str = "/api/v1/tasks";
    const NOUN: &'static str = "task";

    fn id(&self) -> i64 {
        self.id
    }

    fn sort_key(&self, field: TaskSortField) -> Option<SortKey<'_>> {
        match field {
            TaskSortField::Id => Some(SortKey::Int(self.id)),
            TaskSortField::Title => Some(SortKey::Text(&self.title)),
            TaskSortField::Status => Some(SortKey::Int(self.status.rank())),
            TaskSortField::Priority => Some(SortKey::Int(self.priority.rank())),
            TaskSortField::DueDate => self.due_date.as_deref().map(SortKey::timestamp),
            TaskSortField::CreatedAt => Some(SortKey::timestamp(&self.created_at)),
            TaskSortField::UpdatedAt => Some(SortKey::timestamp(&self.updated_at)),
            TaskSortField::Progress => self.progress.map(|p| SortKey::Int(i64::from(p))),
            TaskSortField::Category => self.category.as_deref().map(SortKey::Text),
        }
    }

    fn default_sort() -> Sort<TaskSortField> {
        Sort::new(TaskSortField::CreatedAt, SortDirection::Desc)
    }
}

/// Aggregate counts over the held page of tasks.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TaskStats {
    pub total: usize,
    pub pending: usize,
    pub in_progress: usize,
    pub completed: usize,
    pub overdue: usize,
    /// Percentage of completed tasks, rounded; 0 when there are none.
    pub completion_rate: u32,
}

impl TaskStats {
    pub fn compute(tasks: &[Task], now: DateTime<Utc>) -> Self {
        let mut stats = Self {
            total: tasks.len(),
            ..Self::default()
        };
        for task in tasks {
            match task.status {
                TaskStatus::Pending => stats.pending += 1,
                TaskStatus::InProgress => stats.in_progress += 1,
                TaskStatus::Completed => stats.completed += 1,
                TaskStatus::Cancelled => {}
            }
            if task.is_overdue(now) {
                stats.overdue += 1;
            }
        }
        if stats.total > 0 {
            stats.completion_rate =
                ((stats.completed as f64 / stats.total as f64) * 100.0).round() as u32;
        }
        stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn make_task(id: i64, status: TaskStatus) -> Task {
        Task {
            id,
            title: format!("Task {}", id),
            description: None,
            status,
            priority: TaskPriority::Medium,
            due_date: None,
            created_at: "2026-01-10T09:00:00Z".to_string(),
            updated_at: "2026-01-10T09:00:00Z".to_string(),
            user_id: 1,
            assignee_id: None,
            category: None,
            tags: None,
            progress: None,
            is_archived: false,
        }
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 2, 15, 12, 0, 0).unwrap()
    }

    #[test]
    fn deserializes_camel_case_wire_format() {
        let json = r#"{
            "id": 7, "title": "Write report", "status": "in_progress", "priority": "urgent",
            "dueDate": "2026-02-20", "createdAt": "2026-01-01T00:00:00Z",
            "updatedAt": "2026-01-02T00:00:00Z", "userId": 3, "assigneeId": 4,
            "tags": ["work"], "progress": 40, "isArchived": false
        }"#;
        let task: Task = serde_json::from_str(json).unwrap();
        assert_eq!(task.status, TaskStatus::InProgress);
        assert_eq!(task.priority, TaskPriority::Urgent);
        assert_eq!(task.assignee_id, Some(4));
        assert_eq!(task.progress, Some(40));
        assert!(task.has_tag("work"));
    }

    #[test]
    fn patch_serializes_only_set_fields() {
        let patch = TaskPatch {
            status: Some(TaskStatus::Completed),
            progress: Some(100),
            ..Default::default()
        };
        let value = serde_json::to_value(&patch).unwrap();
        assert_eq!(value, serde_json::json!({"status": "completed", "progress": 100}));

        let archive = TaskPatch {
            is_archived: Some(true),
            ..Default::default()
        };
        assert_eq!(
            serde_json::to_value(&archive).unwrap(),
            serde_json::json!({"isArchived": true})
        );
    }

    #[test]
    fn completion_rate_is_zero_without_tasks() {
        let stats = TaskStats::compute(&[], now());
        assert_eq!(stats.total, 0);
        assert_eq!(stats.completion_rate, 0);
    }

    #[test]
    fn completion_rate_rounds() {
        let tasks = vec![
            make_task(1, TaskStatus::Completed),
            make_task(2, TaskStatus::Pending),
            make_task(3, TaskStatus::InProgress),
        ];
        let stats = TaskStats::compute(&tasks, now());
        assert_eq!(stats.completion_rate, 33);
        assert_eq!((stats.pending, stats.in_progress, stats.completed), (1, 1, 1));

        let tasks = vec![
            make_task(1, TaskStatus::Completed),
            make_task(2, TaskStatus::Completed),
            make_task(3, TaskStatus::Pending),
        ];
        assert_eq!(TaskStats::compute(&tasks, now()).completion_rate, 67);
    }

    #[test]
    fn overdue_excludes_completed() {
        let yesterday = (now() - Duration::days(1)).to_rfc3339();

        let mut open = make_task(1, TaskStatus::Pending);
        open.due_date = Some(yesterday.clone());
        let mut done = make_task(2, TaskStatus::Completed);
        done.due_date = Some(yesterday);
        let mut future = make_task(3, TaskStatus::Pending);
        future.due_date = Some((now() + Duration::days(1)).to_rfc3339());
        let undated = make_task(4, TaskStatus::Pending);

        assert!(open.is_overdue(now()));
        assert!(!done.is_overdue(now()));
        assert!(!future.is_overdue(now()));
        assert!(!undated.is_overdue(now()));

        let stats = TaskStats::compute(&[open, done, future, undated], now());
        assert_eq!(stats.overdue, 1);
    }

    #[test]
    fn filter_search_is_case_insensitive_over_description() {
        let mut task = make_task(1, TaskStatus::Pending);
        task.description = Some("Call the PLUMBER".to_string());
        let filter = TaskFilter {
            search: "plumber".to_string(),
            ..Default::default()
        };
        assert!(filter.matches(&task));

        let filter = TaskFilter {
            search: "electrician".to_string(),
            ..Default::default()
        };
        assert!(!filter.matches(&task));
    }

    #[test]
    fn filter_predicates_are_conjunctive() {
        let mut task = make_task(1, TaskStatus::Pending);
        task.category = Some("home".to_string());
        let filter = TaskFilter {
            statuses: vec![TaskStatus::Pending],
            category: Some("work".to_string()),
            ..Default::default()
        };
        assert!(!filter.matches(&task));
    }

    #[test]
    fn empty_filter_matches_everything() {
        assert!(TaskFilter::default().matches(&make_task(1, TaskStatus::Cancelled)));
        assert!(TaskFilter::default().query_pairs().is_empty());
    }

    #[test]
    fn filter_query_pairs_repeat_multi_valued_fields() {
        let filter = TaskFilter {
            statuses: vec![TaskStatus::Pending, TaskStatus::InProgress],
            search: "report".to_string(),
            assignee_id: Some(9),
            ..Default::default()
        };
        assert_eq!(
            filter.query_pairs(),
            vec![
                ("status".to_string(), "pending".to_string()),
                ("status".to_string(), "in_progress".to_string()),
                ("search".to_string(), "report".to_string()),
                ("assignee_id".to_string(), "9".to_string()),
            ]
        );
    }

    #[test]
    fn copy_keeps_editable_fields() {
        let mut task = make_task(1, TaskStatus::Completed);
        task.tags = Some(vec!["a".to_string()]);
        task.priority = TaskPriority::High;
        let copy = NewTask::copy_of(&task);
        assert_eq!(copy.title, "Task 1 (copy)");
        assert_eq!(copy.priority, TaskPriority::High);
        assert_eq!(copy.tags, Some(vec!["a".to_string()]));
    }
    #[test]
    fn tag_filter_needs_any_one_tag() {
        let mut tagged = make_task(1, TaskStatus::Pending);
        tagged.tags = Some(vec!["home".to_string(), "errand".to_string()]);
        let untagged = make_task(2, TaskStatus::Pending);

        let filter = TaskFilter {
            tags: vec!["work".to_string(), "errand".to_string()],
            ..Default::default()
        };
        assert!(filter.matches(&tagged));
        assert!(!filter.matches(&untagged));

        let unrelated = TaskFilter {
            tags: vec!["work".to_string()],
            ..Default::default()
        };
        assert!(!unrelated.matches(&tagged));
        assert_eq!(
            filter.query_pairs(),
            vec![
                ("tags".to_string(), "work".to_string()),
                ("tags".to_string(), "errand".to_string()),
            ]
        );
    }

    #[test]
    fn assignee_filter() {
        let mut assigned = make_task(1, TaskStatus::Pending);
        assigned.assignee_id = Some(5);
        let unassigned = make_task(2, TaskStatus::Pending);

        let filter = TaskFilter {
            assignee_id: Some(5),
            ..Default::default()
        };
        assert!(filter.matches(&assigned));
        assert!(!filter.matches(&unassigned));
        assigned.assignee_id = Some(6);
        assert!(!filter.matches(&assigned));
        assert_eq!(filter.query_pairs(), vec![("assignee_id".to_string(), "5".to_string())]);
    }

    #[test]
    fn created_range_filter() {
        let mut early = make_task(1, TaskStatus::Pending);
        early.created_at = "2025-12-31T23:59:59Z".to_string();
        let inside = make_task(2, TaskStatus::Pending);
        let mut garbled = make_task(3, TaskStatus::Pending);
        garbled.created_at = "not a date".to_string();

        let filter = TaskFilter {
            created: Some(DateRange::new(
                Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap(),
                Utc.with_ymd_and_hms(2026, 1, 10, 9, 0, 0).unwrap(),
            )),
            ..Default::default()
        };
        assert!(!filter.matches(&early));
        assert!(filter.matches(&inside));
        assert!(!filter.matches(&garbled));

        let pairs = filter.query_pairs();
        assert_eq!(pairs[0].0, "date_from");
        assert_eq!(pairs[1].0, "date_to");
    }
}
