use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::query::{DateRange, Sort, SortDirection, SortField, SortKey};
use super::record::{Record, RecordFilter};

/// Notification category. Values the server adds later are kept verbatim in `Other`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum NotificationKind {
    TaskAssigned,
    TaskDue,
    TaskOverdue,
    TaskCompleted,
    TaskCommented,
    SystemUpdate,
    Other(String),
}

impl NotificationKind {
    pub fn as_str(&self) -> &str {
        match self {
            Self::TaskAssigned => "task_assigned",
            Self::TaskDue => "task_due",
            Self::TaskOverdue => "task_overdue",
            Self::TaskCompleted => "task_completed",
            Self::TaskCommented => "task_commented",
            Self::SystemUpdate => "system_update",
            Self::Other(raw) => raw,
        }
    }

    /// Short headline shown when a notification of this kind arrives.
    pub fn announcement(&self) -> Option<&'static str> {
        match self {
            Self::TaskAssigned => Some("You have been assigned a new task"),
            Self::TaskDue => Some("A task is due soon"),
            Self::TaskOverdue => Some("A task is overdue"),
            Self::TaskCompleted => Some("A task was completed"),
            Self::TaskCommented => Some("A task has a new comment"),
            Self::SystemUpdate => Some("System update"),
            Self::Other(_) => None,
        }
    }
}

impl From<String> for NotificationKind {
    fn from(raw: String) -> Self {
        match raw.as_str() {
            "task_assigned" => Self::TaskAssigned,
            "task_due" => Self::TaskDue,
            "task_overdue" => Self::TaskOverdue,
            "task_completed" => Self::TaskCompleted,
            "task_commented" => Self::TaskCommented,
            "system_update" => Self::SystemUpdate,
            _ => Self::Other(raw),
        }
    }
}

impl From<NotificationKind> for String {
    fn from(kind: NotificationKind) -> Self {
        match kind {
            NotificationKind::Other(raw) => raw,
            known => known.as_str().to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub id: i64,
    #[serde(rename = "type")]
    pub kind: NotificationKind,
    pub title: String,
    pub message: String,
    #[serde(default)]
    pub is_read: bool,
    pub created_at: String,
    pub user_id: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub related_task_id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Map<String, Value>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationSortField {
    Id,
    Title,
    CreatedAt,
    IsRead,
}

impl SortField for NotificationSortField {
    fn as_param(&self) -> &'static str {
        match self {
            Self::Id => "id",
            Self::Title => "title",
            Self::CreatedAt => "created_at",
            Self::IsRead => "is_read",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct NotificationFilter {
    /// `None` admits both read and unread.
    pub is_read: Option<bool>,
    pub kinds: Vec<NotificationKind>,
    pub created: Option<DateRange>,
}

impl RecordFilter<Notification> for NotificationFilter {
    fn matches(&self, n: &Notification) -> bool {
        if self.is_read.is_some_and(|read| n.is_read != read) {
            return false;
        }
        if !self.kinds.is_empty() && !self.kinds.contains(&n.kind) {
            return false;
        }
        if let Some(range) = &self.created {
            if !range.contains(&n.created_at) {
                return false;
            }
        }
        true
    }

    fn query_pairs(&self) -> Vec<(String, String)> {
        let mut pairs = Vec::new();
        if let Some(read) = self.is_read {
            pairs.push(("is_read".to_string(), read.to_string()));
        }
        for kind in &self.kinds {
            pairs.push(("type".to_string(), kind.as_str().to_string()));
        }
        if let Some(range) = &self.created {
            pairs.extend(range.query_pairs());
        }
        pairs
    }
}

impl Record for Notification {
    type Filter = NotificationFilter;
    type SortField = NotificationSortField;

    const ENDPOINT: &'static str = "/api/v1/notifications";
    const NOUN: &'static str = "notification";

    fn id(&self) -> i64 {
        self.id
    }

    fn sort_key(&self, field: NotificationSortField) -> Option<SortKey<'_>> {
        match field {
            NotificationSortField::Id => Some(SortKey::Int(self.id)),
            NotificationSortField::Title => Some(SortKey::Text(&self.title)),
            NotificationSortField::CreatedAt => Some(SortKey::timestamp(&self.created_at)),
            NotificationSortField::IsRead => Some(SortKey::Int(i64::from(self.is_read))),
        }
    }

    fn default_sort() -> Sort<NotificationSortField> {
        Sort::new(NotificationSortField::CreatedAt, SortDirection::Desc)
    }
}
