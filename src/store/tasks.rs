use chrono::{DateTime, Utc};

use super::collection::CollectionStore;
use crate::core::task::{NewTask, Task, TaskPatch, TaskStats, TaskStatus};

pub type TaskStore = CollectionStore<Task>;

impl CollectionStore<Task> {
    /// Counts over the held page, not the server-wide total.
    pub fn stats(&self, now: DateTime<Utc>) -> TaskStats {
        TaskStats::compute(&self.state().items, now)
    }

    pub async fn complete(&self, id: i64) -> Option<Task> {
        let patch = TaskPatch {
            status: Some(TaskStatus::Completed),
            progress: Some(100),
            ..Default::default()
        };
        self.update(id, &patch).await
    }

    pub async fn archive(&self, id: i64) -> Option<Task> {
        self.set_archived(id, true).await
    }

    pub async fn restore(&self, id: i64) -> Option<Task> {
        self.set_archived(id, false).await
    }

    async fn set_archived(&self, id: i64, archived: bool) -> Option<Task> {
        let patch = TaskPatch {
            is_archived: Some(archived),
            ..Default::default()
        };
        self.update(id, &patch).await
    }

    /// Create a copy of a held task. `None` when the task is not on the held page.
    pub async fn duplicate(&self, id: i64) -> Option<Task> {
        let copy = {
            let state = self.state();
            let original = state.items.iter().find(|t| t.id == id);
            original.map(NewTask::copy_of)
        };
        match copy {
            Some(copy) => self.create(&copy).await,
            None => {
                log::warn!("Cannot duplicate task {}: not loaded", id);
                None
            }
        }
    }
}
