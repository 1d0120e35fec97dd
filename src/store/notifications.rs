use serde::de::IgnoredAny;

use super::collection::CollectionStore;
use super::view::compare_keys;
use crate::api::UnreadCount;
use crate::core::notification::{Notification, NotificationKind, NotificationSortField};
use crate::core::query::{Pagination, SortDirection};
use crate::core::record::Record;
use crate::ui::Notice;

pub type NotificationStore = CollectionStore<Notification>;

impl CollectionStore<Notification> {
    pub fn unread_count(&self) -> usize {
        self.state().items.iter().filter(|n| !n.is_read).count()
    }

    pub fn has_unread(&self) -> bool {
        self.state().items.iter().any(|n| !n.is_read)
    }

    /// Up to `limit` held notifications, newest first.
    pub fn recent(&self, limit: usize) -> Vec<Notification> {
        let mut items = self.items();
        items.sort_by(|a, b| {
            let field = NotificationSortField::CreatedAt;
            compare_keys(a.sort_key(field), b.sort_key(field), SortDirection::Desc)
        });
        items.truncate(limit);
        items
    }

    pub fn of_type(&self, kind: &NotificationKind) -> Vec<Notification> {
        self.state()
            .items
            .iter()
            .filter(|n| &n.kind == kind)
            .cloned()
            .collect()
    }

    pub async fn mark_as_read(&self, id: i64) -> bool {
        let _busy = self.begin();
        let path = format!("{}/read", Self::record_path(id));
        match self.api.patch_empty::<IgnoredAny>(&path).await {
            Ok(_) => {
                let mut state = self.state();
                if let Some(n) = state.items.iter_mut().find(|n| n.id == id) {
                    n.is_read = true;
                }
                if let Some(current) = state.current.as_mut().filter(|c| c.id == id) {
                    current.is_read = true;
                }
                true
            }
            Err(e) => {
                log::error!("Failed to mark notification {} as read: {}", id, e);
                self.notifier
                    .notify(Notice::error("Failed to mark notification as read"));
                false
            }
        }
    }

    pub async fn mark_all_as_read(&self) -> bool {
        let _busy = self.begin();
        let path = format!("{}/mark-all-read", Notification::ENDPOINT);
        match self.api.post_empty::<IgnoredAny>(&path).await {
            Ok(_) => {
                {
                    let mut state = self.state();
                    state.items.iter_mut().for_each(|n| n.is_read = true);
                    if let Some(current) = state.current.as_mut() {
                        current.is_read = true;
                    }
                }
                self.notifier
                    .notify(Notice::success("All notifications marked as read"));
                true
            }
            Err(e) => {
                log::error!("Failed to mark all notifications as read: {}", e);
                self.notifier
                    .notify(Notice::error("Failed to mark all notifications as read"));
                false
            }
        }
    }

    /// Delete every notification on the server and empty the held page.
    pub async fn clear_all(&self) -> bool {
        let _busy = self.begin();
        let path = format!("{}/clear", Notification::ENDPOINT);
        match self.api.delete::<IgnoredAny>(&path).await {
            Ok(_) => {
                {
                    let mut state = self.state();
                    state.items.clear();
                    state.current = None;
                    state.pagination = Pagination::new(1, state.pagination.page_size(), 0);
                }
                self.notifier.notify(Notice::success("Notifications cleared"));
                true
            }
            Err(e) => {
                log::error!("Failed to clear notifications: {}", e);
                self.notifier.notify(Notice::error("Failed to clear notifications"));
                false
            }
        }
    }

    /// Server-wide unread count; 0 when it cannot be fetched.
    pub async fn fetch_unread_count(&self) -> u64 {
        let path = format!("{}/unread-count", Notification::ENDPOINT);
        match self.api.get::<UnreadCount>(&path, &[]).await {
            Ok(unread) => unread.count,
            Err(e) => {
                log::warn!("Failed to fetch unread count: {}", e);
                0
            }
        }
    }

    /// Prepend a notification the server pushed outside of a fetch.
    pub fn push(&self, notification: Notification) {
        let headline = notification
            .kind
            .announcement()
            .map(str::to_string)
            .unwrap_or_else(|| notification.title.clone());
        log::debug!("Received {} notification {}", notification.kind.as_str(), notification.id);
        self.state().items.insert(0, notification);
        self.notifier.notify(Notice::info(headline));
    }

    /// Mark `notification` read if needed and return the task it points at, if any.
    pub async fn open(&self, notification: &Notification) -> Option<i64> {
        if !notification.is_read {
            self.mark_as_read(notification.id).await;
        }
        notification.related_task_id
    }
}
