use serde::Serialize;
use serde::de::IgnoredAny;
use std::sync::atomic::AtomicUsize;
use std::sync::{Arc, Mutex, MutexGuard};

use super::view::derive_view;
use super::{InFlight, any_in_flight};
use crate::api::{ApiClient, Page};
use crate::core::query::{PageRequest, Pagination, Sort, SortDirection, SortField};
use crate::core::record::{Record, RecordFilter};
use crate::lock;
use crate::ui::{Notice, Notifier};

pub(super) struct CollectionState<R: Record> {
    /// The held page, in server order.
    pub(super) items: Vec<R>,
    pub(super) current: Option<R>,
    pub(super) pagination: Pagination,
    pub(super) filter: R::Filter,
    pub(super) sort: Sort<R::SortField>,
}

/// One page of server records plus the local filter/sort state used to view them.
///
/// Remote mutations are applied locally only after the server confirms them. Overlapping
/// [`fetch_page`](Self::fetch_page) calls are not coalesced: whichever response completes
/// last replaces the held page.
pub struct CollectionStore<R: Record> {
    pub(super) api: Arc<ApiClient>,
    pub(super) notifier: Arc<dyn Notifier>,
    state: Mutex<CollectionState<R>>,
    in_flight: AtomicUsize,
}

impl<R: Record> CollectionStore<R> {
    pub fn new(api: Arc<ApiClient>, notifier: Arc<dyn Notifier>, page_size: u32) -> Self {
        Self {
            api,
            notifier,
            state: Mutex::new(CollectionState {
                items: Vec::new(),
                current: None,
                pagination: Pagination::first(page_size),
                filter: R::Filter::default(),
                sort: R::default_sort(),
            }),
            in_flight: AtomicUsize::new(0),
        }
    }

    pub(super) fn state(&self) -> MutexGuard<'_, CollectionState<R>> {
        lock(&self.state)
    }

    pub(super) fn begin(&self) -> InFlight<'_> {
        InFlight::begin(&self.in_flight)
    }

    pub(super) fn record_path(id: i64) -> String {
        format!("{}/{}", R::ENDPOINT, id)
    }

    pub fn items(&self) -> Vec<R> {
        self.state().items.clone()
    }

    pub fn current(&self) -> Option<R> {
        self.state().current.clone()
    }

    pub fn pagination(&self) -> Pagination {
        self.state().pagination
    }

    pub fn filter(&self) -> R::Filter {
        self.state().filter.clone()
    }

    pub fn sort(&self) -> Sort<R::SortField> {
        self.state().sort
    }

    pub fn loading(&self) -> bool {
        any_in_flight(&self.in_flight)
    }

    /// Held records passing every active filter, in the active sort order.
    pub fn view(&self) -> Vec<R> {
        let state = self.state();
        derive_view(&state.items, &state.filter, state.sort)
    }

    /// Merge a partial filter change. Takes effect on the next [`view`](Self::view).
    pub fn set_filters(&self, change: impl FnOnce(&mut R::Filter)) {
        change(&mut self.state().filter);
    }

    pub fn reset_filters(&self) {
        self.state().filter = R::Filter::default();
    }

    pub fn set_sort(&self, field: R::SortField, direction: SortDirection) {
        self.state().sort = Sort::new(field, direction);
    }

    pub fn clear_current(&self) {
        self.state().current = None;
    }

    /// Replace the held page. Explicit `request` values win over the store's current
    /// pagination and sort; the active filter is always sent.
    pub async fn fetch_page(&self, request: PageRequest<R::SortField>) -> bool {
        let query = {
            let state = self.state();
            let page = request.page.unwrap_or(state.pagination.page());
            let size = request.page_size.unwrap_or(state.pagination.page_size());
            let field = request.sort_field.unwrap_or(state.sort.field);
            let direction = request.sort_direction.unwrap_or(state.sort.direction);

            let mut query = vec![
                ("page".to_string(), page.to_string()),
                ("size".to_string(), size.to_string()),
                ("sort_by".to_string(), field.as_param().to_string()),
                ("sort_order".to_string(), direction.as_param().to_string()),
            ];
            query.extend(state.filter.query_pairs());
            query
        };

        let _busy = self.begin();
        match self.api.get::<Page<R>>(R::ENDPOINT, &query).await {
            Ok(page) => {
                log::debug!(
                    "Fetched {} {}s (page {}, {} total)",
                    page.items.len(),
                    R::NOUN,
                    page.page,
                    page.total
                );
                let mut state = self.state();
                state.pagination = Pagination::new(page.page, page.size, page.total);
                state.items = page.items;
                true
            }
            Err(e) => {
                log::error!("Failed to fetch {}s: {}", R::NOUN, e);
                self.notifier
                    .notify(Notice::error(format!("Failed to load {}s", R::NOUN)));
                false
            }
        }
    }

    /// Load one record as the current selection.
    pub async fn fetch_one(&self, id: i64) -> Option<R> {
        let _busy = self.begin();
        match self.api.get::<R>(&Self::record_path(id), &[]).await {
            Ok(record) => {
                self.state().current = Some(record.clone());
                Some(record)
            }
            Err(e) => {
                log::error!("Failed to fetch {} {}: {}", R::NOUN, id, e);
                self.notifier
                    .notify(Notice::error(format!("Failed to load {} details", R::NOUN)));
                None
            }
        }
    }

    /// Create remotely, then prepend the confirmed record.
    pub async fn create<P: Serialize + ?Sized>(&self, payload: &P) -> Option<R> {
        let _busy = self.begin();
        match self.api.post::<R, P>(R::ENDPOINT, payload).await {
            Ok(record) => {
                log::info!("Created {} {}", R::NOUN, record.id());
                self.state().items.insert(0, record.clone());
                self.notifier
                    .notify(Notice::success(format!("{} created", capitalize(R::NOUN))));
                Some(record)
            }
            Err(e) => {
                log::error!("Failed to create {}: {}", R::NOUN, e);
                None
            }
        }
    }

    /// Update remotely, then replace the held record with the same id.
    ///
    /// When no record with `id` is held the local page is left as is, even though the
    /// server accepted the change; the next fetch brings it in line.
    pub async fn update<P: Serialize + ?Sized>(&self, id: i64, patch: &P) -> Option<R> {
        let _busy = self.begin();
        match self.api.patch::<R, P>(&Self::record_path(id), patch).await {
            Ok(updated) => {
                {
                    let mut state = self.state();
                    match state.items.iter_mut().find(|r| r.id() == id) {
                        Some(slot) => *slot = updated.clone(),
                        None => log::debug!("Updated {} {} is not on the held page", R::NOUN, id),
                    }
                    if state.current.as_ref().is_some_and(|c| c.id() == id) {
                        state.current = Some(updated.clone());
                    }
                }
                self.notifier
                    .notify(Notice::success(format!("{} updated", capitalize(R::NOUN))));
                Some(updated)
            }
            Err(e) => {
                log::error!("Failed to update {} {}: {}", R::NOUN, id, e);
                None
            }
        }
    }

    /// Delete remotely, then drop the held record and clear it as current selection.
    pub async fn remove(&self, id: i64) -> bool {
        let _busy = self.begin();
        match self.api.delete::<IgnoredAny>(&Self::record_path(id)).await {
            Ok(_) => {
                {
                    let mut state = self.state();
                    state.items.retain(|r| r.id() != id);
                    if state.current.as_ref().is_some_and(|c| c.id() == id) {
                        state.current = None;
                    }
                }
                self.notifier
                    .notify(Notice::success(format!("{} deleted", capitalize(R::NOUN))));
                true
            }
            Err(e) => {
                log::error!("Failed to delete {} {}: {}", R::NOUN, id, e);
                false
            }
        }
    }
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::query::PageRequest;
    use crate::core::task::{Task, TaskPatch, TaskSortField, TaskStatus};
    use crate::testing::{RecordingNotifier, ScriptedTransport, envelope, page_of, task_json};
    use reqwest::Method;
    use serde_json::json;
    use std::time::Duration;

    fn store() -> (Arc<ScriptedTransport>, Arc<RecordingNotifier>, CollectionStore<Task>) {
        let transport = ScriptedTransport::new();
        let notifier = RecordingNotifier::new();
        let api = Arc::new(ApiClient::new(transport.clone(), notifier.clone()));
        let store = CollectionStore::new(api, notifier.clone(), 20);
        (transport, notifier, store)
    }

    fn ids(tasks: &[Task]) -> Vec<i64> {
        tasks.iter().map(|t| t.id).collect()
    }

    async fn seed(transport: &ScriptedTransport, store: &CollectionStore<Task>, ids: &[i64]) {
        let items = ids.iter().map(|id| task_json(*id, &format!("Task {}", id), "pending")).collect();
        transport.respond(Method::GET, "/api/v1/tasks", 200, page_of(items, 1, 20, ids.len() as u64));
        assert!(store.fetch_page(PageRequest::default()).await);
    }

    #[tokio::test]
    async fn fetch_page_merges_request_with_state() {
        let (transport, _, store) = store();
        store.set_filters(|f| {
            f.statuses = vec![TaskStatus::Pending];
            f.search = "report".to_string();
        });
        transport.respond(
            Method::GET,
            "/api/v1/tasks",
            200,
            page_of(vec![task_json(1, "Report", "pending")], 3, 10, 41),
        );

        let request = PageRequest::page(3).with_size(10);
        assert!(store.fetch_page(request).await);

        let sent = &transport.requests()[0];
        assert_eq!(sent.query_value("page"), Some("3"));
        assert_eq!(sent.query_value("size"), Some("10"));
        assert_eq!(sent.query_value("sort_by"), Some("created_at"));
        assert_eq!(sent.query_value("sort_order"), Some("desc"));
        assert_eq!(sent.query_value("status"), Some("pending"));
        assert_eq!(sent.query_value("search"), Some("report"));

        let pagination = store.pagination();
        assert_eq!(pagination.page(), 3);
        assert_eq!(pagination.total_items(), 41);
        assert_eq!(pagination.total_pages(), 5);
        assert_eq!(ids(&store.items()), vec![1]);
        assert!(!store.loading());
    }

    #[tokio::test]
    async fn explicit_sort_overrides_store_sort() {
        let (transport, _, store) = store();
        store.set_sort(TaskSortField::DueDate, SortDirection::Desc);
        transport.respond(Method::GET, "/api/v1/tasks", 200, page_of(vec![], 1, 20, 0));
        transport.respond(Method::GET, "/api/v1/tasks", 200, page_of(vec![], 1, 20, 0));

        let request = PageRequest::default().sorted_by(TaskSortField::Priority, SortDirection::Asc);
        assert!(store.fetch_page(request).await);
        assert!(store.fetch_page(PageRequest::default()).await);

        let requests = transport.requests();
        assert_eq!(requests[0].query_value("sort_by"), Some("priority"));
        assert_eq!(requests[0].query_value("sort_order"), Some("asc"));
        assert_eq!(requests[1].query_value("sort_by"), Some("due_date"));
        assert_eq!(requests[1].query_value("sort_order"), Some("desc"));
    }

    #[tokio::test]
    async fn fetch_page_replaces_rather_than_merges() {
        let (transport, _, store) = store();
        seed(&transport, &store, &[1, 2, 3]).await;
        seed(&transport, &store, &[4]).await;
        assert_eq!(ids(&store.items()), vec![4]);
    }

    #[tokio::test]
    async fn failed_fetch_keeps_previous_page_and_reports() {
        let (transport, notifier, store) = store();
        seed(&transport, &store, &[1, 2]).await;
        transport.respond(Method::GET, "/api/v1/tasks", 500, json!({}));

        assert!(!store.fetch_page(PageRequest::page(2)).await);
        assert_eq!(ids(&store.items()), vec![1, 2]);
        assert_eq!(store.pagination().page(), 1);
        assert!(notifier.messages().contains(&"Failed to load tasks".to_string()));
    }

    // Overlapping fetches are not coalesced: the response that completes last wins,
    // even when it was requested first.
    #[tokio::test(start_paused = true)]
    async fn overlapping_fetches_last_completed_wins() {
        let (transport, _, store) = store();
        transport.respond_matching(
            Method::GET,
            "/api/v1/tasks",
            ("page", "1"),
            Duration::from_millis(50),
            page_of(vec![task_json(1, "Page one", "pending")], 1, 1, 2),
        );
        transport.respond_matching(
            Method::GET,
            "/api/v1/tasks",
            ("page", "2"),
            Duration::from_millis(10),
            page_of(vec![task_json(2, "Page two", "pending")], 2, 1, 2),
        );

        let (first, second) = tokio::join!(
            store.fetch_page(PageRequest::page(1)),
            store.fetch_page(PageRequest::page(2)),
        );

        assert!(first && second);
        assert_eq!(ids(&store.items()), vec![1]);
        assert_eq!(store.pagination().page(), 1);
    }

    #[tokio::test]
    async fn create_prepends_confirmed_record() {
        let (transport, _, store) = store();
        seed(&transport, &store, &[1, 2]).await;
        transport.respond(Method::POST, "/api/v1/tasks", 200, envelope(task_json(9, "New", "pending")));

        let created = store.create(&json!({"title": "New", "priority": "medium"})).await;
        assert_eq!(created.map(|t| t.id), Some(9));
        assert_eq!(ids(&store.items()), vec![9, 1, 2]);
    }

    #[tokio::test]
    async fn failed_create_leaves_collection() {
        let (transport, _, store) = store();
        seed(&transport, &store, &[1]).await;
        transport.respond(Method::POST, "/api/v1/tasks", 422, json!({"errors": {"title": ["required"]}}));

        assert!(store.create(&json!({})).await.is_none());
        assert_eq!(ids(&store.items()), vec![1]);
        assert_eq!(transport.requests().len(), 2);
    }

    #[tokio::test]
    async fn update_replaces_held_record_in_place() {
        let (transport, _, store) = store();
        seed(&transport, &store, &[1, 2, 3]).await;
        transport.respond(Method::PATCH, "/api/v1/tasks/2", 200, envelope(task_json(2, "Renamed", "in_progress")));

        let patch = TaskPatch {
            title: Some("Renamed".to_string()),
            ..Default::default()
        };
        assert!(store.update(2, &patch).await.is_some());

        let items = store.items();
        assert_eq!(ids(&items), vec![1, 2, 3]);
        assert_eq!(items[1].title, "Renamed");
        assert_eq!(items[1].status, TaskStatus::InProgress);
    }

    // The server accepts the update but the record is not on the held page: the local
    // page stays stale until the next fetch.
    #[tokio::test]
    async fn update_of_unheld_record_succeeds_without_local_change() {
        let (transport, _, store) = store();
        seed(&transport, &store, &[1, 2]).await;
        let before = store.items();
        let mut done = task_json(5, "Elsewhere", "completed");
        done["progress"] = json!(100);
        transport.respond(Method::PATCH, "/api/v1/tasks/5", 200, envelope(done));

        let patch = TaskPatch {
            status: Some(TaskStatus::Completed),
            progress: Some(100),
            ..Default::default()
        };
        let updated = store.update(5, &patch).await.unwrap();

        assert_eq!(updated.id, 5);
        assert_eq!(updated.status, TaskStatus::Completed);
        assert_eq!(store.items(), before);
    }

    #[tokio::test]
    async fn update_refreshes_current_selection() {
        let (transport, _, store) = store();
        transport.respond(Method::GET, "/api/v1/tasks/4", 200, envelope(task_json(4, "Old", "pending")));
        transport.respond(Method::PATCH, "/api/v1/tasks/4", 200, envelope(task_json(4, "New", "pending")));

        assert!(store.fetch_one(4).await.is_some());
        store.update(4, &json!({"title": "New"})).await;
        assert_eq!(store.current().unwrap().title, "New");
    }

    #[tokio::test]
    async fn failed_fetch_one_keeps_current() {
        let (transport, notifier, store) = store();
        transport.respond(Method::GET, "/api/v1/tasks/4", 200, envelope(task_json(4, "Kept", "pending")));
        transport.respond(Method::GET, "/api/v1/tasks/5", 404, json!({}));

        store.fetch_one(4).await;
        assert!(store.fetch_one(5).await.is_none());
        assert_eq!(store.current().unwrap().id, 4);
        assert!(notifier.messages().contains(&"Failed to load task details".to_string()));
    }

    #[tokio::test]
    async fn clear_current_keeps_held_page() {
        let (transport, _, store) = store();
        seed(&transport, &store, &[4, 5]).await;
        transport.respond(Method::GET, "/api/v1/tasks/4", 200, envelope(task_json(4, "Chosen", "pending")));

        assert!(store.fetch_one(4).await.is_some());
        store.clear_current();
        assert!(store.current().is_none());
        assert_eq!(ids(&store.items()), vec![4, 5]);
    }

    #[tokio::test]
    async fn remove_drops_record_and_clears_current() {
        let (transport, _, store) = store();
        seed(&transport, &store, &[1, 2]).await;
        transport.respond(Method::GET, "/api/v1/tasks/2", 200, envelope(task_json(2, "Task 2", "pending")));
        transport.respond(Method::DELETE, "/api/v1/tasks/2", 200, envelope(json!(null)));

        store.fetch_one(2).await;
        assert!(store.remove(2).await);
        assert_eq!(ids(&store.items()), vec![1]);
        assert!(store.current().is_none());
    }

    #[tokio::test]
    async fn failed_remove_keeps_record() {
        let (transport, _, store) = store();
        seed(&transport, &store, &[1, 2]).await;
        transport.respond(Method::DELETE, "/api/v1/tasks/2", 403, json!({}));

        assert!(!store.remove(2).await);
        assert_eq!(ids(&store.items()), vec![1, 2]);
    }

    #[tokio::test]
    async fn filters_and_sort_are_local() {
        let (transport, _, store) = store();
        seed(&transport, &store, &[1, 2, 3]).await;
        let requests = transport.requests().len();

        store.set_sort(TaskSortField::Id, SortDirection::Asc);
        store.set_filters(|f| f.search = "Task 2".to_string());
        assert_eq!(ids(&store.view()), vec![2]);

        store.reset_filters();
        assert_eq!(ids(&store.view()), vec![1, 2, 3]);
        assert_eq!(transport.requests().len(), requests);
    }

    #[test]
    fn capitalizes_nouns() {
        assert_eq!(capitalize("task"), "Task");
        assert_eq!(capitalize(""), "");
    }
}
