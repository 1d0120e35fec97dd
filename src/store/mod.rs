//! Client-side state containers. Each store is constructed once per [`crate::app::App`]
//! and is independently consistent; no operation spans two stores.

pub mod collection;
pub mod notifications;
pub mod preferences;
pub mod session;
pub mod tasks;
pub mod view;

use std::sync::atomic::{AtomicUsize, Ordering};

pub use collection::CollectionStore;
pub use notifications::NotificationStore;
pub use preferences::PreferenceStore;
pub use session::{SessionCell, SessionStore};
pub use tasks::TaskStore;

/// Counts a request as in flight until dropped.
pub(crate) struct InFlight<'a>(&'a AtomicUsize);

impl<'a> InFlight<'a> {
    pub(crate) fn begin(counter: &'a AtomicUsize) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self(counter)
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

pub(crate) fn any_in_flight(counter: &AtomicUsize) -> bool {
    counter.load(Ordering::SeqCst) > 0
}
