use serde::de::DeserializeOwned;
use std::fmt::Debug;

use super::query::{Sort, SortField, SortKey};

/// A server-owned entity held by a collection store.
pub trait Record: Clone + Debug + DeserializeOwned + Send + Sync + 'static {
    type Filter: RecordFilter<Self>;
    type SortField: SortField;

    /// Collection endpoint, e.g. `/api/v1/tasks`.
    const ENDPOINT: &'static str;
    /// Lowercase noun used in log lines and notices.
    const NOUN: &'static str;

    fn id(&self) -> i64;

    /// `None` when the record has no value for `field`; such records sort last.
    fn sort_key(&self, field: Self::SortField) -> Option<SortKey<'_>>;

    fn default_sort() -> Sort<Self::SortField>;
}

/// Client-side predicate set for a record kind. Every active predicate must pass.
pub trait RecordFilter<R>: Clone + Debug + Default + Send + Sync + 'static {
    fn matches(&self, record: &R) -> bool;

    /// Active predicates as list-request query parameters.
    fn query_pairs(&self) -> Vec<(String, String)>;
}
