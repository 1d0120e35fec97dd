use std::cmp::Ordering;

use crate::core::query::{Sort, SortDirection, SortKey};
use crate::core::record::{Record, RecordFilter};

/// Filtered, sorted copy of `items`. Ties keep their held order and records without a
/// value for the sort field go last in either direction.
pub fn derive_view<R: Record>(items: &[R], filter: &R::Filter, sort: Sort<R::SortField>) -> Vec<R> {
    let mut view: Vec<R> = items.iter().filter(|r| filter.matches(r)).cloned().collect();
    view.sort_by(|a, b| compare_keys(a.sort_key(sort.field), b.sort_key(sort.field), sort.direction));
    view
}

/// Missing values and unparseable timestamps go last whatever the direction.
pub(crate) fn compare_keys(a: Option<SortKey<'_>>, b: Option<SortKey<'_>>, direction: SortDirection) -> Ordering {
    match (a, b) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Greater,
        (Some(_), None) => Ordering::Less,
        (Some(SortKey::Instant(_)), Some(SortKey::Text(_))) => Ordering::Less,
        (Some(SortKey::Text(_)), Some(SortKey::Instant(_))) => Ordering::Greater,
        (Some(a), Some(b)) => match direction {
            SortDirection::Asc => a.cmp(&b),
            SortDirection::Desc => b.cmp(&a),
        },
    }
}
