use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::Debug;

use super::time::parse_instant;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    Asc,
    #[default]
    Desc,
}

impl SortDirection {
    pub fn as_param(&self) -> &'static str {
        match self {
            Self::Asc => "asc",
            Self::Desc => "desc",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "asc" => Some(Self::Asc),
            "desc" => Some(Self::Desc),
            _ => None,
        }
    }
}

/// A field a record collection can be ordered by.
pub trait SortField: Copy + Debug + PartialEq + Send + Sync + 'static {
    /// Value sent as the `sort_by` query parameter.
    fn as_param(&self) -> &'static str;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Sort<F> {
    pub field: F,
    pub direction: SortDirection,
}

impl<F> Sort<F> {
    pub fn new(field: F, direction: SortDirection) -> Self {
        Self { field, direction }
    }
}

/// Comparable value extracted from a record for ordering.
///
/// Keys of different variants never meet for the same field except for timestamps
/// that failed to parse, which order after every parsed instant.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub enum SortKey<'a> {
    Int(i64),
    Instant(DateTime<Utc>),
    Text(&'a str),
}

impl<'a> SortKey<'a> {
    pub fn timestamp(raw: &'a str) -> Self {
        parse_instant(raw).map_or(Self::Text(raw), Self::Instant)
    }
}

/// Inclusive range over a record's creation time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl DateRange {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self { start, end }
    }

    /// Unparseable timestamps never fall inside a range.
    pub fn contains(&self, raw: &str) -> bool {
        parse_instant(raw).is_some_and(|t| t >= self.start && t <= self.end)
    }

    pub fn query_pairs(&self) -> [(String, String); 2] {
        [
            ("date_from".to_string(), self.start.to_rfc3339()),
            ("date_to".to_string(), self.end.to_rfc3339()),
        ]
    }
}

/// Pagination metadata for the page currently held by a store.
///
/// `total_pages` is always derived from `total_items` and `page_size`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    page: u32,
    page_size: u32,
    total_items: u64,
    total_pages: u64,
}

impl Pagination {
    pub fn new(page: u32, page_size: u32, total_items: u64) -> Self {
        let total_pages = if page_size == 0 {
            0
        } else {
            total_items.div_ceil(u64::from(page_size))
        };
        Self {
            page,
            page_size,
            total_items,
            total_pages,
        }
    }

    pub fn first(page_size: u32) -> Self {
        Self::new(1, page_size, 0)
    }

    pub fn page(&self) -> u32 {
        self.page
    }

    pub fn page_size(&self) -> u32 {
        self.page_size
    }

    pub fn total_items(&self) -> u64 {
        self.total_items
    }

    pub fn total_pages(&self) -> u64 {
        self.total_pages
    }
}

/// Explicit overrides for a list request. Unset values fall back to the store's state.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageRequest<F> {
    pub page: Option<u32>,
    pub page_size: Option<u32>,
    pub sort_field: Option<F>,
    pub sort_direction: Option<SortDirection>,
}

impl<F> Default for PageRequest<F> {
    fn default() -> Self {
        Self {
            page: None,
            page_size: None,
            sort_field: None,
            sort_direction: None,
        }
    }
}

impl<F> PageRequest<F> {
    pub fn page(page: u32) -> Self {
        Self {
            page: Some(page),
            ..Self::default()
        }
    }

    pub fn with_size(mut self, page_size: u32) -> Self {
        self.page_size = Some(page_size);
        self
    }

    pub fn sorted_by(mut self, field: F, direction: SortDirection) -> Self {
        self.sort_field = Some(field);
        self.sort_direction = Some(direction);
        self
    }
}
