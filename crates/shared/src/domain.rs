use serde::{Deserialize, Serialize};

/// Page size used by the factories when no explicit limit is given.
pub const DEFAULT_PAGE_LIMIT: usize = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageBounds {
    pub offset: usize,
    pub limit: usize,
}

/// A bounded slice of a remote ordered collection plus the collection's total
/// count. A page is a transient read result; controllers never persist one.
///
/// Invariant: `items.len() <= page.limit`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: usize,
    pub page: PageBounds,
}

impl<T> Page<T> {
    /// Wraps an already-sliced flat array into the fetch contract.
    /// `page_number` is 1-based.
    pub fn wrap(items: Vec<T>, total: usize, page_number: usize, limit: usize) -> Self {
        Self {
            items,
            total,
            page: PageBounds {
                offset: page_offset(page_number, limit),
                limit,
            },
        }
    }

    pub fn empty() -> Self {
        Self {
            items: Vec::new(),
            total: 0,
            page: PageBounds { offset: 0, limit: 1 },
        }
    }

    /// Maps the items, keeping total and bounds.
    pub fn map_items<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            items: self.items.into_iter().map(f).collect(),
            total: self.total,
            page: self.page,
        }
    }
}

/// Offset of the first item of a 1-based page number.
pub fn page_offset(page_number: usize, limit: usize) -> usize {
    page_number.saturating_sub(1) * limit
}
