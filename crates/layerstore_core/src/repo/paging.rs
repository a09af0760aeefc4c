//! Page request and page result types.

/// Zero-based page request. `page_size == 0` always yields an empty page.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Paging {
    pub page_index: u32,
    pub page_size: u32,
}

impl Paging {
    pub fn new(page_index: u32, page_size: u32) -> Self {
        Self {
            page_index,
            page_size,
        }
    }

    /// Number of records skipped before this page.
    pub fn offset(&self) -> u64 {
        u64::from(self.page_index) * u64::from(self.page_size)
    }

    pub fn is_empty_request(&self) -> bool {
        self.page_size == 0
    }
}

/// One ordered page of records.
#[derive(Debug, Clone, PartialEq)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub paging: Paging,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, paging: Paging) -> Self {
        Self { items, paging }
    }

    pub fn empty(paging: Paging) -> Self {
        Self::new(Vec::new(), paging)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn into_items(self) -> Vec<T> {
        self.items
    }
}
