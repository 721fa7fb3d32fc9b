//! Pagination
//!
//! Page resolution is forgiving: a missing or non-numeric `?page=` value shows
//! the first page, and a number past the end or below 1 shows the last one.
//! An empty listing still has one (empty) page.

use serde::{Deserialize, Serialize};
use std::num::IntErrorKind;

/// Offset/limit for one page of a listing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListParams {
    /// Page number (1-indexed)
    pub page: u32,
    pub per_page: u32,
}

impl ListParams {
    pub fn new(page: u32, per_page: u32) -> Self {
        Self {
            page: page.max(1),
            per_page: per_page.max(1),
        }
    }

    /// Resolve a raw `?page=` value against the number of items
    pub fn resolve(raw: Option<&str>, total: i64, per_page: u32) -> Self {
        let last = num_pages(total, per_page);
        let page = match raw.map(str::trim).map(str::parse::<i64>) {
            Some(Ok(n)) if n >= 1 => n.min(last as i64) as u32,
            // An integer outside the page range shows the last page
            Some(Ok(_)) => last,
            Some(Err(e)) if matches!(e.kind(), IntErrorKind::PosOverflow | IntErrorKind::NegOverflow) => last,
            _ => 1,
        };
        Self::new(page, per_page)
    }

    pub fn offset(&self) -> i64 {
        (self.page.saturating_sub(1) as i64) * self.per_page as i64
    }

    pub fn limit(&self) -> i64 {
        self.per_page as i64
    }
}

/// Number of pages for `total` items, never less than one
pub fn num_pages(total: i64, per_page: u32) -> u32 {
    let per_page = per_page.max(1) as i64;
    let total = total.max(0);
    (((total + per_page - 1) / per_page).max(1)) as u32
}

/// One page of a listing, with the numbers the paginator widget needs
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PagedResult<T> {
    pub items: Vec<T>,
    /// Items across all pages
    pub total: i64,
    /// Current page number (1-indexed)
    pub number: u32,
    pub per_page: u32,
    pub num_pages: u32,
    pub has_next: bool,
    pub has_previous: bool,
    pub next_page_number: Option<u32>,
    pub previous_page_number: Option<u32>,
    /// 1-based index of the first item on this page, 0 when empty
    pub start_index: i64,
    /// 1-based index of the last item on this page, 0 when empty
    pub end_index: i64,
}

impl<T> PagedResult<T> {
    pub fn new(items: Vec<T>, total: i64, params: &ListParams) -> Self {
        let num_pages = num_pages(total, params.per_page);
        let number = params.page.min(num_pages);
        let has_next = number < num_pages;
        let has_previous = number > 1;
        let (start_index, end_index) = if items.is_empty() {
            (0, 0)
        } else {
            let start = params.offset() + 1;
            (start, start + items.len() as i64 - 1)
        };

        Self {
            items,
            total,
            number,
            per_page: params.per_page,
            num_pages,
            has_next,
            has_previous,
            next_page_number: has_next.then_some(number + 1),
            previous_page_number: has_previous.then_some(number - 1),
            start_index,
            end_index,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_defaults_to_first_page() {
        assert_eq!(ListParams::resolve(None, 25, 10).page, 1);
        assert_eq!(ListParams::resolve(Some(""), 25, 10).page, 1);
        assert_eq!(ListParams::resolve(Some("abc"), 25, 10).page, 1);
        assert_eq!(ListParams::resolve(Some("2.0"), 25, 10).page, 1);
    }

    #[test]
    fn test_resolve_below_one_shows_last_page() {
        assert_eq!(ListParams::resolve(Some("0"), 25, 10).page, 3);
        assert_eq!(ListParams::resolve(Some("-3"), 25, 10).page, 3);
        assert_eq!(ListParams::resolve(Some("0"), 0, 10).page, 1);
        assert_eq!(ListParams::resolve(Some("99999999999999999999"), 25, 10).page, 3);
    }

    #[test]
    fn test_resolve_clamps_to_last_page() {
        assert_eq!(ListParams::resolve(Some("2"), 25, 10).page, 2);
        assert_eq!(ListParams::resolve(Some("3"), 25, 10).page, 3);
        assert_eq!(ListParams::resolve(Some("99"), 25, 10).page, 3);
        assert_eq!(ListParams::resolve(Some("99"), 0, 10).page, 1);
    }

    #[test]
    fn test_offset_and_limit() {
        let params = ListParams::new(3, 10);
        assert_eq!(params.offset(), 20);
        assert_eq!(params.limit(), 10);
    }

    #[test]
    fn test_num_pages() {
        assert_eq!(num_pages(0, 10), 1);
        assert_eq!(num_pages(10, 10), 1);
        assert_eq!(num_pages(11, 10), 2);
        assert_eq!(num_pages(13, 10), 2);
    }

    #[test]
    fn test_paged_result_second_of_two() {
        let params = ListParams::resolve(Some("2"), 13, 10);
        let page = PagedResult::new(vec![11, 12, 13], 13, &params);

        assert_eq!(page.number, 2);
        assert_eq!(page.num_pages, 2);
        assert!(!page.has_next);
        assert!(page.has_previous);
        assert_eq!(page.previous_page_number, Some(1));
        assert_eq!(page.next_page_number, None);
        assert_eq!((page.start_index, page.end_index), (11, 13));
    }

    #[test]
    fn test_paged_result_empty() {
        let params = ListParams::resolve(None, 0, 10);
        let page: PagedResult<i32> = PagedResult::new(vec![], 0, &params);

        assert!(page.is_empty());
        assert_eq!(page.num_pages, 1);
        assert!(!page.has_next);
        assert!(!page.has_previous);
        assert_eq!((page.start_index, page.end_index), (0, 0));
    }
}
