//! Page arithmetic over the filtered and sorted row set.

use serde::{Deserialize, Serialize};
use std::ops::Range;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaginationState {
    pub page_size: usize,
    pub current_page: usize,
}

impl PaginationState {
    pub fn new(page_size: usize) -> Self {
        Self {
            page_size: page_size.max(1),
            current_page: 0,
        }
    }
}

impl Default for PaginationState {
    fn default() -> Self {
        Self::new(10)
    }
}

/// Pagination button presses
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageNav {
    First,
    Previous,
    Next,
    Last,
}

impl PageNav {
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "first" => Some(PageNav::First),
            "prev" | "previous" => Some(PageNav::Previous),
            "next" => Some(PageNav::Next),
            "last" => Some(PageNav::Last),
            _ => None,
        }
    }
}

/// The slice of rows a page shows
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageWindow {
    pub range: Range<usize>,
    pub max_page: usize,
}

/// `ceil(count / page_size) - 1`, or 0 when there is nothing to show
pub fn max_page(count: usize, page_size: usize) -> usize {
    let page_size = page_size.max(1);
    count.div_ceil(page_size).saturating_sub(1)
}

/// Apply the optional result cap
pub fn capped_count(count: usize, max_results: Option<usize>) -> usize {
    match max_results {
        Some(cap) => count.min(cap),
        None => count,
    }
}

/// Window for the current page of `count` rows. The page is clamped into
/// range so a stale page never yields a blank slice.
pub fn paginate(count: usize, state: &PaginationState) -> PageWindow {
    let max_page = max_page(count, state.page_size);
    let page = state.current_page.min(max_page);
    let start = (page * state.page_size).min(count);
    let end = (start + state.page_size).min(count);
    PageWindow {
        range: start..end,
        max_page,
    }
}

/// Target page for a navigation press. Presses at a boundary stay put.
pub fn navigate(current_page: usize, nav: PageNav, max_page: usize) -> usize {
    match nav {
        PageNav::First => 0,
        PageNav::Previous => current_page.saturating_sub(1),
        PageNav::Next => (current_page + 1).min(max_page),
        PageNav::Last => max_page,
    }
}
