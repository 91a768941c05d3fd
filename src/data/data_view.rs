use std::sync::Arc;
use tracing::debug;

use crate::data::filter;
use crate::data::pagination::{capped_count, paginate, PageWindow, PaginationState};
use crate::data::row::Row;
use crate::data::sort::{sort_indices, SortSpec};

/// A view over fetched rows that filters, sorts and caps them without
/// touching the underlying data. Filter and sort results are cached and only
/// recomputed when their inputs change.
#[derive(Debug, Clone)]
pub struct DataView {
    /// The fetched rows, in fetch order
    source: Arc<Vec<Row>>,

    query: String,
    sort: SortSpec,
    max_results: Option<usize>,

    /// Indices of rows matching `query`, None when stale
    filtered: Option<Vec<usize>>,

    /// `filtered` reordered by `sort`, None when stale
    ordered: Option<Vec<usize>>,
}

impl DataView {
    /// Create a view showing all rows
    pub fn new(source: Arc<Vec<Row>>) -> Self {
        Self {
            source,
            query: String::new(),
            sort: SortSpec::new(),
            max_results: None,
            filtered: None,
            ordered: None,
        }
    }

    pub fn empty() -> Self {
        Self::new(Arc::new(Vec::new()))
    }

    pub fn with_max_results(mut self, max_results: Option<usize>) -> Self {
        self.max_results = max_results;
        self
    }

    /// Swap in freshly fetched rows, keeping query and sort
    pub fn set_source(&mut self, source: Arc<Vec<Row>>) {
        self.source = source;
        self.invalidate_filter();
    }

    pub fn set_query(&mut self, query: &str) {
        if self.query != query {
            self.query = query.to_string();
            self.invalidate_filter();
        }
    }

    pub fn set_sort(&mut self, sort: SortSpec) {
        if self.sort != sort {
            self.sort = sort;
            self.ordered = None;
        }
    }

    fn invalidate_filter(&mut self) {
        self.filtered = None;
        self.ordered = None;
    }

    /// Filtered, sorted and capped row indices
    pub fn visible_row_indices(&mut self) -> &[usize] {
        if self.filtered.is_none() {
            let matched = filter::matching_indices(&self.source, &self.query);
            debug!(
                target: "grid",
                "Filter '{}' kept {} of {} rows",
                self.query,
                matched.len(),
                self.source.len()
            );
            self.filtered = Some(matched);
        }

        if self.ordered.is_none() {
            let mut ordered = self.filtered.clone().unwrap_or_default();
            sort_indices(&self.source, &mut ordered, &self.sort);
            ordered.truncate(capped_count(ordered.len(), self.max_results));
            self.ordered = Some(ordered);
        }

        self.ordered.as_deref().unwrap_or_default()
    }

    /// Number of rows after filter and cap
    pub fn row_count(&mut self) -> usize {
        self.visible_row_indices().len()
    }

    /// Number of rows as fetched
    pub fn source_row_count(&self) -> usize {
        self.source.len()
    }

    pub fn page_window(&mut self, state: &PaginationState) -> PageWindow {
        paginate(self.row_count(), state)
    }

    /// Rows on the page described by `state`
    pub fn page_rows(&mut self, state: &PaginationState) -> Vec<Row> {
        let window = self.page_window(state);
        let source = Arc::clone(&self.source);
        self.visible_row_indices()[window.range]
            .iter()
            .map(|&idx| source[idx].clone())
            .collect()
    }
}
