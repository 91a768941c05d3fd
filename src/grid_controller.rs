//! The grid's state machine.
//!
//! `GridController` owns all grid state. The UI binding layer feeds it
//! [`GridEvent`]s (or calls the matching `on_*` handlers), drives any returned
//! [`PendingLoad`] to completion, and renders [`GridController::snapshot`].
//!
//! ```text
//! Initializing -> Loading -> Ready | Error
//!                    ^          |      |
//!                    +----------+------+   (retry, reload, form submit, server search)
//! ```

use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::data::data_view::DataView;
use crate::data::pagination::{max_page, navigate, PageNav, PaginationState};
use crate::data::row::Row;
use crate::data::sort::{SortDirection, SortSpec};
use crate::services::data_source::{DataSource, FormValues, SourceRequest};
use crate::services::fetch_error::FetchError;
use crate::services::request_lifecycle::{RequestLifecycle, RequestState, RequestTicket};
use crate::state::events::GridEvent;
use crate::state::persistence::{GridStatePersistence, SessionStore};
use crate::utils::clock::{Clock, SystemClock};
use crate::utils::debouncer::Debouncer;

/// A declared column. Only sortable columns react to header clicks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnDef {
    pub property: String,
    #[serde(default)]
    pub header: String,
    #[serde(default = "default_sortable")]
    pub sortable: bool,
}

fn default_sortable() -> bool {
    true
}

impl ColumnDef {
    pub fn sortable(property: impl Into<String>) -> Self {
        let property = property.into();
        Self {
            header: property.clone(),
            property,
            sortable: true,
        }
    }

    pub fn fixed(property: impl Into<String>) -> Self {
        Self {
            sortable: false,
            ..Self::sortable(property)
        }
    }

    pub fn header(&self) -> &str {
        if self.header.is_empty() {
            &self.property
        } else {
            &self.header
        }
    }
}

#[derive(Debug, Clone)]
pub struct GridOptions {
    /// Namespace for persisted state
    pub table_key: String,
    pub source_url: String,
    pub columns: Vec<ColumnDef>,
    pub debounce: Duration,
    pub request_timeout: Duration,
    pub default_page_size: usize,
    pub page_size_options: Vec<usize>,
    /// Hard cap on rows considered after filter and sort
    pub max_results: Option<usize>,
    /// Send the search text to the data source instead of filtering locally
    pub server_search: bool,
}

impl GridOptions {
    pub fn new(table_key: impl Into<String>, source_url: impl Into<String>) -> Self {
        Self {
            table_key: table_key.into(),
            source_url: source_url.into(),
            columns: Vec::new(),
            debounce: Duration::from_millis(250),
            request_timeout: Duration::from_secs(30),
            default_page_size: 10,
            page_size_options: vec![10, 25, 50, 100],
            max_results: None,
            server_search: false,
        }
    }

    pub fn with_columns(mut self, columns: Vec<ColumnDef>) -> Self {
        self.columns = columns;
        self
    }

    pub fn with_max_results(mut self, max_results: Option<usize>) -> Self {
        self.max_results = max_results;
        self
    }

    pub fn with_server_search(mut self, server_search: bool) -> Self {
        self.server_search = server_search;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn with_debounce(mut self, debounce: Duration) -> Self {
        self.debounce = debounce;
        self
    }

    pub fn with_default_page_size(mut self, page_size: usize) -> Self {
        self.default_page_size = page_size.max(1);
        self
    }

    pub fn with_page_size_options(mut self, options: Vec<usize>) -> Self {
        self.page_size_options = options.into_iter().filter(|&size| size > 0).collect();
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GridPhase {
    Initializing,
    Loading,
    Ready,
    Error,
}

/// A started fetch. Drive it with [`PendingLoad::run`] and hand the outcome
/// back through [`GridController::complete_load`].
pub struct PendingLoad {
    ticket: RequestTicket,
    request: SourceRequest,
    source: Arc<dyn DataSource>,
}

impl PendingLoad {
    pub fn id(&self) -> u64 {
        self.ticket.id()
    }

    pub fn request(&self) -> &SourceRequest {
        &self.request
    }

    pub async fn run(&self) -> Result<Vec<Row>, FetchError> {
        self.ticket.run(self.source.as_ref(), &self.request).await
    }
}

/// Enabled state of every interactive control
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ControlState {
    pub search: bool,
    pub headers: bool,
    pub page_size: bool,
    pub first: bool,
    pub previous: bool,
    pub next: bool,
    pub last: bool,
    pub retry: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeaderState {
    pub property: String,
    pub header: String,
    pub sortable: bool,
    pub direction: Option<SortDirection>,
    /// 1-based position in the sort list
    pub precedence: Option<usize>,
    pub indicator: &'static str,
    pub aria_sort: &'static str,
}

/// "Showing start-end of total"
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RowCounters {
    pub start: usize,
    pub end: usize,
    pub total: usize,
    pub fetched: usize,
}

/// Everything needed to render the grid once
#[derive(Debug, Clone, PartialEq)]
pub struct GridSnapshot {
    pub phase: GridPhase,
    pub rows: Vec<Row>,
    pub headers: Vec<HeaderState>,
    pub search_text: String,
    pub page_size: usize,
    pub page_size_options: Vec<usize>,
    pub current_page: usize,
    pub max_page: usize,
    pub counters: RowCounters,
    pub empty_visible: bool,
    pub loading_visible: bool,
    pub error: Option<String>,
    pub controls: ControlState,
}

pub struct GridController {
    options: GridOptions,
    source: Arc<dyn DataSource>,
    persistence: GridStatePersistence,
    lifecycle: RequestLifecycle,
    view: DataView,
    debouncer: Debouncer,

    /// What is in the search box right now
    search_text: String,
    /// The search that has settled and is applied
    search: String,
    sort: SortSpec,
    pagination: PaginationState,
    form_values: Option<FormValues>,

    phase: GridPhase,
    error: Option<String>,
    /// Whether any load has succeeded, so the view holds real rows
    has_loaded: bool,
}

impl GridController {
    pub fn new(
        options: GridOptions,
        source: Arc<dyn DataSource>,
        store: Arc<dyn SessionStore>,
    ) -> Self {
        Self::with_clock(options, source, store, Arc::new(SystemClock))
    }

    pub fn with_clock(
        options: GridOptions,
        source: Arc<dyn DataSource>,
        store: Arc<dyn SessionStore>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let persistence = GridStatePersistence::new(store, options.table_key.clone());
        let lifecycle = RequestLifecycle::new(options.request_timeout);
        let view = DataView::empty().with_max_results(options.max_results);
        let debouncer = Debouncer::with_clock(options.debounce, clock);
        let pagination = PaginationState::new(options.default_page_size);

        Self {
            options,
            source,
            persistence,
            lifecycle,
            view,
            debouncer,
            search_text: String::new(),
            search: String::new(),
            sort: SortSpec::new(),
            pagination,
            form_values: None,
            phase: GridPhase::Initializing,
            error: None,
            has_loaded: false,
        }
    }

    /// Restore persisted settings. Returns the saved form values so the
    /// caller can put them back into its form before the first fetch.
    pub fn initialize(&mut self) -> Option<FormValues> {
        let settings = self.persistence.load(self.options.default_page_size);

        self.search_text = settings.search.clone();
        self.search = settings.search.clone();
        self.sort = settings.sort.clone();
        self.pagination = settings.pagination();
        self.form_values = settings.form_values.clone();

        if !self.options.server_search {
            self.view.set_query(&self.search);
        }
        self.view.set_sort(self.sort.clone());
        self.phase = GridPhase::Initializing;

        info!(
            target: "grid",
            "Grid '{}' initialized (search '{}', {} sort keys, page {} x {})",
            self.options.table_key,
            self.search,
            self.sort.len(),
            self.pagination.current_page,
            self.pagination.page_size
        );
        self.form_values.clone()
    }

    pub fn options(&self) -> &GridOptions {
        &self.options
    }

    pub fn phase(&self) -> GridPhase {
        self.phase
    }

    pub fn is_loading(&self) -> bool {
        self.lifecycle.is_loading()
    }

    pub fn request_state(&self) -> &RequestState {
        self.lifecycle.state()
    }

    pub fn search(&self) -> &str {
        &self.search
    }

    pub fn sort(&self) -> &SortSpec {
        &self.sort
    }

    pub fn pagination(&self) -> PaginationState {
        self.pagination
    }

    pub fn form_values(&self) -> Option<&FormValues> {
        self.form_values.as_ref()
    }

    /// Interactive controls only respond in the ready state
    pub fn controls_enabled(&self) -> bool {
        self.phase == GridPhase::Ready
    }

    fn build_request(&self) -> SourceRequest {
        let search = self
            .options
            .server_search
            .then(|| self.search.clone());
        SourceRequest::new(self.options.source_url.clone())
            .with_form(self.form_values.clone())
            .with_search(search)
    }

    /// Start a fetch, superseding any fetch still in flight
    pub fn begin_load(&mut self) -> PendingLoad {
        let request = self.build_request();
        let ticket = self.lifecycle.begin();
        self.phase = GridPhase::Loading;
        self.error = None;

        debug!(target: "grid", "Load {} started for {}", ticket.id(), request.url);
        PendingLoad {
            ticket,
            request,
            source: Arc::clone(&self.source),
        }
    }

    /// Apply the outcome of load `id`. Returns false when a newer load has
    /// started or the load was abandoned, so the outcome was ignored.
    pub fn complete_load(&mut self, id: u64, outcome: Result<Vec<Row>, FetchError>) -> bool {
        if !self.lifecycle.settle(id, outcome) {
            return false;
        }

        if let Some(rows) = self.lifecycle.rows() {
            self.view.set_source(rows);
            self.phase = GridPhase::Ready;
            self.error = None;
            self.has_loaded = true;
            self.reset_page_if_out_of_range();
        } else if let RequestState::Error(reason) = self.lifecycle.state() {
            self.error = Some(reason.clone());
            self.phase = GridPhase::Error;
        }
        true
    }

    /// Begin, run and complete one fetch
    pub async fn load(&mut self) -> bool {
        let pending = self.begin_load();
        let outcome = pending.run().await;
        self.complete_load(pending.id(), outcome)
    }

    /// Drive an optional pending load to completion
    pub async fn drive(&mut self, pending: Option<PendingLoad>) -> bool {
        self.drive_or_abort(pending, std::future::pending()).await
    }

    /// Drive an optional pending load, abandoning it if `abort` resolves first
    pub async fn drive_or_abort<F>(&mut self, pending: Option<PendingLoad>, abort: F) -> bool
    where
        F: Future<Output = ()>,
    {
        let Some(pending) = pending else {
            return false;
        };

        let outcome = tokio::select! {
            outcome = pending.run() => Some(outcome),
            _ = abort => None,
        };
        match outcome {
            Some(outcome) => self.complete_load(pending.id(), outcome),
            None => self.cancel_load(),
        }
    }

    /// Abandon the load in flight. The grid goes back to the rows it already
    /// had, or to the error state when it never loaded, so it can be retried.
    pub fn cancel_load(&mut self) -> bool {
        if !self.lifecycle.cancel() {
            return false;
        }

        if self.has_loaded {
            self.phase = GridPhase::Ready;
            self.error = None;
        } else {
            self.phase = GridPhase::Error;
            self.error = Some("load cancelled".to_string());
        }
        info!(target: "grid", "Load cancelled, grid is {:?}", self.phase);
        true
    }

    fn current_max_page(&mut self) -> usize {
        max_page(self.view.row_count(), self.pagination.page_size)
    }

    /// A page that no longer exists after a fetch goes back to the first page
    fn reset_page_if_out_of_range(&mut self) {
        let max_page = self.current_max_page();
        if self.pagination.current_page > max_page {
            info!(
                target: "grid",
                "Page {} is beyond last page {}, resetting to first page",
                self.pagination.current_page,
                max_page
            );
            self.pagination.current_page = 0;
            self.persistence.save_current_page(0);
        }
    }

    fn clamp_page(&mut self) {
        let max_page = self.current_max_page();
        if self.pagination.current_page > max_page {
            self.pagination.current_page = max_page;
            self.persistence
                .save_current_page(self.pagination.current_page);
        }
    }

    /// A keystroke in the search box. Restarts the debounce delay.
    pub fn on_search_input(&mut self, text: &str) -> bool {
        if !self.controls_enabled() {
            debug!(target: "grid", "Search input ignored while {:?}", self.phase);
            return false;
        }
        self.search_text = text.to_string();
        self.debouncer.trigger();
        true
    }

    /// Poll the debounce timer. Applies the search once input has paused.
    pub fn tick(&mut self) -> Option<PendingLoad> {
        if self.debouncer.should_execute() {
            self.apply_search()
        } else {
            None
        }
    }

    /// Whether a search is waiting for the debounce delay
    pub fn search_pending(&self) -> bool {
        self.debouncer.is_pending()
    }

    pub fn search_time_remaining(&self) -> Option<Duration> {
        self.debouncer.time_remaining()
    }

    /// Apply the search box immediately, skipping the debounce delay
    pub fn confirm_search(&mut self) -> Option<PendingLoad> {
        self.debouncer.reset();
        self.apply_search()
    }

    fn apply_search(&mut self) -> Option<PendingLoad> {
        if self.search_text == self.search {
            return None;
        }

        self.search = self.search_text.clone();
        self.persistence.save_search(&self.search);
        self.pagination.current_page = 0;
        self.persistence.save_current_page(0);
        info!(target: "grid", "Search settled: '{}'", self.search);

        if self.options.server_search {
            Some(self.begin_load())
        } else {
            self.view.set_query(&self.search);
            None
        }
    }

    fn column(&self, property: &str) -> Option<&ColumnDef> {
        self.options.columns.iter().find(|c| c.property == property)
    }

    /// Header click: cycle the column's sort direction
    pub fn on_header_activated(&mut self, property: &str) -> bool {
        if !self.controls_enabled() {
            return false;
        }
        match self.column(property) {
            Some(column) if column.sortable => {}
            _ => {
                warn!(target: "grid", "'{}' is not a sortable column", property);
                return false;
            }
        }

        self.sort = self.sort.toggle(property);
        self.view.set_sort(self.sort.clone());
        self.persistence.save_sort(&self.sort);
        debug!(target: "grid", "Sort is now {:?}", self.sort);
        true
    }

    pub fn on_page_size_changed(&mut self, page_size: usize) -> bool {
        if !self.controls_enabled() || page_size == 0 {
            return false;
        }

        self.pagination.page_size = page_size;
        self.persistence.save_page_size(page_size);
        self.clamp_page();
        true
    }

    /// Pagination buttons. Returns false when the press changed nothing.
    pub fn on_navigate(&mut self, nav: PageNav) -> bool {
        if !self.controls_enabled() {
            return false;
        }

        let max_page = self.current_max_page();
        let current = self.pagination.current_page.min(max_page);
        let target = navigate(current, nav, max_page);
        if target == self.pagination.current_page {
            return false;
        }

        self.pagination.current_page = target;
        self.persistence.save_current_page(target);
        true
    }

    /// The bound form was submitted: remember its values and re-fetch
    pub fn on_form_submitted(&mut self, values: FormValues) -> PendingLoad {
        self.persistence.save_form_values(&values);
        self.form_values = Some(values);
        self.begin_load()
    }

    /// Retry after an error. Only the error state offers a retry.
    pub fn retry(&mut self) -> Option<PendingLoad> {
        if self.phase != GridPhase::Error {
            return None;
        }
        info!(target: "grid", "Retrying grid '{}'", self.options.table_key);
        Some(self.begin_load())
    }

    pub fn reload(&mut self) -> PendingLoad {
        self.begin_load()
    }

    /// Route a UI message to its handler
    pub fn dispatch(&mut self, event: GridEvent) -> Option<PendingLoad> {
        match event {
            GridEvent::SearchChanged(text) => {
                self.on_search_input(&text);
                None
            }
            GridEvent::SearchConfirmed => self.confirm_search(),
            GridEvent::HeaderActivated(property) => {
                self.on_header_activated(&property);
                None
            }
            GridEvent::PageSizeChanged(size) => {
                self.on_page_size_changed(size);
                None
            }
            GridEvent::Navigate(nav) => {
                self.on_navigate(nav);
                None
            }
            GridEvent::FormSubmitted(values) => Some(self.on_form_submitted(values)),
            GridEvent::Retry => self.retry(),
            GridEvent::Reload => Some(self.reload()),
        }
    }

    fn header_states(&self) -> Vec<HeaderState> {
        self.options
            .columns
            .iter()
            .map(|column| {
                let direction = self.sort.direction_of(&column.property);
                HeaderState {
                    property: column.property.clone(),
                    header: column.header().to_string(),
                    sortable: column.sortable,
                    direction,
                    precedence: self.sort.position(&column.property).map(|p| p + 1),
                    indicator: direction.map(|d| d.indicator()).unwrap_or(""),
                    aria_sort: direction.map(|d| d.aria()).unwrap_or("none"),
                }
            })
            .collect()
    }

    /// Recompute filter, sort and page, and describe what to render
    pub fn snapshot(&mut self) -> GridSnapshot {
        let ready = self.phase == GridPhase::Ready;

        let (rows, counters, max_page) = if ready {
            let window = self.view.page_window(&self.pagination);
            let total = self.view.row_count();
            let rows = self.view.page_rows(&self.pagination);
            let counters = RowCounters {
                start: if rows.is_empty() { 0 } else { window.range.start + 1 },
                end: window.range.end,
                total,
                fetched: self.view.source_row_count(),
            };
            (rows, counters, window.max_page)
        } else {
            (Vec::new(), RowCounters::default(), 0)
        };

        let page = self.pagination.current_page.min(max_page);
        let controls = ControlState {
            search: ready,
            headers: ready,
            page_size: ready,
            first: ready && page > 0,
            previous: ready && page > 0,
            next: ready && page < max_page,
            last: ready && page < max_page,
            retry: self.phase == GridPhase::Error,
        };

        GridSnapshot {
            phase: self.phase,
            empty_visible: ready && counters.total == 0,
            loading_visible: self.phase == GridPhase::Loading,
            error: if self.phase == GridPhase::Error {
                self.error.clone()
            } else {
                None
            },
            rows,
            headers: self.header_states(),
            search_text: self.search_text.clone(),
            page_size: self.pagination.page_size,
            page_size_options: self.options.page_size_options.clone(),
            current_page: page,
            max_page,
            counters,
            controls,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::row::DataValue;
    use crate::state::persistence::MemorySessionStore;
    use crate::utils::clock::ManualClock;
    use async_trait::async_trait;

    struct NoSource;

    #[async_trait]
    impl DataSource for NoSource {
        async fn fetch(&self, _request: &SourceRequest) -> Result<Vec<Row>, FetchError> {
            Ok(Vec::new())
        }
    }

    fn named(names: &[&str]) -> Vec<Row> {
        names
            .iter()
            .map(|n| Row::new().with("name", DataValue::String(n.to_string())))
            .collect()
    }

    fn controller(store: &MemorySessionStore, clock: &ManualClock) -> GridController {
        let options = GridOptions::new("users", "mem://users")
            .with_columns(vec![ColumnDef::sortable("name"), ColumnDef::fixed("email")])
            .with_default_page_size(2);
        GridController::with_clock(
            options,
            Arc::new(NoSource),
            Arc::new(store.clone()),
            Arc::new(clock.clone()),
        )
    }

    fn ready(names: &[&str]) -> (GridController, MemorySessionStore, ManualClock) {
        let store = MemorySessionStore::new();
        let clock = ManualClock::new();
        let mut grid = controller(&store, &clock);
        grid.initialize();
        let pending = grid.begin_load();
        assert!(grid.complete_load(pending.id(), Ok(named(names))));
        (grid, store, clock)
    }

    fn shown(grid: &mut GridController) -> Vec<String> {
        grid.snapshot()
            .rows
            .iter()
            .map(|r| r.get("name").to_string())
            .collect()
    }

    #[test]
    fn test_controls_disabled_until_ready() {
        let store = MemorySessionStore::new();
        let clock = ManualClock::new();
        let mut grid = controller(&store, &clock);
        grid.initialize();
        assert_eq!(grid.snapshot().controls, ControlState::default());

        let pending = grid.begin_load();
        let snapshot = grid.snapshot();
        assert!(snapshot.loading_visible);
        assert_eq!(snapshot.controls, ControlState::default());
        assert!(!grid.on_header_activated("name"));
        assert!(!grid.on_search_input("x"));

        grid.complete_load(pending.id(), Ok(named(&["a"])));
        let snapshot = grid.snapshot();
        assert!(snapshot.controls.search && snapshot.controls.headers);
        assert!(!snapshot.controls.retry);
    }

    #[test]
    fn test_search_applies_only_after_debounce() {
        let (mut grid, store, clock) = ready(&["Alpha", "Beta", "Alpine"]);

        grid.on_search_input("A");
        clock.advance_ms(100);
        grid.on_search_input("Al");
        clock.advance_ms(249);
        assert!(grid.tick().is_none());
        assert_eq!(shown(&mut grid), vec!["Alpha", "Beta"]);

        clock.advance_ms(1);
        assert!(grid.tick().is_none());
        assert_eq!(grid.search(), "Al");
        assert_eq!(shown(&mut grid), vec!["Alpha", "Alpine"]);
        assert_eq!(store.get("users_search").as_deref(), Some("Al"));
    }

    #[test]
    fn test_confirm_skips_debounce() {
        let (mut grid, _store, _clock) = ready(&["Alpha", "Beta"]);
        grid.on_search_input("bet");
        assert!(grid.confirm_search().is_none());
        assert_eq!(shown(&mut grid), vec!["Beta"]);
        assert!(!grid.search_pending());
    }

    #[test]
    fn test_search_resets_page() {
        let (mut grid, store, _clock) = ready(&["a1", "a2", "a3", "b1", "b2"]);
        assert!(grid.on_navigate(PageNav::Last));
        assert_eq!(grid.pagination().current_page, 2);

        grid.on_search_input("a");
        grid.confirm_search();
        assert_eq!(grid.pagination().current_page, 0);
        assert_eq!(store.get("users_currentPage").as_deref(), Some("0"));
    }

    #[test]
    fn test_header_states_follow_sort() {
        let (mut grid, store, _clock) = ready(&["b", "a"]);
        assert!(grid.on_header_activated("name"));
        let header = &grid.snapshot().headers[0];
        assert_eq!(header.direction, Some(SortDirection::Asc));
        assert_eq!(header.aria_sort, "ascending");
        assert_eq!(header.indicator, "↑");
        assert_eq!(header.precedence, Some(1));
        assert_eq!(
            store.get("users_sort").as_deref(),
            Some(r#"[{"property":"name","direction":"asc"}]"#)
        );

        assert_eq!(grid.snapshot().headers[1].aria_sort, "none");
    }

    #[test]
    fn test_unsortable_and_unknown_columns_are_ignored() {
        let (mut grid, _store, _clock) = ready(&["b", "a"]);
        assert!(!grid.on_header_activated("email"));
        assert!(!grid.on_header_activated("nope"));
        assert!(grid.sort().is_empty());
    }

    #[test]
    fn test_page_size_change_clamps_page() {
        let (mut grid, store, _clock) = ready(&["a", "b", "c", "d", "e"]);
        grid.on_navigate(PageNav::Last);
        assert_eq!(grid.pagination().current_page, 2);

        assert!(grid.on_page_size_changed(4));
        assert_eq!(grid.pagination().current_page, 1);
        assert_eq!(shown(&mut grid), vec!["e"]);
        assert_eq!(store.get("users_perPage").as_deref(), Some("4"));
        assert_eq!(store.get("users_currentPage").as_deref(), Some("1"));

        assert!(!grid.on_page_size_changed(0));
        assert_eq!(grid.pagination().page_size, 4);
    }

    #[test]
    fn test_navigation_and_counters() {
        let (mut grid, _store, _clock) = ready(&["a", "b", "c", "d", "e"]);
        let snapshot = grid.snapshot();
        assert_eq!(
            snapshot.counters,
            RowCounters {
                start: 1,
                end: 2,
                total: 5,
                fetched: 5
            }
        );
        assert!(!snapshot.controls.first && !snapshot.controls.previous);
        assert!(snapshot.controls.next && snapshot.controls.last);

        assert!(!grid.on_navigate(PageNav::Previous));
        assert!(grid.on_navigate(PageNav::Next));
        assert_eq!(shown(&mut grid), vec!["c", "d"]);
        assert!(grid.on_navigate(PageNav::Last));
        assert!(!grid.on_navigate(PageNav::Next));

        let snapshot = grid.snapshot();
        assert_eq!(snapshot.counters.start, 5);
        assert_eq!(snapshot.counters.end, 5);
        assert!(snapshot.controls.first && !snapshot.controls.last);
        assert!(grid.on_navigate(PageNav::First));
        assert_eq!(grid.pagination().current_page, 0);
    }

    #[test]
    fn test_retry_only_from_error() {
        let (mut grid, _store, _clock) = ready(&["a"]);
        assert!(grid.retry().is_none());

        let pending = grid.reload();
        grid.complete_load(pending.id(), Err(FetchError::Status(500)));
        assert_eq!(grid.phase(), GridPhase::Error);
        assert!(grid.retry().is_some());
        assert_eq!(grid.phase(), GridPhase::Loading);
    }

    #[test]
    fn test_superseded_cancellation_never_shows_error() {
        let (mut grid, _store, _clock) = ready(&["a"]);
        let first = grid.reload();
        let second = grid.reload();
        assert!(!grid.complete_load(first.id(), Err(FetchError::Cancelled)));
        assert_eq!(grid.phase(), GridPhase::Loading);
        assert_eq!(grid.snapshot().error, None);

        assert!(grid.complete_load(second.id(), Ok(named(&["b"]))));
        assert_eq!(grid.phase(), GridPhase::Ready);
    }

    #[test]
    fn test_source_cancelling_current_load_is_retryable() {
        let (mut grid, _store, _clock) = ready(&["a"]);
        let pending = grid.reload();
        assert!(grid.complete_load(pending.id(), Err(FetchError::Cancelled)));

        let snapshot = grid.snapshot();
        assert_eq!(snapshot.phase, GridPhase::Error);
        assert!(!snapshot.loading_visible);
        assert!(snapshot.controls.retry);
        assert!(grid.retry().is_some());
    }

    #[test]
    fn test_request_state_keeps_rows_after_load() {
        let (mut grid, _store, _clock) = ready(&["a", "b", "c"]);
        assert_eq!(shown(&mut grid).len(), 2);
        match grid.request_state() {
            RequestState::Success(rows) => assert_eq!(rows.len(), 3),
            other => panic!("expected success, got {other:?}"),
        }
    }

    #[test]
    fn test_cancel_load_returns_to_previous_rows() {
        let (mut grid, _store, _clock) = ready(&["a", "b"]);
        let pending = grid.reload();
        assert!(grid.cancel_load());
        assert_eq!(grid.phase(), GridPhase::Ready);
        assert_eq!(shown(&mut grid), vec!["a", "b"]);

        // The abandoned load is stale now
        assert!(!grid.complete_load(pending.id(), Ok(named(&["z"]))));
        assert!(!grid.cancel_load());
    }

    #[test]
    fn test_cancel_first_load_allows_retry() {
        let store = MemorySessionStore::new();
        let clock = ManualClock::new();
        let mut grid = controller(&store, &clock);
        grid.initialize();
        grid.begin_load();

        assert!(grid.cancel_load());
        let snapshot = grid.snapshot();
        assert_eq!(snapshot.phase, GridPhase::Error);
        assert_eq!(snapshot.error.as_deref(), Some("load cancelled"));
        assert!(grid.retry().is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_abort_future_cancels_slow_load() {
        struct SlowSource;

        #[async_trait]
        impl DataSource for SlowSource {
            async fn fetch(&self, _request: &SourceRequest) -> Result<Vec<Row>, FetchError> {
                tokio::time::sleep(Duration::from_secs(10)).await;
                Ok(named(&["late"]))
            }
        }

        let options = GridOptions::new("slow", "mem://slow");
        let mut grid = GridController::with_clock(
            options,
            Arc::new(SlowSource),
            Arc::new(MemorySessionStore::new()),
            Arc::new(ManualClock::new()),
        );
        grid.initialize();
        let pending = grid.begin_load();

        let abort = tokio::time::sleep(Duration::from_secs(1));
        assert!(grid.drive_or_abort(Some(pending), abort).await);
        assert_eq!(grid.phase(), GridPhase::Error);
        assert_eq!(grid.request_state(), &RequestState::Idle);
    }

    #[test]
    fn test_form_submit_persists_and_sends_values() {
        let (mut grid, store, _clock) = ready(&["a"]);
        let mut form = FormValues::new();
        form.insert("role".to_string(), "admin".to_string());

        let pending = grid.on_form_submitted(form.clone());
        assert_eq!(pending.request().form.as_ref(), Some(&form));
        assert_eq!(
            store.get("users_formData").as_deref(),
            Some(r#"{"role":"admin"}"#)
        );
    }

    #[test]
    fn test_result_cap_limits_total_and_pages() {
        let store = MemorySessionStore::new();
        let clock = ManualClock::new();
        let options = GridOptions::new("capped", "mem://capped")
            .with_default_page_size(2)
            .with_max_results(Some(3));
        let mut grid = GridController::with_clock(
            options,
            Arc::new(NoSource),
            Arc::new(store),
            Arc::new(clock),
        );
        grid.initialize();
        let pending = grid.begin_load();
        grid.complete_load(pending.id(), Ok(named(&["a", "b", "c", "d", "e"])));

        let snapshot = grid.snapshot();
        assert_eq!(snapshot.counters.total, 3);
        assert_eq!(snapshot.counters.fetched, 5);
        assert_eq!(snapshot.max_page, 1);
    }
}
