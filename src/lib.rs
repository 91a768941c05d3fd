//! A session-persistent data grid engine.
//!
//! Fetches rows from a data source, then filters, sorts and pages them on the
//! client while remembering the user's settings for the rest of the session.

pub mod config;
pub mod data;
pub mod grid_controller;
pub mod services;
pub mod state;
pub mod utils;

pub use data::row::{DataValue, Row};
pub use data::sort::{SortDirection, SortKey, SortSpec};
pub use grid_controller::{
    ColumnDef, ControlState, GridController, GridOptions, GridPhase, GridSnapshot, HeaderState,
    PendingLoad, RowCounters,
};
pub use services::{DataSource, FetchError, HttpDataSource, SourceRequest};
pub use state::{GridEvent, MemorySessionStore, SessionStore};
