//! Utility functions and helpers
//!
//! Timers, clocks, logging setup and filesystem locations shared by the
//! grid engine and the terminal front end.

pub mod app_paths;
pub mod clock;
pub mod debouncer;
pub mod logging;
