//! Messages from the UI binding layer to the grid controller

use crate::data::pagination::PageNav;
use crate::services::data_source::FormValues;

/// User interactions a grid reacts to
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GridEvent {
    /// A keystroke changed the search box
    SearchChanged(String),

    /// Enter in the search box: apply the pending text now
    SearchConfirmed,

    /// A column header was clicked
    HeaderActivated(String),

    PageSizeChanged(usize),

    Navigate(PageNav),

    /// The bound external form was submitted
    FormSubmitted(FormValues),

    /// Retry button in the error state
    Retry,

    /// Re-query the data source with the current parameters
    Reload,
}
