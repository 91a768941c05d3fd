//! Services layer
//!
//! Everything that talks to the outside world on behalf of a grid: the data
//! source seam and the lifecycle of the single in-flight request.

pub mod data_source;
pub mod fetch_error;
pub mod request_lifecycle;

pub use data_source::{DataSource, FormValues, HttpDataSource, SourceRequest};
pub use fetch_error::{FetchError, FetchErrorKind};
pub use request_lifecycle::{RequestLifecycle, RequestState, RequestTicket};
