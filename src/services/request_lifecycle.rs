//! Owns the single in-flight request of a grid.
//!
//! Starting a request cancels whatever was outstanding and bumps a
//! generation counter. A result is only accepted when it carries the current
//! generation, so a superseded request can resolve at any time without
//! touching newer state.

use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::data::row::Row;
use crate::services::data_source::{DataSource, SourceRequest};
use crate::services::fetch_error::FetchError;

#[derive(Debug, Clone, PartialEq)]
pub enum RequestState {
    Idle,
    Loading,
    /// Shared with the grid's view, so reading the state never copies rows
    Success(Arc<Vec<Row>>),
    /// Human-readable reason, shown next to the retry affordance
    Error(String),
}

/// Handle for one started request
#[derive(Debug, Clone)]
pub struct RequestTicket {
    id: u64,
    token: CancellationToken,
    timeout: Duration,
}

impl RequestTicket {
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Run the request against `source`, racing it against the timeout and
    /// against cancellation. Whichever settles first decides the outcome.
    pub async fn run<S>(&self, source: &S, request: &SourceRequest) -> Result<Vec<Row>, FetchError>
    where
        S: DataSource + ?Sized,
    {
        tokio::select! {
            biased;
            _ = self.token.cancelled() => Err(FetchError::Cancelled),
            result = tokio::time::timeout(self.timeout, source.fetch(request)) => match result {
                Ok(outcome) => outcome,
                Err(_) => {
                    self.token.cancel();
                    Err(FetchError::Timeout(self.timeout))
                }
            },
        }
    }
}

#[derive(Debug)]
pub struct RequestLifecycle {
    timeout: Duration,
    generation: u64,
    current: Option<CancellationToken>,
    state: RequestState,
}

impl RequestLifecycle {
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            generation: 0,
            current: None,
            state: RequestState::Idle,
        }
    }

    pub fn state(&self) -> &RequestState {
        &self.state
    }

    pub fn is_loading(&self) -> bool {
        matches!(self.state, RequestState::Loading)
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Start a new request, cancelling the outstanding one
    pub fn begin(&mut self) -> RequestTicket {
        if let Some(previous) = self.current.take() {
            if !previous.is_cancelled() {
                debug!(target: "request", "Cancelling superseded request {}", self.generation);
                previous.cancel();
            }
        }

        self.generation += 1;
        let token = CancellationToken::new();
        self.current = Some(token.clone());
        self.state = RequestState::Loading;

        debug!(target: "request", "Request {} started", self.generation);
        RequestTicket {
            id: self.generation,
            token,
            timeout: self.timeout,
        }
    }

    /// Record the outcome of request `id`. Returns false when the outcome was
    /// dropped because a newer request has started or the request was
    /// cancelled through [`RequestLifecycle::cancel`].
    ///
    /// The current request always settles, even when its data source reports
    /// `Cancelled` on its own: that still ends in `Error` so it can be retried.
    pub fn settle(&mut self, id: u64, outcome: Result<Vec<Row>, FetchError>) -> bool {
        if id != self.generation {
            debug!(
                target: "request",
                "Ignoring result of superseded request {} (current {})", id, self.generation
            );
            return false;
        }

        match outcome {
            Ok(rows) => {
                info!(target: "request", "Request {} returned {} rows", id, rows.len());
                self.state = RequestState::Success(Arc::new(rows));
            }
            Err(err) => {
                if err.is_user_visible() {
                    warn!(target: "request", "Request {} failed: {}", id, err);
                } else {
                    warn!(target: "request", "Request {} was aborted by its data source", id);
                }
                self.state = RequestState::Error(err.to_string());
            }
        }
        self.current = None;
        true
    }

    /// Rows of a `Success` state
    pub fn rows(&self) -> Option<Arc<Vec<Row>>> {
        match &self.state {
            RequestState::Success(rows) => Some(Arc::clone(rows)),
            _ => None,
        }
    }

    /// Abandon the outstanding request without starting another. Returns
    /// whether there was one.
    pub fn cancel(&mut self) -> bool {
        let Some(token) = self.current.take() else {
            return false;
        };
        token.cancel();
        debug!(target: "request", "Request {} abandoned", self.generation);
        // Make any late result stale
        self.generation += 1;
        if self.is_loading() {
            self.state = RequestState::Idle;
        }
        true
    }
}
