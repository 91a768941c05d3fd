use async_trait::async_trait;
use serde_json::Value;
use std::collections::BTreeMap;
use tracing::debug;

use crate::data::row::{rows_from_json, Row};
use crate::services::fetch_error::FetchError;

/// Field values of an external form, by field name
pub type FormValues = BTreeMap<String, String>;

/// What to ask the data source for
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SourceRequest {
    pub url: String,
    /// Present when the grid is driven by an external form
    pub form: Option<FormValues>,
    /// Present only for server-side search
    pub search: Option<String>,
}

impl SourceRequest {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            form: None,
            search: None,
        }
    }

    pub fn with_form(mut self, form: Option<FormValues>) -> Self {
        self.form = form;
        self
    }

    pub fn with_search(mut self, search: Option<String>) -> Self {
        self.search = search.filter(|s| !s.trim().is_empty());
        self
    }
}

/// Something that answers a request with a list of rows
#[async_trait]
pub trait DataSource: Send + Sync {
    async fn fetch(&self, request: &SourceRequest) -> Result<Vec<Row>, FetchError>;
}

/// Data source backed by an HTTP endpoint returning a JSON array
#[derive(Clone)]
pub struct HttpDataSource {
    client: reqwest::Client,
}

impl HttpDataSource {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }

    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

impl Default for HttpDataSource {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DataSource for HttpDataSource {
    async fn fetch(&self, request: &SourceRequest) -> Result<Vec<Row>, FetchError> {
        let mut builder = match &request.form {
            // Form-driven grids submit like the form would
            Some(form) => self.client.post(&request.url).form(form),
            None => self.client.get(&request.url),
        };
        if let Some(search) = &request.search {
            builder = builder.query(&[("search", search)]);
        }

        debug!(target: "request", "Fetching {}", request.url);
        let response = builder.send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status(status.as_u16()));
        }

        let body: Value = response.json().await?;
        rows_from_json(&body).map_err(FetchError::Schema)
    }
}
