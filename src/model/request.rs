use crate::errors::{MaterializeError, Result};
use crate::model::endpoint::Endpoint;
use crate::model::headers::Headers;
use crate::model::method::Method;
use crate::model::target::Task;
use url::Url;
use uuid::Uuid;

/// Fully materialized, transport-ready request.
///
/// Produced by the request-builder hook; the default builder parses the
/// endpoint URL and copies everything else over. The `id` correlates log
/// lines across the pipeline for one call.
#[derive(Debug, Clone)]
pub struct Request {
    pub id: Uuid,
    pub url: Url,
    pub method: Method,
    pub headers: Headers,
    pub timeout: u64,
    pub task: Task,
}

impl Request {
    /// Default materialization. URL parse failure is the one thing that can
    /// go wrong here and surfaces as a `Materialize` error.
    pub fn from_endpoint(endpoint: &Endpoint) -> Result<Self> {
        let url = Url::parse(&endpoint.url)
            .map_err(|e| MaterializeError::InvalidUrl(format!("{}: {e}", endpoint.url)))?;
        Ok(Request {
            id: Uuid::now_v7(),
            url,
            method: endpoint.method,
            headers: endpoint.headers.clone(),
            timeout: endpoint.timeout,
            task: endpoint.task.clone(),
        })
    }

    pub fn with_header(mut self, key: impl AsRef<str>, value: impl AsRef<str>) -> Self {
        self.headers.insert(key, value);
        self
    }
}
