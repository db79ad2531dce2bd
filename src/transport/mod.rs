pub mod http;

pub use http::HttpTransport;

use crate::errors::Error;
use crate::model::progress::ProgressSink;
use crate::model::request::Request;
use crate::model::response::{CallResult, Response};
use crate::model::target::Part;
use async_trait::async_trait;
use bytes::Bytes;
use std::path::PathBuf;
use url::Url;

/// Raw (status, body, error) triple reported by a transport operation.
/// The dispatch pipeline converts it into a [`CallResult`].
#[derive(Debug)]
pub struct RawResponse {
    pub status: Option<u16>,
    pub headers: Vec<(String, String)>,
    pub body: Bytes,
    pub url: Option<Url>,
    pub error: Option<Error>,
}

impl RawResponse {
    pub fn success(status: u16, headers: Vec<(String, String)>, body: Bytes, url: Url) -> Self {
        RawResponse {
            status: Some(status),
            headers,
            body,
            url: Some(url),
            error: None,
        }
    }

    pub fn failure(error: Error) -> Self {
        RawResponse {
            status: None,
            headers: Vec::new(),
            body: Bytes::new(),
            url: None,
            error: Some(error),
        }
    }

    pub fn into_result(self) -> CallResult {
        if let Some(error) = self.error {
            return Err(error);
        }
        Ok(Response {
            status_code: self.status.unwrap_or_default(),
            body: self.body,
            headers: self.headers,
            url: self.url,
            destination: None,
        })
    }
}

/// Seam to the underlying HTTP client.
///
/// One operation per task kind; every operation reports its outcome through
/// [`RawResponse`] rather than a `Result`, mirroring the raw triple the
/// wire client hands back. Implementations must be cancel-safe: the
/// pipeline aborts the task an operation runs on.
#[async_trait]
pub trait Transport: Send + Sync + 'static {
    fn name(&self) -> String;

    /// Plain or in-memory-payload request.
    async fn execute(&self, request: Request, progress: Option<ProgressSink>) -> RawResponse;

    async fn upload_file(
        &self,
        request: Request,
        file: PathBuf,
        progress: Option<ProgressSink>,
    ) -> RawResponse;

    async fn upload_multipart(
        &self,
        request: Request,
        parts: Vec<Part>,
        progress: Option<ProgressSink>,
    ) -> RawResponse;

    /// Streams the response body into `destination`.
    async fn download(
        &self,
        request: Request,
        destination: PathBuf,
        progress: Option<ProgressSink>,
    ) -> RawResponse;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::Error;

    #[test]
    fn test_raw_response_into_result() {
        let url = Url::parse("https://api.example.com/user/1").unwrap();
        let raw = RawResponse::success(200, vec![], Bytes::from_static(b"ok"), url);
        let response = raw.into_result().unwrap();
        assert_eq!(response.status_code, 200);
        assert_eq!(&response.body[..], b"ok");

        let raw = RawResponse::failure(Error::timeout());
        assert!(raw.into_result().unwrap_err().is_timeout());
    }
}
