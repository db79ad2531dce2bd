use crate::errors::{Result, StatusError};
use bytes::Bytes;
use serde::de::DeserializeOwned;
use std::ops::RangeInclusive;
use std::path::PathBuf;
use url::Url;

/// Terminal outcome of one call: a materialized response or an error.
pub type CallResult = Result<Response>;

/// Materialized transport response.
#[derive(Debug, Clone)]
pub struct Response {
    pub status_code: u16,
    pub body: Bytes,
    pub headers: Vec<(String, String)>,
    /// Final URL as reported by the transport, if known.
    pub url: Option<Url>,
    /// Set for download tasks: where the body was written.
    pub destination: Option<PathBuf>,
}

impl Response {
    pub fn new(status_code: u16, body: impl Into<Bytes>) -> Self {
        Response {
            status_code,
            body: body.into(),
            headers: Vec::new(),
            url: None,
            destination: None,
        }
    }

    pub fn header(&self, name: impl AsRef<str>) -> Option<&str> {
        let name = name.as_ref();
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Rejects the response unless its status lies in `range`.
    pub fn filter_status(&self, range: RangeInclusive<u16>) -> Result<&Self> {
        if range.contains(&self.status_code) {
            Ok(self)
        } else {
            Err(StatusError::Unacceptable(self.status_code).into())
        }
    }

    /// Rejects non-2xx responses.
    pub fn filter_successful_status(&self) -> Result<&Self> {
        self.filter_status(200..=299)
    }

    pub fn text(&self) -> Result<String> {
        Ok(String::from_utf8(self.body.to_vec())?)
    }

    pub fn json<T: DeserializeOwned>(&self) -> Result<T> {
        Ok(serde_json::from_slice(&self.body)?)
    }
}
