use crate::model::headers::Headers;
use crate::model::method::Method;
use crate::model::stub::Sample;
use bytes::Bytes;
use std::path::PathBuf;

/// What kind of transport operation a call performs.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Task {
    /// Bodyless request.
    Plain,
    /// Request with an in-memory body.
    Payload {
        body: Bytes,
        content_type: Option<String>,
    },
    /// Upload a file from disk.
    UploadFile(PathBuf),
    /// Upload a multipart form. Dispatching with zero parts is a
    /// configuration fault.
    UploadMultipart(Vec<Part>),
    /// Stream the response body to a destination file.
    Download { destination: PathBuf },
}

/// One part of a multipart form.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Part {
    pub name: String,
    pub data: Bytes,
    pub file_name: Option<String>,
    pub mime: Option<String>,
}

impl Part {
    pub fn new(name: impl Into<String>, data: impl Into<Bytes>) -> Self {
        Part {
            name: name.into(),
            data: data.into(),
            file_name: None,
            mime: None,
        }
    }

    pub fn with_file_name(mut self, file_name: impl Into<String>) -> Self {
        self.file_name = Some(file_name.into());
        self
    }

    pub fn with_mime(mut self, mime: impl Into<String>) -> Self {
        self.mime = Some(mime.into());
        self
    }
}

/// Caller-supplied description of an API call.
///
/// The dispatch pipeline never inspects a target directly; it only sees the
/// endpoint produced by the resolver hook. The default resolver maps this
/// trait one-to-one onto an [`crate::model::Endpoint`].
pub trait Target: Send + Sync + 'static {
    /// Full request URL.
    fn url(&self) -> String;

    fn method(&self) -> Method;

    fn headers(&self) -> Headers {
        Headers::default()
    }

    fn task(&self) -> Task {
        Task::Plain
    }

    /// Synthetic payload returned when this target is stubbed.
    fn sample(&self) -> Sample {
        Sample::Response {
            status: 200,
            body: Bytes::new(),
        }
    }

    /// Request timeout in seconds.
    fn timeout(&self) -> u64 {
        30
    }
}
