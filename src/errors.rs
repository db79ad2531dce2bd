use std::error::Error as StdError;
use std::fmt;
use std::sync::Arc;
use thiserror::Error as ThisError;

/// Boxed error detail carried by the concrete error enums below.
pub type BoxError = Box<dyn StdError + Send + Sync + 'static>;

pub type Result<T> = std::result::Result<T, Error>;

/// Broad classification of a call failure.
///
/// `Underlying` covers everything the transport reports, including
/// cancellation, which is modelled as [`TransportError::Cancelled`].
/// Configuration faults (stub policy vs. branch disagreement, empty
/// multipart) are not representable here: they panic at the call site.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Underlying,
    Status,
    Materialize,
    Decode,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorKind::Underlying => write!(f, "underlying"),
            ErrorKind::Status => write!(f, "status"),
            ErrorKind::Materialize => write!(f, "materialize"),
            ErrorKind::Decode => write!(f, "decode"),
        }
    }
}

#[derive(Clone)]
pub struct ErrorInner {
    pub kind: ErrorKind,
    // Arc rather than Box: deduplicated waiters all receive a clone of the
    // same terminal result, so the error must be cheaply cloneable.
    pub source: Option<Arc<dyn StdError + Send + Sync + 'static>>,
    pub message: Option<String>,
}

#[derive(Clone)]
pub struct Error {
    pub inner: Box<ErrorInner>,
}

impl Error {
    pub fn new<E>(kind: ErrorKind, source: Option<E>) -> Error
    where
        E: Into<BoxError>,
    {
        Error {
            inner: Box::new(ErrorInner {
                kind,
                source: source.map(|e| Arc::from(e.into())),
                message: None,
            }),
        }
    }

    pub fn with_message<E>(kind: ErrorKind, message: impl Into<String>, source: Option<E>) -> Error
    where
        E: Into<BoxError>,
    {
        Error {
            inner: Box::new(ErrorInner {
                kind,
                source: source.map(|e| Arc::from(e.into())),
                message: Some(message.into()),
            }),
        }
    }

    /// The synthesized result a call receives when its token was cancelled.
    pub fn cancelled() -> Error {
        Error::from(TransportError::Cancelled)
    }

    pub fn timeout() -> Error {
        Error::from(TransportError::Timeout)
    }

    pub fn kind(&self) -> &ErrorKind {
        &self.inner.kind
    }

    pub fn is_underlying(&self) -> bool {
        matches!(self.inner.kind, ErrorKind::Underlying)
    }

    pub fn is_status(&self) -> bool {
        matches!(self.inner.kind, ErrorKind::Status)
    }

    pub fn is_materialize(&self) -> bool {
        matches!(self.inner.kind, ErrorKind::Materialize)
    }

    pub fn is_decode(&self) -> bool {
        matches!(self.inner.kind, ErrorKind::Decode)
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(
            self.transport_detail(),
            Some(TransportError::Cancelled)
        )
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self.transport_detail(), Some(TransportError::Timeout))
    }

    /// Status code of the rejected response, for `Status` errors.
    pub fn status_code(&self) -> Option<u16> {
        match self.detail::<StatusError>() {
            Some(StatusError::Unacceptable(code)) => Some(*code),
            None => None,
        }
    }

    fn transport_detail(&self) -> Option<&TransportError> {
        self.detail::<TransportError>()
    }

    fn detail<E: StdError + 'static>(&self) -> Option<&E> {
        self.inner
            .source
            .as_deref()
            .and_then(|source| source.downcast_ref::<E>())
    }
}

impl fmt::Debug for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut f = f.debug_struct("courier::Error");
        f.field("kind", &self.inner.kind);
        if let Some(ref message) = self.inner.message {
            f.field("message", message);
        }
        if let Some(ref source) = self.inner.source {
            f.field("source", source);
        }
        f.finish()
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(ref message) = self.inner.message {
            write!(f, "{} error: {}", self.inner.kind, message)?;
        } else {
            write!(f, "{} error", self.inner.kind)?;
        }

        if let Some(ref source) = self.inner.source {
            write!(f, ": {source}")?;
        }

        Ok(())
    }
}

impl StdError for Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.inner
            .source
            .as_ref()
            .map(|e| &**e as &(dyn StdError + 'static))
    }
}

impl From<TransportError> for Error {
    fn from(err: TransportError) -> Self {
        Error::new(ErrorKind::Underlying, Some(err))
    }
}

impl From<StatusError> for Error {
    fn from(err: StatusError) -> Self {
        Error::new(ErrorKind::Status, Some(err))
    }
}

impl From<MaterializeError> for Error {
    fn from(err: MaterializeError) -> Self {
        Error::new(ErrorKind::Materialize, Some(err))
    }
}

impl From<DecodeError> for Error {
    fn from(err: DecodeError) -> Self {
        Error::new(ErrorKind::Decode, Some(err))
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::from(DecodeError::Json(err.into()))
    }
}

impl From<std::string::FromUtf8Error> for Error {
    fn from(err: std::string::FromUtf8Error) -> Self {
        Error::from(DecodeError::Text(err.into()))
    }
}

impl From<url::ParseError> for Error {
    fn from(err: url::ParseError) -> Self {
        Error::from(MaterializeError::InvalidUrl(err.to_string()))
    }
}

/// Failures reported by the transport seam.
#[derive(Debug, ThisError)]
pub enum TransportError {
    #[error("request cancelled")]
    Cancelled,
    #[error("request timed out")]
    Timeout,
    #[error("connect failed: {0}")]
    Connect(#[source] BoxError),
    #[error("send failed: {0}")]
    Failed(#[source] BoxError),
    #[error("body read failed: {0}")]
    Body(#[source] BoxError),
    #[error("file io failed: {0}")]
    Io(#[source] BoxError),
}

/// Request materialization (builder hook) rejections.
#[derive(Debug, ThisError)]
pub enum MaterializeError {
    #[error("invalid url: {0}")]
    InvalidUrl(String),
    #[error("invalid header: {0}")]
    InvalidHeader(String),
    #[error("build rejected: {0}")]
    Rejected(#[source] BoxError),
}

#[derive(Debug, ThisError)]
pub enum StatusError {
    #[error("status code {0} outside the acceptable range")]
    Unacceptable(u16),
}

/// Response body mapping failures.
#[derive(Debug, ThisError)]
pub enum DecodeError {
    #[error("json decode failed: {0}")]
    Json(#[source] BoxError),
    #[error("text decode failed: {0}")]
    Text(#[source] BoxError),
}
