use crate::model::headers::Headers;
use crate::model::method::Method;
use crate::model::stub::Sample;
use crate::model::target::{Target, Task};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

/// Lazily evaluated sample generator. Resolved only when a stub fires.
pub type SampleSource = Arc<dyn Fn() -> Sample + Send + Sync>;

/// Resolved, transport-oriented description of a target.
///
/// Recreated per call by the resolver hook. Identity (`Eq`/`Hash`) covers
/// method, url, headers, task and timeout; the sample generator is excluded
/// so that stub configuration cannot split otherwise-identical calls in the
/// in-flight table.
#[derive(Clone)]
pub struct Endpoint {
    pub url: String,
    pub method: Method,
    pub headers: Headers,
    pub task: Task,
    pub timeout: u64,
    pub sample: SampleSource,
}

impl Endpoint {
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Endpoint {
            url: url.into(),
            method,
            headers: Headers::default(),
            task: Task::Plain,
            timeout: 30,
            sample: Arc::new(|| Sample::ok(bytes::Bytes::new())),
        }
    }

    /// Default resolver mapping: one endpoint per target, field for field.
    pub fn from_target<T: Target>(target: &T) -> Self {
        let sample = target.sample();
        Endpoint {
            url: target.url(),
            method: target.method(),
            headers: target.headers(),
            task: target.task(),
            timeout: target.timeout(),
            sample: Arc::new(move || sample.clone()),
        }
    }

    pub fn with_headers(mut self, headers: Headers) -> Self {
        self.headers.merge(&headers);
        self
    }

    pub fn with_task(mut self, task: Task) -> Self {
        self.task = task;
        self
    }

    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout = secs;
        self
    }

    pub fn with_sample(mut self, sample: impl Fn() -> Sample + Send + Sync + 'static) -> Self {
        self.sample = Arc::new(sample);
        self
    }
}

impl PartialEq for Endpoint {
    fn eq(&self, other: &Self) -> bool {
        self.method == other.method
            && self.url == other.url
            && self.headers == other.headers
            && self.task == other.task
            && self.timeout == other.timeout
    }
}

impl Eq for Endpoint {}

impl Hash for Endpoint {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.method.hash(state);
        self.url.hash(state);
        self.headers.hash(state);
        self.task.hash(state);
        self.timeout.hash(state);
    }
}

impl fmt::Debug for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Endpoint")
            .field("method", &self.method)
            .field("url", &self.url)
            .field("headers", &self.headers)
            .field("task", &self.task)
            .field("timeout", &self.timeout)
            .finish()
    }
}
