// Core model
pub use crate::model::{
    CallResult, Endpoint, Headers, Method, Part, Progress, ProgressSink, Request, Response,
    Sample, SampleSource, StubBehavior, Target, Task,
};

// Errors
pub use crate::errors::{
    BoxError, DecodeError, Error, ErrorKind, MaterializeError, Result, StatusError,
    TransportError,
};

// Orchestration
pub use crate::provider::{
    default_request_builder, default_resolver, delayed_stub, immediate_stub, never_stub,
    CallOptions, EndpointResolver, Provider, ProviderBuilder, RequestBuilderHook, StubPolicy,
};
pub use crate::token::CancelToken;

// Seams
pub use crate::inflight::{InflightRegistry, Waiter};
pub use crate::plugin::{LoggerPlugin, Plugin};
pub use crate::transport::{HttpTransport, RawResponse, Transport};
