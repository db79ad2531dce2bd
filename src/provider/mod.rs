mod stub;
#[cfg(test)]
mod tests;

use crate::errors::{BoxError, Error, ErrorKind, Result};
use crate::inflight::{InflightRegistry, Waiter};
use crate::model::endpoint::Endpoint;
use crate::model::progress::ProgressSink;
use crate::model::request::Request;
use crate::model::response::CallResult;
use crate::model::stub::StubBehavior;
use crate::model::target::{Target, Task};
use crate::plugin::Plugin;
use crate::token::CancelToken;
use crate::transport::{HttpTransport, Transport};
use futures::future::BoxFuture;
use log::{debug, warn};
use metrics::counter;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;

/// Maps a target to the endpoint that keys and describes its call.
pub type EndpointResolver<T> = Arc<dyn Fn(&T) -> Endpoint + Send + Sync>;

/// Materializes an endpoint into a transport-ready request. Async so that
/// implementations can fetch credentials or sign the request.
pub type RequestBuilderHook =
    Arc<dyn Fn(Endpoint) -> BoxFuture<'static, Result<Request>> + Send + Sync>;

/// Chooses the stub behavior for a target.
pub type StubPolicy<T> = Arc<dyn Fn(&T) -> StubBehavior + Send + Sync>;

pub fn default_resolver<T: Target>() -> EndpointResolver<T> {
    Arc::new(|target| Endpoint::from_target(target))
}

pub fn default_request_builder() -> RequestBuilderHook {
    Arc::new(|endpoint| Box::pin(async move { Request::from_endpoint(&endpoint) }))
}

pub fn never_stub<T>() -> StubPolicy<T> {
    Arc::new(|_| StubBehavior::Never)
}

pub fn immediate_stub<T>() -> StubPolicy<T> {
    Arc::new(|_| StubBehavior::Immediate)
}

pub fn delayed_stub<T>(delay: Duration) -> StubPolicy<T> {
    Arc::new(move |_| StubBehavior::Delayed(delay))
}

/// Per-call knobs that are not part of the target description.
#[derive(Clone, Default)]
pub struct CallOptions {
    pub progress: Option<ProgressSink>,
}

impl CallOptions {
    pub fn new() -> Self {
        CallOptions::default()
    }

    pub fn with_progress(mut self, sink: impl Fn(crate::model::Progress) + Send + Sync + 'static) -> Self {
        self.progress = Some(Arc::new(sink));
        self
    }
}

/// Request orchestrator for one target family.
///
/// A provider owns the hook chain (resolver, request builder, stub policy),
/// the plugin list and the transport, and optionally an in-flight table
/// that collapses concurrent identical calls. Cloning a provider shares all
/// of these.
pub struct Provider<T: Target> {
    resolver: EndpointResolver<T>,
    request_builder: RequestBuilderHook,
    stub_policy: StubPolicy<T>,
    transport: Arc<dyn Transport>,
    plugins: Vec<Arc<dyn Plugin>>,
    registry: Option<Arc<InflightRegistry>>,
}

impl<T: Target> Clone for Provider<T> {
    fn clone(&self) -> Self {
        Provider {
            resolver: self.resolver.clone(),
            request_builder: self.request_builder.clone(),
            stub_policy: self.stub_policy.clone(),
            transport: self.transport.clone(),
            plugins: self.plugins.clone(),
            registry: self.registry.clone(),
        }
    }
}

impl<T: Target> Default for Provider<T> {
    fn default() -> Self {
        Provider::builder().build()
    }
}

impl<T: Target> Provider<T> {
    /// Default provider: one-to-one resolver, URL-parsing builder, no
    /// stubbing, HTTP transport, no plugins, no in-flight tracking.
    pub fn new() -> Self {
        Provider::default()
    }

    pub fn builder() -> ProviderBuilder<T> {
        ProviderBuilder::new()
    }

    /// Number of endpoint keys currently in flight. Zero when tracking is
    /// disabled.
    pub fn inflight_len(&self) -> usize {
        self.registry.as_ref().map(|r| r.len()).unwrap_or(0)
    }

    /// Dispatches a call and returns its cancellation handle. `completion`
    /// runs exactly once with the terminal result, on a runtime worker
    /// task. Deduplicated waiters are assigned the shared result value in
    /// registration order, but the relative execution order of their
    /// completion callbacks is unspecified.
    ///
    /// Panics on configuration faults: a multipart task with zero parts, or
    /// a body-carrying task on a bodyless method. These are programming
    /// errors in the target definition, not runtime failures.
    pub fn dispatch<F>(&self, target: &T, options: CallOptions, completion: F) -> CancelToken
    where
        F: FnOnce(CallResult) + Send + 'static,
    {
        let endpoint = (self.resolver)(target);
        validate_task(&endpoint);
        let behavior = (self.stub_policy)(target);
        debug!(
            "dispatching call: method={} url={} stubbed={}",
            endpoint.method,
            endpoint.url,
            behavior.is_stubbed()
        );

        let token = CancelToken::new();
        let (tx, rx) = oneshot::channel();
        let waiter = Waiter::new(token.clone(), tx);
        spawn_delivery(rx, completion);

        let sink = match &self.registry {
            Some(registry) => {
                if registry.try_register(&endpoint, waiter) {
                    // Joined an operation already in flight; its fan-out
                    // will complete this waiter.
                    return token;
                }
                ResultSink::Tracked {
                    registry: registry.clone(),
                    key: endpoint.clone(),
                }
            }
            None => ResultSink::Direct { waiter },
        };

        let call = Call {
            endpoint,
            behavior,
            request_builder: self.request_builder.clone(),
            plugins: self.plugins.clone(),
            transport: self.transport.clone(),
            token: token.clone(),
            sink,
            progress: options.progress,
        };
        tokio::spawn(run_call(call));
        token
    }

    /// Awaitable form of [`Provider::dispatch`] with default options.
    pub async fn request(&self, target: &T) -> CallResult {
        let (tx, rx) = oneshot::channel();
        self.dispatch(target, CallOptions::default(), move |result| {
            let _ = tx.send(result);
        });
        rx.await.unwrap_or_else(|_| Err(delivery_lost()))
    }
}

pub struct ProviderBuilder<T: Target> {
    resolver: EndpointResolver<T>,
    request_builder: RequestBuilderHook,
    stub_policy: StubPolicy<T>,
    transport: Option<Arc<dyn Transport>>,
    plugins: Vec<Arc<dyn Plugin>>,
    track_inflights: bool,
}

impl<T: Target> ProviderBuilder<T> {
    pub fn new() -> Self {
        ProviderBuilder {
            resolver: default_resolver(),
            request_builder: default_request_builder(),
            stub_policy: never_stub(),
            transport: None,
            plugins: Vec::new(),
            track_inflights: false,
        }
    }

    pub fn with_resolver(mut self, resolver: impl Fn(&T) -> Endpoint + Send + Sync + 'static) -> Self {
        self.resolver = Arc::new(resolver);
        self
    }

    pub fn with_request_builder(
        mut self,
        builder: impl Fn(Endpoint) -> BoxFuture<'static, Result<Request>> + Send + Sync + 'static,
    ) -> Self {
        self.request_builder = Arc::new(builder);
        self
    }

    pub fn with_stub_policy(
        mut self,
        policy: impl Fn(&T) -> StubBehavior + Send + Sync + 'static,
    ) -> Self {
        self.stub_policy = Arc::new(policy);
        self
    }

    pub fn with_transport(mut self, transport: impl Transport) -> Self {
        self.transport = Some(Arc::new(transport));
        self
    }

    pub fn with_plugin(mut self, plugin: impl Plugin + 'static) -> Self {
        self.plugins.push(Arc::new(plugin));
        self
    }

    /// Collapses concurrent calls with identical endpoints into a single
    /// transport operation whose result fans out to every caller.
    pub fn track_inflights(mut self) -> Self {
        self.track_inflights = true;
        self
    }

    pub fn build(self) -> Provider<T> {
        Provider {
            resolver: self.resolver,
            request_builder: self.request_builder,
            stub_policy: self.stub_policy,
            transport: self
                .transport
                .unwrap_or_else(|| Arc::new(HttpTransport::new())),
            plugins: self.plugins,
            registry: self
                .track_inflights
                .then(|| Arc::new(InflightRegistry::new())),
        }
    }
}

impl<T: Target> Default for ProviderBuilder<T> {
    fn default() -> Self {
        ProviderBuilder::new()
    }
}

/// Where a call's terminal result goes: a tracked call fans out through the
/// registry, an untracked call completes its single waiter directly.
enum ResultSink {
    Tracked {
        registry: Arc<InflightRegistry>,
        key: Endpoint,
    },
    Direct {
        waiter: Waiter,
    },
}

impl ResultSink {
    fn deliver(self, result: CallResult) {
        match self {
            ResultSink::Tracked { registry, key } => registry.fan_out(&key, result),
            ResultSink::Direct { waiter } => waiter.deliver(result),
        }
    }

    /// Whether anyone still wants this call's result: for a tracked call,
    /// any non-cancelled waiter under the key; for an untracked call, the
    /// lone waiter itself.
    fn has_live_waiters(&self) -> bool {
        match self {
            ResultSink::Tracked { registry, key } => registry.has_live_waiters(key),
            ResultSink::Direct { waiter } => !waiter.token.is_cancelled(),
        }
    }

    /// Arms `token` with the abort action for the running transport task.
    /// For a tracked call the transport is shared, so it is only aborted
    /// once no live waiter remains for the key.
    fn arm(&self, token: &CancelToken, abort: tokio::task::AbortHandle) {
        match self {
            ResultSink::Tracked { registry, key } => {
                let registry = registry.clone();
                let key = key.clone();
                token.arm(Box::new(move || {
                    if !registry.has_live_waiters(&key) {
                        abort.abort();
                    }
                }));
            }
            ResultSink::Direct { .. } => {
                token.arm(Box::new(move || abort.abort()));
            }
        }
    }
}

/// Everything one in-flight call carries through the pipeline.
struct Call {
    endpoint: Endpoint,
    behavior: StubBehavior,
    request_builder: RequestBuilderHook,
    plugins: Vec<Arc<dyn Plugin>>,
    transport: Arc<dyn Transport>,
    token: CancelToken,
    sink: ResultSink,
    progress: Option<ProgressSink>,
}

async fn run_call(call: Call) {
    let request = match (call.request_builder)(call.endpoint.clone()).await {
        Ok(request) => request,
        Err(e) => {
            // Materialization failed before any plugin saw the request;
            // every registered waiter gets the same error.
            warn!("request build failed: url={} error={e}", call.endpoint.url);
            call.sink.deliver(Err(e));
            return;
        }
    };

    match call.behavior {
        StubBehavior::Never => {
            // A cancelled caller only skips the transport when no live
            // waiter remains under the key; otherwise the shared call
            // proceeds and fan-out substitutes the cancellation for the
            // cancelled waiter alone.
            if call.token.is_cancelled() && !call.sink.has_live_waiters() {
                let result = Err(Error::cancelled());
                for plugin in &call.plugins {
                    plugin.after_receive(&result, &call.endpoint).await;
                }
                call.sink.deliver(result);
                return;
            }
            run_network(call, request).await
        }
        // Stub-bound calls observe cancellation once, when the stub fires.
        behavior => stub::run_stub(call, request, behavior).await,
    }
}

async fn run_network(call: Call, request: Request) {
    let mut request = request;
    for plugin in &call.plugins {
        request = plugin.before_send(request, &call.endpoint).await;
    }

    let destination = match &request.task {
        Task::Download { destination } => Some(destination.clone()),
        _ => None,
    };

    let transport = call.transport.clone();
    let progress = call.progress.clone();
    let handle = tokio::spawn(async move {
        match request.task.clone() {
            Task::UploadFile(file) => transport.upload_file(request, file, progress).await,
            Task::UploadMultipart(parts) => {
                transport.upload_multipart(request, parts, progress).await
            }
            Task::Download { destination } => {
                transport.download(request, destination, progress).await
            }
            Task::Plain | Task::Payload { .. } => transport.execute(request, progress).await,
        }
    });
    call.sink.arm(&call.token, handle.abort_handle());

    let result = match handle.await {
        Ok(raw) => raw.into_result(),
        Err(e) if e.is_cancelled() => Err(Error::cancelled()),
        Err(e) => {
            warn!("transport task failed: url={} error={e}", call.endpoint.url);
            Err(Error::with_message(
                ErrorKind::Underlying,
                "transport task failed",
                Some(e),
            ))
        }
    };
    let result = result.map(|mut response| {
        if let Some(destination) = destination {
            response.destination = Some(destination);
        }
        response
    });

    let outcome = if result.is_ok() { "success" } else { "failure" };
    counter!("courier_calls_total", "outcome" => outcome).increment(1);

    for plugin in &call.plugins {
        plugin.after_receive(&result, &call.endpoint).await;
    }
    call.sink.deliver(result);
}

fn spawn_delivery<F>(rx: oneshot::Receiver<CallResult>, completion: F)
where
    F: FnOnce(CallResult) + Send + 'static,
{
    tokio::spawn(async move {
        let result = rx.await.unwrap_or_else(|_| Err(delivery_lost()));
        completion(result);
    });
}

fn delivery_lost() -> Error {
    Error::with_message(
        ErrorKind::Underlying,
        "result channel closed before delivery",
        None::<BoxError>,
    )
}

fn validate_task(endpoint: &Endpoint) {
    match &endpoint.task {
        Task::UploadMultipart(parts) if parts.is_empty() => {
            panic!(
                "configuration fault: multipart task with zero parts for {}",
                endpoint.url
            );
        }
        Task::UploadMultipart(_) | Task::Payload { .. } | Task::UploadFile(_)
            if !endpoint.method.allows_body() =>
        {
            panic!(
                "configuration fault: {} task on bodyless method {} for {}",
                task_name(&endpoint.task),
                endpoint.method,
                endpoint.url
            );
        }
        _ => {}
    }
}

fn task_name(task: &Task) -> &'static str {
    match task {
        Task::Plain => "plain",
        Task::Payload { .. } => "payload",
        Task::UploadFile(_) => "upload-file",
        Task::UploadMultipart(_) => "multipart",
        Task::Download { .. } => "download",
    }
}
