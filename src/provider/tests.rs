use super::*;
use crate::errors::MaterializeError;
use crate::model::headers::Headers;
use crate::model::method::Method;
use crate::model::stub::Sample;
use crate::model::target::Part;
use crate::transport::RawResponse;
use async_trait::async_trait;
use bytes::Bytes;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use tokio::time::Instant;

#[derive(Clone)]
struct MockTransport {
    calls: Arc<AtomicUsize>,
    delay: Duration,
    status: u16,
    body: Bytes,
}

impl MockTransport {
    fn new() -> Self {
        MockTransport {
            calls: Arc::new(AtomicUsize::new(0)),
            delay: Duration::ZERO,
            status: 200,
            body: Bytes::from_static(b"{\"id\":7}"),
        }
    }

    fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    async fn respond(&self, request: Request) -> RawResponse {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        RawResponse::success(self.status, Vec::new(), self.body.clone(), request.url)
    }
}

#[async_trait]
impl crate::transport::Transport for MockTransport {
    fn name(&self) -> String {
        "mock".to_string()
    }

    async fn execute(&self, request: Request, _progress: Option<ProgressSink>) -> RawResponse {
        self.respond(request).await
    }

    async fn upload_file(
        &self,
        request: Request,
        _file: PathBuf,
        _progress: Option<ProgressSink>,
    ) -> RawResponse {
        self.respond(request).await
    }

    async fn upload_multipart(
        &self,
        request: Request,
        _parts: Vec<Part>,
        _progress: Option<ProgressSink>,
    ) -> RawResponse {
        self.respond(request).await
    }

    async fn download(
        &self,
        request: Request,
        _destination: PathBuf,
        _progress: Option<ProgressSink>,
    ) -> RawResponse {
        self.respond(request).await
    }
}

struct UserTarget {
    id: u32,
}

impl Target for UserTarget {
    fn url(&self) -> String {
        format!("https://api.example.com/user/{}", self.id)
    }

    fn method(&self) -> Method {
        Method::Get
    }

    fn sample(&self) -> Sample {
        Sample::ok(Bytes::from_static(b"{\"id\":7}"))
    }
}

struct FailingSampleTarget;

impl Target for FailingSampleTarget {
    fn url(&self) -> String {
        "https://api.example.com/flaky".to_string()
    }

    fn method(&self) -> Method {
        Method::Get
    }

    fn sample(&self) -> Sample {
        Sample::error(Error::timeout())
    }
}

struct MultipartTarget {
    method: Method,
    parts: Vec<Part>,
}

impl Target for MultipartTarget {
    fn url(&self) -> String {
        "https://api.example.com/upload".to_string()
    }

    fn method(&self) -> Method {
        self.method
    }

    fn task(&self) -> Task {
        Task::UploadMultipart(self.parts.clone())
    }
}

struct DownloadTarget;

impl Target for DownloadTarget {
    fn url(&self) -> String {
        "https://api.example.com/archive.zip".to_string()
    }

    fn method(&self) -> Method {
        Method::Get
    }

    fn task(&self) -> Task {
        Task::Download {
            destination: "/tmp/archive.zip".into(),
        }
    }
}

struct RecordingPlugin {
    events: Arc<Mutex<Vec<&'static str>>>,
}

#[async_trait]
impl crate::plugin::Plugin for RecordingPlugin {
    fn name(&self) -> String {
        "recording".to_string()
    }

    async fn before_send(&self, request: Request, _endpoint: &Endpoint) -> Request {
        self.events.lock().unwrap().push("before_send");
        request.with_header("x-trace", "1")
    }

    async fn after_receive(&self, _result: &CallResult, _endpoint: &Endpoint) {
        self.events.lock().unwrap().push("after_receive");
    }
}

fn dispatch_into_channel<T: Target>(
    provider: &Provider<T>,
    target: &T,
) -> (CancelToken, oneshot::Receiver<CallResult>) {
    let (tx, rx) = oneshot::channel();
    let token = provider.dispatch(target, CallOptions::default(), move |result| {
        let _ = tx.send(result);
    });
    (token, rx)
}

#[tokio::test]
async fn test_request_returns_transport_response() {
    let transport = MockTransport::new();
    let provider = Provider::builder()
        .with_transport(transport.clone())
        .build();

    let response = provider.request(&UserTarget { id: 7 }).await.unwrap();
    assert_eq!(response.status_code, 200);
    assert_eq!(&response.body[..], b"{\"id\":7}");
    assert_eq!(transport.call_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_tracked_duplicates_share_one_transport_call() {
    let transport = MockTransport::new().with_delay(Duration::from_millis(100));
    let provider = Provider::builder()
        .with_transport(transport.clone())
        .track_inflights()
        .build();

    let target = UserTarget { id: 7 };
    let (a, b) = tokio::join!(provider.request(&target), provider.request(&target));

    assert_eq!(a.unwrap().status_code, 200);
    assert_eq!(b.unwrap().status_code, 200);
    assert_eq!(transport.call_count(), 1);
    assert_eq!(provider.inflight_len(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_untracked_duplicates_each_hit_transport() {
    let transport = MockTransport::new().with_delay(Duration::from_millis(100));
    let provider = Provider::builder()
        .with_transport(transport.clone())
        .build();

    let target = UserTarget { id: 7 };
    let (a, b) = tokio::join!(provider.request(&target), provider.request(&target));

    assert!(a.is_ok());
    assert!(b.is_ok());
    assert_eq!(transport.call_count(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_cancel_before_send_skips_transport() {
    let transport = MockTransport::new();
    let events = Arc::new(Mutex::new(Vec::new()));
    let provider = Provider::builder()
        .with_transport(transport.clone())
        .with_plugin(RecordingPlugin {
            events: events.clone(),
        })
        .with_request_builder(|endpoint| {
            Box::pin(async move {
                tokio::time::sleep(Duration::from_millis(50)).await;
                Request::from_endpoint(&endpoint)
            })
        })
        .build();

    let (token, rx) = dispatch_into_channel(&provider, &UserTarget { id: 7 });
    token.cancel();

    let err = rx.await.unwrap().unwrap_err();
    assert!(err.is_cancelled());
    assert_eq!(transport.call_count(), 0);
    // before_send never ran, after_receive still observed the cancellation.
    assert_eq!(*events.lock().unwrap(), vec!["after_receive"]);
}

#[tokio::test]
async fn test_cancel_aborts_running_transport() {
    let transport = MockTransport::new().with_delay(Duration::from_secs(30));
    let provider = Provider::builder()
        .with_transport(transport.clone())
        .build();

    let (token, rx) = dispatch_into_channel(&provider, &UserTarget { id: 7 });
    token.cancel();

    let err = rx.await.unwrap().unwrap_err();
    assert!(err.is_cancelled());
}

#[tokio::test(start_paused = true)]
async fn test_cancelling_one_waiter_leaves_shared_call_running() {
    let transport = MockTransport::new().with_delay(Duration::from_millis(100));
    let provider = Provider::builder()
        .with_transport(transport.clone())
        .track_inflights()
        .build();

    let target = UserTarget { id: 7 };
    let (token_a, rx_a) = dispatch_into_channel(&provider, &target);
    let (_token_b, rx_b) = dispatch_into_channel(&provider, &target);
    token_a.cancel();

    let err = rx_a.await.unwrap().unwrap_err();
    assert!(err.is_cancelled());
    let response = rx_b.await.unwrap().unwrap();
    assert_eq!(response.status_code, 200);
    assert_eq!(transport.call_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_representative_cancel_before_send_keeps_joiner_alive() {
    let transport = MockTransport::new();
    let provider = Provider::builder()
        .with_transport(transport.clone())
        .with_request_builder(|endpoint| {
            Box::pin(async move {
                tokio::time::sleep(Duration::from_millis(50)).await;
                Request::from_endpoint(&endpoint)
            })
        })
        .track_inflights()
        .build();

    let target = UserTarget { id: 7 };
    let (token_a, rx_a) = dispatch_into_channel(&provider, &target);
    let (_token_b, rx_b) = dispatch_into_channel(&provider, &target);
    token_a.cancel();

    // The first caller cancelled before its request was even built, yet the
    // joined caller keeps the shared transport call alive.
    assert!(rx_a.await.unwrap().unwrap_err().is_cancelled());
    let response = rx_b.await.unwrap().unwrap();
    assert_eq!(response.status_code, 200);
    assert_eq!(transport.call_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_delayed_stub_fires_after_delay() {
    let transport = MockTransport::new();
    let provider = Provider::builder()
        .with_transport(transport.clone())
        .with_stub_policy(|_: &UserTarget| StubBehavior::Delayed(Duration::from_secs(2)))
        .build();

    let start = Instant::now();
    let response = provider.request(&UserTarget { id: 7 }).await.unwrap();

    assert!(start.elapsed() >= Duration::from_secs(2));
    assert_eq!(response.status_code, 200);
    assert_eq!(&response.body[..], b"{\"id\":7}");
    assert_eq!(transport.call_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_delayed_stub_observes_cancellation_when_timer_fires() {
    let transport = MockTransport::new();
    let provider = Provider::builder()
        .with_transport(transport.clone())
        .with_stub_policy(|_: &UserTarget| StubBehavior::Delayed(Duration::from_secs(2)))
        .build();

    let start = Instant::now();
    let (token, rx) = dispatch_into_channel(&provider, &UserTarget { id: 7 });
    token.cancel();

    let err = rx.await.unwrap().unwrap_err();
    assert!(err.is_cancelled());
    // The timer runs to completion; cancellation does not short-circuit it.
    assert!(start.elapsed() >= Duration::from_secs(2));
    assert_eq!(transport.call_count(), 0);
}

#[tokio::test]
async fn test_immediate_stub_returns_sample_error() {
    let transport = MockTransport::new();
    let provider = Provider::builder()
        .with_transport(transport.clone())
        .with_stub_policy(|_: &FailingSampleTarget| StubBehavior::Immediate)
        .build();

    let err = provider.request(&FailingSampleTarget).await.unwrap_err();
    assert!(err.is_timeout());
    assert_eq!(transport.call_count(), 0);
}

#[tokio::test]
async fn test_plugins_run_in_order_around_transport() {
    let events = Arc::new(Mutex::new(Vec::new()));
    let provider = Provider::builder()
        .with_transport(MockTransport::new())
        .with_plugin(RecordingPlugin {
            events: events.clone(),
        })
        .build();

    provider.request(&UserTarget { id: 7 }).await.unwrap();
    assert_eq!(*events.lock().unwrap(), vec!["before_send", "after_receive"]);
}

#[tokio::test(start_paused = true)]
async fn test_materialize_failure_fans_out_to_all_waiters() {
    let transport = MockTransport::new();
    let provider = Provider::builder()
        .with_transport(transport.clone())
        .with_request_builder(|_endpoint| {
            Box::pin(async move {
                tokio::time::sleep(Duration::from_millis(10)).await;
                Err(MaterializeError::Rejected("signing failed".into()).into())
            })
        })
        .track_inflights()
        .build();

    let target = UserTarget { id: 7 };
    let (a, b) = tokio::join!(provider.request(&target), provider.request(&target));

    assert!(a.unwrap_err().is_materialize());
    assert!(b.unwrap_err().is_materialize());
    assert_eq!(transport.call_count(), 0);
    assert_eq!(provider.inflight_len(), 0);
}

#[tokio::test]
async fn test_download_response_carries_destination() {
    let provider = Provider::builder()
        .with_transport(MockTransport::new())
        .build();

    let response = provider.request(&DownloadTarget).await.unwrap();
    assert_eq!(
        response.destination.as_deref(),
        Some(std::path::Path::new("/tmp/archive.zip"))
    );
}

#[tokio::test]
async fn test_custom_resolver_overrides_target_mapping() {
    let transport = MockTransport::new();
    let provider = Provider::builder()
        .with_transport(transport.clone())
        .with_resolver(|target: &UserTarget| {
            Endpoint::from_target(target)
                .with_headers(Headers::from(vec![(
                    "x-api-key".to_string(),
                    "secret".to_string(),
                )]))
                .with_timeout(5)
        })
        .build();

    let response = provider.request(&UserTarget { id: 7 }).await.unwrap();
    assert_eq!(response.status_code, 200);
    assert_eq!(transport.call_count(), 1);
}

#[tokio::test]
#[should_panic(expected = "configuration fault")]
async fn test_empty_multipart_panics() {
    let provider = Provider::builder()
        .with_transport(MockTransport::new())
        .build();
    let target = MultipartTarget {
        method: Method::Post,
        parts: Vec::new(),
    };
    provider.dispatch(&target, CallOptions::default(), |_| {});
}

#[tokio::test]
#[should_panic(expected = "configuration fault")]
async fn test_multipart_on_bodyless_method_panics() {
    let provider = Provider::builder()
        .with_transport(MockTransport::new())
        .build();
    let target = MultipartTarget {
        method: Method::Get,
        parts: vec![Part::new("file", Bytes::from_static(b"data"))],
    };
    provider.dispatch(&target, CallOptions::default(), |_| {});
}
