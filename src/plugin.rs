use crate::model::endpoint::Endpoint;
use crate::model::request::Request;
use crate::model::response::CallResult;
use async_trait::async_trait;
use log::{debug, info, warn};

/// Observer attached to the request/response lifecycle.
///
/// Plugins run in registration order. `before_send` may rewrite the
/// outgoing request (auth headers, tracing ids); `after_receive` observes
/// the terminal result and cannot alter what the caller receives. Both run
/// for every call that reaches the network or stub branch; a call cancelled
/// before send still sees `after_receive` with the synthesized cancellation
/// error. Plugins must not panic.
#[async_trait]
pub trait Plugin: Send + Sync {
    fn name(&self) -> String;

    async fn before_send(&self, request: Request, _endpoint: &Endpoint) -> Request {
        request
    }

    async fn after_receive(&self, _result: &CallResult, _endpoint: &Endpoint) {}
}

/// Logs each call's lifecycle through the `log` facade.
#[derive(Debug, Clone, Default)]
pub struct LoggerPlugin {
    /// Also log response bodies (lossy UTF-8). Off by default.
    pub log_body: bool,
}

impl LoggerPlugin {
    pub fn new() -> Self {
        LoggerPlugin::default()
    }

    pub fn with_body(mut self) -> Self {
        self.log_body = true;
        self
    }
}

#[async_trait]
impl Plugin for LoggerPlugin {
    fn name(&self) -> String {
        "logger".to_string()
    }

    async fn before_send(&self, request: Request, _endpoint: &Endpoint) -> Request {
        info!(
            "sending request: request_id={} method={} url={}",
            request.id, request.method, request.url
        );
        for (key, value) in request.headers.iter() {
            debug!("request header: request_id={} {key}: {value}", request.id);
        }
        request
    }

    async fn after_receive(&self, result: &CallResult, endpoint: &Endpoint) {
        match result {
            Ok(response) => {
                info!(
                    "received response: status={} url={} bytes={}",
                    response.status_code,
                    endpoint.url,
                    response.body.len()
                );
                if self.log_body && !response.body.is_empty() {
                    debug!(
                        "response body: url={} body={}",
                        endpoint.url,
                        String::from_utf8_lossy(&response.body)
                    );
                }
            }
            Err(e) => {
                warn!("call failed: url={} error={e}", endpoint.url);
            }
        }
    }
}
