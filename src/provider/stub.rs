use super::Call;
use crate::errors::Error;
use crate::model::request::Request;
use crate::model::response::Response;
use crate::model::stub::{Sample, StubBehavior};
use log::debug;
use metrics::counter;

/// Synthesizes the endpoint's sample instead of touching the transport.
///
/// A delayed stub always waits out its full delay, whether or not the
/// caller cancels in the meantime; cancellation is observed once, when the
/// timer fires. `before_send` is skipped for a call found cancelled at that
/// point, but `after_receive` still runs.
pub(super) async fn run_stub(call: Call, request: Request, behavior: StubBehavior) {
    match behavior {
        StubBehavior::Immediate => {}
        StubBehavior::Delayed(delay) => tokio::time::sleep(delay).await,
        StubBehavior::Never => {
            panic!(
                "configuration fault: stub scheduler reached with StubBehavior::Never for {}",
                call.endpoint.url
            );
        }
    }

    let result = if call.token.is_cancelled() {
        Err(Error::cancelled())
    } else {
        let mut request = request;
        for plugin in &call.plugins {
            request = plugin.before_send(request, &call.endpoint).await;
        }
        debug!(
            "stubbing call: request_id={} url={}",
            request.id, call.endpoint.url
        );
        match (call.endpoint.sample)() {
            Sample::Response { status, body } => {
                let mut response = Response::new(status, body);
                response.url = Some(request.url.clone());
                Ok(response)
            }
            Sample::Error(e) => Err(e),
        }
    };

    let outcome = if result.is_ok() { "success" } else { "failure" };
    counter!("courier_stubbed_calls_total", "outcome" => outcome).increment(1);

    for plugin in &call.plugins {
        plugin.after_receive(&result, &call.endpoint).await;
    }
    call.sink.deliver(result);
}
