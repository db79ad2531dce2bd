use crate::errors::Error;
use bytes::Bytes;
use std::time::Duration;

/// Per-target stub policy, chosen by the stub-policy hook.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum StubBehavior {
    /// Hit the real transport.
    Never,
    /// Synthesize the sample on the current turn.
    Immediate,
    /// Synthesize the sample after a fixed delay.
    Delayed(Duration),
}

impl StubBehavior {
    pub fn is_stubbed(&self) -> bool {
        !matches!(self, StubBehavior::Never)
    }
}

/// Outcome produced by an endpoint's sample generator when a stub fires.
#[derive(Debug, Clone)]
pub enum Sample {
    Response { status: u16, body: Bytes },
    Error(Error),
}

impl Sample {
    pub fn ok(body: impl Into<Bytes>) -> Self {
        Sample::Response {
            status: 200,
            body: body.into(),
        }
    }

    pub fn status(status: u16, body: impl Into<Bytes>) -> Self {
        Sample::Response {
            status,
            body: body.into(),
        }
    }

    pub fn error(error: Error) -> Self {
        Sample::Error(error)
    }
}
