pub mod endpoint;
pub mod headers;
pub mod method;
pub mod progress;
pub mod request;
pub mod response;
pub mod stub;
pub mod target;

pub use endpoint::{Endpoint, SampleSource};
pub use headers::Headers;
pub use method::Method;
pub use progress::{Progress, ProgressSink};
pub use request::Request;
pub use response::{CallResult, Response};
pub use stub::{Sample, StubBehavior};
pub use target::{Part, Target, Task};
