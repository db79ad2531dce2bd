use crate::errors::{Error, MaterializeError, TransportError};
use crate::model::headers::Headers;
use crate::model::method::Method;
use crate::model::progress::{Progress, ProgressSink};
use crate::model::request::Request;
use crate::model::target::{Part, Task};
use crate::transport::{RawResponse, Transport};
use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use futures::StreamExt;
use log::warn;
use metrics::{counter, histogram};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::Client;
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tokio::io::AsyncWriteExt;

const DEFAULT_MAX_RESPONSE_SIZE: usize = 10 * 1024 * 1024;

/// reqwest-backed transport adapter.
///
/// Response bodies are streamed so the size cap is enforced during the
/// transfer, not after it, and so progress can be reported per chunk.
#[derive(Clone)]
pub struct HttpTransport {
    client: Client,
    max_response_size: usize,
}

impl HttpTransport {
    pub fn new() -> Self {
        let client = Client::builder()
            .pool_idle_timeout(Duration::from_secs(90))
            .tcp_keepalive(Duration::from_secs(60))
            .tcp_nodelay(true)
            .connect_timeout(Duration::from_secs(10))
            .http2_keep_alive_interval(Some(Duration::from_secs(30)))
            .build()
            .expect("Failed to create http client");
        HttpTransport {
            client,
            max_response_size: DEFAULT_MAX_RESPONSE_SIZE,
        }
    }

    /// Uses a caller-configured client (proxies, custom TLS, pools).
    pub fn with_client(client: Client) -> Self {
        HttpTransport {
            client,
            max_response_size: DEFAULT_MAX_RESPONSE_SIZE,
        }
    }

    pub fn with_max_response_size(mut self, limit: usize) -> Self {
        self.max_response_size = limit;
        self
    }

    fn build(&self, request: &Request) -> Result<reqwest::RequestBuilder, Error> {
        let headers = header_map(&request.headers)?;
        Ok(self
            .client
            .request(to_reqwest_method(request.method), request.url.clone())
            .headers(headers)
            .timeout(Duration::from_secs(request.timeout)))
    }

    async fn perform(
        &self,
        builder: reqwest::RequestBuilder,
        method: Method,
        progress: Option<ProgressSink>,
    ) -> RawResponse {
        let start = Instant::now();
        let response = match builder.send().await {
            Ok(response) => response,
            Err(e) => {
                counter!("courier_transport_requests_total", "status" => "error")
                    .increment(1);
                return RawResponse::failure(classify(e));
            }
        };

        let status = response.status().as_u16();
        let url = response.url().clone();
        let headers = collect_headers(&response);

        let body = match self.read_body(response, progress.as_ref()).await {
            Ok(body) => body,
            Err(e) => return RawResponse::failure(e),
        };

        histogram!("courier_transport_duration_seconds", "method" => method.to_string())
            .record(start.elapsed().as_secs_f64());
        counter!("courier_transport_requests_total", "status" => status.to_string())
            .increment(1);

        RawResponse::success(status, headers, body, url)
    }

    async fn read_body(
        &self,
        response: reqwest::Response,
        progress: Option<&ProgressSink>,
    ) -> Result<Bytes, Error> {
        let total = response.content_length();
        if let Some(len) = total {
            if len > self.max_response_size as u64 {
                warn!(
                    "response size {len} exceeds limit {}, aborting transfer for {}",
                    self.max_response_size,
                    response.url()
                );
                return Err(TransportError::Body("response body too large".into()).into());
            }
        }

        let mut body = BytesMut::new();
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(classify)?;
            if body.len() + chunk.len() > self.max_response_size {
                return Err(TransportError::Body("response body too large".into()).into());
            }
            body.extend_from_slice(&chunk);
            if let Some(sink) = progress {
                sink(Progress::new(body.len() as u64, total));
            }
        }
        Ok(body.freeze())
    }
}

impl Default for HttpTransport {
    fn default() -> Self {
        HttpTransport::new()
    }
}

#[async_trait]
impl Transport for HttpTransport {
    fn name(&self) -> String {
        "http".to_string()
    }

    async fn execute(&self, request: Request, progress: Option<ProgressSink>) -> RawResponse {
        let method = request.method;
        let mut builder = match self.build(&request) {
            Ok(builder) => builder,
            Err(e) => return RawResponse::failure(e),
        };
        if let Task::Payload { body, content_type } = request.task {
            if let Some(content_type) = content_type {
                builder = builder.header(reqwest::header::CONTENT_TYPE, content_type);
            }
            builder = builder.body(body);
        }
        self.perform(builder, method, progress).await
    }

    async fn upload_file(
        &self,
        request: Request,
        file: PathBuf,
        progress: Option<ProgressSink>,
    ) -> RawResponse {
        let method = request.method;
        let builder = match self.build(&request) {
            Ok(builder) => builder,
            Err(e) => return RawResponse::failure(e),
        };
        let data = match tokio::fs::read(&file).await {
            Ok(data) => data,
            Err(e) => {
                warn!("upload read failed: file={} error={e}", file.display());
                return RawResponse::failure(TransportError::Io(e.into()).into());
            }
        };
        self.perform(builder.body(data), method, progress).await
    }

    async fn upload_multipart(
        &self,
        request: Request,
        parts: Vec<Part>,
        progress: Option<ProgressSink>,
    ) -> RawResponse {
        let method = request.method;
        let builder = match self.build(&request) {
            Ok(builder) => builder,
            Err(e) => return RawResponse::failure(e),
        };
        let mut form = reqwest::multipart::Form::new();
        for part in parts {
            let mut piece = reqwest::multipart::Part::stream(part.data);
            if let Some(file_name) = part.file_name {
                piece = piece.file_name(file_name);
            }
            if let Some(mime) = part.mime {
                piece = match piece.mime_str(&mime) {
                    Ok(piece) => piece,
                    Err(e) => {
                        return RawResponse::failure(
                            MaterializeError::InvalidHeader(format!("mime {mime}: {e}")).into(),
                        )
                    }
                };
            }
            form = form.part(part.name, piece);
        }
        self.perform(builder.multipart(form), method, progress).await
    }

    async fn download(
        &self,
        request: Request,
        destination: PathBuf,
        progress: Option<ProgressSink>,
    ) -> RawResponse {
        let builder = match self.build(&request) {
            Ok(builder) => builder,
            Err(e) => return RawResponse::failure(e),
        };
        let start = Instant::now();
        let response = match builder.send().await {
            Ok(response) => response,
            Err(e) => return RawResponse::failure(classify(e)),
        };

        let status = response.status().as_u16();
        let url = response.url().clone();
        let headers = collect_headers(&response);
        let total = response.content_length();

        if let Some(parent) = destination.parent() {
            if let Err(e) = tokio::fs::create_dir_all(parent).await {
                return RawResponse::failure(TransportError::Io(e.into()).into());
            }
        }
        let mut file = match tokio::fs::File::create(&destination).await {
            Ok(file) => file,
            Err(e) => return RawResponse::failure(TransportError::Io(e.into()).into()),
        };

        let mut written: u64 = 0;
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = match chunk {
                Ok(chunk) => chunk,
                Err(e) => return RawResponse::failure(classify(e)),
            };
            if let Err(e) = file.write_all(&chunk).await {
                return RawResponse::failure(TransportError::Io(e.into()).into());
            }
            written += chunk.len() as u64;
            if let Some(sink) = progress.as_ref() {
                sink(Progress::new(written, total));
            }
        }
        if let Err(e) = file.flush().await {
            return RawResponse::failure(TransportError::Io(e.into()).into());
        }

        histogram!("courier_transport_duration_seconds", "method" => request.method.to_string())
            .record(start.elapsed().as_secs_f64());
        counter!("courier_transport_requests_total", "status" => status.to_string()).increment(1);

        RawResponse::success(status, headers, Bytes::new(), url)
    }
}

fn to_reqwest_method(method: Method) -> reqwest::Method {
    match method {
        Method::Get => reqwest::Method::GET,
        Method::Post => reqwest::Method::POST,
        Method::Put => reqwest::Method::PUT,
        Method::Delete => reqwest::Method::DELETE,
        Method::Patch => reqwest::Method::PATCH,
        Method::Head => reqwest::Method::HEAD,
        Method::Options => reqwest::Method::OPTIONS,
    }
}

fn header_map(headers: &Headers) -> Result<HeaderMap, Error> {
    let mut map = HeaderMap::new();
    for (key, value) in headers.iter() {
        let name = HeaderName::from_bytes(key.as_bytes())
            .map_err(|e| MaterializeError::InvalidHeader(format!("{key}: {e}")))?;
        let value = HeaderValue::from_str(value)
            .map_err(|e| MaterializeError::InvalidHeader(format!("{key}: {e}")))?;
        map.insert(name, value);
    }
    Ok(map)
}

fn collect_headers(response: &reqwest::Response) -> Vec<(String, String)> {
    response
        .headers()
        .iter()
        .map(|(name, value)| {
            (
                name.to_string(),
                value.to_str().unwrap_or("").to_string(),
            )
        })
        .collect()
}

fn classify(e: reqwest::Error) -> Error {
    if e.is_timeout() {
        Error::from(TransportError::Timeout)
    } else if e.is_connect() {
        Error::from(TransportError::Connect(e.into()))
    } else {
        Error::from(TransportError::Failed(e.into()))
    }
}
