//! # ranged-download
//!
//! Serve a file or an in-memory buffer honouring HTTP range requests:
//! full body (200), a single range (206), several ranges as
//! `multipart/byteranges` (206), unsatisfiable ranges (416) and missing
//! resources (404).
//!
//! Fully generic over where bytes come from ([`Resource`]) and where the
//! response goes ([`Sink`]). [`FileResource`] and [`BufferResource`] cover
//! disk and memory; [`WriterSink`], [`ResponseSink`] and [`ChannelSink`]
//! cover raw output, buffered responses and streamed responses. [`Ranged`]
//! also implements axum's [`IntoResponse`] directly.
//!
//! ```
//! use ranged_download::{BufferResource, Ranged, ResponseMode, ResponseSink};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> ranged_download::Result<()> {
//! let resource = BufferResource::new("Hello world this is a buffer to test range requests on!");
//! let mut sink = ResponseSink::new();
//!
//! let planned = Ranged::new(Some("bytes=0-4".to_string()), resource)
//!     .download_name("hello.txt")
//!     .send(&mut sink)
//!     .await?;
//!
//! assert_eq!(ResponseMode::SingleRange, planned.mode());
//! assert_eq!(b"Hello", sink.body());
//! # Ok(())
//! # }
//! ```
//!
//! With axum, the range and user agent come from the request:
//!
//! ```no_run
//! use axum::http::{header, HeaderMap};
//! use ranged_download::{FileResource, Ranged};
//!
//! async fn download(headers: HeaderMap) -> Ranged<FileResource> {
//!     let header = |name: header::HeaderName| {
//!         headers.get(name).and_then(|v| v.to_str().ok()).map(str::to_owned)
//!     };
//!     let resource = FileResource::open("document.txt").await;
//!     Ranged::new(header(header::RANGE), resource).user_agent(header(header::USER_AGENT))
//! }
//! ```

mod buffer;
mod config;
mod disposition;
mod error;
mod file;
mod range;
mod rate;
mod resource;
mod response;
mod sink;
mod stream;

use std::fmt;
use std::io;

use axum::body::Body;
use axum::http::{HeaderName, HeaderValue};
use axum::response::{IntoResponse, Response};
use bytes::Bytes;

pub use buffer::BufferResource;
pub use config::DownloadConfig;
pub use disposition::{content_disposition, Disposition};
pub use error::{Error, Result};
pub use file::FileResource;
pub use range::{parse_range_header, ByteRange};
pub use rate::{compute_delay, RateLimit, DEFAULT_BUFFER_SIZE};
pub use resource::Resource;
pub use response::{etag, last_modified, MultipartPlan, PlannedResponse, ResponseHeaders, ResponseMode};
pub use sink::{static_body, status_handler, ResponseSink, Sink, StatusHandler, WriterSink};
pub use stream::{channel, ChannelSink, CHANNEL_CAPACITY};

/// The main responder type. Plans and sends one response over a
/// [`Resource`]. Implements [`IntoResponse`].
pub struct Ranged<R: Resource> {
    range: Option<String>,
    user_agent: Option<String>,
    resource: R,
    config: DownloadConfig,
    on_not_found: Option<StatusHandler>,
    on_range_not_satisfiable: Option<StatusHandler>,
}

impl<R: Resource + fmt::Debug> fmt::Debug for Ranged<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Ranged")
            .field("range", &self.range)
            .field("user_agent", &self.user_agent)
            .field("resource", &self.resource)
            .field("config", &self.config)
            .finish()
    }
}

impl<R: Resource> Ranged<R> {
    /// Construct a ranged response over any [`Resource`] and the raw
    /// value of the request's `Range` header, if any.
    pub fn new(range: Option<String>, resource: R) -> Self {
        Ranged {
            range,
            user_agent: None,
            resource,
            config: DownloadConfig::default(),
            on_not_found: None,
            on_range_not_satisfiable: None,
        }
    }

    /// Client `User-Agent`, used to pick the filename encoding of
    /// `Content-Disposition`.
    pub fn user_agent(mut self, user_agent: Option<String>) -> Self {
        self.user_agent = user_agent;
        self
    }

    pub fn config(mut self, config: DownloadConfig) -> Self {
        self.config = config;
        self
    }

    pub fn download_name(mut self, name: impl Into<String>) -> Self {
        self.config.download_name = Some(name.into());
        self
    }

    pub fn disposition(mut self, disposition: Disposition) -> Self {
        self.config.disposition = disposition;
        self
    }

    pub fn inline(self) -> Self {
        self.disposition(Disposition::Inline)
    }

    pub fn attachment(self) -> Self {
        self.disposition(Disposition::Attachment)
    }

    /// Cap throughput in KB/s. Values `<= 1` mean unlimited.
    pub fn limit_rate_kb(mut self, limit_kb_per_sec: i64) -> Self {
        self.config.rate.limit_kb_per_sec = limit_kb_per_sec;
        self
    }

    pub fn buffer_size(mut self, buffer_size: usize) -> Self {
        self.config.rate.buffer_size = buffer_size;
        self
    }

    /// Writes the body of a 404 response.
    pub fn on_not_found(mut self, handler: StatusHandler) -> Self {
        self.on_not_found = Some(handler);
        self
    }

    /// Writes the body of a 416 response.
    pub fn on_range_not_satisfiable(mut self, handler: StatusHandler) -> Self {
        self.on_range_not_satisfiable = Some(handler);
        self
    }

    /// Decide the response mode and build its headers. No I/O happens here.
    ///
    /// Every call generates a new multipart boundary.
    pub fn plan(&self) -> PlannedResponse {
        let resource = &self.resource;
        let available = resource.is_available();
        let total_size = if available { resource.byte_size() } else { 0 };
        let ranges = if available {
            parse_range_header(self.range.as_deref(), total_size)
        } else {
            Vec::new()
        };

        let mode = ResponseMode::resolve(available, &ranges, total_size);
        tracing::debug!(?mode, total_size, ranges = ranges.len(), "planned response");

        let mut planned = PlannedResponse {
            mode,
            headers: ResponseHeaders::default(),
            ranges,
            multipart: None,
            total_size,
        };
        if mode == ResponseMode::NotFound {
            return planned;
        }

        let last_modified = last_modified(resource.modified());
        let headers = &mut planned.headers;
        headers.push("Accept-Ranges", "bytes");
        headers.push("X-Accel-Buffering", "no");
        headers.push("Last-Modified", last_modified.as_str());
        headers.push("ETag", etag(&last_modified, total_size));

        match mode {
            ResponseMode::FullRange => {
                headers.push("Content-Length", total_size.to_string());
                headers.push("Content-Type", self.content_type());
                headers.push("Content-Disposition", self.content_disposition());
                headers.push("Cache-Control", "public");
            }
            ResponseMode::SingleRange => {
                let range = planned.ranges[0];
                headers.push("Content-Length", range.len().to_string());
                headers.push("Content-Type", self.content_type());
                headers.push("Content-Disposition", self.content_disposition());
                headers.push("Cache-Control", "public");
                headers.push(
                    "Content-Range",
                    format!("bytes {}-{}/{}", range.start, range.end, total_size),
                );
            }
            ResponseMode::MultiRange => {
                let multipart = MultipartPlan::new(
                    response::generate_boundary(),
                    planned.ranges.clone(),
                    total_size,
                );
                headers.push("Content-Length", multipart.content_length().to_string());
                headers.push("Content-Type", multipart.content_type());
                headers.push("Cache-Control", "public");
                planned.multipart = Some(multipart);
            }
            ResponseMode::RangeNotSatisfiable => {
                headers.push("Content-Range", format!("bytes */{total_size}"));
            }
            ResponseMode::NotFound => {}
        }

        planned
    }

    /// Plan the response, then stream it into `sink`.
    ///
    /// The resource is destroyed afterwards, on success and on failure, and
    /// also when the returned future is dropped before completion.
    /// Only I/O failures are returned; range problems become a 416.
    pub async fn send<S: Sink>(self, sink: &mut S) -> Result<PlannedResponse> {
        let planned = self.plan();
        self.deliver(&planned, sink).await?;
        Ok(planned)
    }

    async fn deliver<S: Sink>(mut self, planned: &PlannedResponse, sink: &mut S) -> Result<()> {
        let result = self.stream(planned, sink).await;
        if let Err(e) = &result {
            tracing::warn!(error = %e, mode = ?planned.mode(), "send aborted");
        }
        result
    }

    async fn stream<S: Sink>(&mut self, planned: &PlannedResponse, sink: &mut S) -> Result<()> {
        sink.before_process(planned).await.map_err(Error::Sink)?;

        let rate = self.config.rate;
        match planned.mode() {
            ResponseMode::FullRange => {
                if planned.total_size() > 0 {
                    let end = planned.total_size() - 1;
                    self.resource.read_range(0, end, &rate, sink).await?;
                }
            }
            ResponseMode::SingleRange => {
                let range = planned.ranges()[0];
                tracing::debug!(start = range.start, end = range.end, "streaming range");
                self.resource.read_range(range.start, range.end, &rate, sink).await?;
            }
            ResponseMode::MultiRange => {
                if let Some(multipart) = planned.multipart() {
                    for range in multipart.ranges() {
                        tracing::debug!(start = range.start, end = range.end, "streaming part");
                        write(sink, multipart.part_header(range)).await?;
                        self.resource.read_range(range.start, range.end, &rate, sink).await?;
                        write(sink, multipart.part_trailer()).await?;
                    }
                    write(sink, multipart.closing()).await?;
                }
            }
            ResponseMode::RangeNotSatisfiable => {
                let handler = self.on_range_not_satisfiable.take();
                sink.on_range_not_satisfiable(handler).await.map_err(Error::Sink)?;
            }
            ResponseMode::NotFound => {
                let handler = self.on_not_found.take();
                sink.on_not_found(handler).await.map_err(Error::Sink)?;
            }
        }

        sink.after_process().await.map_err(Error::Sink)
    }

    fn content_type(&self) -> String {
        let octet_stream = mime_guess::mime::APPLICATION_OCTET_STREAM.to_string();
        match self.config.disposition {
            Disposition::Attachment => octet_stream,
            Disposition::Inline => {
                let mime_type = self.resource.mime_type();
                if HeaderValue::from_str(&mime_type).is_ok() {
                    mime_type
                } else {
                    octet_stream
                }
            }
        }
    }

    fn content_disposition(&self) -> String {
        let name = match &self.config.download_name {
            Some(name) => name.clone(),
            None => self.resource.file_name(),
        };
        content_disposition(self.config.disposition, self.user_agent.as_deref(), &name)
    }
}

/// Releases the resource whichever way the response ends, including a
/// dropped `send` future.
impl<R: Resource> Drop for Ranged<R> {
    fn drop(&mut self) {
        self.resource.destroy();
    }
}

async fn write<S: Sink>(sink: &mut S, framing: impl Into<String>) -> Result<()> {
    sink.process(Bytes::from(framing.into())).await.map_err(Error::Sink)
}

impl<R: Resource + 'static> IntoResponse for Ranged<R> {
    /// Responds with the planned head right away and streams the body from
    /// a spawned task. Must be called inside a tokio runtime.
    fn into_response(self) -> Response {
        let planned = self.plan();
        let (mut sink, body) = channel(CHANNEL_CAPACITY);

        let mut response = Response::new(Body::from_stream(body));
        *response.status_mut() = planned.status();
        for (name, value) in planned.headers().iter() {
            if let (Ok(name), Ok(value)) = (
                HeaderName::from_bytes(name.as_bytes()),
                HeaderValue::from_bytes(value.as_bytes()),
            ) {
                response.headers_mut().append(name, value);
            }
        }

        tokio::spawn(async move {
            let errors = sink.clone();
            if let Err(Error::Resource(e)) = self.deliver(&planned, &mut sink).await {
                errors.fail(io::Error::new(e.kind(), e.to_string())).await;
            }
        });

        response
    }
}
