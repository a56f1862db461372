use std::io;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{HeaderMap, HeaderName, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use bytes::{Bytes, BytesMut};
use futures::future::BoxFuture;
use tokio::io::{AsyncWrite, AsyncWriteExt};

use crate::PlannedResponse;

/// Writes a custom body for a 404 or 416 response.
///
/// Runs at most once, after the sink has received the status and headers.
pub type StatusHandler =
    Box<dyn for<'a> FnOnce(&'a mut dyn Sink) -> BoxFuture<'a, io::Result<()>> + Send>;

/// Wrap a closure as a [`StatusHandler`].
///
/// ```
/// use bytes::Bytes;
/// use ranged_download::status_handler;
///
/// let handler = status_handler(|sink| Box::pin(async move {
///     sink.process(Bytes::from_static(b"File not found")).await
/// }));
/// ```
pub fn status_handler<F>(f: F) -> StatusHandler
where
    F: for<'a> FnOnce(&'a mut dyn Sink) -> BoxFuture<'a, io::Result<()>> + Send + 'static,
{
    Box::new(f)
}

/// A [`StatusHandler`] that writes a fixed body.
pub fn static_body(body: impl Into<Bytes>) -> StatusHandler {
    let body = body.into();
    status_handler(move |sink| Box::pin(async move { sink.process(body).await }))
}

/// Destination of a response: status and headers first, then body chunks
/// in order.
#[async_trait]
pub trait Sink: Send {
    /// Receive the status and headers. Called once, before any body bytes.
    async fn before_process(&mut self, response: &PlannedResponse) -> io::Result<()>;

    /// Append a chunk to the body.
    async fn process(&mut self, chunk: Bytes) -> io::Result<()>;

    /// Called once after the last chunk.
    async fn after_process(&mut self) -> io::Result<()>;

    async fn on_not_found(&mut self, handler: Option<StatusHandler>) -> io::Result<()>
    where
        Self: Sized,
    {
        run_handler(self, handler).await
    }

    async fn on_range_not_satisfiable(&mut self, handler: Option<StatusHandler>) -> io::Result<()>
    where
        Self: Sized,
    {
        run_handler(self, handler).await
    }
}

async fn run_handler(sink: &mut dyn Sink, handler: Option<StatusHandler>) -> io::Result<()> {
    match handler {
        Some(handler) => handler(sink).await,
        None => Ok(()),
    }
}

/// Writes a raw HTTP/1.1 response (status line, headers, body) to an
/// [`AsyncWrite`], flushing after every chunk.
#[derive(Debug)]
pub struct WriterSink<W> {
    writer: W,
    written: u64,
}

impl WriterSink<tokio::io::Stdout> {
    /// Direct output to the process's standard output.
    ///
    /// ```
    /// use ranged_download::{BufferResource, Ranged, WriterSink};
    ///
    /// # #[tokio::main(flavor = "current_thread")]
    /// # async fn main() -> ranged_download::Result<()> {
    /// let mut stdout = WriterSink::stdout();
    /// Ranged::new(Some("bytes=0-4".to_string()), BufferResource::new("hello world"))
    ///     .send(&mut stdout)
    ///     .await?;
    /// # Ok(())
    /// # }
    /// ```
    pub fn stdout() -> Self {
        WriterSink::new(tokio::io::stdout())
    }
}

impl<W: AsyncWrite + Unpin + Send> WriterSink<W> {
    pub fn new(writer: W) -> Self {
        WriterSink { writer, written: 0 }
    }

    /// Body bytes written so far, status line and headers excluded.
    pub fn body_len(&self) -> u64 {
        self.written
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

#[async_trait]
impl<W: AsyncWrite + Unpin + Send> Sink for WriterSink<W> {
    async fn before_process(&mut self, response: &PlannedResponse) -> io::Result<()> {
        let head = format!("{}\r\n{}\r\n", response.status_line(), response.headers());
        self.writer.write_all(head.as_bytes()).await?;
        self.writer.flush().await
    }

    async fn process(&mut self, chunk: Bytes) -> io::Result<()> {
        self.writer.write_all(&chunk).await?;
        self.writer.flush().await?;
        self.written += chunk.len() as u64;
        Ok(())
    }

    async fn after_process(&mut self) -> io::Result<()> {
        self.writer.flush().await
    }
}

/// Collects the whole response in memory, for frameworks that build the
/// response before sending it. Implements [`IntoResponse`].
#[derive(Debug, Default)]
pub struct ResponseSink {
    status: StatusCode,
    headers: HeaderMap,
    body: BytesMut,
}

impl ResponseSink {
    pub fn new() -> Self {
        ResponseSink::default()
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }
}

#[async_trait]
impl Sink for ResponseSink {
    async fn before_process(&mut self, response: &PlannedResponse) -> io::Result<()> {
        self.status = response.status();
        for (name, value) in response.headers().iter() {
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
            let value = HeaderValue::from_bytes(value.as_bytes())
                .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
            self.headers.append(name, value);
        }
        Ok(())
    }

    async fn process(&mut self, chunk: Bytes) -> io::Result<()> {
        self.body.extend_from_slice(&chunk);
        Ok(())
    }

    async fn after_process(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl IntoResponse for ResponseSink {
    fn into_response(self) -> Response {
        let mut response = Response::new(Body::from(self.body.freeze()));
        *response.status_mut() = self.status;
        *response.headers_mut() = self.headers;
        response
    }
}

#[cfg(test)]
mod tests {
    use std::time::{Duration, UNIX_EPOCH};

    use super::*;
    use crate::{BufferResource, Ranged, ResponseMode};

    fn resource() -> BufferResource {
        BufferResource::new("0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz")
            .with_file_name("alphabet.txt")
            .with_modified(UNIX_EPOCH + Duration::from_secs(784111777))
    }

    #[tokio::test]
    async fn test_writer_sink_writes_head_then_body() {
        let mut sink = WriterSink::new(Vec::new());
        let planned = Ranged::new(Some("bytes=0-9".to_string()), resource())
            .send(&mut sink)
            .await
            .unwrap();

        assert_eq!(ResponseMode::SingleRange, planned.mode());
        assert_eq!(10, sink.body_len());

        let out = String::from_utf8(sink.into_inner()).unwrap();
        assert!(out.starts_with("HTTP/1.1 206 Partial Content\r\nAccept-Ranges: bytes\r\n"));
        assert!(out.contains("\r\nContent-Range: bytes 0-9/62\r\n"));
        assert!(out.ends_with("\r\n\r\n0123456789"));
    }

    #[tokio::test]
    async fn test_response_sink_into_response() {
        let mut sink = ResponseSink::new();
        Ranged::new(None, resource()).send(&mut sink).await.unwrap();

        assert_eq!(StatusCode::OK, sink.status());
        assert_eq!("62", sink.headers()["content-length"]);
        assert_eq!(62, sink.body().len());

        let response = sink.into_response();
        assert_eq!(StatusCode::OK, response.status());
        assert_eq!("bytes", response.headers()["accept-ranges"]);
        assert_eq!("no", response.headers()["x-accel-buffering"]);
    }

    #[tokio::test]
    async fn test_response_sink_keeps_non_ascii_disposition() {
        let mut sink = ResponseSink::new();
        Ranged::new(None, resource())
            .user_agent(Some("Chrome/120.0".to_string()))
            .download_name("résumé.txt")
            .send(&mut sink)
            .await
            .unwrap();

        assert_eq!(
            "attachment; filename=\"résumé.txt\"".as_bytes(),
            sink.headers()["content-disposition"].as_bytes()
        );
    }

    #[tokio::test]
    async fn test_static_body_handler() {
        let mut sink = ResponseSink::new();
        Ranged::new(Some("bytes=0-999".to_string()), resource())
            .on_range_not_satisfiable(static_body("out of range"))
            .send(&mut sink)
            .await
            .unwrap();

        assert_eq!(StatusCode::RANGE_NOT_SATISFIABLE, sink.status());
        assert_eq!(b"out of range", sink.body());
    }

    struct BrokenPipe;

    #[async_trait]
    impl Sink for BrokenPipe {
        async fn before_process(&mut self, _: &PlannedResponse) -> io::Result<()> {
            Ok(())
        }

        async fn process(&mut self, _: Bytes) -> io::Result<()> {
            Err(io::Error::new(io::ErrorKind::BrokenPipe, "client went away"))
        }

        async fn after_process(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_handler_write_failure_surfaces() {
        let err = Ranged::new(None, BufferResource::unavailable())
            .on_not_found(static_body("gone"))
            .send(&mut BrokenPipe)
            .await
            .unwrap_err();

        assert_eq!(io::ErrorKind::BrokenPipe, err.io().kind());
    }
}
