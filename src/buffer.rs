use std::fmt;
use std::time::SystemTime;

use async_trait::async_trait;
use bytes::Bytes;

use crate::resource::next_chunk_len;
use crate::{Error, RateLimit, Resource, Result, Sink};

/// Serves an in-memory buffer.
#[derive(Clone)]
pub struct BufferResource {
    data: Bytes,
    available: bool,
    mime_type: String,
    file_name: String,
    modified: SystemTime,
}

impl fmt::Debug for BufferResource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BufferResource")
            .field("byte_size", &self.data.len())
            .field("mime_type", &self.mime_type)
            .field("file_name", &self.file_name)
            .finish()
    }
}

impl BufferResource {
    /// Defaults to `application/octet-stream`, a timestamped `.txt` name
    /// and the current time as modification time.
    pub fn new(data: impl Into<Bytes>) -> Self {
        BufferResource {
            data: data.into(),
            available: true,
            mime_type: mime_guess::mime::APPLICATION_OCTET_STREAM.to_string(),
            file_name: chrono::Local::now().format("%Y-%m-%d_%H-%M-%S.txt").to_string(),
            modified: SystemTime::now(),
        }
    }

    /// An empty buffer that reports itself as not available.
    pub fn unavailable() -> Self {
        BufferResource { available: false, ..BufferResource::new(Bytes::new()) }
    }

    pub fn with_mime_type(mut self, mime_type: impl Into<String>) -> Self {
        self.mime_type = mime_type.into();
        self
    }

    pub fn with_file_name(mut self, file_name: impl Into<String>) -> Self {
        self.file_name = file_name.into();
        self
    }

    pub fn with_modified(mut self, modified: SystemTime) -> Self {
        self.modified = modified;
        self
    }
}

#[async_trait]
impl Resource for BufferResource {
    fn is_available(&self) -> bool {
        self.available
    }

    fn byte_size(&self) -> u64 {
        self.data.len() as u64
    }

    fn modified(&self) -> SystemTime {
        self.modified
    }

    fn created(&self) -> SystemTime {
        self.modified
    }

    fn mime_type(&self) -> String {
        self.mime_type.clone()
    }

    fn file_name(&self) -> String {
        self.file_name.clone()
    }

    async fn read_range(
        &mut self,
        start: u64,
        end: u64,
        rate: &RateLimit,
        sink: &mut dyn Sink,
    ) -> Result<u64> {
        let size = self.byte_size();
        let mut position = start;

        while position <= end && position < size {
            rate.throttle().await;

            let len = next_chunk_len(position, end, rate).min((size - position) as usize);
            let offset = position as usize;
            let chunk = self.data.slice(offset..offset + len);
            tracing::trace!(position, len, "buffer chunk");
            sink.process(chunk).await.map_err(Error::Sink)?;

            position += len as u64;
        }

        Ok(position.saturating_sub(start))
    }

    fn destroy(&mut self) {}
}

#[cfg(test)]
mod tests {
    use std::io;

    use async_trait::async_trait;
    use bytes::Bytes;

    use super::*;
    use crate::PlannedResponse;

    #[derive(Default)]
    struct Chunks(Vec<Bytes>);

    #[async_trait]
    impl Sink for Chunks {
        async fn before_process(&mut self, _: &PlannedResponse) -> io::Result<()> {
            Ok(())
        }

        async fn process(&mut self, chunk: Bytes) -> io::Result<()> {
            self.0.push(chunk);
            Ok(())
        }

        async fn after_process(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_read_range_in_chunks() {
        let mut resource = BufferResource::new("0123456789");
        let mut sink = Chunks::default();
        let rate = RateLimit::default().with_buffer_size(3);

        let n = resource.read_range(1, 8, &rate, &mut sink).await.unwrap();

        assert_eq!(8, n);
        assert_eq!(vec!["123", "456", "78"], sink.0.iter().map(|c| std::str::from_utf8(c).unwrap()).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn test_read_range_clamps_at_end_of_buffer() {
        let mut resource = BufferResource::new("0123456789");
        let mut sink = Chunks::default();

        let n = resource.read_range(5, 1000, &RateLimit::default(), &mut sink).await.unwrap();

        assert_eq!(5, n);
        assert_eq!(vec![Bytes::from_static(b"56789")], sink.0);
    }

    #[tokio::test]
    async fn test_read_range_past_end_reads_nothing() {
        let mut resource = BufferResource::new("0123456789");
        let mut sink = Chunks::default();

        let n = resource.read_range(10, 20, &RateLimit::default(), &mut sink).await.unwrap();

        assert_eq!(0, n);
        assert!(sink.0.is_empty());
    }

    #[test]
    fn test_metadata() {
        let resource = BufferResource::new("hello").with_mime_type("text/plain");
        assert!(resource.is_available());
        assert_eq!(5, resource.byte_size());
        assert_eq!("text/plain", resource.mime_type());
        assert!(resource.file_name().ends_with(".txt"));
        assert_eq!("YYYY-MM-DD_HH-MM-SS.txt".len(), resource.file_name().len());
        assert!(!BufferResource::unavailable().is_available());
    }

    #[test]
    fn test_destroy_is_idempotent() {
        let mut resource = BufferResource::new("hello");
        resource.destroy();
        resource.destroy();
        assert_eq!(5, resource.byte_size());
    }
}
