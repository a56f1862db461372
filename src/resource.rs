use std::time::SystemTime;

use async_trait::async_trait;

use crate::{RateLimit, Result, Sink};

/// A byte-addressable source with a fixed size, known up front.
///
/// Metadata is captured when the resource is opened, so planning never
/// touches I/O. Only [`Resource::read_range`] does.
#[async_trait]
pub trait Resource: Send {
    /// `false` when the resource could not be opened. Such a resource is
    /// answered with 404 and never read.
    fn is_available(&self) -> bool;

    /// The total size in bytes.
    ///
    /// This should not change for the lifetime of the object once queried.
    fn byte_size(&self) -> u64;

    fn modified(&self) -> SystemTime;

    fn created(&self) -> SystemTime;

    fn mime_type(&self) -> String;

    /// Download name used when none is configured.
    fn file_name(&self) -> String;

    /// Push bytes `start..=end` to `sink` in chunks of at most
    /// `rate.chunk_size()`, throttling before each chunk.
    ///
    /// Reading stops early at the end of the resource, so `end` may lie
    /// beyond it. Returns the number of bytes pushed.
    async fn read_range(
        &mut self,
        start: u64,
        end: u64,
        rate: &RateLimit,
        sink: &mut dyn Sink,
    ) -> Result<u64>;

    /// Release any underlying handle. Safe to call more than once.
    fn destroy(&mut self);
}

#[async_trait]
impl<'a, T: Resource + ?Sized> Resource for &'a mut T {
    fn is_available(&self) -> bool {
        (**self).is_available()
    }

    fn byte_size(&self) -> u64 {
        (**self).byte_size()
    }

    fn modified(&self) -> SystemTime {
        (**self).modified()
    }

    fn created(&self) -> SystemTime {
        (**self).created()
    }

    fn mime_type(&self) -> String {
        (**self).mime_type()
    }

    fn file_name(&self) -> String {
        (**self).file_name()
    }

    async fn read_range(
        &mut self,
        start: u64,
        end: u64,
        rate: &RateLimit,
        sink: &mut dyn Sink,
    ) -> Result<u64> {
        (**self).read_range(start, end, rate, sink).await
    }

    fn destroy(&mut self) {
        (**self).destroy()
    }
}

/// Size of the next chunk: bounded by the chunk size and the bytes left
/// up to the inclusive `end`.
pub(crate) fn next_chunk_len(position: u64, end: u64, rate: &RateLimit) -> usize {
    let remaining = (end - position).saturating_add(1);
    usize::try_from(remaining).unwrap_or(usize::MAX).min(rate.chunk_size())
}
