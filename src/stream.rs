use std::io;

use async_trait::async_trait;
use bytes::Bytes;
use futures::Stream;
use tokio::sync::mpsc;

use crate::{PlannedResponse, Sink};

/// Chunks buffered between the sending task and the response body.
pub const CHANNEL_CAPACITY: usize = 8;

/// Forwards body chunks over a bounded channel, so a response body can be
/// streamed while the send runs in another task.
///
/// Writes fail with [`io::ErrorKind::BrokenPipe`] once the receiving body
/// is dropped, which stops the send.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: mpsc::Sender<io::Result<Bytes>>,
}

impl ChannelSink {
    /// Abort the body with `error`. Ignored if the body is already gone.
    pub async fn fail(&self, error: io::Error) {
        let _ = self.tx.send(Err(error)).await;
    }
}

/// A connected sink and body stream. The stream ends once every clone of
/// the sink is dropped.
pub fn channel(capacity: usize) -> (ChannelSink, impl Stream<Item = io::Result<Bytes>> + Send + 'static) {
    let (tx, mut rx) = mpsc::channel(capacity.max(1));
    let body = async_stream::stream! {
        while let Some(item) = rx.recv().await {
            yield item;
        }
    };
    (ChannelSink { tx }, body)
}

#[async_trait]
impl Sink for ChannelSink {
    async fn before_process(&mut self, _response: &PlannedResponse) -> io::Result<()> {
        Ok(())
    }

    async fn process(&mut self, chunk: Bytes) -> io::Result<()> {
        self.tx
            .send(Ok(chunk))
            .await
            .map_err(|_| io::Error::new(io::ErrorKind::BrokenPipe, "response body dropped"))
    }

    async fn after_process(&mut self) -> io::Result<()> {
        Ok(())
    }
}
