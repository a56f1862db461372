use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Default read chunk size, 16 KiB.
pub const DEFAULT_BUFFER_SIZE: usize = 16 * 1024;

/// Throughput cap applied by resources while streaming.
///
/// `limit_kb_per_sec <= 1` means unlimited.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct RateLimit {
    pub limit_kb_per_sec: i64,
    pub buffer_size: usize,
}

impl Default for RateLimit {
    fn default() -> Self {
        RateLimit {
            limit_kb_per_sec: -1,
            buffer_size: DEFAULT_BUFFER_SIZE,
        }
    }
}

impl RateLimit {
    pub fn unlimited() -> Self {
        RateLimit::default()
    }

    pub fn kb_per_sec(limit_kb_per_sec: i64) -> Self {
        RateLimit { limit_kb_per_sec, ..RateLimit::default() }
    }

    pub fn with_buffer_size(mut self, buffer_size: usize) -> Self {
        self.buffer_size = buffer_size;
        self
    }

    /// Chunk size used by resources, never zero.
    pub fn chunk_size(&self) -> usize {
        self.buffer_size.max(1)
    }

    /// Pause taken before each chunk.
    pub fn delay(&self) -> Duration {
        compute_delay(self.buffer_size, self.limit_kb_per_sec)
    }

    /// Sleep for [`RateLimit::delay`]. Returns immediately when unlimited.
    ///
    /// Overshoot is not compensated across chunks.
    pub async fn throttle(&self) {
        let delay = self.delay();
        if !delay.is_zero() {
            tracing::trace!(?delay, "rate limit");
            tokio::time::sleep(delay).await;
        }
    }
}

/// `buffer_size / (limit_kb_per_sec * 1024)` seconds, zero when
/// `limit_kb_per_sec <= 1`.
pub fn compute_delay(buffer_size: usize, limit_kb_per_sec: i64) -> Duration {
    if limit_kb_per_sec <= 1 {
        return Duration::ZERO;
    }
    let bytes_per_sec = limit_kb_per_sec as f64 * 1024.0;
    Duration::from_secs_f64(buffer_size as f64 / bytes_per_sec)
}
