//! Ranged HTTP transfer engine
//!
//! Performs one GET per invocation, streaming the body to disk in 64 KiB
//! chunks with cooperative cancellation and window-based throttling. No
//! retries and no network timeouts; a stalled connection blocks its worker.

use crate::error::RegetError;
use crate::policy::BandwidthPolicy;
use async_trait::async_trait;
use futures::TryStreamExt;
use reqwest::header::{ACCEPT_RANGES, CONTENT_LENGTH, RANGE};
use reqwest::{Client, StatusCode};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::fs::OpenOptions;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio_util::io::StreamReader;
use tracing::debug;

const CHUNK_SIZE: usize = 64 * 1024;
const MAX_THROTTLE_SLEEP: Duration = Duration::from_millis(250);
const THROTTLE_WINDOW: Duration = Duration::from_secs(1);

/// Cooperative stop flag for one transfer attempt.
///
/// Owned by the orchestrator and replaced on every resume; the running job
/// only ever reads its own handle, once per chunk.
#[derive(Debug, Default)]
pub struct StopSignal {
    stopped: AtomicBool,
}

impl StopSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stop(&self) {
        self.stopped.store(true, Ordering::Release);
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::Acquire)
    }
}

/// Receives progress reports from a running transfer.
#[async_trait]
pub trait ProgressSink: Send + Sync {
    /// `bytes_written` is the target file's total length so far;
    /// `total_bytes` is the logical total, -1 while unknown.
    async fn on_progress(&self, bytes_written: u64, total_bytes: i64);
}

/// What a finished engine invocation reports back.
#[derive(Debug, Clone, Copy)]
pub struct TransferOutcome {
    /// Logical total length of the resource, -1 if the server never said.
    pub total_len: i64,
    /// Whether the server honors byte ranges for this resource.
    pub supports_range: bool,
    /// True when the loop stopped on the stop signal rather than stream
    /// exhaustion. Not a failure; the caller decides what it means.
    pub interrupted: bool,
}

/// HTTP client wrapper performing ranged, resumable fetches.
#[derive(Clone, Debug)]
pub struct HttpDownloader {
    client: Client,
}

impl Default for HttpDownloader {
    fn default() -> Self {
        Self::new()
    }
}

impl HttpDownloader {
    pub fn new() -> Self {
        let client = Client::builder()
            .user_agent("reget/0.1")
            .build()
            .expect("failed to create HTTP client");
        Self { client }
    }

    /// Fetch `url` into `target`, starting at byte `start_at`.
    ///
    /// With `start_at > 0` the request carries `Range: bytes=<start_at>-` and
    /// the target is opened for append; otherwise it is created/truncated.
    /// Progress is reported after every written chunk as the file's total
    /// length plus the logical total. The stop signal is checked once per
    /// chunk, so cancellation latency is bounded by one chunk plus one
    /// throttle sleep.
    pub async fn download(
        &self,
        url: &str,
        target: &Path,
        start_at: u64,
        progress: &dyn ProgressSink,
        stop: Arc<StopSignal>,
        policy: Arc<BandwidthPolicy>,
    ) -> Result<TransferOutcome, RegetError> {
        let mut request = self.client.get(url);
        if start_at > 0 {
            request = request.header(RANGE, format!("bytes={start_at}-"));
        }

        let response = request.send().await?;
        let status = response.status();
        if status != StatusCode::OK && status != StatusCode::PARTIAL_CONTENT {
            return Err(RegetError::HttpStatus {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }

        let content_length: i64 = response
            .headers()
            .get(CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse().ok())
            .unwrap_or(-1);

        let supports_range = status == StatusCode::PARTIAL_CONTENT
            || response
                .headers()
                .get(ACCEPT_RANGES)
                .and_then(|v| v.to_str().ok())
                .map(|v| v.eq_ignore_ascii_case("bytes"))
                .unwrap_or(false);

        // The logical total counts what is already on disk when resuming.
        let total_len = if content_length > 0 && start_at > 0 {
            content_length + start_at as i64
        } else {
            content_length
        };

        if let Some(parent) = target.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }

        let mut file = if start_at > 0 {
            OpenOptions::new()
                .create(true)
                .append(true)
                .open(target)
                .await?
        } else {
            OpenOptions::new()
                .create(true)
                .write(true)
                .truncate(true)
                .open(target)
                .await?
        };

        let mut body = StreamReader::new(response.bytes_stream().map_err(std::io::Error::other));
        let mut buf = vec![0u8; CHUNK_SIZE];
        let mut written = start_at;
        let mut throttle = Throttle::new();
        let mut interrupted = false;

        loop {
            let n = body.read(&mut buf).await?;
            if n == 0 {
                break;
            }
            if stop.is_stopped() {
                debug!(url, written, "transfer stopped by signal");
                interrupted = true;
                break;
            }

            file.write_all(&buf[..n]).await?;
            written += n as u64;
            progress.on_progress(written, total_len).await;

            throttle.pace(n as u64, policy.limit()).await;
        }

        file.flush().await?;

        Ok(TransferOutcome {
            total_len,
            supports_range,
            interrupted,
        })
    }
}

/// Rolling one-second throughput window.
struct Throttle {
    window_start: Instant,
    window_bytes: u64,
}

impl Throttle {
    fn new() -> Self {
        Self {
            window_start: Instant::now(),
            window_bytes: 0,
        }
    }

    /// Account `bytes` and sleep off any deficit against `limit_bps`.
    ///
    /// The sleep is the time this window should have taken at the limit minus
    /// the time it actually took, capped at 250 ms per call so the loop stays
    /// responsive to cancellation and limit changes.
    async fn pace(&mut self, bytes: u64, limit_bps: u64) {
        self.window_bytes += bytes;

        if limit_bps > 0 {
            let elapsed = self.window_start.elapsed();
            let seconds = elapsed.as_secs_f64();
            if seconds > 0.0 && (self.window_bytes as f64 / seconds) > limit_bps as f64 {
                let expected =
                    Duration::from_secs_f64(self.window_bytes as f64 / limit_bps as f64);
                if let Some(deficit) = expected.checked_sub(elapsed) {
                    tokio::time::sleep(deficit.min(MAX_THROTTLE_SLEEP)).await;
                }
            }
        }

        if self.window_start.elapsed() >= THROTTLE_WINDOW {
            self.window_start = Instant::now();
            self.window_bytes = 0;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn pace_sleeps_off_the_deficit() {
        let mut throttle = Throttle::new();
        // 1000 bytes at 4000 B/s should take 250 ms; almost none has elapsed.
        let start = Instant::now();
        throttle.pace(1000, 4000).await;
        assert!(start.elapsed() >= Duration::from_millis(200));
    }

    #[tokio::test]
    async fn pace_is_immediate_when_unlimited() {
        let mut throttle = Throttle::new();
        let start = Instant::now();
        for _ in 0..10 {
            throttle.pace(u64::from(u32::MAX), 0).await;
        }
        assert!(start.elapsed() < Duration::from_millis(50));
    }

    #[tokio::test]
    async fn pace_caps_a_single_sleep() {
        let mut throttle = Throttle::new();
        // A huge burst would owe seconds; one call must still return quickly.
        let start = Instant::now();
        throttle.pace(10_000_000, 1000).await;
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_millis(200));
        assert!(elapsed < Duration::from_millis(500));
    }

    #[test]
    fn stop_signal_is_one_way() {
        let signal = StopSignal::new();
        assert!(!signal.is_stopped());
        signal.stop();
        assert!(signal.is_stopped());
    }
}
