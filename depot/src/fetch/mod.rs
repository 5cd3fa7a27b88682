//! Transport abstraction for artifact downloads.
//!
//! The [`Fetcher`] trait is the seam between the scheduler and the network:
//! the production implementation is [`HttpFetcher`], while tests inject a
//! scripted fetcher. A fetcher streams bytes to a staging path, reports
//! byte progress at a bounded rate, and honors cooperative cancellation at
//! chunk boundaries, yielding exactly one [`TransportResult`].

mod http;

pub use http::HttpFetcher;

use std::future::Future;
use std::path::PathBuf;
use std::pin::Pin;
use std::time::{Duration, Instant};

use tokio_util::sync::CancellationToken;

/// Terminal outcome of one transfer attempt.
///
/// "No response" and "unsuccessful response" stay distinct because their
/// user-facing failure text differs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportResult {
    /// The body was fully streamed to the destination.
    Complete,

    /// The server answered with a non-2xx status.
    HttpStatus(u16),

    /// Connection, timeout or local I/O failure; the reason is logged.
    Network(String),

    /// The cancellation token fired before the transfer finished.
    Cancelled,
}

impl TransportResult {
    /// Returns true for a fully completed transfer.
    pub fn is_complete(&self) -> bool {
        matches!(self, Self::Complete)
    }
}

/// Byte progress callback: `(bytes_read, total_bytes)`.
///
/// `total_bytes` is `None` when the server omits a content length.
pub type ProgressSink = Box<dyn Fn(u64, Option<u64>) + Send + Sync>;

/// Boxed future returned by [`Fetcher::fetch`].
pub type FetchFuture<'a> = Pin<Box<dyn Future<Output = TransportResult> + Send + 'a>>;

/// Parameters for one transfer.
#[derive(Debug, Clone)]
pub struct FetchRequest {
    /// Source URL.
    pub url: String,

    /// Staging path the body is streamed to. The parent directory exists.
    pub destination: PathBuf,

    /// Optional `Authorization` header value.
    pub auth_token: Option<String>,
}

/// Streams one URL to a local staging path.
///
/// Implementations must invoke the progress sink at a bounded rate, poll
/// the cancellation token between chunks, and leave any partially written
/// destination file in place for the caller to discard.
pub trait Fetcher: Send + Sync + 'static {
    fn fetch(
        &self,
        request: FetchRequest,
        progress: ProgressSink,
        cancel: CancellationToken,
    ) -> FetchFuture<'_>;
}

/// Rate limiter for progress ticks.
///
/// The first call after construction always passes so observers see an
/// initial `Downloading` event promptly; afterwards ticks pass only when at
/// least `interval` has elapsed since the last passed tick.
#[derive(Debug)]
pub struct ProgressGate {
    interval: Duration,
    last: Option<Instant>,
}

impl ProgressGate {
    /// Creates a gate with the given minimum interval.
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last: None,
        }
    }

    /// Returns true if a tick should be emitted now.
    pub fn ready(&mut self) -> bool {
        match self.last {
            Some(last) if last.elapsed() < self.interval => false,
            _ => {
                self.last = Some(Instant::now());
                true
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transport_result_is_complete() {
        assert!(TransportResult::Complete.is_complete());
        assert!(!TransportResult::HttpStatus(404).is_complete());
        assert!(!TransportResult::Network("refused".to_string()).is_complete());
        assert!(!TransportResult::Cancelled.is_complete());
    }

    #[test]
    fn test_progress_gate_first_tick_passes() {
        let mut gate = ProgressGate::new(Duration::from_secs(60));
        assert!(gate.ready());
    }

    #[test]
    fn test_progress_gate_blocks_within_interval() {
        let mut gate = ProgressGate::new(Duration::from_secs(60));
        assert!(gate.ready());
        assert!(!gate.ready());
        assert!(!gate.ready());
    }

    #[test]
    fn test_progress_gate_passes_after_interval() {
        let mut gate = ProgressGate::new(Duration::from_millis(10));
        assert!(gate.ready());
        std::thread::sleep(Duration::from_millis(20));
        assert!(gate.ready());
    }

    #[test]
    fn test_progress_gate_zero_interval_always_passes() {
        let mut gate = ProgressGate::new(Duration::ZERO);
        assert!(gate.ready());
        assert!(gate.ready());
        assert!(gate.ready());
    }
}
