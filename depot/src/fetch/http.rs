//! HTTP fetcher backed by reqwest.

use futures_util::StreamExt;
use tokio::io::{AsyncWriteExt, BufWriter};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::{FetchFuture, FetchRequest, Fetcher, ProgressGate, ProgressSink, TransportResult};
use crate::config::ServiceConfig;

/// Streaming HTTP downloader.
///
/// Streams the response body chunk-by-chunk to the staging file, emitting
/// rate-bounded progress ticks and polling the cancellation token between
/// chunks. The whole-request timeout covers body streaming, so a stalled
/// transfer eventually surfaces as a network failure.
pub struct HttpFetcher {
    client: reqwest::Client,
    progress_interval: std::time::Duration,
}

impl HttpFetcher {
    /// Creates a fetcher from the service configuration.
    pub fn new(config: &ServiceConfig) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .user_agent(config.user_agent.clone())
            .timeout(config.request_timeout)
            .connect_timeout(config.connect_timeout)
            .build()?;

        Ok(Self {
            client,
            progress_interval: config.progress_interval,
        })
    }

    async fn run(
        &self,
        request: FetchRequest,
        progress: ProgressSink,
        cancel: CancellationToken,
    ) -> TransportResult {
        if cancel.is_cancelled() {
            return TransportResult::Cancelled;
        }

        let mut builder = self.client.get(&request.url);
        if let Some(token) = request.auth_token.as_deref() {
            if !token.is_empty() {
                builder = builder.header(reqwest::header::AUTHORIZATION, token);
            }
        }

        let response = tokio::select! {
            biased;

            _ = cancel.cancelled() => return TransportResult::Cancelled,

            result = builder.send() => match result {
                Ok(response) => response,
                Err(err) => return TransportResult::Network(err.to_string()),
            },
        };

        let status = response.status();
        if !status.is_success() {
            debug!(url = %request.url, status = status.as_u16(), "server rejected download");
            return TransportResult::HttpStatus(status.as_u16());
        }

        let total = response.content_length();
        let file = match tokio::fs::File::create(&request.destination).await {
            Ok(file) => file,
            Err(err) => {
                return TransportResult::Network(format!(
                    "failed to open {}: {}",
                    request.destination.display(),
                    err
                ))
            }
        };

        let mut writer = BufWriter::new(file);
        let mut stream = response.bytes_stream();
        let mut gate = ProgressGate::new(self.progress_interval);
        let mut read: u64 = 0;

        if gate.ready() {
            progress(read, total);
        }

        loop {
            let chunk = tokio::select! {
                biased;

                _ = cancel.cancelled() => return TransportResult::Cancelled,

                chunk = stream.next() => chunk,
            };

            match chunk {
                Some(Ok(bytes)) => {
                    if let Err(err) = writer.write_all(&bytes).await {
                        return TransportResult::Network(format!(
                            "failed to write {}: {}",
                            request.destination.display(),
                            err
                        ));
                    }
                    read += bytes.len() as u64;
                    if gate.ready() {
                        progress(read, total);
                    }
                }
                Some(Err(err)) => return TransportResult::Network(err.to_string()),
                None => break,
            }
        }

        if let Err(err) = writer.flush().await {
            return TransportResult::Network(format!(
                "failed to flush {}: {}",
                request.destination.display(),
                err
            ));
        }

        // Final tick bypasses the gate so observers see the full byte count.
        progress(read, total);
        TransportResult::Complete
    }
}

impl Fetcher for HttpFetcher {
    fn fetch(
        &self,
        request: FetchRequest,
        progress: ProgressSink,
        cancel: CancellationToken,
    ) -> FetchFuture<'_> {
        Box::pin(self.run(request, progress, cancel))
    }
}
