//! Artifact retrieval.
//!
//! Streams an artifact from an `http(s)` URL (or copies it from a `file://`
//! URL) into a scratch file. Transient failures are retried with
//! exponential backoff; everything else propagates on the first attempt.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use prebuilt_schema::ArtifactLocation;
use reqwest::{Client, StatusCode};
use thiserror::Error;
use tokio::fs::File;
use tokio::io::AsyncWriteExt;

use crate::Reporter;

/// Default whole-request timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(300);

/// Default connect timeout.
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// Errors raised while fetching an artifact.
#[derive(Error, Debug)]
pub enum FetchError {
    /// The server answered with a non-success status.
    #[error("HTTP {status} fetching {url}")]
    Status {
        /// Requested URL.
        url: String,
        /// Response status.
        status: StatusCode,
    },

    /// The request did not complete within the client timeout.
    #[error("Timed out fetching {url}")]
    Timeout {
        /// Requested URL.
        url: String,
    },

    /// Connection-level failure (refused, reset, body read error).
    #[error("Network error fetching {url}: {source}")]
    Transport {
        /// Requested URL.
        url: String,
        /// Underlying error.
        #[source]
        source: reqwest::Error,
    },

    /// The body ended before `Content-Length` bytes arrived.
    #[error("Truncated transfer from {url}: received {received} of {expected} bytes")]
    Truncated {
        /// Requested URL.
        url: String,
        /// Declared length.
        expected: u64,
        /// Bytes actually received.
        received: u64,
    },

    /// The HTTP client could not be constructed.
    #[error("Failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),

    /// A `file://` URL that does not name a local path.
    #[error("Cannot read local artifact {0}")]
    LocalPath(String),

    /// Local read or write failure.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl FetchError {
    fn from_reqwest(url: &str, err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout {
                url: url.to_string(),
            }
        } else {
            Self::Transport {
                url: url.to_string(),
                source: err,
            }
        }
    }

    /// Whether another attempt could succeed.
    ///
    /// Timeouts, connection failures, truncated bodies and HTTP 408/429/5xx
    /// are transient. Client errors such as 404 and local IO errors are not.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Timeout { .. } | Self::Transport { .. } | Self::Truncated { .. } => true,
            Self::Status { status, .. } => {
                status.is_server_error()
                    || *status == StatusCode::REQUEST_TIMEOUT
                    || *status == StatusCode::TOO_MANY_REQUESTS
            }
            Self::Client(_) | Self::LocalPath(_) | Self::Io(_) => false,
        }
    }
}

/// Bounded retry with exponential backoff.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first.
    pub max_attempts: u32,
    /// Delay before the second attempt; doubles for each one after.
    pub base_delay: Duration,
}

impl RetryPolicy {
    /// Delay to wait after failed attempt number `attempt` (1-based).
    pub fn delay_after(&self, attempt: u32) -> Duration {
        self.base_delay
            .saturating_mul(2u32.saturating_pow(attempt.saturating_sub(1)))
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(500),
        }
    }
}

/// Retrieves artifact bytes into a local file.
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Fetch `location` into `dest`, returning the number of bytes written.
    ///
    /// On error, `dest` must not be left behind.
    async fn fetch(
        &self,
        location: &ArtifactLocation,
        dest: &Path,
        reporter: &dyn Reporter,
    ) -> Result<u64, FetchError>;
}

/// [`Fetcher`] backed by `reqwest`, with `file://` support.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
    retry: RetryPolicy,
}

impl HttpFetcher {
    /// Build a fetcher whose requests time out after `timeout`.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError::Client`] if the TLS backend cannot be initialised.
    pub fn new(timeout: Duration) -> Result<Self, FetchError> {
        let client = Client::builder()
            .user_agent(crate::USER_AGENT)
            .timeout(timeout)
            .connect_timeout(CONNECT_TIMEOUT.min(timeout))
            .build()
            .map_err(FetchError::Client)?;

        Ok(Self {
            client,
            retry: RetryPolicy::default(),
        })
    }

    /// Replace the retry policy.
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    async fn fetch_once(
        &self,
        url: &str,
        dest: &Path,
        reporter: &dyn Reporter,
    ) -> Result<u64, FetchError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| FetchError::from_reqwest(url, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status,
            });
        }

        let expected = response.content_length();
        reporter.downloading(0, expected);

        let mut file = File::create(dest).await?;
        let mut stream = response.bytes_stream();
        let mut received: u64 = 0;

        while let Some(chunk) = stream.next().await {
            let chunk = match chunk {
                Ok(chunk) => chunk,
                // The connection closed before the declared length arrived.
                Err(e) if !e.is_timeout() && expected.is_some_and(|n| received < n) => {
                    return Err(FetchError::Truncated {
                        url: url.to_string(),
                        expected: expected.unwrap_or_default(),
                        received,
                    });
                }
                Err(e) => return Err(FetchError::from_reqwest(url, e)),
            };
            file.write_all(&chunk).await?;
            received += chunk.len() as u64;
            reporter.downloading(received, expected);
        }

        file.flush().await?;
        file.sync_all().await?;

        match expected {
            Some(expected) if received < expected => Err(FetchError::Truncated {
                url: url.to_string(),
                expected,
                received,
            }),
            _ => Ok(received),
        }
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(
        &self,
        location: &ArtifactLocation,
        dest: &Path,
        reporter: &dyn Reporter,
    ) -> Result<u64, FetchError> {
        if location.is_local() {
            return copy_local(location, dest, reporter).await;
        }

        let url = location.as_str();
        let max_attempts = self.retry.max_attempts.max(1);
        let mut attempt = 1;

        loop {
            tracing::debug!(url, attempt, "fetching artifact");

            let err = match self.fetch_once(url, dest, reporter).await {
                Ok(bytes) => return Ok(bytes),
                Err(e) => e,
            };

            // Never leave a partial download behind, whether or not we retry.
            let _ = tokio::fs::remove_file(dest).await;

            if !err.is_transient() || attempt >= max_attempts {
                return Err(err);
            }

            let delay = self.retry.delay_after(attempt);
            tracing::warn!(
                url,
                attempt,
                max_attempts,
                delay_ms = delay.as_millis() as u64,
                error = %err,
                "transient fetch failure, retrying"
            );
            reporter.retrying(attempt + 1, max_attempts, &err.to_string());

            tokio::time::sleep(delay).await;
            attempt += 1;
        }
    }
}

async fn copy_local(
    location: &ArtifactLocation,
    dest: &Path,
    reporter: &dyn Reporter,
) -> Result<u64, FetchError> {
    let src = location
        .to_file_path()
        .ok_or_else(|| FetchError::LocalPath(location.to_string()))?;

    tracing::debug!(src = %src.display(), "copying local artifact");
    match tokio::fs::copy(&src, dest).await {
        Ok(bytes) => {
            reporter.downloading(bytes, Some(bytes));
            Ok(bytes)
        }
        Err(e) => {
            let _ = tokio::fs::remove_file(dest).await;
            Err(e.into())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::NullReporter;
    use mockito::Server;
    use tempfile::TempDir;
    use tokio::io::AsyncReadExt;
    use tokio::net::TcpListener;

    fn fast_retry() -> RetryPolicy {
        RetryPolicy {
            max_attempts: 3,
            base_delay: Duration::from_millis(1),
        }
    }

    fn fetcher() -> HttpFetcher {
        HttpFetcher::new(Duration::from_secs(10))
            .unwrap()
            .with_retry(fast_retry())
    }

    fn single_attempt() -> RetryPolicy {
        RetryPolicy {
            max_attempts: 1,
            base_delay: Duration::ZERO,
        }
    }

    /// Accept one connection, read the request, then hand the socket to `respond`.
    async fn raw_server<F, Fut>(respond: F) -> String
    where
        F: FnOnce(tokio::net::TcpStream) -> Fut + Send + 'static,
        Fut: std::future::Future<Output = ()> + Send + 'static,
    {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = [0u8; 4096];
            let _ = socket.read(&mut buf).await;
            respond(socket).await;
        });
        format!("http://{addr}")
    }

    #[test]
    fn backoff_doubles() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay_after(1), Duration::from_millis(500));
        assert_eq!(policy.delay_after(2), Duration::from_millis(1000));
        assert_eq!(policy.delay_after(3), Duration::from_millis(2000));
    }

    #[test]
    fn transient_classification() {
        let status = |code: u16| FetchError::Status {
            url: String::new(),
            status: StatusCode::from_u16(code).unwrap(),
        };
        assert!(status(503).is_transient());
        assert!(status(429).is_transient());
        assert!(!status(404).is_transient());
        assert!(!status(403).is_transient());
        assert!(
            FetchError::Truncated {
                url: String::new(),
                expected: 10,
                received: 3
            }
            .is_transient()
        );
        assert!(!FetchError::Io(std::io::Error::other("disk full")).is_transient());
    }

    #[tokio::test]
    async fn downloads_body() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", "/tool.tar.gz")
            .with_status(200)
            .with_body("artifact-bytes")
            .expect(1)
            .create_async()
            .await;

        let tmp = TempDir::new().unwrap();
        let dest = tmp.path().join("tool.tar.gz");
        let location = ArtifactLocation::parse(&format!("{}/tool.tar.gz", server.url())).unwrap();

        let bytes = fetcher()
            .fetch(&location, &dest, &NullReporter)
            .await
            .unwrap();

        assert_eq!(bytes, 14);
        assert_eq!(std::fs::read(&dest).unwrap(), b"artifact-bytes");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn not_found_is_not_retried() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", "/missing.tar.gz")
            .with_status(404)
            .expect(1)
            .create_async()
            .await;

        let tmp = TempDir::new().unwrap();
        let dest = tmp.path().join("missing.tar.gz");
        let location =
            ArtifactLocation::parse(&format!("{}/missing.tar.gz", server.url())).unwrap();

        let err = fetcher()
            .fetch(&location, &dest, &NullReporter)
            .await
            .unwrap_err();

        assert!(matches!(err, FetchError::Status { status, .. } if status == StatusCode::NOT_FOUND));
        assert!(!dest.exists());
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn server_errors_are_retried_up_to_the_limit() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", "/flaky.tar.gz")
            .with_status(503)
            .expect(3)
            .create_async()
            .await;

        let tmp = TempDir::new().unwrap();
        let dest = tmp.path().join("flaky.tar.gz");
        let location = ArtifactLocation::parse(&format!("{}/flaky.tar.gz", server.url())).unwrap();

        let err = fetcher()
            .fetch(&location, &dest, &NullReporter)
            .await
            .unwrap_err();

        assert!(err.is_transient());
        assert!(!dest.exists());
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn server_error_then_success_recovers() {
        let mut server = Server::new_async().await;
        let unavailable = server
            .mock("GET", "/tool.tar.gz")
            .with_status(503)
            .expect(1)
            .create_async()
            .await;
        let ok = server
            .mock("GET", "/tool.tar.gz")
            .with_status(200)
            .with_body("ok")
            .expect(1)
            .create_async()
            .await;

        let tmp = TempDir::new().unwrap();
        let dest = tmp.path().join("tool.tar.gz");
        let location = ArtifactLocation::parse(&format!("{}/tool.tar.gz", server.url())).unwrap();

        let bytes = fetcher()
            .fetch(&location, &dest, &NullReporter)
            .await
            .unwrap();

        assert_eq!(bytes, 2);
        assert_eq!(std::fs::read(&dest).unwrap(), b"ok");
        unavailable.assert_async().await;
        ok.assert_async().await;
    }

    #[tokio::test]
    async fn short_body_is_truncated() {
        let base = raw_server(|mut socket| async move {
            let _ = socket
                .write_all(b"HTTP/1.1 200 OK\r\nContent-Length: 100\r\nConnection: close\r\n\r\nshort")
                .await;
            let _ = socket.shutdown().await;
        })
        .await;

        let tmp = TempDir::new().unwrap();
        let dest = tmp.path().join("tool.tar.gz");
        let location = ArtifactLocation::parse(&format!("{base}/tool.tar.gz")).unwrap();

        let err = HttpFetcher::new(Duration::from_secs(10))
            .unwrap()
            .with_retry(single_attempt())
            .fetch(&location, &dest, &NullReporter)
            .await
            .unwrap_err();

        assert!(
            matches!(err, FetchError::Truncated { expected: 100, received, .. } if received < 100),
            "got {err:?}"
        );
        assert!(err.is_transient());
        assert!(!dest.exists());
    }

    #[tokio::test]
    async fn stalled_server_times_out() {
        let base = raw_server(|socket| async move {
            tokio::time::sleep(Duration::from_secs(10)).await;
            drop(socket);
        })
        .await;

        let tmp = TempDir::new().unwrap();
        let dest = tmp.path().join("tool.tar.gz");
        let location = ArtifactLocation::parse(&format!("{base}/tool.tar.gz")).unwrap();

        let err = HttpFetcher::new(Duration::from_millis(200))
            .unwrap()
            .with_retry(single_attempt())
            .fetch(&location, &dest, &NullReporter)
            .await
            .unwrap_err();

        assert!(matches!(err, FetchError::Timeout { .. }), "got {err:?}");
        assert!(err.is_transient());
        assert!(!dest.exists());
    }

    #[tokio::test]
    async fn copies_file_urls() {
        let tmp = TempDir::new().unwrap();
        let src = tmp.path().join("local.tar.gz");
        std::fs::write(&src, b"local").unwrap();
        let dest = tmp.path().join("fetched");

        let location = ArtifactLocation::from_file_path(&src).unwrap();
        let bytes = fetcher()
            .fetch(&location, &dest, &NullReporter)
            .await
            .unwrap();

        assert_eq!(bytes, 5);
        assert_eq!(std::fs::read(&dest).unwrap(), b"local");
    }

    #[tokio::test]
    async fn missing_local_file_is_io_error() {
        let tmp = TempDir::new().unwrap();
        let location = ArtifactLocation::from_file_path(&tmp.path().join("nope")).unwrap();
        let dest = tmp.path().join("fetched");

        let err = fetcher()
            .fetch(&location, &dest, &NullReporter)
            .await
            .unwrap_err();
        assert!(matches!(err, FetchError::Io(_)));
        assert!(!dest.exists());
    }
}
