//! Status probe logic.
//!
//! Performs a single HTTP GET against an instance's status URL and
//! classifies the outcome as `UP` or `DOWN`. Transport failures are
//! retried exactly once.

use std::time::Duration;

use async_trait::async_trait;
use http_body_util::BodyExt;
use tracing::{debug, error};

use registrar_core::InstanceStatus;

/// Timeout applied to each probe attempt.
pub const PROBE_TIMEOUT: Duration = Duration::from_secs(15);

/// Something that can tell whether an instance is up.
///
/// Implementations never fail: every problem maps to `Down`.
#[async_trait]
pub trait StatusProbe: Send + Sync {
    async fn probe(&self, status_url: &str) -> InstanceStatus;
}

/// Outcome of one HTTP attempt that reached the server.
#[derive(Debug)]
struct ProbeResponse {
    status: http::StatusCode,
    body: Result<bytes::Bytes, String>,
}

/// Why an attempt never produced a response.
#[derive(Debug, thiserror::Error)]
enum TransportError {
    #[error("invalid status url: {0}")]
    InvalidUrl(String),
    #[error("connect failed: {0}")]
    Connect(#[from] std::io::Error),
    #[error("http error: {0}")]
    Http(#[from] hyper::Error),
    #[error("timed out after {0:?}")]
    Timeout(Duration),
}

/// HTTP implementation of [`StatusProbe`].
#[derive(Debug, Clone)]
pub struct HttpStatusProbe {
    timeout: Duration,
}

impl Default for HttpStatusProbe {
    fn default() -> Self {
        Self {
            timeout: PROBE_TIMEOUT,
        }
    }
}

impl HttpStatusProbe {
    pub fn new() -> Self {
        Self::default()
    }

    /// Probe with a custom per-attempt timeout (for testing).
    pub fn with_timeout(timeout: Duration) -> Self {
        Self { timeout }
    }

    /// GET the URL, retrying once if the first attempt fails in transport.
    async fn get_with_retry(&self, url: &str) -> Result<ProbeResponse, TransportError> {
        match self.get(url).await {
            Ok(resp) => Ok(resp),
            Err(e) => {
                error!(%url, error = %e, "first status attempt failed, retrying");
                self.get(url).await
            }
        }
    }

    async fn get(&self, url: &str) -> Result<ProbeResponse, TransportError> {
        let uri: http::Uri = url
            .parse()
            .map_err(|e: http::uri::InvalidUri| TransportError::InvalidUrl(e.to_string()))?;
        let authority = uri
            .authority()
            .ok_or_else(|| TransportError::InvalidUrl(url.to_string()))?
            .clone();
        let address = match authority.port_u16() {
            Some(_) => authority.to_string(),
            None => format!("{}:80", authority.host()),
        };

        let timeout = self.timeout;
        let exchange = async {
            let stream = tokio::net::TcpStream::connect(&address).await?;
            let io = hyper_util::rt::TokioIo::new(stream);
            let (mut sender, conn) = hyper::client::conn::http1::handshake(io).await?;

            // Drive the connection in the background.
            tokio::spawn(async move {
                let _ = conn.await;
            });

            let req = http::Request::builder()
                .method("GET")
                .uri(uri.path_and_query().map_or("/", |pq| pq.as_str()))
                .header("host", authority.as_str())
                .header("user-agent", "registrar-health/0.1")
                .body(http_body_util::Empty::<bytes::Bytes>::new())
                .map_err(|e| TransportError::InvalidUrl(e.to_string()))?;

            let resp = sender.send_request(req).await?;
            let status = resp.status();
            let body = resp
                .into_body()
                .collect()
                .await
                .map(|collected| collected.to_bytes())
                .map_err(|e| e.to_string());
            Ok::<_, TransportError>(ProbeResponse { status, body })
        };

        tokio::time::timeout(timeout, exchange)
            .await
            .map_err(|_| TransportError::Timeout(timeout))?
    }
}

#[async_trait]
impl StatusProbe for HttpStatusProbe {
    async fn probe(&self, status_url: &str) -> InstanceStatus {
        let resp = match self.get_with_retry(status_url).await {
            Ok(resp) => resp,
            Err(e) => {
                error!(url = %status_url, error = %e, "error fetching status");
                return InstanceStatus::Down;
            }
        };

        classify(status_url, resp)
    }
}

fn classify(status_url: &str, resp: ProbeResponse) -> InstanceStatus {
    let body = match resp.body {
        Ok(body) => body,
        Err(e) => {
            error!(url = %status_url, error = %e, "error reading status response body");
            return InstanceStatus::Down;
        }
    };

    if resp.status == http::StatusCode::OK {
        debug!(url = %status_url, "service is UP");
        InstanceStatus::Up
    } else {
        error!(
            url = %status_url,
            status = %resp.status,
            body = %String::from_utf8_lossy(&body),
            "service is DOWN"
        );
        InstanceStatus::Down
    }
}
