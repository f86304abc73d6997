//! HTTP client for the Eureka REST API.

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::client::legacy::Client;
use hyper_util::rt::TokioExecutor;
use tracing::{debug, info, warn};

use registrar_core::config::RegistryConfig;
use registrar_core::{Applications, ServiceInstance};

use crate::error::{RegistryError, RegistryResult};
use crate::registry::RegistryClient;
use crate::wire;

/// Talks to a single Eureka server.
#[derive(Clone)]
pub struct EurekaClient {
    base_url: String,
    timeout: Duration,
    debug: bool,
    http: Client<HttpConnector, Full<Bytes>>,
}

struct Response {
    status: http::StatusCode,
    body: Bytes,
}

impl EurekaClient {
    /// Create a client for the registry at `base_url` (e.g.
    /// `http://eureka:8761/eureka`).
    pub fn new(base_url: &str, timeout: Duration) -> RegistryResult<Self> {
        let base_url = base_url.trim_end_matches('/').to_string();
        let uri: http::Uri = base_url
            .parse()
            .map_err(|e: http::uri::InvalidUri| RegistryError::InvalidUrl(e.to_string()))?;
        if uri.scheme_str() != Some("http") || uri.authority().is_none() {
            return Err(RegistryError::InvalidUrl(base_url));
        }

        Ok(Self {
            base_url,
            timeout,
            debug: false,
            http: Client::builder(TokioExecutor::new()).build_http(),
        })
    }

    pub fn from_config(config: &RegistryConfig) -> RegistryResult<Self> {
        Ok(Self::new(&config.url, config.timeout())?.with_debug(config.debug))
    }

    /// Log every request and response at debug level.
    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn instance_url(&self, inst: &ServiceInstance) -> String {
        format!("{}/apps/{}/{}", self.base_url, inst.app, inst.instance_id)
    }

    async fn send(
        &self,
        method: http::Method,
        url: String,
        body: Option<Vec<u8>>,
    ) -> RegistryResult<Response> {
        if self.debug {
            debug!(%method, %url, body = ?body.as_deref().map(String::from_utf8_lossy), "registry request");
        }

        let mut builder = http::Request::builder()
            .method(method.clone())
            .uri(&url)
            .header("accept", "application/json");
        if body.is_some() {
            builder = builder.header("content-type", "application/json");
        }
        let req = builder
            .body(Full::new(Bytes::from(body.unwrap_or_default())))
            .map_err(|e| RegistryError::InvalidUrl(e.to_string()))?;

        let exchange = async {
            let resp = self
                .http
                .request(req)
                .await
                .map_err(|e| RegistryError::Transport(e.to_string()))?;
            let status = resp.status();
            let body = resp
                .into_body()
                .collect()
                .await
                .map_err(|e| RegistryError::Transport(e.to_string()))?
                .to_bytes();
            Ok::<_, RegistryError>(Response { status, body })
        };

        let resp = tokio::time::timeout(self.timeout, exchange)
            .await
            .map_err(|_| RegistryError::Timeout(self.timeout))??;

        if self.debug {
            debug!(
                %method,
                %url,
                status = %resp.status,
                body = %String::from_utf8_lossy(&resp.body),
                "registry response"
            );
        }
        Ok(resp)
    }
}

fn expect_success(resp: Response) -> RegistryResult<Response> {
    if resp.status.is_success() {
        Ok(resp)
    } else {
        Err(RegistryError::UnexpectedStatus {
            status: resp.status.as_u16(),
            body: String::from_utf8_lossy(&resp.body).into_owned(),
        })
    }
}

#[async_trait]
impl RegistryClient for EurekaClient {
    async fn get_applications(&self) -> RegistryResult<Applications> {
        let url = format!("{}/apps", self.base_url);
        let resp = expect_success(self.send(http::Method::GET, url, None).await?)?;
        Ok(wire::decode_applications(&resp.body)?)
    }

    async fn register_instance(&self, instance: &ServiceInstance) -> RegistryResult<()> {
        let url = format!("{}/apps/{}", self.base_url, instance.app);
        let body = wire::encode_instance(instance)?;
        expect_success(self.send(http::Method::POST, url, Some(body)).await?)?;
        debug!(instance_id = %instance.instance_id, status = %instance.status, "instance registered");
        Ok(())
    }

    async fn unregister_instance(&self, instance: &ServiceInstance) -> RegistryResult<()> {
        let url = self.instance_url(instance);
        expect_success(self.send(http::Method::DELETE, url, None).await?)?;
        debug!(instance_id = %instance.instance_id, "instance unregistered");
        Ok(())
    }

    async fn send_heartbeat(&self, instance: &ServiceInstance) -> bool {
        let url = format!("{}?status={}", self.instance_url(instance), instance.status);
        match self.send(http::Method::PUT, url, None).await {
            Ok(resp) if resp.status.is_success() => true,
            Ok(resp) if resp.status == http::StatusCode::NOT_FOUND => {
                info!(instance_id = %instance.instance_id, "heartbeat rejected, lease unknown to registry");
                false
            }
            Ok(resp) => {
                warn!(instance_id = %instance.instance_id, status = %resp.status, "heartbeat failed");
                false
            }
            Err(e) => {
                warn!(instance_id = %instance.instance_id, error = %e, "heartbeat failed");
                false
            }
        }
    }
}
