//! Transports that carry ingestion requests to the remote service

use crate::config::AgentConfig;
use crate::proto::{IngestEventRequest, IngestEventResponse, IngestionServiceClient};
use crate::{LogShipError, Result};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::time::Duration;
use tonic::codegen::CompressionEncoding;
use tonic::transport::{Channel, ClientTlsConfig, Endpoint};
use tracing::debug;

/// The call contract of the ingestion service.
///
/// Implementations own their connection; `close` releases it and every call
/// afterwards fails with [`LogShipError::Closed`].
#[async_trait]
pub trait IngestionTransport: Send + Sync {
    /// Send one batch and return the service's verdict
    async fn ingest_log_batch(&self, request: IngestEventRequest) -> Result<IngestEventResponse>;

    /// Release the underlying connection
    async fn close(&self) -> Result<()> {
        Ok(())
    }
}

/// gRPC transport over a long-lived tonic channel
pub struct GrpcTransport {
    client: Mutex<Option<IngestionServiceClient<Channel>>>,
    target: String,
}

impl GrpcTransport {
    /// Build a transport whose channel connects on first use.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn connect_lazy(config: &AgentConfig) -> Result<Self> {
        let channel = build_endpoint(config)?.connect_lazy();
        Ok(Self::from_channel(config, channel))
    }

    /// Build a transport and establish the connection before returning
    pub async fn connect(config: &AgentConfig) -> Result<Self> {
        let channel = build_endpoint(config)?
            .connect()
            .await
            .map_err(|e| LogShipError::Transport(format!("Failed to connect to {}: {}", config.endpoint, e)))?;
        Ok(Self::from_channel(config, channel))
    }

    fn from_channel(config: &AgentConfig, channel: Channel) -> Self {
        let mut client = IngestionServiceClient::new(channel);
        if config.compression {
            client = client
                .send_compressed(CompressionEncoding::Gzip)
                .accept_compressed(CompressionEncoding::Gzip);
        }

        debug!(
            endpoint = %config.endpoint_uri(),
            tls = config.use_tls(),
            compression = config.compression,
            "Ingestion channel configured"
        );

        Self {
            client: Mutex::new(Some(client)),
            target: config.endpoint_uri(),
        }
    }

    /// URI the channel talks to
    pub fn target(&self) -> &str {
        &self.target
    }
}

fn build_endpoint(config: &AgentConfig) -> Result<Endpoint> {
    let mut endpoint = Endpoint::from_shared(config.endpoint_uri())
        .map_err(|e| LogShipError::Config(format!("Invalid endpoint {}: {}", config.endpoint, e)))?
        .connect_timeout(config.connect_timeout())
        .timeout(config.request_timeout())
        .tcp_keepalive(Some(Duration::from_secs(60)))
        .http2_keep_alive_interval(Duration::from_secs(30))
        .keep_alive_while_idle(true);

    if config.use_tls() {
        let tls = ClientTlsConfig::new()
            .domain_name(config.endpoint_host().to_string())
            .with_native_roots();
        endpoint = endpoint.tls_config(tls)?;
    }

    Ok(endpoint)
}

#[async_trait]
impl IngestionTransport for GrpcTransport {
    async fn ingest_log_batch(&self, request: IngestEventRequest) -> Result<IngestEventResponse> {
        // Clients are cheap handles onto the shared channel; never hold the lock across the call.
        let mut client = self.client.lock().clone().ok_or(LogShipError::Closed)?;
        let response = client.ingest_log_batch(request).await?;
        Ok(response.into_inner())
    }

    async fn close(&self) -> Result<()> {
        if self.client.lock().take().is_some() {
            debug!(endpoint = %self.target, "Ingestion channel closed");
        }
        Ok(())
    }
}

impl std::fmt::Debug for GrpcTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GrpcTransport")
            .field("target", &self.target)
            .field("open", &self.client.lock().is_some())
            .finish()
    }
}
