//! Request assembly and response interpretation for batch delivery

use crate::client::IngestionTransport;
use crate::config::AgentConfig;
use crate::proto::{IngestEventRequest, IngestEventResponse};
use crate::types::CapturedLog;
use crate::{LogShipError, Result};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, trace};

/// Sends batches of captured records on behalf of one service identity
#[derive(Clone)]
pub struct IngestionClient {
    transport: Arc<dyn IngestionTransport>,
    service_id: String,
    auth_token: String,
}

impl IngestionClient {
    /// Create a client for the identity in `config`
    pub fn new(config: &AgentConfig, transport: Arc<dyn IngestionTransport>) -> Self {
        Self {
            transport,
            service_id: config.service_id.clone(),
            auth_token: config.auth_token.clone(),
        }
    }

    /// Build the wire request for a batch, preserving record order
    pub fn build_request(&self, batch: &[CapturedLog]) -> IngestEventRequest {
        IngestEventRequest {
            logs: batch.iter().map(CapturedLog::to_wire).collect(),
            service_id: self.service_id.clone(),
            auth_token: self.auth_token.clone(),
        }
    }

    /// Deliver a batch.
    ///
    /// Succeeds only when the service explicitly accepts the batch; a response
    /// with `success = false` is reported as [`LogShipError::Rejected`].
    pub async fn send(&self, batch: &[CapturedLog]) -> Result<IngestEventResponse> {
        let request = self.build_request(batch);
        let started = Instant::now();

        trace!(records = batch.len(), service_id = %self.service_id, "Sending batch");
        let response = self.transport.ingest_log_batch(request).await?;

        if !response.success {
            return Err(LogShipError::Rejected(format!(
                "ingestion service did not accept {} records for service {}",
                batch.len(),
                self.service_id
            )));
        }

        debug!(
            records = batch.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Batch accepted"
        );
        Ok(response)
    }

    /// Release the transport
    pub async fn close(&self) -> Result<()> {
        self.transport.close().await
    }
}

impl std::fmt::Debug for IngestionClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IngestionClient")
            .field("service_id", &self.service_id)
            .field("auth_token", &"<redacted>")
            .finish()
    }
}
