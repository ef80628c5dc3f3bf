//! Protobuf messages and gRPC client for the ingestion service.
//!
//! The definitions mirror `ingestion.proto`:
//!
//! ```text
//! package ingestion;
//!
//! service IngestionService {
//!   rpc IngestLogBatch(IngestEventRequest) returns (IngestEventResponse);
//! }
//!
//! message LogEntry {
//!   string message = 1;
//!   string timestamp = 2;
//! }
//!
//! message IngestEventRequest {
//!   repeated LogEntry logs = 1;
//!   string service_id = 2;
//!   string auth_token = 3;
//! }
//!
//! message IngestEventResponse {
//!   bool success = 1;
//! }
//! ```

mod ingestion;

pub use ingestion::ingestion_service_client::IngestionServiceClient;
pub use ingestion::{IngestEventRequest, IngestEventResponse, LogEntry};
