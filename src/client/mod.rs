//! Ingestion client: request assembly and the gRPC transport

pub mod ingestion;
pub mod transport;

pub use ingestion::IngestionClient;
pub use transport::{GrpcTransport, IngestionTransport};
