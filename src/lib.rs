//! # logship - Embeddable Log Shipping Agent
//!
//! logship runs inside a host process, captures the output the host emits,
//! buffers it in memory and forwards batches to a remote ingestion service over
//! a persistent gRPC channel. Delivery problems never block or crash the host.
//!
//! ## Features
//!
//! - **Output Interception**: wraps an injected [`intercept::Console`] or a `tracing` layer
//! - **Batching**: size-triggered and timer-triggered flushes
//! - **At-Most-Once Delivery**: failed batches are reported and dropped
//! - **Graceful Shutdown**: `close` drains the buffer with one final flush
//! - **Thread-Safe**: captures may arrive from any thread
//!
//! ## Quick Start
//!
//! ```no_run
//! use logship::agent::Agent;
//! use logship::config::AgentConfig;
//! use logship::types::LogArg;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = AgentConfig::builder("service-123", "secret-token")
//!         .endpoint("localhost:50051")
//!         .batch_size(50)
//!         .build()?;
//!
//!     let agent = Agent::builder(config).build()?;
//!     agent.start_intercepting()?;
//!
//!     let console = agent.console();
//!     console.info(&[LogArg::from("payment accepted"), LogArg::from(42)]);
//!
//!     agent.close().await;
//!     Ok(())
//! }
//! ```

#![deny(missing_docs)]
#![warn(clippy::all)]

pub mod agent;
pub mod client;
pub mod config;
pub mod intercept;
pub mod proto;
pub mod types;

/// Common error types used throughout logship
pub mod error {
    use std::fmt;

    /// logship error types
    #[derive(Debug)]
    pub enum LogShipError {
        /// I/O operation failed
        Io(std::io::Error),
        /// Serialization/deserialization failed
        Serde(serde_json::Error),
        /// Configuration error
        Config(String),
        /// Channel could not be built or connected
        Transport(String),
        /// The ingestion RPC returned an error status
        Rpc(tonic::Status),
        /// The ingestion service answered but did not accept the batch
        Rejected(String),
        /// The agent or transport has been closed
        Closed,
    }

    impl fmt::Display for LogShipError {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            match self {
                LogShipError::Io(e) => write!(f, "I/O error: {}", e),
                LogShipError::Serde(e) => write!(f, "Serialization error: {}", e),
                LogShipError::Config(e) => write!(f, "Configuration error: {}", e),
                LogShipError::Transport(e) => write!(f, "Transport error: {}", e),
                LogShipError::Rpc(status) => write!(
                    f,
                    "RPC error: {:?}: {}",
                    status.code(),
                    status.message()
                ),
                LogShipError::Rejected(e) => write!(f, "Batch rejected: {}", e),
                LogShipError::Closed => write!(f, "Agent is closed"),
            }
        }
    }

    impl std::error::Error for LogShipError {}

    impl From<std::io::Error> for LogShipError {
        fn from(err: std::io::Error) -> Self {
            LogShipError::Io(err)
        }
    }

    impl From<serde_json::Error> for LogShipError {
        fn from(err: serde_json::Error) -> Self {
            LogShipError::Serde(err)
        }
    }

    impl From<tonic::Status> for LogShipError {
        fn from(status: tonic::Status) -> Self {
            LogShipError::Rpc(status)
        }
    }

    impl From<tonic::transport::Error> for LogShipError {
        fn from(err: tonic::transport::Error) -> Self {
            LogShipError::Transport(err.to_string())
        }
    }

    impl From<::config::ConfigError> for LogShipError {
        fn from(err: ::config::ConfigError) -> Self {
            LogShipError::Config(err.to_string())
        }
    }

    /// Result type alias for logship operations
    pub type Result<T> = std::result::Result<T, LogShipError>;
}

pub use error::{LogShipError, Result};

/// Re-export commonly used types
pub mod prelude {
    pub use crate::agent::{Agent, AgentBuilder, FlushOutcome};
    pub use crate::client::{GrpcTransport, IngestionClient, IngestionTransport};
    pub use crate::config::{AgentConfig, TlsMode};
    pub use crate::intercept::{Console, OutputSink, StdioSink};
    pub use crate::types::{CapturedLog, LogArg, LogLevel};
    pub use crate::{LogShipError, Result};
}
