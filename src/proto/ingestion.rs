/// A single log record as stored by the ingestion service
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct LogEntry {
    /// Level-prefixed message text
    #[prost(string, tag = "1")]
    pub message: ::prost::alloc::string::String,
    /// ISO-8601 capture time
    #[prost(string, tag = "2")]
    pub timestamp: ::prost::alloc::string::String,
}

/// A batch of records tagged with the sending service's identity
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct IngestEventRequest {
    /// Records in capture order
    #[prost(message, repeated, tag = "1")]
    pub logs: ::prost::alloc::vec::Vec<LogEntry>,
    /// Service identity
    #[prost(string, tag = "2")]
    pub service_id: ::prost::alloc::string::String,
    /// Shared secret for the service identity
    #[prost(string, tag = "3")]
    pub auth_token: ::prost::alloc::string::String,
}

/// Per-batch acceptance
#[derive(Clone, Copy, PartialEq, ::prost::Message)]
pub struct IngestEventResponse {
    /// Whether the batch was accepted
    #[prost(bool, tag = "1")]
    pub success: bool,
}

/// Client stub for `ingestion.IngestionService`
pub mod ingestion_service_client {
    use tonic::codegen::http::uri::PathAndQuery;
    use tonic::codegen::{Body, Bytes, CompressionEncoding, StdError};

    const SERVICE: &str = "ingestion.IngestionService";
    const INGEST_LOG_BATCH: &str = "/ingestion.IngestionService/IngestLogBatch";

    /// Typed client over any gRPC service implementation, usually a
    /// [`tonic::transport::Channel`]
    #[derive(Debug, Clone)]
    pub struct IngestionServiceClient<T> {
        inner: tonic::client::Grpc<T>,
    }

    impl<T> IngestionServiceClient<T>
    where
        T: tonic::client::GrpcService<tonic::body::BoxBody>,
        T::Error: Into<StdError>,
        T::ResponseBody: Body<Data = Bytes> + Send + 'static,
        <T::ResponseBody as Body>::Error: Into<StdError> + Send,
    {
        /// Wrap a connected service
        pub fn new(inner: T) -> Self {
            Self {
                inner: tonic::client::Grpc::new(inner),
            }
        }

        /// Compress requests with the given encoding
        #[must_use]
        pub fn send_compressed(mut self, encoding: CompressionEncoding) -> Self {
            self.inner = self.inner.send_compressed(encoding);
            self
        }

        /// Accept responses compressed with the given encoding
        #[must_use]
        pub fn accept_compressed(mut self, encoding: CompressionEncoding) -> Self {
            self.inner = self.inner.accept_compressed(encoding);
            self
        }

        /// Deliver one batch of records
        pub async fn ingest_log_batch(
            &mut self,
            request: impl tonic::IntoRequest<super::IngestEventRequest>,
        ) -> std::result::Result<tonic::Response<super::IngestEventResponse>, tonic::Status> {
            self.inner.ready().await.map_err(|e| {
                tonic::Status::new(
                    tonic::Code::Unknown,
                    format!("Service was not ready: {}", e.into()),
                )
            })?;

            let codec = tonic::codec::ProstCodec::default();
            let path = PathAndQuery::from_static(INGEST_LOG_BATCH);
            let mut req = request.into_request();
            req.extensions_mut()
                .insert(tonic::GrpcMethod::new(SERVICE, "IngestLogBatch"));
            self.inner.unary(req, path, codec).await
        }
    }
}
