//! Configuration structures for logship

use crate::{LogShipError, Result};
use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use std::path::Path;
use std::time::Duration;

/// Prefix of environment variables read by [`AgentConfig::load`]
pub const ENV_PREFIX: &str = "LOGSHIP";

const DEFAULT_ENDPOINT: &str = "localhost:50051";

/// Channel security for the ingestion connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TlsMode {
    /// Plaintext for loopback endpoints, TLS for everything else
    #[default]
    Auto,
    /// Never encrypt; only meant for local development endpoints
    Plaintext,
    /// Always encrypt
    Tls,
}

/// Agent configuration, immutable once the agent is constructed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    /// Service identity presented to the ingestion endpoint
    pub service_id: String,
    /// Shared secret presented alongside the service identity
    pub auth_token: String,
    /// Address of the ingestion service, `host:port` or a full URI
    pub endpoint: String,
    /// Number of buffered records that forces an immediate flush
    pub batch_size: usize,
    /// Period of the background flush timer in milliseconds
    pub flush_interval_ms: u64,
    /// Smallest accepted flush interval in milliseconds
    pub min_flush_interval_ms: u64,
    /// Channel security
    pub tls: TlsMode,
    /// Connection timeout in milliseconds
    pub connect_timeout_ms: u64,
    /// Deadline for a single ingestion call in milliseconds
    pub request_timeout_ms: u64,
    /// How long `close` waits for outstanding flushes in milliseconds
    pub shutdown_timeout_ms: u64,
    /// Compress requests with gzip
    pub compression: bool,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            service_id: String::new(),
            auth_token: String::new(),
            endpoint: DEFAULT_ENDPOINT.to_string(),
            batch_size: 100,
            flush_interval_ms: 5_000,
            min_flush_interval_ms: 0,
            tls: TlsMode::Auto,
            connect_timeout_ms: 5_000,
            request_timeout_ms: 10_000,
            shutdown_timeout_ms: 10_000,
            compression: false,
        }
    }
}

impl AgentConfig {
    /// Start building a configuration for the given identity
    pub fn builder(service_id: impl Into<String>, auth_token: impl Into<String>) -> AgentConfigBuilder {
        AgentConfigBuilder {
            config: AgentConfig {
                service_id: service_id.into(),
                auth_token: auth_token.into(),
                ..Default::default()
            },
        }
    }

    /// Load configuration from TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| LogShipError::Config(format!("Failed to read config file: {}", e)))?;

        let config: AgentConfig = toml::from_str(&content)
            .map_err(|e| LogShipError::Config(format!("Failed to parse config: {}", e)))?;

        config.validate()?;
        Ok(config)
    }

    /// Load configuration from an optional TOML file overlaid with
    /// `LOGSHIP_*` environment variables
    pub fn load(path: Option<&Path>) -> Result<Self> {
        Self::load_from(path, ENV_PREFIX)
    }

    /// Same as [`AgentConfig::load`] with a custom environment prefix
    pub fn load_from(path: Option<&Path>, env_prefix: &str) -> Result<Self> {
        let mut builder = ::config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(
                ::config::File::from(path)
                    .format(::config::FileFormat::Toml)
                    .required(true),
            );
        }

        let config: AgentConfig = builder
            .add_source(::config::Environment::with_prefix(env_prefix).try_parsing(true))
            .build()?
            .try_deserialize()?;

        config.validate()?;
        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.service_id.trim().is_empty() {
            return Err(LogShipError::Config("Service id cannot be empty".to_string()));
        }
        if self.auth_token.trim().is_empty() {
            return Err(LogShipError::Config("Auth token cannot be empty".to_string()));
        }
        if self.endpoint.trim().is_empty() {
            return Err(LogShipError::Config("Endpoint cannot be empty".to_string()));
        }
        if self.batch_size == 0 {
            return Err(LogShipError::Config("Batch size must be greater than zero".to_string()));
        }
        if self.flush_interval_ms == 0 {
            return Err(LogShipError::Config(
                "Flush interval must be greater than zero".to_string(),
            ));
        }
        if self.flush_interval_ms < self.min_flush_interval_ms {
            return Err(LogShipError::Config(format!(
                "Flush interval {}ms is below the configured minimum of {}ms",
                self.flush_interval_ms, self.min_flush_interval_ms
            )));
        }
        let authority = endpoint_authority(&self.endpoint);
        if !authority.starts_with('[') && authority.matches(':').count() > 1 {
            return Err(LogShipError::Config(format!(
                "IPv6 endpoint {} must be bracketed, e.g. [::1]:50051",
                self.endpoint
            )));
        }
        if self.tls == TlsMode::Plaintext && self.endpoint.starts_with("https://") {
            return Err(LogShipError::Config(
                "Plaintext mode cannot be used with an https:// endpoint".to_string(),
            ));
        }
        Ok(())
    }

    /// Period of the background flush timer
    pub fn flush_interval(&self) -> Duration {
        Duration::from_millis(self.flush_interval_ms)
    }

    /// Connection timeout
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    /// Per-request deadline
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    /// Upper bound for the shutdown drain
    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_millis(self.shutdown_timeout_ms)
    }

    /// Whether the channel to the endpoint is encrypted
    pub fn use_tls(&self) -> bool {
        match self.tls {
            TlsMode::Tls => true,
            TlsMode::Plaintext => false,
            TlsMode::Auto => {
                if self.endpoint.starts_with("https://") {
                    true
                } else if self.endpoint.starts_with("http://") {
                    false
                } else {
                    !is_loopback_host(endpoint_host(&self.endpoint))
                }
            }
        }
    }

    /// Endpoint as a URI with the scheme matching [`AgentConfig::use_tls`]
    pub fn endpoint_uri(&self) -> String {
        let authority = strip_scheme(&self.endpoint);
        let scheme = if self.use_tls() { "https" } else { "http" };
        format!("{}://{}", scheme, authority)
    }

    /// Host part of the endpoint, used as the TLS server name
    pub fn endpoint_host(&self) -> &str {
        endpoint_host(&self.endpoint)
    }
}

fn strip_scheme(endpoint: &str) -> &str {
    endpoint
        .strip_prefix("https://")
        .or_else(|| endpoint.strip_prefix("http://"))
        .unwrap_or(endpoint)
}

fn endpoint_authority(endpoint: &str) -> &str {
    let authority = strip_scheme(endpoint);
    authority.split('/').next().unwrap_or(authority)
}

fn endpoint_host(endpoint: &str) -> &str {
    let authority = endpoint_authority(endpoint);

    if let Some(rest) = authority.strip_prefix('[') {
        return rest.split(']').next().unwrap_or(rest);
    }

    match authority.rsplit_once(':') {
        Some((host, _port)) => host,
        None => authority,
    }
}

fn is_loopback_host(host: &str) -> bool {
    if host.eq_ignore_ascii_case("localhost") {
        return true;
    }
    host.parse::<IpAddr>().map(|ip| ip.is_loopback()).unwrap_or(false)
}

/// Builder for [`AgentConfig`]
#[derive(Debug, Clone)]
pub struct AgentConfigBuilder {
    config: AgentConfig,
}

impl AgentConfigBuilder {
    /// Ingestion endpoint address
    pub fn endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.config.endpoint = endpoint.into();
        self
    }

    /// Record count that forces an immediate flush
    pub fn batch_size(mut self, batch_size: usize) -> Self {
        self.config.batch_size = batch_size;
        self
    }

    /// Background flush period
    pub fn flush_interval(mut self, interval: Duration) -> Self {
        self.config.flush_interval_ms = interval.as_millis() as u64;
        self
    }

    /// Smallest accepted flush period
    pub fn min_flush_interval(mut self, interval: Duration) -> Self {
        self.config.min_flush_interval_ms = interval.as_millis() as u64;
        self
    }

    /// Channel security
    pub fn tls(mut self, tls: TlsMode) -> Self {
        self.config.tls = tls;
        self
    }

    /// Connection timeout
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.config.connect_timeout_ms = timeout.as_millis() as u64;
        self
    }

    /// Per-request deadline
    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.config.request_timeout_ms = timeout.as_millis() as u64;
        self
    }

    /// Upper bound for the shutdown drain
    pub fn shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.config.shutdown_timeout_ms = timeout.as_millis() as u64;
        self
    }

    /// Gzip-compress ingestion requests
    pub fn compression(mut self, enabled: bool) -> Self {
        self.config.compression = enabled;
        self
    }

    /// Validate and return the configuration
    pub fn build(self) -> Result<AgentConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}
