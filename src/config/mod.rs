//! Configuration management for logship

pub mod settings;

pub use settings::{AgentConfig, AgentConfigBuilder, TlsMode, ENV_PREFIX};
