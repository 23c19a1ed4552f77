use std::{env, net::SocketAddr};

use thiserror::Error;

pub const DEFAULT_PROTOCOL_VERSION: &str = "2024-11-05";
pub const DEFAULT_SSE_PATH: &str = "/sse";
pub const DEFAULT_MESSAGE_PATH: &str = "/message";
pub const DEFAULT_SESSION_BUFFER: usize = 64;

#[derive(Debug, Clone)]
pub struct Config {
    pub server_name: String,
    pub server_version: String,
    pub protocol_version: String,
    pub sse_path: String,
    pub message_path: String,
    pub public_base_url: Option<String>,
    pub session_buffer: usize,
    pub bind_addr: String,
    pub bind_port: u16,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("BIND_PORT must be a valid u16")]
    InvalidPort,
    #[error("{0} must be an absolute path starting with '/'")]
    InvalidPath(&'static str),
    #[error("MCP_SSE_PATH and MCP_MESSAGE_PATH must differ")]
    ConflictingPaths,
    #[error("MCP_SESSION_BUFFER must be a positive integer")]
    InvalidSessionBuffer,
    #[error("MCP_PUBLIC_BASE_URL must start with http:// or https://")]
    InvalidPublicBaseUrl,
    #[error("invalid bind address or port")]
    InvalidSocket,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server_name: env!("CARGO_PKG_NAME").to_string(),
            server_version: env!("CARGO_PKG_VERSION").to_string(),
            protocol_version: DEFAULT_PROTOCOL_VERSION.to_string(),
            sse_path: DEFAULT_SSE_PATH.to_string(),
            message_path: DEFAULT_MESSAGE_PATH.to_string(),
            public_base_url: None,
            session_buffer: DEFAULT_SESSION_BUFFER,
            bind_addr: "127.0.0.1".to_string(),
            bind_port: 8080,
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let server_name = non_empty_var("MCP_SERVER_NAME").unwrap_or(defaults.server_name);
        let server_version =
            non_empty_var("MCP_SERVER_VERSION").unwrap_or(defaults.server_version);
        let protocol_version =
            non_empty_var("MCP_PROTOCOL_VERSION").unwrap_or(defaults.protocol_version);
        let sse_path = non_empty_var("MCP_SSE_PATH").unwrap_or(defaults.sse_path);
        let message_path = non_empty_var("MCP_MESSAGE_PATH").unwrap_or(defaults.message_path);
        let public_base_url = non_empty_var("MCP_PUBLIC_BASE_URL")
            .map(|value| value.trim_end_matches('/').to_string());
        let session_buffer = non_empty_var("MCP_SESSION_BUFFER")
            .map(|value| {
                value
                    .parse::<usize>()
                    .ok()
                    .filter(|buffer| *buffer > 0)
                    .ok_or(ConfigError::InvalidSessionBuffer)
            })
            .transpose()?
            .unwrap_or(defaults.session_buffer);

        let bind_addr = env::var("BIND_ADDR").unwrap_or(defaults.bind_addr);
        let bind_port = env::var("BIND_PORT")
            .ok()
            .map(|value| value.parse::<u16>().map_err(|_| ConfigError::InvalidPort))
            .transpose()?
            .unwrap_or(defaults.bind_port);

        let config = Self {
            server_name,
            server_version,
            protocol_version,
            sse_path,
            message_path,
            public_base_url,
            session_buffer,
            bind_addr,
            bind_port,
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.sse_path.starts_with('/') {
            return Err(ConfigError::InvalidPath("MCP_SSE_PATH"));
        }
        if !self.message_path.starts_with('/') {
            return Err(ConfigError::InvalidPath("MCP_MESSAGE_PATH"));
        }
        if self.sse_path == self.message_path {
            return Err(ConfigError::ConflictingPaths);
        }
        if let Some(base) = self.public_base_url.as_deref() {
            if !(base.starts_with("http://") || base.starts_with("https://")) {
                return Err(ConfigError::InvalidPublicBaseUrl);
            }
        }

        let _ = self.bind_socket()?;
        Ok(())
    }

    pub fn bind_socket(&self) -> Result<SocketAddr, ConfigError> {
        format!("{}:{}", self.bind_addr, self.bind_port)
            .parse::<SocketAddr>()
            .map_err(|_| ConfigError::InvalidSocket)
    }
}

fn non_empty_var(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}
