//! HTTP server bind address, overridable by `SMA_SERVER_HOST`/`SMA_SERVER_PORT`.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}
fn default_port() -> u16 {
    8787
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl ServerConfig {
    /// Apply `SMA_SERVER_HOST`/`SMA_SERVER_PORT` environment overrides.
    pub fn apply_env_overrides(mut self) -> Self {
        if let Ok(host) = std::env::var("SMA_SERVER_HOST") {
            if !host.is_empty() {
                self.host = host;
            }
        }
        if let Ok(port) = std::env::var("SMA_SERVER_PORT") {
            if let Ok(port) = port.parse() {
                self.port = port;
            }
        }
        self
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_bind_addr() {
        assert_eq!(ServerConfig::default().bind_addr(), "127.0.0.1:8787");
    }
}
