use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Server configuration.
///
/// Loaded from `config.yaml` when present, otherwise built from defaults
/// with a `LISTEN` environment override for the bind address.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub limits: LimitsConfig,
    /// TLS materials. When set, TLS is accepted on the same listener via
    /// handshake auto-detection.
    pub ssl: Option<SslConfig>,
    /// Response encodings offered during `Accept-Encoding` negotiation,
    /// in no particular order; the client's preference order decides.
    pub compression: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub backlog: u32,
    /// Worker threads for [`crate::Server::run_blocking`].
    pub num_threads: usize,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LimitsConfig {
    /// Idle timeout applied to header and body reads, in seconds.
    pub timeout_secs: u64,
    pub max_header_bytes: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SslConfig {
    pub cert_file: PathBuf,
    pub key_file: PathBuf,
    /// Accepted for compatibility; encrypted PEM keys are rejected at
    /// startup because rustls only consumes unencrypted key material.
    pub passwd: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
            backlog: 1024,
            num_threads: std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(4),
        }
    }
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 30,
            max_header_bytes: 64 * 1024,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            limits: LimitsConfig::default(),
            ssl: None,
            compression: vec!["gzip".to_string(), "deflate".to_string()],
        }
    }
}

impl Config {
    /// Loads `config.yaml` from the working directory when present,
    /// otherwise falls back to defaults with a `LISTEN` environment
    /// override (`host:port`) for the bind address. A config file always
    /// wins over the environment.
    pub fn load() -> Self {
        if let Ok(cfg) = Self::load_from_file("config.yaml") {
            return cfg;
        }

        let mut cfg = Self::default();
        if let Ok(listen) = std::env::var("LISTEN") {
            if let Some((host, port)) = listen.rsplit_once(':') {
                if let Ok(port) = port.parse() {
                    cfg.server.host = host.to_string();
                    cfg.server.port = port;
                }
            }
        }

        cfg
    }

    pub fn load_from_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        let cfg = serde_yaml::from_str(&raw)?;
        Ok(cfg)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.limits.timeout_secs)
    }

    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}
