//! Client configuration

use std::path::PathBuf;
use std::time::Duration;

/// Configuration for a [`Session`](crate::Session).
#[derive(Clone, Debug)]
pub struct Config {
    /// Server base URL, e.g. `https://hrb.example.com:4433`
    pub endpoint: String,
    /// Request timeout
    pub timeout: Duration,
    /// User agent string
    pub user_agent: String,
    /// Additional trusted root certificate (PEM). Test deployments usually
    /// present a self-signed certificate.
    pub extra_root_cert: Option<PathBuf>,
    /// Skip TLS certificate verification. Test use only.
    pub danger_accept_invalid_certs: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            endpoint: "https://localhost:4433".to_string(),
            timeout: Duration::from_secs(30),
            user_agent: format!("hrb-client/{}", env!("CARGO_PKG_VERSION")),
            extra_root_cert: None,
            danger_accept_invalid_certs: false,
        }
    }
}

impl Config {
    /// Create a new config with the given endpoint
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            ..Default::default()
        }
    }

    /// Set the request timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Trust an extra root certificate
    pub fn with_root_cert(mut self, pem: impl Into<PathBuf>) -> Self {
        self.extra_root_cert = Some(pem.into());
        self
    }
}
