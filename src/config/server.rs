use std::net::SocketAddr;
use std::path::PathBuf;

/// Which backend the gateway talks to.
#[derive(Debug, Clone)]
pub enum BackendConfig {
    /// The hosted database-and-auth service.
    Hosted(GatewayConfig),
    /// SQLite database under `data_dir`, for offline development.
    Local { data_dir: PathBuf },
}

/// Endpoint and public key of the hosted backend.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub url: String,
    pub api_key: String,
}

impl GatewayConfig {
    pub fn new(url: impl Into<String>, api_key: impl Into<String>) -> crate::error::Result<Self> {
        let url = url.into();
        let api_key = api_key.into();

        if !(url.starts_with("https://") || url.starts_with("http://")) {
            return Err(crate::error::Error::Config(format!(
                "gateway url must be http(s): {url}"
            )));
        }
        if api_key.trim().is_empty() {
            return Err(crate::error::Error::Config(
                "gateway api key is empty".to_string(),
            ));
        }

        Ok(Self { url, api_key })
    }
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub backend: BackendConfig,
}

impl ServerConfig {
    pub fn socket_addr(&self) -> Result<SocketAddr, std::net::AddrParseError> {
        format!("{}:{}", self.host, self.port).parse()
    }
}

/// Path of the local database inside a data directory.
#[must_use]
pub fn db_path(data_dir: &std::path::Path) -> PathBuf {
    data_dir.join("tendersync.db")
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
            backend: BackendConfig::Local {
                data_dir: PathBuf::from("./data"),
            },
        }
    }
}
