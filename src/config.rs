use crate::error::ConfigError;
use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;

/// Command line flags. Every flag is optional and, when given, overrides
/// the matching `TSNS_*` environment variable.
#[derive(Debug, Default, Parser)]
#[command(name = "tsns", version, about = "Authoritative name server for a private network")]
pub struct CliArgs {
    /// Server name, used in logs and reported by the admin API
    #[arg(long)]
    pub name: Option<String>,

    /// Directory holding records.json; must already exist
    #[arg(long = "data")]
    pub data_dir: Option<PathBuf>,

    /// Address for DNS over UDP and TCP
    #[arg(long)]
    pub dns_addr: Option<SocketAddr>,

    /// Address for the admin HTTP API
    #[arg(long)]
    pub http_addr: Option<SocketAddr>,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Server identity
    pub server_name: String,

    /// Directory the record snapshot lives in
    pub data_dir: PathBuf,

    /// Address to bind the DNS listeners to
    pub dns_bind_addr: SocketAddr,

    /// Address to bind the admin HTTP server to
    pub http_bind_addr: SocketAddr,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            server_name: "tsns".to_string(),
            data_dir: PathBuf::from("/var/lib/tsns"),
            dns_bind_addr: SocketAddr::from(([0, 0, 0, 0], 53)),
            http_bind_addr: SocketAddr::from(([127, 0, 0, 1], 8080)),
        }
    }
}

impl ServerConfig {
    /// Defaults overridden by `TSNS_*` environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as `from_env`, reading variables through `lookup`
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(name) = lookup("TSNS_NAME").filter(|s| !s.is_empty()) {
            config.server_name = name;
        }

        if let Some(data_dir) = lookup("TSNS_DATA_DIR").filter(|s| !s.is_empty()) {
            config.data_dir = PathBuf::from(data_dir);
        }

        if let Some(dns_addr) = lookup("TSNS_DNS_ADDR") {
            config.dns_bind_addr = dns_addr
                .trim()
                .parse()
                .map_err(|_| ConfigError::InvalidDnsBindAddress(dns_addr))?;
        }

        if let Some(http_addr) = lookup("TSNS_HTTP_ADDR") {
            config.http_bind_addr = http_addr
                .trim()
                .parse()
                .map_err(|_| ConfigError::InvalidHttpBindAddress(http_addr))?;
        }

        Ok(config)
    }

    /// Applies command line flags on top of this configuration
    pub fn with_cli(mut self, cli: CliArgs) -> Self {
        if let Some(name) = cli.name {
            self.server_name = name;
        }
        if let Some(data_dir) = cli.data_dir {
            self.data_dir = data_dir;
        }
        if let Some(dns_addr) = cli.dns_addr {
            self.dns_bind_addr = dns_addr;
        }
        if let Some(http_addr) = cli.http_addr {
            self.http_bind_addr = http_addr;
        }
        self
    }

    /// The data directory must already exist; it is never created here.
    pub fn validate(&self) -> Result<(), ConfigError> {
        match std::fs::metadata(&self.data_dir) {
            Ok(meta) if meta.is_dir() => Ok(()),
            Ok(_) => Err(ConfigError::DataDirNotADirectory(self.data_dir.clone())),
            Err(_) => Err(ConfigError::MissingDataDir(self.data_dir.clone())),
        }
    }
}
