use std::fmt;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::ops::RangeInclusive;
use std::path::PathBuf;
use std::time::Duration;

use tracing::{trace, warn};

const UDP_ADDR: &str = "UDP_ADDR";
const UDP_PORT: &str = "UDP_PORT";
const HTTP_ADDR: &str = "HTTP_ADDR";
const DATABASE_URL: &str = "DATABASE_URL";
const ADVISOR_API_KEY: &str = "ADVISOR_API_KEY";
const ADVISOR_ENDPOINT: &str = "ADVISOR_ENDPOINT";
const ADVISOR_MODEL: &str = "ADVISOR_MODEL";
const ADVISOR_TIMEOUT_SECS: &str = "ADVISOR_TIMEOUT_SECS";

const DEFAULT_UDP_PORT: u16 = 5005;

/// Accepted range for the advisory request timeout, in seconds
pub const ADVISOR_TIMEOUT_RANGE: RangeInclusive<u64> = 1..=120;

/// Storage backend configuration
#[derive(Debug, Clone, PartialEq, serde::Deserialize)]
#[serde(tag = "backend", rename_all = "lowercase")]
pub enum StorageConfig {
    /// In-memory storage (no persistence)
    Memory,

    /// SQLite database (default)
    Sqlite {
        /// Path to the SQLite database file
        #[serde(default = "default_sqlite_path")]
        path: PathBuf,
    },
}

impl Default for StorageConfig {
    fn default() -> Self {
        StorageConfig::Sqlite {
            path: default_sqlite_path(),
        }
    }
}

impl StorageConfig {
    /// Parse a connection string: `memory`, `sqlite://<path>`, `sqlite:<path>`
    /// or a bare file path
    pub fn from_url(url: &str) -> Self {
        let url = url.trim();
        if url.eq_ignore_ascii_case("memory") || url.eq_ignore_ascii_case("none") {
            return StorageConfig::Memory;
        }

        let path = url
            .strip_prefix("sqlite://")
            .or_else(|| url.strip_prefix("sqlite:"))
            .unwrap_or(url);

        StorageConfig::Sqlite {
            path: PathBuf::from(path),
        }
    }
}

fn default_sqlite_path() -> PathBuf {
    PathBuf::from("./greenhouse.db")
}

/// Datagram listener settings
#[derive(Debug, Clone, PartialEq, serde::Deserialize)]
#[serde(default)]
pub struct UdpConfig {
    pub addr: IpAddr,
    pub port: u16,

    /// Pause after a failed iteration of the ingestion loop
    pub error_backoff_ms: u64,
}

impl Default for UdpConfig {
    fn default() -> Self {
        Self {
            addr: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            port: DEFAULT_UDP_PORT,
            error_backoff_ms: 1000,
        }
    }
}

impl UdpConfig {
    pub fn bind_addr(&self) -> SocketAddr {
        SocketAddr::new(self.addr, self.port)
    }

    pub fn error_backoff(&self) -> Duration {
        Duration::from_millis(self.error_backoff_ms)
    }
}

/// REST/WebSocket server settings
#[derive(Debug, Clone, PartialEq, serde::Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    /// Bind address (e.g., "0.0.0.0:5000")
    pub bind_addr: SocketAddr,

    /// Enable permissive CORS for the dashboard
    pub enable_cors: bool,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), 5000),
            enable_cors: true,
        }
    }
}

/// Reasoning service settings
#[derive(Clone, PartialEq, serde::Deserialize)]
#[serde(default)]
pub struct AdvisorConfig {
    pub endpoint: String,
    pub model: String,

    /// Bearer credential; without it advisories degrade to a message
    pub api_key: Option<String>,

    pub timeout_secs: u64,

    /// Response budget for dashboard requests
    pub max_tokens: u32,
}

impl Default for AdvisorConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://api.openai.com/v1/chat/completions".to_string(),
            model: "gpt-4o-mini".to_string(),
            api_key: None,
            timeout_secs: 20,
            max_tokens: 200,
        }
    }
}

impl AdvisorConfig {
    /// Request timeout, held inside [`ADVISOR_TIMEOUT_RANGE`]
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(
            self.timeout_secs
                .clamp(*ADVISOR_TIMEOUT_RANGE.start(), *ADVISOR_TIMEOUT_RANGE.end()),
        )
    }
}

impl fmt::Debug for AdvisorConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AdvisorConfig")
            .field("endpoint", &self.endpoint)
            .field("model", &self.model)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("timeout_secs", &self.timeout_secs)
            .field("max_tokens", &self.max_tokens)
            .finish()
    }
}

#[derive(Debug, Clone, Default, PartialEq, serde::Deserialize)]
#[serde(default)]
pub struct Config {
    pub udp: UdpConfig,
    pub http: HttpConfig,
    pub storage: StorageConfig,
    pub advisor: AdvisorConfig,
}

impl Config {
    /// Read the optional config file, then apply environment overrides
    pub fn load(path: Option<&str>) -> anyhow::Result<Config> {
        let mut config = match path {
            Some(path) => read_config_file(path)?,
            None => Config::default(),
        };

        config.apply_overrides(|key| std::env::var(key).ok());
        trace!("effective config: {config:?}");
        Ok(config)
    }

    /// Apply overrides from `lookup` (the process environment in production)
    ///
    /// Values that fail to parse are logged and ignored.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(addr) = parse_override::<IpAddr>(&lookup, UDP_ADDR) {
            self.udp.addr = addr;
        }
        if let Some(port) = parse_override::<u16>(&lookup, UDP_PORT) {
            self.udp.port = port;
        }
        if let Some(addr) = parse_override::<SocketAddr>(&lookup, HTTP_ADDR) {
            self.http.bind_addr = addr;
        }
        if let Some(url) = lookup(DATABASE_URL).filter(|v| !v.trim().is_empty()) {
            self.storage = StorageConfig::from_url(&url);
        }
        if let Some(key) = lookup(ADVISOR_API_KEY).filter(|v| !v.trim().is_empty()) {
            self.advisor.api_key = Some(key);
        }
        if let Some(endpoint) = lookup(ADVISOR_ENDPOINT).filter(|v| !v.trim().is_empty()) {
            self.advisor.endpoint = endpoint;
        }
        if let Some(model) = lookup(ADVISOR_MODEL).filter(|v| !v.trim().is_empty()) {
            self.advisor.model = model;
        }
        if let Some(secs) = parse_override::<u64>(&lookup, ADVISOR_TIMEOUT_SECS) {
            if ADVISOR_TIMEOUT_RANGE.contains(&secs) {
                self.advisor.timeout_secs = secs;
            } else {
                warn!(
                    "ignoring {ADVISOR_TIMEOUT_SECS}={secs}, expected {}..={} seconds",
                    ADVISOR_TIMEOUT_RANGE.start(),
                    ADVISOR_TIMEOUT_RANGE.end()
                );
            }
        }
    }
}

fn parse_override<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
) -> Option<T> {
    let value = lookup(key)?;
    match value.trim().parse() {
        Ok(parsed) => Some(parsed),
        Err(_) => {
            warn!("ignoring invalid value for {key}: {value:?}");
            None
        }
    }
}

pub fn read_config_file(path: &str) -> anyhow::Result<Config> {
    let file_content = std::fs::read_to_string(path)?;
    serde_json::from_str(&file_content)
        .map_err(|e| anyhow::anyhow!("Invalid configuration file provided: {e}"))
}
