//! Configuration module for message-relay.
//!
//! Supports both command-line arguments and TOML configuration file.
//! CLI arguments take precedence over config file values.

use clap::Parser;
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

/// Command-line arguments for the relay server
#[derive(Parser, Debug)]
#[command(name = "message-relay")]
#[command(author = "message-relay authors")]
#[command(version = "0.1.0")]
#[command(about = "HTTP message board with a UDP echo relay", long_about = None)]
pub struct CliArgs {
    /// Path to TOML configuration file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// HTTP address to bind to (e.g., 0.0.0.0:3000)
    #[arg(long)]
    pub http_listen: Option<String>,

    /// UDP echo address to bind to (e.g., 127.0.0.1:5000)
    #[arg(long)]
    pub udp_listen: Option<String>,

    /// Directory static files are served from
    #[arg(short, long)]
    pub root: Option<PathBuf>,

    /// Directory with index.html, message.html and error.html overrides
    #[arg(long)]
    pub templates: Option<PathBuf>,

    /// Document store connection string ("memory://" keeps messages in process)
    #[arg(long)]
    pub store_uri: Option<String>,

    /// Send each space-separated word to the UDP relay and exit
    #[arg(long, value_name = "TEXT")]
    pub send: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long)]
    pub log_level: Option<String>,
}

/// TOML configuration file structure
#[derive(Debug, Deserialize, Default)]
pub struct TomlConfig {
    #[serde(default)]
    pub http: HttpConfig,
    #[serde(default)]
    pub udp: UdpConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// HTTP server configuration
#[derive(Debug, Deserialize)]
pub struct HttpConfig {
    /// Address to bind to
    #[serde(default = "default_http_listen")]
    pub listen: String,
    /// Served root for static files
    #[serde(default = "default_root")]
    pub root: PathBuf,
    /// Optional template override directory
    pub templates: Option<PathBuf>,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            listen: default_http_listen(),
            root: default_root(),
            templates: None,
        }
    }
}

/// UDP echo relay configuration
#[derive(Debug, Deserialize)]
pub struct UdpConfig {
    #[serde(default = "default_udp_listen")]
    pub listen: String,
}

impl Default for UdpConfig {
    fn default() -> Self {
        Self {
            listen: default_udp_listen(),
        }
    }
}

/// Document store configuration
#[derive(Debug, Deserialize)]
pub struct StoreConfig {
    /// Connection string
    #[serde(default = "default_store_uri")]
    pub uri: String,
    #[serde(default = "default_database")]
    pub database: String,
    #[serde(default = "default_collection")]
    pub collection: String,
    /// Upper bound on server selection for a single append, in seconds
    #[serde(default = "default_store_timeout")]
    pub timeout_secs: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            uri: default_store_uri(),
            database: default_database(),
            collection: default_collection(),
            timeout_secs: default_store_timeout(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Deserialize)]
pub struct LoggingConfig {
    /// Log level
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_http_listen() -> String {
    "0.0.0.0:3000".to_string()
}

fn default_root() -> PathBuf {
    PathBuf::from("public")
}

fn default_udp_listen() -> String {
    "127.0.0.1:5000".to_string()
}

fn default_store_uri() -> String {
    "mongodb://mongodb:27017".to_string()
}

fn default_database() -> String {
    "mongodb".to_string()
}

fn default_collection() -> String {
    "messages".to_string()
}

fn default_store_timeout() -> u64 {
    5
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Final resolved configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub http_listen: String,
    pub root: PathBuf,
    pub templates: Option<PathBuf>,
    pub udp_listen: String,
    pub store_uri: String,
    pub store_database: String,
    pub store_collection: String,
    pub store_timeout: Duration,
    pub log_level: String,
    /// Client mode: text to relay instead of running the servers
    pub send: Option<String>,
}

impl Config {
    /// Load configuration from CLI args and optional TOML file.
    /// CLI arguments take precedence over TOML file values.
    pub fn load() -> Result<Self, ConfigError> {
        Self::from_cli(CliArgs::parse())
    }

    fn from_cli(cli: CliArgs) -> Result<Self, ConfigError> {
        let toml_config = if let Some(ref config_path) = cli.config {
            let contents = std::fs::read_to_string(config_path)
                .map_err(|e| ConfigError::FileRead(config_path.clone(), e))?;
            toml::from_str(&contents)
                .map_err(|e| ConfigError::TomlParse(config_path.clone(), e))?
        } else {
            TomlConfig::default()
        };

        Ok(Self::merge(cli, toml_config))
    }

    fn merge(cli: CliArgs, toml_config: TomlConfig) -> Self {
        Config {
            http_listen: cli.http_listen.unwrap_or(toml_config.http.listen),
            root: cli.root.unwrap_or(toml_config.http.root),
            templates: cli.templates.or(toml_config.http.templates),
            udp_listen: cli.udp_listen.unwrap_or(toml_config.udp.listen),
            store_uri: cli.store_uri.unwrap_or(toml_config.store.uri),
            store_database: toml_config.store.database,
            store_collection: toml_config.store.collection,
            store_timeout: Duration::from_secs(toml_config.store.timeout_secs),
            log_level: cli.log_level.unwrap_or(toml_config.logging.level),
            send: cli.send,
        }
    }
}

/// Configuration loading errors
#[derive(Debug)]
pub enum ConfigError {
    FileRead(PathBuf, std::io::Error),
    TomlParse(PathBuf, toml::de::Error),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::FileRead(path, e) => {
                write!(f, "Failed to read config file '{}': {}", path.display(), e)
            }
            ConfigError::TomlParse(path, e) => {
                write!(f, "Failed to parse config file '{}': {}", path.display(), e)
            }
        }
    }
}

impl std::error::Error for ConfigError {}
