//! Configuration management for the Ferrule FTP server
//!
//! Values are layered: built-in defaults, then an optional TOML file, then
//! `FERRULE_FTP_*` environment variables. Everything is read once at startup.

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::ops::RangeInclusive;
use std::path::PathBuf;
use std::time::Duration;

/// Default configuration file, looked up relative to the working directory.
pub const DEFAULT_CONFIG_PATH: &str = "config";

/// Environment variable that overrides the configuration file path.
pub const CONFIG_PATH_ENV: &str = "FERRULE_CONFIG";

/// Complete server configuration
#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    /// IP address to bind the FTP control connection and passive listeners
    pub bind_address: String,

    /// Port for FTP control connection
    pub control_port: u16,

    /// IPv4 address advertised to clients in `227` replies
    pub pasv_address: String,

    /// Inclusive port range for PASV data connections
    pub pasv_port_min: u16,
    pub pasv_port_max: u16,

    /// JSON credential store
    pub users_file: String,

    /// Maximum concurrent control connections
    pub max_clients: usize,

    /// Control connection idle limit; 0 disables it
    pub idle_timeout_secs: u64,

    /// Bound on passive accept and active dial
    pub data_timeout_secs: u64,

    pub max_command_length: usize,
    pub max_username_length: usize,

    /// Buffer size for file transfers
    pub buffer_size: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0".to_string(),
            control_port: 2121,
            pasv_address: "127.0.0.1".to_string(),
            pasv_port_min: 50000,
            pasv_port_max: 51000,
            users_file: "users.json".to_string(),
            max_clients: 64,
            idle_timeout_secs: 300,
            data_timeout_secs: 30,
            max_command_length: 512,
            max_username_length: 64,
            buffer_size: 64 * 1024,
        }
    }
}

impl ServerConfig {
    /// Load configuration from the file named by `FERRULE_CONFIG` (or `config.toml`)
    /// with environment overrides.
    pub fn load() -> Result<Self, ConfigError> {
        let path = std::env::var(CONFIG_PATH_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.into());
        Self::load_from(&path)
    }

    /// Load configuration from an explicit path. A missing file is not an error.
    pub fn load_from(path: &str) -> Result<Self, ConfigError> {
        let defaults = ServerConfig::default();

        let settings = Config::builder()
            .set_default("bind_address", defaults.bind_address)?
            .set_default("control_port", i64::from(defaults.control_port))?
            .set_default("pasv_address", defaults.pasv_address)?
            .set_default("pasv_port_min", i64::from(defaults.pasv_port_min))?
            .set_default("pasv_port_max", i64::from(defaults.pasv_port_max))?
            .set_default("users_file", defaults.users_file)?
            .set_default("max_clients", defaults.max_clients as i64)?
            .set_default("idle_timeout_secs", defaults.idle_timeout_secs as i64)?
            .set_default("data_timeout_secs", defaults.data_timeout_secs as i64)?
            .set_default("max_command_length", defaults.max_command_length as i64)?
            .set_default("max_username_length", defaults.max_username_length as i64)?
            .set_default("buffer_size", defaults.buffer_size as i64)?
            .add_source(File::with_name(path).required(false))
            .add_source(Environment::with_prefix("FERRULE_FTP").try_parsing(true))
            .build()?;

        let config: ServerConfig = settings.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Validation for all configuration values
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.control_port == 0 {
            return Err(ConfigError::Message("Control port cannot be 0".into()));
        }

        if self.pasv_port_min == 0 {
            return Err(ConfigError::Message("pasv_port_min cannot be 0".into()));
        }

        if self.pasv_port_min > self.pasv_port_max {
            return Err(ConfigError::Message(
                "pasv_port_min must not exceed pasv_port_max".into(),
            ));
        }

        if self.bind_address.parse::<IpAddr>().is_err() {
            return Err(ConfigError::Message(format!(
                "bind_address is not an IP address: {}",
                self.bind_address
            )));
        }

        if self.pasv_address.parse::<Ipv4Addr>().is_err() {
            return Err(ConfigError::Message(format!(
                "pasv_address is not an IPv4 address: {}",
                self.pasv_address
            )));
        }

        if self.users_file.is_empty() {
            return Err(ConfigError::Message("users_file cannot be empty".into()));
        }

        if self.max_clients == 0 {
            return Err(ConfigError::Message(
                "max_clients must be greater than 0".into(),
            ));
        }

        if self.buffer_size == 0 {
            return Err(ConfigError::Message(
                "buffer_size must be greater than 0".into(),
            ));
        }

        Ok(())
    }

    /// Get bind address and control port as socket address
    pub fn control_socket(&self) -> Result<SocketAddr, ConfigError> {
        Ok(SocketAddr::new(self.bind_ip()?, self.control_port))
    }

    pub fn bind_ip(&self) -> Result<IpAddr, ConfigError> {
        self.bind_address
            .parse()
            .map_err(|_| ConfigError::Message(format!("bad bind_address {}", self.bind_address)))
    }

    pub fn advertised_ip(&self) -> Result<Ipv4Addr, ConfigError> {
        self.pasv_address
            .parse()
            .map_err(|_| ConfigError::Message(format!("bad pasv_address {}", self.pasv_address)))
    }

    /// Get data port range for PASV mode
    pub fn pasv_port_range(&self) -> RangeInclusive<u16> {
        self.pasv_port_min..=self.pasv_port_max
    }

    pub fn users_file_path(&self) -> PathBuf {
        PathBuf::from(&self.users_file)
    }

    /// Control connection idle limit, `None` when disabled
    pub fn idle_timeout(&self) -> Option<Duration> {
        (self.idle_timeout_secs > 0).then(|| Duration::from_secs(self.idle_timeout_secs))
    }

    /// Get data connection timeout as Duration
    pub fn data_timeout(&self) -> Duration {
        Duration::from_secs(self.data_timeout_secs)
    }
}
