//! # Configuration Management
//!
//! Startup configuration for the login gateway.
//!
//! Everything here is loaded once, validated, and then shared read-only with the
//! protocol handler and the connection manager.
//!
//! ## Configuration Sources
//! - TOML files via [`LoginConfig::from_file`]
//! - Defaults, optionally adjusted with [`LoginConfig::default_with_overrides`]
//! - Environment overrides via [`LoginConfig::apply_env_overrides`]
//!
//! ## Example
//! ```toml
//! [server]
//! address = "0.0.0.0:7171"
//!
//! [version]
//! min = 760
//! max = 1099
//!
//! [crypto]
//! password_hash = "sha1"
//! private_key = "keys/login.pem"
//!
//! [[limits.connections]]
//! interval = 60
//! max = 30
//!
//! [[worlds]]
//! id = 0
//! name = "Antica"
//! host = "127.0.0.1"
//! port = 7172
//! ```

use crate::core::layout::WORLD_LIST_SINCE;
use crate::crypto::PasswordHash;
use crate::error::{ProtocolError, Result};
use crate::utils::rate_limit::RateLimitTier;
use crate::utils::timeout;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Read;
use std::net::{Ipv4Addr, SocketAddr};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::Level;

/// Default login port of the game client
pub const DEFAULT_LOGIN_PORT: u16 = 7171;

/// Whole gateway configuration
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct LoginConfig {
    /// Listener settings
    #[serde(default)]
    pub server: ServerConfig,

    /// Accepted client versions
    #[serde(default)]
    pub version: VersionConfig,

    /// Rate-limit tiers
    #[serde(default)]
    pub limits: LimitsConfig,

    /// Key material and password hashing
    #[serde(default)]
    pub crypto: CryptoConfig,

    /// Message of the day
    #[serde(default)]
    pub motd: MotdConfig,

    /// Status query document
    #[serde(default)]
    pub status: StatusConfig,

    /// Account store
    #[serde(default)]
    pub store: StoreConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Game worlds offered to clients
    #[serde(default)]
    pub worlds: Vec<World>,
}

impl LoginConfig {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut file = File::open(path.as_ref()).map_err(|e| {
            ProtocolError::ConfigError(format!(
                "Failed to open config file {}: {e}",
                path.as_ref().display()
            ))
        })?;

        let mut contents = String::new();
        file.read_to_string(&mut contents)
            .map_err(|e| ProtocolError::ConfigError(format!("Failed to read config file: {e}")))?;

        Self::from_toml(&contents)
    }

    /// Load configuration from TOML string
    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str::<Self>(content)
            .map_err(|e| ProtocolError::ConfigError(format!("Failed to parse TOML: {e}")))
    }

    /// Defaults with environment overrides applied
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();
        config.apply_env_overrides()?;
        Ok(config)
    }

    /// Override selected settings from `OTLS_*` environment variables.
    pub fn apply_env_overrides(&mut self) -> Result<()> {
        if let Ok(addr) = std::env::var("OTLS_ADDRESS") {
            self.server.address = addr;
        }

        if let Ok(path) = std::env::var("OTLS_PRIVATE_KEY") {
            self.crypto.private_key = PathBuf::from(path);
        }

        if let Ok(min) = std::env::var("OTLS_VERSION_MIN") {
            self.version.min = min.parse().map_err(|e| {
                ProtocolError::ConfigError(format!("Invalid OTLS_VERSION_MIN '{min}': {e}"))
            })?;
        }

        if let Ok(max) = std::env::var("OTLS_VERSION_MAX") {
            self.version.max = max.parse().map_err(|e| {
                ProtocolError::ConfigError(format!("Invalid OTLS_VERSION_MAX '{max}': {e}"))
            })?;
        }

        if let Ok(hash) = std::env::var("OTLS_PASSWORD_HASH") {
            self.crypto.password_hash = hash.parse()?;
        }

        Ok(())
    }

    /// Apply overrides to the default configuration
    pub fn default_with_overrides<F>(mutator: F) -> Self
    where
        F: FnOnce(&mut Self),
    {
        let mut config = Self::default();
        mutator(&mut config);
        config
    }

    /// Generate example configuration file content
    pub fn example_config() -> String {
        let example = Self::default_with_overrides(|config| {
            config.worlds.push(World {
                id: 0,
                name: String::from("Antica"),
                host: String::from("127.0.0.1"),
                port: DEFAULT_LOGIN_PORT + 1,
                preview: false,
            });
            config.store.accounts_file = Some(PathBuf::from("accounts.toml"));
        });
        toml::to_string_pretty(&example)
            .unwrap_or_else(|_| String::from("# Failed to generate example config"))
    }

    /// Save configuration to a file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| ProtocolError::ConfigError(format!("Failed to serialize config: {e}")))?;

        std::fs::write(path, content)
            .map_err(|e| ProtocolError::ConfigError(format!("Failed to write config file: {e}")))?;

        Ok(())
    }

    /// Look up a configured world
    pub fn world(&self, id: u8) -> Option<&World> {
        self.worlds.iter().find(|world| world.id == id)
    }

    /// Validate the configuration for common issues and misconfigurations
    ///
    /// Returns a list of validation errors. Empty list means configuration is valid.
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        errors.extend(self.server.validate());
        errors.extend(self.version.validate());
        errors.extend(self.limits.validate());
        errors.extend(self.crypto.validate());
        errors.extend(self.logging.validate());
        errors.extend(self.validate_worlds());

        errors
    }

    fn validate_worlds(&self) -> Vec<String> {
        let mut errors = Vec::new();
        let legacy_clients = self.version.min < WORLD_LIST_SINCE;

        for (index, world) in self.worlds.iter().enumerate() {
            if self.worlds[..index].iter().any(|other| other.id == world.id) {
                errors.push(format!("Duplicate world id: {}", world.id));
            }
            if world.name.is_empty() {
                errors.push(format!("World {} has an empty name", world.id));
            }
            if world.port == 0 {
                errors.push(format!("World {} has port 0", world.id));
            }
            if legacy_clients && world.ipv4().is_none() {
                errors.push(format!(
                    "World {} host '{}' must be an IPv4 address while clients below {} are accepted",
                    world.id, world.host, WORLD_LIST_SINCE
                ));
            }
        }

        if self.worlds.len() > usize::from(u8::MAX) {
            errors.push(format!(
                "Too many worlds: {} (maximum: {})",
                self.worlds.len(),
                u8::MAX
            ));
        }

        errors
    }

    /// Validate and return Result - convenience method
    /// Settings that are valid but worth a warning once logging is up.
    pub fn warnings(&self) -> Vec<String> {
        let mut warnings = Vec::new();
        if self.crypto.password_hash == PasswordHash::Plain {
            warnings.push("Plain password storage is configured".to_string());
        }
        if self.store.accounts_file.is_none() {
            warnings.push("No accounts file configured, every login will be rejected".to_string());
        }
        warnings
    }

    pub fn validate_strict(&self) -> Result<()> {
        let errors = self.validate();
        if errors.is_empty() {
            Ok(())
        } else {
            Err(ProtocolError::ConfigError(format!(
                "Configuration validation failed:\n  - {}",
                errors.join("\n  - ")
            )))
        }
    }
}

/// Listener settings
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Listen address (e.g., "0.0.0.0:7171")
    pub address: String,

    /// Time a client has to deliver its complete frame
    #[serde(with = "duration_serde")]
    pub idle_timeout: Duration,

    /// Timeout for graceful server shutdown
    #[serde(with = "duration_serde")]
    pub shutdown_timeout: Duration,

    /// Maximum number of concurrent connections
    pub max_connections: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            address: format!("0.0.0.0:{DEFAULT_LOGIN_PORT}"),
            idle_timeout: timeout::IDLE_TIMEOUT,
            shutdown_timeout: timeout::SHUTDOWN_TIMEOUT,
            max_connections: 1000,
        }
    }
}

impl ServerConfig {
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.address.is_empty() {
            errors.push("Server address cannot be empty".to_string());
        } else if self.address.parse::<SocketAddr>().is_err() {
            errors.push(format!(
                "Invalid server address format: '{}' (expected format: '0.0.0.0:7171')",
                self.address
            ));
        }

        if self.idle_timeout.as_millis() < 100 {
            errors.push("Idle timeout too short (minimum: 100ms)".to_string());
        } else if self.idle_timeout.as_secs() > 300 {
            errors.push("Idle timeout too long (maximum: 300s)".to_string());
        }

        if self.shutdown_timeout.as_secs() < 1 {
            errors.push("Shutdown timeout too short (minimum: 1s)".to_string());
        } else if self.shutdown_timeout.as_secs() > 60 {
            errors.push("Shutdown timeout too long (maximum: 60s)".to_string());
        }

        if self.max_connections == 0 {
            errors.push("Max connections must be greater than 0".to_string());
        }

        errors
    }
}

/// Inclusive range of accepted client versions
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default)]
pub struct VersionConfig {
    pub min: u16,
    pub max: u16,
}

impl Default for VersionConfig {
    fn default() -> Self {
        Self { min: 760, max: 1099 }
    }
}

impl VersionConfig {
    pub fn accepts(&self, version: u16) -> bool {
        (self.min..=self.max).contains(&version)
    }

    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();
        if self.min > self.max {
            errors.push(format!(
                "Version range is empty: min {} > max {}",
                self.min, self.max
            ));
        }
        errors
    }
}

/// Rate-limit tiers for both limiter tables
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LimitsConfig {
    /// Tiers counted on every accepted connection
    pub connections: Vec<RateLimitTier>,
    /// Tiers counted on every failed authentication
    pub authorizations: Vec<RateLimitTier>,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            connections: vec![RateLimitTier::new(60, 30), RateLimitTier::new(3600, 300)],
            authorizations: vec![RateLimitTier::new(60, 5), RateLimitTier::new(3600, 30)],
        }
    }
}

impl LimitsConfig {
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();
        for (table, tiers) in [
            ("connections", &self.connections),
            ("authorizations", &self.authorizations),
        ] {
            for (index, tier) in tiers.iter().enumerate() {
                if tier.interval == 0 {
                    errors.push(format!("limits.{table}[{index}]: interval must be greater than 0"));
                }
                if tier.max == 0 {
                    errors.push(format!("limits.{table}[{index}]: max must be greater than 0"));
                }
            }
        }
        errors
    }
}

/// Key material and password hashing
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CryptoConfig {
    /// Algorithm the account store hashes passwords with
    pub password_hash: PasswordHash,
    /// PEM file holding the 1024-bit RSA private key
    pub private_key: PathBuf,
}

impl Default for CryptoConfig {
    fn default() -> Self {
        Self {
            password_hash: PasswordHash::default(),
            private_key: PathBuf::from("keys/login.pem"),
        }
    }
}

impl CryptoConfig {
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();
        if self.private_key.as_os_str().is_empty() {
            errors.push("Private key path cannot be empty".to_string());
        }
        errors
    }
}

/// Message of the day sent before the character list
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct MotdConfig {
    /// Clients show a message again only when the id changes
    pub id: u32,
    /// Empty text disables the message
    pub text: String,
}

impl Default for MotdConfig {
    fn default() -> Self {
        Self {
            id: 1,
            text: String::from("Welcome!"),
        }
    }
}

/// Content of the status document served on status queries
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct StatusConfig {
    /// World whose status the TCP query reports
    pub world_id: u8,
    pub servername: String,
    pub ip: String,
    pub port: u16,
    pub location: String,
    pub url: String,
    /// Client version string shown to server lists
    pub client: String,
    pub owner_name: String,
    pub owner_email: String,
    pub max_players: u32,
    pub monsters: u32,
    pub npcs: u32,
    pub rates: StatusRates,
    pub map_name: String,
    pub map_author: String,
    pub map_width: u32,
    pub map_height: u32,
    pub motd: String,
}

impl Default for StatusConfig {
    fn default() -> Self {
        Self {
            world_id: 0,
            servername: String::from("OTLS"),
            ip: String::from("127.0.0.1"),
            port: DEFAULT_LOGIN_PORT,
            location: String::from("Europe"),
            url: String::new(),
            client: String::from("10.99"),
            owner_name: String::new(),
            owner_email: String::new(),
            max_players: 1000,
            monsters: 0,
            npcs: 0,
            rates: StatusRates::default(),
            map_name: String::new(),
            map_author: String::new(),
            map_width: 0,
            map_height: 0,
            motd: String::new(),
        }
    }
}

/// Game rates advertised in the status document
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct StatusRates {
    pub experience: f32,
    pub skill: f32,
    pub loot: f32,
    pub magic: f32,
    pub spawn: f32,
}

impl Default for StatusRates {
    fn default() -> Self {
        Self {
            experience: 1.0,
            skill: 1.0,
            loot: 1.0,
            magic: 1.0,
            spawn: 1.0,
        }
    }
}

/// Account store settings
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct StoreConfig {
    /// TOML file with `[[accounts]]` entries for the in-memory store
    pub accounts_file: Option<PathBuf>,
}

/// A game world as advertised to clients
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct World {
    pub id: u8,
    pub name: String,
    pub host: String,
    pub port: u16,
    #[serde(default)]
    pub preview: bool,
}

impl World {
    /// Host as an IPv4 address, when it is one
    pub fn ipv4(&self) -> Option<Ipv4Addr> {
        self.host.parse().ok()
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level
    #[serde(with = "log_level_serde")]
    pub log_level: Level,

    /// Whether to log to console
    pub log_to_console: bool,

    /// Whether to log to file
    pub log_to_file: bool,

    /// Path to log file (if log_to_file is true)
    pub log_file_path: Option<String>,

    /// Whether to use JSON formatting for logs
    pub json_format: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            log_level: Level::INFO,
            log_to_console: true,
            log_to_file: false,
            log_file_path: None,
            json_format: false,
        }
    }
}

impl LoggingConfig {
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.log_to_file {
            if let Some(ref path) = self.log_file_path {
                if let Some(parent) = Path::new(path).parent() {
                    if !parent.as_os_str().is_empty() && !parent.exists() {
                        errors.push(format!(
                            "Log file directory does not exist: {}",
                            parent.display()
                        ));
                    }
                }
            } else {
                errors.push("log_file_path must be specified when log_to_file is true".to_string());
            }
        }

        if !self.log_to_console && !self.log_to_file {
            errors
                .push("At least one logging output (console or file) must be enabled".to_string());
        }

        errors
    }
}

/// Duration as whole milliseconds
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let millis = u64::try_from(duration.as_millis()).unwrap_or(u64::MAX);
        millis.serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}

/// tracing::Level as a lowercase name
mod log_level_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::str::FromStr;
    use tracing::Level;

    pub fn serialize<S>(level: &Level, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let level_str = match *level {
            Level::TRACE => "trace",
            Level::DEBUG => "debug",
            Level::INFO => "info",
            Level::WARN => "warn",
            Level::ERROR => "error",
        };
        level_str.serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Level, D::Error>
    where
        D: Deserializer<'de>,
    {
        let level_str = String::deserialize(deserializer)?;
        Level::from_str(&level_str)
            .map_err(|_| serde::de::Error::custom(format!("Invalid log level: {level_str}")))
    }
}
