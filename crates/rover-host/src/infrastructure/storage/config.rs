//! TOML-based configuration for the rover host.
//!
//! The file is looked up at `--config <path>` when given, otherwise in the
//! platform config directory:
//! - Windows:  `%APPDATA%\RoverComm\config.toml`
//! - Linux:    `~/.config/rovercomm/config.toml`
//! - macOS:    `~/Library/Application Support/RoverComm/config.toml`
//!
//! # Example (for beginners)
//!
//! ```toml
//! [link]
//! bind_address = "127.0.0.1"
//! port = 6000
//!
//! [queues]
//! inbound_max = 100
//! outbound_max = 100
//!
//! [protocol]
//! checksum = "xor"
//!
//! [logging]
//! level = "debug"
//! ```
//!
//! Every field has a default (`#[serde(default = "...")]`), so a missing file,
//! a missing section, or a missing key all fall back to the values the device
//! firmware expects.

use std::net::{IpAddr, SocketAddr};
use std::path::{Path, PathBuf};

use rover_core::{ChecksumMode, ParserConfig, SendPolicy};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error type for configuration file operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The platform config directory could not be determined.
    #[error("could not determine platform config directory")]
    NoPlatformConfigDir,

    /// A file system I/O error occurred.
    #[error("I/O error accessing config at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The TOML content could not be parsed.
    #[error("failed to parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),

    /// The config could not be serialized to TOML.
    #[error("failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    /// A queue was configured with no room for any message.
    #[error("{direction} queue capacity must be at least 1")]
    InvalidQueueCapacity { direction: &'static str },

    /// `link.bind_address` is not an IP address.
    #[error("invalid bind address '{0}'")]
    InvalidBindAddress(String),
}

// ── Config schema types ───────────────────────────────────────────────────────

/// Top-level host configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct HostConfig {
    #[serde(default)]
    pub link: LinkConfig,
    #[serde(default)]
    pub queues: QueueConfig,
    #[serde(default)]
    pub protocol: ParserConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Where the host listens for the device.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LinkConfig {
    /// IP address to bind.  The device bridge connects over loopback.
    #[serde(default = "default_bind_address")]
    pub bind_address: String,
    /// TCP port the device bridge connects to.
    #[serde(default = "default_port")]
    pub port: u16,
}

/// Pool sizes and send policies for the two queues.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct QueueConfig {
    #[serde(default = "default_queue_max")]
    pub inbound_max: usize,
    #[serde(default = "default_queue_max")]
    pub outbound_max: usize,
    /// Recycle undelivered sensor messages on every send so the controller
    /// only ever sees the newest one.
    #[serde(default)]
    pub inbound_keep_latest: bool,
    #[serde(default)]
    pub outbound_keep_latest: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LoggingConfig {
    /// `tracing` filter used when `RUST_LOG` is unset, e.g. `"info"` or
    /// `"rover_core=debug"`.
    #[serde(default = "default_log_level")]
    pub level: String,
}

// ── Default helpers ───────────────────────────────────────────────────────────

fn default_bind_address() -> String {
    "127.0.0.1".to_string()
}
fn default_port() -> u16 {
    6000
}
fn default_queue_max() -> usize {
    rover_core::protocol::constants::IN_QUEUE_MAX
}
fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            port: default_port(),
        }
    }
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            inbound_max: default_queue_max(),
            outbound_max: rover_core::protocol::constants::OUT_QUEUE_MAX,
            inbound_keep_latest: false,
            outbound_keep_latest: false,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn policy(keep_latest: bool) -> SendPolicy {
    if keep_latest {
        SendPolicy::KeepLatest
    } else {
        SendPolicy::Fifo
    }
}

impl QueueConfig {
    pub fn inbound_policy(&self) -> SendPolicy {
        policy(self.inbound_keep_latest)
    }

    pub fn outbound_policy(&self) -> SendPolicy {
        policy(self.outbound_keep_latest)
    }
}

impl LinkConfig {
    /// The socket address to listen on.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidBindAddress`] if `bind_address` is not
    /// an IP address.
    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        let ip: IpAddr = self
            .bind_address
            .parse()
            .map_err(|_| ConfigError::InvalidBindAddress(self.bind_address.clone()))?;
        Ok(SocketAddr::new(ip, self.port))
    }
}

impl HostConfig {
    /// Rejects settings that would make the host unusable.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidQueueCapacity`] for a zero queue size
    /// and [`ConfigError::InvalidBindAddress`] for an unparsable address.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.queues.inbound_max == 0 {
            return Err(ConfigError::InvalidQueueCapacity {
                direction: "inbound",
            });
        }
        if self.queues.outbound_max == 0 {
            return Err(ConfigError::InvalidQueueCapacity {
                direction: "outbound",
            });
        }
        self.link.socket_addr()?;
        Ok(())
    }

    pub fn checksum(&self) -> ChecksumMode {
        self.protocol.checksum
    }
}

// ── Config repository ─────────────────────────────────────────────────────────

/// Resolves the full path to the default config file.
///
/// # Errors
///
/// Returns [`ConfigError::NoPlatformConfigDir`] if the base directory cannot be
/// determined.
pub fn config_file_path() -> Result<PathBuf, ConfigError> {
    platform_config_dir()
        .map(|dir| dir.join("config.toml"))
        .ok_or(ConfigError::NoPlatformConfigDir)
}

/// Loads the config from `path`, or defaults if the file does not exist.
///
/// # Errors
///
/// Returns [`ConfigError::Io`] for file-system errors other than "not found",
/// and [`ConfigError::Parse`] if the TOML is malformed.
pub fn load_config_from(path: &Path) -> Result<HostConfig, ConfigError> {
    match std::fs::read_to_string(path) {
        Ok(content) => Ok(toml::from_str(&content)?),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(HostConfig::default()),
        Err(e) => Err(ConfigError::Io {
            path: path.to_path_buf(),
            source: e,
        }),
    }
}

/// Loads the config from the platform config directory.
///
/// # Errors
///
/// See [`config_file_path`] and [`load_config_from`].
pub fn load_config() -> Result<HostConfig, ConfigError> {
    load_config_from(&config_file_path()?)
}

/// Writes `config` to `path`, creating parent directories as needed.
///
/// # Errors
///
/// Returns [`ConfigError::Io`] for file-system failures or
/// [`ConfigError::Serialize`] if serialization fails.
pub fn save_config_to(config: &HostConfig, path: &Path) -> Result<(), ConfigError> {
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir).map_err(|source| ConfigError::Io {
            path: dir.to_path_buf(),
            source,
        })?;
    }

    let content = toml::to_string_pretty(config)?;
    std::fs::write(path, content).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })
}

fn platform_config_dir() -> Option<PathBuf> {
    #[cfg(target_os = "windows")]
    {
        std::env::var_os("APPDATA").map(|p| PathBuf::from(p).join("RoverComm"))
    }

    #[cfg(target_os = "linux")]
    {
        let base = std::env::var_os("XDG_CONFIG_HOME")
            .map(PathBuf::from)
            .or_else(|| std::env::var_os("HOME").map(|h| PathBuf::from(h).join(".config")))?;
        Some(base.join("rovercomm"))
    }

    #[cfg(target_os = "macos")]
    {
        std::env::var_os("HOME").map(|h| {
            PathBuf::from(h)
                .join("Library")
                .join("Application Support")
                .join("RoverComm")
        })
    }

    #[cfg(not(any(target_os = "windows", target_os = "linux", target_os = "macos")))]
    {
        None
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_dir(tag: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "rover_cfg_{tag}_{}_{:?}",
            std::process::id(),
            std::thread::current().id()
        ));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn test_default_config_matches_device_firmware() {
        // Arrange / Act
        let cfg = HostConfig::default();

        // Assert
        assert_eq!(cfg.link.port, 6000);
        assert_eq!(cfg.link.bind_address, "127.0.0.1");
        assert_eq!(cfg.queues.inbound_max, 100);
        assert_eq!(cfg.queues.outbound_max, 100);
        assert_eq!(cfg.protocol.checksum, ChecksumMode::Unchecked);
        assert_eq!(cfg.protocol.max_message_len, 500);
        assert_eq!(cfg.logging.level, "info");
        assert_eq!(cfg.queues.inbound_policy(), SendPolicy::Fifo);
    }

    #[test]
    fn test_empty_toml_uses_defaults() {
        let cfg: HostConfig = toml::from_str("").expect("deserialize empty");
        assert_eq!(cfg, HostConfig::default());
    }

    #[test]
    fn test_partial_section_overrides_only_named_fields() {
        // Arrange
        let toml_str = r#"
[link]
port = 7000

[queues]
inbound_keep_latest = true

[protocol]
checksum = "xor"
"#;

        // Act
        let cfg: HostConfig = toml::from_str(toml_str).expect("deserialize partial");

        // Assert
        assert_eq!(cfg.link.port, 7000);
        assert_eq!(cfg.link.bind_address, "127.0.0.1");
        assert_eq!(cfg.queues.inbound_policy(), SendPolicy::KeepLatest);
        assert_eq!(cfg.queues.outbound_policy(), SendPolicy::Fifo);
        assert_eq!(cfg.checksum(), ChecksumMode::Xor);
        assert_eq!(cfg.protocol.max_message_len, 500);
    }

    #[test]
    fn test_unknown_checksum_mode_is_a_parse_error() {
        let result: Result<HostConfig, _> = toml::from_str("[protocol]\nchecksum = \"crc\"\n");
        assert!(result.is_err());
    }

    #[test]
    fn test_validate_rejects_zero_capacity() {
        let mut cfg = HostConfig::default();
        cfg.queues.outbound_max = 0;

        let err = cfg.validate().unwrap_err();

        assert!(matches!(
            err,
            ConfigError::InvalidQueueCapacity {
                direction: "outbound"
            }
        ));
    }

    #[test]
    fn test_validate_rejects_hostname_bind_address() {
        let mut cfg = HostConfig::default();
        cfg.link.bind_address = "localhost".to_string();

        assert!(matches!(
            cfg.validate(),
            Err(ConfigError::InvalidBindAddress(_))
        ));
    }

    #[test]
    fn test_socket_addr_combines_address_and_port() {
        let cfg = HostConfig::default();
        assert_eq!(cfg.link.socket_addr().unwrap().to_string(), "127.0.0.1:6000");
    }

    #[test]
    fn test_load_config_from_missing_file_returns_defaults() {
        let path = PathBuf::from("/nonexistent/path/that/cannot/exist/config.toml");

        let cfg = load_config_from(&path).expect("missing file is not an error");

        assert_eq!(cfg, HostConfig::default());
    }

    #[test]
    fn test_load_config_from_malformed_file_returns_parse_error() {
        let dir = temp_dir("bad");
        let path = dir.join("config.toml");
        std::fs::write(&path, "[[[ not valid toml").unwrap();

        let result = load_config_from(&path);

        assert!(matches!(result, Err(ConfigError::Parse(_))));
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_save_then_load_round_trip() {
        // Arrange
        let dir = temp_dir("roundtrip");
        let path = dir.join("nested").join("config.toml");
        let mut cfg = HostConfig::default();
        cfg.link.port = 6100;
        cfg.logging.level = "debug".to_string();
        cfg.protocol.checksum = ChecksumMode::Xor;

        // Act
        save_config_to(&cfg, &path).expect("save");
        let loaded = load_config_from(&path).expect("load");

        // Assert
        assert_eq!(loaded, cfg);
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_config_file_path_ends_with_config_toml() {
        if let Ok(path) = config_file_path() {
            assert!(path.ends_with("config.toml"), "got {path:?}");
        }
    }
}
