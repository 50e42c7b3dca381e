//! Configuration types for fwdlog.
//!
//! [`Config::load`] reads `~/.config/fwdlog/config.toml`, creating it with
//! hardcoded defaults if it does not yet exist. [`Config::defaults`] returns
//! the same defaults without touching the filesystem (useful in tests).

use serde::Deserialize;
use std::ops::Range;
use std::path::PathBuf;
use std::time::Duration;

// ---------------------------------------------------------------------------
// Embedded defaults
// ---------------------------------------------------------------------------

const DEFAULT_CONFIG: &str = r#"
[client]
host               = "localhost"
port               = 24224
connect_timeout_ms = 3000
write_timeout_ms   = 3000
write_retries      = 8
buffer_max_bytes   = 1048576

[receiver]
bind_host        = "127.0.0.1"
max_frame_bytes  = 8388608
port_range_start = 10000
port_range_end   = 20000
"#;

// ---------------------------------------------------------------------------
// Public config types
// ---------------------------------------------------------------------------

/// Top-level configuration, loaded from `~/.config/fwdlog/config.toml`.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub client: ClientConfig,
    #[serde(default)]
    pub receiver: ReceiverConfig,
}

/// `[client]` section of `config.toml`.
#[derive(Debug, Clone, Deserialize)]
pub struct ClientConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
    #[serde(default = "default_write_timeout_ms")]
    pub write_timeout_ms: u64,
    /// Zero-progress writes tolerated before a send is abandoned.
    #[serde(default = "default_write_retries")]
    pub write_retries: u32,
    /// Pending-buffer ceiling for the persistent sender.
    #[serde(default = "default_buffer_max_bytes")]
    pub buffer_max_bytes: usize,
}

fn default_host() -> String { "localhost".to_string() }
fn default_port() -> u16 { 24224 }
fn default_connect_timeout_ms() -> u64 { 3000 }
fn default_write_timeout_ms() -> u64 { 3000 }
fn default_write_retries() -> u32 { 8 }
fn default_buffer_max_bytes() -> usize { 1024 * 1024 }

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            connect_timeout_ms: default_connect_timeout_ms(),
            write_timeout_ms: default_write_timeout_ms(),
            write_retries: default_write_retries(),
            buffer_max_bytes: default_buffer_max_bytes(),
        }
    }
}

impl ClientConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn write_timeout(&self) -> Duration {
        Duration::from_millis(self.write_timeout_ms)
    }
}

/// `[receiver]` section of `config.toml`.
#[derive(Debug, Clone, Deserialize)]
pub struct ReceiverConfig {
    #[serde(default = "default_bind_host")]
    pub bind_host: String,
    #[serde(default = "default_max_frame_bytes")]
    pub max_frame_bytes: usize,
    #[serde(default = "default_port_range_start")]
    pub port_range_start: u16,
    #[serde(default = "default_port_range_end")]
    pub port_range_end: u16,
}

fn default_bind_host() -> String { "127.0.0.1".to_string() }
fn default_max_frame_bytes() -> usize { crate::codec::DEFAULT_MAX_FRAME_BYTES }
fn default_port_range_start() -> u16 { 10000 }
fn default_port_range_end() -> u16 { 20000 }

impl Default for ReceiverConfig {
    fn default() -> Self {
        Self {
            bind_host: default_bind_host(),
            max_frame_bytes: default_max_frame_bytes(),
            port_range_start: default_port_range_start(),
            port_range_end: default_port_range_end(),
        }
    }
}

impl ReceiverConfig {
    /// Candidate ports for a free-port search (end exclusive).
    pub fn port_range(&self) -> Range<u16> {
        self.port_range_start..self.port_range_end
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::defaults()
    }
}

impl Config {
    /// Load from `~/.config/fwdlog/config.toml`, layered on top of the built-in
    /// defaults. Creates the file with defaults if it does not exist.
    pub fn load() -> anyhow::Result<Self> {
        Self::load_from(config_path())
    }

    /// Same as [`Config::load`] but for an explicit path.
    pub fn load_from(path: PathBuf) -> anyhow::Result<Self> {
        if !path.exists() {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(&path, DEFAULT_CONFIG.trim_start())?;
        }

        config::Config::builder()
            .add_source(config::File::from_str(DEFAULT_CONFIG, config::FileFormat::Toml))
            .add_source(config::File::from(path.as_path()).required(false))
            .build()?
            .try_deserialize()
            .map_err(Into::into)
    }

    /// Return the built-in defaults without touching the filesystem.
    pub fn defaults() -> Self {
        config::Config::builder()
            .add_source(config::File::from_str(DEFAULT_CONFIG, config::FileFormat::Toml))
            .build()
            .expect("built-in default config must be valid TOML")
            .try_deserialize()
            .expect("built-in default config must deserialize correctly")
    }
}

// ---------------------------------------------------------------------------
// Path helpers
// ---------------------------------------------------------------------------

fn config_path() -> PathBuf {
    std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".to_string()))
                .join(".config")
        })
        .join("fwdlog")
        .join("config.toml")
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
