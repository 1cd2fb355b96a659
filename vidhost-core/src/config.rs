//! Centralized configuration for Vidhost.
//!
//! All tunable parameters and settings are defined here to avoid
//! hard-coded values scattered throughout the codebase.

use std::net::SocketAddr;
use std::path::PathBuf;

use crate::streaming::RangeMode;

/// Default read block size for streamed bodies.
pub const DEFAULT_BLOCK_SIZE: usize = 8192;

/// Default cap on a single upload body.
pub const DEFAULT_MAX_UPLOAD_BYTES: u64 = 512 * 1024 * 1024;

/// Central configuration for all Vidhost components.
///
/// Groups related configuration settings into logical sections.
/// Supports environment variable overrides for runtime customization.
#[derive(Debug, Clone, Default)]
pub struct VidhostConfig {
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub streaming: StreamingConfig,
}

/// HTTP listener configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Host address to bind
    pub host: String,
    /// Port to bind
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 3000,
        }
    }
}

impl ServerConfig {
    /// Resolves host and port into a socket address.
    ///
    /// # Errors
    ///
    /// - `VidhostError::Configuration` - Host is not a valid IP address
    pub fn socket_addr(&self) -> crate::Result<SocketAddr> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .map_err(|_| crate::VidhostError::Configuration {
                reason: format!("invalid listen address {}:{}", self.host, self.port),
            })
    }
}

/// Media storage configuration.
#[derive(Debug, Clone)]
pub struct StorageConfig {
    /// Root directory for uploaded videos
    pub media_dir: PathBuf,
    /// Index existing files under `media_dir` at startup
    pub scan_on_startup: bool,
    /// Largest accepted upload body in bytes
    pub max_upload_bytes: u64,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            media_dir: PathBuf::from("videos"),
            scan_on_startup: true,
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
        }
    }
}

/// Ranged streaming configuration.
#[derive(Debug, Clone)]
pub struct StreamingConfig {
    /// Bytes read from disk per produced chunk
    pub block_size: usize,
    /// How `Range` headers are interpreted
    pub range_mode: RangeMode,
}

impl Default for StreamingConfig {
    fn default() -> Self {
        Self {
            block_size: DEFAULT_BLOCK_SIZE,
            range_mode: RangeMode::Permissive,
        }
    }
}

impl VidhostConfig {
    /// Creates configuration with environment variable overrides.
    ///
    /// Allows runtime configuration via environment variables while
    /// maintaining sensible defaults. Unparseable values are ignored.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(host) = std::env::var("VIDHOST_HOST") {
            config.server.host = host;
        }

        if let Ok(port) = std::env::var("VIDHOST_PORT")
            && let Ok(port) = port.parse::<u16>()
        {
            config.server.port = port;
        }

        if let Ok(dir) = std::env::var("VIDHOST_MEDIA_DIR") {
            config.storage.media_dir = PathBuf::from(dir);
        }

        if let Ok(limit) = std::env::var("VIDHOST_MAX_UPLOAD_BYTES")
            && let Ok(limit) = limit.parse::<u64>()
        {
            config.storage.max_upload_bytes = limit;
        }

        if let Ok(size) = std::env::var("VIDHOST_BLOCK_SIZE")
            && let Ok(size) = size.parse::<usize>()
            && size > 0
        {
            config.streaming.block_size = size;
        }

        if let Ok(strict) = std::env::var("VIDHOST_STRICT_RANGES") {
            config.streaming.range_mode = if strict.parse().unwrap_or(false) {
                RangeMode::Strict
            } else {
                RangeMode::Permissive
            };
        }

        config
    }
}
