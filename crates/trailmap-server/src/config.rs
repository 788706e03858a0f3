use std::net::SocketAddr;
use std::time::Duration;

use trailmap_core::MAX_SUPPORTED_ZOOM;
use trailmap_tiles::TileConfig;

/// Server configuration, loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    pub listen_addr: SocketAddr,
    pub database_url: String,
    pub tiles: TileConfig,
    /// Budget for all handlers of one posted event.
    pub dispatch_timeout: Duration,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        let listen_addr = std::env::var("TRAILMAP_LISTEN_ADDR")
            .unwrap_or_else(|_| "0.0.0.0:3000".to_string())
            .parse()
            .map_err(|_| {
                ConfigError::Invalid("TRAILMAP_LISTEN_ADDR", "must be a valid socket address")
            })?;

        let database_url = std::env::var("TRAILMAP_DATABASE_URL")
            .unwrap_or_else(|_| "sqlite://trailmap.db".to_string());
        if database_url.trim().is_empty() {
            return Err(ConfigError::Missing("TRAILMAP_DATABASE_URL"));
        }

        let defaults = TileConfig::default();

        let max_zoom = match std::env::var("TRAILMAP_MAX_ZOOM") {
            Ok(s) => s
                .parse::<u8>()
                .ok()
                .filter(|z| *z <= MAX_SUPPORTED_ZOOM)
                .ok_or(ConfigError::Invalid(
                    "TRAILMAP_MAX_ZOOM",
                    "must be an integer between 0 and 22",
                ))?,
            Err(_) => defaults.max_zoom,
        };

        let max_age_secs = match std::env::var("TRAILMAP_TILE_MAX_AGE") {
            Ok(s) => s.parse().map_err(|_| {
                ConfigError::Invalid("TRAILMAP_TILE_MAX_AGE", "must be a number of seconds")
            })?,
            Err(_) => defaults.max_age_secs,
        };

        let dispatch_timeout_ms = std::env::var("TRAILMAP_DISPATCH_TIMEOUT_MS")
            .unwrap_or_else(|_| "5000".to_string())
            .parse()
            .unwrap_or(5000);

        Ok(Config {
            listen_addr,
            database_url,
            tiles: TileConfig {
                max_zoom,
                max_age_secs,
            },
            dispatch_timeout: Duration::from_millis(dispatch_timeout_ms),
        })
    }

    /// Create a test configuration.
    #[cfg(test)]
    pub fn for_testing() -> Self {
        Config {
            listen_addr: "127.0.0.1:0".parse().unwrap(),
            database_url: "sqlite::memory:".to_string(),
            tiles: TileConfig::default(),
            dispatch_timeout: Duration::from_secs(5),
        }
    }
}

#[derive(Debug)]
pub enum ConfigError {
    Missing(&'static str),
    Invalid(&'static str, &'static str),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Missing(var) => {
                write!(f, "Missing required environment variable: {}", var)
            }
            ConfigError::Invalid(var, msg) => write!(f, "Invalid value for {}: {}", var, msg),
        }
    }
}

impl std::error::Error for ConfigError {}
