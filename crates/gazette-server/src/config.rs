//! Server configuration loaded from environment variables.
//!
//! All settings have sensible defaults so the server can start with zero
//! configuration for local development.

use std::net::SocketAddr;
use std::path::PathBuf;

use gazette_shared::constants::{DEFAULT_HTTP_PORT, MAX_IMAGE_SIZE};

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Socket address for the HTTP (axum) API server.
    /// Env: `HTTP_ADDR`
    /// Default: `0.0.0.0:8080`
    pub http_addr: SocketAddr,

    /// Explicit path for the SQLite database file.
    /// Env: `DB_PATH`
    /// Default: unset (platform data directory).
    pub db_path: Option<PathBuf>,

    /// Filesystem path where uploaded images are stored.
    /// Env: `UPLOAD_DIR`
    /// Default: `./uploads`
    pub upload_dir: PathBuf,

    /// Maximum uploaded image size in bytes.
    /// Env: `MAX_IMAGE_SIZE`
    /// Default: 10 MiB.
    pub max_image_size: usize,

    /// Human-readable name for this server instance.
    /// Env: `INSTANCE_NAME`
    /// Default: `"Gazette"`
    pub instance_name: String,

    /// Whether new accounts can be registered.
    /// Env: `REGISTRATION_OPEN` (true/false)
    /// Default: `true`
    pub registration_open: bool,

    /// Chat-completions endpoint of the text-generation service.
    /// Env: `AI_API_URL`
    /// Default: unset (AI endpoints return an upstream error).
    pub ai_api_url: Option<String>,

    /// API key for the text-generation service.
    /// Env: `AI_API_KEY`
    /// Default: unset.
    pub ai_api_key: Option<String>,

    /// Model name sent to the text-generation service.
    /// Env: `AI_MODEL`
    /// Default: `"gemini-2.5-flash"`
    pub ai_model: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            http_addr: ([0, 0, 0, 0], DEFAULT_HTTP_PORT).into(),
            db_path: None,
            upload_dir: PathBuf::from("./uploads"),
            max_image_size: MAX_IMAGE_SIZE,
            instance_name: "Gazette".to_string(),
            registration_open: true,
            ai_api_url: None,
            ai_api_key: None,
            ai_model: "gemini-2.5-flash".to_string(),
        }
    }
}

impl ServerConfig {
    /// Load configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(addr) = std::env::var("HTTP_ADDR") {
            if let Ok(parsed) = addr.parse::<SocketAddr>() {
                config.http_addr = parsed;
            } else {
                tracing::warn!(
                    value = %addr,
                    "Invalid HTTP_ADDR, using default"
                );
            }
        }

        if let Ok(path) = std::env::var("DB_PATH") {
            config.db_path = Some(PathBuf::from(path));
        }

        if let Ok(path) = std::env::var("UPLOAD_DIR") {
            config.upload_dir = PathBuf::from(path);
        }

        if let Ok(val) = std::env::var("MAX_IMAGE_SIZE") {
            if let Ok(n) = val.parse::<usize>() {
                config.max_image_size = n;
            } else {
                tracing::warn!(
                    value = %val,
                    "Invalid MAX_IMAGE_SIZE, using default"
                );
            }
        }

        if let Ok(name) = std::env::var("INSTANCE_NAME") {
            config.instance_name = name;
        }

        if let Ok(val) = std::env::var("REGISTRATION_OPEN") {
            config.registration_open = val != "false" && val != "0";
        }

        if let Ok(url) = std::env::var("AI_API_URL") {
            if !url.is_empty() {
                config.ai_api_url = Some(url);
            }
        }

        if let Ok(key) = std::env::var("AI_API_KEY") {
            if !key.is_empty() {
                config.ai_api_key = Some(key);
            }
        }

        if let Ok(model) = std::env::var("AI_MODEL") {
            config.ai_model = model;
        }

        // RUST_LOG is handled directly by tracing-subscriber's EnvFilter,
        // so we do not store it here.

        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ServerConfig::default();
        assert_eq!(config.http_addr, ([0, 0, 0, 0], 8080).into());
        assert_eq!(config.upload_dir, PathBuf::from("./uploads"));
        assert!(config.registration_open);
        assert!(config.ai_api_url.is_none());
    }

    #[test]
    fn test_max_image_size_default() {
        let config = ServerConfig::default();
        assert_eq!(config.max_image_size, 10 * 1024 * 1024);
    }
}
