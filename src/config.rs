//! Service configuration
//!
//! Loaded from an optional TOML file, then overridden by environment
//! variables of the form `STACKSHARE__SECTION__KEY`
//! (e.g. `STACKSHARE__AUTH__SESSION_SECRET`).

use crate::error::{Result, StackShareError};
use crate::storage::libsql::ConnectionMode;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Environment prefix for overrides
const ENV_PREFIX: &str = "STACKSHARE";

/// Minimum length of the session signing secret
const MIN_SECRET_LEN: usize = 32;

/// Top-level configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StackShareConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub auth: AuthConfig,
    pub object_storage: ObjectStorageConfig,
    pub cache: CacheConfig,
}

/// HTTP listener settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
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
    /// Socket address to bind
    pub fn addr(&self) -> Result<SocketAddr> {
        format!("{}:{}", self.host, self.port).parse().map_err(|e| {
            StackShareError::Config(config::ConfigError::Message(format!(
                "Invalid server address {}:{}: {}",
                self.host, self.port, e
            )))
        })
    }
}

/// Database location
///
/// `url` selects a remote database (with optional `path` for an embedded
/// replica); otherwise `path` or the default local file is used.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub path: Option<PathBuf>,
    pub url: Option<String>,
    pub auth_token: Option<String>,
}

impl DatabaseConfig {
    /// Resolve the libsql connection mode
    pub fn connection_mode(&self) -> ConnectionMode {
        let token = self.auth_token.clone().unwrap_or_default();
        match (&self.url, &self.path) {
            (Some(url), Some(path)) => ConnectionMode::EmbeddedReplica {
                path: path.to_string_lossy().to_string(),
                url: url.clone(),
                token,
            },
            (Some(url), None) => ConnectionMode::Remote {
                url: url.clone(),
                token,
            },
            (None, Some(path)) => ConnectionMode::Local(path.to_string_lossy().to_string()),
            (None, None) => ConnectionMode::Local(default_db_path().to_string_lossy().to_string()),
        }
    }
}

/// Get the default database path using XDG_DATA_HOME standard
pub fn default_db_path() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("stackshare")
        .join("stackshare.db")
}

/// Session verification settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// Shared HMAC secret with the identity provider
    pub session_secret: String,
    /// Cookie carrying the session token
    pub cookie_name: String,
    /// Lifetime of tokens minted by the `token` command
    pub session_ttl_hours: u64,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            session_secret: String::new(),
            cookie_name: "stackshare-session".to_string(),
            session_ttl_hours: 24 * 7,
        }
    }
}

/// Object storage endpoint for item images
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ObjectStorageConfig {
    /// Base URL; uploads are disabled when unset
    pub url: Option<String>,
    pub api_key: Option<String>,
    pub bucket: String,
}

impl Default for ObjectStorageConfig {
    fn default() -> Self {
        Self {
            url: None,
            api_key: None,
            bucket: "stack-items".to_string(),
        }
    }
}

/// Page cache sizing
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub capacity: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self { capacity: 256 }
    }
}

impl StackShareConfig {
    /// Load configuration from an optional file plus environment overrides
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = config::Config::builder();

        if let Some(path) = path {
            info!("Loading configuration from {}", path.display());
            builder = builder.add_source(config::File::from(path).required(true));
        }

        builder = builder.add_source(
            config::Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        );

        let config: StackShareConfig = builder.build()?.try_deserialize()?;
        config.validate()?;

        debug!(
            "Configuration loaded (server: {}:{}, uploads: {})",
            config.server.host,
            config.server.port,
            config.object_storage.url.is_some()
        );
        Ok(config)
    }

    /// Load configuration from TOML string
    pub fn from_toml(toml_str: &str) -> Result<Self> {
        let config: StackShareConfig = toml::from_str(toml_str).map_err(|e| {
            StackShareError::Config(config::ConfigError::Message(format!(
                "Failed to parse config: {}",
                e
            )))
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if self.server.port == 0 {
            return Err(invalid("server.port must be non-zero"));
        }

        if self.auth.session_secret.len() < MIN_SECRET_LEN {
            return Err(invalid(&format!(
                "auth.session_secret must be at least {} bytes (set {}__AUTH__SESSION_SECRET)",
                MIN_SECRET_LEN, ENV_PREFIX
            )));
        }

        if self.auth.cookie_name.is_empty() {
            return Err(invalid("auth.cookie_name must not be empty"));
        }

        if self.cache.capacity == 0 {
            return Err(invalid("cache.capacity must be at least 1"));
        }

        if self.object_storage.url.is_some() && self.object_storage.bucket.is_empty() {
            return Err(invalid("object_storage.bucket must be set when url is configured"));
        }

        Ok(())
    }
}

fn invalid(msg: &str) -> StackShareError {
    StackShareError::Config(config::ConfigError::Message(format!(
        "Invalid configuration: {}",
        msg
    )))
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "0123456789abcdef0123456789abcdef";

    fn valid_config() -> StackShareConfig {
        let mut config = StackShareConfig::default();
        config.auth.session_secret = SECRET.to_string();
        config
    }

    #[test]
    fn test_default_config_requires_secret() {
        let result = StackShareConfig::default().validate();
        assert!(result.is_err());
        assert!(result
            .unwrap_err()
            .to_string()
            .contains("session_secret must be at least"));
    }

    #[test]
    fn test_valid_config() {
        assert!(valid_config().validate().is_ok());
    }

    #[test]
    fn test_validate_zero_cache() {
        let mut config = valid_config();
        config.cache.capacity = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_from_toml() {
        let toml_str = format!(
            r#"
            [server]
            host = "0.0.0.0"
            port = 8080

            [database]
            path = "/var/lib/stackshare/app.db"

            [auth]
            session_secret = "{}"

            [object_storage]
            url = "https://storage.example.com"
            api_key = "anon-key"
        "#,
            SECRET
        );

        let config = StackShareConfig::from_toml(&toml_str).unwrap();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.object_storage.bucket, "stack-items");
        assert_eq!(config.auth.cookie_name, "stackshare-session");
        assert!(matches!(
            config.database.connection_mode(),
            ConnectionMode::Local(ref p) if p == "/var/lib/stackshare/app.db"
        ));
        assert_eq!(config.server.addr().unwrap().port(), 8080);
    }

    #[test]
    fn test_remote_connection_mode() {
        let config = DatabaseConfig {
            path: None,
            url: Some("libsql://db.example.com".to_string()),
            auth_token: Some("token".to_string()),
        };
        assert!(matches!(
            config.connection_mode(),
            ConnectionMode::Remote { ref url, .. } if url == "libsql://db.example.com"
        ));
    }
}
