//! # Application Configuration
//!
//! Read once at startup from the environment (`.env` is loaded if present)
//! and handed to the router through `AppState`.

use pay_core::ServiceError;
use pay_stripe::StripeConfig;
use std::net::SocketAddr;

/// Server run mode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerMode {
    Debug,
    Release,
    Test,
}

impl ServerMode {
    fn parse(value: &str) -> Result<Self, ServiceError> {
        match value.to_ascii_lowercase().as_str() {
            "debug" => Ok(ServerMode::Debug),
            "release" => Ok(ServerMode::Release),
            "test" => Ok(ServerMode::Test),
            other => Err(ServiceError::Configuration(format!(
                "SERVER_MODE must be debug, release or test (got {})",
                other
            ))),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ServerMode::Debug => "debug",
            ServerMode::Release => "release",
            ServerMode::Test => "test",
        }
    }
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub mode: ServerMode,
}

impl ServerConfig {
    /// Get the socket address to bind to
    pub fn socket_addr(&self) -> Result<SocketAddr, ServiceError> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .map_err(|e| ServiceError::Configuration(format!("Invalid socket address: {}", e)))
    }

    pub fn is_release(&self) -> bool {
        self.mode == ServerMode::Release
    }
}

/// Connection settings for the persistence engine
#[derive(Clone)]
pub struct DatabaseConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub name: String,
    pub ssl_mode: String,
}

impl std::fmt::Debug for DatabaseConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DatabaseConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("password", &"***")
            .field("name", &self.name)
            .field("ssl_mode", &self.ssl_mode)
            .finish()
    }
}

#[derive(Clone)]
pub struct AuthConfig {
    pub jwt_secret: String,
    /// Token lifetime in hours
    pub jwt_expiry_hours: i64,
    pub refresh_enabled: bool,
}

impl std::fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthConfig")
            .field("jwt_secret", &"***")
            .field("jwt_expiry_hours", &self.jwt_expiry_hours)
            .field("refresh_enabled", &self.refresh_enabled)
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Default filter when `RUST_LOG` is unset
    pub level: String,
}

/// Application configuration
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub auth: AuthConfig,
    pub stripe: StripeConfig,
    pub log: LogConfig,
}

fn or_default(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: &str) -> String {
    lookup(key)
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| default.to_string())
}

fn number<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: T,
) -> Result<T, ServiceError> {
    match lookup(key).filter(|v| !v.is_empty()) {
        Some(raw) => raw
            .parse()
            .map_err(|_| ServiceError::Configuration(format!("{} is not a valid number", key))),
        None => Ok(default),
    }
}

fn boolean(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: bool,
) -> Result<bool, ServiceError> {
    match lookup(key).as_deref().map(str::trim) {
        None | Some("") => Ok(default),
        Some("true") | Some("1") => Ok(true),
        Some("false") | Some("0") => Ok(false),
        Some(other) => Err(ServiceError::Configuration(format!(
            "{} must be true, false, 1 or 0 (got {})",
            key, other
        ))),
    }
}

impl AppConfig {
    /// Load from environment variables
    pub fn from_env() -> Result<Self, ServiceError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load from an arbitrary key lookup
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ServiceError> {
        let mode = match lookup("SERVER_MODE").or_else(|| lookup("GIN_MODE")) {
            Some(raw) if !raw.is_empty() => ServerMode::parse(&raw)?,
            _ => ServerMode::Release,
        };

        let server = ServerConfig {
            host: or_default(&lookup, "HOST", "0.0.0.0"),
            port: number(&lookup, "PORT", 8080)?,
            mode,
        };

        let database = DatabaseConfig {
            host: or_default(&lookup, "DB_HOST", "localhost"),
            port: number(&lookup, "DB_PORT", 5432)?,
            user: or_default(&lookup, "DB_USER", "postgres"),
            password: or_default(&lookup, "DB_PASSWORD", "postgres"),
            name: or_default(&lookup, "DB_NAME", "postgres"),
            ssl_mode: or_default(&lookup, "DB_SSLMODE", "disable"),
        };

        let jwt_secret = lookup("JWT_SECRET")
            .filter(|v| !v.is_empty())
            .ok_or_else(|| ServiceError::Configuration("JWT_SECRET not set".to_string()))?;

        let auth = AuthConfig {
            jwt_secret,
            jwt_expiry_hours: number(&lookup, "JWT_EXPIRY", 24)?,
            refresh_enabled: boolean(&lookup, "JWT_REFRESH_ENABLED", true)?,
        };

        let stripe = StripeConfig::from_lookup(&lookup)?;

        let log = LogConfig {
            level: or_default(&lookup, "LOG_LEVEL", "info").to_ascii_lowercase(),
        };

        Ok(Self {
            server,
            database,
            auth,
            stripe,
            log,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    const REQUIRED: &[(&str, &str)] = &[
        ("JWT_SECRET", "jwt-secret"),
        ("STRIPE_SECRET_KEY", "sk_test_abc123"),
        ("STRIPE_PUBLISHABLE_KEY", "pk_test_xyz789"),
        ("STRIPE_WEBHOOK_SECRET", "whsec_secret"),
    ];

    fn with(extra: &[(&'static str, &'static str)]) -> Vec<(&'static str, &'static str)> {
        let mut pairs = REQUIRED.to_vec();
        pairs.extend_from_slice(extra);
        pairs
    }

    #[test]
    fn test_defaults() {
        let config = AppConfig::from_lookup(lookup(REQUIRED)).unwrap();
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.server.mode, ServerMode::Release);
        assert_eq!(config.database.port, 5432);
        assert_eq!(config.database.ssl_mode, "disable");
        assert_eq!(config.auth.jwt_expiry_hours, 24);
        assert!(config.auth.refresh_enabled);
        assert_eq!(config.log.level, "info");
    }

    #[test]
    fn test_socket_addr() {
        let config = AppConfig::from_lookup(lookup(&with(&[("PORT", "3000")]))).unwrap();
        assert_eq!(config.server.socket_addr().unwrap().to_string(), "0.0.0.0:3000");

        let config = AppConfig::from_lookup(lookup(&with(&[("HOST", "not a host")]))).unwrap();
        assert!(config.server.socket_addr().is_err());
    }

    #[test]
    fn test_server_mode_fallback() {
        let config = AppConfig::from_lookup(lookup(&with(&[("GIN_MODE", "debug")]))).unwrap();
        assert_eq!(config.server.mode, ServerMode::Debug);

        let config = AppConfig::from_lookup(lookup(&with(&[
            ("GIN_MODE", "debug"),
            ("SERVER_MODE", "test"),
        ])))
        .unwrap();
        assert_eq!(config.server.mode, ServerMode::Test);

        assert!(AppConfig::from_lookup(lookup(&with(&[("SERVER_MODE", "prod")]))).is_err());
    }

    #[test]
    fn test_refresh_flag_values() {
        for (raw, expected) in [("true", true), ("1", true), ("false", false), ("0", false)] {
            let config =
                AppConfig::from_lookup(lookup(&with(&[("JWT_REFRESH_ENABLED", raw)]))).unwrap();
            assert_eq!(config.auth.refresh_enabled, expected, "{raw}");
        }
        assert!(
            AppConfig::from_lookup(lookup(&with(&[("JWT_REFRESH_ENABLED", "yes")]))).is_err()
        );
    }

    #[test]
    fn test_jwt_secret_required() {
        let result = AppConfig::from_lookup(lookup(&REQUIRED[1..]));
        assert!(matches!(result, Err(ServiceError::Configuration(m)) if m.contains("JWT_SECRET")));
    }

    #[test]
    fn test_invalid_numbers() {
        assert!(AppConfig::from_lookup(lookup(&with(&[("PORT", "eighty")]))).is_err());
        assert!(AppConfig::from_lookup(lookup(&with(&[("JWT_EXPIRY", "1d")]))).is_err());
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let config = AppConfig::from_lookup(lookup(&with(&[("DB_PASSWORD", "hunter22")]))).unwrap();
        let debug = format!("{:?}", config);
        assert!(!debug.contains("hunter22"));
        assert!(!debug.contains("jwt-secret"));
        assert!(!debug.contains("whsec_secret"));
    }
}
