/// Configuration management for the API server
///
/// Configuration is read from environment variables (and a `.env` file when
/// present) into a typed [`Config`] that is built once at startup.
///
/// # Environment Variables
///
/// - `API_HOST`: host to bind to (default: 0.0.0.0)
/// - `API_PORT`: port to bind to (default: 8080)
/// - `APP_ENV`: `development` or `production` (default: development)
/// - `DATABASE_URL`: PostgreSQL connection string (required)
/// - `DATABASE_MAX_CONNECTIONS`: pool size (default: 10)
/// - `JWT_SECRET`: token signing secret, at least 32 characters (required)
/// - `JWT_ALGORITHM`: HS256, HS384 or HS512 (default: HS256)
/// - `ACCESS_TOKEN_EXPIRE_MINUTES`: session lifetime (default: 30, at most
///   one year)
/// - `SUPERADMIN_USERNAME` / `SUPERADMIN_PASSWORD`: optional bootstrap admin
///   login for `/admin`, both or neither
/// - `RUST_LOG`, `LOG_FORMAT`: logging filter and `json` output
///
/// # Example
///
/// ```no_run
/// use teamdesk_api::config::Config;
///
/// # fn example() -> anyhow::Result<()> {
/// let config = Config::from_env()?;
/// println!("Server will listen on {}", config.bind_address());
/// # Ok(())
/// # }
/// ```

use std::env;

use serde::{Deserialize, Serialize};
use teamdesk_shared::auth::jwt::TokenSettings;
use teamdesk_shared::auth::password::constant_time_eq;
use teamdesk_shared::db::pool::DatabaseConfig as PoolConfig;

/// Longest accepted session lifetime: one year
pub const MAX_TOKEN_TTL_MINUTES: i64 = 365 * 24 * 60;

/// Complete application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub api: ApiConfig,
    pub mode: AppMode,
    pub database: DatabaseConfig,
    pub jwt: JwtConfig,
    pub superadmin: Option<SuperadminConfig>,
}

/// Deployment mode
///
/// Development applies migrations at startup; production marks the session
/// cookie `Secure` and sends HSTS.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AppMode {
    Development,
    Production,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// PostgreSQL connection URL
    pub url: String,

    /// Maximum number of connections in pool
    pub max_connections: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JwtConfig {
    /// Secret key for token signing
    ///
    /// Must be kept secret and be at least 32 bytes.
    /// Generate with: `openssl rand -hex 32`
    #[serde(skip_serializing)]
    pub secret: String,

    pub algorithm: String,

    /// Lifetime of a session token and its cookie
    pub ttl_minutes: i64,
}

/// Bootstrap administrator credentials for `/admin/login`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuperadminConfig {
    pub username: String,

    #[serde(skip_serializing)]
    pub password: String,
}

impl SuperadminConfig {
    /// Both fields are always compared, each in constant time
    pub fn matches(&self, username: &str, password: &str) -> bool {
        let username_ok = constant_time_eq(&self.username, username);
        let password_ok = constant_time_eq(&self.password, password);
        username_ok & password_ok
    }
}

impl Config {
    /// Loads configuration from the process environment
    ///
    /// # Errors
    ///
    /// Returns an error if a required variable is missing or a value is invalid.
    pub fn from_env() -> anyhow::Result<Self> {
        // Load .env file if present (for development)
        dotenvy::dotenv().ok();

        Self::from_vars(|key| env::var(key).ok())
    }

    /// Builds configuration from an arbitrary variable lookup
    pub fn from_vars<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());

        let host = var("API_HOST", "0.0.0.0");
        let port = var("API_PORT", "8080")
            .parse::<u16>()
            .map_err(|e| anyhow::anyhow!("API_PORT is invalid: {}", e))?;

        let mode = match var("APP_ENV", "development").to_ascii_lowercase().as_str() {
            "development" | "dev" => AppMode::Development,
            "production" | "prod" => AppMode::Production,
            other => anyhow::bail!("APP_ENV must be development or production, got {}", other),
        };

        let url = lookup("DATABASE_URL")
            .ok_or_else(|| anyhow::anyhow!("DATABASE_URL environment variable is required"))?;
        let max_connections = var("DATABASE_MAX_CONNECTIONS", "10")
            .parse::<u32>()
            .map_err(|e| anyhow::anyhow!("DATABASE_MAX_CONNECTIONS is invalid: {}", e))?;

        let secret = lookup("JWT_SECRET")
            .ok_or_else(|| anyhow::anyhow!("JWT_SECRET environment variable is required"))?;
        if secret.len() < 32 {
            anyhow::bail!("JWT_SECRET must be at least 32 characters long");
        }
        let algorithm = var("JWT_ALGORITHM", "HS256");
        let ttl_minutes = var("ACCESS_TOKEN_EXPIRE_MINUTES", "30")
            .parse::<i64>()
            .map_err(|e| anyhow::anyhow!("ACCESS_TOKEN_EXPIRE_MINUTES is invalid: {}", e))?;
        if !(1..=MAX_TOKEN_TTL_MINUTES).contains(&ttl_minutes) {
            anyhow::bail!(
                "ACCESS_TOKEN_EXPIRE_MINUTES must be between 1 and {}",
                MAX_TOKEN_TTL_MINUTES
            );
        }

        let superadmin = match (lookup("SUPERADMIN_USERNAME"), lookup("SUPERADMIN_PASSWORD")) {
            (Some(username), Some(password)) if !username.is_empty() && !password.is_empty() => {
                Some(SuperadminConfig { username, password })
            }
            (None, None) => None,
            _ => anyhow::bail!("SUPERADMIN_USERNAME and SUPERADMIN_PASSWORD must be set together"),
        };

        Ok(Self {
            api: ApiConfig { host, port },
            mode,
            database: DatabaseConfig {
                url,
                max_connections,
            },
            jwt: JwtConfig {
                secret,
                algorithm,
                ttl_minutes,
            },
            superadmin,
        })
    }

    /// Returns the server bind address
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.api.host, self.api.port)
    }

    pub fn is_production(&self) -> bool {
        self.mode == AppMode::Production
    }

    /// Settings for the shared token issuer
    pub fn token_settings(&self) -> TokenSettings {
        TokenSettings {
            secret: self.jwt.secret.clone(),
            algorithm: self.jwt.algorithm.clone(),
            ttl: chrono::Duration::minutes(self.jwt.ttl_minutes),
        }
    }

    /// Settings for the shared connection pool
    pub fn pool_config(&self) -> PoolConfig {
        PoolConfig {
            url: self.database.url.clone(),
            max_connections: self.database.max_connections,
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    const SECRET: &str = "test-secret-key-at-least-32-bytes-long";

    fn load(pairs: &[(&str, &str)]) -> anyhow::Result<Config> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_vars(|key| vars.get(key).cloned())
    }

    fn required() -> Vec<(&'static str, &'static str)> {
        vec![
            ("DATABASE_URL", "postgresql://localhost/teamdesk"),
            ("JWT_SECRET", SECRET),
        ]
    }

    #[test]
    fn test_defaults() {
        let config = load(&required()).unwrap();

        assert_eq!(config.bind_address(), "0.0.0.0:8080");
        assert_eq!(config.mode, AppMode::Development);
        assert_eq!(config.database.max_connections, 10);
        assert_eq!(config.jwt.algorithm, "HS256");
        assert_eq!(config.jwt.ttl_minutes, 30);
        assert!(config.superadmin.is_none());
        assert!(!config.is_production());
    }

    #[test]
    fn test_overrides() {
        let mut vars = required();
        vars.extend([
            ("API_HOST", "127.0.0.1"),
            ("API_PORT", "9000"),
            ("APP_ENV", "production"),
            ("ACCESS_TOKEN_EXPIRE_MINUTES", "90"),
            ("JWT_ALGORITHM", "HS512"),
            ("SUPERADMIN_USERNAME", "root"),
            ("SUPERADMIN_PASSWORD", "hunter22"),
        ]);
        let config = load(&vars).unwrap();

        assert_eq!(config.bind_address(), "127.0.0.1:9000");
        assert!(config.is_production());
        assert_eq!(config.token_settings().ttl, chrono::Duration::minutes(90));
        assert_eq!(config.superadmin.as_ref().map(|s| s.username.as_str()), Some("root"));
    }

    #[test]
    fn test_missing_required() {
        assert!(load(&[("JWT_SECRET", SECRET)]).is_err());
        assert!(load(&[("DATABASE_URL", "postgresql://localhost/x")]).is_err());
    }

    #[test]
    fn test_short_secret_rejected() {
        let result = load(&[
            ("DATABASE_URL", "postgresql://localhost/x"),
            ("JWT_SECRET", "short"),
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_invalid_values_rejected() {
        for (key, value) in [
            ("API_PORT", "eighty"),
            ("APP_ENV", "staging"),
            ("ACCESS_TOKEN_EXPIRE_MINUTES", "0"),
            ("ACCESS_TOKEN_EXPIRE_MINUTES", "527041"),
            ("ACCESS_TOKEN_EXPIRE_MINUTES", "9223372036854775807"),
            ("SUPERADMIN_USERNAME", "root"),
        ] {
            let mut vars = required();
            vars.push((key, value));
            assert!(load(&vars).is_err(), "{}={} should be rejected", key, value);
        }
    }

    #[test]
    fn test_secrets_not_serialized() {
        let mut vars = required();
        vars.extend([("SUPERADMIN_USERNAME", "root"), ("SUPERADMIN_PASSWORD", "hunter22")]);
        let json = serde_json::to_string(&load(&vars).unwrap()).unwrap();

        assert!(!json.contains(SECRET));
        assert!(!json.contains("hunter22"));
    }

    #[test]
    fn test_token_ttl_upper_bound() {
        let mut vars = required();
        vars.push(("ACCESS_TOKEN_EXPIRE_MINUTES", "525600"));
        let config = load(&vars).unwrap();

        assert_eq!(config.jwt.ttl_minutes, MAX_TOKEN_TTL_MINUTES);
        assert_eq!(config.token_settings().ttl, chrono::Duration::days(365));
    }

    #[test]
    fn test_superadmin_matches() {
        let superadmin = SuperadminConfig {
            username: "root".to_string(),
            password: "root-password".to_string(),
        };

        assert!(superadmin.matches("root", "root-password"));
        assert!(!superadmin.matches("root", "root-passwor"));
        assert!(!superadmin.matches("admin", "root-password"));
        assert!(!superadmin.matches("", ""));
    }
}
