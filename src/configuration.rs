use config::{ConfigError, Environment};
use secrecy::{ExposeSecret, Secret};

use crate::auth::{
    DEFAULT_REFRESH_TOKEN_TTL_DAYS, MAX_ACCESS_TOKEN_TTL_SECS, MAX_REFRESH_TOKEN_TTL_DAYS,
};

const MIN_JWT_SECRET_BYTES: usize = 32;

#[derive(serde::Deserialize, Clone)]
pub struct Settings {
    pub database: DatabaseSettings,
    pub application: ApplicationSettings,
    pub auth: AuthSettings,
    pub log: LogSettings,
}

#[derive(serde::Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    Postgres,
    Memory,
}

#[derive(serde::Deserialize, Clone)]
pub struct ApplicationSettings {
    pub host: String,
    pub port: u16,
    pub storage: StorageBackend,
}

impl ApplicationSettings {
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[derive(serde::Deserialize, Clone)]
pub struct DatabaseSettings {
    pub username: String,
    pub password: Secret<String>,
    pub port: u16,
    pub host: String,
    pub database_name: String,
    pub max_connections: u32,
}

impl DatabaseSettings {
    pub fn connection_string(&self) -> Secret<String> {
        Secret::new(format!(
            "postgres://{}:{}@{}:{}/{}",
            self.username,
            self.password.expose_secret(),
            self.host,
            self.port,
            self.database_name
        ))
    }
}

/// Token signing and lifetime settings
#[derive(serde::Deserialize, Clone)]
pub struct AuthSettings {
    pub jwt_secret: Secret<String>,
    /// Upper bound on access tokens minted at login
    pub access_token_ttl_secs: i64,
    pub refresh_token_ttl_days: i64,
}

impl AuthSettings {
    pub fn access_token_ttl(&self) -> chrono::Duration {
        chrono::Duration::try_seconds(self.access_token_ttl_secs).unwrap_or(chrono::Duration::MAX)
    }

    /// Saturates instead of panicking; `validate` keeps loaded values in range.
    pub fn refresh_token_ttl(&self) -> chrono::Duration {
        chrono::Duration::try_days(self.refresh_token_ttl_days).unwrap_or(chrono::Duration::MAX)
    }
}

#[derive(serde::Deserialize, Clone)]
pub struct LogSettings {
    /// trace, debug, info, warn, error
    pub level: String,
    /// json or pretty
    pub format: String,
}

impl Settings {
    fn validate(&self) -> Result<(), ConfigError> {
        if self.auth.jwt_secret.expose_secret().len() < MIN_JWT_SECRET_BYTES {
            return Err(ConfigError::Message(format!(
                "auth.jwt_secret must be at least {} bytes long",
                MIN_JWT_SECRET_BYTES
            )));
        }

        if self.auth.access_token_ttl_secs < 1
            || self.auth.access_token_ttl_secs > MAX_ACCESS_TOKEN_TTL_SECS
        {
            return Err(ConfigError::Message(format!(
                "auth.access_token_ttl_secs must be between 1 and {}",
                MAX_ACCESS_TOKEN_TTL_SECS
            )));
        }

        if self.auth.refresh_token_ttl_days < 1
            || self.auth.refresh_token_ttl_days > MAX_REFRESH_TOKEN_TTL_DAYS
        {
            return Err(ConfigError::Message(format!(
                "auth.refresh_token_ttl_days must be between 1 and {}",
                MAX_REFRESH_TOKEN_TTL_DAYS
            )));
        }

        match self.log.format.to_lowercase().as_str() {
            "json" | "pretty" => {}
            other => {
                return Err(ConfigError::Message(format!(
                    "Invalid log format: {}. Must be one of: json, pretty",
                    other
                )))
            }
        }

        Ok(())
    }
}

/// Load settings from `configuration.{yaml,toml,json}` (optional) and
/// `APP_`-prefixed environment variables, e.g. `APP_AUTH__JWT_SECRET`.
pub fn get_configuration() -> Result<Settings, ConfigError> {
    let settings = config::Config::builder()
        .set_default("application.host", "127.0.0.1")?
        .set_default("application.port", 8080)?
        .set_default("application.storage", "postgres")?
        .set_default("database.username", "postgres")?
        .set_default("database.password", "password")?
        .set_default("database.host", "127.0.0.1")?
        .set_default("database.port", 5432)?
        .set_default("database.database_name", "chirpy")?
        .set_default("database.max_connections", 5)?
        .set_default("auth.access_token_ttl_secs", MAX_ACCESS_TOKEN_TTL_SECS)?
        .set_default("auth.refresh_token_ttl_days", DEFAULT_REFRESH_TOKEN_TTL_DAYS)?
        .set_default("log.level", "info")?
        .set_default("log.format", "json")?
        .add_source(config::File::with_name("configuration").required(false))
        .add_source(
            Environment::with_prefix("APP")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        )
        .build()?;

    let settings = settings.try_deserialize::<Settings>()?;
    settings.validate()?;
    Ok(settings)
}
