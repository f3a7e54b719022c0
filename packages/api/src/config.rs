//! # Service settings
//!
//! Layered with the `config` crate, lowest priority first:
//!
//! 1. built-in defaults,
//! 2. an optional `config.toml` in the working directory,
//! 3. environment variables, `_` separating section and key (`DATABASE_URL`,
//!    `AUTH_SECRET`, `SERVER_PORT`, `CORS_ORIGINS=a,b`).
//!
//! A `.env` file is loaded first through `dotenvy`, so its entries behave like
//! environment variables.

use std::path::PathBuf;

use config::builder::DefaultState;
use config::{Config, ConfigBuilder, ConfigError, Environment, File, FileFormat};
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct Server {
    pub host: String,
    pub port: u16,
    /// Reported by the health endpoints.
    pub environment: String,
}

impl Server {
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Database {
    /// Full connection string. Takes precedence over the individual parts when set.
    #[serde(default)]
    pub url: String,
    pub user: String,
    pub password: String,
    pub host: String,
    pub port: u16,
    pub database: String,
    pub connections: u32,
}

impl Database {
    pub fn url(&self) -> String {
        if !self.url.is_empty() {
            return self.url.clone();
        }
        format!(
            "postgres://{}:{}@{}:{}/{}",
            self.user, self.password, self.host, self.port, self.database
        )
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Auth {
    /// HMAC key for signing access tokens.
    pub secret: String,
    /// Token lifetime in hours.
    pub ttl: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Uploads {
    pub dir: PathBuf,
    /// Public prefix the stored files are served under.
    pub url: String,
    /// Maximum request body size in bytes for upload requests.
    pub limit: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Cors {
    pub origins: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub server: Server,
    pub database: Database,
    pub auth: Auth,
    pub uploads: Uploads,
    pub cors: Cors,
}

impl Settings {
    /// Load settings from defaults, `config.toml` and the environment.
    pub fn new() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        Self::defaults()?
            .add_source(
                File::with_name("config.toml")
                    .format(FileFormat::Toml)
                    .required(false),
            )
            .add_source(
                Environment::default()
                    .separator("_")
                    .list_separator(",")
                    .with_list_parse_key("cors.origins")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()
    }

    /// Settings from a TOML snippet layered over the defaults.
    pub fn from_toml(toml: &str) -> Result<Self, ConfigError> {
        Self::defaults()?
            .add_source(File::from_str(toml, FileFormat::Toml))
            .build()?
            .try_deserialize()
    }

    fn defaults() -> Result<ConfigBuilder<DefaultState>, ConfigError> {
        Config::builder()
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", 3000)?
            .set_default("server.environment", "development")?
            .set_default("database.url", "")?
            .set_default("database.user", "carelink")?
            .set_default("database.password", "password")?
            .set_default("database.host", "localhost")?
            .set_default("database.port", 5432)?
            .set_default("database.database", "carelink")?
            .set_default("database.connections", 5)?
            .set_default("auth.secret", "change-me")?
            .set_default("auth.ttl", 24)?
            .set_default("uploads.dir", "uploads")?
            .set_default("uploads.url", "/uploads")?
            .set_default("uploads.limit", 10 * 1024 * 1024)?
            .set_default(
                "cors.origins",
                vec!["http://localhost:3000", "http://localhost:5000"],
            )
    }
}
