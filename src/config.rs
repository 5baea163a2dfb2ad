//! Configuration loading.
//!
//! Settings come from an optional TOML file, then the environment:
//!
//! | Variable | Setting | Default |
//! |----------|---------|---------|
//! | `DATABASE_URL` | `db.url` | unset (no database) |
//! | `DATABASE_NAME`, then `DATABASE_ID` | `db.name` | `knowledge` |
//! | `HOST` | `server.host` | `0.0.0.0` |
//! | `PORT` | `server.port` | `8000` |
//!
//! Empty variables count as unset. Connection strings are never printed:
//! the `Debug` impl of [`DbConfig`] redacts them.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub db: DbConfig,
    #[serde(default)]
    pub server: ServerConfig,
    /// Which database variables were found in the environment, regardless
    /// of what the config file set. Filled by [`apply_env`].
    #[serde(skip)]
    pub env: EnvPresence,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EnvPresence {
    /// `DATABASE_URL` is set and non-empty.
    pub database_url: bool,
    /// `DATABASE_NAME` or `DATABASE_ID` is set and non-empty.
    pub database_name: bool,
}

#[derive(Deserialize, Clone, Default)]
pub struct DbConfig {
    /// `sqlite:<path>`, a bare file path, or `memory://`.
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
}

impl DbConfig {
    /// Logical database name; documents are namespaced under it.
    pub fn database_name(&self) -> &str {
        self.name.as_deref().unwrap_or(DEFAULT_DATABASE_NAME)
    }
}

impl std::fmt::Debug for DbConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DbConfig")
            .field("url", &self.url.as_ref().map(|_| "<redacted>"))
            .field("name", &self.name)
            .finish()
    }
}

pub const DEFAULT_DATABASE_NAME: &str = "knowledge";

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl ServerConfig {
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}
fn default_port() -> u16 {
    8000
}

/// Load configuration from `path` (if given) and the process environment.
pub fn load_config(path: Option<&Path>) -> Result<Config> {
    let config = match path {
        Some(path) => {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file: {}", path.display()))?;
            toml::from_str(&content).with_context(|| "Failed to parse config file")?
        }
        None => Config::default(),
    };
    apply_env(config, |key| std::env::var(key).ok())
}

/// Overlay environment values onto `config`.
///
/// `lookup` returns the raw value of a variable; it is a parameter so
/// tests need not mutate the process environment.
pub fn apply_env<F>(mut config: Config, lookup: F) -> Result<Config>
where
    F: Fn(&str) -> Option<String>,
{
    let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

    config.env = EnvPresence::default();
    if let Some(url) = var("DATABASE_URL") {
        config.db.url = Some(url);
        config.env.database_url = true;
    }
    if let Some(name) = var("DATABASE_NAME").or_else(|| var("DATABASE_ID")) {
        config.db.name = Some(name);
        config.env.database_name = true;
    }
    if let Some(host) = var("HOST") {
        config.server.host = host;
    }
    if let Some(port) = var("PORT") {
        config.server.port = port
            .trim()
            .parse()
            .with_context(|| format!("PORT must be a port number, got '{}'", port))?;
    }

    if config.db.name.as_deref().is_some_and(|n| n.trim().is_empty()) {
        anyhow::bail!("db.name must not be empty");
    }

    Ok(config)
}
