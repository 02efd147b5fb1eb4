//! Configuration management using Figment.
//!
//! Sources, lowest precedence first:
//! 1. Built-in defaults
//! 2. `pressroom.toml` in the working directory (or the path given to
//!    [`Config::load_from`])
//! 3. `DATABASE_URL`, the conventional connection-string variable
//! 4. Environment variables prefixed `PRESSROOM_` (e.g. `PRESSROOM_BIND`)

use std::net::SocketAddr;
use std::path::Path;

use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use serde::{Deserialize, Serialize};

use crate::error::Error;

pub const CONFIG_FILE: &str = "pressroom.toml";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Socket address to listen on.
    #[serde(default = "default_bind")]
    pub bind: SocketAddr,

    /// Default `EnvFilter` directive when `RUST_LOG` is unset.
    #[serde(default = "default_log_level")]
    pub log_level: String,

    #[serde(default)]
    pub log_format: LogFormat,

    /// PostgreSQL connection string. Without it the in-memory store is used.
    #[serde(default)]
    pub database_url: Option<String>,

    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

fn default_bind() -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], 3000))
}

fn default_log_level() -> String {
    "info".to_owned()
}

fn default_max_connections() -> u32 {
    5
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            log_level: default_log_level(),
            log_format: LogFormat::default(),
            database_url: None,
            max_connections: default_max_connections(),
        }
    }
}

impl Config {
    /// Loads from `pressroom.toml` in the working directory plus environment.
    pub fn load() -> Result<Self, Error> {
        Self::load_from(CONFIG_FILE)
    }

    /// Loads from a specific file plus environment. A missing file is not an
    /// error; the defaults and environment still apply.
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self, Error> {
        Ok(Self::figment(path.as_ref()).extract()?)
    }

    fn figment(path: &Path) -> Figment {
        Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Toml::file(path))
            .merge(Env::raw().only(&["DATABASE_URL"]))
            .merge(Env::prefixed("PRESSROOM_"))
    }
}
