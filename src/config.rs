use std::{fmt::Display, path::PathBuf, str::FromStr, time::Duration};

use anyhow::Context;

use crate::{constants::DISCORD_API_BASE, store::redis_backend::redis_url};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    Redis,
    Memory,
}

impl FromStr for BackendKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "redis" => Ok(BackendKind::Redis),
            "memory" => Ok(BackendKind::Memory),
            other => anyhow::bail!("unknown backend {other:?}, expected redis or memory"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub backend: BackendKind,
    pub redis_addr: String,
    pub redis_password: String,
    pub redis_db: i64,
    pub discord_api: String,
    pub verify_timeout: Duration,
    pub verify_cache_ttl: Duration,
    pub import_path: Option<PathBuf>,
    pub export_path: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 8080,
            backend: BackendKind::Redis,
            redis_addr: "127.0.0.1:6379".to_string(),
            redis_password: String::new(),
            redis_db: 0,
            discord_api: DISCORD_API_BASE.to_string(),
            verify_timeout: Duration::from_secs(10),
            verify_cache_ttl: Duration::ZERO,
            import_path: None,
            export_path: None,
        }
    }
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::load(|key| std::env::var(key).ok())
    }

    fn load(var: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let defaults = Self::default();

        Ok(Self {
            port: try_load(&var, "STENO_PORT", defaults.port)?,
            backend: try_load(&var, "STENO_BACKEND", defaults.backend)?,
            redis_addr: var("STENO_REDIS_ADDR").unwrap_or(defaults.redis_addr),
            redis_password: var("STENO_REDIS_PASSWORD").unwrap_or(defaults.redis_password),
            redis_db: try_load(&var, "STENO_REDIS_DB", defaults.redis_db)?,
            discord_api: var("STENO_DISCORD_API").unwrap_or(defaults.discord_api),
            verify_timeout: Duration::from_secs(try_load(
                &var,
                "STENO_VERIFY_TIMEOUT_SECS",
                defaults.verify_timeout.as_secs(),
            )?),
            verify_cache_ttl: Duration::from_secs(try_load(
                &var,
                "STENO_VERIFY_CACHE_TTL_SECS",
                defaults.verify_cache_ttl.as_secs(),
            )?),
            import_path: var("STENO_IMPORT_PATH")
                .filter(|path| !path.is_empty())
                .map(PathBuf::from),
            export_path: var("STENO_EXPORT_PATH")
                .filter(|path| !path.is_empty())
                .map(PathBuf::from),
        })
    }

    pub fn redis_url(&self) -> String {
        redis_url(&self.redis_addr, &self.redis_password, self.redis_db)
    }
}

fn try_load<T>(var: impl Fn(&str) -> Option<String>, key: &str, default: T) -> anyhow::Result<T>
where
    T: FromStr + std::fmt::Debug,
    T::Err: Display,
{
    match var(key) {
        Some(value) => value
            .trim()
            .parse()
            .map_err(|e| anyhow::anyhow!("{e}"))
            .with_context(|| format!("invalid {key} value {value:?}")),
        None => {
            tracing::info!("{key} not set, using default: {default:?}");
            Ok(default)
        }
    }
}
