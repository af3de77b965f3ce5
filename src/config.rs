use std::fmt::Display;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{Result, anyhow};

use crate::download::DownloadConfig;
use crate::whisper::WhisperConfig;

pub const DEFAULT_MAX_FILE_SIZE: u64 = 25 * 1024 * 1024; // 25MB
pub const DEFAULT_DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(30);

/// Source of configuration values, normally the process environment.
pub type EnvLookup = dyn Fn(&str) -> Option<String>;

pub fn process_env() -> impl Fn(&str) -> Option<String> {
    dotenvy::dotenv().ok();
    |key: &str| std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

pub fn parse_var<T>(lookup: &EnvLookup, key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: Display,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e| anyhow!("Invalid value for {key}: {raw:?} ({e})")),
        None => Ok(default),
    }
}

pub fn parse_flag(lookup: &EnvLookup, key: &str, default: bool) -> Result<bool> {
    match lookup(key).map(|v| v.trim().to_ascii_lowercase()) {
        Some(v) if matches!(v.as_str(), "true" | "1" | "yes" | "on") => Ok(true),
        Some(v) if matches!(v.as_str(), "false" | "0" | "no" | "off") => Ok(false),
        Some(v) => Err(anyhow!("Invalid value for {key}: {v:?} (expected true or false)")),
        None => Ok(default),
    }
}

pub fn download_config(lookup: &EnvLookup, default_timeout: Duration) -> Result<DownloadConfig> {
    Ok(DownloadConfig {
        max_size: parse_var(lookup, "MAX_FILE_SIZE", DEFAULT_MAX_FILE_SIZE)?,
        timeout: Duration::from_secs(parse_var(
            lookup,
            "DOWNLOAD_TIMEOUT_SECS",
            default_timeout.as_secs(),
        )?),
        temp_dir: lookup("DOWNLOAD_DIR").map(PathBuf::from),
    })
}

#[derive(Clone, Debug)]
pub struct ServiceConfig {
    pub host: String,
    pub port: u16,
    pub debug: bool,
    pub database_url: String,
    pub database_max_connections: u32,
    pub download: DownloadConfig,
    pub whisper: WhisperConfig,
}

impl ServiceConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(&process_env())
    }

    pub fn from_lookup(lookup: &EnvLookup) -> Result<Self> {
        Ok(Self {
            host: lookup("HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
            port: parse_var(lookup, "PORT", 5000)?,
            debug: parse_flag(lookup, "DEBUG", false)?,
            database_url: lookup("DATABASE_URL")
                .unwrap_or_else(|| "sqlite://transcriptions.db".to_string()),
            database_max_connections: parse_var(lookup, "DATABASE_MAX_CONNECTIONS", 5)?,
            download: download_config(lookup, DEFAULT_DOWNLOAD_TIMEOUT)?,
            whisper: WhisperConfig::from_lookup(lookup)?,
        })
    }

    /// Default log filter when `RUST_LOG` is unset.
    pub fn log_level(&self) -> &'static str {
        if self.debug { "debug" } else { "info" }
    }
}

#[derive(Debug)]
pub struct ClientConfig {
    pub server_url: String,
    pub audio_url: String,
    pub user_id: Option<String>,
    pub timeout: Duration,
}
