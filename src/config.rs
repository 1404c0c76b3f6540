//! Process configuration, loaded from the environment (and an optional
//! `.env` file via `dotenvy`), following the teacher's `dotenv`-based
//! startup pattern. Missing mandatory fields are a configuration error,
//! which `main` turns into a non-zero exit (spec §6).

use crate::error::ProxyError;

#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub mount_path: String,

    pub auth_username: String,
    pub auth_password: String,

    pub backend_url: String,
    pub backend_username: Option<String>,
    pub backend_password: Option<String>,

    pub metadata_cache_size: usize,
    pub metadata_cache_ttl_secs: u64,

    pub file_max_size: u64,

    pub http_client_timeout_secs: u64,

    pub enable_file_logging: bool,
    pub log_level: String,
    pub log_file: String,
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> Result<T, ProxyError> {
    match std::env::var(key) {
        Ok(v) => v
            .parse::<T>()
            .map_err(|_| ProxyError::Config(format!("{key} is not a valid value: {v}"))),
        Err(_) => Ok(default),
    }
}

impl Config {
    /// Loads configuration from the process environment. Call
    /// `dotenvy::dotenv()` before this (see `main.rs`) to pick up a `.env`
    /// file; this function never touches the filesystem itself.
    pub fn from_env() -> Result<Self, ProxyError> {
        let backend_url = std::env::var("BACKEND_URL")
            .map_err(|_| ProxyError::Config("BACKEND_URL must be set".into()))?;
        if backend_url.trim().is_empty() {
            return Err(ProxyError::Config("BACKEND_URL must not be empty".into()));
        }

        let mut mount_path = env_or("MOUNT_PATH", "/dav/");
        if !mount_path.starts_with('/') {
            mount_path = format!("/{mount_path}");
        }
        if !mount_path.ends_with('/') {
            mount_path.push('/');
        }

        Ok(Config {
            host: env_or("HOST", "0.0.0.0"),
            port: env_parse("PORT", 8080u16)?,
            mount_path,
            auth_username: env_or("AUTH_USERNAME", "user"),
            auth_password: env_or("AUTH_PASSWORD", "password"),
            backend_url: backend_url.trim_end_matches('/').to_string(),
            backend_username: std::env::var("BACKEND_USERNAME").ok(),
            backend_password: std::env::var("BACKEND_PASSWORD").ok(),
            metadata_cache_size: env_parse("METADATA_CACHE_SIZE", 2000usize)?,
            metadata_cache_ttl_secs: env_parse("METADATA_CACHE_TTL", 60u64)?,
            file_max_size: env_parse("FILE_MAX_SIZE", 100 * 1024 * 1024u64)?,
            http_client_timeout_secs: env_parse("HTTP_CLIENT_TIMEOUT_SECS", 10u64)?,
            enable_file_logging: env_parse("ENABLE_FILE_LOGGING", false)?,
            log_level: env_or("LOG_LEVEL", "info"),
            log_file: env_or("LOG_FILE", "webdav_proxy.log"),
        })
    }
}
