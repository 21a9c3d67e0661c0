use anyhow::{anyhow, Result};
use std::net::SocketAddr;
use std::str::FromStr;

const MIN_SECRET_KEY_LEN: usize = 32;
const MAX_SESSION_TTL_SECONDS: u64 = 10 * 365 * 24 * 60 * 60;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionBackend {
    Redis,
    Memory,
}

impl FromStr for SessionBackend {
    type Err = String;

    fn from_str(value: &str) -> std::result::Result<Self, Self::Err> {
        match value {
            "redis" => Ok(Self::Redis),
            "memory" => Ok(Self::Memory),
            other => Err(format!("unknown session backend `{}`", other)),
        }
    }
}

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub http_addr: String,
    pub app_mode: String,
    pub database_url: String,
    pub db_max_connections: u32,
    pub db_connect_timeout_seconds: u64,
    pub db_idle_timeout_seconds: u64,
    pub db_max_lifetime_seconds: u64,
    pub db_connect_attempts: u32,
    pub session_backend: SessionBackend,
    pub redis_url: String,
    pub secret_key: String,
    pub session_ttl_seconds: u64,
    pub allowed_hosts: Vec<String>,
    pub cors_allowed_origins: Vec<String>,
    pub csrf_trusted_origins: Vec<String>,
    pub session_cookie_secure: bool,
    pub csrf_cookie_secure: bool,
    pub page_size: u32,
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        let http_addr = env_or("HTTP_ADDR", "0.0.0.0:8000");
        let _parsed_http_addr = SocketAddr::from_str(&http_addr)
            .map_err(|err| anyhow!("invalid HTTP_ADDR: {}", err))?;

        let secret_key = env_or_err("SECRET_KEY")?;
        if secret_key.len() < MIN_SECRET_KEY_LEN {
            return Err(anyhow!(
                "invalid SECRET_KEY: expected at least {} bytes",
                MIN_SECRET_KEY_LEN
            ));
        }

        let page_size: u32 = env_or_parse("PAGE_SIZE", "10")?;
        if page_size == 0 {
            return Err(anyhow!("invalid PAGE_SIZE: must be positive"));
        }

        let session_ttl_seconds = session_ttl(env_or_parse("SESSION_TTL_SECONDS", "1209600")?)?;

        let default_origins = "http://localhost:3000,http://127.0.0.1:3000";

        Ok(Self {
            http_addr,
            app_mode: env_or("APP_MODE", "api"),
            database_url: env_or_err("DATABASE_URL")?,
            db_max_connections: env_or_parse("DB_MAX_CONNECTIONS", "10")?,
            db_connect_timeout_seconds: env_or_parse("DB_CONNECT_TIMEOUT_SECONDS", "5")?,
            db_idle_timeout_seconds: env_or_parse("DB_IDLE_TIMEOUT_SECONDS", "300")?,
            db_max_lifetime_seconds: env_or_parse("DB_MAX_LIFETIME_SECONDS", "1800")?,
            db_connect_attempts: env_or_parse("DB_CONNECT_ATTEMPTS", "30")?,
            session_backend: env_or_parse("SESSION_BACKEND", "redis")?,
            redis_url: env_or("REDIS_URL", "redis://127.0.0.1/"),
            secret_key,
            session_ttl_seconds,
            allowed_hosts: env_list("ALLOWED_HOSTS", "localhost,127.0.0.1"),
            cors_allowed_origins: env_origins("CORS_ALLOWED_ORIGINS", default_origins)?,
            csrf_trusted_origins: env_origins("CSRF_TRUSTED_ORIGINS", default_origins)?,
            session_cookie_secure: env_flag("SESSION_COOKIE_SECURE"),
            csrf_cookie_secure: env_flag("CSRF_COOKIE_SECURE"),
            page_size,
        })
    }
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_or_err(key: &str) -> Result<String> {
    std::env::var(key).map_err(|_| anyhow!("missing required env var: {}", key))
}

fn env_or_parse<T>(key: &str, default: &str) -> Result<T>
where
    T: FromStr,
    <T as FromStr>::Err: std::fmt::Display,
{
    let value = std::env::var(key).unwrap_or_else(|_| default.to_string());
    value
        .parse::<T>()
        .map_err(|err| anyhow!("invalid {}: {}", key, err))
}

/// Redis refuses `SET EX 0`; expiry timestamps and cookie max-age must not
/// overflow.
fn session_ttl(seconds: u64) -> Result<u64> {
    if seconds == 0 || seconds > MAX_SESSION_TTL_SECONDS {
        return Err(anyhow!(
            "invalid SESSION_TTL_SECONDS: must be between 1 and {}",
            MAX_SESSION_TTL_SECONDS
        ));
    }
    Ok(seconds)
}

fn env_flag(key: &str) -> bool {
    std::env::var(key)
        .map(|value| value.trim().eq_ignore_ascii_case("true"))
        .unwrap_or(false)
}

fn env_list(key: &str, default: &str) -> Vec<String> {
    split_list(&env_or(key, default))
}

/// Origins are normalized to `scheme://host[:port]` so they compare equal to
/// what browsers send in the `Origin` header.
fn env_origins(key: &str, default: &str) -> Result<Vec<String>> {
    split_list(&env_or(key, default))
        .into_iter()
        .map(|origin| {
            let parsed = url::Url::parse(&origin)
                .map_err(|err| anyhow!("invalid {}: `{}`: {}", key, origin, err))?;
            if parsed.host_str().is_none() {
                return Err(anyhow!("invalid {}: `{}` has no host", key, origin));
            }
            Ok(parsed.origin().ascii_serialization())
        })
        .collect()
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(str::to_string)
        .collect()
}
