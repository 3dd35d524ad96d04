use anyhow::Context;
use ipnet::IpNet;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub database: DatabaseConfig,
    pub api_server: ServerConfig,
    pub auth: AuthConfig,
    pub analytics: AnalyticsConfig,
    pub client_ip: ClientIpConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub backend: DatabaseBackend,
    pub url: String,
    pub max_connections: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DatabaseBackend {
    Sqlite,
    Postgres,
    Memory,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthMode {
    None,
    ApiKey,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    pub mode: AuthMode,
    #[serde(default)]
    pub api_keys: Vec<String>,
}

/// How the recorder persists the next analytics state
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WriteMode {
    /// Unconditional replace; concurrent recordings may lose updates
    #[default]
    LastWriteWins,
    /// Save only if the revision loaded is still current, retrying otherwise
    CompareAndSwap,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalyticsConfig {
    pub dedup_window_mins: i64,
    pub history_limit: usize,
    pub recent_limit: usize,
    pub daily_window_days: i64,
    pub write_mode: WriteMode,
    pub cas_max_retries: u32,
}

/// Longest accepted dedup lookback (one week)
pub const MAX_DEDUP_WINDOW_MINS: i64 = 7 * 24 * 60;
/// Longest accepted daily series window (ten years)
pub const MAX_DAILY_WINDOW_DAYS: i64 = 3650;

impl AnalyticsConfig {
    /// Reject window settings that are non-positive or out of range
    pub fn validate(&self) -> anyhow::Result<()> {
        if !(1..=MAX_DEDUP_WINDOW_MINS).contains(&self.dedup_window_mins) {
            anyhow::bail!(
                "ANALYTICS_DEDUP_WINDOW_MINS must be between 1 and {MAX_DEDUP_WINDOW_MINS}, got {}",
                self.dedup_window_mins
            );
        }
        if !(1..=MAX_DAILY_WINDOW_DAYS).contains(&self.daily_window_days) {
            anyhow::bail!(
                "ANALYTICS_DAILY_WINDOW_DAYS must be between 1 and {MAX_DAILY_WINDOW_DAYS}, got {}",
                self.daily_window_days
            );
        }
        if self.history_limit == 0 {
            anyhow::bail!("ANALYTICS_HISTORY_LIMIT must be at least 1");
        }
        Ok(())
    }
}

impl Default for AnalyticsConfig {
    fn default() -> Self {
        Self {
            dedup_window_mins: 60,
            history_limit: 50,
            recent_limit: 10,
            daily_window_days: 30,
            write_mode: WriteMode::LastWriteWins,
            cas_max_retries: 3,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrustedProxyMode {
    /// Use the socket peer address only
    #[default]
    None,
    /// Forwarded / X-Forwarded-For with right-to-left trust validation
    Standard,
    /// CF-Connecting-IP
    Cloudflare,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClientIpConfig {
    pub trusted_proxy_mode: TrustedProxyMode,
    #[serde(default)]
    pub trusted_proxies: Vec<IpNet>,
    #[serde(default)]
    pub num_trusted_proxies: Option<usize>,
    #[serde(default)]
    pub ip_anonymization: bool,
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_flag(key: &str) -> bool {
    std::env::var(key)
        .map(|v| matches!(v.to_lowercase().as_str(), "true" | "1" | "yes"))
        .unwrap_or(false)
}

fn parse_env<T>(key: &str, default: &str) -> anyhow::Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    env_or(key, default)
        .parse::<T>()
        .with_context(|| format!("{key} is not a valid value"))
}

fn split_list(raw: &str) -> impl Iterator<Item = &str> {
    raw.split(',').map(str::trim).filter(|s| !s.is_empty())
}

impl WriteMode {
    fn from_env_value(value: &str) -> anyhow::Result<Self> {
        match value.to_lowercase().as_str() {
            "last_write_wins" | "lww" => Ok(WriteMode::LastWriteWins),
            "compare_and_swap" | "cas" => Ok(WriteMode::CompareAndSwap),
            other => anyhow::bail!(
                "Unknown ANALYTICS_WRITE_MODE '{other}'. Supported values: last_write_wins, compare_and_swap"
            ),
        }
    }
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let backend = match env_or("DATABASE_BACKEND", "sqlite").to_lowercase().as_str() {
            "postgres" | "postgresql" => DatabaseBackend::Postgres,
            "memory" => DatabaseBackend::Memory,
            _ => DatabaseBackend::Sqlite,
        };

        let database_url = env_or("DATABASE_URL", "sqlite://./hearth.db?mode=rwc");
        let max_connections = parse_env::<u32>("DATABASE_MAX_CONNECTIONS", "5")?;

        let api_host = env_or("API_HOST", "127.0.0.1");
        let api_port = parse_env::<u16>("API_PORT", "8080")?;

        let auth_mode = match env_or("AUTH_MODE", "none").to_lowercase().as_str() {
            "none" => AuthMode::None,
            "api_key" | "apikey" => AuthMode::ApiKey,
            other => {
                tracing::warn!(
                    "Unknown AUTH_MODE '{other}', falling back to 'none'. Supported values: none, api_key"
                );
                AuthMode::None
            }
        };

        let api_keys: Vec<String> = split_list(&env_or("API_KEYS", ""))
            .map(str::to_string)
            .collect();
        if auth_mode == AuthMode::ApiKey && api_keys.is_empty() {
            anyhow::bail!("API_KEYS must be set when AUTH_MODE=api_key");
        }

        let analytics = AnalyticsConfig {
            dedup_window_mins: parse_env("ANALYTICS_DEDUP_WINDOW_MINS", "60")?,
            history_limit: parse_env("ANALYTICS_HISTORY_LIMIT", "50")?,
            recent_limit: parse_env("ANALYTICS_RECENT_LIMIT", "10")?,
            daily_window_days: parse_env("ANALYTICS_DAILY_WINDOW_DAYS", "30")?,
            write_mode: WriteMode::from_env_value(&env_or(
                "ANALYTICS_WRITE_MODE",
                "last_write_wins",
            ))?,
            cas_max_retries: parse_env("ANALYTICS_CAS_MAX_RETRIES", "3")?,
        };
        analytics.validate()?;

        let trusted_proxy_mode = match env_or("TRUSTED_PROXY_MODE", "none")
            .to_lowercase()
            .as_str()
        {
            "standard" => TrustedProxyMode::Standard,
            "cloudflare" => TrustedProxyMode::Cloudflare,
            "none" => TrustedProxyMode::None,
            other => {
                tracing::warn!(
                    "Unknown TRUSTED_PROXY_MODE '{other}', falling back to 'none'. Supported values: none, standard, cloudflare"
                );
                TrustedProxyMode::None
            }
        };

        let trusted_proxies = split_list(&env_or("TRUSTED_PROXIES", ""))
            .map(|cidr| {
                cidr.parse::<IpNet>()
                    .with_context(|| format!("TRUSTED_PROXIES entry '{cidr}' is not a valid CIDR"))
            })
            .collect::<anyhow::Result<Vec<_>>>()?;

        let num_trusted_proxies = std::env::var("NUM_TRUSTED_PROXIES")
            .ok()
            .map(|v| v.parse::<usize>())
            .transpose()
            .context("NUM_TRUSTED_PROXIES is not a valid value")?;

        Ok(Config {
            database: DatabaseConfig {
                backend,
                url: database_url,
                max_connections,
            },
            api_server: ServerConfig {
                host: api_host,
                port: api_port,
            },
            auth: AuthConfig {
                mode: auth_mode,
                api_keys,
            },
            analytics,
            client_ip: ClientIpConfig {
                trusted_proxy_mode,
                trusted_proxies,
                num_trusted_proxies,
                ip_anonymization: env_flag("IP_ANONYMIZATION"),
            },
        })
    }
}
