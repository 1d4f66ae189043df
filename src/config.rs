use std::env;
use std::net::IpAddr;
use std::time::Duration;

use dotenvy::dotenv;
use ipnet::IpNet;
use thiserror::Error;

pub const DEFAULT_BASE_URL: &str = "https://api.vandar.io";
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_BUSINESS: &str = "business";

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("api key is required")]
    MissingApiKey,

    #[error("base url is required")]
    MissingBaseUrl,

    #[error("base url must be an absolute http(s) url: {0}")]
    InvalidBaseUrl(String),

    #[error("callback url is required")]
    MissingCallbackUrl,

    #[error("timeout must be greater than 0")]
    InvalidTimeout,

    #[error("invalid rate limit '{0}', expected <limit>/<window_secs>")]
    InvalidRateLimit(String),

    #[error("invalid allow-list entry '{0}'")]
    InvalidAllowListEntry(String),

    #[error("invalid trusted proxy depth '{0}'")]
    InvalidProxyDepth(String),
}

/// Settings for talking to the payment gateway.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub api_key: String,
    pub base_url: String,
    pub sandbox_mode: bool,
    pub timeout_secs: u64,
    pub callback_url: String,
    /// Business slug used to build refund paths.
    pub business: String,
}

impl GatewayConfig {
    pub fn new(api_key: impl Into<String>, callback_url: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            sandbox_mode: true,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            callback_url: callback_url.into(),
            business: DEFAULT_BUSINESS.to_string(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.api_key.trim().is_empty() {
            return Err(ConfigError::MissingApiKey);
        }

        if self.base_url.trim().is_empty() {
            return Err(ConfigError::MissingBaseUrl);
        }

        match url::Url::parse(&self.base_url) {
            Ok(url) if matches!(url.scheme(), "http" | "https") && url.has_host() => {}
            _ => return Err(ConfigError::InvalidBaseUrl(self.base_url.clone())),
        }

        if self.callback_url.trim().is_empty() {
            return Err(ConfigError::MissingCallbackUrl);
        }

        if self.timeout_secs == 0 {
            return Err(ConfigError::InvalidTimeout);
        }

        Ok(())
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AllowedIps {
    Any,
    Cidrs(Vec<IpNet>),
}

/// Which `X-Forwarded-For` entry identifies the caller.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ForwardedFor {
    /// First entry, as supplied by the caller.
    #[default]
    FirstEntry,
    /// Entry written by the outermost of `n` trusted proxies, counted from the right.
    /// Chains shorter than that fall back to the socket address.
    TrustedProxies(usize),
}

/// Fixed-window limit for a single endpoint.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RateLimit {
    pub limit: u32,
    pub window: Duration,
}

impl RateLimit {
    pub const fn per_window(limit: u32, window_secs: u64) -> Self {
        Self {
            limit,
            window: Duration::from_secs(window_secs),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RateLimits {
    pub init: RateLimit,
    pub verify: RateLimit,
    pub status: RateLimit,
    pub refund: RateLimit,
}

impl Default for RateLimits {
    fn default() -> Self {
        Self {
            init: RateLimit::per_window(10, 60),
            verify: RateLimit::per_window(10, 60),
            status: RateLimit::per_window(20, 60),
            refund: RateLimit::per_window(5, 60),
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub server_port: u16,
    pub gateway: GatewayConfig,
    pub allowed_ips: AllowedIps,
    pub forwarded_for: ForwardedFor,
    pub rate_limits: RateLimits,
    pub log_format: LogFormat,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenv().ok(); // Load .env file if present

        let gateway = GatewayConfig {
            api_key: env::var("VANDAR_API_KEY").unwrap_or_default(),
            base_url: env::var("VANDAR_BASE_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.to_string()),
            sandbox_mode: env::var("VANDAR_SANDBOX")
                .unwrap_or_else(|_| "true".to_string())
                .parse()?,
            timeout_secs: env::var("VANDAR_TIMEOUT_SECS")
                .unwrap_or_else(|_| DEFAULT_TIMEOUT_SECS.to_string())
                .parse()?,
            callback_url: env::var("VANDAR_CALLBACK_URL").unwrap_or_default(),
            business: env::var("VANDAR_BUSINESS").unwrap_or_else(|_| DEFAULT_BUSINESS.to_string()),
        };
        gateway.validate()?;

        let defaults = RateLimits::default();
        let rate_limits = RateLimits {
            init: rate_limit_from_env("RATE_LIMIT_INIT", defaults.init)?,
            verify: rate_limit_from_env("RATE_LIMIT_VERIFY", defaults.verify)?,
            status: rate_limit_from_env("RATE_LIMIT_STATUS", defaults.status)?,
            refund: rate_limit_from_env("RATE_LIMIT_REFUND", defaults.refund)?,
        };

        let log_format = match env::var("LOG_FORMAT").as_deref() {
            Ok("json") => LogFormat::Json,
            _ => LogFormat::Pretty,
        };

        Ok(Config {
            server_port: env::var("SERVER_PORT")
                .unwrap_or_else(|_| "3000".to_string())
                .parse()?,
            gateway,
            allowed_ips: parse_allowed_ips(&env::var("ALLOWED_IPS").unwrap_or_default())?,
            forwarded_for: parse_forwarded_for(&env::var("TRUSTED_PROXY_DEPTH").unwrap_or_default())?,
            rate_limits,
            log_format,
        })
    }
}

fn rate_limit_from_env(key: &str, default: RateLimit) -> Result<RateLimit, ConfigError> {
    match env::var(key) {
        Ok(raw) if !raw.trim().is_empty() => parse_rate_limit(&raw),
        _ => Ok(default),
    }
}

pub fn parse_rate_limit(raw: &str) -> Result<RateLimit, ConfigError> {
    let invalid = || ConfigError::InvalidRateLimit(raw.to_string());

    let (limit, window) = raw.trim().split_once('/').ok_or_else(invalid)?;
    let limit: u32 = limit.trim().parse().map_err(|_| invalid())?;
    let window_secs: u64 = window.trim().parse().map_err(|_| invalid())?;

    if limit == 0 || window_secs == 0 {
        return Err(invalid());
    }

    Ok(RateLimit::per_window(limit, window_secs))
}

/// An empty list (or `*`) leaves callbacks unrestricted.
pub fn parse_allowed_ips(raw: &str) -> Result<AllowedIps, ConfigError> {
    let value = raw.trim();
    if value.is_empty() || value == "*" {
        return Ok(AllowedIps::Any);
    }

    let cidrs = value
        .split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(parse_allow_list_entry)
        .collect::<Result<Vec<_>, _>>()?;

    if cidrs.is_empty() {
        return Ok(AllowedIps::Any);
    }

    Ok(AllowedIps::Cidrs(cidrs))
}

/// Unset keeps the first-entry rule; a number switches to trusted-proxy counting.
pub fn parse_forwarded_for(raw: &str) -> Result<ForwardedFor, ConfigError> {
    let value = raw.trim();
    if value.is_empty() {
        return Ok(ForwardedFor::FirstEntry);
    }

    value
        .parse::<usize>()
        .map(ForwardedFor::TrustedProxies)
        .map_err(|_| ConfigError::InvalidProxyDepth(value.to_string()))
}

fn parse_allow_list_entry(entry: &str) -> Result<IpNet, ConfigError> {
    if let Ok(net) = entry.parse::<IpNet>() {
        return Ok(net);
    }

    entry
        .parse::<IpAddr>()
        .map(IpNet::from)
        .map_err(|_| ConfigError::InvalidAllowListEntry(entry.to_string()))
}
