// src/config.rs
// Process configuration, read from the environment (and .env via dotenv)

use std::time::Duration;

use serde::Serialize;
use tracing::{debug, info};

use crate::errors::ConfigError;

pub const DEFAULT_EXCHANGE_BASE_URL: &str = "https://api1.binance.com";

#[derive(Debug, Clone, Serialize)]
pub struct HttpPolicy {
    pub timeout: Duration,
    pub retries: u32,
    pub retry_wait: Duration,
}

impl Default for HttpPolicy {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(10),
            retries: 3,
            retry_wait: Duration::from_secs(2),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct AppConfig {
    pub ai_endpoint: String,
    pub ext_endpoint: String,
    pub port: u16,
    pub proxy_url: Option<String>,
    pub ws_proxy_url: Option<String>,
    pub report_dir: String,
    pub static_dir: Option<String>,
    pub exchange_base_url: String,
    pub http: HttpPolicy,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            ai_endpoint: crate::analysis::MANUAL_ENDPOINT.to_string(),
            ext_endpoint: String::new(),
            port: 8080,
            proxy_url: None,
            ws_proxy_url: None,
            report_dir: "reports".to_string(),
            static_dir: None,
            exchange_base_url: DEFAULT_EXCHANGE_BASE_URL.to_string(),
            http: HttpPolicy::default(),
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds a config from any key lookup. Blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        let defaults = Self::default();

        let proxy_url = get("PROXY_URL");
        if let Some(proxy) = &proxy_url {
            validate_proxy(proxy)?;
        }
        let ws_proxy_url = get("WS_PROXY_URL");
        if let Some(proxy) = &ws_proxy_url {
            validate_proxy(proxy)?;
        }

        let config = Self {
            ai_endpoint: get("AI_ENDPOINT").unwrap_or(defaults.ai_endpoint),
            ext_endpoint: get("EXT_ENDPOINT").unwrap_or_default(),
            port: parse_number("PORT", get("PORT"), defaults.port)?,
            proxy_url,
            ws_proxy_url,
            report_dir: get("REPORT_DIR").unwrap_or(defaults.report_dir),
            static_dir: get("STATIC_DIR"),
            exchange_base_url: get("EXCHANGE_BASE_URL")
                .map(|url| url.trim_end_matches('/').to_string())
                .unwrap_or(defaults.exchange_base_url),
            http: HttpPolicy {
                timeout: Duration::from_secs(parse_number(
                    "HTTP_TIMEOUT_SECS",
                    get("HTTP_TIMEOUT_SECS"),
                    defaults.http.timeout.as_secs(),
                )?),
                retries: parse_number(
                    "HTTP_RETRY_COUNT",
                    get("HTTP_RETRY_COUNT"),
                    defaults.http.retries,
                )?,
                retry_wait: Duration::from_secs(parse_number(
                    "HTTP_RETRY_WAIT_SECS",
                    get("HTTP_RETRY_WAIT_SECS"),
                    defaults.http.retry_wait.as_secs(),
                )?),
            },
        };

        debug!("Loaded configuration: {:?}", config);
        Ok(config)
    }

    pub fn log_summary(&self) {
        info!("⚙️  Configuration:");
        info!("   🤖 AI endpoint: {}", self.ai_endpoint);
        info!("   🌐 Port: {}", self.port);
        info!("   📈 Exchange: {}", self.exchange_base_url);
        info!("   📁 Report dir: {}", self.report_dir);
        info!(
            "   🗂️ Static dir: {}",
            self.static_dir.as_deref().unwrap_or("none")
        );
        info!(
            "   🔀 HTTP proxy: {}",
            self.proxy_url.as_deref().unwrap_or("none")
        );
        // Carried for completeness; nothing opens a websocket.
        info!(
            "   🔀 WS proxy: {}",
            self.ws_proxy_url.as_deref().unwrap_or("none")
        );
        info!(
            "   ⏱️ HTTP timeout {:?}, {} retries every {:?}",
            self.http.timeout, self.http.retries, self.http.retry_wait
        );
    }
}

fn parse_number<T: std::str::FromStr>(
    key: &'static str,
    raw: Option<String>,
    default: T,
) -> Result<T, ConfigError> {
    match raw {
        None => Ok(default),
        Some(value) => value
            .parse::<T>()
            .map_err(|_| ConfigError::InvalidNumber { key, value }),
    }
}

fn validate_proxy(raw: &str) -> Result<(), ConfigError> {
    let parsed = url::Url::parse(raw).map_err(|e| ConfigError::InvalidProxy {
        url: raw.to_string(),
        reason: e.to_string(),
    })?;
    if parsed.host_str().is_none() {
        return Err(ConfigError::InvalidProxy {
            url: raw.to_string(),
            reason: "missing host".to_string(),
        });
    }
    Ok(())
}
