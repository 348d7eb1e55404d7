use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::error::{GmailError, Result};

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub gmail: GmailConfig,
    #[serde(default)]
    pub analytics: AnalyticsConfig,
    #[serde(default)]
    pub large_emails: LargeEmailConfig,
    #[serde(default)]
    pub subscriptions: SubscriptionConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
    #[serde(default = "default_cors")]
    pub permissive_cors: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            permissive_cors: default_cors(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GmailConfig {
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent_requests: usize,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    #[serde(default = "default_list_limit")]
    pub list_limit: usize,
    #[serde(default = "default_page_size")]
    pub page_size: u32,
}

impl Default for GmailConfig {
    fn default() -> Self {
        Self {
            max_concurrent_requests: default_max_concurrent(),
            request_timeout_secs: default_request_timeout_secs(),
            list_limit: default_list_limit(),
            page_size: default_page_size(),
        }
    }
}

impl GmailConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalyticsConfig {
    #[serde(default = "default_analytics_window")]
    pub window: usize,
    #[serde(default = "default_top_senders")]
    pub top_senders: usize,
}

impl Default for AnalyticsConfig {
    fn default() -> Self {
        Self {
            window: default_analytics_window(),
            top_senders: default_top_senders(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LargeEmailConfig {
    #[serde(default = "default_min_size_mb")]
    pub default_min_size_mb: u64,
    #[serde(default = "default_large_limit")]
    pub limit: usize,
}

impl Default for LargeEmailConfig {
    fn default() -> Self {
        Self {
            default_min_size_mb: default_min_size_mb(),
            limit: default_large_limit(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubscriptionConfig {
    #[serde(default = "default_subscription_query")]
    pub query: String,
    #[serde(default = "default_scan_window")]
    pub scan_window: usize,
    #[serde(default = "default_unsubscribe_timeout_secs")]
    pub unsubscribe_timeout_secs: u64,
    /// Also POST to plain `http` one-click links (local testing only)
    #[serde(default)]
    pub allow_insecure_one_click: bool,
}

impl Default for SubscriptionConfig {
    fn default() -> Self {
        Self {
            query: default_subscription_query(),
            scan_window: default_scan_window(),
            unsubscribe_timeout_secs: default_unsubscribe_timeout_secs(),
            allow_insecure_one_click: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct LoggingConfig {
    #[serde(default)]
    pub json: bool,
}

fn default_bind() -> String {
    "127.0.0.1:3000".to_string()
}

fn default_cors() -> bool {
    true
}

fn default_max_concurrent() -> usize {
    40
}

fn default_request_timeout_secs() -> u64 {
    30
}

fn default_list_limit() -> usize {
    100
}

fn default_page_size() -> u32 {
    500
}

fn default_analytics_window() -> usize {
    500
}

fn default_top_senders() -> usize {
    50
}

fn default_min_size_mb() -> u64 {
    10
}

fn default_large_limit() -> usize {
    100
}

fn default_subscription_query() -> String {
    "unsubscribe".to_string()
}

fn default_scan_window() -> usize {
    200
}

fn default_unsubscribe_timeout_secs() -> u64 {
    15
}

impl Config {
    pub async fn load(path: &Path) -> Result<Self> {
        // If file doesn't exist, return default config with warning
        if !path.exists() {
            tracing::warn!("Config file not found at {:?}, using defaults", path);
            return Ok(Self::default());
        }

        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| GmailError::ConfigError(format!("Failed to read config file: {}", e)))?;

        let config: Self = toml::from_str(&content)
            .map_err(|e| GmailError::ConfigError(format!("Failed to parse config file: {}", e)))?;

        config.validate()?;

        tracing::info!("Loaded configuration from {:?}", path);
        Ok(config)
    }

    pub async fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await.map_err(|e| {
                    GmailError::ConfigError(format!("Failed to create config directory: {}", e))
                })?;
            }
        }

        let content = toml::to_string_pretty(self)
            .map_err(|e| GmailError::ConfigError(format!("Failed to serialize config: {}", e)))?;

        tokio::fs::write(path, content)
            .await
            .map_err(|e| GmailError::ConfigError(format!("Failed to write config file: {}", e)))?;

        tracing::info!("Saved configuration to {:?}", path);
        Ok(())
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if self.server.bind.trim().is_empty() {
            return Err(GmailError::ConfigError(
                "server.bind cannot be empty".to_string(),
            ));
        }

        // 1-50 keeps a single request under Gmail's per-user quota
        if self.gmail.max_concurrent_requests == 0 {
            return Err(GmailError::ConfigError(
                "gmail.max_concurrent_requests must be at least 1".to_string(),
            ));
        }
        if self.gmail.max_concurrent_requests > 50 {
            return Err(GmailError::ConfigError(
                "gmail.max_concurrent_requests cannot exceed 50".to_string(),
            ));
        }

        if self.gmail.request_timeout_secs == 0 {
            return Err(GmailError::ConfigError(
                "gmail.request_timeout_secs must be greater than 0".to_string(),
            ));
        }

        if self.gmail.list_limit == 0 {
            return Err(GmailError::ConfigError(
                "gmail.list_limit must be at least 1".to_string(),
            ));
        }

        if self.gmail.page_size == 0 || self.gmail.page_size > 500 {
            return Err(GmailError::ConfigError(
                "gmail.page_size must be between 1 and 500".to_string(),
            ));
        }

        if self.analytics.window == 0 {
            return Err(GmailError::ConfigError(
                "analytics.window must be at least 1".to_string(),
            ));
        }

        if self.analytics.top_senders == 0 {
            return Err(GmailError::ConfigError(
                "analytics.top_senders must be at least 1".to_string(),
            ));
        }

        if self.large_emails.default_min_size_mb == 0 {
            return Err(GmailError::ConfigError(
                "large_emails.default_min_size_mb must be at least 1".to_string(),
            ));
        }

        if self.large_emails.limit == 0 {
            return Err(GmailError::ConfigError(
                "large_emails.limit must be at least 1".to_string(),
            ));
        }

        if self.subscriptions.scan_window == 0 {
            return Err(GmailError::ConfigError(
                "subscriptions.scan_window must be at least 1".to_string(),
            ));
        }

        if self.subscriptions.unsubscribe_timeout_secs == 0 {
            return Err(GmailError::ConfigError(
                "subscriptions.unsubscribe_timeout_secs must be greater than 0".to_string(),
            ));
        }

        tracing::debug!("Configuration validation passed");
        Ok(())
    }

    /// Create an example configuration file
    pub async fn create_example(path: &Path) -> Result<()> {
        let config = Self::default();
        config.save(path).await
    }
}
