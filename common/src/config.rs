// Configuration management with layered configuration (file, env)
// Secrets and storage paths are injected through Settings, never read ad hoc

use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Main settings structure containing all configuration options
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    pub minio: MinioConfig,
    pub feed: FeedConfig,
    pub tweet: TweetConfig,
    pub channel: ChannelConfig,
    #[serde(default)]
    pub worker: WorkerConfig,
    pub observability: ObservabilityConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MinioConfig {
    pub endpoint: String,
    pub access_key: String,
    pub secret_key: String,
    pub bucket: String,
    pub region: String,
}

/// Storage keys for the active queue and the refill snapshot
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedConfig {
    pub active_path: String,
    pub snapshot_path: String,
    #[serde(default = "default_max_refill_attempts")]
    pub max_refill_attempts: u32,
}

fn default_max_refill_attempts() -> u32 {
    1
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TweetConfig {
    pub endpoint: String,
    pub consumer_key: String,
    pub consumer_secret: String,
    pub access_token_key: String,
    pub access_token_secret: String,
    /// Signing secret for the per-invocation token
    pub app_secret: String,
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelConfig {
    pub api_base: String,
    pub bot_token: String,
    pub channel_id: String,
    /// Host the item link is rewritten onto before posting
    pub link_host: String,
    pub link_path_prefix: String,
    pub link_text: String,
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,
}

fn default_timeout_seconds() -> u64 {
    30
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerConfig {
    /// Cron expression (seconds precision). Unset means run once and exit.
    #[serde(default)]
    pub schedule: Option<String>,
    #[serde(default = "default_timezone")]
    pub timezone: String,
}

fn default_timezone() -> String {
    "UTC".to_string()
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            schedule: None,
            timezone: default_timezone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    pub log_level: String,
    #[serde(default)]
    pub metrics_port: Option<u16>,
    #[serde(default)]
    pub tracing_endpoint: Option<String>,
}

impl Settings {
    /// Load configuration with layered precedence: defaults → file → env
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from_path("config")
    }

    /// Load configuration from a specific path
    pub fn load_from_path<P: AsRef<Path>>(config_dir: P) -> Result<Self, ConfigError> {
        let config_dir = config_dir.as_ref();

        let builder = Config::builder()
            // Start with default configuration
            .add_source(File::from(config_dir.join("default.toml")).required(false))
            // Add local configuration (not committed to git)
            .add_source(File::from(config_dir.join("local.toml")).required(false))
            // Add environment-specific configuration
            .add_source(
                Environment::with_prefix("APP")
                    .separator("__")
                    .try_parsing(true),
            );

        let config = builder.build()?;
        config.try_deserialize()
    }

    /// Validate configuration settings
    pub fn validate(&self) -> Result<(), String> {
        // Validate MinIO config
        if self.minio.endpoint.is_empty() {
            return Err("MinIO endpoint cannot be empty".to_string());
        }
        if self.minio.bucket.is_empty() {
            return Err("MinIO bucket cannot be empty".to_string());
        }

        // Validate feed config
        if self.feed.active_path.is_empty() {
            return Err("Feed active_path cannot be empty".to_string());
        }
        if self.feed.snapshot_path.is_empty() {
            return Err("Feed snapshot_path cannot be empty".to_string());
        }
        if self.feed.active_path == self.feed.snapshot_path {
            return Err("Feed active_path and snapshot_path must differ".to_string());
        }

        // Validate tweet config
        if self.tweet.endpoint.is_empty() {
            return Err("Tweet endpoint cannot be empty".to_string());
        }
        for (name, value) in [
            ("consumer_key", &self.tweet.consumer_key),
            ("consumer_secret", &self.tweet.consumer_secret),
            ("access_token_key", &self.tweet.access_token_key),
            ("access_token_secret", &self.tweet.access_token_secret),
        ] {
            if value.is_empty() {
                return Err(format!("Tweet {} cannot be empty", name));
            }
        }
        if self.tweet.app_secret.is_empty() {
            return Err("Tweet app_secret cannot be empty".to_string());
        }
        if self.tweet.timeout_seconds == 0 {
            return Err("Tweet timeout_seconds must be greater than 0".to_string());
        }

        // Validate channel config
        if self.channel.api_base.is_empty() {
            return Err("Channel api_base cannot be empty".to_string());
        }
        if self.channel.bot_token.is_empty() {
            return Err("Channel bot_token cannot be empty".to_string());
        }
        if self.channel.channel_id.is_empty() {
            return Err("Channel channel_id cannot be empty".to_string());
        }
        if self.channel.link_host.is_empty() {
            return Err("Channel link_host cannot be empty".to_string());
        }

        // Validate worker config
        if let Some(expression) = &self.worker.schedule {
            crate::schedule::parse_cron_expression(expression).map_err(|e| e.to_string())?;
        }
        crate::schedule::parse_timezone(&self.worker.timezone).map_err(|e| e.to_string())?;

        Ok(())
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            minio: MinioConfig {
                endpoint: "http://localhost:9000".to_string(),
                access_key: "minioadmin".to_string(),
                secret_key: "minioadmin".to_string(),
                bucket: "feeds".to_string(),
                region: "us-east-1".to_string(),
            },
            feed: FeedConfig {
                active_path: "feeds/active.json".to_string(),
                snapshot_path: "feeds/feeds.json".to_string(),
                max_refill_attempts: default_max_refill_attempts(),
            },
            tweet: TweetConfig {
                endpoint: "https://fmd-tweets.netlify.com/.netlify/functions/tweet".to_string(),
                consumer_key: "change-me-in-production".to_string(),
                consumer_secret: "change-me-in-production".to_string(),
                access_token_key: "change-me-in-production".to_string(),
                access_token_secret: "change-me-in-production".to_string(),
                app_secret: "change-me-in-production".to_string(),
                timeout_seconds: default_timeout_seconds(),
            },
            channel: ChannelConfig {
                api_base: "https://api.telegram.org".to_string(),
                bot_token: "change-me-in-production".to_string(),
                channel_id: "@findmydeals".to_string(),
                link_host: "findmydeals.tech".to_string(),
                link_path_prefix: "/amazon".to_string(),
                link_text: "https://amazon.in/dealoftheday".to_string(),
                timeout_seconds: default_timeout_seconds(),
            },
            worker: WorkerConfig::default(),
            observability: ObservabilityConfig {
                log_level: "info".to_string(),
                metrics_port: None,
                tracing_endpoint: None,
            },
        }
    }
}
