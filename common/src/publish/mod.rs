// Outbound publishers for dispatched feed items

pub mod channel;
pub mod tweet;

use crate::errors::PublishError;
use crate::models::CanonicalItem;
use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;

pub use channel::ChannelPublisher;
pub use tweet::TweetPublisher;

/// A destination a dispatched item is published to
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ItemPublisher: Send + Sync {
    /// Short name used in logs and metrics
    fn name(&self) -> &str;

    async fn publish(&self, item: &CanonicalItem) -> Result<(), PublishError>;
}

/// Shared reqwest client construction for publishers
pub(crate) fn build_client(target: &str, timeout_seconds: u64) -> Result<Client, PublishError> {
    Client::builder()
        .timeout(Duration::from_secs(timeout_seconds))
        .build()
        .map_err(|e| PublishError::Transport {
            target: target.to_string(),
            reason: format!("Failed to create HTTP client: {}", e),
        })
}
