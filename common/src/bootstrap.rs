// Bootstrap utilities for the worker binary
// Wires Settings into storage, publishers and the dispatcher

use crate::config::Settings;
use crate::pipeline::Dispatcher;
use crate::publish::{ChannelPublisher, ItemPublisher, TweetPublisher};
use crate::schedule::DispatchSchedule;
use crate::storage::{FeedStore, MinioClient, ObjectFeedStore};
use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::{info, warn};

/// Initialize the object-storage backed feed store
///
/// A failing health check is logged but not fatal: the first dispatch will
/// surface a read error with the real cause.
#[tracing::instrument(skip(settings))]
pub async fn init_feed_store(settings: &Settings) -> Result<Arc<dyn FeedStore>> {
    info!("Initializing feed store");

    let client = MinioClient::new(&settings.minio)
        .await
        .context("Failed to initialize MinIO client")?;

    if let Err(e) = client.health_check().await {
        warn!(error = %e, "MinIO health check failed at startup");
    }

    info!(
        active_path = %settings.feed.active_path,
        snapshot_path = %settings.feed.snapshot_path,
        "Feed store initialized"
    );
    Ok(Arc::new(ObjectFeedStore::new(client)))
}

/// Build the tweet and channel publishers
pub fn init_publishers(
    settings: &Settings,
) -> Result<(Arc<dyn ItemPublisher>, Arc<dyn ItemPublisher>)> {
    let tweet = TweetPublisher::new(&settings.tweet).context("Failed to build tweet publisher")?;
    let channel =
        ChannelPublisher::new(&settings.channel).context("Failed to build channel publisher")?;

    info!(tweet_endpoint = %settings.tweet.endpoint, "Publishers initialized");
    Ok((Arc::new(tweet), Arc::new(channel)))
}

/// Build a dispatcher wired to object storage and the HTTP publishers
#[tracing::instrument(skip(settings))]
pub async fn init_dispatcher(settings: &Settings) -> Result<Arc<Dispatcher>> {
    let store = init_feed_store(settings).await?;
    let (tweet, channel) = init_publishers(settings)?;

    Ok(Arc::new(Dispatcher::new(
        &settings.feed,
        store,
        tweet,
        channel,
    )))
}

/// Parse the configured daemon schedule, if any
pub fn init_schedule(settings: &Settings) -> Result<Option<DispatchSchedule>> {
    settings
        .worker
        .schedule
        .as_deref()
        .map(|expression| {
            DispatchSchedule::new(expression, &settings.worker.timezone)
                .context("Invalid worker schedule")
        })
        .transpose()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_schedule_absent_means_run_once() {
        let settings = Settings::default();
        assert!(init_schedule(&settings).unwrap().is_none());
    }

    #[test]
    fn test_init_schedule_parses_expression() {
        let mut settings = Settings::default();
        settings.worker.schedule = Some("0 0 */2 * * *".to_string());
        let schedule = init_schedule(&settings).unwrap().unwrap();
        assert_eq!(schedule.expression(), "0 0 */2 * * *");
    }

    #[test]
    fn test_init_publishers_from_defaults() {
        let settings = Settings::default();
        let (tweet, channel) = init_publishers(&settings).unwrap();
        assert_eq!(tweet.name(), "tweet");
        assert_eq!(channel.name(), "channel");
    }
}
