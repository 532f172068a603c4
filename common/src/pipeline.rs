// Feed dispatch pipeline
//
// One dispatch walks a fixed sequence of stages:
//
//   LoadActive → EnsureNonEmpty → Normalize → PopNext
//     → PublishTweet → PublishChannel → Persist
//
// Every stage except PublishChannel is fatal: its error aborts the dispatch
// and nothing after it runs. Nothing already done is rolled back.

use crate::config::FeedConfig;
use crate::errors::DispatchError;
use crate::models::{CanonicalItem, QueueDocument};
use crate::publish::ItemPublisher;
use crate::storage::FeedStore;
use crate::telemetry;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

const LOG_LABEL: &str = "[feed-dispatch]";

/// Pipeline stages in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    LoadActive,
    EnsureNonEmpty,
    Normalize,
    PopNext,
    PublishTweet,
    PublishChannel,
    Persist,
}

impl Stage {
    pub const ALL: [Stage; 7] = [
        Stage::LoadActive,
        Stage::EnsureNonEmpty,
        Stage::Normalize,
        Stage::PopNext,
        Stage::PublishTweet,
        Stage::PublishChannel,
        Stage::Persist,
    ];

    /// Whether a failure in this stage aborts the dispatch
    pub fn is_fatal(self) -> bool {
        !matches!(self, Stage::PublishChannel)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Stage::LoadActive => "load_active",
            Stage::EnsureNonEmpty => "ensure_nonempty",
            Stage::Normalize => "normalize",
            Stage::PopNext => "pop_next",
            Stage::PublishTweet => "publish_tweet",
            Stage::PublishChannel => "publish_channel",
            Stage::Persist => "persist",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of a successful dispatch
#[derive(Debug, Clone, PartialEq)]
pub struct DispatchReport {
    /// The item that was published and removed from the queue
    pub item: CanonicalItem,
    /// Number of snapshot refills performed before an item was found
    pub refills: u32,
    /// Whether the channel post went through
    pub channel_posted: bool,
    /// Items left in the active queue after persisting
    pub remaining: usize,
}

/// Runs the dispatch pipeline against a feed store and two publishers
pub struct Dispatcher {
    store: Arc<dyn FeedStore>,
    tweet: Arc<dyn ItemPublisher>,
    channel: Arc<dyn ItemPublisher>,
    active_path: String,
    snapshot_path: String,
    max_refill_attempts: u32,
    // Serializes dispatches issued through the same Dispatcher
    guard: Mutex<()>,
}

impl Dispatcher {
    pub fn new(
        config: &FeedConfig,
        store: Arc<dyn FeedStore>,
        tweet: Arc<dyn ItemPublisher>,
        channel: Arc<dyn ItemPublisher>,
    ) -> Self {
        Self {
            store,
            tweet,
            channel,
            active_path: config.active_path.clone(),
            snapshot_path: config.snapshot_path.clone(),
            max_refill_attempts: config.max_refill_attempts,
            guard: Mutex::new(()),
        }
    }

    /// Publish the next queued item and persist the shortened queue
    #[instrument(skip(self), fields(dispatch_id = %Uuid::new_v4(), active_path = %self.active_path))]
    pub async fn dispatch(&self) -> Result<DispatchReport, DispatchError> {
        let _guard = self.guard.lock().await;

        match self.run().await {
            Ok(report) => {
                info!(
                    title = ?report.item.title,
                    remaining = report.remaining,
                    refills = report.refills,
                    channel_posted = report.channel_posted,
                    "{} Dispatch succeeded",
                    LOG_LABEL
                );
                telemetry::record_dispatch_success();
                telemetry::update_queue_remaining(report.remaining);
                Ok(report)
            }
            Err(e) => {
                error!(error = %e, stage = %e.stage(), "{} Dispatch failed", LOG_LABEL);
                telemetry::record_dispatch_failure(e.stage());
                Err(e)
            }
        }
    }

    async fn run(&self) -> Result<DispatchReport, DispatchError> {
        let (raw, refills) = self.ensure_nonempty().await?;

        let mut queue = self.normalize(raw);
        let item = self.pop_next(&mut queue)?;

        self.publish_tweet(&item).await?;
        let channel_posted = self.publish_channel(&item).await;

        self.persist(&queue).await?;

        Ok(DispatchReport {
            item,
            refills,
            channel_posted,
            remaining: queue.len(),
        })
    }

    async fn load_active(&self) -> Result<QueueDocument<Value>, DispatchError> {
        let data = self
            .store
            .get(&self.active_path)
            .await
            .map_err(DispatchError::StorageRead)?;

        QueueDocument::from_slice(&data).map_err(|e| DispatchError::StorageRead(e.into()))
    }

    /// Load the active queue, refilling it from the snapshot while empty
    ///
    /// Refills are bounded by `max_refill_attempts`; an empty snapshot ends
    /// in `FeedExhausted` instead of looping.
    async fn ensure_nonempty(&self) -> Result<(QueueDocument<Value>, u32), DispatchError> {
        debug!("{} Checking active queue", LOG_LABEL);

        let mut refills = 0;
        loop {
            let queue = self.load_active().await?;
            if !queue.is_empty() {
                debug!(count = queue.len(), "{} Active queue has items", LOG_LABEL);
                return Ok((queue, refills));
            }

            if refills >= self.max_refill_attempts {
                warn!(
                    attempts = refills,
                    snapshot_path = %self.snapshot_path,
                    "{} Snapshot refill left the queue empty",
                    LOG_LABEL
                );
                return Err(DispatchError::FeedExhausted { attempts: refills });
            }

            info!(
                snapshot_path = %self.snapshot_path,
                "{} Active queue empty, refilling from snapshot",
                LOG_LABEL
            );
            self.store
                .copy(&self.snapshot_path, &self.active_path)
                .await
                .map_err(DispatchError::RefillCopy)?;
            telemetry::record_feed_refill();
            refills += 1;
        }
    }

    fn normalize(&self, raw: QueueDocument<Value>) -> QueueDocument<CanonicalItem> {
        debug!("{} Normalizing queue items", LOG_LABEL);
        raw.normalize()
    }

    fn pop_next(
        &self,
        queue: &mut QueueDocument<CanonicalItem>,
    ) -> Result<CanonicalItem, DispatchError> {
        queue.pop_next().ok_or(DispatchError::EmptyQueue)
    }

    async fn publish_tweet(&self, item: &CanonicalItem) -> Result<(), DispatchError> {
        debug!(publisher = self.tweet.name(), "{} Publishing next item", LOG_LABEL);
        self.tweet
            .publish(item)
            .await
            .map_err(DispatchError::TweetPublish)
    }

    /// Best-effort: failures are logged and reported as `false`
    async fn publish_channel(&self, item: &CanonicalItem) -> bool {
        match self.channel.publish(item).await {
            Ok(()) => true,
            Err(e) => {
                let err = DispatchError::ChannelPublish(e);
                warn!(
                    error = %err,
                    publisher = self.channel.name(),
                    "{} Channel post failed, continuing",
                    LOG_LABEL
                );
                telemetry::record_channel_failure();
                false
            }
        }
    }

    async fn persist(&self, queue: &QueueDocument<CanonicalItem>) -> Result<(), DispatchError> {
        let body = queue
            .to_vec()
            .map_err(|e| DispatchError::StorageWrite(e.into()))?;

        self.store
            .put(&self.active_path, &body)
            .await
            .map_err(DispatchError::StorageWrite)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::{PublishError, StorageError};
    use crate::publish::MockItemPublisher;
    use crate::storage::MockFeedStore;
    use mockall::predicate::eq;
    use serde_json::json;
    use std::sync::atomic::{AtomicBool, Ordering};

    fn feed_config() -> FeedConfig {
        FeedConfig {
            active_path: "active.json".to_string(),
            snapshot_path: "feeds.json".to_string(),
            max_refill_attempts: 1,
        }
    }

    fn publisher_ok(name: &'static str) -> MockItemPublisher {
        let mut publisher = MockItemPublisher::new();
        publisher.expect_name().return_const(name.to_string());
        publisher.expect_publish().returning(|_| Ok(()));
        publisher
    }

    fn publisher_failing(name: &'static str, status: u16) -> MockItemPublisher {
        let mut publisher = MockItemPublisher::new();
        publisher.expect_name().return_const(name.to_string());
        publisher.expect_publish().returning(move |_| {
            Err(PublishError::UnexpectedStatus {
                target: name.to_string(),
                status,
                body: String::new(),
            })
        });
        publisher
    }

    fn dispatcher(
        store: MockFeedStore,
        tweet: MockItemPublisher,
        channel: MockItemPublisher,
    ) -> Dispatcher {
        Dispatcher::new(
            &feed_config(),
            Arc::new(store),
            Arc::new(tweet),
            Arc::new(channel),
        )
    }

    fn deal_document() -> Vec<u8> {
        serde_json::to_vec(&json!({
            "items": [
                {"title": "Deal A", "link": "http://x.com/a", "image": "http://img/a.png"},
                {"title": "Deal B", "link": "http://x.com/b", "image": "http://img/b.png"}
            ]
        }))
        .unwrap()
    }

    #[test]
    fn test_only_channel_stage_is_non_fatal() {
        let non_fatal: Vec<Stage> = Stage::ALL.into_iter().filter(|s| !s.is_fatal()).collect();
        assert_eq!(non_fatal, vec![Stage::PublishChannel]);
    }

    #[tokio::test]
    async fn test_dispatch_pops_head_and_persists_rest() {
        let mut store = MockFeedStore::new();
        store
            .expect_get()
            .with(eq("active.json"))
            .returning(|_| Ok(deal_document()));
        store
            .expect_put()
            .withf(|path, body| {
                let written: Value = serde_json::from_slice(body).unwrap();
                path == "active.json"
                    && written
                        == json!({"items": [
                            {"title": "Deal B", "link": "http://x.com/b", "image": "http://img/b.png"}
                        ]})
            })
            .times(1)
            .returning(|_, _| Ok(()));

        let report = dispatcher(store, publisher_ok("tweet"), publisher_ok("channel"))
            .dispatch()
            .await
            .unwrap();

        assert_eq!(report.item.title.as_deref(), Some("Deal A"));
        assert_eq!(report.remaining, 1);
        assert_eq!(report.refills, 0);
        assert!(report.channel_posted);
    }

    #[tokio::test]
    async fn test_tweet_failure_skips_channel_and_persist() {
        let mut store = MockFeedStore::new();
        store.expect_get().returning(|_| Ok(deal_document()));
        store.expect_put().times(0);

        let mut channel = MockItemPublisher::new();
        channel.expect_publish().times(0);

        let result = dispatcher(store, publisher_failing("tweet", 500), channel)
            .dispatch()
            .await;

        assert!(matches!(result, Err(DispatchError::TweetPublish(_))));
    }

    #[tokio::test]
    async fn test_channel_failure_still_persists() {
        let mut store = MockFeedStore::new();
        store.expect_get().returning(|_| Ok(deal_document()));
        store.expect_put().times(1).returning(|_, _| Ok(()));

        let report = dispatcher(store, publisher_ok("tweet"), publisher_failing("channel", 400))
            .dispatch()
            .await
            .unwrap();

        assert!(!report.channel_posted);
        assert_eq!(report.remaining, 1);
    }

    #[tokio::test]
    async fn test_empty_active_refills_from_snapshot_before_pop() {
        let copied = Arc::new(AtomicBool::new(false));

        let mut store = MockFeedStore::new();
        let copied_on_get = copied.clone();
        store.expect_get().times(2).returning(move |_| {
            if copied_on_get.load(Ordering::SeqCst) {
                Ok(deal_document())
            } else {
                Ok(br#"{"items": []}"#.to_vec())
            }
        });
        let copied_on_copy = copied.clone();
        store
            .expect_copy()
            .with(eq("feeds.json"), eq("active.json"))
            .times(1)
            .returning(move |_, _| {
                copied_on_copy.store(true, Ordering::SeqCst);
                Ok(())
            });
        store.expect_put().times(1).returning(|_, _| Ok(()));

        let report = dispatcher(store, publisher_ok("tweet"), publisher_ok("channel"))
            .dispatch()
            .await
            .unwrap();

        assert_eq!(report.refills, 1);
        assert_eq!(report.item.title.as_deref(), Some("Deal A"));
    }

    #[tokio::test]
    async fn test_empty_snapshot_fails_without_looping() {
        let mut store = MockFeedStore::new();
        store
            .expect_get()
            .times(2)
            .returning(|_| Ok(br#"{"items": []}"#.to_vec()));
        store.expect_copy().times(1).returning(|_, _| Ok(()));
        store.expect_put().times(0);

        let mut tweet = MockItemPublisher::new();
        tweet.expect_publish().times(0);

        let result = dispatcher(store, tweet, MockItemPublisher::new())
            .dispatch()
            .await;

        assert!(matches!(
            result,
            Err(DispatchError::FeedExhausted { attempts: 1 })
        ));
    }

    #[tokio::test]
    async fn test_missing_active_document_is_read_error() {
        let mut store = MockFeedStore::new();
        store
            .expect_get()
            .returning(|path| Err(StorageError::NotFound(path.to_string())));
        store.expect_put().times(0);

        let result = dispatcher(store, MockItemPublisher::new(), MockItemPublisher::new())
            .dispatch()
            .await;

        let err = result.unwrap_err();
        assert!(matches!(err, DispatchError::StorageRead(StorageError::NotFound(_))));
        assert_eq!(err.stage(), Stage::LoadActive);
    }

    #[tokio::test]
    async fn test_malformed_active_document_is_read_error() {
        let mut store = MockFeedStore::new();
        store.expect_get().returning(|_| Ok(b"{not json".to_vec()));

        let result = dispatcher(store, MockItemPublisher::new(), MockItemPublisher::new())
            .dispatch()
            .await;

        assert!(matches!(
            result,
            Err(DispatchError::StorageRead(StorageError::InvalidJson(_)))
        ));
    }

    #[tokio::test]
    async fn test_persist_failure_is_reported_after_publishing() {
        let mut store = MockFeedStore::new();
        store.expect_get().returning(|_| Ok(deal_document()));
        store
            .expect_put()
            .returning(|_, _| Err(StorageError::MinioError("disk full".to_string())));

        let mut tweet = MockItemPublisher::new();
        tweet.expect_name().return_const("tweet".to_string());
        tweet.expect_publish().times(1).returning(|_| Ok(()));

        let result = dispatcher(store, tweet, publisher_ok("channel"))
            .dispatch()
            .await;

        assert!(matches!(result, Err(DispatchError::StorageWrite(_))));
    }

    #[tokio::test]
    async fn test_refill_copy_failure_is_fatal() {
        let mut store = MockFeedStore::new();
        store
            .expect_get()
            .returning(|_| Ok(br#"{"items": []}"#.to_vec()));
        store
            .expect_copy()
            .returning(|src, _| Err(StorageError::NotFound(src.to_string())));

        let result = dispatcher(store, MockItemPublisher::new(), MockItemPublisher::new())
            .dispatch()
            .await;

        let err = result.unwrap_err();
        assert!(matches!(err, DispatchError::RefillCopy(_)));
        assert_eq!(err.stage(), Stage::EnsureNonEmpty);
    }
}
