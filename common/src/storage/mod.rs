// Storage module for the feed queue documents

pub mod minio;
pub mod service;

pub use minio::MinioClient;
pub use service::{FeedStore, ObjectFeedStore};

#[cfg(test)]
pub use service::MockFeedStore;
