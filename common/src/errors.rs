// Error handling framework
// One enum per concern; the pipeline wraps the lower layers

use crate::pipeline::Stage;
use thiserror::Error;

/// Storage errors
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("MinIO error: {0}")]
    MinioError(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid JSON: {0}")]
    InvalidJson(String),

    #[error("Unexpected status {status} for '{path}'")]
    UnexpectedStatus { path: String, status: u16 },
}

/// Token issuing errors
#[derive(Error, Debug)]
pub enum TokenError {
    #[error("Failed to sign token: {0}")]
    SigningFailed(String),
}

/// Outbound publish errors
#[derive(Error, Debug)]
pub enum PublishError {
    #[error("{target} request failed: {reason}")]
    Transport { target: String, reason: String },

    #[error("{target} responded with status {status}: {body}")]
    UnexpectedStatus {
        target: String,
        status: u16,
        body: String,
    },

    #[error("Invalid item for {target}: {reason}")]
    InvalidItem { target: String, reason: String },

    #[error(transparent)]
    Token(#[from] TokenError),
}

/// Dispatch pipeline errors
#[derive(Error, Debug)]
pub enum DispatchError {
    #[error("Failed to read feed document: {0}")]
    StorageRead(#[source] StorageError),

    #[error("Failed to write feed document: {0}")]
    StorageWrite(#[source] StorageError),

    #[error("Failed to copy snapshot into active slot: {0}")]
    RefillCopy(#[source] StorageError),

    #[error("Feed still empty after {attempts} refill attempt(s)")]
    FeedExhausted { attempts: u32 },

    #[error("No item available to pop")]
    EmptyQueue,

    #[error("Failed to publish tweet: {0}")]
    TweetPublish(#[source] PublishError),

    #[error("Failed to post to channel: {0}")]
    ChannelPublish(#[source] PublishError),
}

impl DispatchError {
    /// Pipeline stage that produced this error
    pub fn stage(&self) -> Stage {
        match self {
            DispatchError::StorageRead(_) => Stage::LoadActive,
            DispatchError::RefillCopy(_) | DispatchError::FeedExhausted { .. } => {
                Stage::EnsureNonEmpty
            }
            DispatchError::EmptyQueue => Stage::PopNext,
            DispatchError::TweetPublish(_) => Stage::PublishTweet,
            DispatchError::ChannelPublish(_) => Stage::PublishChannel,
            DispatchError::StorageWrite(_) => Stage::Persist,
        }
    }

    /// Whether this error aborts the dispatch
    pub fn is_fatal(&self) -> bool {
        self.stage().is_fatal()
    }
}

/// Schedule-related errors
#[derive(Error, Debug)]
pub enum ScheduleError {
    #[error("Invalid cron expression '{expression}': {reason}")]
    InvalidCronExpression { expression: String, reason: String },

    #[error("Invalid timezone: {0}")]
    InvalidTimezone(String),

    #[error("No next execution time available for '{0}'")]
    NoNextExecution(String),
}

impl From<serde_json::Error> for StorageError {
    fn from(err: serde_json::Error) -> Self {
        StorageError::InvalidJson(err.to_string())
    }
}
