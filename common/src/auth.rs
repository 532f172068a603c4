// Signed token issuing for the tweet webhook
// The webhook expects the four tweet-service credentials inside an HS256 JWT

use crate::config::TweetConfig;
use crate::errors::TokenError;
use chrono::Utc;
use jsonwebtoken::{encode, EncodingKey, Header};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, instrument};

/// Claims carried by the tweet webhook token
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TweetClaims {
    pub twitter_consumer_key: String,
    pub twitter_consumer_secret: String,
    pub twitter_access_token_key: String,
    pub twitter_access_token_secret: String,
    pub iat: i64,
}

/// Issues one short-lived token per dispatch
#[derive(Clone)]
pub struct TweetTokenIssuer {
    encoding_key: Arc<EncodingKey>,
    consumer_key: String,
    consumer_secret: String,
    access_token_key: String,
    access_token_secret: String,
}

impl std::fmt::Debug for TweetTokenIssuer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TweetTokenIssuer").finish_non_exhaustive()
    }
}

impl TweetTokenIssuer {
    #[instrument(skip(config))]
    pub fn new(config: &TweetConfig) -> Self {
        Self {
            encoding_key: Arc::new(EncodingKey::from_secret(config.app_secret.as_bytes())),
            consumer_key: config.consumer_key.clone(),
            consumer_secret: config.consumer_secret.clone(),
            access_token_key: config.access_token_key.clone(),
            access_token_secret: config.access_token_secret.clone(),
        }
    }

    fn claims(&self) -> TweetClaims {
        TweetClaims {
            twitter_consumer_key: self.consumer_key.clone(),
            twitter_consumer_secret: self.consumer_secret.clone(),
            twitter_access_token_key: self.access_token_key.clone(),
            twitter_access_token_secret: self.access_token_secret.clone(),
            iat: Utc::now().timestamp(),
        }
    }

    /// Sign a fresh token over the configured credentials
    #[instrument(skip(self))]
    pub fn issue(&self) -> Result<String, TokenError> {
        encode(&Header::default(), &self.claims(), &self.encoding_key).map_err(|e| {
            error!(error = %e, "Failed to encode tweet token");
            TokenError::SigningFailed(e.to_string())
        })
    }
}
