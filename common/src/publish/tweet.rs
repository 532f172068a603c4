// Tweet webhook publisher

use crate::auth::TweetTokenIssuer;
use crate::config::TweetConfig;
use crate::errors::PublishError;
use crate::models::CanonicalItem;
use crate::publish::{build_client, ItemPublisher};
use async_trait::async_trait;
use reqwest::{header, Client, StatusCode};
use tracing::{error, info, instrument};

const TARGET: &str = "tweet";

/// Posts items to the tweet webhook
///
/// Only `200 OK` counts as success; any other status, including other 2xx
/// codes, is a failure.
pub struct TweetPublisher {
    client: Client,
    endpoint: String,
    issuer: TweetTokenIssuer,
}

impl TweetPublisher {
    pub fn new(config: &TweetConfig) -> Result<Self, PublishError> {
        Ok(Self {
            client: build_client(TARGET, config.timeout_seconds)?,
            endpoint: config.endpoint.clone(),
            issuer: TweetTokenIssuer::new(config),
        })
    }
}

#[async_trait]
impl ItemPublisher for TweetPublisher {
    fn name(&self) -> &str {
        TARGET
    }

    #[instrument(skip(self, item), fields(endpoint = %self.endpoint, title = ?item.title))]
    async fn publish(&self, item: &CanonicalItem) -> Result<(), PublishError> {
        let payload = item.to_payload();
        let token = self.issuer.issue()?;

        let response = self
            .client
            .post(&self.endpoint)
            .header(header::AUTHORIZATION, token)
            .json(&payload)
            .send()
            .await
            .map_err(|e| {
                let e = e.without_url();
                error!(error = %e, "Tweet webhook request failed");
                PublishError::Transport {
                    target: TARGET.to_string(),
                    reason: e.to_string(),
                }
            })?;

        let status = response.status();
        if status != StatusCode::OK {
            let body = response.text().await.unwrap_or_default();
            error!(status = status.as_u16(), body = %body, "Tweet webhook rejected item");
            return Err(PublishError::UnexpectedStatus {
                target: TARGET.to_string(),
                status: status.as_u16(),
                body,
            });
        }

        info!("Tweet webhook accepted item");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_json, header_exists, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config_for(server: &MockServer) -> TweetConfig {
        TweetConfig {
            endpoint: format!("{}/tweet", server.uri()),
            consumer_key: "ck".to_string(),
            consumer_secret: "cs".to_string(),
            access_token_key: "ak".to_string(),
            access_token_secret: "as".to_string(),
            app_secret: "app-secret".to_string(),
            timeout_seconds: 5,
        }
    }

    fn deal() -> CanonicalItem {
        CanonicalItem {
            title: Some("Deal A".to_string()),
            link: Some("http://x.com/a".to_string()),
            image: None,
            extra: Default::default(),
        }
    }

    #[tokio::test]
    async fn test_publish_posts_payload_with_token() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/tweet"))
            .and(header_exists("authorization"))
            .and(body_json(json!({"title": "Deal A", "link": "http://x.com/a"})))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let publisher = TweetPublisher::new(&config_for(&server)).unwrap();
        publisher.publish(&deal()).await.unwrap();

        server.verify().await;
    }

    #[tokio::test]
    async fn test_publish_rejects_server_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
            .mount(&server)
            .await;

        let publisher = TweetPublisher::new(&config_for(&server)).unwrap();
        let result = publisher.publish(&deal()).await;

        assert!(matches!(
            result,
            Err(PublishError::UnexpectedStatus { status: 500, ref body, .. }) if body == "boom"
        ));
    }

    #[tokio::test]
    async fn test_publish_rejects_non_200_success() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(201))
            .mount(&server)
            .await;

        let publisher = TweetPublisher::new(&config_for(&server)).unwrap();
        assert!(publisher.publish(&deal()).await.is_err());
    }
}
