// Messaging-channel publisher (bot sendPhoto API)

use crate::config::ChannelConfig;
use crate::errors::PublishError;
use crate::models::CanonicalItem;
use crate::publish::{build_client, ItemPublisher};
use async_trait::async_trait;
use reqwest::{Client, Url};
use tracing::{error, info, instrument};

const TARGET: &str = "channel";

/// Posts an item's image and caption to a messaging channel
pub struct ChannelPublisher {
    client: Client,
    api_base: String,
    bot_token: String,
    channel_id: String,
    link_host: String,
    link_path_prefix: String,
    link_text: String,
}

impl ChannelPublisher {
    pub fn new(config: &ChannelConfig) -> Result<Self, PublishError> {
        Ok(Self {
            client: build_client(TARGET, config.timeout_seconds)?,
            api_base: config.api_base.trim_end_matches('/').to_string(),
            bot_token: config.bot_token.clone(),
            channel_id: config.channel_id.clone(),
            link_host: config.link_host.clone(),
            link_path_prefix: config.link_path_prefix.clone(),
            link_text: config.link_text.clone(),
        })
    }

    /// Move `link` onto the alternate host, prefixing its path
    ///
    /// Scheme, port, query and fragment are kept.
    pub fn rewrite_link(&self, link: &str) -> Result<Url, PublishError> {
        let mut url = Url::parse(link).map_err(|e| invalid(format!("bad link '{}': {}", link, e)))?;

        url.set_host(Some(&self.link_host))
            .map_err(|e| invalid(format!("bad link host '{}': {}", self.link_host, e)))?;

        let prefix = self.link_path_prefix.trim_end_matches('/');
        let path = format!("{}{}", prefix, url.path());
        url.set_path(&path);

        Ok(url)
    }

    /// HTML caption: the escaped title followed by an anchor to the rewritten link
    pub fn caption(&self, title: &str, link: &Url) -> String {
        format!(
            "{}\n\n<a href=\"{}\"> {} </a>",
            escape_html(title),
            escape_html(link.as_str()),
            escape_html(&self.link_text)
        )
    }

    fn send_photo_url(&self) -> String {
        format!("{}/bot{}/sendPhoto", self.api_base, self.bot_token)
    }
}

#[async_trait]
impl ItemPublisher for ChannelPublisher {
    fn name(&self) -> &str {
        TARGET
    }

    #[instrument(skip(self, item), fields(channel_id = %self.channel_id, title = ?item.title))]
    async fn publish(&self, item: &CanonicalItem) -> Result<(), PublishError> {
        let link = item
            .link
            .as_deref()
            .ok_or_else(|| invalid("item has no link".to_string()))?;
        let photo = item
            .image
            .as_deref()
            .ok_or_else(|| invalid("item has no image".to_string()))?;

        let rewritten = self.rewrite_link(link)?;
        let caption = self.caption(item.title.as_deref().unwrap_or_default(), &rewritten);

        let response = self
            .client
            .get(self.send_photo_url())
            .query(&[
                ("chat_id", self.channel_id.as_str()),
                ("photo", photo),
                ("parse_mode", "HTML"),
                ("caption", caption.as_str()),
            ])
            .send()
            .await
            .map_err(|e| {
                let e = e.without_url();
                error!(error = %e, "Channel request failed");
                PublishError::Transport {
                    target: TARGET.to_string(),
                    reason: e.to_string(),
                }
            })?;

        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        if !status.is_success() {
            error!(status = status.as_u16(), body = %body, "Channel rejected item");
            return Err(PublishError::UnexpectedStatus {
                target: TARGET.to_string(),
                status: status.as_u16(),
                body,
            });
        }

        info!(link = %rewritten, "Channel accepted item");
        Ok(())
    }
}

fn invalid(reason: String) -> PublishError {
    PublishError::InvalidItem {
        target: TARGET.to_string(),
        reason,
    }
}

fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn channel_config(api_base: &str) -> ChannelConfig {
        ChannelConfig {
            api_base: api_base.to_string(),
            bot_token: "123:abc".to_string(),
            channel_id: "@deals".to_string(),
            link_host: "findmydeals.tech".to_string(),
            link_path_prefix: "/amazon".to_string(),
            link_text: "https://amazon.in/dealoftheday".to_string(),
            timeout_seconds: 5,
        }
    }

    fn deal() -> CanonicalItem {
        CanonicalItem {
            title: Some("Deal A".to_string()),
            link: Some("http://x.com/a".to_string()),
            image: Some("http://img/a.png".to_string()),
            extra: Default::default(),
        }
    }

    #[test]
    fn test_rewrite_link_moves_host_and_prefixes_path() {
        let publisher = ChannelPublisher::new(&channel_config("http://localhost")).unwrap();
        let url = publisher
            .rewrite_link("https://www.amazon.in/dp/B01?tag=x#top")
            .unwrap();

        assert_eq!(url.as_str(), "https://findmydeals.tech/amazon/dp/B01?tag=x#top");
    }

    #[test]
    fn test_rewrite_link_keeps_port() {
        let publisher = ChannelPublisher::new(&channel_config("http://localhost")).unwrap();
        let url = publisher.rewrite_link("http://x.com:8080/a").unwrap();
        assert_eq!(url.as_str(), "http://findmydeals.tech:8080/amazon/a");
    }

    #[test]
    fn test_rewrite_link_rejects_garbage() {
        let publisher = ChannelPublisher::new(&channel_config("http://localhost")).unwrap();
        assert!(matches!(
            publisher.rewrite_link("not a url"),
            Err(PublishError::InvalidItem { .. })
        ));
    }

    #[test]
    fn test_caption_escapes_title() {
        let publisher = ChannelPublisher::new(&channel_config("http://localhost")).unwrap();
        let url = Url::parse("https://findmydeals.tech/amazon/a").unwrap();
        let caption = publisher.caption("Tom & Jerry <Box>", &url);

        assert!(caption.starts_with("Tom &amp; Jerry &lt;Box&gt;"));
        assert!(caption.contains("<a href=\"https://findmydeals.tech/amazon/a\">"));
        assert!(caption.contains("https://amazon.in/dealoftheday"));
    }

    #[tokio::test]
    async fn test_publish_sends_photo_query() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/bot123:abc/sendPhoto"))
            .and(query_param("chat_id", "@deals"))
            .and(query_param("photo", "http://img/a.png"))
            .and(query_param("parse_mode", "HTML"))
            .and(query_param(
                "caption",
                "Deal A\n\n<a href=\"http://findmydeals.tech/amazon/a\"> https://amazon.in/dealoftheday </a>",
            ))
            .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"ok":true}"#))
            .expect(1)
            .mount(&server)
            .await;

        let publisher = ChannelPublisher::new(&channel_config(&server.uri())).unwrap();
        publisher.publish(&deal()).await.unwrap();

        server.verify().await;
    }

    #[tokio::test]
    async fn test_publish_reports_rejection() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(400).set_body_string("Bad Request"))
            .mount(&server)
            .await;

        let publisher = ChannelPublisher::new(&channel_config(&server.uri())).unwrap();
        assert!(matches!(
            publisher.publish(&deal()).await,
            Err(PublishError::UnexpectedStatus { status: 400, .. })
        ));
    }

    #[tokio::test]
    async fn test_transport_error_hides_bot_token() {
        // Nothing listens on port 1
        let publisher = ChannelPublisher::new(&channel_config("http://127.0.0.1:1")).unwrap();
        let err = publisher.publish(&deal()).await.unwrap_err();

        assert!(matches!(err, PublishError::Transport { .. }));
        assert!(!err.to_string().contains("123:abc"), "token leaked: {}", err);
        assert!(!format!("{:?}", err).contains("123:abc"));
    }

    #[tokio::test]
    async fn test_publish_requires_image() {
        let publisher = ChannelPublisher::new(&channel_config("http://localhost")).unwrap();
        let mut item = deal();
        item.image = None;

        assert!(matches!(
            publisher.publish(&item).await,
            Err(PublishError::InvalidItem { .. })
        ));
    }
}
