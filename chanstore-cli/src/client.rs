//! Discord Client
//!
//! [`Transport`] over the Discord REST API. The text channels of one guild
//! are the containers; a channel topic holds the file size and every block is
//! the single attachment of one message.

use async_trait::async_trait;
use bytes::Bytes;
use chanstore_core::transport::{
    Attachment, Container, Message, MessageQuery, Transport, TransportError,
};
use reqwest::multipart::{Form, Part};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;
use tracing::debug;

pub type Result<T> = std::result::Result<T, TransportError>;

/// Channel type of a guild text channel
const GUILD_TEXT: u8 = 0;

const MIB: u64 = 1024 * 1024;

/// Upload ceiling granted by a guild boost tier
pub fn max_attachment_for_tier(tier: u8) -> u64 {
    match tier {
        2 => 50 * MIB,
        3 => 100 * MIB,
        _ => 8 * MIB,
    }
}

#[derive(Debug, Deserialize)]
struct ChannelResponse {
    id: String,
    #[serde(rename = "type")]
    kind: u8,
    #[serde(default)]
    name: String,
    #[serde(default)]
    topic: Option<String>,
}

impl From<ChannelResponse> for Container {
    fn from(channel: ChannelResponse) -> Self {
        Container {
            id: channel.id,
            name: channel.name,
            topic: channel.topic,
        }
    }
}

#[derive(Debug, Deserialize)]
struct AttachmentResponse {
    filename: String,
    size: u64,
    url: String,
}

#[derive(Debug, Deserialize)]
struct MessageResponse {
    id: String,
    #[serde(default)]
    attachments: Vec<AttachmentResponse>,
}

impl From<MessageResponse> for Message {
    fn from(message: MessageResponse) -> Self {
        Message {
            id: message.id,
            attachments: message
                .attachments
                .into_iter()
                .map(|a| Attachment {
                    name: a.filename,
                    size: a.size,
                    url: a.url,
                })
                .collect(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct GuildResponse {
    #[serde(default)]
    premium_tier: u8,
}

#[derive(Debug, Deserialize)]
struct RateLimitResponse {
    retry_after: f64,
}

/// Discord REST client bound to one guild
pub struct DiscordClient {
    client: Client,
    base_url: String,
    guild_id: String,
    token: String,
}

impl DiscordClient {
    /// Create a new client
    pub fn new(base_url: &str, guild_id: &str, token: &str) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(300))
            .user_agent(concat!("chanstore/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(http_error)?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            guild_id: guild_id.to_string(),
            token: token.to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Send an authorized request and map failure statuses
    async fn send(&self, request: RequestBuilder) -> Result<Response> {
        let response = request
            .header("Authorization", format!("Bot {}", self.token))
            .send()
            .await
            .map_err(http_error)?;
        check(response).await
    }

    async fn json<T: serde::de::DeserializeOwned>(response: Response) -> Result<T> {
        response
            .json()
            .await
            .map_err(|e| TransportError::Decode(e.to_string()))
    }
}

fn http_error(e: reqwest::Error) -> TransportError {
    TransportError::Http(e.to_string())
}

/// Turn non-success statuses into errors
async fn check(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let url = response.url().to_string();
    let body = response.text().await.unwrap_or_default();
    Err(match status {
        StatusCode::TOO_MANY_REQUESTS => TransportError::RateLimited {
            retry_after: retry_after(&body),
        },
        StatusCode::NOT_FOUND => TransportError::NotFound(url),
        _ => TransportError::Api {
            status: status.as_u16(),
            message: body,
        },
    })
}

/// Wait requested by a 429 body, one second when absent
fn retry_after(body: &str) -> Duration {
    serde_json::from_str::<RateLimitResponse>(body)
        .ok()
        .filter(|r| r.retry_after.is_finite() && r.retry_after >= 0.0)
        .map(|r| Duration::from_secs_f64(r.retry_after))
        .unwrap_or(Duration::from_secs(1))
}

/// Snowflake ids order by creation time
fn snowflake(id: &str) -> u64 {
    id.parse().unwrap_or_default()
}

/// Order a page as the query promises
fn order_page(query: &MessageQuery, mut messages: Vec<Message>) -> Vec<Message> {
    match query {
        MessageQuery::Newest { .. } => {
            messages.sort_by_key(|m| std::cmp::Reverse(snowflake(&m.id)))
        }
        MessageQuery::Oldest { .. } | MessageQuery::After { .. } => {
            messages.sort_by_key(|m| snowflake(&m.id))
        }
    }
    messages
}

#[async_trait]
impl Transport for DiscordClient {
    async fn list_containers(&self) -> Result<Vec<Container>> {
        let url = self.url(&format!("/guilds/{}/channels", self.guild_id));
        let response = self.send(self.client.get(&url)).await?;
        let channels: Vec<ChannelResponse> = Self::json(response).await?;

        Ok(channels
            .into_iter()
            .filter(|c| c.kind == GUILD_TEXT)
            .map(Container::from)
            .collect())
    }

    async fn create_container(&self, name: &str) -> Result<Container> {
        let url = self.url(&format!("/guilds/{}/channels", self.guild_id));
        let body = json!({ "name": name, "type": GUILD_TEXT });
        let response = self.send(self.client.post(&url).json(&body)).await?;
        let channel: ChannelResponse = Self::json(response).await?;
        debug!(channel = %channel.id, name, "Created channel");
        Ok(channel.into())
    }

    async fn set_topic(&self, container_id: &str, topic: &str) -> Result<()> {
        let url = self.url(&format!("/channels/{}", container_id));
        let body = json!({ "topic": topic });
        self.send(self.client.patch(&url).json(&body)).await?;
        Ok(())
    }

    async fn delete_container(&self, container_id: &str) -> Result<()> {
        let url = self.url(&format!("/channels/{}", container_id));
        self.send(self.client.delete(&url)).await?;
        Ok(())
    }

    async fn list_messages(&self, container_id: &str, query: MessageQuery) -> Result<Vec<Message>> {
        let url = self.url(&format!("/channels/{}/messages", container_id));
        let limit = query.limit().to_string();
        let mut params = vec![("limit", limit)];
        match &query {
            MessageQuery::Oldest { .. } => params.push(("after", "0".to_string())),
            MessageQuery::After { after, .. } => params.push(("after", after.clone())),
            MessageQuery::Newest { .. } => {}
        }

        let response = self.send(self.client.get(&url).query(&params)).await?;
        let messages: Vec<MessageResponse> = Self::json(response).await?;
        let messages = messages.into_iter().map(Message::from).collect();
        Ok(order_page(&query, messages))
    }

    async fn send_attachment(&self, container_id: &str, name: &str, data: Bytes) -> Result<Message> {
        let url = self.url(&format!("/channels/{}/messages", container_id));
        let part = Part::bytes(data.to_vec())
            .file_name(name.to_string())
            .mime_str("application/octet-stream")
            .map_err(http_error)?;
        let form = Form::new().part("files[0]", part);

        let response = self.send(self.client.post(&url).multipart(form)).await?;
        let message: MessageResponse = Self::json(response).await?;
        Ok(message.into())
    }

    async fn pin_message(&self, container_id: &str, message_id: &str) -> Result<()> {
        let url = self.url(&format!("/channels/{}/pins/{}", container_id, message_id));
        self.send(self.client.put(&url)).await?;
        Ok(())
    }

    async fn max_attachment_size(&self) -> Result<u64> {
        let url = self.url(&format!("/guilds/{}", self.guild_id));
        let response = self.send(self.client.get(&url)).await?;
        let guild: GuildResponse = Self::json(response).await?;
        Ok(max_attachment_for_tier(guild.premium_tier))
    }

    async fn fetch_attachment(&self, attachment: &Attachment) -> Result<Bytes> {
        // CDN urls are signed and take no bot authorization
        let response = self
            .client
            .get(&attachment.url)
            .send()
            .await
            .map_err(http_error)?;
        check(response).await?.bytes().await.map_err(http_error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_max_attachment_for_tier() {
        assert_eq!(max_attachment_for_tier(0), 8 * MIB);
        assert_eq!(max_attachment_for_tier(1), 8 * MIB);
        assert_eq!(max_attachment_for_tier(2), 50 * MIB);
        assert_eq!(max_attachment_for_tier(3), 100 * MIB);
    }

    #[test]
    fn test_parse_channels() {
        let body = r#"[
            {"id": "1", "type": 4, "name": "files"},
            {"id": "2", "type": 0, "name": "report_2epdf", "topic": "1024"},
            {"id": "3", "type": 2, "name": "voice"},
            {"id": "4", "type": 0, "name": "general", "topic": null}
        ]"#;
        let channels: Vec<ChannelResponse> = serde_json::from_str(body).unwrap();
        let containers: Vec<Container> = channels
            .into_iter()
            .filter(|c| c.kind == GUILD_TEXT)
            .map(Container::from)
            .collect();

        assert_eq!(containers.len(), 2);
        assert_eq!(containers[0].name, "report_2epdf");
        assert_eq!(containers[0].topic.as_deref(), Some("1024"));
        assert_eq!(containers[1].topic, None);
    }

    #[test]
    fn test_parse_messages() {
        let body = r#"[
            {"id": "30", "type": 6, "attachments": []},
            {"id": "20", "type": 0, "attachments": [
                {"id": "9", "filename": "2", "size": 512, "url": "https://cdn.example/2"}
            ]}
        ]"#;
        let messages: Vec<MessageResponse> = serde_json::from_str(body).unwrap();
        let messages: Vec<Message> = messages.into_iter().map(Message::from).collect();

        assert!(messages[0].attachment().is_none());
        let attachment = messages[1].attachment().unwrap();
        assert_eq!(attachment.name, "2");
        assert_eq!(attachment.size, 512);
    }

    #[test]
    fn test_order_page() {
        let page = |ids: &[&str]| {
            ids.iter()
                .map(|id| Message {
                    id: id.to_string(),
                    attachments: Vec::new(),
                })
                .collect::<Vec<_>>()
        };
        let ids = |messages: Vec<Message>| messages.into_iter().map(|m| m.id).collect::<Vec<_>>();

        let oldest = order_page(&MessageQuery::oldest(3), page(&["30", "9", "100"]));
        assert_eq!(ids(oldest), vec!["9", "30", "100"]);

        let newest = order_page(&MessageQuery::newest(3), page(&["9", "100", "30"]));
        assert_eq!(ids(newest), vec!["100", "30", "9"]);
    }

    #[test]
    fn test_retry_after() {
        assert_eq!(
            retry_after(r#"{"message": "You are being rate limited.", "retry_after": 0.5, "global": false}"#),
            Duration::from_millis(500)
        );
        assert_eq!(retry_after("not json"), Duration::from_secs(1));
    }
}
