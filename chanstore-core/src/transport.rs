//! Transport port
//!
//! The narrow interface the engine needs from the chat platform: containers
//! (channels) with a topic field, ordered messages carrying at most one
//! attachment, and a discoverable attachment size ceiling.

use bytes::Bytes;
use std::time::Duration;
use thiserror::Error;

/// Transport errors
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("HTTP error: {0}")]
    Http(String),

    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    #[error("rate limited, retry after {retry_after:?}")]
    RateLimited { retry_after: Duration },

    #[error("not found: {0}")]
    NotFound(String),

    #[error("decode error: {0}")]
    Decode(String),

    #[error("transport unavailable: {0}")]
    Unavailable(String),
}

impl TransportError {
    /// Wait the remote asked for before the next request, if any
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            TransportError::RateLimited { retry_after } => Some(*retry_after),
            _ => None,
        }
    }
}

/// A remote container standing in for one logical file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Container {
    pub id: String,
    /// Encoded logical filename
    pub name: String,
    /// Metadata field holding the decimal file size
    pub topic: Option<String>,
}

/// A file attached to a message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    pub name: String,
    pub size: u64,
    /// Where the payload can be fetched from
    pub url: String,
}

/// A message in a container
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub id: String,
    pub attachments: Vec<Attachment>,
}

impl Message {
    /// The block carried by this message, if any
    pub fn attachment(&self) -> Option<&Attachment> {
        self.attachments.first()
    }
}

/// Which slice of a container's message history to fetch
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageQuery {
    /// The `limit` oldest messages, oldest first
    Oldest { limit: usize },
    /// The `limit` newest messages, newest first
    Newest { limit: usize },
    /// Up to `limit` messages sent after `after`, oldest first
    After { after: String, limit: usize },
}

impl MessageQuery {
    pub fn oldest(limit: usize) -> Self {
        MessageQuery::Oldest { limit }
    }

    pub fn newest(limit: usize) -> Self {
        MessageQuery::Newest { limit }
    }

    pub fn after(after: impl Into<String>, limit: usize) -> Self {
        MessageQuery::After {
            after: after.into(),
            limit,
        }
    }

    pub fn limit(&self) -> usize {
        match self {
            MessageQuery::Oldest { limit }
            | MessageQuery::Newest { limit }
            | MessageQuery::After { limit, .. } => *limit,
        }
    }
}

/// Remote operations consumed by the transfer engine
///
/// Implementations must return messages in send order as described by
/// [`MessageQuery`]; the resume inspector relies on it.
#[async_trait::async_trait]
pub trait Transport: Send + Sync {
    /// List every container in the configured group
    async fn list_containers(&self) -> Result<Vec<Container>, TransportError>;

    /// Create a container named `name`
    async fn create_container(&self, name: &str) -> Result<Container, TransportError>;

    /// Set the container's topic
    async fn set_topic(&self, container_id: &str, topic: &str) -> Result<(), TransportError>;

    /// Delete a container and everything in it
    async fn delete_container(&self, container_id: &str) -> Result<(), TransportError>;

    /// Fetch a slice of the container's messages
    async fn list_messages(
        &self,
        container_id: &str,
        query: MessageQuery,
    ) -> Result<Vec<Message>, TransportError>;

    /// Post a message carrying one attachment
    async fn send_attachment(
        &self,
        container_id: &str,
        name: &str,
        data: Bytes,
    ) -> Result<Message, TransportError>;

    /// Pin a message
    async fn pin_message(&self, container_id: &str, message_id: &str)
        -> Result<(), TransportError>;

    /// Largest attachment the remote currently accepts, in bytes
    async fn max_attachment_size(&self) -> Result<u64, TransportError>;

    /// Download an attachment's payload
    async fn fetch_attachment(&self, attachment: &Attachment) -> Result<Bytes, TransportError>;
}
