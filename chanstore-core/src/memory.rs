//! In-memory transport
//!
//! Used for testing and development. Not persistent.
//!
//! Behaves like a chat platform as far as the engine can tell: ids grow with
//! send time, pinning posts a system notice without attachments, and
//! attachments above the size ceiling are rejected. Sends can be made to
//! fail on demand.

use crate::transport::{Attachment, Container, Message, MessageQuery, Transport, TransportError};
use bytes::Bytes;
use parking_lot::{Mutex, RwLock};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::time::Duration;

/// Default attachment ceiling for the in-memory transport (8 MiB)
pub const DEFAULT_MEMORY_MAX_ATTACHMENT: u64 = 8 * 1024 * 1024;

struct StoredMessage {
    id: u64,
    attachment: Option<(Attachment, Bytes)>,
}

impl StoredMessage {
    fn to_message(&self) -> Message {
        Message {
            id: self.id.to_string(),
            attachments: self
                .attachment
                .iter()
                .map(|(attachment, _)| attachment.clone())
                .collect(),
        }
    }
}

struct StoredContainer {
    name: String,
    topic: Option<String>,
    messages: Vec<StoredMessage>,
    pinned: Vec<u64>,
}

impl StoredContainer {
    fn to_container(&self, id: u64) -> Container {
        Container {
            id: id.to_string(),
            name: self.name.clone(),
            topic: self.topic.clone(),
        }
    }
}

/// In-memory transport
pub struct MemoryTransport {
    /// Containers by numeric id, in creation order
    containers: RwLock<BTreeMap<u64, StoredContainer>>,

    /// Shared id sequence for containers and messages
    next_id: AtomicU64,

    /// Attachment ceiling reported to the engine
    max_attachment_size: AtomicU64,

    /// Sends that fail before the next one succeeds
    failing_sends: AtomicU32,

    /// Sends allowed before every further send fails
    send_budget: Mutex<Option<u64>>,

    /// Wait the next send is rejected with
    rate_limit: Mutex<Option<Duration>>,

    /// Fetches allowed before every further fetch fails
    fetch_budget: Mutex<Option<u64>>,

    fail_topics: AtomicBool,
    fail_pins: AtomicBool,

    /// Operation counters
    send_attempts: AtomicU64,
    sends: AtomicU64,
}

impl MemoryTransport {
    /// Create a new in-memory transport
    pub fn new() -> Self {
        Self::with_max_attachment_size(DEFAULT_MEMORY_MAX_ATTACHMENT)
    }

    /// Create with a specific attachment ceiling
    pub fn with_max_attachment_size(max: u64) -> Self {
        Self {
            containers: RwLock::new(BTreeMap::new()),
            next_id: AtomicU64::new(1000),
            max_attachment_size: AtomicU64::new(max),
            failing_sends: AtomicU32::new(0),
            send_budget: Mutex::new(None),
            rate_limit: Mutex::new(None),
            fetch_budget: Mutex::new(None),
            fail_topics: AtomicBool::new(false),
            fail_pins: AtomicBool::new(false),
            send_attempts: AtomicU64::new(0),
            sends: AtomicU64::new(0),
        }
    }

    /// Change the attachment ceiling, e.g. after an account downgrade
    pub fn set_max_attachment_size(&self, max: u64) {
        self.max_attachment_size.store(max, Ordering::SeqCst);
    }

    /// Make the next `count` sends fail
    pub fn fail_next_sends(&self, count: u32) {
        self.failing_sends.store(count, Ordering::SeqCst);
    }

    /// Reject the next send as rate limited for `retry_after`
    pub fn rate_limit_next_send(&self, retry_after: Duration) {
        *self.rate_limit.lock() = Some(retry_after);
    }

    /// Let `count` more sends through, then fail every send
    pub fn cut_sends_after(&self, count: u64) {
        *self.send_budget.lock() = Some(count);
    }

    /// Stop failing sends
    pub fn restore_sends(&self) {
        self.failing_sends.store(0, Ordering::SeqCst);
        *self.send_budget.lock() = None;
    }

    /// Let `count` more fetches through, then fail every fetch
    pub fn cut_fetches_after(&self, count: u64) {
        *self.fetch_budget.lock() = Some(count);
    }

    /// Stop failing fetches
    pub fn restore_fetches(&self) {
        *self.fetch_budget.lock() = None;
    }

    /// Make topic updates fail
    pub fn fail_topic_updates(&self, fail: bool) {
        self.fail_topics.store(fail, Ordering::SeqCst);
    }

    /// Make pins fail
    pub fn fail_pins(&self, fail: bool) {
        self.fail_pins.store(fail, Ordering::SeqCst);
    }

    /// Sends attempted, failed ones included
    pub fn send_attempts(&self) -> u64 {
        self.send_attempts.load(Ordering::SeqCst)
    }

    /// Sends that stored a message
    pub fn sends(&self) -> u64 {
        self.sends.load(Ordering::SeqCst)
    }

    /// Look up a container by its name
    pub fn container(&self, name: &str) -> Option<Container> {
        let containers = self.containers.read();
        containers
            .iter()
            .find(|(_, c)| c.name == name)
            .map(|(id, c)| c.to_container(*id))
    }

    /// Attachments in a container, in send order, as `(name, payload)`
    pub fn blocks(&self, container_id: &str) -> Vec<(String, Bytes)> {
        let containers = self.containers.read();
        parse_id(container_id)
            .ok()
            .and_then(|id| containers.get(&id))
            .map(|c| {
                c.messages
                    .iter()
                    .filter_map(|m| m.attachment.as_ref())
                    .map(|(a, data)| (a.name.clone(), data.clone()))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Ids of pinned messages in a container
    pub fn pinned(&self, container_id: &str) -> Vec<String> {
        let containers = self.containers.read();
        parse_id(container_id)
            .ok()
            .and_then(|id| containers.get(&id))
            .map(|c| c.pinned.iter().map(|id| id.to_string()).collect())
            .unwrap_or_default()
    }

    /// Delete one message, as a user tampering with the channel would
    pub fn remove_message(&self, container_id: &str, message_id: &str) -> bool {
        let (Ok(cid), Ok(mid)) = (parse_id(container_id), parse_id(message_id)) else {
            return false;
        };
        let mut containers = self.containers.write();
        match containers.get_mut(&cid) {
            Some(c) => {
                let before = c.messages.len();
                c.messages.retain(|m| m.id != mid);
                c.messages.len() != before
            }
            None => false,
        }
    }

    fn allocate_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::SeqCst)
    }

    fn take_send_fault(&self) -> Option<TransportError> {
        if let Some(retry_after) = self.rate_limit.lock().take() {
            return Some(TransportError::RateLimited { retry_after });
        }

        let failing = self.failing_sends.load(Ordering::SeqCst);
        if failing > 0 {
            self.failing_sends.store(failing - 1, Ordering::SeqCst);
            return Some(TransportError::Unavailable("injected send failure".to_string()));
        }

        let mut budget = self.send_budget.lock();
        match budget.as_mut() {
            Some(0) => Some(TransportError::Unavailable("connection lost".to_string())),
            Some(remaining) => {
                *remaining -= 1;
                None
            }
            None => None,
        }
    }
}

impl Default for MemoryTransport {
    fn default() -> Self {
        Self::new()
    }
}

fn parse_id(id: &str) -> Result<u64, TransportError> {
    id.parse()
        .map_err(|_| TransportError::Decode(format!("invalid id: {}", id)))
}

fn attachment_url(container_id: u64, message_id: u64) -> String {
    format!("memory://{}/{}", container_id, message_id)
}

#[async_trait::async_trait]
impl Transport for MemoryTransport {
    async fn list_containers(&self) -> Result<Vec<Container>, TransportError> {
        let containers = self.containers.read();
        Ok(containers
            .iter()
            .map(|(id, c)| c.to_container(*id))
            .collect())
    }

    async fn create_container(&self, name: &str) -> Result<Container, TransportError> {
        let id = self.allocate_id();
        let stored = StoredContainer {
            name: name.to_string(),
            topic: None,
            messages: Vec::new(),
            pinned: Vec::new(),
        };
        let container = stored.to_container(id);
        self.containers.write().insert(id, stored);
        Ok(container)
    }

    async fn set_topic(&self, container_id: &str, topic: &str) -> Result<(), TransportError> {
        if self.fail_topics.load(Ordering::SeqCst) {
            return Err(TransportError::Unavailable("topic update rejected".to_string()));
        }
        let id = parse_id(container_id)?;
        let mut containers = self.containers.write();
        let container = containers
            .get_mut(&id)
            .ok_or_else(|| TransportError::NotFound(container_id.to_string()))?;
        container.topic = Some(topic.to_string());
        Ok(())
    }

    async fn delete_container(&self, container_id: &str) -> Result<(), TransportError> {
        let id = parse_id(container_id)?;
        self.containers
            .write()
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| TransportError::NotFound(container_id.to_string()))
    }

    async fn list_messages(
        &self,
        container_id: &str,
        query: MessageQuery,
    ) -> Result<Vec<Message>, TransportError> {
        let id = parse_id(container_id)?;
        let containers = self.containers.read();
        let container = containers
            .get(&id)
            .ok_or_else(|| TransportError::NotFound(container_id.to_string()))?;
        let messages = &container.messages;

        let result = match query {
            MessageQuery::Oldest { limit } => messages
                .iter()
                .take(limit)
                .map(StoredMessage::to_message)
                .collect(),
            MessageQuery::Newest { limit } => messages
                .iter()
                .rev()
                .take(limit)
                .map(StoredMessage::to_message)
                .collect(),
            MessageQuery::After { after, limit } => {
                let after = parse_id(&after)?;
                messages
                    .iter()
                    .filter(|m| m.id > after)
                    .take(limit)
                    .map(StoredMessage::to_message)
                    .collect()
            }
        };

        Ok(result)
    }

    async fn send_attachment(
        &self,
        container_id: &str,
        name: &str,
        data: Bytes,
    ) -> Result<Message, TransportError> {
        self.send_attempts.fetch_add(1, Ordering::SeqCst);

        if let Some(err) = self.take_send_fault() {
            return Err(err);
        }

        let max = self.max_attachment_size.load(Ordering::SeqCst);
        if data.len() as u64 > max {
            return Err(TransportError::Api {
                status: 413,
                message: format!("attachment of {} bytes exceeds {}", data.len(), max),
            });
        }

        let cid = parse_id(container_id)?;
        let mid = self.allocate_id();
        let mut containers = self.containers.write();
        let container = containers
            .get_mut(&cid)
            .ok_or_else(|| TransportError::NotFound(container_id.to_string()))?;

        let attachment = Attachment {
            name: name.to_string(),
            size: data.len() as u64,
            url: attachment_url(cid, mid),
        };
        let stored = StoredMessage {
            id: mid,
            attachment: Some((attachment, data)),
        };
        let message = stored.to_message();
        container.messages.push(stored);
        self.sends.fetch_add(1, Ordering::SeqCst);

        Ok(message)
    }

    async fn pin_message(
        &self,
        container_id: &str,
        message_id: &str,
    ) -> Result<(), TransportError> {
        if self.fail_pins.load(Ordering::SeqCst) {
            return Err(TransportError::Unavailable("pin rejected".to_string()));
        }

        let cid = parse_id(container_id)?;
        let mid = parse_id(message_id)?;
        let notice = self.allocate_id();
        let mut containers = self.containers.write();
        let container = containers
            .get_mut(&cid)
            .ok_or_else(|| TransportError::NotFound(container_id.to_string()))?;

        if !container.messages.iter().any(|m| m.id == mid) {
            return Err(TransportError::NotFound(message_id.to_string()));
        }

        container.pinned.push(mid);
        // the platform announces pins with a system message
        container.messages.push(StoredMessage {
            id: notice,
            attachment: None,
        });
        Ok(())
    }

    async fn max_attachment_size(&self) -> Result<u64, TransportError> {
        Ok(self.max_attachment_size.load(Ordering::SeqCst))
    }

    async fn fetch_attachment(&self, attachment: &Attachment) -> Result<Bytes, TransportError> {
        if let Some(remaining) = self.fetch_budget.lock().as_mut() {
            if *remaining == 0 {
                return Err(TransportError::Unavailable("connection lost".to_string()));
            }
            *remaining -= 1;
        }

        let not_found = || TransportError::NotFound(attachment.url.clone());
        let (cid, mid) = attachment
            .url
            .strip_prefix("memory://")
            .and_then(|rest| rest.split_once('/'))
            .ok_or_else(not_found)?;
        let (cid, mid) = (parse_id(cid)?, parse_id(mid)?);

        let containers = self.containers.read();
        containers
            .get(&cid)
            .and_then(|c| c.messages.iter().find(|m| m.id == mid))
            .and_then(|m| m.attachment.as_ref())
            .map(|(_, data)| data.clone())
            .ok_or_else(not_found)
    }
}
