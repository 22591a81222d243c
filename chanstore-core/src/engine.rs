//! Transfer engine
//!
//! Drives uploads, downloads and catalog operations against a [`Transport`].
//! One file is transferred strictly block by block: block `n + 1` is only
//! sent once block `n` has been acknowledged.

use crate::error::Result;
use crate::retry::RetryPolicy;
use crate::transport::Transport;
use crate::SAFETY_MARGIN;

/// Engine configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferConfig {
    /// Retry policy applied to every remote write
    pub retry: RetryPolicy,

    /// Bytes kept free below the attachment ceiling for message overhead
    pub safety_margin: u64,

    /// Attachment ceiling to use instead of asking the transport
    pub max_attachment_size: Option<u64>,
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            retry: RetryPolicy::default(),
            safety_margin: SAFETY_MARGIN,
            max_attachment_size: None,
        }
    }
}

/// Transfer engine bound to one transport
pub struct TransferEngine<'a, T: Transport + ?Sized> {
    pub(crate) transport: &'a T,
    pub(crate) config: TransferConfig,
}

impl<'a, T: Transport + ?Sized> TransferEngine<'a, T> {
    pub fn new(transport: &'a T, config: TransferConfig) -> Self {
        Self { transport, config }
    }

    pub fn transport(&self) -> &T {
        self.transport
    }

    pub fn config(&self) -> &TransferConfig {
        &self.config
    }

    /// Attachment ceiling for this session
    pub async fn max_attachment_size(&self) -> Result<u64> {
        match self.config.max_attachment_size {
            Some(max) => Ok(max),
            None => Ok(self.transport.max_attachment_size().await?),
        }
    }
}
