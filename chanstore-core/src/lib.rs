//! Chanstore Core Library
//!
//! Stores files as chat channels: one container per file, one attachment per
//! block. This crate provides:
//! - The block codec (attachment names, size topics)
//! - Filename encoding for container names
//! - Resume inference from remote state alone
//! - The transfer engine (upload, download, list, remove)
//! - Retries with linear backoff
//! - An in-memory transport for tests and development

pub mod catalog;
pub mod codec;
pub mod download;
pub mod engine;
pub mod error;
pub mod memory;
pub mod naming;
pub mod progress;
pub mod resume;
pub mod retry;
pub mod transport;
pub mod upload;

pub use catalog::RemoteFile;
pub use codec::{Block, BlockInfo};
pub use download::DownloadReport;
pub use engine::{TransferConfig, TransferEngine};
pub use error::{ChanstoreError, Result};
pub use memory::MemoryTransport;
pub use naming::{decode_filename, encode_filename};
pub use progress::{NoProgress, Progress, ProgressLog};
pub use resume::ResumePoint;
pub use retry::RetryPolicy;
pub use transport::{Attachment, Container, Message, MessageQuery, Transport, TransportError};
pub use upload::{UploadReport, UploadRequest};

/// Bytes kept free below the attachment ceiling when sizing blocks
pub const SAFETY_MARGIN: u64 = 50;

/// Most containers a server may hold
pub const MAX_CONTAINERS: usize = 500;

/// Messages fetched per listing request
pub const PAGE_SIZE: usize = 100;
