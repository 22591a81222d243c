//! Error types for chanstore
//!
//! Provides a unified error type for every engine operation. Transport
//! failures keep their own type ([`TransportError`]) and are wrapped here.

use crate::codec::FIRST_BLOCK;
use crate::transport::TransportError;
use thiserror::Error;

/// Result type alias for chanstore operations
pub type Result<T> = std::result::Result<T, ChanstoreError>;

/// Unified error type for chanstore
#[derive(Error, Debug)]
pub enum ChanstoreError {
    // ===== Precondition Errors =====
    #[error("{0} already exists")]
    AlreadyExists(String),

    #[error("{0} not found")]
    NotFound(String),

    #[error("max channel limit of {limit} is reached")]
    ChannelLimitReached { limit: usize },

    #[error("remote file size {remote} does not match local file size {local}")]
    SizeMismatch { remote: String, local: u64 },

    #[error("refusing to upload empty file {0}")]
    EmptyFile(String),

    #[error("invalid filename: {0}")]
    InvalidFilename(String),

    #[error("encoded filename is {len} characters (max: {max})")]
    FilenameTooLong { len: usize, max: usize },

    // ===== Inference Errors =====
    #[error("cannot infer block size")]
    CannotInferBlockSize,

    #[error("cannot infer last uploaded block")]
    CannotInferLastBlock,

    #[error("inferred block size {inferred} is larger than the largest permitted block size {max}")]
    BlockSizeExceedsLimit { inferred: u64, max: u64 },

    #[error("complete upload inferred from incomplete last block (block size {size}, expected {expected})")]
    IncompleteUploadFromPartialLastBlock { size: u64, expected: u64 },

    #[error("upload is already complete")]
    AlreadyComplete,

    // ===== Codec Errors =====
    #[error("malformed block name: {0:?}")]
    MalformedBlockName(String),

    #[error("malformed size record: {0:?}")]
    MalformedTopic(String),

    // ===== Chunk Errors =====
    #[error("calculated chunk size is too small: max attachment size {max}, safety margin {margin}")]
    ChunkTooSmall { max: u64, margin: u64 },

    #[error("chunk {block} validation failed: {size} bytes (max: {max})")]
    ChunkSizeInvalid { block: u64, size: u64, max: u64 },

    // ===== Download Integrity Errors =====
    #[error("missing block: expected {expected}, found {found}")]
    BlockGap { expected: u64, found: u64 },

    #[error("block {block} has {size} bytes, expected {expected}")]
    BlockSizeInconsistent { block: u64, size: u64, expected: u64 },

    #[error("blocks hold {actual} bytes but the recorded size is {expected}")]
    SizeVerification { expected: u64, actual: u64 },

    // ===== Transport Errors =====
    #[error("remote error: {0}")]
    Transport(#[from] TransportError),

    #[error("block {block} failed after {attempts} attempts: {source}")]
    RemoteWrite {
        block: u64,
        attempts: u32,
        #[source]
        source: TransportError,
    },

    // ===== I/O Errors =====
    #[error("failed to read block {block}: {source}")]
    LocalRead {
        block: u64,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write block {block}: {source}")]
    LocalWrite {
        block: u64,
        #[source]
        source: std::io::Error,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ChanstoreError {
    /// Block an upload was working on when it stopped
    pub fn failed_block(&self) -> Option<u64> {
        match self {
            ChanstoreError::RemoteWrite { block, .. }
            | ChanstoreError::LocalRead { block, .. }
            | ChanstoreError::ChunkSizeInvalid { block, .. } => Some(*block),
            _ => None,
        }
    }

    /// Whether a later `--resume` may continue from the state this error left behind
    ///
    /// Resume infers the block size from block 1, so a transfer that never
    /// got block 1 acknowledged has nothing to continue from.
    pub fn is_resumable(&self) -> bool {
        match self {
            ChanstoreError::RemoteWrite { block, .. } | ChanstoreError::LocalRead { block, .. } => {
                *block > FIRST_BLOCK
            }
            _ => false,
        }
    }
}
