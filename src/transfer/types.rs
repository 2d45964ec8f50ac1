//! Endpoint transfer types

use std::ops::Range;

use chrono::{DateTime, Utc};
use serde::Serialize;

// ============================================================================
// Chunk Plan
// ============================================================================

/// How a file of `total_size` bytes splits into `chunk_size` chunks
///
/// Indices are zero-based and contiguous. Every chunk is `chunk_size` long
/// except possibly the last.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChunkPlan {
    pub total_size: u64,
    pub chunk_size: u64,
}

impl ChunkPlan {
    pub fn new(total_size: u64, chunk_size: u64) -> Result<Self, TransferError> {
        if chunk_size == 0 {
            return Err(TransferError::InvalidChunkSize);
        }
        Ok(Self {
            total_size,
            chunk_size,
        })
    }

    /// `ceil(total_size / chunk_size)`; zero for an empty file
    pub fn total_chunks(&self) -> u64 {
        self.total_size.div_ceil(self.chunk_size)
    }

    /// Byte range covered by a chunk
    pub fn chunk_range(&self, index: u64) -> Option<Range<u64>> {
        if index >= self.total_chunks() {
            return None;
        }
        let start = index * self.chunk_size;
        let end = start.saturating_add(self.chunk_size).min(self.total_size);
        Some(start..end)
    }

    pub fn chunk_len(&self, index: u64) -> Option<u64> {
        self.chunk_range(index).map(|range| range.end - range.start)
    }

    pub fn is_last(&self, index: u64) -> bool {
        index.checked_add(1) == Some(self.total_chunks())
    }
}

// ============================================================================
// Transfer Record
// ============================================================================

/// Lifecycle of one file transfer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TransferState {
    Pending,
    Completed,
    Failed,
}

/// Why a transfer failed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum FailureReason {
    SenderLeft,
    ReceiverLeft,
    SenderNotFound,
    ReceiverNotFound,
    SessionReplaced,
    /// Last-chunk flag arrived before all bytes did
    Truncated,
    /// More bytes arrived than were announced
    Overflow,
}

/// One file in flight, as tracked by an endpoint
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Transfer {
    pub transfer_id: String,
    pub session_id: String,
    pub filename: String,
    pub mime_type: String,
    pub plan: ChunkPlan,
    /// Never exceeds `plan.total_size`
    pub bytes_transmitted: u64,
    pub chunks_transmitted: u64,
    pub state: TransferState,
    pub failure: Option<FailureReason>,
    pub created_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl Transfer {
    pub fn new(
        session_id: &str,
        transfer_id: &str,
        filename: &str,
        mime_type: &str,
        plan: ChunkPlan,
    ) -> Self {
        Self {
            transfer_id: transfer_id.to_string(),
            session_id: session_id.to_string(),
            filename: filename.to_string(),
            mime_type: mime_type.to_string(),
            plan,
            bytes_transmitted: 0,
            chunks_transmitted: 0,
            state: TransferState::Pending,
            failure: None,
            created_at: Utc::now(),
            finished_at: None,
        }
    }

    pub fn total_chunks(&self) -> u64 {
        self.plan.total_chunks()
    }

    pub fn is_terminal(&self) -> bool {
        self.state != TransferState::Pending
    }

    /// Percentage of bytes moved
    pub fn progress(&self) -> f64 {
        if self.plan.total_size == 0 {
            return 100.0;
        }
        (self.bytes_transmitted as f64 / self.plan.total_size as f64) * 100.0
    }

    /// Enter `completed`; true only on the first call
    pub(crate) fn complete(&mut self) -> bool {
        if self.is_terminal() {
            return false;
        }
        self.state = TransferState::Completed;
        self.finished_at = Some(Utc::now());
        tracing::info!(
            session_id = %self.session_id,
            transfer_id = %self.transfer_id,
            bytes = self.bytes_transmitted,
            "Transfer completed"
        );
        true
    }

    /// Enter `failed`; ignored once terminal
    pub(crate) fn fail(&mut self, reason: FailureReason) -> bool {
        if self.is_terminal() {
            return false;
        }
        self.state = TransferState::Failed;
        self.failure = Some(reason);
        self.finished_at = Some(Utc::now());
        tracing::warn!(
            session_id = %self.session_id,
            transfer_id = %self.transfer_id,
            reason = ?reason,
            bytes = self.bytes_transmitted,
            total = self.plan.total_size,
            "Transfer failed"
        );
        true
    }
}

// ============================================================================
// Error Types
// ============================================================================

/// Endpoint transfer errors
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum TransferError {
    #[error("Chunk size must be positive")]
    InvalidChunkSize,

    #[error("Chunk index out of range: {index} (total: {total})")]
    ChunkOutOfRange { index: u64, total: u64 },

    #[error("Unexpected chunk: expected {expected}, got {got}")]
    UnexpectedChunk { expected: u64, got: u64 },

    #[error("Chunk belongs to another transfer: {0}")]
    WrongTransfer(String),

    #[error("Received {received} bytes, more than the announced {total}")]
    Overflow { received: u64, total: u64 },

    #[error("Last chunk arrived after {received} of {total} bytes")]
    Truncated { received: u64, total: u64 },

    #[error("Transfer already {0:?}")]
    Closed(TransferState),
}
