//! Relay types: connection handles, registry records and errors

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

// ============================================================================
// Constants
// ============================================================================

/// Default chunk size for the relay path: 64KB
pub const DEFAULT_CHUNK_SIZE: u64 = 64 * 1024;

/// Default WebSocket message envelope: 100MB
pub const DEFAULT_MAX_MESSAGE_BYTES: usize = 100 * 1024 * 1024;

/// Upper bound on the JSON header of a binary chunk frame
pub const MAX_CHUNK_HEADER_BYTES: usize = 64 * 1024;

// ============================================================================
// Connection Handles
// ============================================================================

/// Relay-assigned handle of one live connection
///
/// Handles are random v4 UUIDs and are never handed out twice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConnectionId(Uuid);

impl ConnectionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for ConnectionId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s.trim()).map(Self)
    }
}

/// Role a connection announced when it joined
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Sender,
    Receiver,
}

// ============================================================================
// Registry Records
// ============================================================================

/// File a sender announced at join time (informational only)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileDescriptor {
    pub name: String,
    pub size: u64,
    #[serde(rename = "type", default)]
    pub mime_type: String,
}

/// A sender's published session
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SenderRegistration {
    pub session_id: String,
    pub connection_id: ConnectionId,
    pub user_id: Option<String>,
    pub files: Vec<FileDescriptor>,
    pub registered_at: DateTime<Utc>,
}

/// A receiver attached to a session
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReceiverAttachment {
    pub session_id: String,
    pub receiver_id: String,
    pub connection_id: ConnectionId,
    pub user_id: Option<String>,
    pub attached_at: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
    /// Fields merged in from status updates
    pub status: Map<String, Value>,
}

/// Outcome of a receiver attaching to a session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchResult {
    /// A sender was registered; it has been sent `init`
    Matched { sender: ConnectionId },
    /// No sender yet; the attachment is still recorded
    Unmatched,
}

impl MatchResult {
    pub fn is_matched(&self) -> bool {
        matches!(self, MatchResult::Matched { .. })
    }
}

/// Outcome of a sender registering a session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegisterOutcome {
    /// Empty session id, nothing recorded
    Ignored,
    /// Fresh registration
    Registered,
    /// Same connection registered the same session again
    Refreshed,
    /// Another connection owned the session; its receivers were detached
    Replaced {
        previous: ConnectionId,
        detached: usize,
    },
}

// ============================================================================
// Error Types
// ============================================================================

/// Relay error types
#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    #[error("Malformed message: {0}")]
    MalformedMessage(#[from] serde_json::Error),

    #[error("Invalid message: {0}")]
    InvalidMessage(String),

    #[error("Chunk frame too short: {0} bytes")]
    FrameTooShort(usize),

    #[error("Chunk frame header length {declared} exceeds available {available} bytes")]
    HeaderLength { declared: usize, available: usize },

    #[error("Chunk frame header too large: {0} bytes")]
    HeaderTooLarge(usize),
}
