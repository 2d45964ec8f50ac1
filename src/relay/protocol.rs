//! Relay wire protocol
//!
//! Control messages are JSON text frames shaped as
//! `{"event": "<name>", "data": {...}}` with camelCase fields.
//!
//! Chunks travel as binary frames so payloads are never re-encoded:
//!
//! ```text
//! +-----------------+----------------------+-----------------+
//! | header len (4B) | JSON chunk header    | raw payload     |
//! | u32 big endian  | (ChunkHeader)        | (rest of frame) |
//! +-----------------+----------------------+-----------------+
//! ```
//!
//! The same frame layout is used in both directions.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::types::{ConnectionId, FileDescriptor, RelayError, MAX_CHUNK_HEADER_BYTES};

const LENGTH_PREFIX: usize = 4;

// ============================================================================
// Payloads shared by both directions
// ============================================================================

/// File metadata announcing one transfer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileMeta {
    pub transfer_id: String,
    pub session_id: String,
    pub filename: String,
    pub total_size: u64,
    pub chunk_size: u64,
    #[serde(rename = "type", default)]
    pub mime_type: String,
    /// Receiver id or connection handle the sender is aiming at
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub receiver_id: Option<String>,
}

/// Receiver asking the sender for one chunk
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PullRequest {
    pub session_id: String,
    pub transfer_id: String,
    pub receiver_id: String,
    /// Index wanted; the sender serves its own cursor when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chunk_index: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sender_connection_id: Option<String>,
}

/// JSON header of a binary chunk frame
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChunkHeader {
    pub session_id: String,
    pub transfer_id: String,
    pub chunk_index: u64,
    pub total_chunks: u64,
    pub is_last_chunk: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub receiver_id: Option<String>,
}

/// One chunk: header plus opaque payload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkFrame {
    pub header: ChunkHeader,
    pub payload: Vec<u8>,
}

impl ChunkFrame {
    /// Encode as `len | header | payload`
    pub fn encode(&self) -> Result<Vec<u8>, RelayError> {
        let header = serde_json::to_vec(&self.header)?;
        if header.len() > MAX_CHUNK_HEADER_BYTES {
            return Err(RelayError::HeaderTooLarge(header.len()));
        }

        let mut frame = Vec::with_capacity(LENGTH_PREFIX + header.len() + self.payload.len());
        frame.extend_from_slice(&(header.len() as u32).to_be_bytes());
        frame.extend_from_slice(&header);
        frame.extend_from_slice(&self.payload);
        Ok(frame)
    }

    /// Decode a binary frame
    pub fn decode(frame: &[u8]) -> Result<Self, RelayError> {
        if frame.len() < LENGTH_PREFIX {
            return Err(RelayError::FrameTooShort(frame.len()));
        }

        let (prefix, rest) = frame.split_at(LENGTH_PREFIX);
        let declared = u32::from_be_bytes([prefix[0], prefix[1], prefix[2], prefix[3]]) as usize;
        if declared > MAX_CHUNK_HEADER_BYTES {
            return Err(RelayError::HeaderTooLarge(declared));
        }
        if declared > rest.len() {
            return Err(RelayError::HeaderLength {
                declared,
                available: rest.len(),
            });
        }

        let (header, payload) = rest.split_at(declared);
        Ok(Self {
            header: serde_json::from_slice(header)?,
            payload: payload.to_vec(),
        })
    }
}

// ============================================================================
// Client -> Relay
// ============================================================================

/// Messages a client sends to the relay
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "kebab-case")]
pub enum ClientMessage {
    #[serde(rename_all = "camelCase")]
    SenderJoin {
        session_id: String,
        #[serde(default)]
        user_id: Option<String>,
        #[serde(default)]
        files: Vec<FileDescriptor>,
    },

    #[serde(rename_all = "camelCase")]
    ReceiverJoin {
        session_id: String,
        receiver_id: String,
        #[serde(default)]
        user_id: Option<String>,
    },

    FileMeta(FileMeta),

    PullChunk(PullRequest),

    #[serde(rename_all = "camelCase")]
    TransferComplete {
        session_id: String,
        filename: String,
        #[serde(default)]
        transfer_id: Option<String>,
    },

    #[serde(rename_all = "camelCase")]
    StatusUpdate {
        session_id: String,
        receiver_id: String,
        #[serde(default)]
        user_id: Option<String>,
        #[serde(default)]
        status: Map<String, Value>,
    },

    #[serde(rename_all = "camelCase")]
    Heartbeat {
        session_id: String,
        receiver_id: String,
        #[serde(default)]
        user_id: Option<String>,
    },

    #[serde(rename_all = "camelCase")]
    CheckReceivers {
        session_id: String,
        #[serde(default)]
        request_id: Option<String>,
    },

    /// Arrives as a binary frame, never as JSON text
    #[serde(skip)]
    Chunk(ChunkFrame),
}

impl ClientMessage {
    /// Event name, for logging
    pub fn name(&self) -> &'static str {
        match self {
            ClientMessage::SenderJoin { .. } => "sender-join",
            ClientMessage::ReceiverJoin { .. } => "receiver-join",
            ClientMessage::FileMeta(_) => "file-meta",
            ClientMessage::PullChunk(_) => "pull-chunk",
            ClientMessage::TransferComplete { .. } => "transfer-complete",
            ClientMessage::StatusUpdate { .. } => "status-update",
            ClientMessage::Heartbeat { .. } => "heartbeat",
            ClientMessage::CheckReceivers { .. } => "check-receivers",
            ClientMessage::Chunk(_) => "chunk",
        }
    }

    /// Decode a JSON text frame
    pub fn from_text(text: &str) -> Result<Self, RelayError> {
        let message: ClientMessage = serde_json::from_str(text)?;
        message.validate()?;
        Ok(message)
    }

    /// Decode a binary chunk frame
    pub fn from_binary(frame: &[u8]) -> Result<Self, RelayError> {
        let message = ClientMessage::Chunk(ChunkFrame::decode(frame)?);
        message.validate()?;
        Ok(message)
    }

    /// Encode for the wire (used by clients and tests)
    pub fn to_wire(&self) -> Result<WireFrame, RelayError> {
        match self {
            ClientMessage::Chunk(frame) => Ok(WireFrame::Binary(frame.encode()?)),
            other => Ok(WireFrame::Text(serde_json::to_string(other)?)),
        }
    }

    /// Reject messages missing a required identifier
    fn validate(&self) -> Result<(), RelayError> {
        let required: Vec<(&str, &str)> = match self {
            ClientMessage::SenderJoin { .. } => Vec::new(),
            ClientMessage::ReceiverJoin {
                session_id,
                receiver_id,
                ..
            } => vec![("sessionId", session_id.as_str()), ("receiverId", receiver_id.as_str())],
            ClientMessage::FileMeta(meta) => {
                if meta.chunk_size == 0 {
                    return Err(RelayError::InvalidMessage("chunkSize must be positive".into()));
                }
                vec![("sessionId", meta.session_id.as_str()), ("transferId", meta.transfer_id.as_str())]
            }
            ClientMessage::PullChunk(pull) => {
                vec![("sessionId", pull.session_id.as_str()), ("transferId", pull.transfer_id.as_str())]
            }
            ClientMessage::TransferComplete { session_id, .. }
            | ClientMessage::StatusUpdate { session_id, .. }
            | ClientMessage::Heartbeat { session_id, .. }
            | ClientMessage::CheckReceivers { session_id, .. } => {
                vec![("sessionId", session_id.as_str())]
            }
            ClientMessage::Chunk(frame) => vec![
                ("sessionId", frame.header.session_id.as_str()),
                ("transferId", frame.header.transfer_id.as_str()),
            ],
        };

        match required.iter().find(|(_, value)| value.trim().is_empty()) {
            Some((field, _)) => Err(RelayError::InvalidMessage(format!("missing {}", field))),
            None => Ok(()),
        }
    }
}

// ============================================================================
// Relay -> Client
// ============================================================================

/// Events the relay sends to a client
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "kebab-case")]
pub enum ServerEvent {
    #[serde(rename_all = "camelCase")]
    Connected { connection_id: ConnectionId },

    /// Ack to a sender-join
    #[serde(rename_all = "camelCase")]
    Registered { session_id: String, replaced: bool },

    /// Ack to a receiver-join
    #[serde(rename_all = "camelCase")]
    Joined {
        session_id: String,
        matched: bool,
        sender_connection_id: Option<ConnectionId>,
    },

    /// A receiver attached to the sender's session
    #[serde(rename_all = "camelCase")]
    Init {
        receiver_id: String,
        connection_id: ConnectionId,
        user_id: Option<String>,
    },

    FileMeta(FileMeta),

    PullChunk(PullRequest),

    #[serde(rename_all = "camelCase")]
    TransferComplete {
        session_id: String,
        filename: String,
        transfer_id: Option<String>,
        receiver_id: Option<String>,
        connection_id: ConnectionId,
    },

    #[serde(rename_all = "camelCase")]
    ReceiverStatus {
        session_id: String,
        receiver_id: String,
        connection_id: ConnectionId,
        user_id: Option<String>,
        status: Map<String, Value>,
    },

    #[serde(rename_all = "camelCase")]
    ReceiverHeartbeat {
        session_id: String,
        receiver_id: String,
        connection_id: ConnectionId,
        user_id: Option<String>,
    },

    /// Reply to check-receivers
    #[serde(rename_all = "camelCase")]
    Receivers {
        session_id: String,
        request_id: Option<String>,
        has_receivers: bool,
        receiver_id: Option<String>,
        connection_id: Option<ConnectionId>,
    },

    #[serde(rename_all = "camelCase")]
    ReceiverNotFound {
        session_id: String,
        transfer_id: Option<String>,
        filename: Option<String>,
        chunk_index: Option<u64>,
    },

    #[serde(rename_all = "camelCase")]
    SenderNotFound {
        session_id: String,
        transfer_id: Option<String>,
        receiver_id: Option<String>,
    },

    #[serde(rename_all = "camelCase")]
    SenderLeft { session_id: String },

    #[serde(rename_all = "camelCase")]
    SessionReplaced { session_id: String },

    #[serde(rename_all = "camelCase")]
    ReceiverLeft {
        session_id: String,
        receiver_id: String,
        connection_id: ConnectionId,
    },

    /// Sent as a binary frame
    #[serde(skip)]
    Chunk(ChunkFrame),
}

impl ServerEvent {
    /// Event name, for logging
    pub fn name(&self) -> &'static str {
        match self {
            ServerEvent::Connected { .. } => "connected",
            ServerEvent::Registered { .. } => "registered",
            ServerEvent::Joined { .. } => "joined",
            ServerEvent::Init { .. } => "init",
            ServerEvent::FileMeta(_) => "file-meta",
            ServerEvent::PullChunk(_) => "pull-chunk",
            ServerEvent::TransferComplete { .. } => "transfer-complete",
            ServerEvent::ReceiverStatus { .. } => "receiver-status",
            ServerEvent::ReceiverHeartbeat { .. } => "receiver-heartbeat",
            ServerEvent::Receivers { .. } => "receivers",
            ServerEvent::ReceiverNotFound { .. } => "receiver-not-found",
            ServerEvent::SenderNotFound { .. } => "sender-not-found",
            ServerEvent::SenderLeft { .. } => "sender-left",
            ServerEvent::SessionReplaced { .. } => "session-replaced",
            ServerEvent::ReceiverLeft { .. } => "receiver-left",
            ServerEvent::Chunk(_) => "chunk",
        }
    }

    /// Encode for the wire
    pub fn to_wire(&self) -> Result<WireFrame, RelayError> {
        match self {
            ServerEvent::Chunk(frame) => Ok(WireFrame::Binary(frame.encode()?)),
            other => Ok(WireFrame::Text(serde_json::to_string(other)?)),
        }
    }

    /// Decode a frame received from the relay (client side)
    pub fn from_wire(frame: &WireFrame) -> Result<Self, RelayError> {
        match frame {
            WireFrame::Text(text) => Ok(serde_json::from_str(text)?),
            WireFrame::Binary(bytes) => Ok(ServerEvent::Chunk(ChunkFrame::decode(bytes)?)),
        }
    }
}

/// Transport-neutral frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WireFrame {
    Text(String),
    Binary(Vec<u8>),
}
