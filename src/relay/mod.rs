//! Rendezvous Relay
//!
//! Lets an anonymous sender and receiver find each other through a shared
//! session id, then moves files between them chunk by chunk:
//! - Connection registry and session directory behind one lock
//! - Layered resolver for finding the counterpart of a message
//! - Pull-based chunk forwarding, one chunk in flight per transfer
//! - Receiver presence (heartbeats, status updates)
//!
//! Protocol Flow:
//! 1. Sender joins with a session id
//! 2. Receiver joins the same session id; sender gets `init`
//! 3. Sender announces a file (`file-meta`), forwarded to the receiver
//! 4. Receiver pulls a chunk, sender answers with exactly one chunk
//! 5. Repeat until the last chunk; receiver reports `transfer-complete`
//! 6. Either side disconnecting notifies the other

pub mod connection;
pub mod directory;
pub mod hub;
pub mod ledger;
pub mod presence;
pub mod protocol;
pub mod resolver;
pub mod types;

pub use connection::serve_socket;
pub use directory::{Directory, DirectorySnapshot, Outbox, Removal};
pub use hub::{Relay, RelayStats, SessionSummary};
pub use ledger::{RelayPhase, RelayedTransfer, TransferKey, TransferLedger};
pub use presence::PresenceMonitor;
pub use protocol::{ChunkFrame, ChunkHeader, ClientMessage, FileMeta, PullRequest, ServerEvent, WireFrame};
pub use resolver::{Direction, Lookup, MatchedBy, Resolution};
pub use types::*;
