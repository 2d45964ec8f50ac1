//! Endpoint transfer model
//!
//! What a sender or receiver keeps for each file it moves through the relay.
//! The relay itself never reassembles anything; these types are for clients
//! and for exercising the relay end to end.

pub mod incoming;
pub mod outgoing;
pub mod types;

pub use incoming::{ChunkOutcome, IncomingTransfer};
pub use outgoing::OutgoingTransfer;
pub use types::*;
