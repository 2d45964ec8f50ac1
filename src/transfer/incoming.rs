//! Receiver side of a transfer
//!
//! Pulls chunks strictly in order, one at a time, and reassembles them.
//! The byte count decides completion: the transfer completes when exactly
//! `total_size` bytes have arrived, whatever the last-chunk flag says.

use super::types::{ChunkPlan, FailureReason, Transfer, TransferError, TransferState};
use crate::relay::protocol::{ChunkFrame, ClientMessage, FileMeta, PullRequest, ServerEvent};

/// What to do after accepting a chunk
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChunkOutcome {
    /// More bytes expected; issue this pull next
    Pull(PullRequest),
    /// All bytes arrived
    Completed,
}

#[derive(Debug, Clone)]
pub struct IncomingTransfer {
    transfer: Transfer,
    receiver_id: String,
    sender_connection_id: Option<String>,
    chunks: Vec<Vec<u8>>,
    next_index: u64,
}

impl IncomingTransfer {
    /// Start tracking an announced file
    ///
    /// An empty file is complete on arrival.
    pub fn from_meta(meta: &FileMeta, receiver_id: &str) -> Result<Self, TransferError> {
        let plan = ChunkPlan::new(meta.total_size, meta.chunk_size)?;
        let mut transfer = Transfer::new(
            &meta.session_id,
            &meta.transfer_id,
            &meta.filename,
            &meta.mime_type,
            plan,
        );
        if plan.total_size == 0 {
            transfer.complete();
        }

        Ok(Self {
            transfer,
            receiver_id: receiver_id.to_string(),
            sender_connection_id: None,
            chunks: Vec::new(),
            next_index: 0,
        })
    }

    /// Route pulls to a specific sender connection
    pub fn with_sender_connection(mut self, connection_id: impl Into<String>) -> Self {
        self.sender_connection_id = Some(connection_id.into());
        self
    }

    pub fn transfer(&self) -> &Transfer {
        &self.transfer
    }

    pub fn state(&self) -> TransferState {
        self.transfer.state
    }

    /// The pull for the next missing chunk, if the transfer is still open
    pub fn next_pull(&self) -> Option<PullRequest> {
        if self.transfer.is_terminal() {
            return None;
        }
        Some(PullRequest {
            session_id: self.transfer.session_id.clone(),
            transfer_id: self.transfer.transfer_id.clone(),
            receiver_id: self.receiver_id.clone(),
            chunk_index: Some(self.next_index),
            sender_connection_id: self.sender_connection_id.clone(),
        })
    }

    /// Accept the chunk answering the outstanding pull
    ///
    /// Duplicates and gaps are rejected without touching state. Overflow and
    /// a last-chunk flag that arrives short of `total_size` fail the transfer.
    pub fn accept_chunk(&mut self, frame: &ChunkFrame) -> Result<ChunkOutcome, TransferError> {
        if self.transfer.is_terminal() {
            return Err(TransferError::Closed(self.transfer.state));
        }

        let header = &frame.header;
        if header.transfer_id != self.transfer.transfer_id
            || header.session_id != self.transfer.session_id
        {
            return Err(TransferError::WrongTransfer(header.transfer_id.clone()));
        }
        if header.chunk_index != self.next_index {
            return Err(TransferError::UnexpectedChunk {
                expected: self.next_index,
                got: header.chunk_index,
            });
        }

        let total = self.transfer.plan.total_size;
        let received = self.transfer.bytes_transmitted + frame.payload.len() as u64;
        if received > total {
            self.transfer.fail(FailureReason::Overflow);
            return Err(TransferError::Overflow { received, total });
        }

        self.chunks.push(frame.payload.clone());
        self.transfer.bytes_transmitted = received;
        self.transfer.chunks_transmitted += 1;
        self.next_index += 1;

        if received == total {
            self.transfer.complete();
            return Ok(ChunkOutcome::Completed);
        }
        if header.is_last_chunk {
            self.transfer.fail(FailureReason::Truncated);
            return Err(TransferError::Truncated { received, total });
        }

        match self.next_pull() {
            Some(pull) => Ok(ChunkOutcome::Pull(pull)),
            None => Err(TransferError::Closed(self.transfer.state)),
        }
    }

    /// The reassembled file, once complete
    pub fn assemble(&self) -> Option<Vec<u8>> {
        if self.transfer.state != TransferState::Completed {
            return None;
        }
        Some(self.chunks.concat())
    }

    /// The `transfer-complete` report for the sender, once complete
    pub fn completion_notice(&self) -> Option<ClientMessage> {
        if self.transfer.state != TransferState::Completed {
            return None;
        }
        Some(ClientMessage::TransferComplete {
            session_id: self.transfer.session_id.clone(),
            filename: self.transfer.filename.clone(),
            transfer_id: Some(self.transfer.transfer_id.clone()),
        })
    }

    /// Apply a relay event; true when it changed the transfer's state
    pub fn on_event(&mut self, event: &ServerEvent) -> bool {
        let reason = match event {
            ServerEvent::SenderLeft { session_id } if *session_id == self.transfer.session_id => {
                FailureReason::SenderLeft
            }
            ServerEvent::SessionReplaced { session_id }
                if *session_id == self.transfer.session_id =>
            {
                FailureReason::SessionReplaced
            }
            ServerEvent::SenderNotFound {
                session_id,
                transfer_id,
                ..
            } if *session_id == self.transfer.session_id
                && transfer_id
                    .as_ref()
                    .map_or(true, |id| *id == self.transfer.transfer_id) =>
            {
                FailureReason::SenderNotFound
            }
            _ => return false,
        };
        self.transfer.fail(reason)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::relay::protocol::ChunkHeader;

    fn meta(total_size: u64, chunk_size: u64) -> FileMeta {
        FileMeta {
            transfer_id: "t".to_string(),
            session_id: "S".to_string(),
            filename: "a.bin".to_string(),
            total_size,
            chunk_size,
            mime_type: String::new(),
            receiver_id: Some("r".to_string()),
        }
    }

    fn chunk(index: u64, payload: Vec<u8>, is_last_chunk: bool) -> ChunkFrame {
        ChunkFrame {
            header: ChunkHeader {
                session_id: "S".to_string(),
                transfer_id: "t".to_string(),
                chunk_index: index,
                total_chunks: 3,
                is_last_chunk,
                receiver_id: Some("r".to_string()),
            },
            payload,
        }
    }

    #[test]
    fn test_first_pull() {
        let incoming = IncomingTransfer::from_meta(&meta(10, 4), "r")
            .unwrap()
            .with_sender_connection("conn");
        let pull = incoming.next_pull().unwrap();
        assert_eq!(pull.chunk_index, Some(0));
        assert_eq!(pull.receiver_id, "r");
        assert_eq!(pull.sender_connection_id.as_deref(), Some("conn"));
    }

    #[test]
    fn test_in_order_reassembly() {
        let mut incoming = IncomingTransfer::from_meta(&meta(10, 4), "r").unwrap();

        let next = incoming.accept_chunk(&chunk(0, vec![0, 1, 2, 3], false)).unwrap();
        assert!(matches!(next, ChunkOutcome::Pull(PullRequest { chunk_index: Some(1), .. })));
        incoming.accept_chunk(&chunk(1, vec![4, 5, 6, 7], false)).unwrap();
        let done = incoming.accept_chunk(&chunk(2, vec![8, 9], true)).unwrap();

        assert_eq!(done, ChunkOutcome::Completed);
        assert_eq!(incoming.assemble().unwrap(), (0..10).collect::<Vec<u8>>());
        assert!(incoming.next_pull().is_none());
        assert!(matches!(
            incoming.completion_notice(),
            Some(ClientMessage::TransferComplete { .. })
        ));
    }

    #[test]
    fn test_duplicate_and_gap_rejected() {
        let mut incoming = IncomingTransfer::from_meta(&meta(10, 4), "r").unwrap();
        incoming.accept_chunk(&chunk(0, vec![0; 4], false)).unwrap();

        assert_eq!(
            incoming.accept_chunk(&chunk(0, vec![0; 4], false)),
            Err(TransferError::UnexpectedChunk { expected: 1, got: 0 })
        );
        assert_eq!(
            incoming.accept_chunk(&chunk(2, vec![0; 2], true)),
            Err(TransferError::UnexpectedChunk { expected: 1, got: 2 })
        );
        assert_eq!(incoming.transfer().bytes_transmitted, 4);
        assert_eq!(incoming.state(), TransferState::Pending);
    }

    #[test]
    fn test_overflow_fails() {
        let mut incoming = IncomingTransfer::from_meta(&meta(4, 4), "r").unwrap();
        assert_eq!(
            incoming.accept_chunk(&chunk(0, vec![0; 6], true)),
            Err(TransferError::Overflow { received: 6, total: 4 })
        );
        assert_eq!(incoming.transfer().failure, Some(FailureReason::Overflow));
        assert!(incoming.assemble().is_none());
    }

    #[test]
    fn test_last_flag_short_of_total_fails() {
        let mut incoming = IncomingTransfer::from_meta(&meta(10, 4), "r").unwrap();
        assert_eq!(
            incoming.accept_chunk(&chunk(0, vec![0; 4], true)),
            Err(TransferError::Truncated { received: 4, total: 10 })
        );
        assert_eq!(incoming.state(), TransferState::Failed);
    }

    #[test]
    fn test_byte_count_completes_without_flag() {
        let mut incoming = IncomingTransfer::from_meta(&meta(4, 4), "r").unwrap();
        assert_eq!(
            incoming.accept_chunk(&chunk(0, vec![9; 4], false)).unwrap(),
            ChunkOutcome::Completed
        );
    }

    #[test]
    fn test_empty_file_completes_immediately() {
        let incoming = IncomingTransfer::from_meta(&meta(0, 65_536), "r").unwrap();
        assert_eq!(incoming.state(), TransferState::Completed);
        assert!(incoming.next_pull().is_none());
        assert_eq!(incoming.assemble().unwrap(), Vec::<u8>::new());
        assert!(incoming.completion_notice().is_some());
    }

    #[test]
    fn test_sender_left_fails_once() {
        let mut incoming = IncomingTransfer::from_meta(&meta(10, 4), "r").unwrap();
        let event = ServerEvent::SenderLeft {
            session_id: "S".to_string(),
        };
        assert!(incoming.on_event(&event));
        assert!(!incoming.on_event(&event));
        assert_eq!(incoming.transfer().failure, Some(FailureReason::SenderLeft));

        let other = ServerEvent::SenderLeft {
            session_id: "elsewhere".to_string(),
        };
        let mut fresh = IncomingTransfer::from_meta(&meta(10, 4), "r").unwrap();
        assert!(!fresh.on_event(&other));
    }
}
