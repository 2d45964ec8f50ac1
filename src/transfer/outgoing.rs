//! Sender side of a transfer
//!
//! Holds the file content and answers each pull with exactly one chunk.
//! Nothing is pushed unprompted.

use uuid::Uuid;

use super::types::{ChunkPlan, FailureReason, Transfer, TransferError, TransferState};
use crate::relay::protocol::{ChunkFrame, ChunkHeader, ClientMessage, FileMeta, PullRequest, ServerEvent};

#[derive(Debug, Clone)]
pub struct OutgoingTransfer {
    transfer: Transfer,
    content: Vec<u8>,
    receiver_id: Option<String>,
    /// Next index served when a pull names none
    cursor: u64,
}

impl OutgoingTransfer {
    /// Prepare a file for sending under a fresh transfer id
    pub fn new(
        session_id: &str,
        filename: &str,
        mime_type: &str,
        content: Vec<u8>,
        chunk_size: u64,
    ) -> Result<Self, TransferError> {
        let transfer_id = Uuid::new_v4().to_string();
        Self::with_id(session_id, &transfer_id, filename, mime_type, content, chunk_size)
    }

    pub fn with_id(
        session_id: &str,
        transfer_id: &str,
        filename: &str,
        mime_type: &str,
        content: Vec<u8>,
        chunk_size: u64,
    ) -> Result<Self, TransferError> {
        let plan = ChunkPlan::new(content.len() as u64, chunk_size)?;
        Ok(Self {
            transfer: Transfer::new(session_id, transfer_id, filename, mime_type, plan),
            content,
            receiver_id: None,
            cursor: 0,
        })
    }

    /// Aim the transfer at one receiver (receiver id or connection handle)
    pub fn with_receiver(mut self, receiver_id: impl Into<String>) -> Self {
        self.receiver_id = Some(receiver_id.into());
        self
    }

    pub fn transfer(&self) -> &Transfer {
        &self.transfer
    }

    pub fn state(&self) -> TransferState {
        self.transfer.state
    }

    /// The `file-meta` message that opens the transfer
    pub fn announce(&self) -> ClientMessage {
        ClientMessage::FileMeta(FileMeta {
            transfer_id: self.transfer.transfer_id.clone(),
            session_id: self.transfer.session_id.clone(),
            filename: self.transfer.filename.clone(),
            total_size: self.transfer.plan.total_size,
            chunk_size: self.transfer.plan.chunk_size,
            mime_type: self.transfer.mime_type.clone(),
            receiver_id: self.receiver_id.clone(),
        })
    }

    /// Answer one pull with exactly one chunk
    pub fn serve_pull(&mut self, pull: &PullRequest) -> Result<ChunkFrame, TransferError> {
        if self.transfer.is_terminal() {
            return Err(TransferError::Closed(self.transfer.state));
        }
        if pull.transfer_id != self.transfer.transfer_id {
            return Err(TransferError::WrongTransfer(pull.transfer_id.clone()));
        }

        let plan = self.transfer.plan;
        let index = pull.chunk_index.unwrap_or(self.cursor);
        let range = plan
            .chunk_range(index)
            .ok_or(TransferError::ChunkOutOfRange {
                index,
                total: plan.total_chunks(),
            })?;

        // A file's length fits in usize, so do its chunk bounds
        let payload = self.content[range.start as usize..range.end as usize].to_vec();

        self.cursor = index + 1;
        self.transfer.chunks_transmitted += 1;
        self.transfer.bytes_transmitted = self.transfer.bytes_transmitted.max(range.end);

        tracing::trace!(
            transfer_id = %self.transfer.transfer_id,
            chunk_index = index,
            len = payload.len(),
            "Serving chunk"
        );

        Ok(ChunkFrame {
            header: ChunkHeader {
                session_id: self.transfer.session_id.clone(),
                transfer_id: self.transfer.transfer_id.clone(),
                chunk_index: index,
                total_chunks: plan.total_chunks(),
                is_last_chunk: plan.is_last(index),
                receiver_id: Some(pull.receiver_id.clone()),
            },
            payload,
        })
    }

    /// Apply a relay event; true when it changed the transfer's state
    pub fn on_event(&mut self, event: &ServerEvent) -> bool {
        match event {
            ServerEvent::TransferComplete {
                session_id,
                filename,
                transfer_id,
                ..
            } if *session_id == self.transfer.session_id => {
                let ours = match transfer_id {
                    Some(id) => *id == self.transfer.transfer_id,
                    None => *filename == self.transfer.filename,
                };
                ours && self.transfer.complete()
            }
            ServerEvent::ReceiverLeft {
                session_id,
                receiver_id,
                connection_id,
            } if *session_id == self.transfer.session_id => {
                let ours = match &self.receiver_id {
                    Some(target) => *target == *receiver_id || *target == connection_id.to_string(),
                    None => true,
                };
                ours && self.transfer.fail(FailureReason::ReceiverLeft)
            }
            ServerEvent::ReceiverNotFound {
                transfer_id: Some(transfer_id),
                ..
            } if *transfer_id == self.transfer.transfer_id => {
                self.transfer.fail(FailureReason::ReceiverNotFound)
            }
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::relay::types::ConnectionId;

    fn pull(transfer_id: &str, index: Option<u64>) -> PullRequest {
        PullRequest {
            session_id: "S".to_string(),
            transfer_id: transfer_id.to_string(),
            receiver_id: "r".to_string(),
            chunk_index: index,
            sender_connection_id: None,
        }
    }

    #[test]
    fn test_announce_carries_plan() {
        let outgoing = OutgoingTransfer::with_id("S", "t", "a.bin", "application/octet-stream", vec![0; 10], 4)
            .unwrap()
            .with_receiver("r");

        match outgoing.announce() {
            ClientMessage::FileMeta(meta) => {
                assert_eq!(meta.total_size, 10);
                assert_eq!(meta.chunk_size, 4);
                assert_eq!(meta.receiver_id.as_deref(), Some("r"));
            }
            other => panic!("unexpected message: {:?}", other),
        }
    }

    #[test]
    fn test_serve_pull_follows_cursor() {
        let content: Vec<u8> = (0..10).collect();
        let mut outgoing = OutgoingTransfer::with_id("S", "t", "a", "", content, 4).unwrap();

        let first = outgoing.serve_pull(&pull("t", None)).unwrap();
        assert_eq!(first.header.chunk_index, 0);
        assert_eq!(first.payload, vec![0, 1, 2, 3]);
        assert!(!first.header.is_last_chunk);

        let second = outgoing.serve_pull(&pull("t", None)).unwrap();
        assert_eq!(second.header.chunk_index, 1);

        let last = outgoing.serve_pull(&pull("t", None)).unwrap();
        assert_eq!(last.payload, vec![8, 9]);
        assert!(last.header.is_last_chunk);
        assert_eq!(last.header.total_chunks, 3);
        assert_eq!(outgoing.transfer().bytes_transmitted, 10);
    }

    #[test]
    fn test_serve_pull_explicit_index() {
        let mut outgoing = OutgoingTransfer::with_id("S", "t", "a", "", vec![1; 10], 4).unwrap();
        let frame = outgoing.serve_pull(&pull("t", Some(1))).unwrap();
        assert_eq!(frame.header.chunk_index, 1);

        // Re-serving an earlier chunk does not inflate the byte count
        outgoing.serve_pull(&pull("t", Some(0))).unwrap();
        assert_eq!(outgoing.transfer().bytes_transmitted, 8);
    }

    #[test]
    fn test_serve_pull_out_of_range() {
        let mut outgoing = OutgoingTransfer::with_id("S", "t", "a", "", vec![1; 10], 4).unwrap();
        assert_eq!(
            outgoing.serve_pull(&pull("t", Some(3))),
            Err(TransferError::ChunkOutOfRange { index: 3, total: 3 })
        );
        assert!(matches!(
            outgoing.serve_pull(&pull("other", None)),
            Err(TransferError::WrongTransfer(_))
        ));
    }

    #[test]
    fn test_completion_event() {
        let mut outgoing = OutgoingTransfer::with_id("S", "t", "a", "", vec![1; 4], 4).unwrap();
        let event = ServerEvent::TransferComplete {
            session_id: "S".to_string(),
            filename: "a".to_string(),
            transfer_id: Some("t".to_string()),
            receiver_id: Some("r".to_string()),
            connection_id: ConnectionId::new(),
        };

        assert!(outgoing.on_event(&event));
        assert!(!outgoing.on_event(&event));
        assert_eq!(outgoing.state(), TransferState::Completed);
        assert!(matches!(
            outgoing.serve_pull(&pull("t", None)),
            Err(TransferError::Closed(TransferState::Completed))
        ));
    }

    #[test]
    fn test_receiver_left_fails_transfer() {
        let mut outgoing = OutgoingTransfer::with_id("S", "t", "a", "", vec![1; 4], 4)
            .unwrap()
            .with_receiver("r");

        let other = ServerEvent::ReceiverLeft {
            session_id: "S".to_string(),
            receiver_id: "someone-else".to_string(),
            connection_id: ConnectionId::new(),
        };
        assert!(!outgoing.on_event(&other));

        let ours = ServerEvent::ReceiverLeft {
            session_id: "S".to_string(),
            receiver_id: "r".to_string(),
            connection_id: ConnectionId::new(),
        };
        assert!(outgoing.on_event(&ours));
        assert_eq!(outgoing.state(), TransferState::Failed);
        assert_eq!(outgoing.transfer().failure, Some(FailureReason::ReceiverLeft));
    }
}
