//! Relay hub
//!
//! Dispatches every inbound client message and owns the one cleanup routine
//! run when a connection goes away.

use std::sync::Arc;

use serde::Serialize;

use super::directory::{Directory, DirectorySnapshot, Outbox, Removal};
use super::ledger::{ChunkCheck, LedgerTotals, PullCheck, RelayedTransfer, TransferKey, TransferLedger};
use super::presence::{PresenceMonitor, ReceiverPresence};
use super::protocol::{ChunkFrame, ClientMessage, FileMeta, PullRequest, ServerEvent};
use super::resolver::Lookup;
use super::types::{
    ConnectionId, FileDescriptor, ReceiverAttachment, RegisterOutcome, RelayError,
    SenderRegistration,
};

/// Shared relay: directory plus transfer ledger
#[derive(Clone, Default)]
pub struct Relay {
    inner: Arc<RelayInner>,
}

#[derive(Default)]
struct RelayInner {
    directory: Directory,
    ledger: TransferLedger,
}

impl Relay {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn directory(&self) -> &Directory {
        &self.inner.directory
    }

    pub fn ledger(&self) -> &TransferLedger {
        &self.inner.ledger
    }

    // ========================================================================
    // Connection Lifecycle
    // ========================================================================

    /// Admit a new connection
    pub fn connect(&self, outbox: Outbox) -> ConnectionId {
        let id = self.inner.directory.connect(outbox);
        tracing::info!(connection_id = %id, "Client connected");
        id
    }

    /// Forget a connection and notify whoever was relying on it
    ///
    /// Safe to call more than once; later calls do nothing.
    pub fn disconnect(&self, id: ConnectionId) -> Removal {
        let removal = self.inner.directory.remove_connection(id);
        if !removal.found {
            return removal;
        }

        let failed = self.inner.ledger.drop_connection(id);
        tracing::info!(
            connection_id = %id,
            sender_session = ?removal.sender_session,
            receiver = ?removal.receiver,
            failed_transfers = failed.len(),
            "Client disconnected"
        );
        removal
    }

    // ========================================================================
    // Dispatch
    // ========================================================================

    /// Handle one message from a connection
    pub fn handle(&self, from: ConnectionId, message: ClientMessage) {
        tracing::debug!(connection_id = %from, event = message.name(), "Message received");

        match message {
            ClientMessage::SenderJoin {
                session_id,
                user_id,
                files,
            } => {
                self.sender_join(from, &session_id, user_id, files);
            }
            ClientMessage::ReceiverJoin {
                session_id,
                receiver_id,
                user_id,
            } => {
                self.inner
                    .directory
                    .attach_receiver(from, &session_id, &receiver_id, user_id);
            }
            ClientMessage::FileMeta(meta) => self.forward_file_meta(from, meta),
            ClientMessage::PullChunk(pull) => self.forward_pull(from, pull),
            ClientMessage::Chunk(frame) => self.forward_chunk(from, frame),
            ClientMessage::TransferComplete {
                session_id,
                filename,
                transfer_id,
            } => self.forward_completion(from, session_id, filename, transfer_id),
            ClientMessage::StatusUpdate {
                session_id,
                receiver_id,
                user_id,
                status,
            } => {
                PresenceMonitor::new(&self.inner.directory).status_update(
                    from,
                    &session_id,
                    &receiver_id,
                    user_id,
                    status,
                );
            }
            ClientMessage::Heartbeat {
                session_id,
                receiver_id,
                user_id,
            } => {
                PresenceMonitor::new(&self.inner.directory).heartbeat(
                    from,
                    &session_id,
                    &receiver_id,
                    user_id,
                );
            }
            ClientMessage::CheckReceivers {
                session_id,
                request_id,
            } => self.check_receivers(from, session_id, request_id),
        }
    }

    /// Drop a message that failed to decode
    pub fn reject(&self, from: ConnectionId, error: &RelayError) {
        tracing::debug!(connection_id = %from, error = %error, "Dropping malformed message");
    }

    // ========================================================================
    // Handlers
    // ========================================================================

    fn sender_join(
        &self,
        from: ConnectionId,
        session_id: &str,
        user_id: Option<String>,
        files: Vec<FileDescriptor>,
    ) {
        let file_count = files.len();
        let outcome = self
            .inner
            .directory
            .register_sender(from, session_id, user_id, files);

        match outcome {
            RegisterOutcome::Ignored => {
                tracing::debug!(connection_id = %from, "sender-join without session id ignored");
            }
            RegisterOutcome::Replaced { previous, .. } => {
                // The displaced sender's transfers can no longer be served
                let failed = self.inner.ledger.drop_connection(previous);
                tracing::debug!(
                    session_id = %session_id,
                    failed_transfers = failed.len(),
                    "Transfers of displaced sender dropped"
                );
            }
            RegisterOutcome::Registered | RegisterOutcome::Refreshed => {
                tracing::debug!(session_id = %session_id, files = file_count, "Session files declared");
            }
        }
    }

    fn forward_file_meta(&self, from: ConnectionId, meta: FileMeta) {
        let lookup = Lookup::to_receiver(&meta.session_id, meta.receiver_id.as_deref());
        let routed = self.inner.directory.route(&lookup, |target| {
            ServerEvent::FileMeta(FileMeta {
                receiver_id: target.receiver_id.clone(),
                ..meta.clone()
            })
        });

        match routed {
            Some(target) => {
                self.inner.ledger.announce(&meta, from, target.connection);
            }
            None => {
                tracing::info!(
                    connection_id = %from,
                    session_id = %meta.session_id,
                    transfer_id = %meta.transfer_id,
                    "No receiver for file metadata"
                );
                self.inner.directory.send_to(
                    from,
                    ServerEvent::ReceiverNotFound {
                        session_id: meta.session_id,
                        transfer_id: Some(meta.transfer_id),
                        filename: Some(meta.filename),
                        chunk_index: None,
                    },
                );
            }
        }
    }

    fn forward_pull(&self, from: ConnectionId, pull: PullRequest) {
        let lookup = Lookup::to_sender(
            &pull.session_id,
            Some(pull.receiver_id.as_str()),
            pull.sender_connection_id.as_deref(),
        );
        let routed = self
            .inner
            .directory
            .route(&lookup, |_| ServerEvent::PullChunk(pull.clone()));

        if routed.is_none() {
            tracing::info!(
                connection_id = %from,
                session_id = %pull.session_id,
                transfer_id = %pull.transfer_id,
                "No sender for pull"
            );
            self.inner.directory.send_to(
                from,
                ServerEvent::SenderNotFound {
                    session_id: pull.session_id,
                    transfer_id: Some(pull.transfer_id),
                    receiver_id: Some(pull.receiver_id),
                },
            );
            return;
        }

        let key = TransferKey::new(&pull.session_id, &pull.transfer_id);
        match self.inner.ledger.record_pull(&key, pull.chunk_index) {
            PullCheck::Accepted => {}
            PullCheck::AlreadyOutstanding { outstanding } => tracing::warn!(
                session_id = %pull.session_id,
                transfer_id = %pull.transfer_id,
                outstanding,
                "Pull issued while another is in flight"
            ),
            PullCheck::UnknownTransfer => tracing::debug!(
                session_id = %pull.session_id,
                transfer_id = %pull.transfer_id,
                "Pull for a transfer the relay did not announce"
            ),
        }
    }

    fn forward_chunk(&self, from: ConnectionId, frame: ChunkFrame) {
        let header = frame.header.clone();
        let payload_len = frame.payload.len() as u64;

        let lookup = Lookup::to_receiver(&header.session_id, header.receiver_id.as_deref());
        let routed = self.inner.directory.route(&lookup, move |target| {
            let mut frame = frame;
            frame.header.receiver_id = target.receiver_id.clone();
            ServerEvent::Chunk(frame)
        });

        if routed.is_none() {
            tracing::info!(
                connection_id = %from,
                session_id = %header.session_id,
                transfer_id = %header.transfer_id,
                chunk_index = header.chunk_index,
                "No receiver for chunk"
            );
            self.inner.directory.send_to(
                from,
                ServerEvent::ReceiverNotFound {
                    session_id: header.session_id,
                    transfer_id: Some(header.transfer_id),
                    filename: None,
                    chunk_index: Some(header.chunk_index),
                },
            );
            return;
        }

        match self.inner.ledger.record_chunk(&header, payload_len) {
            ChunkCheck::InOrder | ChunkCheck::Completed | ChunkCheck::UnknownTransfer => {}
            ChunkCheck::Unsolicited => tracing::warn!(
                session_id = %header.session_id,
                transfer_id = %header.transfer_id,
                chunk_index = header.chunk_index,
                "Chunk sent without a pull"
            ),
            ChunkCheck::OutOfOrder { expected } => tracing::warn!(
                session_id = %header.session_id,
                transfer_id = %header.transfer_id,
                chunk_index = header.chunk_index,
                expected,
                "Chunk out of order"
            ),
            ChunkCheck::Overflow => tracing::warn!(
                session_id = %header.session_id,
                transfer_id = %header.transfer_id,
                chunk_index = header.chunk_index,
                "Chunk runs past the declared size"
            ),
        }
    }

    fn forward_completion(
        &self,
        from: ConnectionId,
        session_id: String,
        filename: String,
        transfer_id: Option<String>,
    ) {
        self.inner
            .ledger
            .complete(&session_id, transfer_id.as_deref(), &filename);

        let receiver_id = self
            .inner
            .directory
            .attachment_of(from)
            .map(|attachment| attachment.receiver_id);
        let lookup = Lookup::to_sender(&session_id, receiver_id.as_deref(), None);
        let routed = self.inner.directory.route(&lookup, |_| ServerEvent::TransferComplete {
            session_id: session_id.clone(),
            filename: filename.clone(),
            transfer_id: transfer_id.clone(),
            receiver_id: receiver_id.clone(),
            connection_id: from,
        });

        match routed {
            Some(_) => tracing::info!(
                session_id = %session_id,
                filename = %filename,
                "Transfer completed"
            ),
            None => tracing::debug!(
                session_id = %session_id,
                "Completion with no sender to notify"
            ),
        }
    }

    fn check_receivers(&self, from: ConnectionId, session_id: String, request_id: Option<String>) {
        let first = self.inner.directory.first_receiver(&session_id);
        self.inner.directory.send_to(
            from,
            ServerEvent::Receivers {
                has_receivers: first.is_some(),
                receiver_id: first.as_ref().map(|a| a.receiver_id.clone()),
                connection_id: first.as_ref().map(|a| a.connection_id),
                session_id,
                request_id,
            },
        );
    }

    // ========================================================================
    // Queries
    // ========================================================================

    /// Everything the relay knows about one session
    pub fn session(&self, session_id: &str) -> Option<SessionSummary> {
        let registration = self.inner.directory.registration(session_id);
        let receivers = self.inner.directory.receivers_of(session_id);
        if registration.is_none() && receivers.is_empty() {
            return None;
        }

        let transfers = self
            .inner
            .ledger
            .active()
            .into_iter()
            .filter(|transfer| transfer.key.session_id == session_id)
            .collect();

        Some(SessionSummary {
            session_id: session_id.to_string(),
            sender: registration,
            receivers,
            transfers,
        })
    }

    pub fn stats(&self) -> RelayStats {
        RelayStats {
            directory: self.inner.directory.snapshot(),
            transfers: self.inner.ledger.active(),
            totals: self.inner.ledger.totals(),
            presence: PresenceMonitor::new(&self.inner.directory).report(),
        }
    }
}

/// One session as reported over HTTP
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSummary {
    pub session_id: String,
    pub sender: Option<SenderRegistration>,
    pub receivers: Vec<ReceiverAttachment>,
    pub transfers: Vec<RelayedTransfer>,
}

/// Relay-wide statistics
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RelayStats {
    pub directory: DirectorySnapshot,
    pub transfers: Vec<RelayedTransfer>,
    pub totals: LedgerTotals,
    pub presence: Vec<ReceiverPresence>,
}
