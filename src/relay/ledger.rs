//! Relay-side transfer ledger
//!
//! Tracks each transfer the relay is forwarding:
//! `announced -> pulling -> completed`, or `failed` when an endpoint leaves.
//! Only progress counters are kept; payloads are never stored. Entries are
//! dropped as soon as they reach a terminal state.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;

use super::protocol::{ChunkHeader, FileMeta};
use super::types::ConnectionId;

/// Ledger key: transfer id scoped within its session
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferKey {
    pub session_id: String,
    pub transfer_id: String,
}

impl TransferKey {
    pub fn new(session_id: &str, transfer_id: &str) -> Self {
        Self {
            session_id: session_id.to_string(),
            transfer_id: transfer_id.to_string(),
        }
    }
}

/// Relay-side phase of a transfer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RelayPhase {
    Announced,
    Pulling,
    Completed,
    Failed,
}

impl RelayPhase {
    pub fn is_terminal(self) -> bool {
        matches!(self, RelayPhase::Completed | RelayPhase::Failed)
    }
}

/// Progress of one relayed transfer
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RelayedTransfer {
    pub key: TransferKey,
    pub filename: String,
    pub mime_type: String,
    pub total_size: u64,
    pub chunk_size: u64,
    pub total_chunks: u64,
    pub sender: ConnectionId,
    pub receiver: ConnectionId,
    pub phase: RelayPhase,
    /// Index named by the pull currently in flight
    pub outstanding_pull: Option<u64>,
    /// Next index expected from the sender
    pub next_index: u64,
    pub chunks_forwarded: u64,
    pub bytes_forwarded: u64,
    pub announced_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl RelayedTransfer {
    fn new(meta: &FileMeta, sender: ConnectionId, receiver: ConnectionId) -> Self {
        let now = Utc::now();
        Self {
            key: TransferKey::new(&meta.session_id, &meta.transfer_id),
            filename: meta.filename.clone(),
            mime_type: meta.mime_type.clone(),
            total_size: meta.total_size,
            chunk_size: meta.chunk_size,
            total_chunks: meta.total_size.div_ceil(meta.chunk_size.max(1)),
            sender,
            receiver,
            phase: RelayPhase::Announced,
            outstanding_pull: None,
            next_index: 0,
            chunks_forwarded: 0,
            bytes_forwarded: 0,
            announced_at: now,
            updated_at: now,
        }
    }

    /// Percentage of bytes forwarded
    pub fn progress(&self) -> f64 {
        if self.total_size == 0 {
            return 100.0;
        }
        (self.bytes_forwarded as f64 / self.total_size as f64) * 100.0
    }
}

/// What the ledger made of a forwarded pull
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PullCheck {
    Accepted,
    /// A previous pull has not been answered yet
    AlreadyOutstanding { outstanding: u64 },
    UnknownTransfer,
}

/// What the ledger made of a forwarded chunk
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChunkCheck {
    InOrder,
    /// The final byte arrived; the entry has been retired
    Completed,
    /// No pull was outstanding for this chunk
    Unsolicited,
    OutOfOrder { expected: u64 },
    /// Payload would push forwarded bytes past the declared size
    Overflow,
    UnknownTransfer,
}

/// Totals across the relay's lifetime
#[derive(Debug, Clone, Copy, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LedgerTotals {
    pub announced: u64,
    pub completed: u64,
    pub failed: u64,
    pub bytes_forwarded: u64,
}

#[derive(Default)]
struct LedgerState {
    transfers: HashMap<TransferKey, RelayedTransfer>,
    totals: LedgerTotals,
}

/// Transfers currently being relayed
#[derive(Default)]
pub struct TransferLedger {
    state: Mutex<LedgerState>,
}

impl TransferLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record metadata forwarded to a receiver
    ///
    /// A re-announced transfer starts over. Zero-byte transfers complete
    /// immediately and are not kept.
    pub fn announce(&self, meta: &FileMeta, sender: ConnectionId, receiver: ConnectionId) -> RelayPhase {
        let mut state = self.state.lock();
        let transfer = RelayedTransfer::new(meta, sender, receiver);
        state.totals.announced += 1;

        if transfer.total_size == 0 {
            state.totals.completed += 1;
            state.transfers.remove(&transfer.key);
            tracing::info!(
                session_id = %meta.session_id,
                transfer_id = %meta.transfer_id,
                "Empty transfer completed on announce"
            );
            return RelayPhase::Completed;
        }

        tracing::info!(
            session_id = %meta.session_id,
            transfer_id = %meta.transfer_id,
            filename = %meta.filename,
            total_size = meta.total_size,
            total_chunks = transfer.total_chunks,
            "Transfer announced"
        );
        state.transfers.insert(transfer.key.clone(), transfer);
        RelayPhase::Announced
    }

    /// Record a pull forwarded to the sender
    pub fn record_pull(&self, key: &TransferKey, chunk_index: Option<u64>) -> PullCheck {
        let mut state = self.state.lock();
        let Some(transfer) = state.transfers.get_mut(key) else {
            return PullCheck::UnknownTransfer;
        };

        let check = match transfer.outstanding_pull {
            Some(outstanding) => PullCheck::AlreadyOutstanding { outstanding },
            None => PullCheck::Accepted,
        };

        let requested = chunk_index.unwrap_or(transfer.next_index);
        // A pull naming an earlier index rewinds (resumed request)
        transfer.next_index = requested;
        transfer.outstanding_pull = Some(requested);
        transfer.phase = RelayPhase::Pulling;
        transfer.updated_at = Utc::now();
        check
    }

    /// Record a chunk forwarded to the receiver
    pub fn record_chunk(&self, header: &ChunkHeader, payload_len: u64) -> ChunkCheck {
        let key = TransferKey::new(&header.session_id, &header.transfer_id);
        let mut state = self.state.lock();
        let Some(transfer) = state.transfers.get_mut(&key) else {
            return ChunkCheck::UnknownTransfer;
        };

        let solicited = transfer.outstanding_pull.take().is_some();
        let expected = transfer.next_index;
        transfer.updated_at = Utc::now();

        if header.chunk_index != expected {
            return ChunkCheck::OutOfOrder { expected };
        }

        // Indices come from clients; an offset past u64 is past any file
        let end = header
            .chunk_index
            .checked_mul(transfer.chunk_size)
            .and_then(|start| start.checked_add(payload_len));
        let Some(end) = end.filter(|end| *end <= transfer.total_size) else {
            return ChunkCheck::Overflow;
        };

        // Resumed pulls may re-forward a range already counted
        let counted_before = transfer.bytes_forwarded;
        transfer.bytes_forwarded = transfer.bytes_forwarded.max(end);
        let added = transfer.bytes_forwarded - counted_before;

        transfer.next_index = header.chunk_index.saturating_add(1);
        transfer.chunks_forwarded += 1;
        let done = transfer.bytes_forwarded == transfer.total_size;

        state.totals.bytes_forwarded += added;
        if done {
            state.transfers.remove(&key);
            state.totals.completed += 1;
            tracing::info!(
                session_id = %key.session_id,
                transfer_id = %key.transfer_id,
                "All bytes forwarded"
            );
            return ChunkCheck::Completed;
        }

        if solicited {
            ChunkCheck::InOrder
        } else {
            ChunkCheck::Unsolicited
        }
    }

    /// Retire a transfer the receiver reported complete
    ///
    /// Matches by transfer id when given, else by file name within the
    /// session. Returns whether an entry was still open.
    pub fn complete(&self, session_id: &str, transfer_id: Option<&str>, filename: &str) -> bool {
        let mut state = self.state.lock();
        let key = state
            .transfers
            .values()
            .find(|transfer| {
                transfer.key.session_id == session_id
                    && match transfer_id {
                        Some(id) => transfer.key.transfer_id == id,
                        None => transfer.filename == filename,
                    }
            })
            .map(|transfer| transfer.key.clone());

        match key {
            Some(key) => {
                state.transfers.remove(&key);
                state.totals.completed += 1;
                true
            }
            None => false,
        }
    }

    /// Fail and retire every transfer a departed connection took part in
    pub fn drop_connection(&self, id: ConnectionId) -> Vec<RelayedTransfer> {
        let mut state = self.state.lock();
        let keys: Vec<TransferKey> = state
            .transfers
            .values()
            .filter(|transfer| transfer.sender == id || transfer.receiver == id)
            .map(|transfer| transfer.key.clone())
            .collect();

        let mut failed = Vec::with_capacity(keys.len());
        for key in keys {
            if let Some(mut transfer) = state.transfers.remove(&key) {
                transfer.phase = RelayPhase::Failed;
                transfer.updated_at = Utc::now();
                tracing::warn!(
                    session_id = %transfer.key.session_id,
                    transfer_id = %transfer.key.transfer_id,
                    bytes_forwarded = transfer.bytes_forwarded,
                    total_size = transfer.total_size,
                    "Transfer failed, endpoint disconnected"
                );
                failed.push(transfer);
            }
        }
        state.totals.failed += failed.len() as u64;
        failed
    }

    pub fn get(&self, key: &TransferKey) -> Option<RelayedTransfer> {
        self.state.lock().transfers.get(key).cloned()
    }

    pub fn active(&self) -> Vec<RelayedTransfer> {
        let state = self.state.lock();
        let mut transfers: Vec<_> = state.transfers.values().cloned().collect();
        transfers.sort_by_key(|transfer| transfer.announced_at);
        transfers
    }

    pub fn totals(&self) -> LedgerTotals {
        self.state.lock().totals
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn meta(total_size: u64, chunk_size: u64) -> FileMeta {
        FileMeta {
            transfer_id: "t-1".into(),
            session_id: "S1".into(),
            filename: "file.bin".into(),
            total_size,
            chunk_size,
            mime_type: "application/octet-stream".into(),
            receiver_id: None,
        }
    }

    fn header(index: u64, total_chunks: u64, last: bool) -> ChunkHeader {
        ChunkHeader {
            session_id: "S1".into(),
            transfer_id: "t-1".into(),
            chunk_index: index,
            total_chunks,
            is_last_chunk: last,
            receiver_id: None,
        }
    }

    #[test]
    fn test_full_cycle() {
        let ledger = TransferLedger::new();
        let key = TransferKey::new("S1", "t-1");
        let (sender, receiver) = (ConnectionId::new(), ConnectionId::new());

        assert_eq!(ledger.announce(&meta(150_000, 65_536), sender, receiver), RelayPhase::Announced);
        assert_eq!(ledger.get(&key).unwrap().total_chunks, 3);

        for (index, len) in [(0, 65_536), (1, 65_536)] {
            assert_eq!(ledger.record_pull(&key, Some(index)), PullCheck::Accepted);
            assert_eq!(ledger.get(&key).unwrap().phase, RelayPhase::Pulling);
            assert_eq!(ledger.record_chunk(&header(index, 3, false), len), ChunkCheck::InOrder);
        }

        assert_eq!(ledger.record_pull(&key, None), PullCheck::Accepted);
        assert_eq!(ledger.record_chunk(&header(2, 3, true), 18_928), ChunkCheck::Completed);
        assert!(ledger.get(&key).is_none());

        let totals = ledger.totals();
        assert_eq!(totals.completed, 1);
        assert_eq!(totals.bytes_forwarded, 150_000);
    }

    #[test]
    fn test_empty_transfer_completes_on_announce() {
        let ledger = TransferLedger::new();
        let phase = ledger.announce(&meta(0, 65_536), ConnectionId::new(), ConnectionId::new());
        assert_eq!(phase, RelayPhase::Completed);
        assert!(ledger.active().is_empty());
    }

    #[test]
    fn test_unsolicited_and_out_of_order_chunks() {
        let ledger = TransferLedger::new();
        let key = TransferKey::new("S1", "t-1");
        ledger.announce(&meta(300, 100), ConnectionId::new(), ConnectionId::new());

        assert_eq!(ledger.record_chunk(&header(0, 3, false), 100), ChunkCheck::Unsolicited);
        assert_eq!(
            ledger.record_chunk(&header(2, 3, false), 100),
            ChunkCheck::OutOfOrder { expected: 1 }
        );

        ledger.record_pull(&key, None);
        assert_eq!(
            ledger.record_pull(&key, None),
            PullCheck::AlreadyOutstanding { outstanding: 1 }
        );
    }

    #[test]
    fn test_overflow_is_not_counted() {
        let ledger = TransferLedger::new();
        let key = TransferKey::new("S1", "t-1");
        ledger.announce(&meta(150, 100), ConnectionId::new(), ConnectionId::new());

        ledger.record_pull(&key, Some(0));
        ledger.record_chunk(&header(0, 2, false), 100);
        ledger.record_pull(&key, Some(1));
        assert_eq!(ledger.record_chunk(&header(1, 2, true), 100), ChunkCheck::Overflow);
        assert_eq!(ledger.get(&key).unwrap().bytes_forwarded, 100);
    }

    #[test]
    fn test_huge_chunk_index_is_overflow() {
        let ledger = TransferLedger::new();
        let key = TransferKey::new("S1", "t-1");
        ledger.announce(&meta(100, 65_536), ConnectionId::new(), ConnectionId::new());

        assert_eq!(ledger.record_pull(&key, Some(u64::MAX)), PullCheck::Accepted);
        assert_eq!(ledger.record_chunk(&header(u64::MAX, 1, true), 1), ChunkCheck::Overflow);

        // Past the end but within u64
        ledger.record_pull(&key, Some(1));
        assert_eq!(ledger.record_chunk(&header(1, 1, true), 1), ChunkCheck::Overflow);

        let transfer = ledger.get(&key).unwrap();
        assert_eq!(transfer.bytes_forwarded, 0);
        assert_eq!(ledger.totals().bytes_forwarded, 0);
    }

    #[test]
    fn test_resumed_pull_does_not_double_count() {
        let ledger = TransferLedger::new();
        let key = TransferKey::new("S1", "t-1");
        ledger.announce(&meta(300, 100), ConnectionId::new(), ConnectionId::new());

        ledger.record_pull(&key, Some(0));
        ledger.record_chunk(&header(0, 3, false), 100);
        ledger.record_pull(&key, Some(0));
        assert_eq!(ledger.record_chunk(&header(0, 3, false), 100), ChunkCheck::InOrder);

        let transfer = ledger.get(&key).unwrap();
        assert_eq!(transfer.bytes_forwarded, 100);
        assert_eq!(transfer.next_index, 1);
    }

    #[test]
    fn test_drop_connection_fails_transfers() {
        let ledger = TransferLedger::new();
        let sender = ConnectionId::new();
        ledger.announce(&meta(300, 100), sender, ConnectionId::new());

        let failed = ledger.drop_connection(sender);

        assert_eq!(failed.len(), 1);
        assert_eq!(failed[0].phase, RelayPhase::Failed);
        assert!(ledger.active().is_empty());
        assert_eq!(ledger.totals().failed, 1);
        assert!(ledger.drop_connection(sender).is_empty());
    }

    #[test]
    fn test_complete_by_filename() {
        let ledger = TransferLedger::new();
        ledger.announce(&meta(300, 100), ConnectionId::new(), ConnectionId::new());

        assert!(!ledger.complete("S1", None, "other.bin"));
        assert!(ledger.complete("S1", None, "file.bin"));
        assert!(ledger.active().is_empty());
    }
}
