//! Connection registry and session directory
//!
//! One mutex guards every map: live connections, sender registrations and
//! receiver attachments. Each public operation takes the lock once, so no
//! caller can observe a half-applied update. Notifications are pushed onto
//! unbounded per-connection channels while the lock is held; those sends never
//! block.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use serde_json::{Map, Value};
use tokio::sync::mpsc;

use super::protocol::ServerEvent;
use super::resolver::{self, Lookup, Resolution};
use super::types::{
    ConnectionId, FileDescriptor, MatchResult, ReceiverAttachment, RegisterOutcome, Role,
    SenderRegistration,
};

// ============================================================================
// Outbox
// ============================================================================

/// Fire-and-forget handle for pushing events to one connection
#[derive(Debug, Clone)]
pub struct Outbox {
    tx: mpsc::UnboundedSender<ServerEvent>,
}

impl Outbox {
    pub fn new(tx: mpsc::UnboundedSender<ServerEvent>) -> Self {
        Self { tx }
    }

    /// Create an outbox together with the receiving end
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<ServerEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    /// Queue an event; returns false if the writer side is gone
    pub fn send(&self, event: ServerEvent) -> bool {
        self.tx.send(event).is_ok()
    }
}

// ============================================================================
// Directory
// ============================================================================

struct ConnectionEntry {
    role: Option<Role>,
    user_id: Option<String>,
    connected_at: DateTime<Utc>,
    outbox: Outbox,
}

#[derive(Default)]
pub(crate) struct DirectoryState {
    connections: HashMap<ConnectionId, ConnectionEntry>,
    senders: HashMap<String, SenderRegistration>,
    /// Attachments in insertion order
    receivers: Vec<ReceiverAttachment>,
}

/// What a removed connection had published
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Removal {
    /// False when the handle was unknown (already removed)
    pub found: bool,
    /// Session the connection was registered as sender for
    pub sender_session: Option<String>,
    /// Receivers sent `sender-left`
    pub notified_receivers: usize,
    /// (session, receiver id) the connection was attached as
    pub receiver: Option<(String, String)>,
    /// Whether a live sender was sent `receiver-left`
    pub notified_sender: bool,
}

/// Read-only view handed to resolver strategies
pub struct DirectoryView<'a> {
    state: &'a DirectoryState,
}

impl<'a> DirectoryView<'a> {
    pub fn is_live(&self, id: ConnectionId) -> bool {
        self.state.connections.contains_key(&id)
    }

    pub fn role_of(&self, id: ConnectionId) -> Option<Role> {
        self.state.connections.get(&id).and_then(|entry| entry.role)
    }

    /// Live attachments in insertion order
    pub fn attachments(&self) -> impl Iterator<Item = &'a ReceiverAttachment> + '_ {
        self.state
            .receivers
            .iter()
            .filter(|attachment| self.is_live(attachment.connection_id))
    }

    pub fn attachment_of(&self, id: ConnectionId) -> Option<&'a ReceiverAttachment> {
        self.attachments().find(|attachment| attachment.connection_id == id)
    }

    /// Live sender connection registered under a session
    pub fn sender_of(&self, session_id: &str) -> Option<ConnectionId> {
        self.state
            .senders
            .get(session_id)
            .map(|registration| registration.connection_id)
            .filter(|id| self.is_live(*id))
    }

    pub fn registration_owned_by(&self, id: ConnectionId) -> Option<&'a SenderRegistration> {
        self.state
            .senders
            .values()
            .find(|registration| registration.connection_id == id)
    }
}

/// Connection registry and session directory behind one lock
#[derive(Default)]
pub struct Directory {
    state: Mutex<DirectoryState>,
}

impl Directory {
    pub fn new() -> Self {
        Self::default()
    }

    // ========================================================================
    // Connection Lifecycle
    // ========================================================================

    /// Register a new connection and greet it with its handle
    pub fn connect(&self, outbox: Outbox) -> ConnectionId {
        let id = ConnectionId::new();
        outbox.send(ServerEvent::Connected { connection_id: id });

        let mut state = self.state.lock();
        state.connections.insert(
            id,
            ConnectionEntry {
                role: None,
                user_id: None,
                connected_at: Utc::now(),
                outbox,
            },
        );
        id
    }

    /// Drop a connection from every map and notify its counterparts
    ///
    /// Idempotent: a second call for the same handle finds nothing and sends
    /// nothing.
    pub fn remove_connection(&self, id: ConnectionId) -> Removal {
        let mut state = self.state.lock();

        if state.connections.remove(&id).is_none() {
            return Removal::default();
        }
        let mut removal = Removal {
            found: true,
            ..Removal::default()
        };

        // Sender side: drop the registration and everything attached to it
        let owned = state
            .senders
            .iter()
            .find(|(_, registration)| registration.connection_id == id)
            .map(|(session_id, _)| session_id.clone());
        if let Some(session_id) = owned {
            state.senders.remove(&session_id);
            let detached = detach_session(&mut state, &session_id);
            for attachment in &detached {
                let event = ServerEvent::SenderLeft {
                    session_id: session_id.clone(),
                };
                if notify(&state, attachment.connection_id, event) {
                    removal.notified_receivers += 1;
                }
            }
            tracing::info!(
                connection_id = %id,
                session_id = %session_id,
                receivers = detached.len(),
                "Sender left, session dropped"
            );
            removal.sender_session = Some(session_id);
        }

        // Receiver side: drop the attachment and tell the sender
        if let Some(pos) = state.receivers.iter().position(|a| a.connection_id == id) {
            let attachment = state.receivers.remove(pos);
            let sender = state
                .senders
                .get(&attachment.session_id)
                .map(|registration| registration.connection_id);
            if let Some(sender) = sender {
                removal.notified_sender = notify(
                    &state,
                    sender,
                    ServerEvent::ReceiverLeft {
                        session_id: attachment.session_id.clone(),
                        receiver_id: attachment.receiver_id.clone(),
                        connection_id: id,
                    },
                );
            }
            tracing::info!(
                connection_id = %id,
                session_id = %attachment.session_id,
                receiver_id = %attachment.receiver_id,
                "Receiver left"
            );
            removal.receiver = Some((attachment.session_id, attachment.receiver_id));
        }

        removal
    }

    // ========================================================================
    // Registration
    // ========================================================================

    /// Publish a session for a sender connection
    pub fn register_sender(
        &self,
        id: ConnectionId,
        session_id: &str,
        user_id: Option<String>,
        files: Vec<FileDescriptor>,
    ) -> RegisterOutcome {
        if session_id.trim().is_empty() {
            return RegisterOutcome::Ignored;
        }

        let mut state = self.state.lock();
        let Some(entry) = state.connections.get_mut(&id) else {
            return RegisterOutcome::Ignored;
        };
        entry.role = Some(Role::Sender);
        entry.user_id = user_id.clone();

        // A connection owns at most one session
        let stale = state
            .senders
            .iter()
            .find(|(other, registration)| {
                registration.connection_id == id && other.as_str() != session_id
            })
            .map(|(other, _)| other.clone());
        if let Some(stale) = stale {
            state.senders.remove(&stale);
            for attachment in detach_session(&mut state, &stale) {
                notify(
                    &state,
                    attachment.connection_id,
                    ServerEvent::SessionReplaced {
                        session_id: stale.clone(),
                    },
                );
            }
        }

        let previous = state
            .senders
            .get(session_id)
            .map(|registration| registration.connection_id);

        let outcome = match previous {
            Some(previous) if previous == id => RegisterOutcome::Refreshed,
            Some(previous) => {
                let detached = detach_session(&mut state, session_id);
                for attachment in &detached {
                    notify(
                        &state,
                        attachment.connection_id,
                        ServerEvent::SessionReplaced {
                            session_id: session_id.to_string(),
                        },
                    );
                }
                tracing::warn!(
                    session_id = %session_id,
                    previous = %previous,
                    connection_id = %id,
                    detached = detached.len(),
                    "Session id re-registered by another connection"
                );
                RegisterOutcome::Replaced {
                    previous,
                    detached: detached.len(),
                }
            }
            None => RegisterOutcome::Registered,
        };

        let registered_at = match (&outcome, state.senders.get(session_id)) {
            (RegisterOutcome::Refreshed, Some(existing)) => existing.registered_at,
            _ => Utc::now(),
        };
        state.senders.insert(
            session_id.to_string(),
            SenderRegistration {
                session_id: session_id.to_string(),
                connection_id: id,
                user_id,
                files,
                registered_at,
            },
        );

        notify(
            &state,
            id,
            ServerEvent::Registered {
                session_id: session_id.to_string(),
                replaced: matches!(outcome, RegisterOutcome::Replaced { .. }),
            },
        );

        tracing::info!(connection_id = %id, session_id = %session_id, "Sender registered");
        outcome
    }

    /// Attach a receiver connection to a session
    pub fn attach_receiver(
        &self,
        id: ConnectionId,
        session_id: &str,
        receiver_id: &str,
        user_id: Option<String>,
    ) -> MatchResult {
        if session_id.trim().is_empty() || receiver_id.trim().is_empty() {
            return MatchResult::Unmatched;
        }

        let mut state = self.state.lock();
        let Some(entry) = state.connections.get_mut(&id) else {
            return MatchResult::Unmatched;
        };
        entry.role = Some(Role::Receiver);
        entry.user_id = user_id.clone();

        // A connection holds at most one attachment; re-joining replaces it
        state.receivers.retain(|attachment| attachment.connection_id != id);

        let now = Utc::now();
        state.receivers.push(ReceiverAttachment {
            session_id: session_id.to_string(),
            receiver_id: receiver_id.to_string(),
            connection_id: id,
            user_id: user_id.clone(),
            attached_at: now,
            last_seen: now,
            status: Map::new(),
        });

        let sender = DirectoryView { state: &state }.sender_of(session_id);
        let result = match sender {
            Some(sender) => {
                notify(
                    &state,
                    sender,
                    ServerEvent::Init {
                        receiver_id: receiver_id.to_string(),
                        connection_id: id,
                        user_id,
                    },
                );
                tracing::info!(
                    connection_id = %id,
                    session_id = %session_id,
                    receiver_id = %receiver_id,
                    sender = %sender,
                    "Receiver matched to sender"
                );
                MatchResult::Matched { sender }
            }
            None => {
                tracing::info!(
                    connection_id = %id,
                    session_id = %session_id,
                    receiver_id = %receiver_id,
                    "Receiver waiting, no sender registered"
                );
                MatchResult::Unmatched
            }
        };

        notify(
            &state,
            id,
            ServerEvent::Joined {
                session_id: session_id.to_string(),
                matched: result.is_matched(),
                sender_connection_id: sender,
            },
        );

        result
    }

    // ========================================================================
    // Routing
    // ========================================================================

    /// Resolve a counterpart and queue an event for it, atomically
    ///
    /// The event is built from the resolution so callers can stamp the
    /// target in. Returns the resolution, or None when nothing live matched.
    pub fn route(
        &self,
        lookup: &Lookup<'_>,
        build: impl FnOnce(&Resolution) -> ServerEvent,
    ) -> Option<Resolution> {
        let state = self.state.lock();
        let view = DirectoryView { state: &state };
        let resolution = resolver::resolve(lookup, &view)?;
        let event = build(&resolution);
        if !notify(&state, resolution.connection, event) {
            return None;
        }
        Some(resolution)
    }

    /// Resolve without sending
    pub fn resolve(&self, lookup: &Lookup<'_>) -> Option<Resolution> {
        let state = self.state.lock();
        resolver::resolve(lookup, &DirectoryView { state: &state })
    }

    /// Queue an event for one connection
    pub fn send_to(&self, id: ConnectionId, event: ServerEvent) -> bool {
        let state = self.state.lock();
        notify(&state, id, event)
    }

    // ========================================================================
    // Presence
    // ========================================================================

    /// Refresh an attachment's last-seen time and merge reported status
    ///
    /// Returns a copy of the updated attachment.
    pub fn touch_receiver(
        &self,
        id: ConnectionId,
        status: Option<Map<String, Value>>,
    ) -> Option<ReceiverAttachment> {
        let mut state = self.state.lock();
        let attachment = state
            .receivers
            .iter_mut()
            .find(|attachment| attachment.connection_id == id)?;

        attachment.last_seen = Utc::now();
        if let Some(status) = status {
            attachment.status.extend(status);
        }
        Some(attachment.clone())
    }

    // ========================================================================
    // Queries
    // ========================================================================

    /// First live receiver attached to a session
    pub fn first_receiver(&self, session_id: &str) -> Option<ReceiverAttachment> {
        let state = self.state.lock();
        let view = DirectoryView { state: &state };
        let found = view
            .attachments()
            .find(|attachment| attachment.session_id == session_id)
            .cloned();
        found
    }

    pub fn attachment_of(&self, id: ConnectionId) -> Option<ReceiverAttachment> {
        let state = self.state.lock();
        let found = DirectoryView { state: &state }.attachment_of(id).cloned();
        found
    }

    pub fn registration(&self, session_id: &str) -> Option<SenderRegistration> {
        self.state.lock().senders.get(session_id).cloned()
    }

    pub fn receivers_of(&self, session_id: &str) -> Vec<ReceiverAttachment> {
        let state = self.state.lock();
        state
            .receivers
            .iter()
            .filter(|attachment| attachment.session_id == session_id)
            .cloned()
            .collect()
    }

    pub fn all_receivers(&self) -> Vec<ReceiverAttachment> {
        self.state.lock().receivers.clone()
    }

    pub fn role_of(&self, id: ConnectionId) -> Option<Role> {
        let state = self.state.lock();
        DirectoryView { state: &state }.role_of(id)
    }

    pub fn is_live(&self, id: ConnectionId) -> bool {
        self.state.lock().connections.contains_key(&id)
    }

    /// Point-in-time summary of the directory
    pub fn snapshot(&self) -> DirectorySnapshot {
        let state = self.state.lock();
        let now = Utc::now();

        let orphaned_receivers = state
            .receivers
            .iter()
            .filter(|attachment| !state.senders.contains_key(&attachment.session_id))
            .map(|attachment| OrphanedReceiver {
                session_id: attachment.session_id.clone(),
                receiver_id: attachment.receiver_id.clone(),
                connection_id: attachment.connection_id,
                waiting_secs: (now - attachment.attached_at).num_seconds().max(0),
            })
            .collect();

        let oldest_connection_secs = state
            .connections
            .values()
            .map(|entry| (now - entry.connected_at).num_seconds().max(0))
            .max();

        DirectorySnapshot {
            connections: state.connections.len(),
            senders: state.senders.len(),
            receivers: state.receivers.len(),
            anonymous_connections: state
                .connections
                .values()
                .filter(|entry| entry.user_id.is_none())
                .count(),
            oldest_connection_secs,
            orphaned_receivers,
        }
    }
}

/// Counts and orphans, as reported by the stats endpoint
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DirectorySnapshot {
    pub connections: usize,
    pub senders: usize,
    pub receivers: usize,
    pub anonymous_connections: usize,
    pub oldest_connection_secs: Option<i64>,
    pub orphaned_receivers: Vec<OrphanedReceiver>,
}

/// Receiver attached to a session nobody has registered
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrphanedReceiver {
    pub session_id: String,
    pub receiver_id: String,
    pub connection_id: ConnectionId,
    pub waiting_secs: i64,
}

// ============================================================================
// Helpers (lock held)
// ============================================================================

fn notify(state: &DirectoryState, id: ConnectionId, event: ServerEvent) -> bool {
    let Some(entry) = state.connections.get(&id) else {
        return false;
    };
    let name = event.name();
    if !entry.outbox.send(event) {
        tracing::debug!(connection_id = %id, event = name, "Outbox closed, event dropped");
        return false;
    }
    true
}

fn detach_session(state: &mut DirectoryState, session_id: &str) -> Vec<ReceiverAttachment> {
    let (detached, kept) = std::mem::take(&mut state.receivers)
        .into_iter()
        .partition(|attachment| attachment.session_id == session_id);
    state.receivers = kept;
    detached
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc::UnboundedReceiver;

    fn connect(directory: &Directory) -> (ConnectionId, UnboundedReceiver<ServerEvent>) {
        let (outbox, mut rx) = Outbox::channel();
        let id = directory.connect(outbox);
        assert!(matches!(rx.try_recv(), Ok(ServerEvent::Connected { .. })));
        (id, rx)
    }

    fn drain(rx: &mut UnboundedReceiver<ServerEvent>) -> Vec<ServerEvent> {
        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        events
    }

    #[test]
    fn test_register_sender_empty_session_is_noop() {
        let directory = Directory::new();
        let (sender, mut rx) = connect(&directory);

        let outcome = directory.register_sender(sender, "", None, Vec::new());

        assert_eq!(outcome, RegisterOutcome::Ignored);
        assert!(directory.snapshot().senders == 0);
        assert!(drain(&mut rx).is_empty());
        assert_eq!(directory.role_of(sender), None);
    }

    #[test]
    fn test_attach_with_sender_sends_one_init() {
        let directory = Directory::new();
        let (sender, mut sender_rx) = connect(&directory);
        let (receiver, mut receiver_rx) = connect(&directory);

        directory.register_sender(sender, "S1", None, Vec::new());
        drain(&mut sender_rx);

        let result = directory.attach_receiver(receiver, "S1", "r-1", Some("alice".into()));
        assert_eq!(result, MatchResult::Matched { sender });

        let events = drain(&mut sender_rx);
        assert_eq!(events.len(), 1);
        match &events[0] {
            ServerEvent::Init {
                receiver_id,
                connection_id,
                user_id,
            } => {
                assert_eq!(receiver_id, "r-1");
                assert_eq!(*connection_id, receiver);
                assert_eq!(user_id.as_deref(), Some("alice"));
            }
            other => panic!("unexpected event: {:?}", other),
        }

        assert_eq!(
            drain(&mut receiver_rx),
            vec![ServerEvent::Joined {
                session_id: "S1".into(),
                matched: true,
                sender_connection_id: Some(sender),
            }]
        );
    }

    #[test]
    fn test_attach_without_sender_is_recorded() {
        let directory = Directory::new();
        let (receiver, _rx) = connect(&directory);

        let result = directory.attach_receiver(receiver, "S2", "r-1", None);

        assert_eq!(result, MatchResult::Unmatched);
        assert_eq!(directory.receivers_of("S2").len(), 1);
        assert_eq!(directory.snapshot().orphaned_receivers.len(), 1);
    }

    #[test]
    fn test_receiver_rejoin_replaces_attachment() {
        let directory = Directory::new();
        let (receiver, _rx) = connect(&directory);

        directory.attach_receiver(receiver, "A", "r-1", None);
        directory.attach_receiver(receiver, "B", "r-1", None);

        assert!(directory.receivers_of("A").is_empty());
        assert_eq!(directory.receivers_of("B").len(), 1);
    }

    #[test]
    fn test_remove_sender_notifies_receivers() {
        let directory = Directory::new();
        let (sender, _sender_rx) = connect(&directory);
        let (r1, mut r1_rx) = connect(&directory);
        let (r2, mut r2_rx) = connect(&directory);

        directory.register_sender(sender, "S3", None, Vec::new());
        directory.attach_receiver(r1, "S3", "r-1", None);
        directory.attach_receiver(r2, "S3", "r-2", None);
        drain(&mut r1_rx);
        drain(&mut r2_rx);

        let removal = directory.remove_connection(sender);

        assert!(removal.found);
        assert_eq!(removal.sender_session.as_deref(), Some("S3"));
        assert_eq!(removal.notified_receivers, 2);
        assert!(directory.registration("S3").is_none());
        assert!(directory.receivers_of("S3").is_empty());

        let left = ServerEvent::SenderLeft {
            session_id: "S3".into(),
        };
        assert_eq!(drain(&mut r1_rx), vec![left.clone()]);
        assert_eq!(drain(&mut r2_rx), vec![left]);
    }

    #[test]
    fn test_remove_receiver_notifies_sender() {
        let directory = Directory::new();
        let (sender, mut sender_rx) = connect(&directory);
        let (receiver, _rx) = connect(&directory);

        directory.register_sender(sender, "S1", None, Vec::new());
        directory.attach_receiver(receiver, "S1", "r-1", None);
        drain(&mut sender_rx);

        let removal = directory.remove_connection(receiver);

        assert!(removal.notified_sender);
        assert_eq!(removal.receiver, Some(("S1".to_string(), "r-1".to_string())));
        assert_eq!(
            drain(&mut sender_rx),
            vec![ServerEvent::ReceiverLeft {
                session_id: "S1".into(),
                receiver_id: "r-1".into(),
                connection_id: receiver,
            }]
        );
    }

    #[test]
    fn test_remove_connection_is_idempotent() {
        let directory = Directory::new();
        let (sender, mut sender_rx) = connect(&directory);
        let (receiver, _rx) = connect(&directory);

        directory.register_sender(sender, "S1", None, Vec::new());
        directory.attach_receiver(receiver, "S1", "r-1", None);
        drain(&mut sender_rx);

        let first = directory.remove_connection(receiver);
        let after_first = directory.snapshot();
        let second = directory.remove_connection(receiver);
        let after_second = directory.snapshot();

        assert!(first.found);
        assert_eq!(second, Removal::default());
        assert_eq!(after_first.connections, after_second.connections);
        assert_eq!(after_first.receivers, after_second.receivers);
        assert_eq!(drain(&mut sender_rx).len(), 1);
    }

    #[test]
    fn test_reregistration_by_other_connection_replaces() {
        let directory = Directory::new();
        let (old, _old_rx) = connect(&directory);
        let (new, mut new_rx) = connect(&directory);
        let (receiver, mut receiver_rx) = connect(&directory);

        directory.register_sender(old, "S1", None, Vec::new());
        directory.attach_receiver(receiver, "S1", "r-1", None);
        drain(&mut receiver_rx);

        let outcome = directory.register_sender(new, "S1", None, Vec::new());

        assert_eq!(
            outcome,
            RegisterOutcome::Replaced {
                previous: old,
                detached: 1
            }
        );
        assert_eq!(directory.registration("S1").unwrap().connection_id, new);
        assert!(directory.receivers_of("S1").is_empty());
        assert_eq!(
            drain(&mut receiver_rx),
            vec![ServerEvent::SessionReplaced {
                session_id: "S1".into()
            }]
        );
        assert_eq!(
            drain(&mut new_rx),
            vec![ServerEvent::Registered {
                session_id: "S1".into(),
                replaced: true
            }]
        );

        // The displaced sender leaving must not drop the new registration
        directory.remove_connection(old);
        assert!(directory.registration("S1").is_some());
    }

    #[test]
    fn test_same_connection_reregistration_refreshes_files() {
        let directory = Directory::new();
        let (sender, _rx) = connect(&directory);
        let (receiver, _receiver_rx) = connect(&directory);

        directory.register_sender(sender, "S1", None, Vec::new());
        directory.attach_receiver(receiver, "S1", "r-1", None);

        let files = vec![FileDescriptor {
            name: "a.bin".into(),
            size: 10,
            mime_type: "application/octet-stream".into(),
        }];
        let outcome = directory.register_sender(sender, "S1", None, files);

        assert_eq!(outcome, RegisterOutcome::Refreshed);
        assert_eq!(directory.registration("S1").unwrap().files.len(), 1);
        assert_eq!(directory.receivers_of("S1").len(), 1);
    }

    #[test]
    fn test_touch_receiver_merges_status() {
        let directory = Directory::new();
        let (receiver, _rx) = connect(&directory);
        directory.attach_receiver(receiver, "S1", "r-1", None);

        let mut status = Map::new();
        status.insert("progress".into(), Value::from(42));
        let updated = directory.touch_receiver(receiver, Some(status)).unwrap();

        assert_eq!(updated.status["progress"], 42);
        assert!(updated.last_seen >= updated.attached_at);
    }

    #[test]
    fn test_first_receiver_in_insertion_order() {
        let directory = Directory::new();
        let (r1, _r1_rx) = connect(&directory);
        let (r2, _r2_rx) = connect(&directory);

        directory.attach_receiver(r1, "S1", "first", None);
        directory.attach_receiver(r2, "S1", "second", None);

        assert_eq!(directory.first_receiver("S1").unwrap().receiver_id, "first");
        directory.remove_connection(r1);
        assert_eq!(directory.first_receiver("S1").unwrap().receiver_id, "second");
    }
}
