//! Receiver presence
//!
//! Status updates and heartbeats refresh an attachment's last-seen time and
//! are passed on to the session's sender. Nothing here times anyone out:
//! disconnects are detected by the transport closing.

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{Map, Value};

use super::directory::Directory;
use super::protocol::ServerEvent;
use super::resolver::Lookup;
use super::types::ConnectionId;

/// Presence operations over the directory
pub struct PresenceMonitor<'a> {
    directory: &'a Directory,
}

/// Liveness of one attached receiver
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReceiverPresence {
    pub session_id: String,
    pub receiver_id: String,
    pub connection_id: ConnectionId,
    pub last_seen: DateTime<Utc>,
    pub idle_secs: i64,
}

impl<'a> PresenceMonitor<'a> {
    pub fn new(directory: &'a Directory) -> Self {
        Self { directory }
    }

    /// Merge a receiver's status and forward it as `receiver-status`
    ///
    /// Returns whether a sender was reached.
    pub fn status_update(
        &self,
        from: ConnectionId,
        session_id: &str,
        receiver_id: &str,
        user_id: Option<String>,
        status: Map<String, Value>,
    ) -> bool {
        let merged = self
            .directory
            .touch_receiver(from, Some(status.clone()))
            .map(|attachment| attachment.status)
            .unwrap_or(status);

        let lookup = Lookup::to_sender(session_id, Some(receiver_id), None);
        let delivered = self
            .directory
            .route(&lookup, |_| ServerEvent::ReceiverStatus {
                session_id: session_id.to_string(),
                receiver_id: receiver_id.to_string(),
                connection_id: from,
                user_id,
                status: merged,
            })
            .is_some();

        if !delivered {
            tracing::debug!(
                connection_id = %from,
                session_id = %session_id,
                "Status update with no sender to forward to"
            );
        }
        delivered
    }

    /// Forward a heartbeat as `receiver-heartbeat`
    pub fn heartbeat(
        &self,
        from: ConnectionId,
        session_id: &str,
        receiver_id: &str,
        user_id: Option<String>,
    ) -> bool {
        self.directory.touch_receiver(from, None);

        let lookup = Lookup::to_sender(session_id, Some(receiver_id), None);
        let delivered = self
            .directory
            .route(&lookup, |_| ServerEvent::ReceiverHeartbeat {
                session_id: session_id.to_string(),
                receiver_id: receiver_id.to_string(),
                connection_id: from,
                user_id,
            })
            .is_some();

        if !delivered {
            tracing::trace!(connection_id = %from, session_id = %session_id, "Heartbeat dropped");
        }
        delivered
    }

    /// Last-seen report for every attached receiver, most idle first
    pub fn report(&self) -> Vec<ReceiverPresence> {
        let now = Utc::now();
        let mut report: Vec<ReceiverPresence> = self
            .directory
            .all_receivers()
            .into_iter()
            .map(|attachment| ReceiverPresence {
                idle_secs: (now - attachment.last_seen).num_seconds().max(0),
                session_id: attachment.session_id,
                receiver_id: attachment.receiver_id,
                connection_id: attachment.connection_id,
                last_seen: attachment.last_seen,
            })
            .collect();
        report.sort_by(|a, b| b.idle_secs.cmp(&a.idle_secs));
        report
    }
}
