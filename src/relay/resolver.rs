//! Matching resolver
//!
//! The two endpoints may know each other by different identifiers depending
//! on which join won the race, so a counterpart is found by trying a fixed
//! list of strategies in order:
//!
//! 1. exact receiver id within the message's session
//! 2. raw connection handle named in the message
//! 3. session id (first attached receiver, or the session's sender)
//!
//! Each strategy is a plain function over a read-only directory view and only
//! ever yields live connections.

use std::fmt;

use super::directory::DirectoryView;
use super::types::{ConnectionId, Role};

/// Which side of the transfer is being looked for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    ToReceiver,
    ToSender,
}

impl Direction {
    fn role(self) -> Role {
        match self {
            Direction::ToReceiver => Role::Receiver,
            Direction::ToSender => Role::Sender,
        }
    }
}

/// Identifiers an inbound message offers for finding its counterpart
#[derive(Debug, Clone, Copy)]
pub struct Lookup<'a> {
    pub direction: Direction,
    pub session_id: &'a str,
    pub receiver_id: Option<&'a str>,
    /// Connection handle named directly, if any
    pub connection_hint: Option<&'a str>,
}

impl<'a> Lookup<'a> {
    pub fn to_receiver(session_id: &'a str, receiver_id: Option<&'a str>) -> Self {
        Self {
            direction: Direction::ToReceiver,
            session_id,
            receiver_id,
            // Senders address receivers by id or by handle in the same field
            connection_hint: receiver_id,
        }
    }

    pub fn to_sender(
        session_id: &'a str,
        receiver_id: Option<&'a str>,
        connection_hint: Option<&'a str>,
    ) -> Self {
        Self {
            direction: Direction::ToSender,
            session_id,
            receiver_id,
            connection_hint,
        }
    }
}

/// Strategy that produced a match
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchedBy {
    ReceiverId,
    ConnectionHandle,
    SessionId,
}

impl fmt::Display for MatchedBy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            MatchedBy::ReceiverId => "receiver-id",
            MatchedBy::ConnectionHandle => "connection-handle",
            MatchedBy::SessionId => "session-id",
        })
    }
}

/// A live counterpart
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    pub connection: ConnectionId,
    pub matched_by: MatchedBy,
    /// Receiver id of the target when it is a receiver
    pub receiver_id: Option<String>,
}

pub type Strategy = fn(&Lookup<'_>, &DirectoryView<'_>) -> Option<Resolution>;

/// Strategies in the order they are tried
pub const STRATEGIES: [Strategy; 3] = [by_receiver_id, by_connection_handle, by_session_id];

/// Try every strategy in order
pub fn resolve(lookup: &Lookup<'_>, view: &DirectoryView<'_>) -> Option<Resolution> {
    let resolution = STRATEGIES.iter().find_map(|strategy| strategy(lookup, view));

    match &resolution {
        Some(found) => tracing::trace!(
            session_id = %lookup.session_id,
            target = %found.connection,
            matched_by = %found.matched_by,
            "Counterpart resolved"
        ),
        None => tracing::debug!(
            session_id = %lookup.session_id,
            direction = ?lookup.direction,
            "No counterpart resolved"
        ),
    }

    resolution
}

/// Exact receiver id within the message's session
///
/// Receivers pick their own ids, so the same id may be live in several
/// sessions at once; a match never leaves `lookup.session_id`.
pub fn by_receiver_id(lookup: &Lookup<'_>, view: &DirectoryView<'_>) -> Option<Resolution> {
    let receiver_id = lookup.receiver_id.filter(|id| !id.is_empty())?;
    let attachment = view.attachments().find(|attachment| {
        attachment.session_id == lookup.session_id && attachment.receiver_id == receiver_id
    })?;

    match lookup.direction {
        Direction::ToReceiver => Some(Resolution {
            connection: attachment.connection_id,
            matched_by: MatchedBy::ReceiverId,
            receiver_id: Some(attachment.receiver_id.clone()),
        }),
        Direction::ToSender => view
            .sender_of(&attachment.session_id)
            .map(|sender| Resolution {
                connection: sender,
                matched_by: MatchedBy::ReceiverId,
                receiver_id: None,
            }),
    }
}

/// Connection handle named in the message
pub fn by_connection_handle(lookup: &Lookup<'_>, view: &DirectoryView<'_>) -> Option<Resolution> {
    let handle: ConnectionId = lookup.connection_hint?.parse().ok()?;
    if view.role_of(handle) != Some(lookup.direction.role()) {
        return None;
    }

    match lookup.direction {
        Direction::ToReceiver => view.attachment_of(handle).map(|attachment| Resolution {
            connection: handle,
            matched_by: MatchedBy::ConnectionHandle,
            receiver_id: Some(attachment.receiver_id.clone()),
        }),
        Direction::ToSender => view.registration_owned_by(handle).map(|_| Resolution {
            connection: handle,
            matched_by: MatchedBy::ConnectionHandle,
            receiver_id: None,
        }),
    }
}

/// Session id: first attached receiver, or the registered sender
pub fn by_session_id(lookup: &Lookup<'_>, view: &DirectoryView<'_>) -> Option<Resolution> {
    match lookup.direction {
        Direction::ToReceiver => view
            .attachments()
            .find(|attachment| attachment.session_id == lookup.session_id)
            .map(|attachment| Resolution {
                connection: attachment.connection_id,
                matched_by: MatchedBy::SessionId,
                receiver_id: Some(attachment.receiver_id.clone()),
            }),
        Direction::ToSender => view.sender_of(lookup.session_id).map(|sender| Resolution {
            connection: sender,
            matched_by: MatchedBy::SessionId,
            receiver_id: None,
        }),
    }
}
