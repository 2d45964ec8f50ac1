//! Relay Server Library
//!
//! Rendezvous relay for anonymous file transfer: senders and receivers meet
//! on a shared session id and move files chunk by chunk over WebSockets.
//!
//! This module exposes the internal components for testing and client use.

pub mod config;
pub mod error;
pub mod relay;
pub mod routes;
pub mod state;
pub mod transfer;
