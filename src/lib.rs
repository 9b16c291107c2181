#![cfg_attr(not(test), deny(clippy::panic))]
#![allow(
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::module_name_repetitions,
    clippy::too_many_lines
)]

//! # Tempo Rooms Server
//!
//! The server-side authority for realtime multiplayer rooms in a rhythm game.
//!
//! Clients connect over a persistent bidirectional channel; the server owns the
//! authoritative room state, orchestrates the match lifecycle
//! (lobby -> load -> play -> results), and fans out change notifications to
//! room members.

/// Server configuration and environment variables
pub mod config;

/// Database collaborator abstraction (in-memory implementation)
pub mod database;

/// Exclusive-use entity registries for rooms and user sessions
pub mod entity;

/// Client-facing error type and wire-code mapping
pub mod error;

/// Named broadcast groups and fan-out
pub mod groups;

/// Structured logging configuration
pub mod logging;

/// Wire protocol definitions
pub mod protocol;

/// Room lifecycle, membership, queue and match orchestration
pub mod server;

/// WebSocket connection handling
pub mod websocket;
