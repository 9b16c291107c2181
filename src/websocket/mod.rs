//! WebSocket transport shell.
//!
//! The transport is a collaborator of the room hub: it authenticates a user
//! id, registers the connection with the notifier, decodes request frames and
//! dispatches them, and pumps group fan-out back over the socket. No room
//! logic lives here.

mod handler;
mod routes;

pub use routes::{router, AppState};
