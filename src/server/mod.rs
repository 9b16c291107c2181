//! Room lifecycle, membership, queue and match orchestration.
//!
//! [`MultiplayerHub`] owns the process-wide registries and the collaborator
//! seams. Handlers acquire exclusive handles in a fixed order (user session
//! first, then room) so that no two lock chains can deadlock; everything a
//! handler does to a room happens under that room's handle.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use crate::config::ServerConfig;
use crate::database::ServerDatabase;
use crate::entity::{EntityHandle, EntityStore};
use crate::error::MultiplayerError;
use crate::groups::GroupNotifier;
use crate::protocol::{ConnectionId, Room, RoomId, ServerMessage, UserId};

mod match_flow;
mod membership;
mod queue;
mod room;
mod settings;

pub use match_flow::client_transition_allowed;
pub use queue::PER_USER_QUEUE_LIMIT;
pub use room::ServerRoom;

/// Caller identity derived from the authenticated connection.
#[derive(Debug, Clone, Copy)]
pub struct UserConnection {
    pub user_id: UserId,
    pub connection_id: ConnectionId,
}

/// Per-connection record binding a user to a room.
///
/// At most one session exists per user id, process-wide; the session registry
/// enforces this by keying on the user id.
#[derive(Debug, Clone)]
pub struct UserSession {
    pub user_id: UserId,
    pub connection_id: ConnectionId,
    pub room_id: RoomId,
}

/// The authoritative multiplayer room hub.
pub struct MultiplayerHub {
    rooms: EntityStore<RoomId, ServerRoom>,
    sessions: EntityStore<UserId, UserSession>,
    database: Arc<dyn ServerDatabase>,
    notifier: Arc<dyn GroupNotifier>,
    database_timeout: Duration,
}

impl MultiplayerHub {
    #[must_use]
    pub fn new(
        database: Arc<dyn ServerDatabase>,
        notifier: Arc<dyn GroupNotifier>,
        config: &ServerConfig,
    ) -> Self {
        Self {
            rooms: EntityStore::new(),
            sessions: EntityStore::new(),
            database,
            notifier,
            database_timeout: Duration::from_secs(config.database_timeout_secs),
        }
    }

    /// Number of live rooms.
    #[must_use]
    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }

    /// Number of active user sessions.
    #[must_use]
    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    /// Read-only snapshot of a live room, for diagnostics and tests.
    pub async fn room_snapshot(&self, room_id: RoomId) -> Option<Room> {
        let handle = self.rooms.get_for_use(room_id).await;
        handle.get().map(ServerRoom::snapshot)
    }

    /// Run a database call under the configured timeout, mapping failures
    /// into client-visible errors.
    pub(crate) async fn db<T, F>(&self, operation: &'static str, call: F) -> Result<T, MultiplayerError>
    where
        F: Future<Output = anyhow::Result<T>>,
    {
        match tokio::time::timeout(self.database_timeout, call).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(error)) => Err(MultiplayerError::invalid_operation(format!(
                "{operation} failed: {error:#}"
            ))),
            Err(_) => Err(MultiplayerError::invalid_operation(format!(
                "{operation} timed out"
            ))),
        }
    }

    /// Publish to a group. Failures are logged and swallowed: the
    /// authoritative state has already advanced.
    pub(crate) async fn emit(&self, group: String, message: ServerMessage) {
        if let Err(error) = self.notifier.send_to_group(&group, Arc::new(message)).await {
            tracing::warn!(group, "failed to publish room event: {error:#}");
        }
    }

    /// Acquire the caller's session and its room, in that order.
    ///
    /// The room handle is guaranteed to hold a live room; a session pointing
    /// at a dead room is torn down here.
    pub(crate) async fn acquire_session_room(
        &self,
        user_id: UserId,
    ) -> Result<
        (
            EntityHandle<'_, UserId, UserSession>,
            EntityHandle<'_, RoomId, ServerRoom>,
        ),
        MultiplayerError,
    > {
        let session = self.sessions.get_for_use(user_id).await;
        let Some(state) = session.get() else {
            return Err(MultiplayerError::NotJoinedRoom);
        };
        let room_id = state.room_id;

        let room = self.rooms.get_for_use(room_id).await;
        if room.get().is_none() {
            session.destroy();
            return Err(MultiplayerError::invalid_operation(
                "session referenced a room that no longer exists",
            ));
        }
        Ok((session, room))
    }
}

/// Borrow the room out of a handle known to hold one.
pub(crate) fn room_mut<'h>(
    handle: &'h mut EntityHandle<'_, RoomId, ServerRoom>,
) -> Result<&'h mut ServerRoom, MultiplayerError> {
    handle
        .get_mut()
        .ok_or_else(|| MultiplayerError::invalid_operation("room state missing from its slot"))
}
