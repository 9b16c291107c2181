use super::{room_mut, MultiplayerHub, ServerRoom, UserConnection};
use crate::error::MultiplayerError;
use crate::groups::room_group;
use crate::protocol::{MultiplayerRoomState, MultiplayerUserState, ServerMessage, UserId};

/// Whether a client may request the transition itself.
///
/// Everything outside this table is server-driven: `WaitingForLoad`,
/// `Playing` and `Results` are only ever entered by match orchestration.
#[must_use]
pub const fn client_transition_allowed(
    from: MultiplayerUserState,
    to: MultiplayerUserState,
) -> bool {
    use MultiplayerUserState::{FinishedPlay, Idle, Loaded, Playing, Ready, WaitingForLoad};
    matches!(
        (from, to),
        (_, Idle) | (Idle, Ready) | (WaitingForLoad, Loaded) | (Playing, FinishedPlay)
    )
}

impl MultiplayerHub {
    /// Handle a client-requested per-user state change.
    ///
    /// Requesting the current state is a no-op and emits nothing.
    pub async fn change_state(
        &self,
        conn: UserConnection,
        state: MultiplayerUserState,
    ) -> Result<(), MultiplayerError> {
        let (_session, mut room_handle) = self.acquire_session_room(conn.user_id).await?;

        {
            let room = room_mut(&mut room_handle)?;
            let Some(user) = room.user(conn.user_id) else {
                return Err(MultiplayerError::invalid_operation(
                    "user is missing from the joined room",
                ));
            };
            let from = user.state;
            if from == state {
                return Ok(());
            }
            if !client_transition_allowed(from, state) {
                return Err(MultiplayerError::InvalidStateChange { from, to: state });
            }
        }

        let room = room_mut(&mut room_handle)?;
        self.set_user_state(room, conn.user_id, state).await;
        self.update_room_state_if_required(room).await
    }

    /// Begin the match. Host only; the room must be open, the host ready,
    /// and at least one user ready.
    pub async fn start_match(&self, conn: UserConnection) -> Result<(), MultiplayerError> {
        let (_session, mut room_handle) = self.acquire_session_room(conn.user_id).await?;
        let room = room_mut(&mut room_handle)?;

        if room.host_user_id != Some(conn.user_id) {
            return Err(MultiplayerError::NotHost);
        }
        if room.state != MultiplayerRoomState::Open {
            return Err(MultiplayerError::invalid_state(
                "the match has already started",
            ));
        }
        if let Some(host) = room.host_user_id {
            if room
                .user(host)
                .is_some_and(|user| user.state != MultiplayerUserState::Ready)
            {
                return Err(MultiplayerError::invalid_state("the host is not ready"));
            }
        }
        let ready = room.users_in_state(MultiplayerUserState::Ready);
        if ready.is_empty() {
            return Err(MultiplayerError::invalid_state("no users are ready"));
        }

        // Previous attempts at this item must not leak into the new round.
        let current_item_id = room.settings.playlist_item_id;
        self.db("clear_scores", self.database.clear_scores(current_item_id))
            .await?;

        for user_id in ready {
            self.set_user_state(room, user_id, MultiplayerUserState::WaitingForLoad)
                .await;
        }
        self.change_room_state(room, MultiplayerRoomState::WaitingForLoad)
            .await;
        self.emit(room_group(room.room_id, true), ServerMessage::LoadRequested)
            .await;
        Ok(())
    }

    /// Apply a user state transition: emit the change, then reconcile
    /// gameplay-group membership.
    pub(crate) async fn set_user_state(
        &self,
        room: &mut ServerRoom,
        user_id: UserId,
        state: MultiplayerUserState,
    ) {
        let Some(user) = room.user_mut(user_id) else {
            return;
        };
        let previous = user.state;
        user.state = state;
        let connection_id = user.connection_id;

        tracing::debug!(
            user_id,
            room_id = room.room_id,
            ?previous,
            ?state,
            "user state changed"
        );
        self.emit(
            room_group(room.room_id, false),
            ServerMessage::UserStateChanged { user_id, state },
        )
        .await;

        if previous.is_gameplay() != state.is_gameplay() {
            let gameplay = room_group(room.room_id, true);
            let result = if state.is_gameplay() {
                self.notifier.add_to_group(connection_id, &gameplay).await
            } else {
                self.notifier
                    .remove_from_group(connection_id, &gameplay)
                    .await
            };
            if let Err(error) = result {
                tracing::warn!(
                    user_id,
                    room_id = room.room_id,
                    "failed to update gameplay group membership: {error:#}"
                );
            }
        }
    }

    pub(crate) async fn change_room_state(
        &self,
        room: &mut ServerRoom,
        state: MultiplayerRoomState,
    ) {
        room.state = state;
        tracing::info!(room_id = room.room_id, ?state, "room state changed");
        self.emit(
            room_group(room.room_id, false),
            ServerMessage::RoomStateChanged { state },
        )
        .await;
    }

    /// Drive room-level transitions that become due once per-user states
    /// settle. Runs after every accepted transition and after a leave.
    pub(crate) async fn update_room_state_if_required(
        &self,
        room: &mut ServerRoom,
    ) -> Result<(), MultiplayerError> {
        match room.state {
            MultiplayerRoomState::Open => {}
            MultiplayerRoomState::WaitingForLoad => {
                if room.any_user_in_state(MultiplayerUserState::WaitingForLoad) {
                    return Ok(());
                }
                let loaded = room.users_in_state(MultiplayerUserState::Loaded);
                if loaded.is_empty() {
                    // Everyone bailed before loading; no match happened.
                    self.change_room_state(room, MultiplayerRoomState::Open)
                        .await;
                } else {
                    for user_id in loaded {
                        self.set_user_state(room, user_id, MultiplayerUserState::Playing)
                            .await;
                    }
                    self.emit(room_group(room.room_id, false), ServerMessage::MatchStarted)
                        .await;
                    self.change_room_state(room, MultiplayerRoomState::Playing)
                        .await;
                }
            }
            MultiplayerRoomState::Playing => {
                if room.any_user_in_state(MultiplayerUserState::Playing) {
                    return Ok(());
                }
                for user_id in room.users_in_state(MultiplayerUserState::FinishedPlay) {
                    self.set_user_state(room, user_id, MultiplayerUserState::Results)
                        .await;
                }
                self.emit(room_group(room.room_id, false), ServerMessage::ResultsReady)
                    .await;
                self.change_room_state(room, MultiplayerRoomState::Open)
                    .await;
                self.finish_current_item(room).await?;
            }
        }
        Ok(())
    }
}
