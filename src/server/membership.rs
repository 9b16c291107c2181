use super::{room_mut, MultiplayerHub, ServerRoom, UserConnection, UserSession};
use crate::database::{PlaylistItemRow, RoomCategory};
use crate::error::MultiplayerError;
use crate::groups::room_group;
use crate::protocol::{MultiplayerRoomUser, Room, RoomId, ServerMessage, UserId};

impl MultiplayerHub {
    /// Join a room, creating the in-memory instance on first join.
    ///
    /// The first joiner must be the host designated by the room row; they
    /// become the in-memory host.
    pub async fn join_room(
        &self,
        conn: UserConnection,
        room_id: RoomId,
    ) -> Result<Room, MultiplayerError> {
        if self
            .db(
                "is_user_restricted",
                self.database.is_user_restricted(conn.user_id),
            )
            .await?
        {
            return Err(MultiplayerError::invalid_state("user is restricted"));
        }

        let mut session = self.sessions.get_for_use(conn.user_id).await;
        if session.get().is_some() {
            return Err(MultiplayerError::invalid_state("user is already in a room"));
        }

        let mut room_handle = self.rooms.get_for_use(room_id).await;
        if room_handle.get().is_none() {
            let room = self.load_room(conn.user_id, room_id).await?;
            room_handle.insert(room);
            if let Err(error) = self
                .db("mark_room_active", self.database.mark_room_active(room_id))
                .await
            {
                // A half-created room must not outlive the failed join.
                room_handle.destroy();
                return Err(error);
            }
            tracing::info!(%room_id, host = conn.user_id, "room brought live");
        }

        let joined = MultiplayerRoomUser::new(conn.user_id, conn.connection_id);
        {
            let room = room_mut(&mut room_handle)?;
            if room.user(conn.user_id).is_some() {
                return Err(MultiplayerError::invalid_state(
                    "user is already a member of this room",
                ));
            }
            room.users.push(joined.clone());
            if room.host_user_id.is_none() {
                room.host_user_id = Some(conn.user_id);
            }
        }

        if let Err(error) = self
            .notifier
            .add_to_group(conn.connection_id, &room_group(room_id, false))
            .await
        {
            tracing::warn!(user_id = conn.user_id, %room_id, "failed to register connection in control group: {error:#}");
        }

        let user_ids = room_handle.get().map(ServerRoom::user_ids).unwrap_or_default();
        if let Err(error) = self
            .db(
                "replace_participants",
                self.database.replace_participants(room_id, &user_ids),
            )
            .await
        {
            // Undo the membership mutation; the join never happened, and
            // nothing was broadcast yet.
            if let Some(room) = room_handle.get_mut() {
                room.users.retain(|user| user.user_id != conn.user_id);
                if room.host_user_id == Some(conn.user_id) {
                    room.host_user_id = room.users.first().map(|user| user.user_id);
                }
            }
            let _ = self
                .notifier
                .remove_from_group(conn.connection_id, &room_group(room_id, false))
                .await;
            if room_handle.get().is_some_and(|room| room.users.is_empty()) {
                // The room was created by this join; close out its row so it
                // is not left active with no participants.
                if let Err(error) = self
                    .db("mark_room_ended", self.database.mark_room_ended(room_id))
                    .await
                {
                    tracing::warn!(%room_id, "failed to mark rolled-back room ended: {error}");
                }
                room_handle.destroy();
            }
            return Err(error);
        }

        // Members only learn about the join once it is durable.
        self.emit(
            room_group(room_id, false),
            ServerMessage::UserJoined { user: joined },
        )
        .await;

        session.insert(UserSession {
            user_id: conn.user_id,
            connection_id: conn.connection_id,
            room_id,
        });

        let snapshot = room_handle
            .get()
            .map(ServerRoom::snapshot)
            .ok_or_else(|| MultiplayerError::invalid_operation("room vanished during join"))?;
        tracing::info!(user_id = conn.user_id, %room_id, "user joined room");
        Ok(snapshot)
    }

    /// Leave the current room.
    pub async fn leave_room(&self, conn: UserConnection) -> Result<(), MultiplayerError> {
        self.leave_current_room(conn.user_id).await
    }

    /// Connection teardown: an implicit leave that tolerates having no
    /// session.
    pub async fn handle_disconnect(&self, conn: UserConnection) {
        match self.leave_current_room(conn.user_id).await {
            Ok(()) | Err(MultiplayerError::NotJoinedRoom) => {}
            Err(error) => {
                tracing::warn!(user_id = conn.user_id, "disconnect cleanup failed: {error}");
            }
        }
    }

    /// Hand host privileges to another member.
    pub async fn transfer_host(
        &self,
        conn: UserConnection,
        target_user_id: UserId,
    ) -> Result<(), MultiplayerError> {
        let (_session, mut room_handle) = self.acquire_session_room(conn.user_id).await?;
        let room_id = room_handle.key();

        let previous = {
            let room = room_mut(&mut room_handle)?;
            if room.host_user_id != Some(conn.user_id) {
                return Err(MultiplayerError::NotHost);
            }
            if room.user(target_user_id).is_none() {
                return Err(MultiplayerError::invalid_state(
                    "target user is not in the room",
                ));
            }
            let previous = room.host_user_id;
            room.host_user_id = Some(target_user_id);
            previous
        };

        if let Err(error) = self
            .db(
                "update_room_host",
                self.database.update_room_host(room_id, target_user_id),
            )
            .await
        {
            if let Some(room) = room_handle.get_mut() {
                room.host_user_id = previous;
            }
            return Err(error);
        }

        self.emit(
            room_group(room_id, false),
            ServerMessage::HostChanged {
                user_id: target_user_id,
            },
        )
        .await;
        Ok(())
    }

    async fn leave_current_room(&self, user_id: UserId) -> Result<(), MultiplayerError> {
        let session = self.sessions.get_for_use(user_id).await;
        let Some(state) = session.get() else {
            return Err(MultiplayerError::NotJoinedRoom);
        };
        let room_id = state.room_id;

        let mut room_handle = self.rooms.get_for_use(room_id).await;
        if room_handle.get().is_none() {
            session.destroy();
            return Err(MultiplayerError::invalid_operation(
                "session referenced a room that no longer exists",
            ));
        }

        let removed = {
            let room = room_mut(&mut room_handle)?;
            let Some(position) = room
                .users
                .iter()
                .position(|user| user.user_id == user_id)
            else {
                session.destroy();
                return Err(MultiplayerError::invalid_operation(
                    "user is missing from the joined room",
                ));
            };
            room.users.remove(position)
        };

        for gameplay in [false, true] {
            let _ = self
                .notifier
                .remove_from_group(removed.connection_id, &room_group(room_id, gameplay))
                .await;
        }

        let user_ids = room_handle.get().map(ServerRoom::user_ids).unwrap_or_default();
        if let Err(error) = self
            .db(
                "replace_participants",
                self.database.replace_participants(room_id, &user_ids),
            )
            .await
        {
            // The member is already gone from authoritative state; the
            // snapshot catches up on the next participant write.
            tracing::warn!(%room_id, "failed to persist participants on leave: {error}");
        }

        if user_ids.is_empty() {
            if let Err(error) = self
                .db("mark_room_ended", self.database.mark_room_ended(room_id))
                .await
            {
                tracing::warn!(%room_id, "failed to mark room ended: {error}");
            }
            self.emit(room_group(room_id, false), ServerMessage::UserLeft { user_id })
                .await;
            room_handle.destroy();
            session.destroy();
            tracing::info!(%room_id, user_id, "last user left, room destroyed");
            return Ok(());
        }

        let promoted = {
            let room = room_mut(&mut room_handle)?;
            if room.host_user_id == Some(user_id) {
                let next = room.users.first().map(|user| user.user_id);
                room.host_user_id = next;
                next
            } else {
                None
            }
        };
        if let Some(new_host) = promoted {
            if let Err(error) = self
                .db(
                    "update_room_host",
                    self.database.update_room_host(room_id, new_host),
                )
                .await
            {
                tracing::warn!(%room_id, new_host, "failed to persist host change: {error}");
            }
            self.emit(
                room_group(room_id, false),
                ServerMessage::HostChanged { user_id: new_host },
            )
            .await;
        }

        self.emit(room_group(room_id, false), ServerMessage::UserLeft { user_id })
            .await;

        let room = room_mut(&mut room_handle)?;
        self.update_room_state_if_required(room).await?;

        session.destroy();
        tracing::info!(%room_id, user_id, "user left room");
        Ok(())
    }

    /// Fetch and validate a room row, then build the in-memory room with its
    /// playlist loaded and the current item selected.
    async fn load_room(
        &self,
        joining_user: UserId,
        room_id: RoomId,
    ) -> Result<ServerRoom, MultiplayerError> {
        let row = self
            .db("get_room", self.database.get_room(room_id))
            .await?
            .ok_or_else(|| MultiplayerError::invalid_state("room does not exist"))?;

        if row.category != RoomCategory::Realtime {
            return Err(MultiplayerError::invalid_state("not a realtime room"));
        }
        if row.ends_at.is_some() {
            return Err(MultiplayerError::invalid_state("room has already ended"));
        }
        if row.host_user_id != joining_user {
            return Err(MultiplayerError::invalid_state(
                "the room host has not joined yet",
            ));
        }

        let items = self
            .db(
                "get_all_playlist_items",
                self.database.get_all_playlist_items(room_id),
            )
            .await?;

        let mut room = ServerRoom::new(row);
        room.playlist = items.into_iter().map(PlaylistItemRow::into_item).collect();
        if !room.playlist.is_empty() {
            room.current_index =
                super::queue::select_current_index(&room.playlist, room.settings.queue_mode);
            room.seed_settings_from_current_item();
        }
        Ok(room)
    }
}
