use super::{room_mut, MultiplayerHub, UserConnection};
use crate::error::MultiplayerError;
use crate::groups::room_group;
use crate::protocol::{
    MultiplayerRoomState, MultiplayerUserState, Ruleset, RoomSettings, ServerMessage,
};

impl MultiplayerHub {
    /// Replace the room settings. Host only, and only while the room is open.
    ///
    /// An equal settings record is a no-op. The in-memory record is rolled
    /// back if persisting fails. A successful change demotes every ready user
    /// back to idle, and a queue-mode change is forwarded to the queue.
    pub async fn change_settings(
        &self,
        conn: UserConnection,
        settings: RoomSettings,
    ) -> Result<(), MultiplayerError> {
        let (_session, mut room_handle) = self.acquire_session_room(conn.user_id).await?;
        let room_id = room_handle.key();

        let mut incoming = settings;
        {
            let room = room_mut(&mut room_handle)?;
            if room.host_user_id != Some(conn.user_id) {
                return Err(MultiplayerError::NotHost);
            }
            if room.state != MultiplayerRoomState::Open {
                return Err(MultiplayerError::invalid_state(
                    "settings cannot change while the match is in progress",
                ));
            }
            // The current-item pointer is owned by the queue, not the client.
            incoming.playlist_item_id = room.settings.playlist_item_id;
            if incoming == room.settings {
                return Ok(());
            }
        }

        let known = self
            .db(
                "get_beatmap_checksum",
                self.database.get_beatmap_checksum(incoming.beatmap_id),
            )
            .await?
            .ok_or_else(|| MultiplayerError::invalid_state("beatmap is not known"))?;
        if known != incoming.beatmap_checksum {
            return Err(MultiplayerError::invalid_state("beatmap has been modified"));
        }
        validate_settings_mods(&incoming)?;

        let (previous, name) = {
            let room = room_mut(&mut room_handle)?;
            let name = incoming.name.clone();
            let previous = std::mem::replace(&mut room.settings, incoming);
            (previous, name)
        };

        if let Err(error) = self
            .db(
                "update_room_name",
                self.database.update_room_name(room_id, &name),
            )
            .await
        {
            if let Some(room) = room_handle.get_mut() {
                room.settings = previous;
            }
            return Err(error);
        }

        let room = room_mut(&mut room_handle)?;
        // A settings change invalidates readiness.
        for user_id in room.users_in_state(MultiplayerUserState::Ready) {
            self.set_user_state(room, user_id, MultiplayerUserState::Idle)
                .await;
        }
        self.emit(
            room_group(room_id, false),
            ServerMessage::SettingsChanged {
                settings: room.settings.clone(),
            },
        )
        .await;

        if previous.queue_mode != room.settings.queue_mode {
            self.update_from_queue_mode_change(room).await?;
        }

        tracing::info!(%room_id, user_id = conn.user_id, "room settings changed");
        Ok(())
    }
}

fn validate_settings_mods(settings: &RoomSettings) -> Result<(), MultiplayerError> {
    let Some(ruleset) = Ruleset::from_id(settings.ruleset_id) else {
        return Err(MultiplayerError::invalid_state(format!(
            "ruleset id {} is out of range",
            settings.ruleset_id
        )));
    };
    for gameplay_mod in settings.required_mods.iter().chain(&settings.allowed_mods) {
        if !ruleset.supports_mod(gameplay_mod) {
            return Err(MultiplayerError::invalid_state(format!(
                "mod {} is not valid for ruleset {:?}",
                gameplay_mod.acronym, ruleset
            )));
        }
    }
    for required in &settings.required_mods {
        if settings.allowed_mods.contains(required) {
            return Err(MultiplayerError::invalid_state(format!(
                "mod {} cannot be both required and allowed",
                required.acronym
            )));
        }
    }
    Ok(())
}
