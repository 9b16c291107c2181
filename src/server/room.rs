use crate::database::RoomRow;
use crate::protocol::{
    MultiplayerRoomState, MultiplayerRoomUser, MultiplayerUserState, PlaylistItem, Room,
    RoomSettings, RoomId, UserId,
};

/// In-memory authoritative representation of a room.
///
/// Purely data; all mutation happens under the room's exclusive handle.
#[derive(Debug)]
pub struct ServerRoom {
    pub room_id: RoomId,
    pub state: MultiplayerRoomState,
    pub settings: RoomSettings,
    /// Members in join order. The first member is promoted when the host
    /// leaves.
    pub users: Vec<MultiplayerRoomUser>,
    pub host_user_id: Option<UserId>,
    /// Playlist items in database insertion order; never removed while the
    /// room is live, only marked expired.
    pub playlist: Vec<PlaylistItem>,
    /// Cursor of the queue's current item within `playlist`.
    pub current_index: usize,
}

impl ServerRoom {
    #[must_use]
    pub fn new(row: RoomRow) -> Self {
        Self {
            room_id: row.room_id,
            state: MultiplayerRoomState::Open,
            settings: RoomSettings {
                name: row.name,
                queue_mode: row.queue_mode,
                ..RoomSettings::default()
            },
            users: Vec::new(),
            host_user_id: None,
            playlist: Vec::new(),
            current_index: 0,
        }
    }

    #[must_use]
    pub fn user(&self, user_id: UserId) -> Option<&MultiplayerRoomUser> {
        self.users.iter().find(|user| user.user_id == user_id)
    }

    pub fn user_mut(&mut self, user_id: UserId) -> Option<&mut MultiplayerRoomUser> {
        self.users.iter_mut().find(|user| user.user_id == user_id)
    }

    #[must_use]
    pub fn user_ids(&self) -> Vec<UserId> {
        self.users.iter().map(|user| user.user_id).collect()
    }

    /// Member ids currently in the given state.
    #[must_use]
    pub fn users_in_state(&self, state: MultiplayerUserState) -> Vec<UserId> {
        self.users
            .iter()
            .filter(|user| user.state == state)
            .map(|user| user.user_id)
            .collect()
    }

    #[must_use]
    pub fn any_user_in_state(&self, state: MultiplayerUserState) -> bool {
        self.users.iter().any(|user| user.state == state)
    }

    #[must_use]
    pub fn current_item(&self) -> Option<&PlaylistItem> {
        self.playlist.get(self.current_index)
    }

    pub fn current_item_mut(&mut self) -> Option<&mut PlaylistItem> {
        self.playlist.get_mut(self.current_index)
    }

    /// Mirror the current queue item into the settings record.
    pub fn seed_settings_from_current_item(&mut self) {
        let Some(item) = self.playlist.get(self.current_index) else {
            return;
        };
        self.settings.playlist_item_id = item.id;
        self.settings.beatmap_id = item.beatmap_id;
        self.settings.beatmap_checksum = item.beatmap_checksum.clone();
        self.settings.ruleset_id = item.ruleset_id;
        self.settings.required_mods = item.required_mods.clone();
        self.settings.allowed_mods = item.allowed_mods.clone();
    }

    /// Serializable snapshot for join replies and invariant checks.
    #[must_use]
    pub fn snapshot(&self) -> Room {
        Room {
            room_id: self.room_id,
            state: self.state,
            settings: self.settings.clone(),
            users: self.users.clone(),
            host_user_id: self.host_user_id,
            playlist: self.playlist.clone(),
        }
    }
}
