//! Database collaborator abstraction.
//!
//! The in-memory room is the authoritative source of truth for live state;
//! the database reflects the last committed snapshot for discovery and
//! post-mortem queries, and suffices to rebuild a room on demand after a
//! restart.

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::protocol::{Mod, PlaylistItem, PlaylistItemId, QueueMode, RoomId, UserId};

mod in_memory;

pub use in_memory::InMemoryDatabase;

/// Discovery category of a room row. Only realtime rooms are joinable here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoomCategory {
    Playlists,
    Realtime,
}

/// A room as persisted. `ends_at` is null exactly while the room is active.
#[derive(Debug, Clone)]
pub struct RoomRow {
    pub room_id: RoomId,
    pub name: String,
    pub host_user_id: UserId,
    pub category: RoomCategory,
    pub queue_mode: QueueMode,
    pub ends_at: Option<DateTime<Utc>>,
    pub participant_count: u32,
}

/// A playlist item as persisted.
#[derive(Debug, Clone)]
pub struct PlaylistItemRow {
    pub id: PlaylistItemId,
    pub room_id: RoomId,
    pub owner_id: UserId,
    pub beatmap_id: i32,
    pub beatmap_checksum: String,
    pub ruleset_id: i16,
    pub required_mods: Vec<Mod>,
    pub allowed_mods: Vec<Mod>,
    pub expired: bool,
}

impl PlaylistItemRow {
    #[must_use]
    pub fn from_item(room_id: RoomId, item: &PlaylistItem) -> Self {
        Self {
            id: item.id,
            room_id,
            owner_id: item.owner_id,
            beatmap_id: item.beatmap_id,
            beatmap_checksum: item.beatmap_checksum.clone(),
            ruleset_id: item.ruleset_id,
            required_mods: item.required_mods.clone(),
            allowed_mods: item.allowed_mods.clone(),
            expired: item.expired,
        }
    }

    #[must_use]
    pub fn into_item(self) -> PlaylistItem {
        PlaylistItem {
            id: self.id,
            owner_id: self.owner_id,
            beatmap_id: self.beatmap_id,
            beatmap_checksum: self.beatmap_checksum,
            ruleset_id: self.ruleset_id,
            required_mods: self.required_mods,
            allowed_mods: self.allowed_mods,
            expired: self.expired,
        }
    }
}

/// Storage operations required by the room hub.
///
/// All calls are async and may be performed inside a held room handle; the
/// hub wraps each one in its configured timeout.
#[async_trait]
pub trait ServerDatabase: Send + Sync {
    /// Fetch a room row by id.
    async fn get_room(&self, room_id: RoomId) -> Result<Option<RoomRow>>;

    /// All playlist items for a room, in database insertion order.
    async fn get_all_playlist_items(&self, room_id: RoomId) -> Result<Vec<PlaylistItemRow>>;

    /// Insert a playlist item, returning the assigned id.
    async fn add_playlist_item(&self, row: PlaylistItemRow) -> Result<PlaylistItemId>;

    /// Overwrite an existing playlist item.
    async fn update_playlist_item(&self, row: PlaylistItemRow) -> Result<()>;

    /// Mark a playlist item expired.
    async fn expire_playlist_item(&self, id: PlaylistItemId) -> Result<()>;

    /// The known checksum for a beatmap, if any.
    async fn get_beatmap_checksum(&self, beatmap_id: i32) -> Result<Option<String>>;

    /// Persist a room rename.
    async fn update_room_name(&self, room_id: RoomId, name: &str) -> Result<()>;

    /// Persist a host change.
    async fn update_room_host(&self, room_id: RoomId, user_id: UserId) -> Result<()>;

    /// Remove prior scores for a playlist item before a fresh attempt.
    async fn clear_scores(&self, playlist_item_id: PlaylistItemId) -> Result<()>;

    /// Set `ends_at` to null.
    async fn mark_room_active(&self, room_id: RoomId) -> Result<()>;

    /// Set `ends_at` to the current time.
    async fn mark_room_ended(&self, room_id: RoomId) -> Result<()>;

    /// Replace the participant set transactionally and refresh the count.
    async fn replace_participants(&self, room_id: RoomId, user_ids: &[UserId]) -> Result<()>;

    /// Whether the user is barred from joining rooms.
    async fn is_user_restricted(&self, user_id: UserId) -> Result<bool>;
}
