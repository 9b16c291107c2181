use serde::{Deserialize, Serialize};

use super::types::{mods_equivalent, Mod, PlaylistItemId, QueueMode};

/// The mutable settings record of a room.
///
/// `playlist_item_id` always tracks the queue's current item; clients cannot
/// set it directly and the server overwrites whatever value a `ChangeSettings`
/// request carries.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RoomSettings {
    pub name: String,
    pub beatmap_id: i32,
    pub beatmap_checksum: String,
    pub ruleset_id: i16,
    #[serde(default)]
    pub required_mods: Vec<Mod>,
    #[serde(default)]
    pub allowed_mods: Vec<Mod>,
    #[serde(default)]
    pub queue_mode: QueueMode,
    #[serde(default)]
    pub playlist_item_id: PlaylistItemId,
}

// Value equality over all scalar fields; mod lists compare as sets.
impl PartialEq for RoomSettings {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
            && self.beatmap_id == other.beatmap_id
            && self.beatmap_checksum == other.beatmap_checksum
            && self.ruleset_id == other.ruleset_id
            && self.queue_mode == other.queue_mode
            && self.playlist_item_id == other.playlist_item_id
            && mods_equivalent(&self.required_mods, &other.required_mods)
            && mods_equivalent(&self.allowed_mods, &other.allowed_mods)
    }
}

impl Eq for RoomSettings {}
