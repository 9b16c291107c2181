//! In-memory database backend.
//!
//! Serves the binary and the test suite; a relational backend implements the
//! same trait in production deployments.

use anyhow::{bail, Result};
use async_trait::async_trait;
use chrono::Utc;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicI64, Ordering};
use tokio::sync::RwLock;

use super::{PlaylistItemRow, RoomRow, ServerDatabase};
use crate::protocol::{PlaylistItemId, RoomId, UserId};

#[derive(Default)]
struct Tables {
    rooms: HashMap<RoomId, RoomRow>,
    // BTreeMap keeps playlist rows in id order, which is insertion order.
    playlist_items: BTreeMap<PlaylistItemId, PlaylistItemRow>,
    participants: HashMap<RoomId, Vec<UserId>>,
    beatmap_checksums: HashMap<i32, String>,
    restricted_users: HashSet<UserId>,
    cleared_score_items: Vec<PlaylistItemId>,
}

/// In-memory storage behind the [`ServerDatabase`] seam.
#[derive(Default)]
pub struct InMemoryDatabase {
    tables: RwLock<Tables>,
    next_playlist_item_id: AtomicI64,
}

impl InMemoryDatabase {
    #[must_use]
    pub fn new() -> Self {
        Self {
            tables: RwLock::new(Tables::default()),
            next_playlist_item_id: AtomicI64::new(1),
        }
    }

    /// Seed a room row, as the out-of-band room creation flow would.
    pub async fn seed_room(&self, row: RoomRow) {
        self.tables.write().await.rooms.insert(row.room_id, row);
    }

    /// Seed a known beatmap checksum.
    pub async fn seed_beatmap(&self, beatmap_id: i32, checksum: &str) {
        self.tables
            .write()
            .await
            .beatmap_checksums
            .insert(beatmap_id, checksum.to_string());
    }

    /// Seed an initial playlist item, returning its id.
    pub async fn seed_playlist_item(&self, mut row: PlaylistItemRow) -> PlaylistItemId {
        let id = self.next_playlist_item_id.fetch_add(1, Ordering::Relaxed);
        row.id = id;
        self.tables.write().await.playlist_items.insert(id, row);
        id
    }

    /// Mark a user restricted.
    pub async fn restrict_user(&self, user_id: UserId) {
        self.tables.write().await.restricted_users.insert(user_id);
    }

    /// Current participant list, for assertions.
    pub async fn participants(&self, room_id: RoomId) -> Vec<UserId> {
        self.tables
            .read()
            .await
            .participants
            .get(&room_id)
            .cloned()
            .unwrap_or_default()
    }

    /// Playlist items whose scores were cleared, in clearing order.
    pub async fn cleared_score_items(&self) -> Vec<PlaylistItemId> {
        self.tables.read().await.cleared_score_items.clone()
    }

    /// Whether the room row is currently active (`ends_at` null).
    pub async fn is_room_active(&self, room_id: RoomId) -> bool {
        self.tables
            .read()
            .await
            .rooms
            .get(&room_id)
            .is_some_and(|row| row.ends_at.is_none())
    }
}

#[async_trait]
impl ServerDatabase for InMemoryDatabase {
    async fn get_room(&self, room_id: RoomId) -> Result<Option<RoomRow>> {
        Ok(self.tables.read().await.rooms.get(&room_id).cloned())
    }

    async fn get_all_playlist_items(&self, room_id: RoomId) -> Result<Vec<PlaylistItemRow>> {
        Ok(self
            .tables
            .read()
            .await
            .playlist_items
            .values()
            .filter(|row| row.room_id == room_id)
            .cloned()
            .collect())
    }

    async fn add_playlist_item(&self, mut row: PlaylistItemRow) -> Result<PlaylistItemId> {
        let id = self.next_playlist_item_id.fetch_add(1, Ordering::Relaxed);
        row.id = id;
        self.tables.write().await.playlist_items.insert(id, row);
        Ok(id)
    }

    async fn update_playlist_item(&self, row: PlaylistItemRow) -> Result<()> {
        let mut tables = self.tables.write().await;
        match tables.playlist_items.get_mut(&row.id) {
            Some(existing) => {
                *existing = row;
                Ok(())
            }
            None => bail!("playlist item {} does not exist", row.id),
        }
    }

    async fn expire_playlist_item(&self, id: PlaylistItemId) -> Result<()> {
        let mut tables = self.tables.write().await;
        match tables.playlist_items.get_mut(&id) {
            Some(existing) => {
                existing.expired = true;
                Ok(())
            }
            None => bail!("playlist item {id} does not exist"),
        }
    }

    async fn get_beatmap_checksum(&self, beatmap_id: i32) -> Result<Option<String>> {
        Ok(self
            .tables
            .read()
            .await
            .beatmap_checksums
            .get(&beatmap_id)
            .cloned())
    }

    async fn update_room_name(&self, room_id: RoomId, name: &str) -> Result<()> {
        let mut tables = self.tables.write().await;
        match tables.rooms.get_mut(&room_id) {
            Some(room) => {
                room.name = name.to_string();
                Ok(())
            }
            None => bail!("room {room_id} does not exist"),
        }
    }

    async fn update_room_host(&self, room_id: RoomId, user_id: UserId) -> Result<()> {
        let mut tables = self.tables.write().await;
        match tables.rooms.get_mut(&room_id) {
            Some(room) => {
                room.host_user_id = user_id;
                Ok(())
            }
            None => bail!("room {room_id} does not exist"),
        }
    }

    async fn clear_scores(&self, playlist_item_id: PlaylistItemId) -> Result<()> {
        self.tables
            .write()
            .await
            .cleared_score_items
            .push(playlist_item_id);
        Ok(())
    }

    async fn mark_room_active(&self, room_id: RoomId) -> Result<()> {
        let mut tables = self.tables.write().await;
        match tables.rooms.get_mut(&room_id) {
            Some(room) => {
                room.ends_at = None;
                Ok(())
            }
            None => bail!("room {room_id} does not exist"),
        }
    }

    async fn mark_room_ended(&self, room_id: RoomId) -> Result<()> {
        let mut tables = self.tables.write().await;
        match tables.rooms.get_mut(&room_id) {
            Some(room) => {
                room.ends_at = Some(Utc::now());
                Ok(())
            }
            None => bail!("room {room_id} does not exist"),
        }
    }

    async fn replace_participants(&self, room_id: RoomId, user_ids: &[UserId]) -> Result<()> {
        // Delete + insert under one table lock, then refresh the count.
        let mut tables = self.tables.write().await;
        tables.participants.insert(room_id, user_ids.to_vec());
        if let Some(room) = tables.rooms.get_mut(&room_id) {
            room.participant_count = user_ids.len() as u32;
        }
        Ok(())
    }

    async fn is_user_restricted(&self, user_id: UserId) -> Result<bool> {
        Ok(self
            .tables
            .read()
            .await
            .restricted_users
            .contains(&user_id))
    }
}
