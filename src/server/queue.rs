use super::{room_mut, MultiplayerHub, ServerRoom, UserConnection};
use crate::database::PlaylistItemRow;
use crate::error::MultiplayerError;
use crate::groups::room_group;
use crate::protocol::{PlaylistItem, QueueMode, Ruleset, ServerMessage, UserId};

/// Maximum non-expired items a single user may own in the shared queue modes.
pub const PER_USER_QUEUE_LIMIT: usize = 3;

/// Pick the playlist cursor for the given mode.
///
/// Host-only and all-players take the first non-expired item in insertion
/// order. Round-robin groups items by owner, orders owners ascending by how
/// many of their items have expired (players who have played least come
/// first, ties broken by first appearance), and takes the first non-expired
/// item of the first owner that still has one. When everything is expired the
/// cursor rests on the last item.
pub(crate) fn select_current_index(playlist: &[PlaylistItem], mode: QueueMode) -> usize {
    debug_assert!(!playlist.is_empty());
    let fallback = playlist.len().saturating_sub(1);
    match mode {
        QueueMode::HostOnly | QueueMode::AllPlayers => playlist
            .iter()
            .position(|item| !item.expired)
            .unwrap_or(fallback),
        QueueMode::AllPlayersRoundRobin => {
            let mut owners: Vec<UserId> = Vec::new();
            for item in playlist {
                if !owners.contains(&item.owner_id) {
                    owners.push(item.owner_id);
                }
            }
            // Stable sort keeps first-appearance order among equal counts.
            owners.sort_by_key(|owner| {
                playlist
                    .iter()
                    .filter(|item| item.owner_id == *owner && item.expired)
                    .count()
            });
            owners
                .iter()
                .find_map(|owner| {
                    playlist
                        .iter()
                        .position(|item| item.owner_id == *owner && !item.expired)
                })
                .unwrap_or(fallback)
        }
    }
}

impl MultiplayerHub {
    /// Enqueue a playlist item, or edit the current one in host-only mode.
    pub async fn add_playlist_item(
        &self,
        conn: UserConnection,
        item: PlaylistItem,
    ) -> Result<(), MultiplayerError> {
        let (_session, mut room_handle) = self.acquire_session_room(conn.user_id).await?;
        let room = room_mut(&mut room_handle)?;
        self.queue_add_item(room, item, conn.user_id).await
    }

    pub(crate) async fn queue_add_item(
        &self,
        room: &mut ServerRoom,
        mut item: PlaylistItem,
        user_id: UserId,
    ) -> Result<(), MultiplayerError> {
        let host_only = room.settings.queue_mode == QueueMode::HostOnly;

        if host_only && room.host_user_id != Some(user_id) {
            return Err(MultiplayerError::NotHost);
        }
        if !host_only {
            let owned = room
                .playlist
                .iter()
                .filter(|existing| existing.owner_id == user_id && !existing.expired)
                .count();
            if owned >= PER_USER_QUEUE_LIMIT {
                return Err(MultiplayerError::invalid_state(
                    "queue limit for this user has been reached",
                ));
            }
        }

        let known = self
            .db(
                "get_beatmap_checksum",
                self.database.get_beatmap_checksum(item.beatmap_id),
            )
            .await?
            .ok_or_else(|| MultiplayerError::invalid_state("beatmap is not known"))?;
        if known != item.beatmap_checksum {
            return Err(MultiplayerError::invalid_state("beatmap has been modified"));
        }
        validate_ruleset_and_mods(&item)?;

        if host_only {
            // Edit in place: the current item keeps its id and owner.
            let (id, owner_id, expired) = {
                let current = room.current_item().ok_or_else(|| {
                    MultiplayerError::invalid_operation("host-only queue has no current item")
                })?;
                (current.id, current.owner_id, current.expired)
            };
            item.id = id;
            item.owner_id = owner_id;
            item.expired = expired;

            self.db(
                "update_playlist_item",
                self.database
                    .update_playlist_item(PlaylistItemRow::from_item(room.room_id, &item)),
            )
            .await?;
            if let Some(current) = room.current_item_mut() {
                *current = item.clone();
            }
            self.emit(
                room_group(room.room_id, false),
                ServerMessage::PlaylistItemChanged { item },
            )
            .await;
        } else {
            item.owner_id = user_id;
            item.expired = false;
            item.id = self
                .db(
                    "add_playlist_item",
                    self.database
                        .add_playlist_item(PlaylistItemRow::from_item(room.room_id, &item)),
                )
                .await?;
            room.playlist.push(item.clone());
            self.emit(
                room_group(room.room_id, false),
                ServerMessage::PlaylistItemAdded { item },
            )
            .await;
            self.queue_update_current_item(room).await;
        }
        Ok(())
    }

    /// Conclude the current item after a round: expire it, top the host-only
    /// queue back up, and advance the cursor.
    pub(crate) async fn finish_current_item(
        &self,
        room: &mut ServerRoom,
    ) -> Result<(), MultiplayerError> {
        let Some(current_id) = room.current_item().map(|item| item.id) else {
            return Ok(());
        };

        self.db(
            "expire_playlist_item",
            self.database.expire_playlist_item(current_id),
        )
        .await?;
        let changed = {
            let Some(current) = room.current_item_mut() else {
                return Ok(());
            };
            current.expired = true;
            current.clone()
        };
        self.emit(
            room_group(room.room_id, false),
            ServerMessage::PlaylistItemChanged { item: changed },
        )
        .await;

        if room.settings.queue_mode == QueueMode::HostOnly
            && room.playlist.iter().all(|item| item.expired)
        {
            self.duplicate_current_item(room).await?;
        }
        self.queue_update_current_item(room).await;
        Ok(())
    }

    /// React to the queue mode changing via settings.
    pub(crate) async fn update_from_queue_mode_change(
        &self,
        room: &mut ServerRoom,
    ) -> Result<(), MultiplayerError> {
        if room.settings.queue_mode == QueueMode::HostOnly
            && room.playlist.iter().all(|item| item.expired)
        {
            self.duplicate_current_item(room).await?;
        }
        self.queue_update_current_item(room).await;
        Ok(())
    }

    /// Re-insert the current item as a fresh copy so the host-only queue is
    /// never left without a playable item.
    async fn duplicate_current_item(&self, room: &mut ServerRoom) -> Result<(), MultiplayerError> {
        let Some(source) = room.current_item() else {
            return Ok(());
        };
        let mut duplicate = source.clone();
        duplicate.expired = false;

        duplicate.id = self
            .db(
                "add_playlist_item",
                self.database
                    .add_playlist_item(PlaylistItemRow::from_item(room.room_id, &duplicate)),
            )
            .await?;
        room.playlist.push(duplicate.clone());
        self.emit(
            room_group(room.room_id, false),
            ServerMessage::PlaylistItemAdded { item: duplicate },
        )
        .await;
        Ok(())
    }

    /// Recompute the cursor; when the current item changed, mirror it into
    /// the settings record and notify the room.
    pub(crate) async fn queue_update_current_item(&self, room: &mut ServerRoom) {
        if room.playlist.is_empty() {
            return;
        }
        room.current_index = select_current_index(&room.playlist, room.settings.queue_mode);
        let current_id = room.playlist[room.current_index].id;
        if room.settings.playlist_item_id != current_id {
            room.settings.playlist_item_id = current_id;
            self.emit(
                room_group(room.room_id, false),
                ServerMessage::SettingsChanged {
                    settings: room.settings.clone(),
                },
            )
            .await;
        }
    }
}

fn validate_ruleset_and_mods(item: &PlaylistItem) -> Result<(), MultiplayerError> {
    let Some(ruleset) = Ruleset::from_id(item.ruleset_id) else {
        return Err(MultiplayerError::invalid_state(format!(
            "ruleset id {} is out of range",
            item.ruleset_id
        )));
    };
    for gameplay_mod in item.required_mods.iter().chain(&item.allowed_mods) {
        if !ruleset.supports_mod(gameplay_mod) {
            return Err(MultiplayerError::invalid_state(format!(
                "mod {} is not valid for ruleset {:?}",
                gameplay_mod.acronym, ruleset
            )));
        }
    }
    for required in &item.required_mods {
        if item.allowed_mods.contains(required) {
            return Err(MultiplayerError::invalid_state(format!(
                "mod {} cannot be both required and allowed",
                required.acronym
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::Mod;
    use proptest::prelude::*;

    fn item(id: i64, owner: UserId, expired: bool) -> PlaylistItem {
        PlaylistItem {
            id,
            owner_id: owner,
            beatmap_id: 100,
            beatmap_checksum: "cafe".to_string(),
            ruleset_id: 0,
            required_mods: Vec::new(),
            allowed_mods: Vec::new(),
            expired,
        }
    }

    #[test]
    fn linear_modes_take_first_unexpired() {
        let playlist = vec![item(1, 1, true), item(2, 1, false), item(3, 2, false)];
        assert_eq!(select_current_index(&playlist, QueueMode::HostOnly), 1);
        assert_eq!(select_current_index(&playlist, QueueMode::AllPlayers), 1);
    }

    #[test]
    fn linear_modes_fall_back_to_last_when_all_expired() {
        let playlist = vec![item(1, 1, true), item(2, 2, true)];
        assert_eq!(select_current_index(&playlist, QueueMode::AllPlayers), 1);
    }

    #[test]
    fn round_robin_prefers_owner_who_played_least() {
        // Owner 1 has played twice, owner 2 once, owner 3 never.
        let playlist = vec![
            item(1, 1, true),
            item(2, 1, true),
            item(3, 1, false),
            item(4, 2, true),
            item(5, 2, false),
            item(6, 3, false),
        ];
        let index = select_current_index(&playlist, QueueMode::AllPlayersRoundRobin);
        assert_eq!(playlist[index].id, 6);
    }

    #[test]
    fn round_robin_ties_break_by_first_appearance() {
        let playlist = vec![item(1, 7, false), item(2, 8, false)];
        let index = select_current_index(&playlist, QueueMode::AllPlayersRoundRobin);
        assert_eq!(playlist[index].id, 1);
    }

    #[test]
    fn round_robin_falls_back_to_last_when_all_expired() {
        let playlist = vec![item(1, 1, true), item(2, 2, true), item(3, 1, true)];
        assert_eq!(
            select_current_index(&playlist, QueueMode::AllPlayersRoundRobin),
            2
        );
    }

    #[test]
    fn disjoint_mod_sets_are_enforced() {
        let mut candidate = item(1, 1, false);
        candidate.required_mods = vec![Mod::new("HD")];
        candidate.allowed_mods = vec![Mod::new("HD"), Mod::new("HR")];
        assert!(validate_ruleset_and_mods(&candidate).is_err());

        candidate.allowed_mods = vec![Mod::new("HR")];
        assert!(validate_ruleset_and_mods(&candidate).is_ok());
    }

    #[test]
    fn out_of_range_ruleset_is_rejected() {
        let mut candidate = item(1, 1, false);
        candidate.ruleset_id = 9;
        assert!(validate_ruleset_and_mods(&candidate).is_err());
    }

    proptest! {
        /// The cursor always lands on a non-expired item when one exists, and
        /// on the last item otherwise, in every mode.
        #[test]
        fn selection_respects_expiry(
            entries in proptest::collection::vec((0i32..4, any::<bool>()), 1..12),
            mode_index in 0usize..3,
        ) {
            let playlist: Vec<PlaylistItem> = entries
                .iter()
                .enumerate()
                .map(|(position, (owner, expired))| item(position as i64 + 1, *owner, *expired))
                .collect();
            let mode = [
                QueueMode::HostOnly,
                QueueMode::AllPlayersRoundRobin,
                QueueMode::AllPlayers,
            ][mode_index];

            let index = select_current_index(&playlist, mode);
            prop_assert!(index < playlist.len());
            if playlist.iter().any(|candidate| !candidate.expired) {
                prop_assert!(!playlist[index].expired);
            } else {
                prop_assert_eq!(index, playlist.len() - 1);
            }
        }
    }
}
