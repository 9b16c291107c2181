use std::sync::Arc;
use tokio::sync::mpsc;
use uuid::Uuid;

use tempo_rooms_server::config::ServerConfig;
use tempo_rooms_server::database::{InMemoryDatabase, PlaylistItemRow, RoomCategory, RoomRow};
use tempo_rooms_server::groups::{room_group, InMemoryGroupNotifier};
use tempo_rooms_server::protocol::{
    PlaylistItem, PlaylistItemId, QueueMode, Room, RoomId, ServerMessage, UserId,
};
use tempo_rooms_server::server::{MultiplayerHub, UserConnection};

/// A beatmap known to the seeded database.
#[allow(dead_code)]
pub const BEATMAP_ID: i32 = 7001;
#[allow(dead_code)]
pub const BEATMAP_CHECKSUM: &str = "0a1b2c3d4e5f60718293a4b5c6d7e8f9";

/// Hub wired to in-memory collaborators for integration tests.
pub struct TestServer {
    pub hub: Arc<MultiplayerHub>,
    pub database: Arc<InMemoryDatabase>,
    pub notifier: Arc<InMemoryGroupNotifier>,
}

/// A connected client: identity plus its outbound message channel.
pub struct TestClient {
    pub conn: UserConnection,
    pub rx: mpsc::Receiver<Arc<ServerMessage>>,
}

#[allow(dead_code)]
pub async fn create_test_server() -> TestServer {
    let database = Arc::new(InMemoryDatabase::new());
    let notifier = Arc::new(InMemoryGroupNotifier::new());
    let hub = Arc::new(MultiplayerHub::new(
        database.clone(),
        notifier.clone(),
        &ServerConfig::default(),
    ));
    TestServer {
        hub,
        database,
        notifier,
    }
}

impl TestServer {
    /// Seed a realtime room hosted by `host` with one playlist item owned by
    /// the host. Returns the item id.
    #[allow(dead_code)]
    pub async fn seed_realtime_room(
        &self,
        room_id: RoomId,
        host: UserId,
        queue_mode: QueueMode,
    ) -> PlaylistItemId {
        self.database.seed_beatmap(BEATMAP_ID, BEATMAP_CHECKSUM).await;
        self.database
            .seed_room(RoomRow {
                room_id,
                name: "integration lobby".to_string(),
                host_user_id: host,
                category: RoomCategory::Realtime,
                queue_mode,
                ends_at: None,
                participant_count: 0,
            })
            .await;
        self.database
            .seed_playlist_item(PlaylistItemRow {
                id: 0,
                room_id,
                owner_id: host,
                beatmap_id: BEATMAP_ID,
                beatmap_checksum: BEATMAP_CHECKSUM.to_string(),
                ruleset_id: 0,
                required_mods: Vec::new(),
                allowed_mods: Vec::new(),
                expired: false,
            })
            .await
    }

    /// Register a connection for `user_id` with the notifier.
    #[allow(dead_code)]
    pub fn connect(&self, user_id: UserId) -> TestClient {
        let connection_id = Uuid::new_v4();
        let (tx, rx) = mpsc::channel(256);
        self.notifier.register_connection(connection_id, tx);
        TestClient {
            conn: UserConnection {
                user_id,
                connection_id,
            },
            rx,
        }
    }

    /// Snapshot a room that is expected to be live.
    #[allow(dead_code)]
    pub async fn snapshot(&self, room_id: RoomId) -> Room {
        self.hub
            .room_snapshot(room_id)
            .await
            .expect("room should be live")
    }

    /// Assert the universal room invariants against a live room.
    #[allow(dead_code)]
    pub async fn assert_room_invariants(&self, room_id: RoomId) {
        let room = self.snapshot(room_id).await;

        if !room.users.is_empty() {
            let host = room.host_user_id.expect("non-empty room must have a host");
            assert!(
                room.users.iter().any(|user| user.user_id == host),
                "host {host} must be a member"
            );
        }

        if !room.playlist.is_empty() {
            let current = room
                .playlist
                .iter()
                .find(|item| item.id == room.settings.playlist_item_id)
                .expect("settings must point at a playlist item");
            if room.playlist.iter().any(|item| !item.expired) {
                assert!(
                    !current.expired,
                    "current item must be non-expired while one exists"
                );
            }
        }

        for user in &room.users {
            assert_eq!(
                self.notifier
                    .is_member(user.connection_id, &room_group(room_id, true)),
                user.state.is_gameplay(),
                "gameplay group membership for user {} in state {:?}",
                user.user_id,
                user.state
            );
        }
    }
}

impl TestClient {
    /// All messages delivered so far. Hub handlers publish before returning,
    /// so after an awaited call the channel already holds its fan-out.
    #[allow(dead_code)]
    pub fn drain(&mut self) -> Vec<Arc<ServerMessage>> {
        let mut messages = Vec::new();
        while let Ok(message) = self.rx.try_recv() {
            messages.push(message);
        }
        messages
    }
}

/// A valid new playlist item referencing the seeded beatmap.
#[allow(dead_code)]
pub fn valid_item() -> PlaylistItem {
    PlaylistItem {
        id: 0,
        owner_id: 0,
        beatmap_id: BEATMAP_ID,
        beatmap_checksum: BEATMAP_CHECKSUM.to_string(),
        ruleset_id: 0,
        required_mods: Vec::new(),
        allowed_mods: Vec::new(),
        expired: false,
    }
}

/// Drive one full round: everyone readies up, the host starts, everyone
/// loads, plays and finishes. Leaves every member in `Results` and the room
/// back at `Open`.
#[allow(dead_code)]
pub async fn run_full_round(hub: &MultiplayerHub, host: UserConnection, others: &[UserConnection]) {
    use tempo_rooms_server::protocol::MultiplayerUserState::{
        FinishedPlay, Idle, Loaded, Ready,
    };

    let everyone: Vec<UserConnection> =
        std::iter::once(host).chain(others.iter().copied()).collect();
    for conn in &everyone {
        hub.change_state(*conn, Idle).await.expect("reset to idle");
        hub.change_state(*conn, Ready).await.expect("ready up");
    }
    hub.start_match(host).await.expect("start match");
    for conn in &everyone {
        hub.change_state(*conn, Loaded).await.expect("load");
    }
    for conn in &everyone {
        hub.change_state(*conn, FinishedPlay).await.expect("finish");
    }
}
