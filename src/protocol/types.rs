use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::settings::RoomSettings;

/// Room identifier, assigned by the database when the room is created.
pub type RoomId = i64;

/// User identifier, assigned by the account system.
pub type UserId = i32;

/// Playlist item identifier, assigned by the database on insert.
pub type PlaylistItemId = i64;

/// Opaque per-connection token handed out by the transport.
pub type ConnectionId = Uuid;

/// Per-user state within a multiplayer room.
///
/// Clients may only request the transitions marked as client-initiated in
/// [`client_transition_allowed`](crate::server::client_transition_allowed);
/// everything else is driven by the server during match orchestration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MultiplayerUserState {
    #[default]
    Idle,
    Ready,
    WaitingForLoad,
    Loaded,
    Playing,
    FinishedPlay,
    Results,
}

impl MultiplayerUserState {
    /// Whether a user in this state belongs to the room's gameplay group.
    #[must_use]
    pub const fn is_gameplay(self) -> bool {
        matches!(
            self,
            Self::Ready | Self::WaitingForLoad | Self::Loaded | Self::Playing
        )
    }
}

/// Room lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MultiplayerRoomState {
    #[default]
    Open,
    WaitingForLoad,
    Playing,
}

/// Rule set governing current-item selection and who may enqueue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueueMode {
    #[default]
    HostOnly,
    AllPlayersRoundRobin,
    AllPlayers,
}

/// Gameplay ruleset. Carried on the wire as the numeric id in
/// `ruleset_id` fields and resolved through [`Ruleset::from_id`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ruleset {
    Osu,
    Taiko,
    Catch,
    Mania,
}

/// Mod acronyms valid in every ruleset.
const UNIVERSAL_MODS: &[&str] = &[
    "EZ", "NF", "HT", "DC", "HR", "SD", "PF", "DT", "NC", "HD", "FL", "AC", "MU", "WU", "WD",
];

/// Mod acronyms only meaningful with a cursor.
const OSU_ONLY_MODS: &[&str] = &["RX", "AP", "SO", "TP", "BL"];

/// Relax variants for the drum/fruit rulesets.
const TAIKO_ONLY_MODS: &[&str] = &["RX"];
const CATCH_ONLY_MODS: &[&str] = &["RX"];

/// Key count and playfield mods exclusive to mania.
const MANIA_ONLY_MODS: &[&str] = &[
    "1K", "2K", "3K", "4K", "5K", "6K", "7K", "8K", "9K", "10K", "DS", "MR", "RD", "FI", "CO",
    "IN",
];

impl Ruleset {
    /// Resolve a wire-level ruleset id, rejecting out-of-range values.
    #[must_use]
    pub const fn from_id(id: i16) -> Option<Self> {
        match id {
            0 => Some(Self::Osu),
            1 => Some(Self::Taiko),
            2 => Some(Self::Catch),
            3 => Some(Self::Mania),
            _ => None,
        }
    }

    #[must_use]
    pub const fn id(self) -> i16 {
        match self {
            Self::Osu => 0,
            Self::Taiko => 1,
            Self::Catch => 2,
            Self::Mania => 3,
        }
    }

    /// Whether the given mod is legal in this ruleset.
    #[must_use]
    pub fn supports_mod(self, m: &Mod) -> bool {
        let acronym = m.acronym.as_str();
        if UNIVERSAL_MODS.contains(&acronym) {
            return true;
        }
        let extra = match self {
            Self::Osu => OSU_ONLY_MODS,
            Self::Taiko => TAIKO_ONLY_MODS,
            Self::Catch => CATCH_ONLY_MODS,
            Self::Mania => MANIA_ONLY_MODS,
        };
        extra.contains(&acronym)
    }
}

/// A gameplay modifier, identified by its acronym (e.g. `"DT"`, `"HD"`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Mod {
    pub acronym: String,
}

impl Mod {
    #[must_use]
    pub fn new(acronym: &str) -> Self {
        Self {
            acronym: acronym.to_string(),
        }
    }
}

/// Two mod lists are equivalent when they contain the same set of acronyms,
/// regardless of order.
#[must_use]
pub fn mods_equivalent(a: &[Mod], b: &[Mod]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut lhs: Vec<&Mod> = a.iter().collect();
    let mut rhs: Vec<&Mod> = b.iter().collect();
    lhs.sort();
    rhs.sort();
    lhs == rhs
}

/// A member of a multiplayer room.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MultiplayerRoomUser {
    pub user_id: UserId,
    pub state: MultiplayerUserState,
    /// Transport token for group membership management; never sent to clients.
    #[serde(skip)]
    pub connection_id: ConnectionId,
}

impl MultiplayerRoomUser {
    #[must_use]
    pub fn new(user_id: UserId, connection_id: ConnectionId) -> Self {
        Self {
            user_id,
            state: MultiplayerUserState::Idle,
            connection_id,
        }
    }
}

/// An entry in a room's playlist.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaylistItem {
    pub id: PlaylistItemId,
    pub owner_id: UserId,
    pub beatmap_id: i32,
    pub beatmap_checksum: String,
    pub ruleset_id: i16,
    #[serde(default)]
    pub required_mods: Vec<Mod>,
    #[serde(default)]
    pub allowed_mods: Vec<Mod>,
    #[serde(default)]
    pub expired: bool,
}

/// Snapshot of a room as returned from `JoinRoom` and used by invariant checks.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Room {
    pub room_id: RoomId,
    pub state: MultiplayerRoomState,
    pub settings: RoomSettings,
    pub users: Vec<MultiplayerRoomUser>,
    pub host_user_id: Option<UserId>,
    pub playlist: Vec<PlaylistItem>,
}
