//! Wire protocol definitions shared by the hub, the transport shell and tests.
//!
//! # Module Structure
//!
//! - [`types`]: identifiers, state enums, rulesets/mods, room members and playlist items
//! - [`settings`]: the mutable room settings record
//! - [`messages`]: tagged client request and server message enums
//! - [`error_codes`]: wire-level error codes

pub mod error_codes;
pub mod messages;
pub mod settings;
pub mod types;

pub use error_codes::ErrorCode;

pub use messages::{ClientRequest, ServerMessage};

pub use settings::RoomSettings;

pub use types::{
    ConnectionId, Mod, MultiplayerRoomState, MultiplayerRoomUser, MultiplayerUserState,
    PlaylistItem, PlaylistItemId, QueueMode, Room, RoomId, Ruleset, UserId,
};
