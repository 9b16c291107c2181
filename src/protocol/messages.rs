use serde::{Deserialize, Serialize};

use super::error_codes::ErrorCode;
use super::settings::RoomSettings;
use super::types::{
    MultiplayerRoomState, MultiplayerRoomUser, MultiplayerUserState, PlaylistItem, Room, RoomId,
    UserId,
};

/// Requests sent from client to server over the persistent channel.
///
/// Caller identity is derived from the authenticated connection, never from
/// the request body.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum ClientRequest {
    /// Join a room, creating the in-memory instance on first join.
    JoinRoom { room_id: RoomId },
    /// Leave the current room.
    LeaveRoom,
    /// Hand host privileges to another member.
    TransferHost { user_id: UserId },
    /// Request a per-user state transition.
    ChangeState { state: MultiplayerUserState },
    /// Begin the match (host only).
    StartMatch,
    /// Replace the room settings (host only).
    ChangeSettings { settings: RoomSettings },
    /// Enqueue a playlist item, or edit the current one in host-only mode.
    AddPlaylistItem { item: PlaylistItem },
}

/// Messages sent from server to client: request replies and room fan-out.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum ServerMessage {
    /// Successfully joined a room (boxed to reduce enum size).
    RoomJoined(Box<Room>),
    /// A user joined the room.
    UserJoined { user: MultiplayerRoomUser },
    /// A user left the room.
    UserLeft { user_id: UserId },
    /// A user's state changed.
    UserStateChanged {
        user_id: UserId,
        state: MultiplayerUserState,
    },
    /// Host privileges moved to another member.
    HostChanged { user_id: UserId },
    /// The room lifecycle state changed.
    RoomStateChanged { state: MultiplayerRoomState },
    /// The room settings record changed.
    SettingsChanged { settings: RoomSettings },
    /// A playlist item was appended.
    PlaylistItemAdded { item: PlaylistItem },
    /// An existing playlist item changed (edit or expiry).
    PlaylistItemChanged { item: PlaylistItem },
    /// Gameplay started for everyone who loaded.
    MatchStarted,
    /// The round concluded and results are available.
    ResultsReady,
    /// Sent to the gameplay group: begin loading the current item.
    LoadRequested,
    /// A request failed.
    Error {
        message: String,
        error_code: ErrorCode,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_request_wire_format() {
        let json = serde_json::to_string(&ClientRequest::JoinRoom { room_id: 42 }).unwrap();
        assert_eq!(json, r#"{"type":"JoinRoom","data":{"room_id":42}}"#);

        let parsed: ClientRequest =
            serde_json::from_str(r#"{"type":"ChangeState","data":{"state":"ready"}}"#).unwrap();
        assert!(matches!(
            parsed,
            ClientRequest::ChangeState {
                state: MultiplayerUserState::Ready
            }
        ));
    }

    #[test]
    fn unit_like_messages_have_no_payload() {
        let json = serde_json::to_string(&ServerMessage::MatchStarted).unwrap();
        assert_eq!(json, r#"{"type":"MatchStarted"}"#);
    }
}
