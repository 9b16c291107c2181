use axum::extract::ws::{Message, WebSocket};
use axum::extract::{Query, State, WebSocketUpgrade};
use axum::response::IntoResponse;
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio::sync::mpsc;
use uuid::Uuid;

use super::routes::AppState;
use crate::error::MultiplayerError;
use crate::protocol::{ClientRequest, ErrorCode, ServerMessage, UserId};
use crate::server::{MultiplayerHub, UserConnection};

/// Connection parameters.
///
/// Authentication proper is a collaborator; the handshake carries the already
/// authenticated user id.
#[derive(Debug, Deserialize)]
pub struct ConnectParams {
    pub user_id: UserId,
}

pub async fn ws_handler(
    ws: WebSocketUpgrade,
    Query(params): Query<ConnectParams>,
    State(state): State<AppState>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state, params.user_id))
}

async fn handle_socket(socket: WebSocket, state: AppState, user_id: UserId) {
    let connection_id = Uuid::new_v4();
    let conn = UserConnection {
        user_id,
        connection_id,
    };
    let (outbound_tx, mut outbound_rx) = mpsc::channel(state.outbound_buffer);
    state.notifier.register_connection(connection_id, outbound_tx);
    tracing::info!(user_id, %connection_id, "websocket connected");

    let (mut sink, mut stream) = socket.split();
    loop {
        tokio::select! {
            outbound = outbound_rx.recv() => {
                let Some(message) = outbound else { break };
                if send_message(&mut sink, &message).await.is_err() {
                    break;
                }
            }
            inbound = stream.next() => {
                match inbound {
                    Some(Ok(Message::Text(text))) => {
                        let reply = handle_frame(&state.hub, conn, &text).await;
                        if let Some(message) = reply {
                            if send_message(&mut sink, &message).await.is_err() {
                                break;
                            }
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => {}
                    Some(Err(error)) => {
                        tracing::debug!(user_id, %connection_id, "websocket error: {error}");
                        break;
                    }
                }
            }
        }
    }

    // Post-handler cleanup runs leave-room semantics for the session.
    state.hub.handle_disconnect(conn).await;
    state.notifier.unregister_connection(connection_id);
    tracing::info!(user_id, %connection_id, "websocket disconnected");
}

async fn handle_frame(
    hub: &MultiplayerHub,
    conn: UserConnection,
    text: &str,
) -> Option<ServerMessage> {
    let request = match serde_json::from_str::<ClientRequest>(text) {
        Ok(request) => request,
        Err(error) => {
            return Some(ServerMessage::Error {
                message: format!("malformed request: {error}"),
                error_code: ErrorCode::InvalidOperation,
            });
        }
    };

    match dispatch(hub, conn, request).await {
        Ok(reply) => reply,
        Err(error) => Some(ServerMessage::Error {
            message: error.to_string(),
            error_code: error.code(),
        }),
    }
}

async fn dispatch(
    hub: &MultiplayerHub,
    conn: UserConnection,
    request: ClientRequest,
) -> Result<Option<ServerMessage>, MultiplayerError> {
    match request {
        ClientRequest::JoinRoom { room_id } => hub
            .join_room(conn, room_id)
            .await
            .map(|room| Some(ServerMessage::RoomJoined(Box::new(room)))),
        ClientRequest::LeaveRoom => hub.leave_room(conn).await.map(|()| None),
        ClientRequest::TransferHost { user_id } => {
            hub.transfer_host(conn, user_id).await.map(|()| None)
        }
        ClientRequest::ChangeState { state } => hub.change_state(conn, state).await.map(|()| None),
        ClientRequest::StartMatch => hub.start_match(conn).await.map(|()| None),
        ClientRequest::ChangeSettings { settings } => {
            hub.change_settings(conn, settings).await.map(|()| None)
        }
        ClientRequest::AddPlaylistItem { item } => {
            hub.add_playlist_item(conn, item).await.map(|()| None)
        }
    }
}

async fn send_message<S>(sink: &mut S, message: &ServerMessage) -> Result<(), ()>
where
    S: SinkExt<Message> + Unpin,
{
    let text = match serde_json::to_string(message) {
        Ok(text) => text,
        Err(error) => {
            tracing::error!("failed to serialize outbound message: {error}");
            return Ok(());
        }
    };
    sink.send(Message::Text(text.into())).await.map_err(|_| ())
}
