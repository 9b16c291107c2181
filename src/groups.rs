//! Named broadcast groups.
//!
//! Every room exposes a control group and a gameplay group, derived
//! deterministically from the room id. The group abstraction itself belongs
//! to the transport; the hub depends only on the narrow [`GroupNotifier`]
//! seam and never assumes in-process delivery.

use anyhow::Result;
use async_trait::async_trait;
use dashmap::DashMap;
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::mpsc;

use crate::protocol::{ConnectionId, RoomId, ServerMessage};

/// Canonical group name for a room: `room:<id>:<gameplay>`.
#[must_use]
pub fn room_group(room_id: RoomId, gameplay: bool) -> String {
    format!("room:{room_id}:{gameplay}")
}

/// Group fan-out operations supplied by the transport.
#[async_trait]
pub trait GroupNotifier: Send + Sync {
    /// Publish a message to every connection in the group.
    async fn send_to_group(&self, group: &str, message: Arc<ServerMessage>) -> Result<()>;

    /// Add a connection to a named group.
    async fn add_to_group(&self, connection_id: ConnectionId, group: &str) -> Result<()>;

    /// Remove a connection from a named group. Removing a non-member is a
    /// no-op.
    async fn remove_from_group(&self, connection_id: ConnectionId, group: &str) -> Result<()>;
}

/// In-process notifier delivering over per-connection channels.
///
/// Messages are Arc-wrapped so a group send clones pointers, not payloads.
/// Send failures (full or closed channels) are logged and swallowed; the
/// authoritative state has already advanced by the time fan-out happens.
#[derive(Default)]
pub struct InMemoryGroupNotifier {
    groups: DashMap<String, HashSet<ConnectionId>>,
    connections: DashMap<ConnectionId, mpsc::Sender<Arc<ServerMessage>>>,
}

impl InMemoryGroupNotifier {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a connection's outbound channel.
    pub fn register_connection(
        &self,
        connection_id: ConnectionId,
        sender: mpsc::Sender<Arc<ServerMessage>>,
    ) {
        self.connections.insert(connection_id, sender);
    }

    /// Drop a connection's channel and purge it from every group.
    pub fn unregister_connection(&self, connection_id: ConnectionId) {
        self.connections.remove(&connection_id);
        for mut group in self.groups.iter_mut() {
            group.value_mut().remove(&connection_id);
        }
    }

    /// Whether the connection is currently a member of the group.
    #[must_use]
    pub fn is_member(&self, connection_id: ConnectionId, group: &str) -> bool {
        self.groups
            .get(group)
            .is_some_and(|members| members.contains(&connection_id))
    }
}

#[async_trait]
impl GroupNotifier for InMemoryGroupNotifier {
    async fn send_to_group(&self, group: &str, message: Arc<ServerMessage>) -> Result<()> {
        let members: Vec<ConnectionId> = match self.groups.get(group) {
            Some(members) => members.iter().copied().collect(),
            None => return Ok(()),
        };

        for connection_id in members {
            let Some(sender) = self
                .connections
                .get(&connection_id)
                .map(|entry| entry.value().clone())
            else {
                continue;
            };
            if let Err(error) = sender.try_send(Arc::clone(&message)) {
                tracing::debug!(%connection_id, group, "dropping group message: {error}");
            }
        }
        Ok(())
    }

    async fn add_to_group(&self, connection_id: ConnectionId, group: &str) -> Result<()> {
        self.groups
            .entry(group.to_string())
            .or_default()
            .insert(connection_id);
        Ok(())
    }

    async fn remove_from_group(&self, connection_id: ConnectionId, group: &str) -> Result<()> {
        if let Some(mut members) = self.groups.get_mut(group) {
            members.remove(&connection_id);
        }
        Ok(())
    }
}
