use crate::protocol::{ErrorCode, MultiplayerUserState};

/// Errors surfaced to clients by the room hub.
///
/// Validation failures are raised before any mutation; failures after a
/// partially committed database write roll back in-memory state first.
#[derive(Debug, thiserror::Error)]
pub enum MultiplayerError {
    /// A precondition was violated (restricted user, already in a room,
    /// settings change during play, modified beatmap, ...).
    #[error("{0}")]
    InvalidState(String),

    /// The operation is restricted to the room host.
    #[error("this operation is restricted to the room host")]
    NotHost,

    /// The caller has no active room session.
    #[error("not currently joined to a room")]
    NotJoinedRoom,

    /// The requested per-user transition is not in the allowed table.
    #[error("cannot change user state from {from:?} to {to:?}")]
    InvalidStateChange {
        from: MultiplayerUserState,
        to: MultiplayerUserState,
    },

    /// Internal consistency failure, including database collaborator errors.
    #[error("{0}")]
    InvalidOperation(String),
}

impl MultiplayerError {
    #[must_use]
    pub fn invalid_state(message: impl Into<String>) -> Self {
        Self::InvalidState(message.into())
    }

    #[must_use]
    pub fn invalid_operation(message: impl Into<String>) -> Self {
        Self::InvalidOperation(message.into())
    }

    /// The wire-level code for this error.
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::InvalidState(_) => ErrorCode::InvalidState,
            Self::NotHost => ErrorCode::NotHost,
            Self::NotJoinedRoom => ErrorCode::NotJoinedRoom,
            Self::InvalidStateChange { .. } => ErrorCode::InvalidStateChange,
            Self::InvalidOperation(_) => ErrorCode::InvalidOperation,
        }
    }
}

// Database collaborator failures surface as internal consistency errors.
impl From<anyhow::Error> for MultiplayerError {
    fn from(error: anyhow::Error) -> Self {
        Self::InvalidOperation(format!("{error:#}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn each_variant_maps_to_a_distinct_code() {
        let errors = [
            MultiplayerError::invalid_state("x"),
            MultiplayerError::NotHost,
            MultiplayerError::NotJoinedRoom,
            MultiplayerError::InvalidStateChange {
                from: MultiplayerUserState::Idle,
                to: MultiplayerUserState::Playing,
            },
            MultiplayerError::invalid_operation("x"),
        ];
        let codes: Vec<ErrorCode> = errors.iter().map(MultiplayerError::code).collect();
        for (index, code) in codes.iter().enumerate() {
            for other in &codes[index + 1..] {
                assert_ne!(code, other);
            }
        }
    }

    #[test]
    fn state_change_error_names_both_states() {
        let error = MultiplayerError::InvalidStateChange {
            from: MultiplayerUserState::Idle,
            to: MultiplayerUserState::Playing,
        };
        let rendered = error.to_string();
        assert!(rendered.contains("Idle"));
        assert!(rendered.contains("Playing"));
    }
}
