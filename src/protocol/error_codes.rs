use serde::{Deserialize, Serialize};
use std::fmt;

/// Wire-level error codes for structured error handling.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    InvalidState,
    NotHost,
    NotJoinedRoom,
    InvalidStateChange,
    InvalidOperation,
}

impl ErrorCode {
    /// Returns a human-readable description of this error code.
    #[must_use]
    pub const fn description(&self) -> &'static str {
        match self {
            Self::InvalidState => {
                "A precondition for this operation was violated. The room or user is not in a state that permits it."
            }
            Self::NotHost => {
                "This operation is restricted to the room host."
            }
            Self::NotJoinedRoom => {
                "You are not currently in a room. Join a room before performing this action."
            }
            Self::InvalidStateChange => {
                "The requested user state transition is not permitted from the current state."
            }
            Self::InvalidOperation => {
                "An internal consistency failure occurred while processing your request."
            }
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.description())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn all_error_codes_have_descriptions() {
        let codes = [
            ErrorCode::InvalidState,
            ErrorCode::NotHost,
            ErrorCode::NotJoinedRoom,
            ErrorCode::InvalidStateChange,
            ErrorCode::InvalidOperation,
        ];
        for code in codes {
            assert!(
                code.description().len() > 10,
                "ErrorCode::{code:?} has suspiciously short description"
            );
        }
    }

    #[test]
    fn serialization_is_screaming_snake_case() {
        let json = serde_json::to_string(&ErrorCode::InvalidStateChange).unwrap();
        assert_eq!(json, "\"INVALID_STATE_CHANGE\"");
    }
}
