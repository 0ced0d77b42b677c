use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::lifecycle::StoreLifecycle;

/// Broad error category used to pick the user-facing dialog for a failure.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum ClientErrorCategory {
    /// Invalid input, unknown room, or other request issue.
    Config,
    /// Authentication/authorization failure.
    Auth,
    /// Transient network or transport failure.
    Network,
    /// Rate-limited by homeserver.
    RateLimited,
    /// Local UI-state persistence failure.
    Storage,
    /// Serialization/deserialization failure.
    Serialization,
    /// Internal bug or invariant break.
    Internal,
}

/// Stable client error payload carried across the action/event boundary.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Error)]
#[error("{category:?}:{code}: {message}")]
pub struct ClientError {
    /// High-level error category.
    pub category: ClientErrorCategory,
    /// Stable machine-readable error code.
    pub code: String,
    /// Human-readable message.
    pub message: String,
}

impl ClientError {
    /// Construct a new client error.
    pub fn new(
        category: ClientErrorCategory,
        code: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            category,
            code: code.into(),
            message: message.into(),
        }
    }

    /// Build a standard error for an action the store cannot run right now.
    pub fn invalid_state(current: StoreLifecycle, action: impl Into<String>) -> Self {
        let action = action.into();
        Self::new(
            ClientErrorCategory::Internal,
            "invalid_state_transition",
            format!("cannot run '{action}' while room list store is {current:?}"),
        )
    }

    /// Build the error returned for a malformed Matrix identifier.
    pub fn invalid_identifier(code: &'static str, value: &str) -> Self {
        Self::new(
            ClientErrorCategory::Config,
            code,
            format!("'{value}' is not a valid identifier"),
        )
    }

    /// Build the error returned when an action names a room the client does not know.
    pub fn room_not_found(room_id: impl std::fmt::Display) -> Self {
        Self::new(
            ClientErrorCategory::Config,
            "room_not_found",
            format!("room not found: {room_id}"),
        )
    }
}

/// Map HTTP status codes reported by the SDK to client error categories.
pub fn classify_http_status(status: u16) -> ClientErrorCategory {
    match status {
        401 | 403 => ClientErrorCategory::Auth,
        408 | 429 => ClientErrorCategory::RateLimited,
        400..=499 => ClientErrorCategory::Config,
        500..=599 => ClientErrorCategory::Network,
        _ => ClientErrorCategory::Internal,
    }
}
