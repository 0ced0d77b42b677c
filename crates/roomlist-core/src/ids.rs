//! Validated Matrix identifier newtypes.
//!
//! Validation is shallow: a sigil, a non-empty localpart and,
//! where the grammar requires one, a `:server` suffix. Anything stricter is
//! the SDK's business.

use std::{borrow::Borrow, fmt};

use serde::{Deserialize, Serialize};

use crate::error::ClientError;

macro_rules! matrix_id {
    ($(#[$meta:meta])* $name:ident, $sigil:literal, $needs_server:literal, $code:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(try_from = "String", into = "String")]
        pub struct $name(String);

        impl $name {
            /// Sigil that starts every identifier of this kind.
            pub const SIGIL: char = $sigil;

            /// Validate and wrap an identifier.
            pub fn parse(value: impl Into<String>) -> Result<Self, ClientError> {
                let value = value.into();
                if is_valid(&value, $sigil, $needs_server) {
                    Ok(Self(value))
                } else {
                    Err(ClientError::invalid_identifier($code, &value))
                }
            }

            /// Borrow the identifier as a string slice.
            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// Everything after the first `:`, or `""` when absent.
            pub fn server_name(&self) -> &str {
                self.0.split_once(':').map(|(_, server)| server).unwrap_or("")
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl Borrow<str> for $name {
            fn borrow(&self) -> &str {
                &self.0
            }
        }

        impl TryFrom<String> for $name {
            type Error = ClientError;

            fn try_from(value: String) -> Result<Self, Self::Error> {
                Self::parse(value)
            }
        }

        impl TryFrom<&str> for $name {
            type Error = ClientError;

            fn try_from(value: &str) -> Result<Self, Self::Error> {
                Self::parse(value)
            }
        }

        impl From<$name> for String {
            fn from(value: $name) -> Self {
                value.0
            }
        }
    };
}

matrix_id!(
    /// Room identifier, `!opaque:server`.
    RoomId, '!', true, "invalid_room_id"
);
matrix_id!(
    /// Room alias, `#name:server`.
    RoomAlias, '#', true, "invalid_room_alias"
);
matrix_id!(
    /// User identifier, `@localpart:server`.
    UserId, '@', true, "invalid_user_id"
);
matrix_id!(
    /// Event identifier. Room v3+ event IDs carry no server part.
    EventId, '$', false, "invalid_event_id"
);
matrix_id!(
    /// Legacy community identifier, `+name:server`.
    GroupId, '+', true, "invalid_group_id"
);

fn is_valid(value: &str, sigil: char, needs_server: bool) -> bool {
    let Some(rest) = value.strip_prefix(sigil) else {
        return false;
    };
    if rest.is_empty() || rest.chars().any(char::is_whitespace) {
        return false;
    }
    if !needs_server {
        return true;
    }
    matches!(rest.split_once(':'), Some((local, server)) if !local.is_empty() && !server.is_empty())
}
