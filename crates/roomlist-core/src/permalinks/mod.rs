//! Permalink construction, parsing and local-href transforms.

mod candidates;
mod constructor;

pub use candidates::{
    MAX_SERVER_CANDIDATES, RoomPermalinkCreator, RoomStateChange, ServerAclMatcher, is_ip_literal,
};
pub use constructor::{
    ElementConstructor, MATRIX_TO_BASE_URL, MatrixToConstructor, PermalinkConstructor,
    encode_server_candidates, parse_app_route,
};

use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{directory::RoomSource, ids::RoomId};

/// Failure to build or parse a permalink.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PermalinkError {
    #[error("'{0}' does not appear to be a permalink")]
    NotAPermalink(String),
    #[error("unknown entity type in permalink: '{0}'")]
    UnknownEntity(String),
    #[error("permalink is missing parts: '{0}'")]
    MissingParts(String),
    #[error("permalink is not valid percent-encoding: '{0}'")]
    MalformedEncoding(String),
    #[error("invalid app location pattern: {0}")]
    InvalidAppLocation(String),
}

impl PermalinkError {
    /// Stable machine-readable code.
    pub fn code(&self) -> &'static str {
        match self {
            Self::NotAPermalink(_) => "not_a_permalink",
            Self::UnknownEntity(_) => "unknown_entity",
            Self::MissingParts(_) => "missing_parts",
            Self::MalformedEncoding(_) => "malformed_encoding",
            Self::InvalidAppLocation(_) => "invalid_app_location",
        }
    }
}

/// Entity a permalink points at.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PermalinkParts {
    Room {
        room_id_or_alias: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        event_id: Option<String>,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        via_servers: Vec<String>,
    },
    User {
        user_id: String,
    },
    Group {
        group_id: String,
    },
}

impl PermalinkParts {
    /// The user, group or room the link is primarily about.
    pub fn primary_entity(&self) -> &str {
        match self {
            Self::Room {
                room_id_or_alias, ..
            } => room_id_or_alias,
            Self::User { user_id } => user_id,
            Self::Group { group_id } => group_id,
        }
    }

    /// App-local href (`#/room/...`, `#/user/...`, `#/group/...`).
    pub fn to_local_href(&self) -> String {
        match self {
            Self::Room {
                room_id_or_alias,
                event_id,
                via_servers,
            } => {
                let event = event_id
                    .as_deref()
                    .map(|event_id| format!("/{event_id}"))
                    .unwrap_or_default();
                format!(
                    "#/room/{room_id_or_alias}{event}{}",
                    encode_server_candidates(via_servers)
                )
            }
            Self::User { user_id } => format!("#/user/{user_id}"),
            Self::Group { group_id } => format!("#/group/{group_id}"),
        }
    }
}

/// Where permalinks point and where the app itself is served from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermalinkConfig {
    /// Permalink prefix of a hosted web app; `None` or `https://matrix.to`
    /// selects `matrix.to` links.
    #[serde(default)]
    pub permalink_prefix: Option<String>,
    /// Host and path the app is served from, for example `app.example.org/`.
    #[serde(default = "default_app_location")]
    pub app_location: String,
}

fn default_app_location() -> String {
    "localhost/".to_owned()
}

impl Default for PermalinkConfig {
    fn default() -> Self {
        Self {
            permalink_prefix: None,
            app_location: default_app_location(),
        }
    }
}

/// Permalink service bound to one configuration.
pub struct Permalinks {
    config: PermalinkConfig,
    constructor: Box<dyn PermalinkConstructor>,
    app_url_pattern: Regex,
}

impl std::fmt::Debug for Permalinks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Permalinks")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl Permalinks {
    pub fn new(config: PermalinkConfig) -> Result<Self, PermalinkError> {
        let constructor: Box<dyn PermalinkConstructor> = match config.permalink_prefix.as_deref() {
            Some(prefix) if prefix.trim_end_matches('/') != MATRIX_TO_BASE_URL => {
                Box::new(ElementConstructor::new(prefix))
            }
            _ => Box::new(MatrixToConstructor),
        };

        let pattern = format!(
            "^(?:https?://)?(?:{}|(?:www\\.)?(?:riot|vector)\\.im/(?:app|beta|staging|develop)/|(?:app|beta|staging|develop)\\.element\\.io/)(#.*)",
            regex::escape(&config.app_location)
        );
        let app_url_pattern =
            Regex::new(&pattern).map_err(|err| PermalinkError::InvalidAppLocation(err.to_string()))?;

        Ok(Self {
            config,
            constructor,
            app_url_pattern,
        })
    }

    pub fn config(&self) -> &PermalinkConfig {
        &self.config
    }

    /// Constructor selected by the configured prefix.
    pub fn constructor(&self) -> &dyn PermalinkConstructor {
        self.constructor.as_ref()
    }

    fn element_prefix(&self) -> Option<&str> {
        self.config
            .permalink_prefix
            .as_deref()
            .filter(|prefix| prefix.trim_end_matches('/') != MATRIX_TO_BASE_URL)
    }

    pub fn make_generic_permalink(&self, entity_id: &str) -> Result<String, PermalinkError> {
        self.constructor.for_entity(entity_id)
    }

    pub fn make_user_permalink(&self, user_id: &str) -> String {
        self.constructor.for_user(user_id)
    }

    pub fn make_group_permalink(&self, group_id: &str) -> String {
        self.constructor.for_group(group_id)
    }

    /// Room permalink; known rooms get via candidates, aliases never need them.
    pub fn make_room_permalink<S: RoomSource + ?Sized>(
        &self,
        source: &S,
        room_id_or_alias: &str,
    ) -> Result<String, PermalinkError> {
        if room_id_or_alias.is_empty() {
            return Err(PermalinkError::MissingParts(String::new()));
        }
        if !room_id_or_alias.starts_with(RoomId::SIGIL) {
            return Ok(self.constructor.for_room(room_id_or_alias, &[]));
        }

        let room = RoomId::parse(room_id_or_alias)
            .ok()
            .and_then(|room_id| source.room(&room_id));
        Ok(match room {
            Some(room) => RoomPermalinkCreator::load(room).for_room(self),
            None => self.constructor.for_room(room_id_or_alias, &[]),
        })
    }

    /// Whether `host` serves permalinks; `matrix.to` always does.
    pub fn is_permalink_host(&self, host: &str) -> bool {
        MatrixToConstructor.is_permalink_host(host) || self.constructor.is_permalink_host(host)
    }

    pub fn parse_permalink(&self, full_url: &str) -> Result<PermalinkParts, PermalinkError> {
        let decoded = urlencoding::decode(full_url)
            .map_err(|_| PermalinkError::MalformedEncoding(full_url.to_owned()))?;
        if decoded.starts_with(MATRIX_TO_BASE_URL) {
            return MatrixToConstructor.parse_permalink(&decoded);
        }
        if let Some(prefix) = self.element_prefix()
            && full_url.starts_with(prefix)
        {
            return ElementConstructor::new(prefix).parse_permalink(full_url);
        }
        Err(PermalinkError::NotAPermalink(full_url.to_owned()))
    }

    /// Parse an app-local link such as `#/room/!id:server`.
    pub fn parse_app_local_link(&self, local_link: &str) -> Option<PermalinkParts> {
        let route = local_link.replacen("#/", "", 1);
        parse_app_route(&route).ok()
    }

    /// Turn a bare entity or a permalink into the best link for it.
    pub fn try_transform_entity_to_permalink<S: RoomSource + ?Sized>(
        &self,
        source: &S,
        entity: &str,
    ) -> Option<String> {
        match entity.chars().next()? {
            '#' | '!' => self.make_room_permalink(source, entity).ok(),
            '@' => Some(self.make_user_permalink(entity)),
            '+' => Some(self.make_group_permalink(entity)),
            _ => Some(self.try_transform_permalink_to_local_href(entity)),
        }
    }

    /// Rewrite an app or permalink URL to an app-local href; anything else is
    /// returned unchanged.
    pub fn try_transform_permalink_to_local_href(&self, permalink: &str) -> String {
        if !permalink.starts_with("http:") && !permalink.starts_with("https:") {
            return permalink.to_owned();
        }

        let Ok(decoded) = urlencoding::decode(permalink) else {
            return permalink.to_owned();
        };
        if let Some(captures) = self.app_url_pattern.captures(&decoded)
            && let Some(local) = captures.get(1)
        {
            return local.as_str().to_owned();
        }

        match self.parse_permalink(permalink) {
            Ok(parts) => parts.to_local_href(),
            Err(_) => permalink.to_owned(),
        }
    }

    /// User, group or room a permalink or app URL primarily refers to.
    pub fn get_primary_permalink_entity(&self, permalink: &str) -> Option<String> {
        if let Ok(parts) = self.parse_permalink(permalink) {
            return Some(parts.primary_entity().to_owned());
        }

        let captures = self.app_url_pattern.captures(permalink)?;
        let fragment = captures.get(1)?.as_str();
        let route = fragment.strip_prefix("#/")?;
        parse_app_route(route)
            .ok()
            .map(|parts| parts.primary_entity().to_owned())
    }

    /// Via candidates for a known room.
    pub fn calculate_room_via<S: RoomSource + ?Sized>(
        &self,
        source: &S,
        room_id: &RoomId,
    ) -> Vec<String> {
        source
            .room(room_id)
            .map(|room| RoomPermalinkCreator::load(room).server_candidates().to_vec())
            .unwrap_or_default()
    }
}
