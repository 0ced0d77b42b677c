//! URL shapes for permalinks: the `matrix.to` form and the app's own
//! `<prefix>/#/room/...` form.

use url::Url;

use super::{PermalinkError, PermalinkParts};

/// Base URL of `matrix.to` permalinks.
pub const MATRIX_TO_BASE_URL: &str = "https://matrix.to";

/// Builds and parses one flavour of permalink.
pub trait PermalinkConstructor: Send + Sync {
    fn for_room(&self, room_id_or_alias: &str, via_servers: &[String]) -> String;

    fn for_event(&self, room_id: &str, event_id: &str, via_servers: &[String]) -> String;

    fn for_user(&self, user_id: &str) -> String;

    fn for_group(&self, group_id: &str) -> String;

    /// Dispatch on the entity's sigil.
    fn for_entity(&self, entity_id: &str) -> Result<String, PermalinkError> {
        match entity_id.chars().next() {
            Some('!' | '#') => Ok(self.for_room(entity_id, &[])),
            Some('@') => Ok(self.for_user(entity_id)),
            Some('+') => Ok(self.for_group(entity_id)),
            _ => Err(PermalinkError::UnknownEntity(entity_id.to_owned())),
        }
    }

    /// Whether `host` (with port, if any) serves this kind of permalink.
    fn is_permalink_host(&self, host: &str) -> bool;

    fn parse_permalink(&self, full_url: &str) -> Result<PermalinkParts, PermalinkError>;
}

/// `?via=a&via=b`, or nothing when there are no candidates.
pub fn encode_server_candidates(candidates: &[String]) -> String {
    if candidates.is_empty() {
        return String::new();
    }
    let encoded: Vec<_> = candidates
        .iter()
        .map(|server| urlencoding::encode(server).into_owned())
        .collect();
    format!("?via={}", encoded.join("&via="))
}

/// Split `entity?query` and collect the `via` values of the query.
fn split_via(value: &str) -> Result<(&str, Vec<String>), PermalinkError> {
    let Some((head, query)) = value.split_once('?') else {
        return Ok((value, Vec::new()));
    };

    let mut via = Vec::new();
    for pair in query.split('&') {
        let Some(server) = pair.strip_prefix("via=") else {
            continue;
        };
        if server.is_empty() {
            continue;
        }
        let decoded = urlencoding::decode(server)
            .map_err(|_| PermalinkError::MalformedEncoding(server.to_owned()))?;
        via.push(decoded.into_owned());
    }
    Ok((head, via))
}

/// Build room parts from `entity` and everything after it.
///
/// Room version 3+ event IDs may contain `/`, so the remaining segments are
/// joined back together.
fn room_parts(entity: &str, rest: &[&str]) -> Result<PermalinkParts, PermalinkError> {
    if rest.is_empty() {
        let (room, via_servers) = split_via(entity)?;
        return Ok(PermalinkParts::Room {
            room_id_or_alias: room.to_owned(),
            event_id: None,
            via_servers,
        });
    }

    let joined = rest.join("/");
    let (event_id, via_servers) = split_via(&joined)?;
    Ok(PermalinkParts::Room {
        room_id_or_alias: entity.to_owned(),
        event_id: (!event_id.is_empty()).then(|| event_id.to_owned()),
        via_servers,
    })
}

/// Parse an app route such as `room/!id:server/$event?via=x`.
pub fn parse_app_route(route: &str) -> Result<PermalinkParts, PermalinkError> {
    let parts: Vec<&str> = route.split('/').collect();
    if parts.len() < 2 || parts[1].is_empty() {
        return Err(PermalinkError::MissingParts(route.to_owned()));
    }

    let entity = parts[1];
    match parts[0] {
        "user" => Ok(PermalinkParts::User {
            user_id: entity.to_owned(),
        }),
        "group" => Ok(PermalinkParts::Group {
            group_id: entity.to_owned(),
        }),
        "room" => room_parts(entity, &parts[2..]),
        other => Err(PermalinkError::UnknownEntity(other.to_owned())),
    }
}

/// `https://matrix.to/#/<entity>` permalinks.
#[derive(Debug, Clone, Copy, Default)]
pub struct MatrixToConstructor;

impl PermalinkConstructor for MatrixToConstructor {
    fn for_room(&self, room_id_or_alias: &str, via_servers: &[String]) -> String {
        format!(
            "{MATRIX_TO_BASE_URL}/#/{room_id_or_alias}{}",
            encode_server_candidates(via_servers)
        )
    }

    fn for_event(&self, room_id: &str, event_id: &str, via_servers: &[String]) -> String {
        format!(
            "{MATRIX_TO_BASE_URL}/#/{room_id}/{event_id}{}",
            encode_server_candidates(via_servers)
        )
    }

    fn for_user(&self, user_id: &str) -> String {
        format!("{MATRIX_TO_BASE_URL}/#/{user_id}")
    }

    fn for_group(&self, group_id: &str) -> String {
        format!("{MATRIX_TO_BASE_URL}/#/{group_id}")
    }

    fn is_permalink_host(&self, host: &str) -> bool {
        host == "matrix.to"
    }

    fn parse_permalink(&self, full_url: &str) -> Result<PermalinkParts, PermalinkError> {
        let prefix = format!("{MATRIX_TO_BASE_URL}/#/");
        let Some(rest) = full_url.strip_prefix(&prefix) else {
            return Err(PermalinkError::NotAPermalink(full_url.to_owned()));
        };

        let parts: Vec<&str> = rest.split('/').collect();
        let entity = parts[0];
        match entity.chars().next() {
            None => Err(PermalinkError::MissingParts(full_url.to_owned())),
            Some('@') => Ok(PermalinkParts::User {
                user_id: entity.to_owned(),
            }),
            Some('+') => Ok(PermalinkParts::Group {
                group_id: entity.to_owned(),
            }),
            Some('!' | '#') => room_parts(entity, &parts[1..]),
            Some(_) => Err(PermalinkError::UnknownEntity(entity.to_owned())),
        }
    }
}

/// `<prefix>/#/room/<entity>` permalinks pointing at a hosted web app.
#[derive(Debug, Clone)]
pub struct ElementConstructor {
    prefix: String,
}

impl ElementConstructor {
    pub fn new(prefix: impl Into<String>) -> Self {
        let prefix: String = prefix.into();
        Self {
            prefix: prefix.trim_end_matches('/').to_owned(),
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }
}

impl PermalinkConstructor for ElementConstructor {
    fn for_room(&self, room_id_or_alias: &str, via_servers: &[String]) -> String {
        format!(
            "{}/#/room/{room_id_or_alias}{}",
            self.prefix,
            encode_server_candidates(via_servers)
        )
    }

    fn for_event(&self, room_id: &str, event_id: &str, via_servers: &[String]) -> String {
        format!(
            "{}/#/room/{room_id}/{event_id}{}",
            self.prefix,
            encode_server_candidates(via_servers)
        )
    }

    fn for_user(&self, user_id: &str) -> String {
        format!("{}/#/user/{user_id}", self.prefix)
    }

    fn for_group(&self, group_id: &str) -> String {
        format!("{}/#/group/{group_id}", self.prefix)
    }

    fn is_permalink_host(&self, host: &str) -> bool {
        let Ok(url) = Url::parse(&self.prefix) else {
            return false;
        };
        let Some(prefix_host) = url.host_str() else {
            return false;
        };
        match url.port() {
            Some(port) => host == format!("{prefix_host}:{port}"),
            None => host == prefix_host,
        }
    }

    fn parse_permalink(&self, full_url: &str) -> Result<PermalinkParts, PermalinkError> {
        let prefix = format!("{}/#/", self.prefix);
        let Some(route) = full_url.strip_prefix(&prefix) else {
            return Err(PermalinkError::NotAPermalink(full_url.to_owned()));
        };
        parse_app_route(route)
    }
}
