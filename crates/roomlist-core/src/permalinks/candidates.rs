//! Via-server selection for room permalinks.
//!
//! Up to three servers are picked: the server of the highest-powered joined
//! user (power level 50 or more), then the most populous servers among joined
//! members. IP literals and servers excluded by the room's server ACL are
//! never picked.

use std::collections::BTreeMap;

use regex::Regex;
use tracing::{trace, warn};
use url::{Host, Url};

use crate::{
    ids::{RoomAlias, RoomId, UserId},
    types::{Membership, Room, ServerAcl},
};

use super::Permalinks;

/// Maximum number of `via` servers attached to a permalink.
pub const MAX_SERVER_CANDIDATES: usize = 3;

/// Lowest power level that makes a user's server the first candidate.
const MIN_CANDIDATE_POWER_LEVEL: i64 = 50;

/// Parse a Matrix server name (`host[:port]`) the way a browser would.
fn parse_server_name(server_name: &str) -> Option<Url> {
    if server_name.is_empty() {
        return None;
    }
    Url::parse(&format!("https://{server_name}")).ok()
}

/// Whether a server name is an IPv4 or IPv6 literal.
pub fn is_ip_literal(server_name: &str) -> bool {
    parse_server_name(server_name)
        .is_some_and(|url| matches!(url.host(), Some(Host::Ipv4(_) | Host::Ipv6(_))))
}

/// Translate an ACL glob (`*`, `?`) into an anchored regex.
fn glob_to_regex(glob: &str) -> Option<Regex> {
    let mut pattern = String::with_capacity(glob.len() + 2);
    pattern.push('^');
    for ch in glob.chars() {
        match ch {
            '*' => pattern.push_str(".*"),
            '?' => pattern.push('.'),
            other => pattern.push_str(&regex::escape(&other.to_string())),
        }
    }
    pattern.push('$');

    match Regex::new(&pattern) {
        Ok(regex) => Some(regex),
        Err(err) => {
            warn!(glob, error = %err, "ignoring unusable server ACL glob");
            None
        }
    }
}

/// Compiled `m.room.server_acl` rules.
#[derive(Debug, Clone)]
pub struct ServerAclMatcher {
    allow: Vec<Regex>,
    deny: Vec<Regex>,
}

impl Default for ServerAclMatcher {
    /// No ACL: every server is allowed.
    fn default() -> Self {
        Self {
            allow: glob_to_regex("*").into_iter().collect(),
            deny: Vec::new(),
        }
    }
}

impl ServerAclMatcher {
    pub fn from_acl(acl: Option<&ServerAcl>) -> Self {
        let Some(acl) = acl else {
            return Self::default();
        };
        Self {
            allow: acl.allow.iter().filter_map(|glob| glob_to_regex(glob)).collect(),
            deny: acl.deny.iter().filter_map(|glob| glob_to_regex(glob)).collect(),
        }
    }

    /// Whether a server may be used as a via candidate.
    ///
    /// Server names that do not form a valid host are assumed matched by both
    /// lists, so they end up denied.
    pub fn allows(&self, server_name: &str) -> bool {
        let Some(url) = parse_server_name(server_name) else {
            return false;
        };
        let Some(host) = url.host_str() else {
            return false;
        };
        // IPv6 hosts come back bracketed; globs are written without brackets.
        let host = host.trim_start_matches('[').trim_end_matches(']');

        let denied = self.deny.iter().any(|regex| regex.is_match(host));
        let allowed = self.allow.iter().any(|regex| regex.is_match(host));
        !denied && allowed
    }
}

/// Which piece of room state changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoomStateChange {
    ServerAcl,
    PowerLevels,
}

/// Tracks via candidates for one room and builds its permalinks.
#[derive(Debug, Clone)]
pub struct RoomPermalinkCreator {
    room_id: RoomId,
    canonical_alias: Option<RoomAlias>,
    acl: ServerAclMatcher,
    highest_pl_user_id: Option<UserId>,
    population: BTreeMap<String, usize>,
    server_candidates: Vec<String>,
}

impl RoomPermalinkCreator {
    /// Creator for a room the client does not know; it carries no candidates.
    pub fn for_unknown_room(room_id: RoomId) -> Self {
        Self {
            room_id,
            canonical_alias: None,
            acl: ServerAclMatcher::default(),
            highest_pl_user_id: None,
            population: BTreeMap::new(),
            server_candidates: Vec::new(),
        }
    }

    /// Compute candidates from the room's current state.
    pub fn load(room: &Room) -> Self {
        let mut creator = Self::for_unknown_room(room.room_id.clone());
        creator.canonical_alias = room.canonical_alias.clone();
        creator.update_allowed_servers(room);
        creator.update_highest_pl_user(room);
        creator.update_population_map(room);
        creator.update_server_candidates();
        creator
    }

    pub fn room_id(&self) -> &RoomId {
        &self.room_id
    }

    pub fn server_candidates(&self) -> &[String] {
        &self.server_candidates
    }

    pub fn highest_pl_user_id(&self) -> Option<&UserId> {
        self.highest_pl_user_id.as_ref()
    }

    /// A member's membership changed from `old` to `new`.
    ///
    /// `room` is the state after the change.
    pub fn on_membership(
        &mut self,
        room: &Room,
        user_id: &UserId,
        old: Option<Membership>,
        new: Membership,
    ) {
        let server = user_id.server_name().to_owned();
        let was_joined = old == Some(Membership::Join);
        let is_joined = new == Membership::Join;

        if was_joined && !is_joined {
            if let Some(count) = self.population.get_mut(&server) {
                *count = count.saturating_sub(1);
                if *count == 0 {
                    self.population.remove(&server);
                }
            }
        } else if !was_joined && is_joined {
            *self.population.entry(server).or_default() += 1;
        }

        self.update_highest_pl_user(room);
        self.update_server_candidates();
    }

    /// Power levels or server ACL changed.
    pub fn on_state_change(&mut self, room: &Room, change: RoomStateChange) {
        match change {
            RoomStateChange::ServerAcl => {
                self.update_allowed_servers(room);
                self.update_highest_pl_user(room);
                self.update_population_map(room);
            }
            RoomStateChange::PowerLevels => self.update_highest_pl_user(room),
        }
        self.update_server_candidates();
    }

    pub fn for_room(&self, permalinks: &Permalinks) -> String {
        permalinks
            .constructor()
            .for_room(self.room_id.as_str(), &self.server_candidates)
    }

    pub fn for_event(&self, permalinks: &Permalinks, event_id: &str) -> String {
        permalinks
            .constructor()
            .for_event(self.room_id.as_str(), event_id, &self.server_candidates)
    }

    /// Room link preferring the canonical alias, which needs no via servers.
    pub fn for_shareable_room(&self, permalinks: &Permalinks) -> String {
        match &self.canonical_alias {
            Some(alias) => permalinks.constructor().for_room(alias.as_str(), &[]),
            None => self.for_room(permalinks),
        }
    }

    fn server_usable(&self, server: &str) -> bool {
        !is_ip_literal(server) && self.acl.allows(server)
    }

    fn update_allowed_servers(&mut self, room: &Room) {
        self.acl = ServerAclMatcher::from_acl(room.server_acl.as_ref());
    }

    fn update_highest_pl_user(&mut self, room: &Room) {
        let mut best: Option<(&UserId, i64)> = None;
        for (user_id, level) in &room.power_levels {
            let joined = room
                .member(user_id)
                .is_some_and(|member| member.membership == Membership::Join);
            if !joined || !self.server_usable(user_id.server_name()) {
                continue;
            }
            if best.is_none_or(|(_, best_level)| *level > best_level) {
                best = Some((user_id, *level));
            }
        }

        self.highest_pl_user_id = best
            .filter(|(_, level)| *level >= MIN_CANDIDATE_POWER_LEVEL)
            .map(|(user_id, _)| user_id.clone());
    }

    fn update_population_map(&mut self, room: &Room) {
        let mut population = BTreeMap::new();
        for member in room.joined_members() {
            *population
                .entry(member.user_id.server_name().to_owned())
                .or_default() += 1;
        }
        self.population = population;
    }

    fn update_server_candidates(&mut self) {
        let mut candidates = Vec::with_capacity(MAX_SERVER_CANDIDATES);
        if let Some(user_id) = &self.highest_pl_user_id {
            candidates.push(user_id.server_name().to_owned());
        }

        // Stable sort over a name-ordered map: ties resolve alphabetically.
        let mut by_population: Vec<(&String, &usize)> = self.population.iter().collect();
        by_population.sort_by(|a, b| b.1.cmp(a.1));

        for (server, _) in by_population {
            if candidates.len() >= MAX_SERVER_CANDIDATES {
                break;
            }
            if candidates.contains(server) || !self.server_usable(server) {
                continue;
            }
            candidates.push(server.clone());
        }

        trace!(room_id = %self.room_id, ?candidates, "updated permalink server candidates");
        self.server_candidates = candidates;
    }
}
