//! Read access to SDK room state, plus an in-memory directory the runtime
//! keeps in sync from dispatched actions.

use std::collections::{BTreeMap, HashMap};

use serde_json::Value;
use tracing::debug;

use crate::{
    ids::{RoomId, UserId},
    timeline::TimelineOp,
    types::{Action, Membership, Room},
};

/// View of the rooms the SDK knows about.
pub trait RoomSource {
    /// Logged-in user.
    fn own_user_id(&self) -> &UserId;

    /// Look up a room.
    fn room(&self, room_id: &RoomId) -> Option<&Room>;

    /// All known rooms, in a stable order.
    fn rooms(&self) -> Vec<&Room>;

    /// DM partner for a room, when `m.direct` lists it.
    fn dm_partner(&self, room_id: &RoomId) -> Option<&UserId>;
}

/// Reverse index of `m.direct` account data.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DmRoomMap {
    user_by_room: HashMap<RoomId, UserId>,
}

impl DmRoomMap {
    /// Build from `m.direct` content (`{ user_id: [room_id, ...] }`).
    ///
    /// Entries with malformed IDs are skipped.
    pub fn from_content(content: &Value) -> Self {
        let mut user_by_room = HashMap::new();
        let Some(object) = content.as_object() else {
            return Self::default();
        };

        for (user, rooms) in object {
            let Ok(user_id) = UserId::parse(user.as_str()) else {
                debug!(user = %user, "skipping malformed m.direct user id");
                continue;
            };
            let Some(rooms) = rooms.as_array() else {
                continue;
            };
            for room in rooms.iter().filter_map(Value::as_str) {
                if let Ok(room_id) = RoomId::parse(room) {
                    user_by_room.insert(room_id, user_id.clone());
                }
            }
        }

        Self { user_by_room }
    }

    pub fn user_for_room(&self, room_id: &RoomId) -> Option<&UserId> {
        self.user_by_room.get(room_id)
    }

    pub fn len(&self) -> usize {
        self.user_by_room.len()
    }

    pub fn is_empty(&self) -> bool {
        self.user_by_room.is_empty()
    }
}

/// In-memory mirror of SDK room state.
#[derive(Debug, Clone)]
pub struct RoomDirectory {
    own_user_id: UserId,
    rooms: BTreeMap<RoomId, Room>,
    direct: DmRoomMap,
    max_timeline_events: Option<usize>,
}

impl RoomDirectory {
    pub fn new(own_user_id: UserId) -> Self {
        Self {
            own_user_id,
            rooms: BTreeMap::new(),
            direct: DmRoomMap::default(),
            max_timeline_events: None,
        }
    }

    /// Cap every room timeline, current and future.
    pub fn with_max_timeline_events(mut self, max_events: usize) -> Self {
        self.max_timeline_events = Some(max_events);
        for room in self.rooms.values_mut() {
            room.timeline.set_max_events(max_events);
        }
        self
    }

    /// Insert or replace a room.
    pub fn upsert_room(&mut self, mut room: Room) {
        if let Some(max) = self.max_timeline_events {
            room.timeline.set_max_events(max);
        }
        self.rooms.insert(room.room_id.clone(), room);
    }

    pub fn remove_room(&mut self, room_id: &RoomId) -> Option<Room> {
        self.rooms.remove(room_id)
    }

    pub fn room_mut(&mut self, room_id: &RoomId) -> Option<&mut Room> {
        self.rooms.get_mut(room_id)
    }

    pub fn set_direct(&mut self, direct: DmRoomMap) {
        self.direct = direct;
    }

    pub fn direct(&self) -> &DmRoomMap {
        &self.direct
    }

    pub fn len(&self) -> usize {
        self.rooms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rooms.is_empty()
    }

    /// Mirror the SDK-side effect of an action into the directory.
    ///
    /// Returns `false` when nothing was mirrored. Actions naming a room the
    /// directory does not know are dropped.
    pub fn apply(&mut self, action: &Action) -> bool {
        match action {
            Action::Room { room } => {
                self.upsert_room(room.as_ref().clone());
            }
            Action::RoomTags { room_id, tags } => {
                let Some(room) = self.known_room_mut(room_id) else {
                    return false;
                };
                room.tags = tags.clone();
            }
            Action::RoomTimeline {
                room_id,
                event,
                is_live,
                notification_count,
                highlight_count,
                ..
            } => {
                let Some(room) = self.known_room_mut(room_id) else {
                    return false;
                };
                if *is_live {
                    room.timeline.push(event.clone());
                }
                if let Some(count) = notification_count {
                    room.notification_count = *count;
                }
                if let Some(count) = highlight_count {
                    room.highlight_count = *count;
                }
            }
            Action::EventDecrypted {
                room_id: Some(room_id),
                event,
                ..
            } => {
                let Some(event_id) = event.event_id.clone() else {
                    return false;
                };
                let op = TimelineOp::Replace {
                    event_id,
                    event: event.clone(),
                };
                return self.apply_timeline_op(room_id, op);
            }
            Action::RoomRedaction { room_id, redacts } => {
                let op = TimelineOp::Redact {
                    event_id: redacts.clone(),
                };
                return self.apply_timeline_op(room_id, op);
            }
            Action::RoomTimelineReset { room_id } => {
                return self.apply_timeline_op(room_id, TimelineOp::Clear);
            }
            Action::RoomReceipt { room_id, receipts } => {
                let own = self.own_user_id.clone();
                let Some(room) = self.known_room_mut(room_id) else {
                    return false;
                };
                let Some(receipt) = receipts
                    .iter()
                    .rev()
                    .find(|r| r.user_id == own && r.receipt_type == "m.read")
                else {
                    return false;
                };
                room.read_up_to = Some(receipt.event_id.clone());
                room.notification_count = 0;
                room.highlight_count = 0;
            }
            Action::MyMembership {
                room_id,
                membership,
                kicked,
            } => {
                let own = self.own_user_id.clone();
                let Some(room) = self.known_room_mut(room_id) else {
                    return false;
                };
                room.membership = *membership;
                room.kicked = *kicked && *membership == Membership::Leave;
                room.set_member_membership(own, *membership);
            }
            Action::AccountData {
                event_type,
                content,
            } if event_type == "m.direct" => {
                self.direct = DmRoomMap::from_content(content);
            }
            Action::LoggedOut => {
                self.rooms.clear();
                self.direct = DmRoomMap::default();
            }
            _ => return false,
        }
        true
    }

    fn apply_timeline_op(&mut self, room_id: &RoomId, op: TimelineOp) -> bool {
        let Some(room) = self.known_room_mut(room_id) else {
            return false;
        };
        match room.timeline.apply_ops(std::slice::from_ref(&op)) {
            Ok(()) => true,
            Err(err) => {
                debug!(room_id = %room_id, error = %err, "timeline update skipped");
                false
            }
        }
    }

    fn known_room_mut(&mut self, room_id: &RoomId) -> Option<&mut Room> {
        let room = self.rooms.get_mut(room_id);
        if room.is_none() {
            debug!(room_id = %room_id, "dropping update for unknown room");
        }
        room
    }
}

impl RoomSource for RoomDirectory {
    fn own_user_id(&self) -> &UserId {
        &self.own_user_id
    }

    fn room(&self, room_id: &RoomId) -> Option<&Room> {
        self.rooms.get(room_id)
    }

    fn rooms(&self) -> Vec<&Room> {
        self.rooms.values().collect()
    }

    fn dm_partner(&self, room_id: &RoomId) -> Option<&UserId> {
        self.direct.user_for_room(room_id)
    }
}
