//! Unread heuristics shared by categorisation and recency ordering.

use crate::{
    ids::UserId,
    types::{Room, RoomEvent},
};

/// Event types that never light up a room.
const NON_NOTIFYING_EVENT_TYPES: &[&str] = &[
    "m.room.member",
    "m.room.third_party_invite",
    "m.call.answer",
    "m.call.hangup",
    "m.room.aliases",
    "m.room.canonical_alias",
    "m.room.server_acl",
];

/// Whether an event should count towards a room's unread state.
pub fn event_triggers_unread_count(event: &RoomEvent, own_user_id: &UserId) -> bool {
    if &event.sender == own_user_id || event.redacted {
        return false;
    }
    !NON_NOTIFYING_EVENT_TYPES.contains(&event.event_type.as_str())
}

/// Whether an event should move a room in a recency-ordered list.
///
/// Own messages count even though they never make a room unread.
pub fn event_triggers_recent_reorder(event: &RoomEvent, own_user_id: &UserId) -> bool {
    event.timestamp_ms != 0
        && (event_triggers_unread_count(event, own_user_id) || &event.sender == own_user_id)
}

/// Whether the room has events after the own read receipt that count as unread.
pub fn room_has_unread_messages(room: &Room, own_user_id: &UserId) -> bool {
    // No receipts are sent for own messages.
    if let Some(newest) = room.timeline.newest()
        && &newest.sender == own_user_id
    {
        return false;
    }

    for event in room.timeline.events().iter().rev() {
        if event.event_id.is_some() && event.event_id == room.read_up_to {
            return false;
        }
        if event_triggers_unread_count(event, own_user_id) {
            return true;
        }
    }

    false
}

/// Timestamp used to order a room in recency lists.
///
/// Newest reorder-triggering event; otherwise the oldest event's timestamp;
/// otherwise `u64::MAX` so timeline-less rooms float to the top.
pub fn newest_reorder_timestamp(room: &Room, own_user_id: &UserId) -> u64 {
    let events = room.timeline.events();
    if let Some(event) = events
        .iter()
        .rev()
        .find(|event| event_triggers_recent_reorder(event, own_user_id))
    {
        return event.timestamp_ms;
    }

    match events.first() {
        Some(oldest) if oldest.timestamp_ms != 0 => oldest.timestamp_ms,
        _ => u64::MAX,
    }
}
