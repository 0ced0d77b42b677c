use std::collections::BTreeMap;

use serde::{
    Deserialize, Deserializer, Serialize, Serializer, de,
    ser::SerializeMap,
};

use crate::{
    ids::{EventId, RoomAlias, RoomId, UserId},
    room_list::RoomListSnapshot,
    timeline::RoomTimeline,
};

/// Own membership state in a room, as reported by the SDK.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Membership {
    /// Invited but not yet joined.
    Invite,
    /// Joined.
    Join,
    /// Left the room (or was kicked, see [`Room::kicked`]).
    Leave,
    /// Banned from the room.
    Ban,
    /// Knocking on the room.
    Knock,
}

/// Metadata attached to a room tag (`m.tag` account data).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Default)]
pub struct TagMeta {
    /// Manual ordering key in `[0, 1]`; `None` sorts after every ordered entry.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order: Option<f64>,
}

impl TagMeta {
    /// Tag metadata carrying a manual ordering key.
    pub fn ordered(order: f64) -> Self {
        Self { order: Some(order) }
    }
}

/// One event of a room's live timeline, reduced to what the room list needs.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RoomEvent {
    /// Event ID when known (local echoes have none yet).
    #[serde(default)]
    pub event_id: Option<EventId>,
    /// Sender user ID.
    pub sender: UserId,
    /// Event type, for example `m.room.message`.
    #[serde(rename = "type")]
    pub event_type: String,
    /// Origin server timestamp in milliseconds; `0` when unknown.
    #[serde(default)]
    pub timestamp_ms: u64,
    /// Whether the event has been redacted.
    #[serde(default)]
    pub redacted: bool,
}

impl RoomEvent {
    /// Build a message event.
    pub fn message(event_id: Option<EventId>, sender: UserId, timestamp_ms: u64) -> Self {
        Self {
            event_id,
            sender,
            event_type: "m.room.message".to_owned(),
            timestamp_ms,
            redacted: false,
        }
    }
}

/// Membership of another user in a room.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RoomMember {
    /// Member user ID.
    pub user_id: UserId,
    /// Member's current membership.
    pub membership: Membership,
}

/// `m.room.server_acl` content.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct ServerAcl {
    /// Allowed server globs. An ACL event with an empty allow list denies everyone.
    #[serde(default)]
    pub allow: Vec<String>,
    /// Denied server globs.
    #[serde(default)]
    pub deny: Vec<String>,
}

/// SDK-owned room snapshot consumed by the room list and permalink code.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Room {
    /// Matrix room ID.
    pub room_id: RoomId,
    /// Best-effort display name.
    #[serde(default)]
    pub name: String,
    /// Canonical alias, when the room publishes one.
    #[serde(default)]
    pub canonical_alias: Option<RoomAlias>,
    /// Own membership.
    pub membership: Membership,
    /// Whether the own user was kicked (membership is then `leave`).
    #[serde(default)]
    pub kicked: bool,
    /// Room tags keyed by tag name.
    #[serde(default)]
    pub tags: BTreeMap<String, TagMeta>,
    /// Unread notification count reported by sync.
    #[serde(default)]
    pub notification_count: u64,
    /// Highlight/mention count reported by sync.
    #[serde(default)]
    pub highlight_count: u64,
    /// Live timeline.
    #[serde(default)]
    pub timeline: RoomTimeline,
    /// Event the own user's read receipt points at.
    #[serde(default)]
    pub read_up_to: Option<EventId>,
    /// Known room members.
    #[serde(default)]
    pub members: Vec<RoomMember>,
    /// `m.room.power_levels` user levels.
    #[serde(default)]
    pub power_levels: BTreeMap<UserId, i64>,
    /// Current `m.room.server_acl`, if any.
    #[serde(default)]
    pub server_acl: Option<ServerAcl>,
}

impl Room {
    /// Create an untagged room with empty counters and timeline.
    pub fn new(room_id: RoomId, name: impl Into<String>, membership: Membership) -> Self {
        Self {
            room_id,
            name: name.into(),
            canonical_alias: None,
            membership,
            kicked: false,
            tags: BTreeMap::new(),
            notification_count: 0,
            highlight_count: 0,
            timeline: RoomTimeline::default(),
            read_up_to: None,
            members: Vec::new(),
            power_levels: BTreeMap::new(),
            server_acl: None,
        }
    }

    /// Add or replace a tag.
    pub fn with_tag(mut self, tag: impl Into<String>, meta: TagMeta) -> Self {
        self.tags.insert(tag.into(), meta);
        self
    }

    /// Set notification and highlight counts.
    pub fn with_counts(mut self, notifications: u64, highlights: u64) -> Self {
        self.notification_count = notifications;
        self.highlight_count = highlights;
        self
    }

    /// Name shown in lists; falls back to the room ID.
    pub fn display_name(&self) -> &str {
        if self.name.is_empty() {
            self.room_id.as_str()
        } else {
            &self.name
        }
    }

    /// Look up a member by user ID.
    pub fn member(&self, user_id: &UserId) -> Option<&RoomMember> {
        self.members.iter().find(|member| &member.user_id == user_id)
    }

    /// Iterate members whose membership is `join`.
    pub fn joined_members(&self) -> impl Iterator<Item = &RoomMember> {
        self.members
            .iter()
            .filter(|member| member.membership == Membership::Join)
    }

    /// Insert or update a member's membership, returning the previous one.
    pub fn set_member_membership(
        &mut self,
        user_id: UserId,
        membership: Membership,
    ) -> Option<Membership> {
        match self.members.iter_mut().find(|m| m.user_id == user_id) {
            Some(member) => Some(std::mem::replace(&mut member.membership, membership)),
            None => {
                self.members.push(RoomMember {
                    user_id,
                    membership,
                });
                None
            }
        }
    }
}

/// SDK sync lifecycle states.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SyncState {
    /// Initial sync finished; rooms are available.
    Prepared,
    /// Incremental sync is running.
    Syncing,
    /// Catching up after a reconnect.
    Catchup,
    /// Sync is retrying after a failure.
    Reconnecting,
    /// Sync failed.
    Error,
    /// Sync was stopped.
    Stopped,
}

/// Room-list settings the store reacts to.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Setting {
    /// Order rooms by importance (categories) instead of recency only.
    OrderByImportance,
    /// Show custom (non-`m.`) tags as their own lists.
    CustomTags,
}

/// A single read receipt.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Receipt {
    /// Receipt owner.
    pub user_id: UserId,
    /// Event the receipt points at.
    pub event_id: EventId,
    /// Receipt type; only `m.read` moves the read marker.
    #[serde(default = "default_receipt_type")]
    pub receipt_type: String,
}

fn default_receipt_type() -> String {
    "m.read".to_owned()
}

/// Typed dispatcher payload.
///
/// SDK notifications carry the data the SDK already applied on its side so the
/// runtime can mirror it into its room directory before the store reacts.
///
/// On the wire the variant is selected by the `action` field. Effects are the
/// one namespaced family: `{"action":"effects.confetti"}` is
/// [`Action::Effect`] with name `confetti`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(remote = "Self", tag = "action", rename_all = "snake_case")]
pub enum Action {
    /// Sync lifecycle transition.
    Sync {
        /// Previous sync state, if any.
        prev_state: Option<SyncState>,
        /// New sync state.
        state: SyncState,
    },
    /// A room-list setting changed.
    SettingUpdated {
        /// Which setting.
        setting: Setting,
        /// New value.
        value: bool,
    },
    /// Read receipts arrived for a room.
    RoomReceipt {
        /// Target room.
        room_id: RoomId,
        /// Receipts carried by the event.
        receipts: Vec<Receipt>,
    },
    /// A room's tags changed.
    RoomTags {
        /// Target room.
        room_id: RoomId,
        /// Complete new tag set.
        tags: BTreeMap<String, TagMeta>,
    },
    /// A timeline event was added to a room.
    RoomTimeline {
        /// Target room.
        room_id: RoomId,
        /// The event.
        event: RoomEvent,
        /// Whether the event arrived live (not by back-pagination).
        is_live: bool,
        /// Whether the event landed on the unfiltered live timeline.
        is_live_unfiltered: bool,
        /// Counters reported by the same sync response.
        #[serde(default)]
        notification_count: Option<u64>,
        /// Highlight counter reported by the same sync response.
        #[serde(default)]
        highlight_count: Option<u64>,
    },
    /// An event in a room was redacted.
    RoomRedaction {
        /// Target room.
        room_id: RoomId,
        /// The redacted event.
        redacts: EventId,
    },
    /// A limited sync left a gap; the room's local timeline was dropped.
    RoomTimelineReset {
        /// Target room.
        room_id: RoomId,
    },
    /// An event finished decrypting.
    EventDecrypted {
        /// Room of the event; to-device events have none.
        room_id: Option<RoomId>,
        /// The decrypted event.
        event: RoomEvent,
        /// Whether the event sits on the room's live timeline.
        in_live_timeline: bool,
    },
    /// Global account data changed.
    AccountData {
        /// Account data event type, for example `m.direct`.
        event_type: String,
        /// Raw content.
        content: serde_json::Value,
    },
    /// Own membership in a room changed.
    MyMembership {
        /// Target room.
        room_id: RoomId,
        /// New membership.
        membership: Membership,
        /// Whether the change was a kick.
        #[serde(default)]
        kicked: bool,
    },
    /// A room became known to the client (created, invited, joined).
    Room {
        /// The room snapshot.
        room: Box<Room>,
    },
    /// The user logged out.
    #[serde(rename = "on_logged_out")]
    LoggedOut,
    /// The user opened a room.
    ViewRoom {
        /// Opened room.
        room_id: RoomId,
    },
    /// The composer started (or stopped, with `None`) replying to an event.
    ReplyToEvent {
        /// Room whose composer changed.
        room_id: RoomId,
        /// Event being replied to.
        event_id: Option<EventId>,
    },
    /// A chat effect (confetti, snow...) should play.
    #[serde(rename = "effects")]
    Effect {
        /// Effect name, the suffix of the `effects.<name>` wire action.
        name: String,
    },
    /// A user-triggered SDK call failed.
    SdkRequestFailed {
        /// Operation that failed, for example `join_room`.
        operation: String,
        /// HTTP status when the failure came from the homeserver.
        #[serde(default)]
        status: Option<u16>,
        /// Error message reported by the SDK.
        message: String,
    },
}

impl Action {
    /// Wire name of the action, as used in logs.
    pub fn name(&self) -> String {
        let name = match self {
            Self::Sync { .. } => "sync",
            Self::SettingUpdated { .. } => "setting_updated",
            Self::RoomReceipt { .. } => "room_receipt",
            Self::RoomTags { .. } => "room_tags",
            Self::RoomTimeline { .. } => "room_timeline",
            Self::RoomRedaction { .. } => "room_redaction",
            Self::RoomTimelineReset { .. } => "room_timeline_reset",
            Self::EventDecrypted { .. } => "event_decrypted",
            Self::AccountData { .. } => "account_data",
            Self::MyMembership { .. } => "my_membership",
            Self::Room { .. } => "room",
            Self::LoggedOut => "on_logged_out",
            Self::ViewRoom { .. } => "view_room",
            Self::ReplyToEvent { .. } => "reply_to_event",
            Self::Effect { name } => return format!("effects.{name}"),
            Self::SdkRequestFailed { .. } => "sdk_request_failed",
        };
        name.to_owned()
    }

    /// Room the action targets, when it targets exactly one.
    pub fn room_id(&self) -> Option<&RoomId> {
        match self {
            Self::RoomReceipt { room_id, .. }
            | Self::RoomTags { room_id, .. }
            | Self::RoomTimeline { room_id, .. }
            | Self::RoomRedaction { room_id, .. }
            | Self::RoomTimelineReset { room_id }
            | Self::MyMembership { room_id, .. }
            | Self::ViewRoom { room_id }
            | Self::ReplyToEvent { room_id, .. } => Some(room_id),
            Self::EventDecrypted { room_id, .. } => room_id.as_ref(),
            Self::Room { room } => Some(&room.room_id),
            _ => None,
        }
    }
}

const EFFECT_PREFIX: &str = "effects.";

impl Serialize for Action {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self {
            Self::Effect { name } => {
                let mut map = serializer.serialize_map(Some(1))?;
                map.serialize_entry("action", &format!("{EFFECT_PREFIX}{name}"))?;
                map.end()
            }
            other => Action::serialize(other, serializer),
        }
    }
}

impl<'de> Deserialize<'de> for Action {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let mut value = serde_json::Value::deserialize(deserializer)?;
        if let Some(object) = value.as_object_mut()
            && let Some(name) = object
                .get("action")
                .and_then(serde_json::Value::as_str)
                .and_then(|action| action.strip_prefix(EFFECT_PREFIX))
                .map(str::to_owned)
        {
            if name.is_empty() {
                return Err(de::Error::custom("effect action without a name"));
            }
            object.insert("action".into(), "effects".into());
            object.insert("name".into(), name.into());
        }
        Action::deserialize(value).map_err(de::Error::custom)
    }
}

/// Events fanned out to subscribers.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ClientEvent {
    /// The room lists changed.
    RoomListsUpdated {
        /// Full replacement snapshot.
        snapshot: RoomListSnapshot,
    },
    /// A composer's reply target changed.
    ReplyChanged {
        /// Room whose composer changed.
        room_id: RoomId,
        /// Event being replied to.
        event_id: Option<EventId>,
    },
    /// A chat effect should play.
    Effect {
        /// Effect name.
        name: String,
    },
    /// A failure that should be shown to the user as a modal dialog.
    ErrorDialog {
        /// Dialog title.
        title: String,
        /// Human-readable description.
        message: String,
        /// Stable error code.
        code: String,
    },
}
