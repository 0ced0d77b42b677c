//! Client-side room list engine for a Matrix client.
//!
//! This crate holds the room list store and its slotting algorithm, permalink
//! handling, the typed action/event protocol and the dispatcher channels. The
//! protocol SDK is modelled by [`directory::RoomSource`].

/// Room categories and sorting algorithms.
pub mod category;
/// In-memory mirror of SDK room state.
pub mod directory;
/// Action queue and event fan-out.
pub mod dispatcher;
/// Stable client error types and HTTP classification helpers.
pub mod error;
/// Validated Matrix identifiers.
pub mod ids;
/// Store readiness gate.
pub mod lifecycle;
/// Error normalization into user-facing events.
pub mod normalization;
/// Permalink construction and parsing.
pub mod permalinks;
/// The room list store.
pub mod room_list;
/// Single-room slotting into recency lists.
pub mod slotting;
/// List comparators.
pub mod sorting;
/// Well-known and custom tag lists.
pub mod tags;
/// Bounded per-room timelines.
pub mod timeline;
/// Protocol types (actions, events, room snapshots).
pub mod types;
/// Unread heuristics.
pub mod unread;

pub use category::{Category, SortAlgorithm, calculate_category};
pub use directory::{DmRoomMap, RoomDirectory, RoomSource};
pub use dispatcher::{DispatchError, Dispatcher, EventStream};
pub use error::{ClientError, ClientErrorCategory, classify_http_status};
pub use ids::{EventId, GroupId, RoomAlias, RoomId, UserId};
pub use lifecycle::{LifecycleGate, StoreLifecycle};
pub use normalization::{normalize_error_dialog, normalize_sdk_failure};
pub use permalinks::{PermalinkConfig, PermalinkError, PermalinkParts, Permalinks};
pub use room_list::{ListEntry, RoomListSnapshot, RoomListStore, SlotDiagnostics, TagListSnapshot};
pub use tags::{ListOrder, TagId};
pub use timeline::{DEFAULT_MAX_TIMELINE_EVENTS, RoomTimeline, TimelineMergeError, TimelineOp};
pub use types::{
    Action, ClientEvent, Membership, Receipt, Room, RoomEvent, RoomMember, ServerAcl, Setting,
    SyncState, TagMeta,
};
