//! Room list store: rooms grouped into tag lists and kept ordered as updates
//! arrive.
//!
//! Lists are rebuilt from scratch on the first prepared sync and on changes
//! that can move many rooms at once (settings, tags, `m.direct`). Everything
//! else re-slots a single room.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, trace, warn};

use crate::{
    category::{Category, SortAlgorithm, calculate_category},
    directory::RoomSource,
    ids::RoomId,
    lifecycle::{LifecycleGate, StoreLifecycle},
    slotting::slot_room_into_list,
    sorting::{RecencyCache, sort_list},
    tags::{ListOrder, TagId},
    types::{Action, Membership, Room, Setting},
    unread::event_triggers_recent_reorder,
};

/// One room's position in a list.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ListEntry {
    pub room_id: RoomId,
    pub category: Category,
}

/// Counters for slotting paths that should never run.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct SlotDiagnostics {
    /// Rooms found missing after a pass and inserted at the top.
    pub fallback_insertions: u64,
    /// Rooms found more than once after a pass and collapsed.
    pub duplicate_insertions: u64,
}

/// Read-only view of one list.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TagListSnapshot {
    pub tag: TagId,
    pub order: ListOrder,
    pub entries: Vec<ListEntry>,
}

/// Read-only view of every list, in display order.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct RoomListSnapshot {
    pub lists: Vec<TagListSnapshot>,
    #[serde(default)]
    pub sticky_room_id: Option<RoomId>,
    #[serde(default)]
    pub algorithm: SortAlgorithm,
}

impl RoomListSnapshot {
    /// Room IDs of one list, in order. Empty when the list does not exist.
    pub fn room_ids(&self, tag: &TagId) -> Vec<&RoomId> {
        self.lists
            .iter()
            .find(|list| &list.tag == tag)
            .map(|list| list.entries.iter().map(|entry| &entry.room_id).collect())
            .unwrap_or_default()
    }
}

fn default_lists() -> IndexMap<TagId, Vec<ListEntry>> {
    TagId::DEFAULT_LISTS
        .into_iter()
        .map(|tag| (tag, Vec::new()))
        .collect()
}

/// Category stored for a room in `tag`, given the room's computed category.
fn entry_category(tag: &TagId, computed: Category) -> Category {
    match tag {
        TagId::Invite => Category::Red,
        TagId::Archived => Category::Idle,
        _ if tag.list_order() == ListOrder::Manual => Category::Idle,
        _ => computed,
    }
}

/// Ordered room lists keyed by tag.
#[derive(Debug, Clone)]
pub struct RoomListStore {
    lists: IndexMap<TagId, Vec<ListEntry>>,
    sticky_room_id: Option<RoomId>,
    algorithm: SortAlgorithm,
    tags_enabled: bool,
    gate: LifecycleGate,
    diagnostics: SlotDiagnostics,
}

impl Default for RoomListStore {
    fn default() -> Self {
        Self::new(SortAlgorithm::default(), false)
    }
}

impl RoomListStore {
    pub fn new(algorithm: SortAlgorithm, tags_enabled: bool) -> Self {
        Self {
            lists: default_lists(),
            sticky_room_id: None,
            algorithm,
            tags_enabled,
            gate: LifecycleGate::default(),
            diagnostics: SlotDiagnostics::default(),
        }
    }

    pub fn lifecycle(&self) -> StoreLifecycle {
        self.gate.state()
    }

    pub fn is_ready(&self) -> bool {
        self.gate.is_ready()
    }

    pub fn algorithm(&self) -> SortAlgorithm {
        self.algorithm
    }

    pub fn tags_enabled(&self) -> bool {
        self.tags_enabled
    }

    pub fn sticky_room_id(&self) -> Option<&RoomId> {
        self.sticky_room_id.as_ref()
    }

    pub fn diagnostics(&self) -> SlotDiagnostics {
        self.diagnostics
    }

    /// Lists with categories, in display order.
    pub fn lists(&self) -> &IndexMap<TagId, Vec<ListEntry>> {
        &self.lists
    }

    /// Lists as plain room IDs.
    pub fn presentation_lists(&self) -> IndexMap<TagId, Vec<RoomId>> {
        self.lists
            .iter()
            .map(|(tag, entries)| {
                let ids = entries.iter().map(|entry| entry.room_id.clone()).collect();
                (tag.clone(), ids)
            })
            .collect()
    }

    pub fn snapshot(&self) -> RoomListSnapshot {
        RoomListSnapshot {
            lists: self
                .lists
                .iter()
                .map(|(tag, entries)| TagListSnapshot {
                    tag: tag.clone(),
                    order: tag.list_order(),
                    entries: entries.clone(),
                })
                .collect(),
            sticky_room_id: self.sticky_room_id.clone(),
            algorithm: self.algorithm,
        }
    }

    /// React to a dispatched action. Returns `true` when the lists changed and
    /// subscribers should get a new snapshot.
    pub fn on_action<S: RoomSource + ?Sized>(&mut self, source: &S, action: &Action) -> bool {
        match action {
            Action::Sync { prev_state, state } => {
                if !self.gate.on_sync(*prev_state, *state) {
                    return false;
                }
                self.generate_initial_lists(source);
                true
            }
            Action::SettingUpdated { setting, value } => {
                self.on_setting_updated(source, *setting, *value)
            }
            Action::LoggedOut => {
                self.reset();
                false
            }
            other => {
                if let Err(err) = self.gate.require_ready(&other.name()) {
                    trace!(error = %err, "room list store not ready; ignoring action");
                    return false;
                }
                self.on_ready_action(source, other)
            }
        }
    }

    fn on_setting_updated<S: RoomSource + ?Sized>(
        &mut self,
        source: &S,
        setting: Setting,
        value: bool,
    ) -> bool {
        // Settings are remembered while not ready and picked up by the first build.
        match setting {
            Setting::OrderByImportance => {
                let algorithm = SortAlgorithm::from_order_by_importance(value);
                if !self.is_ready() {
                    self.algorithm = algorithm;
                    return false;
                }
                self.update_sorting_algorithm(source, algorithm);
            }
            Setting::CustomTags => {
                if !self.is_ready() {
                    self.tags_enabled = value;
                    return false;
                }
                self.set_tags_enabled(source, value);
            }
        }
        true
    }

    fn on_ready_action<S: RoomSource + ?Sized>(&mut self, source: &S, action: &Action) -> bool {
        match action {
            Action::RoomReceipt { room_id, receipts } => {
                let own = source.own_user_id();
                let own_read = receipts
                    .iter()
                    .any(|receipt| &receipt.user_id == own && receipt.receipt_type == "m.read");
                own_read && self.room_update_triggered(source, room_id, false)
            }
            Action::RoomTags { .. } => {
                self.generate_initial_lists(source);
                true
            }
            Action::RoomTimeline {
                room_id,
                event,
                is_live,
                is_live_unfiltered,
                ..
            } => {
                if !*is_live
                    || !*is_live_unfiltered
                    || !event_triggers_recent_reorder(event, source.own_user_id())
                {
                    return false;
                }
                self.room_update_triggered(source, room_id, false)
            }
            Action::EventDecrypted {
                room_id,
                event,
                in_live_timeline,
            } => {
                let Some(room_id) = room_id else {
                    return false;
                };
                if source.room(room_id).is_none()
                    || !*in_live_timeline
                    || !event_triggers_recent_reorder(event, source.own_user_id())
                {
                    return false;
                }
                self.room_update_triggered(source, room_id, false)
            }
            // A redaction can drop the room's last unread message.
            Action::RoomRedaction { room_id, .. } => {
                self.room_update_triggered(source, room_id, false)
            }
            // Timeline resets keep positions until the refilled timeline arrives.
            Action::RoomTimelineReset { .. } => false,
            Action::AccountData { event_type, .. } => {
                if event_type != "m.direct" {
                    return false;
                }
                self.generate_initial_lists(source);
                true
            }
            Action::MyMembership { room_id, .. } => {
                self.room_update_triggered(source, room_id, true)
            }
            Action::Room { room } => self.room_update_triggered(source, &room.room_id, true),
            Action::ViewRoom { room_id } => self.view_room(source, room_id),
            _ => false,
        }
    }

    /// Rebuild every list from the rooms the source knows about.
    pub fn generate_initial_lists<S: RoomSource + ?Sized>(&mut self, source: &S) {
        info!(
            algorithm = ?self.algorithm,
            tags_enabled = self.tags_enabled,
            "generating initial room lists"
        );

        let own = source.own_user_id();
        let mut lists = default_lists();
        for room in source.rooms() {
            let tags = self.recommended_tags(source, room);
            if tags.is_empty() {
                continue;
            }
            let computed = calculate_category(room, own, self.algorithm);
            for tag in tags {
                let category = entry_category(&tag, computed);
                lists.entry(tag).or_default().push(ListEntry {
                    room_id: room.room_id.clone(),
                    category,
                });
            }
        }

        // One cache for the whole rebuild; timestamps cannot change mid-sort.
        let mut timestamps = RecencyCache::new(source);
        for (tag, entries) in lists.iter_mut() {
            sort_list(tag, entries, source, &mut timestamps);
        }

        self.lists = lists;
        self.gate.mark_ready();
    }

    /// Re-slot a room after something about it changed.
    ///
    /// The sticky room keeps its position unless `ignore_sticky` is set.
    pub fn room_update_triggered<S: RoomSource + ?Sized>(
        &mut self,
        source: &S,
        room_id: &RoomId,
        ignore_sticky: bool,
    ) -> bool {
        if !ignore_sticky && self.sticky_room_id.as_ref() == Some(room_id) {
            trace!(room_id = %room_id, "skipping update for sticky room");
            return false;
        }
        self.update_room_category(source, room_id)
    }

    /// Recompute a room's category and re-slot it into every list it belongs to.
    pub fn update_room_category<S: RoomSource + ?Sized>(
        &mut self,
        source: &S,
        room_id: &RoomId,
    ) -> bool {
        let Some(room) = source.room(room_id) else {
            debug!(room_id = %room_id, "room vanished before re-slotting");
            return false;
        };
        let category = calculate_category(room, source.own_user_id(), self.algorithm);
        self.set_room_category(source, room_id, category)
    }

    /// Move a room into exactly the lists it should be in, with `category`.
    pub fn set_room_category<S: RoomSource + ?Sized>(
        &mut self,
        source: &S,
        room_id: &RoomId,
        category: Category,
    ) -> bool {
        let Some(room) = source.room(room_id) else {
            debug!(room_id = %room_id, "room vanished before re-slotting");
            return false;
        };
        let targets = self.recommended_tags(source, room);
        for tag in &targets {
            self.lists.entry(tag.clone()).or_default();
        }

        let mut timestamps = RecencyCache::new(source);
        let sticky = self.sticky_room_id.clone();
        let tags: Vec<TagId> = self.lists.keys().cloned().collect();
        for tag in tags {
            let Some(existing) = self.lists.get_mut(&tag) else {
                continue;
            };

            if !targets.contains(&tag) {
                existing.retain(|entry| &entry.room_id != room_id);
                continue;
            }

            let category = entry_category(&tag, category);
            match tag.list_order() {
                ListOrder::Manual => {
                    existing.retain(|entry| &entry.room_id != room_id);
                    existing.push(ListEntry {
                        room_id: room_id.clone(),
                        category,
                    });
                    sort_list(&tag, existing, source, &mut timestamps);
                }
                ListOrder::Recent => {
                    let slotted = slot_room_into_list(
                        room_id,
                        category,
                        sticky.as_ref(),
                        existing,
                        &mut timestamps,
                    );
                    *existing = slotted;
                }
            }
        }

        self.verify_inserted(room_id, category, &targets);
        true
    }

    /// Check that `room_id` sits exactly once in every target list, repairing
    /// the list if it does not.
    fn verify_inserted(&mut self, room_id: &RoomId, category: Category, targets: &[TagId]) {
        for tag in targets {
            let entries = self.lists.entry(tag.clone()).or_default();
            let count = entries
                .iter()
                .filter(|entry| &entry.room_id == room_id)
                .count();

            match count {
                1 => {}
                0 => {
                    warn!(
                        room_id = %room_id,
                        tag = %tag,
                        ?category,
                        list_len = entries.len(),
                        "room nearly lost while slotting; inserting at top"
                    );
                    entries.insert(
                        0,
                        ListEntry {
                            room_id: room_id.clone(),
                            category: entry_category(tag, category),
                        },
                    );
                    self.diagnostics.fallback_insertions += 1;
                }
                n => {
                    warn!(room_id = %room_id, tag = %tag, count = n, "room slotted more than once");
                    let mut seen = false;
                    entries.retain(|entry| {
                        if &entry.room_id != room_id {
                            return true;
                        }
                        !std::mem::replace(&mut seen, true)
                    });
                    self.diagnostics.duplicate_insertions += 1;
                }
            }
        }
    }

    /// Make `room_id` the sticky room and drop the previous sticky room to `Idle`.
    pub fn view_room<S: RoomSource + ?Sized>(&mut self, source: &S, room_id: &RoomId) -> bool {
        if self.sticky_room_id.as_ref() == Some(room_id) {
            return false;
        }
        // The new sticky room must be set first, or the old one would still be
        // treated as sticky while it is re-slotted.
        let previous = self.sticky_room_id.replace(room_id.clone());
        if let Some(previous) = previous {
            self.set_room_category(source, &previous, Category::Idle);
        }
        true
    }

    pub fn update_sorting_algorithm<S: RoomSource + ?Sized>(
        &mut self,
        source: &S,
        algorithm: SortAlgorithm,
    ) {
        info!(?algorithm, "updating room sorting algorithm");
        self.algorithm = algorithm;
        self.generate_initial_lists(source);
    }

    pub fn set_tags_enabled<S: RoomSource + ?Sized>(&mut self, source: &S, enabled: bool) {
        self.tags_enabled = enabled;
        self.generate_initial_lists(source);
    }

    /// Forget all lists and the sticky room. Settings are kept.
    pub fn reset(&mut self) {
        self.lists = default_lists();
        self.sticky_room_id = None;
        self.diagnostics = SlotDiagnostics::default();
        self.gate.on_logged_out();
    }

    /// Lists a room belongs in, given its membership, tags and DM status.
    fn recommended_tags<S: RoomSource + ?Sized>(&self, source: &S, room: &Room) -> Vec<TagId> {
        let tagged_or_default = || {
            let mut tags: Vec<TagId> = room
                .tags
                .keys()
                .map(|name| TagId::from_name(name))
                .filter(|tag| tag.admits_room_tag(self.tags_enabled))
                .collect();
            if tags.is_empty() {
                if source.dm_partner(&room.room_id).is_some() {
                    tags.push(TagId::Direct);
                } else {
                    tags.push(TagId::Recent);
                }
            }
            tags
        };

        match room.membership {
            Membership::Invite => vec![TagId::Invite],
            Membership::Join | Membership::Ban => tagged_or_default(),
            Membership::Leave if room.kicked => tagged_or_default(),
            Membership::Leave => vec![TagId::Archived],
            Membership::Knock => Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use serde_json::json;

    use super::*;
    use crate::{
        directory::{DmRoomMap, RoomDirectory},
        ids::{EventId, UserId},
        types::{Receipt, RoomEvent, SyncState, TagMeta},
    };

    fn me() -> UserId {
        UserId::parse("@me:example.org").expect("user id")
    }

    fn bob() -> UserId {
        UserId::parse("@bob:example.org").expect("user id")
    }

    fn room_id(value: &str) -> RoomId {
        RoomId::parse(value).expect("room id")
    }

    fn joined_room(id: &str, ts: u64) -> Room {
        let mut room = Room::new(room_id(id), id.trim_start_matches('!'), Membership::Join);
        room.timeline.push(RoomEvent::message(
            Some(EventId::parse(format!("$ev-{ts}")).expect("event id")),
            bob(),
            ts,
        ));
        room.read_up_to = room.timeline.newest().and_then(|ev| ev.event_id.clone());
        room
    }

    fn prepared() -> Action {
        Action::Sync {
            prev_state: None,
            state: SyncState::Prepared,
        }
    }

    fn ready_store(dir: &RoomDirectory) -> RoomListStore {
        let mut store = RoomListStore::default();
        assert!(store.on_action(dir, &prepared()));
        store
    }

    fn ids<'a>(store: &'a RoomListStore, tag: &TagId) -> Vec<&'a str> {
        store.lists()[tag]
            .iter()
            .map(|entry| entry.room_id.as_str())
            .collect()
    }

    #[test]
    fn initial_lists_place_rooms_by_membership_tags_and_dm_status() {
        let mut dir = RoomDirectory::new(me());
        dir.upsert_room(joined_room("!plain:x", 10));
        dir.upsert_room(joined_room("!fav:x", 10).with_tag("m.favourite", TagMeta::ordered(0.1)));
        dir.upsert_room(joined_room("!dm:x", 10));
        dir.upsert_room(Room::new(room_id("!inv:x"), "inv", Membership::Invite));
        dir.upsert_room(Room::new(room_id("!left:x"), "left", Membership::Leave));
        let mut kicked = Room::new(room_id("!kicked:x"), "kicked", Membership::Leave);
        kicked.kicked = true;
        dir.upsert_room(kicked);
        dir.set_direct(DmRoomMap::from_content(&json!({ "@bob:example.org": ["!dm:x"] })));

        let store = ready_store(&dir);

        assert_eq!(ids(&store, &TagId::Favourite), vec!["!fav:x"]);
        assert_eq!(ids(&store, &TagId::Direct), vec!["!dm:x"]);
        assert_eq!(ids(&store, &TagId::Invite), vec!["!inv:x"]);
        assert_eq!(ids(&store, &TagId::Archived), vec!["!left:x"]);
        assert!(ids(&store, &TagId::Recent).contains(&"!plain:x"));
        assert!(ids(&store, &TagId::Recent).contains(&"!kicked:x"));
        assert_eq!(store.lists()[&TagId::Invite][0].category, Category::Red);
        assert_eq!(store.lifecycle(), StoreLifecycle::Ready);
    }

    #[test]
    fn custom_tags_only_get_lists_when_enabled() {
        let mut dir = RoomDirectory::new(me());
        dir.upsert_room(joined_room("!work:x", 10).with_tag("u.work", TagMeta::default()));
        dir.upsert_room(joined_room("!weird:x", 10).with_tag("m.weird", TagMeta::default()));

        let mut store = ready_store(&dir);
        let work = TagId::Custom("u.work".into());
        assert!(!store.lists().contains_key(&work));
        assert_eq!(ids(&store, &TagId::Recent).len(), 2);

        assert!(store.on_action(
            &dir,
            &Action::SettingUpdated {
                setting: Setting::CustomTags,
                value: true,
            }
        ));
        assert_eq!(ids(&store, &work), vec!["!work:x"]);
        assert_eq!(ids(&store, &TagId::Recent), vec!["!weird:x"]);
        assert!(!store.lists().contains_key(&TagId::Custom("m.weird".into())));
    }

    #[test]
    fn actions_are_ignored_until_first_prepared_sync() {
        let mut dir = RoomDirectory::new(me());
        dir.upsert_room(joined_room("!a:x", 10));
        let mut store = RoomListStore::default();

        assert!(!store.on_action(&dir, &Action::ViewRoom { room_id: room_id("!a:x") }));
        assert!(store.sticky_room_id().is_none());
        assert!(!store.on_action(
            &dir,
            &Action::Sync {
                prev_state: Some(SyncState::Prepared),
                state: SyncState::Prepared,
            }
        ));
        assert!(store.on_action(&dir, &prepared()));
        assert!(store.on_action(&dir, &Action::ViewRoom { room_id: room_id("!a:x") }));
        assert_eq!(store.sticky_room_id(), Some(&room_id("!a:x")));
    }

    #[test]
    fn settings_before_ready_are_applied_by_first_build() {
        let mut dir = RoomDirectory::new(me());
        dir.upsert_room(joined_room("!a:x", 10).with_counts(1, 1));
        let mut store = RoomListStore::default();

        assert!(!store.on_action(
            &dir,
            &Action::SettingUpdated {
                setting: Setting::OrderByImportance,
                value: false,
            }
        ));
        assert!(store.on_action(&dir, &prepared()));
        assert_eq!(store.algorithm(), SortAlgorithm::Recent);
        assert_eq!(store.lists()[&TagId::Recent][0].category, Category::Idle);
    }

    #[test]
    fn idle_room_is_promoted_to_grey_above_idle_rooms() {
        let mut dir = RoomDirectory::new(me());
        dir.upsert_room(joined_room("!a:x", 300));
        dir.upsert_room(joined_room("!b:x", 200));
        dir.upsert_room(joined_room("!c:x", 100));
        let mut store = ready_store(&dir);
        assert_eq!(ids(&store, &TagId::Recent), vec!["!a:x", "!b:x", "!c:x"]);

        let event = RoomEvent::message(Some(EventId::parse("$new").expect("event id")), bob(), 50);
        let action = Action::RoomTimeline {
            room_id: room_id("!c:x"),
            event,
            is_live: true,
            is_live_unfiltered: true,
            notification_count: Some(1),
            highlight_count: Some(0),
        };
        dir.apply(&action);
        assert!(store.on_action(&dir, &action));

        assert_eq!(ids(&store, &TagId::Recent), vec!["!c:x", "!a:x", "!b:x"]);
        assert_eq!(store.lists()[&TagId::Recent][0].category, Category::Grey);
        assert_eq!(store.diagnostics(), SlotDiagnostics::default());
    }

    #[test]
    fn promoted_room_goes_to_top_of_grey_even_when_older() {
        let mut dir = RoomDirectory::new(me());
        dir.upsert_room(joined_room("!g:x", 500).with_counts(1, 0));
        dir.upsert_room(joined_room("!i1:x", 300));
        dir.upsert_room(joined_room("!c:x", 100));
        let mut store = ready_store(&dir);
        assert_eq!(ids(&store, &TagId::Recent), vec!["!g:x", "!i1:x", "!c:x"]);

        let event = RoomEvent::message(Some(EventId::parse("$new").expect("event id")), bob(), 200);
        let action = Action::RoomTimeline {
            room_id: room_id("!c:x"),
            event,
            is_live: true,
            is_live_unfiltered: true,
            notification_count: Some(1),
            highlight_count: Some(0),
        };
        dir.apply(&action);
        assert!(store.on_action(&dir, &action));

        assert_eq!(ids(&store, &TagId::Recent), vec!["!c:x", "!g:x", "!i1:x"]);
        let categories: Vec<_> = store.lists()[&TagId::Recent]
            .iter()
            .map(|entry| entry.category)
            .collect();
        assert_eq!(categories, vec![Category::Grey, Category::Grey, Category::Idle]);
    }

    #[test]
    fn redacting_last_unread_message_demotes_room() {
        let mut dir = RoomDirectory::new(me());
        dir.upsert_room(joined_room("!a:x", 300));
        let mut unread = joined_room("!b:x", 200);
        unread.timeline.push(RoomEvent::message(
            Some(EventId::parse("$unread").expect("event id")),
            bob(),
            400,
        ));
        dir.upsert_room(unread);
        dir.upsert_room(joined_room("!c:x", 100));
        let mut store = ready_store(&dir);
        assert_eq!(ids(&store, &TagId::Recent), vec!["!b:x", "!a:x", "!c:x"]);
        assert_eq!(store.lists()[&TagId::Recent][0].category, Category::Bold);

        let action = Action::RoomRedaction {
            room_id: room_id("!b:x"),
            redacts: EventId::parse("$unread").expect("event id"),
        };
        assert!(dir.apply(&action));
        assert!(store.on_action(&dir, &action));

        assert_eq!(ids(&store, &TagId::Recent), vec!["!a:x", "!b:x", "!c:x"]);
        assert_eq!(store.lists()[&TagId::Recent][1].category, Category::Idle);

        let reset = Action::RoomTimelineReset {
            room_id: room_id("!a:x"),
        };
        assert!(dir.apply(&reset));
        assert!(!store.on_action(&dir, &reset));
        assert_eq!(ids(&store, &TagId::Recent), vec!["!a:x", "!b:x", "!c:x"]);
    }

    #[test]
    fn non_live_and_own_noise_events_do_not_reorder() {
        let mut dir = RoomDirectory::new(me());
        dir.upsert_room(joined_room("!a:x", 10));
        let mut store = ready_store(&dir);

        let mut member_event = RoomEvent::message(None, bob(), 99);
        member_event.event_type = "m.room.member".into();
        assert!(!store.on_action(
            &dir,
            &Action::RoomTimeline {
                room_id: room_id("!a:x"),
                event: member_event,
                is_live: true,
                is_live_unfiltered: true,
                notification_count: None,
                highlight_count: None,
            }
        ));
        assert!(!store.on_action(
            &dir,
            &Action::RoomTimeline {
                room_id: room_id("!a:x"),
                event: RoomEvent::message(None, bob(), 99),
                is_live: false,
                is_live_unfiltered: true,
                notification_count: None,
                highlight_count: None,
            }
        ));
    }

    #[test]
    fn only_own_read_receipts_trigger_update() {
        let mut dir = RoomDirectory::new(me());
        dir.upsert_room(joined_room("!a:x", 10));
        let mut store = ready_store(&dir);

        let receipt = |user_id: UserId| Action::RoomReceipt {
            room_id: room_id("!a:x"),
            receipts: vec![Receipt {
                user_id,
                event_id: EventId::parse("$ev-10").expect("event id"),
                receipt_type: "m.read".into(),
            }],
        };
        assert!(!store.on_action(&dir, &receipt(bob())));
        assert!(store.on_action(&dir, &receipt(me())));
    }

    #[test]
    fn sticky_room_keeps_position_until_user_navigates_away() {
        let mut dir = RoomDirectory::new(me());
        dir.upsert_room(joined_room("!a:x", 300));
        dir.upsert_room(joined_room("!b:x", 200).with_counts(2, 0));
        dir.upsert_room(joined_room("!c:x", 100));
        let mut store = ready_store(&dir);
        assert_eq!(ids(&store, &TagId::Recent), vec!["!b:x", "!a:x", "!c:x"]);

        store.on_action(&dir, &Action::ViewRoom { room_id: room_id("!b:x") });

        // Reading the sticky room does not move it.
        dir.room_mut(&room_id("!b:x")).expect("room").notification_count = 0;
        let read = Action::RoomReceipt {
            room_id: room_id("!b:x"),
            receipts: vec![Receipt {
                user_id: me(),
                event_id: EventId::parse("$ev-200").expect("event id"),
                receipt_type: "m.read".into(),
            }],
        };
        assert!(!store.on_action(&dir, &read));
        assert_eq!(ids(&store, &TagId::Recent), vec!["!b:x", "!a:x", "!c:x"]);

        // Leaving it re-slots it as idle by recency.
        assert!(store.on_action(&dir, &Action::ViewRoom { room_id: room_id("!a:x") }));
        assert_eq!(ids(&store, &TagId::Recent), vec!["!a:x", "!b:x", "!c:x"]);
        assert_eq!(store.sticky_room_id(), Some(&room_id("!a:x")));
        assert_eq!(store.lists()[&TagId::Recent][1].category, Category::Idle);
    }

    #[test]
    fn membership_change_moves_room_between_lists() {
        let mut dir = RoomDirectory::new(me());
        dir.upsert_room(Room::new(room_id("!inv:x"), "inv", Membership::Invite));
        let mut store = ready_store(&dir);
        assert_eq!(ids(&store, &TagId::Invite), vec!["!inv:x"]);

        let action = Action::MyMembership {
            room_id: room_id("!inv:x"),
            membership: Membership::Join,
            kicked: false,
        };
        dir.apply(&action);
        assert!(store.on_action(&dir, &action));

        assert!(ids(&store, &TagId::Invite).is_empty());
        assert_eq!(ids(&store, &TagId::Recent), vec!["!inv:x"]);
    }

    #[test]
    fn tag_change_rebuilds_lists() {
        let mut dir = RoomDirectory::new(me());
        dir.upsert_room(joined_room("!a:x", 10));
        let mut store = ready_store(&dir);

        let mut tags = BTreeMap::new();
        tags.insert("m.lowpriority".to_owned(), TagMeta::default());
        let action = Action::RoomTags {
            room_id: room_id("!a:x"),
            tags,
        };
        dir.apply(&action);
        assert!(store.on_action(&dir, &action));
        assert_eq!(ids(&store, &TagId::LowPriority), vec!["!a:x"]);
        assert!(ids(&store, &TagId::Recent).is_empty());
    }

    #[test]
    fn logout_resets_without_update() {
        let mut dir = RoomDirectory::new(me());
        dir.upsert_room(joined_room("!a:x", 10));
        let mut store = ready_store(&dir);
        store.on_action(&dir, &Action::ViewRoom { room_id: room_id("!a:x") });

        assert!(!store.on_action(&dir, &Action::LoggedOut));
        assert_eq!(store.lifecycle(), StoreLifecycle::LoggedOut);
        assert!(store.sticky_room_id().is_none());
        assert!(store.lists().values().all(Vec::is_empty));
        assert!(!store.on_action(&dir, &Action::ViewRoom { room_id: room_id("!a:x") }));
    }

    #[test]
    fn snapshot_lists_rooms_in_display_order() {
        let mut dir = RoomDirectory::new(me());
        dir.upsert_room(joined_room("!a:x", 20));
        dir.upsert_room(joined_room("!b:x", 10));
        let store = ready_store(&dir);

        let snapshot = store.snapshot();
        assert_eq!(snapshot.lists.len(), TagId::DEFAULT_LISTS.len());
        assert_eq!(snapshot.lists[0].tag, TagId::ServerNotice);
        let recent: Vec<&str> = snapshot
            .room_ids(&TagId::Recent)
            .into_iter()
            .map(RoomId::as_str)
            .collect();
        assert_eq!(recent, vec!["!a:x", "!b:x"]);
        assert_eq!(store.presentation_lists()[&TagId::Recent].len(), 2);

        let json = serde_json::to_value(&snapshot).expect("snapshot json");
        assert_eq!(json["lists"][3]["tag"], "im.vector.fake.recent");
    }
}

#[cfg(test)]
mod proptests {
    use std::collections::HashSet;

    use proptest::prelude::*;

    use super::*;
    use crate::{
        directory::RoomDirectory,
        ids::{EventId, UserId},
        types::{RoomEvent, SyncState, TagMeta},
    };

    const ROOM_COUNT: usize = 8;

    #[derive(Debug, Clone)]
    enum Step {
        Message { room: usize, ts: u64, highlight: bool, notify: bool },
        Read { room: usize },
        View { room: usize },
        Favourite { room: usize, order: Option<u8> },
    }

    fn step() -> impl Strategy<Value = Step> {
        prop_oneof![
            (0..ROOM_COUNT, 1u64..10_000, any::<bool>(), any::<bool>()).prop_map(
                |(room, ts, highlight, notify)| Step::Message {
                    room,
                    ts,
                    highlight,
                    notify,
                }
            ),
            (0..ROOM_COUNT).prop_map(|room| Step::Read { room }),
            (0..ROOM_COUNT).prop_map(|room| Step::View { room }),
            (0..ROOM_COUNT, proptest::option::of(0u8..10))
                .prop_map(|(room, order)| Step::Favourite { room, order }),
        ]
    }

    fn room_id(index: usize) -> RoomId {
        RoomId::parse(format!("!r{index}:example.org")).expect("room id")
    }

    fn me() -> UserId {
        UserId::parse("@me:example.org").expect("user id")
    }

    fn directory(seed_ts: &[u64]) -> RoomDirectory {
        let mut dir = RoomDirectory::new(me());
        for (index, ts) in seed_ts.iter().enumerate() {
            let mut room = Room::new(room_id(index), format!("room {index}"), Membership::Join);
            room.timeline.push(RoomEvent::message(
                None,
                UserId::parse("@bob:example.org").expect("user id"),
                *ts,
            ));
            dir.upsert_room(room);
        }
        dir
    }

    fn action_for(dir: &RoomDirectory, step: &Step, counter: usize) -> Action {
        match step {
            Step::Message {
                room,
                ts,
                highlight,
                notify,
            } => {
                let current = dir.room(&room_id(*room)).expect("room");
                Action::RoomTimeline {
                    room_id: room_id(*room),
                    event: RoomEvent::message(
                        Some(EventId::parse(format!("$e{counter}")).expect("event id")),
                        UserId::parse("@bob:example.org").expect("user id"),
                        *ts,
                    ),
                    is_live: true,
                    is_live_unfiltered: true,
                    notification_count: Some(current.notification_count + u64::from(*notify)),
                    highlight_count: Some(current.highlight_count + u64::from(*highlight)),
                }
            }
            Step::Read { room } => {
                let newest = dir
                    .room(&room_id(*room))
                    .and_then(|room| room.timeline.newest())
                    .and_then(|event| event.event_id.clone())
                    .unwrap_or_else(|| EventId::parse("$none").expect("event id"));
                Action::RoomReceipt {
                    room_id: room_id(*room),
                    receipts: vec![crate::types::Receipt {
                        user_id: me(),
                        event_id: newest,
                        receipt_type: "m.read".into(),
                    }],
                }
            }
            Step::View { room } => Action::ViewRoom {
                room_id: room_id(*room),
            },
            Step::Favourite { room, order } => {
                let mut tags = dir.room(&room_id(*room)).expect("room").tags.clone();
                if tags.contains_key("m.favourite") {
                    tags.remove("m.favourite");
                } else {
                    tags.insert(
                        "m.favourite".into(),
                        TagMeta {
                            order: order.map(|o| f64::from(o) / 10.0),
                        },
                    );
                }
                Action::RoomTags {
                    room_id: room_id(*room),
                    tags,
                }
            }
        }
    }

    fn expected_lists(dir: &RoomDirectory, room: &Room) -> Vec<TagId> {
        let mut tags: Vec<TagId> = room
            .tags
            .keys()
            .map(|name| TagId::from_name(name))
            .filter(|tag| tag.admits_room_tag(false))
            .collect();
        if tags.is_empty() {
            tags.push(if dir.dm_partner(&room.room_id).is_some() {
                TagId::Direct
            } else {
                TagId::Recent
            });
        }
        tags
    }

    proptest! {
        #[test]
        fn slotting_keeps_list_invariants(
            seed_ts in proptest::collection::vec(1u64..10_000, ROOM_COUNT),
            steps in proptest::collection::vec(step(), 1..40),
        ) {
            let mut dir = directory(&seed_ts);
            let mut store = RoomListStore::default();
            store.on_action(&dir, &Action::Sync { prev_state: None, state: SyncState::Prepared });

            for (counter, step) in steps.iter().enumerate() {
                let recent_before: Vec<RoomId> = store.lists()[&TagId::Recent]
                    .iter()
                    .map(|e| e.room_id.clone())
                    .collect();
                let sticky_before = store.sticky_room_id().cloned();

                let action = action_for(&dir, step, counter);
                dir.apply(&action);
                store.on_action(&dir, &action);

                // Exactly once per list the room should be in, and nowhere else.
                for room in dir.rooms() {
                    let expected = expected_lists(&dir, room);
                    for (tag, entries) in store.lists() {
                        let count = entries.iter().filter(|e| e.room_id == room.room_id).count();
                        let want = usize::from(expected.contains(tag));
                        prop_assert_eq!(count, want, "room {} in {}", room.room_id, tag);
                    }
                }

                // Categories never decrease in importance down a recent list,
                // ignoring the sticky room whose category is stale.
                let sticky = store.sticky_room_id().cloned();
                for (tag, entries) in store.lists() {
                    if tag.list_order() != ListOrder::Recent {
                        continue;
                    }
                    let categories: Vec<Category> = entries
                        .iter()
                        .filter(|e| Some(&e.room_id) != sticky.as_ref())
                        .map(|e| e.category)
                        .collect();
                    prop_assert!(categories.windows(2).all(|w| w[0] <= w[1]), "{:?}", categories);
                }

                // Manual lists follow `order`, with unordered rooms last.
                let orders: Vec<Option<f64>> = store.lists()[&TagId::Favourite]
                    .iter()
                    .map(|e| {
                        dir.room(&e.room_id)
                            .and_then(|room| room.tags.get("m.favourite"))
                            .and_then(|meta| meta.order)
                    })
                    .collect();
                for pair in orders.windows(2) {
                    match (pair[0], pair[1]) {
                        (Some(a), Some(b)) => prop_assert!(a <= b),
                        (None, Some(_)) => prop_assert!(false, "unordered room above ordered room"),
                        _ => {}
                    }
                }

                // A single-room update leaves every other room where it was, and
                // an update for the sticky room changes nothing at all.
                let updated = match step {
                    Step::Message { room, .. } | Step::Read { room } => Some(room_id(*room)),
                    _ => None,
                };
                if let Some(updated) = updated {
                    let recent_after: Vec<RoomId> = store.lists()[&TagId::Recent]
                        .iter()
                        .map(|e| e.room_id.clone())
                        .collect();
                    if sticky_before.as_ref() == Some(&updated) {
                        prop_assert_eq!(&recent_before, &recent_after);
                    }
                    let others_before: Vec<&RoomId> =
                        recent_before.iter().filter(|id| **id != updated).collect();
                    let others_after: Vec<&RoomId> =
                        recent_after.iter().filter(|id| **id != updated).collect();
                    prop_assert_eq!(others_before, others_after);
                }

                prop_assert_eq!(store.diagnostics(), SlotDiagnostics::default());
            }

            let seen: HashSet<&RoomId> = store.lists()[&TagId::Recent].iter().map(|e| &e.room_id).collect();
            prop_assert_eq!(seen.len(), store.lists()[&TagId::Recent].len());
        }
    }
}
