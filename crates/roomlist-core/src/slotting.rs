//! Single-pass insertion of one room into a recency-ordered list.
//!
//! Lists stay grouped by category, most important first. A room lands just
//! above the first room of its own category that is not newer than it. If the
//! scan reaches a less important category first, the room goes to the top of
//! its category instead, so a freshly promoted or demoted room never sinks to
//! the bottom of its group. When the scan runs off the end, the room is
//! appended.
//!
//! The sticky room is copied through wherever it sits and takes no part in the
//! placement decision: its stored category is stale by definition.

use tracing::{debug, trace};

use crate::{
    category::Category,
    directory::RoomSource,
    ids::RoomId,
    room_list::ListEntry,
    sorting::RecencyCache,
};

/// Build a new list from `existing` with `room_id` slotted in exactly once.
pub fn slot_room_into_list<S: RoomSource + ?Sized>(
    room_id: &RoomId,
    category: Category,
    sticky_room_id: Option<&RoomId>,
    existing: &[ListEntry],
    timestamps: &mut RecencyCache<'_, S>,
) -> Vec<ListEntry> {
    let room_ts = timestamps.timestamp(room_id);
    let new_entry = ListEntry {
        room_id: room_id.clone(),
        category,
    };

    let mut new_list = Vec::with_capacity(existing.len() + 1);
    // First output index whose category is at least as unimportant as ours.
    let mut boundary: Option<usize> = None;
    let mut pushed = false;

    for entry in existing {
        if &entry.room_id == room_id {
            continue;
        }

        if !pushed && Some(&entry.room_id) != sticky_room_id && entry.category >= category {
            let top_of_category = *boundary.get_or_insert(new_list.len());
            if entry.category > category {
                new_list.insert(top_of_category, new_entry.clone());
                pushed = true;
            } else if room_ts >= timestamps.timestamp(&entry.room_id) {
                new_list.push(new_entry.clone());
                pushed = true;
            }
        }

        new_list.push(entry.clone());
    }

    if !pushed {
        // A boundary without a slot means every room of our category was newer.
        if boundary.is_some() {
            debug!(
                room_id = %room_id,
                ?category,
                len = existing.len(),
                "no slot found in list; appending"
            );
        } else {
            trace!(room_id = %room_id, ?category, "slot scan reached end of list; appending");
        }
        new_list.push(new_entry);
    }

    new_list
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        directory::RoomDirectory,
        ids::UserId,
        types::{Membership, Room, RoomEvent},
    };

    fn room_id(value: &str) -> RoomId {
        RoomId::parse(value).expect("room id")
    }

    fn directory(rooms: &[(&str, u64)]) -> RoomDirectory {
        let mut dir = RoomDirectory::new(UserId::parse("@me:x").expect("user id"));
        for (id, ts) in rooms {
            let mut room = Room::new(room_id(id), *id, Membership::Join);
            room.timeline.push(RoomEvent::message(
                None,
                UserId::parse("@bob:x").expect("user id"),
                *ts,
            ));
            dir.upsert_room(room);
        }
        dir
    }

    fn list(entries: &[(&str, Category)]) -> Vec<ListEntry> {
        entries
            .iter()
            .map(|(id, category)| ListEntry {
                room_id: room_id(id),
                category: *category,
            })
            .collect()
    }

    fn ids(entries: &[ListEntry]) -> Vec<&str> {
        entries.iter().map(|entry| entry.room_id.as_str()).collect()
    }

    #[test]
    fn slots_into_empty_list() {
        let dir = directory(&[("!a:x", 1)]);
        let mut cache = RecencyCache::new(&dir);
        let out = slot_room_into_list(&room_id("!a:x"), Category::Idle, None, &[], &mut cache);
        assert_eq!(ids(&out), vec!["!a:x"]);
    }

    #[test]
    fn starts_missing_category_at_its_boundary() {
        let dir = directory(&[("!r:x", 5), ("!b:x", 5), ("!i:x", 5), ("!g:x", 1)]);
        let existing = list(&[
            ("!r:x", Category::Red),
            ("!b:x", Category::Bold),
            ("!i:x", Category::Idle),
        ]);
        let mut cache = RecencyCache::new(&dir);
        let out = slot_room_into_list(&room_id("!g:x"), Category::Grey, None, &existing, &mut cache);
        assert_eq!(ids(&out), vec!["!r:x", "!g:x", "!b:x", "!i:x"]);
    }

    #[test]
    fn older_room_goes_to_top_of_its_category_when_category_runs_out() {
        let dir = directory(&[("!b1:x", 50), ("!b2:x", 40), ("!i:x", 90), ("!new:x", 10)]);
        let existing = list(&[
            ("!b1:x", Category::Bold),
            ("!b2:x", Category::Bold),
            ("!i:x", Category::Idle),
        ]);
        let mut cache = RecencyCache::new(&dir);
        let out =
            slot_room_into_list(&room_id("!new:x"), Category::Bold, None, &existing, &mut cache);
        assert_eq!(ids(&out), vec!["!new:x", "!b1:x", "!b2:x", "!i:x"]);
    }

    #[test]
    fn newer_room_goes_above_older_room_of_same_category() {
        let dir = directory(&[("!i1:x", 50), ("!i2:x", 20), ("!new:x", 30)]);
        let existing = list(&[("!i1:x", Category::Idle), ("!i2:x", Category::Idle)]);
        let mut cache = RecencyCache::new(&dir);
        let out =
            slot_room_into_list(&room_id("!new:x"), Category::Idle, None, &existing, &mut cache);
        assert_eq!(ids(&out), vec!["!i1:x", "!new:x", "!i2:x"]);
    }

    #[test]
    fn appends_when_scan_runs_off_the_end() {
        let dir = directory(&[("!r:x", 5), ("!g:x", 5), ("!i:x", 1)]);
        let existing = list(&[("!r:x", Category::Red), ("!g:x", Category::Grey)]);
        let mut cache = RecencyCache::new(&dir);
        let out = slot_room_into_list(&room_id("!i:x"), Category::Idle, None, &existing, &mut cache);
        assert_eq!(ids(&out), vec!["!r:x", "!g:x", "!i:x"]);
    }

    #[test]
    fn oldest_room_of_last_category_is_appended() {
        let dir = directory(&[("!g:x", 5), ("!i1:x", 9), ("!i2:x", 7), ("!new:x", 1)]);
        let existing = list(&[
            ("!g:x", Category::Grey),
            ("!i1:x", Category::Idle),
            ("!i2:x", Category::Idle),
        ]);
        let mut cache = RecencyCache::new(&dir);
        let out =
            slot_room_into_list(&room_id("!new:x"), Category::Idle, None, &existing, &mut cache);
        assert_eq!(ids(&out), vec!["!g:x", "!i1:x", "!i2:x", "!new:x"]);
        assert_eq!(out.len(), existing.len() + 1);
    }

    #[test]
    fn promoted_room_lands_above_newer_rooms_of_its_new_category() {
        let dir = directory(&[("!g:x", 500), ("!i1:x", 300), ("!c:x", 200)]);
        let existing = list(&[
            ("!g:x", Category::Grey),
            ("!i1:x", Category::Idle),
            ("!c:x", Category::Idle),
        ]);
        let mut cache = RecencyCache::new(&dir);
        let out = slot_room_into_list(&room_id("!c:x"), Category::Grey, None, &existing, &mut cache);
        assert_eq!(ids(&out), vec!["!c:x", "!g:x", "!i1:x"]);
        assert_eq!(out[0].category, Category::Grey);
    }

    #[test]
    fn replaces_stale_entry_for_the_same_room() {
        let dir = directory(&[("!a:x", 5), ("!b:x", 1)]);
        let existing = list(&[("!b:x", Category::Idle), ("!a:x", Category::Idle)]);
        let mut cache = RecencyCache::new(&dir);
        let out = slot_room_into_list(&room_id("!b:x"), Category::Red, None, &existing, &mut cache);
        assert_eq!(ids(&out), vec!["!b:x", "!a:x"]);
        assert_eq!(out[0].category, Category::Red);
    }

    #[test]
    fn sticky_room_is_copied_through_in_place() {
        let dir = directory(&[("!s:x", 1), ("!i:x", 10), ("!new:x", 5)]);
        // The sticky room still carries an Idle category while sitting above
        // the Idle room; it must neither move nor serve as the insertion point.
        let existing = list(&[("!s:x", Category::Idle), ("!i:x", Category::Idle)]);
        let mut cache = RecencyCache::new(&dir);
        let out = slot_room_into_list(
            &room_id("!new:x"),
            Category::Idle,
            Some(&room_id("!s:x")),
            &existing,
            &mut cache,
        );
        assert_eq!(ids(&out), vec!["!s:x", "!i:x", "!new:x"]);
    }
}
