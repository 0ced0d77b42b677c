//! Comparators for the two list orderings.

use std::{cmp::Ordering, collections::HashMap};

use crate::{
    directory::RoomSource,
    ids::RoomId,
    room_list::ListEntry,
    tags::{ListOrder, TagId},
    unread::newest_reorder_timestamp,
};

/// Lazily computed recency timestamps, valid for one sort or slot pass.
pub struct RecencyCache<'a, S: RoomSource + ?Sized> {
    source: &'a S,
    by_room: HashMap<RoomId, u64>,
}

impl<'a, S: RoomSource + ?Sized> RecencyCache<'a, S> {
    pub fn new(source: &'a S) -> Self {
        Self {
            source,
            by_room: HashMap::new(),
        }
    }

    /// Recency timestamp of a room; unknown rooms sort as newest.
    pub fn timestamp(&mut self, room_id: &RoomId) -> u64 {
        if let Some(ts) = self.by_room.get(room_id) {
            return *ts;
        }
        let source = self.source;
        let ts = source.room(room_id).map_or(u64::MAX, |room| {
            newest_reorder_timestamp(room, source.own_user_id())
        });
        self.by_room.insert(room_id.clone(), ts);
        ts
    }
}

/// Category first, then newest qualifying event first.
pub fn compare_recent<S: RoomSource + ?Sized>(
    a: &ListEntry,
    b: &ListEntry,
    timestamps: &mut RecencyCache<'_, S>,
) -> Ordering {
    a.category.cmp(&b.category).then_with(|| {
        let ts_a = timestamps.timestamp(&a.room_id);
        let ts_b = timestamps.timestamp(&b.room_id);
        ts_b.cmp(&ts_a)
    })
}

/// Tag `order` ascending with unordered rooms last, then display name, then room ID.
pub fn compare_manual<S: RoomSource + ?Sized>(
    tag: &TagId,
    a: &ListEntry,
    b: &ListEntry,
    source: &S,
) -> Ordering {
    let order_of = |entry: &ListEntry| {
        source
            .room(&entry.room_id)
            .and_then(|room| room.tags.get(tag.as_str()))
            .and_then(|meta| meta.order)
    };
    let name_of = |entry: &ListEntry| -> String {
        source
            .room(&entry.room_id)
            .map_or_else(|| entry.room_id.to_string(), |room| room.display_name().to_owned())
    };

    let by_order = match (order_of(a), order_of(b)) {
        (Some(x), Some(y)) => x.total_cmp(&y),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    };

    by_order
        .then_with(|| name_of(a).cmp(&name_of(b)))
        .then_with(|| a.room_id.cmp(&b.room_id))
}

/// Sort a whole list with the comparator its tag uses.
pub fn sort_list<S: RoomSource + ?Sized>(
    tag: &TagId,
    entries: &mut [ListEntry],
    source: &S,
    timestamps: &mut RecencyCache<'_, S>,
) {
    match tag.list_order() {
        ListOrder::Recent => {
            entries.sort_by(|a, b| compare_recent(a, b, timestamps));
        }
        ListOrder::Manual => {
            entries.sort_by(|a, b| compare_manual(tag, a, b, source));
        }
    }
}
