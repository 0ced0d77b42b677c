//! JSON room fixtures standing in for a synced client.

use std::{fs, path::Path};

use anyhow::{Context, Result};
use roomlist_core::{DmRoomMap, Room, RoomDirectory, UserId};
use serde::Deserialize;
use serde_json::Value;

/// `{ "own_user_id": ..., "direct": { user: [rooms] }, "rooms": [...] }`
#[derive(Debug, Deserialize)]
pub struct RoomFixture {
    pub own_user_id: UserId,
    #[serde(default)]
    pub direct: Value,
    #[serde(default)]
    pub rooms: Vec<Room>,
}

impl RoomFixture {
    pub fn parse(raw: &str) -> Result<Self> {
        serde_json::from_str(raw).context("room fixture is not valid JSON")
    }

    pub fn load(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("failed to read fixture {}", path.display()))?;
        Self::parse(&raw)
    }

    pub fn into_directory(self, timeline_max_events: usize) -> RoomDirectory {
        let mut directory =
            RoomDirectory::new(self.own_user_id).with_max_timeline_events(timeline_max_events);
        if !self.direct.is_null() {
            directory.set_direct(DmRoomMap::from_content(&self.direct));
        }
        for room in self.rooms {
            directory.upsert_room(room);
        }
        directory
    }
}
