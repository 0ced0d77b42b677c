use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{ids::EventId, types::RoomEvent};

/// Default number of live events retained per room.
pub const DEFAULT_MAX_TIMELINE_EVENTS: usize = 1_200;

/// Errors that can occur while applying timeline operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TimelineMergeError {
    /// An operation referenced an event ID that is not present in the timeline.
    #[error("timeline event '{0}' was not found")]
    MissingEvent(EventId),
}

/// Incremental operation applied to a room's live timeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TimelineOp {
    /// Append an event at the live end.
    Append(RoomEvent),
    /// Replace an existing event (for example once it has been decrypted).
    Replace { event_id: EventId, event: RoomEvent },
    /// Mark an existing event as redacted.
    Redact { event_id: EventId },
    /// Clear the timeline (gappy sync / limited timeline).
    Clear,
}

/// Live timeline of one room, oldest first, with bounded retention.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<RoomEvent>", into = "Vec<RoomEvent>")]
pub struct RoomTimeline {
    events: Vec<RoomEvent>,
    max_events: usize,
}

impl Default for RoomTimeline {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_TIMELINE_EVENTS)
    }
}

impl From<Vec<RoomEvent>> for RoomTimeline {
    fn from(events: Vec<RoomEvent>) -> Self {
        let mut timeline = Self::default();
        timeline.events = events;
        timeline.trim_to_max();
        timeline
    }
}

impl From<RoomTimeline> for Vec<RoomEvent> {
    fn from(timeline: RoomTimeline) -> Self {
        timeline.events
    }
}

impl RoomTimeline {
    /// Create an empty timeline with an event cap (`max_events >= 1`).
    pub fn new(max_events: usize) -> Self {
        Self {
            events: Vec::new(),
            max_events: max_events.max(1),
        }
    }

    /// Change the retention cap, trimming the oldest events if needed.
    pub fn set_max_events(&mut self, max_events: usize) {
        self.max_events = max_events.max(1);
        self.trim_to_max();
    }

    /// Events oldest first.
    pub fn events(&self) -> &[RoomEvent] {
        &self.events
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Most recent event.
    pub fn newest(&self) -> Option<&RoomEvent> {
        self.events.last()
    }

    /// Append one event.
    pub fn push(&mut self, event: RoomEvent) {
        self.events.push(event);
        self.trim_to_max();
    }

    /// Apply timeline operations in order.
    pub fn apply_ops(&mut self, ops: &[TimelineOp]) -> Result<(), TimelineMergeError> {
        for op in ops {
            match op {
                TimelineOp::Append(event) => self.events.push(event.clone()),
                TimelineOp::Replace { event_id, event } => {
                    let existing = self
                        .events
                        .iter_mut()
                        .find(|ev| ev.event_id.as_ref() == Some(event_id))
                        .ok_or_else(|| TimelineMergeError::MissingEvent(event_id.clone()))?;
                    *existing = event.clone();
                }
                TimelineOp::Redact { event_id } => {
                    let event = self
                        .events
                        .iter_mut()
                        .find(|ev| ev.event_id.as_ref() == Some(event_id))
                        .ok_or_else(|| TimelineMergeError::MissingEvent(event_id.clone()))?;
                    event.redacted = true;
                }
                TimelineOp::Clear => self.events.clear(),
            }
            self.trim_to_max();
        }

        Ok(())
    }

    fn trim_to_max(&mut self) {
        if self.events.len() <= self.max_events {
            return;
        }

        let excess = self.events.len() - self.max_events;
        self.events.drain(0..excess);
    }
}
