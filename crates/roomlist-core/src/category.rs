use serde::{Deserialize, Serialize};

use crate::{ids::UserId, types::Room, unread::room_has_unread_messages};

/// Per-room urgency used to group recency-ordered lists.
///
/// Declaration order is importance order: `Red < Grey < Bold < Idle`, so a
/// smaller value sorts nearer the top.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    /// Mentions in the room.
    Red,
    /// Unread notified messages (not mentions).
    Grey,
    /// Unread messages that did not notify ("mentions only" rooms).
    Bold,
    /// Nothing of interest.
    Idle,
}

impl Category {
    pub const ALL: [Category; 4] = [Self::Red, Self::Grey, Self::Bold, Self::Idle];
}

/// Room ordering mode selected by the `OrderByImportance` setting.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum SortAlgorithm {
    /// Categories first, then recency. Keeps the viewed room sticky.
    #[default]
    Importance,
    /// Recency only; every room is `Idle`.
    Recent,
}

impl SortAlgorithm {
    pub fn from_order_by_importance(enabled: bool) -> Self {
        if enabled {
            Self::Importance
        } else {
            Self::Recent
        }
    }
}

/// Classify a room from its notification counters and unread state.
pub fn calculate_category(room: &Room, own_user_id: &UserId, algorithm: SortAlgorithm) -> Category {
    if algorithm == SortAlgorithm::Recent {
        return Category::Idle;
    }
    if room.highlight_count > 0 {
        return Category::Red;
    }
    if room.notification_count > 0 {
        return Category::Grey;
    }
    if room_has_unread_messages(room, own_user_id) {
        return Category::Bold;
    }
    Category::Idle
}
