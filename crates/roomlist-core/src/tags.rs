use std::fmt;

use serde::{Deserialize, Serialize};

/// How a tag's list is ordered.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ListOrder {
    /// By category, then most recent qualifying event.
    Recent,
    /// By the user-assigned `order` key, then display name.
    Manual,
}

/// Identifier of one room list.
///
/// Well-known lists are closed variants; user tags land in [`TagId::Custom`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum TagId {
    ServerNotice,
    Invite,
    Favourite,
    Recent,
    Direct,
    LowPriority,
    Archived,
    Custom(String),
}

impl TagId {
    /// Lists every store starts with, in display order.
    pub const DEFAULT_LISTS: [TagId; 7] = [
        TagId::ServerNotice,
        TagId::Invite,
        TagId::Favourite,
        TagId::Recent,
        TagId::Direct,
        TagId::LowPriority,
        TagId::Archived,
    ];

    /// Map a tag name from account data to a list identifier.
    pub fn from_name(name: &str) -> Self {
        match name {
            "m.server_notice" => Self::ServerNotice,
            "im.vector.fake.invite" => Self::Invite,
            "m.favourite" => Self::Favourite,
            "im.vector.fake.recent" => Self::Recent,
            "im.vector.fake.direct" => Self::Direct,
            "m.lowpriority" => Self::LowPriority,
            "im.vector.fake.archived" => Self::Archived,
            other => Self::Custom(other.to_owned()),
        }
    }

    /// Tag name as stored in account data.
    pub fn as_str(&self) -> &str {
        match self {
            Self::ServerNotice => "m.server_notice",
            Self::Invite => "im.vector.fake.invite",
            Self::Favourite => "m.favourite",
            Self::Recent => "im.vector.fake.recent",
            Self::Direct => "im.vector.fake.direct",
            Self::LowPriority => "m.lowpriority",
            Self::Archived => "im.vector.fake.archived",
            Self::Custom(name) => name,
        }
    }

    /// Ordering used by this tag's list.
    pub fn list_order(&self) -> ListOrder {
        match self {
            Self::Invite | Self::Recent | Self::Direct | Self::LowPriority | Self::Archived => {
                ListOrder::Recent
            }
            Self::Favourite | Self::ServerNotice | Self::Custom(_) => ListOrder::Manual,
        }
    }

    /// Whether a room may be placed in this list from its own `m.tag` data.
    ///
    /// Well-known lists always qualify; custom tags only when enabled and never
    /// for unknown `m.` names.
    pub fn admits_room_tag(&self, custom_tags_enabled: bool) -> bool {
        match self {
            Self::Custom(name) => custom_tags_enabled && !name.starts_with("m."),
            Self::Invite | Self::Recent | Self::Direct | Self::Archived => false,
            _ => true,
        }
    }
}

impl fmt::Display for TagId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<String> for TagId {
    fn from(value: String) -> Self {
        Self::from_name(&value)
    }
}

impl From<TagId> for String {
    fn from(value: TagId) -> Self {
        match value {
            TagId::Custom(name) => name,
            other => other.as_str().to_owned(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn well_known_names_round_trip() {
        for tag in TagId::DEFAULT_LISTS {
            assert_eq!(TagId::from_name(tag.as_str()), tag);
        }
        assert_eq!(
            TagId::from_name("u.work"),
            TagId::Custom("u.work".to_owned())
        );
    }

    #[test]
    fn list_orders_match_tag_kind() {
        assert_eq!(TagId::Favourite.list_order(), ListOrder::Manual);
        assert_eq!(TagId::LowPriority.list_order(), ListOrder::Recent);
        assert_eq!(TagId::Custom("u.x".into()).list_order(), ListOrder::Manual);
    }

    #[test]
    fn custom_tags_need_the_feature_and_a_non_spec_namespace() {
        let custom = TagId::Custom("u.work".into());
        assert!(!custom.admits_room_tag(false));
        assert!(custom.admits_room_tag(true));
        assert!(!TagId::Custom("m.unknown".into()).admits_room_tag(true));
        assert!(TagId::Favourite.admits_room_tag(false));
        assert!(!TagId::Recent.admits_room_tag(true));
    }
}
