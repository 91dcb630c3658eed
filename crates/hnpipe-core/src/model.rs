//! Item model shared by every stage of the pipeline

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::SourceError;

/// Identifier of one remote item.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ItemId(pub u64);

impl std::fmt::Display for ItemId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for ItemId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

/// Discriminated item type. Anything that is not a story or a job is `Other`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemKind {
    Story,
    Job,
    #[default]
    #[serde(other)]
    Other,
}

impl ItemKind {
    /// Parse CLI/storage string into enum
    pub fn from_name(s: &str) -> Option<Self> {
        match s {
            "story" => Some(Self::Story),
            "job" => Some(Self::Job),
            "other" => Some(Self::Other),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Story => "story",
            Self::Job => "job",
            Self::Other => "other",
        }
    }
}

impl std::fmt::Display for ItemKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A fetched item. Never mutated after the Source hands it out.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Item {
    pub id: ItemId,
    pub kind: ItemKind,
    pub text: String,
    pub url: String,
    pub score: i64,
    pub title: String,
    pub created_at: DateTime<Utc>,
    pub created_by: String,
    pub dead: bool,
    pub deleted: bool,
}

impl Item {
    /// Minimal live item, mostly useful for fixtures.
    pub fn new(id: impl Into<ItemId>, kind: ItemKind) -> Self {
        Self {
            id: id.into(),
            kind,
            text: String::new(),
            url: String::new(),
            score: 0,
            title: String::new(),
            created_at: DateTime::<Utc>::UNIX_EPOCH,
            created_by: String::new(),
            dead: false,
            deleted: false,
        }
    }

    /// Placeholder for an id the Source no longer knows about.
    pub fn tombstone(id: ItemId) -> Self {
        Self {
            deleted: true,
            ..Self::new(id, ItemKind::Other)
        }
    }

    /// Dead and deleted items are skipped, never persisted.
    pub fn is_live(&self) -> bool {
        !self.dead && !self.deleted
    }
}

/// Outcome of fetching one identifier. Exactly one side is populated.
#[derive(Debug)]
pub enum FetchResult {
    Fetched(Item),
    Failed { id: ItemId, error: SourceError },
}

impl FetchResult {
    pub fn id(&self) -> ItemId {
        match self {
            Self::Fetched(item) => item.id,
            Self::Failed { id, .. } => *id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_from_name() {
        assert_eq!(ItemKind::from_name("story"), Some(ItemKind::Story));
        assert_eq!(ItemKind::from_name("job"), Some(ItemKind::Job));
        assert_eq!(ItemKind::from_name("other"), Some(ItemKind::Other));
        assert_eq!(ItemKind::from_name("Story"), None);
        assert_eq!(ItemKind::from_name(""), None);
    }

    #[test]
    fn unknown_kind_decodes_as_other() {
        let kind: ItemKind = serde_json::from_str("\"comment\"").unwrap();
        assert_eq!(kind, ItemKind::Other);
        let kind: ItemKind = serde_json::from_str("\"job\"").unwrap();
        assert_eq!(kind, ItemKind::Job);
    }

    #[test]
    fn item_id_is_transparent() {
        assert_eq!(serde_json::to_string(&ItemId(42)).unwrap(), "42");
        let id: ItemId = serde_json::from_str("7").unwrap();
        assert_eq!(id, ItemId(7));
    }

    #[test]
    fn liveness_flags() {
        let mut item = Item::new(1, ItemKind::Story);
        assert!(item.is_live());
        item.dead = true;
        assert!(!item.is_live());
        item.dead = false;
        item.deleted = true;
        assert!(!item.is_live());
    }

    #[test]
    fn tombstone_is_filtered() {
        let item = Item::tombstone(ItemId(9));
        assert_eq!(item.id, ItemId(9));
        assert!(!item.is_live());
    }

    #[test]
    fn fetch_result_id() {
        let ok = FetchResult::Fetched(Item::new(3, ItemKind::Job));
        assert_eq!(ok.id(), ItemId(3));
        let err = FetchResult::Failed {
            id: ItemId(4),
            error: SourceError::Decode("bad".into()),
        };
        assert_eq!(err.id(), ItemId(4));
    }
}
