use std::collections::HashMap;

use relay_domain::{DataKind, Flag, Segment, VersionedData};
use serde::{Deserialize, Serialize};

/// A flag or a segment, erased to a common type so the store can hold both
/// kinds behind one key space. `kind()` recovers which is which without a
/// downcast.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Item {
    Flag(Flag),
    Segment(Segment),
}

impl Item {
    pub fn kind(&self) -> DataKind {
        match self {
            Item::Flag(_) => DataKind::Flags,
            Item::Segment(_) => DataKind::Segments,
        }
    }
}

impl VersionedData for Item {
    fn key(&self) -> &str {
        match self {
            Item::Flag(f) => f.key(),
            Item::Segment(s) => s.key(),
        }
    }

    fn version(&self) -> u64 {
        match self {
            Item::Flag(f) => f.version(),
            Item::Segment(s) => s.version(),
        }
    }
}

/// The full replacement payload for [`crate::store::DataStore::init`] — the
/// body of an upstream `put` event.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Dataset {
    #[serde(default)]
    pub flags: HashMap<String, Flag>,
    #[serde(default)]
    pub segments: HashMap<String, Segment>,
}

/// Broadcast to every subscriber after a mutation actually changes the
/// store. `item: None` signals a delete (the subscriber should emit an SSE
/// `delete` frame rather than a `patch`); `version` is the version that was
/// just committed, needed by a delete frame's `{path, version}` body.
#[derive(Debug, Clone)]
pub struct ChangeNotification {
    pub kind: DataKind,
    pub key: String,
    pub item: Option<Item>,
    pub version: u64,
}
