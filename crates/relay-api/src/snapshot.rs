use std::collections::HashMap;

use relay_domain::{DataKind, Flag, Segment};
use relay_eval::{FlagSource, SegmentSource};
use relay_store::{DataStore, Item};

use crate::error::ApiError;

/// A point-in-time copy of one environment's flags and segments, synchronous
/// once built so it can back [`relay_eval::evaluate`]'s synchronous
/// `FlagSource`. Built fresh for every evaluation request; the store itself
/// stays the source of truth.
pub struct StoreSnapshot {
    flags: HashMap<String, Flag>,
    segments: HashMap<String, Segment>,
}

impl StoreSnapshot {
    pub async fn load(store: &dyn DataStore) -> Result<StoreSnapshot, ApiError> {
        let flags = store
            .all(DataKind::Flags)
            .await?
            .into_iter()
            .filter_map(|(k, item)| match item {
                Item::Flag(f) => Some((k, f)),
                Item::Segment(_) => None,
            })
            .collect();
        let segments = store
            .all(DataKind::Segments)
            .await?
            .into_iter()
            .filter_map(|(k, item)| match item {
                Item::Segment(s) => Some((k, s)),
                Item::Flag(_) => None,
            })
            .collect();
        Ok(StoreSnapshot { flags, segments })
    }

    pub fn flags(&self) -> &HashMap<String, Flag> {
        &self.flags
    }
}

impl SegmentSource for StoreSnapshot {
    fn segment(&self, key: &str) -> Option<Segment> {
        self.segments.get(key).cloned()
    }
}

impl FlagSource for StoreSnapshot {
    fn flag(&self, key: &str) -> Option<Flag> {
        self.flags.get(key).cloned()
    }
}
