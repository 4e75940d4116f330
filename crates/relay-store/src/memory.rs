use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use relay_domain::{DataKind, VersionedData, VersionedItem};
use tokio::sync::{broadcast, RwLock};

use crate::error::StoreError;
use crate::state::{ChangeNotification, Dataset, Item};
use crate::store::DataStore;

const NOTIFICATION_CHANNEL_CAPACITY: usize = 1024;

#[derive(Debug, Default)]
struct Inner {
    flags: HashMap<String, VersionedItem<Item>>,
    segments: HashMap<String, VersionedItem<Item>>,
    initialized: bool,
}

impl Inner {
    fn map(&self, kind: DataKind) -> &HashMap<String, VersionedItem<Item>> {
        match kind {
            DataKind::Flags => &self.flags,
            DataKind::Segments => &self.segments,
        }
    }

    fn map_mut(&mut self, kind: DataKind) -> &mut HashMap<String, VersionedItem<Item>> {
        match kind {
            DataKind::Flags => &mut self.flags,
            DataKind::Segments => &mut self.segments,
        }
    }
}

/// Reference implementation of [`DataStore`]: a single reader-preferring
/// lock guards both key spaces. All data is lost on process exit — an
/// external collaborator may swap in a Redis/Consul/DynamoDB-backed type
/// behind the same trait.
#[derive(Clone)]
pub struct InMemoryStore {
    inner: Arc<RwLock<Inner>>,
    notifications: broadcast::Sender<ChangeNotification>,
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryStore {
    pub fn new() -> Self {
        let (notifications, _) = broadcast::channel(NOTIFICATION_CHANNEL_CAPACITY);
        Self { inner: Arc::new(RwLock::new(Inner::default())), notifications }
    }
}

#[async_trait]
impl DataStore for InMemoryStore {
    async fn init(&self, dataset: Dataset) -> Result<(), StoreError> {
        let mut guard = self.inner.write().await;
        guard.flags = dataset
            .flags
            .into_iter()
            .map(|(k, f)| (k, VersionedItem::present(f.version(), Item::Flag(f))))
            .collect();
        guard.segments = dataset
            .segments
            .into_iter()
            .map(|(k, s)| (k, VersionedItem::present(s.version(), Item::Segment(s))))
            .collect();
        guard.initialized = true;
        Ok(())
    }

    async fn get(&self, kind: DataKind, key: &str) -> Result<Option<Item>, StoreError> {
        let guard = self.inner.read().await;
        Ok(guard.map(kind).get(key).and_then(|v| v.item.clone()))
    }

    async fn all(&self, kind: DataKind) -> Result<HashMap<String, Item>, StoreError> {
        let guard = self.inner.read().await;
        Ok(guard
            .map(kind)
            .iter()
            .filter_map(|(k, v)| v.item.clone().map(|item| (k.clone(), item)))
            .collect())
    }

    async fn upsert(&self, item: Item) -> Result<bool, StoreError> {
        let kind = item.kind();
        let key = item.key().to_string();
        let version = item.version();

        let committed = {
            let mut guard = self.inner.write().await;
            let map = guard.map_mut(kind);
            let superseded = match map.get(&key) {
                Some(existing) => version > existing.version,
                None => true,
            };
            if superseded {
                map.insert(key.clone(), VersionedItem::present(version, item.clone()));
            }
            superseded
        };

        if committed {
            let _ = self.notifications.send(ChangeNotification { kind, key, item: Some(item), version });
        }
        Ok(committed)
    }

    async fn delete(&self, kind: DataKind, key: &str, version: u64) -> Result<bool, StoreError> {
        let committed = {
            let mut guard = self.inner.write().await;
            let map = guard.map_mut(kind);
            let superseded = match map.get(key) {
                Some(existing) => version > existing.version,
                None => true,
            };
            if superseded {
                map.insert(key.to_string(), VersionedItem::tombstone(version));
            }
            superseded
        };

        if committed {
            let _ = self.notifications.send(ChangeNotification { kind, key: key.to_string(), item: None, version });
        }
        Ok(committed)
    }

    async fn initialized(&self) -> bool {
        self.inner.read().await.initialized
    }

    fn subscribe(&self) -> broadcast::Receiver<ChangeNotification> {
        self.notifications.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use relay_domain::{Flag, VariationOrRollout};
    use serde_json::Value;

    fn flag(key: &str, version: u64) -> Flag {
        Flag {
            key: key.to_string(),
            version,
            on: true,
            variations: vec![Value::Bool(true)],
            targets: vec![],
            rules: vec![],
            fallthrough: VariationOrRollout { variation: Some(0), rollout: None },
            off_variation: Some(0),
            prerequisites: vec![],
            salt: String::new(),
            client_side_availability: Default::default(),
            track_events: false,
            track_events_fallthrough: false,
            debug_events_until_date: None,
            deleted: false,
        }
    }

    #[tokio::test]
    async fn upsert_rejects_stale_version() {
        let store = InMemoryStore::new();
        assert!(store.upsert(Item::Flag(flag("f", 2))).await.unwrap());
        assert!(!store.upsert(Item::Flag(flag("f", 1))).await.unwrap());
        let got = store.get(DataKind::Flags, "f").await.unwrap().unwrap();
        assert_eq!(got.version(), 2);
    }

    #[tokio::test]
    async fn delete_then_lower_version_upsert_stays_absent() {
        let store = InMemoryStore::new();
        store.upsert(Item::Flag(flag("foo", 5))).await.unwrap();

        assert!(!store.delete(DataKind::Flags, "foo", 3).await.unwrap());
        assert!(store.get(DataKind::Flags, "foo").await.unwrap().is_some());

        assert!(store.delete(DataKind::Flags, "foo", 6).await.unwrap());
        assert!(store.get(DataKind::Flags, "foo").await.unwrap().is_none());

        assert!(!store.upsert(Item::Flag(flag("foo", 6))).await.unwrap());
        assert!(store.get(DataKind::Flags, "foo").await.unwrap().is_none());

        assert!(store.upsert(Item::Flag(flag("foo", 7))).await.unwrap());
        assert!(store.get(DataKind::Flags, "foo").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn delete_of_absent_key_still_writes_tombstone() {
        let store = InMemoryStore::new();
        assert!(store.delete(DataKind::Flags, "never-existed", 1).await.unwrap());
        // A subsequent add at or below that version is rejected.
        assert!(!store.upsert(Item::Flag(flag("never-existed", 1))).await.unwrap());
        assert!(store.upsert(Item::Flag(flag("never-existed", 2))).await.unwrap());
    }

    #[tokio::test]
    async fn all_omits_tombstones() {
        let store = InMemoryStore::new();
        store.upsert(Item::Flag(flag("a", 1))).await.unwrap();
        store.upsert(Item::Flag(flag("b", 1))).await.unwrap();
        store.delete(DataKind::Flags, "b", 2).await.unwrap();

        let all = store.all(DataKind::Flags).await.unwrap();
        assert_eq!(all.len(), 1);
        assert!(all.contains_key("a"));
    }

    #[tokio::test]
    async fn init_replaces_dataset_and_clears_tombstones() {
        let store = InMemoryStore::new();
        store.delete(DataKind::Flags, "a", 99).await.unwrap();

        let mut dataset = Dataset::default();
        dataset.flags.insert("a".into(), flag("a", 1));
        store.init(dataset).await.unwrap();

        assert!(store.initialized().await);
        assert!(store.get(DataKind::Flags, "a").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn subscribers_see_effective_mutations_only() {
        let store = InMemoryStore::new();
        let mut rx = store.subscribe();

        store.upsert(Item::Flag(flag("a", 1))).await.unwrap();
        store.upsert(Item::Flag(flag("a", 1))).await.unwrap(); // stale, no notification

        let note = rx.try_recv().expect("one notification for the effective upsert");
        assert_eq!(note.key, "a");
        assert!(rx.try_recv().is_err());
    }
}
