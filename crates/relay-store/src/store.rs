use std::collections::HashMap;

use async_trait::async_trait;
use relay_domain::DataKind;
use tokio::sync::broadcast;

use crate::error::StoreError;
use crate::state::{ChangeNotification, Dataset, Item};

/// The versioned, per-environment data store described in the evaluator's
/// `§ Versioned data store` section. One instance backs one environment.
///
/// Implementations never resurrect a key at a version the store has already
/// observed being deleted or superseded — see [`InMemoryStore`][crate::InMemoryStore]
/// for the reference semantics.
#[async_trait]
pub trait DataStore: Send + Sync + 'static {
    /// Atomically replace the entire dataset, mark the store initialized,
    /// and clear all tombstones.
    async fn init(&self, dataset: Dataset) -> Result<(), StoreError>;

    async fn get(&self, kind: DataKind, key: &str) -> Result<Option<Item>, StoreError>;

    /// All live (non-tombstoned) items of one kind.
    async fn all(&self, kind: DataKind) -> Result<HashMap<String, Item>, StoreError>;

    /// Returns `true` iff `item.version()` exceeded the stored version (or
    /// the key was absent), in which case the write took effect.
    async fn upsert(&self, item: Item) -> Result<bool, StoreError>;

    /// Returns `true` iff `version` exceeded the stored version, in which
    /// case a tombstone was written (unconditionally — even if the key
    /// was never present).
    async fn delete(&self, kind: DataKind, key: &str, version: u64) -> Result<bool, StoreError>;

    async fn initialized(&self) -> bool;

    /// Subscribe to effective mutations, delivered in commit order.
    fn subscribe(&self) -> broadcast::Receiver<ChangeNotification>;
}
