//! In-memory implementation of the platform seam

use std::sync::RwLock;

use async_trait::async_trait;
use dashmap::DashMap;
use homecord_core::{ChangeEvent, EntityId, EntityState};
use indexmap::IndexMap;
use tracing::debug;

use crate::{ChangeFeed, EntityDirectory, EntityEntry, StateLookup};

/// In-memory entity directory, value store, and change feed
///
/// Entries preserve insertion order so whole-device queries are
/// deterministic. Setting a value stores it and publishes a change on the
/// feed, mirroring how the host platform surfaces state changes.
pub struct MemoryDirectory {
    /// Primary index: entity_id -> entry, insertion-ordered
    entries: RwLock<IndexMap<String, EntityEntry>>,
    /// Live values keyed by entity_id string
    states: DashMap<String, EntityState>,
    /// Feed notified on every set_state
    feed: ChangeFeed,
}

impl MemoryDirectory {
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(IndexMap::new()),
            states: DashMap::new(),
            feed: ChangeFeed::new(),
        }
    }

    /// The change feed fed by `set_state`
    pub fn feed(&self) -> &ChangeFeed {
        &self.feed
    }

    /// Register or replace an entry
    pub fn add_entry(&self, entry: EntityEntry) {
        if let Ok(mut entries) = self.entries.write() {
            entries.insert(entry.entity_id.to_string(), entry);
        }
    }

    /// Drop an entry, keeping any stored value
    pub fn remove_entry(&self, entity_id: &EntityId) -> Option<EntityEntry> {
        self.entries
            .write()
            .ok()
            .and_then(|mut entries| entries.shift_remove(entity_id.as_str()))
    }

    /// Store a value and publish the change
    pub fn set_state(&self, entity_id: EntityId, state: EntityState) {
        debug!(entity_id = %entity_id, state = %state.state, "Setting entity state");
        self.states.insert(entity_id.to_string(), state);
        self.feed.publish(ChangeEvent::new(entity_id));
    }

    /// Number of registered entries
    pub fn entity_count(&self) -> usize {
        self.entries.read().map(|entries| entries.len()).unwrap_or(0)
    }
}

impl Default for MemoryDirectory {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EntityDirectory for MemoryDirectory {
    async fn entry(&self, entity_id: &EntityId) -> Option<EntityEntry> {
        self.entries
            .read()
            .ok()
            .and_then(|entries| entries.get(entity_id.as_str()).cloned())
    }

    async fn entries_for_device(&self, device_id: &str) -> Vec<EntityEntry> {
        self.entries
            .read()
            .map(|entries| {
                entries
                    .values()
                    .filter(|entry| entry.belongs_to(device_id))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }
}

#[async_trait]
impl StateLookup for MemoryDirectory {
    async fn state_of(&self, entity_id: &EntityId) -> Option<EntityState> {
        self.states.get(entity_id.as_str()).map(|state| state.clone())
    }
}
