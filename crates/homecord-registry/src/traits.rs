//! Read-only views of the host platform consumed by the relay

use async_trait::async_trait;
use homecord_core::{EntityId, EntityState};

use crate::EntityEntry;

/// Read access to the platform's entity registry
///
/// Lookups reflect the registry as it is right now. A change notification
/// may outlive its entry (the entity can be unregistered in between), so
/// `entry` returning `None` for a just-notified entity is a normal case,
/// not a fault.
#[async_trait]
pub trait EntityDirectory: Send + Sync {
    /// Look up one entity's registry entry
    async fn entry(&self, entity_id: &EntityId) -> Option<EntityEntry>;

    /// All entities owned by a device, in registry order
    async fn entries_for_device(&self, device_id: &str) -> Vec<EntityEntry>;
}

/// Read access to the platform's live entity values
#[async_trait]
pub trait StateLookup: Send + Sync {
    /// Current value of an entity, if the platform has one
    async fn state_of(&self, entity_id: &EntityId) -> Option<EntityState>;
}
