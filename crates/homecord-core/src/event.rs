//! Change notifications consumed from the host platform

use serde::{Deserialize, Serialize};

use crate::EntityId;

/// Notification that an entity's value changed
///
/// Carries only the identity. The current value is read from the platform
/// at processing time, never taken from the event itself.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeEvent {
    pub entity_id: EntityId,
}

impl ChangeEvent {
    pub fn new(entity_id: EntityId) -> Self {
        Self { entity_id }
    }
}
