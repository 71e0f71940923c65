//! Registry rows as the relay sees them

use homecord_core::{EntityCategory, EntityId, EntityKind};

/// A registered entity, trimmed to the fields the relay reads
///
/// The kind is resolved from the entity ID once, when the entry is
/// created, so downstream code never probes the ID text.
#[derive(Debug, Clone, PartialEq)]
pub struct EntityEntry {
    /// Full entity ID
    pub entity_id: EntityId,
    /// Platform default name, when the integration provided one
    pub original_name: Option<String>,
    /// Integration that provides this entity
    pub platform: String,
    /// Registry category (config, diagnostic, or none)
    pub entity_category: Option<EntityCategory>,
    /// Parent device ID
    pub device_id: Option<String>,
    /// Kind resolved from the entity ID
    pub kind: EntityKind,
}

impl EntityEntry {
    /// Create an entry with no name, category, or device link
    pub fn new(entity_id: EntityId, platform: impl Into<String>) -> Self {
        let kind = entity_id.kind();
        Self {
            entity_id,
            original_name: None,
            platform: platform.into(),
            entity_category: None,
            device_id: None,
            kind,
        }
    }

    /// Set the platform default name
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.original_name = Some(name.into());
        self
    }

    /// Link the entry to a device
    pub fn with_device(mut self, device_id: impl Into<String>) -> Self {
        self.device_id = Some(device_id.into());
        self
    }

    /// Set the registry category
    pub fn with_category(mut self, category: EntityCategory) -> Self {
        self.entity_category = Some(category);
        self
    }

    /// Name shown to the bot; falls back to the entity ID text when the
    /// registry has none
    pub fn display_name(&self) -> &str {
        self.original_name
            .as_deref()
            .unwrap_or_else(|| self.entity_id.as_str())
    }

    /// Check if the entry belongs to the given device
    pub fn belongs_to(&self, device_id: &str) -> bool {
        self.device_id.as_deref() == Some(device_id)
    }
}
