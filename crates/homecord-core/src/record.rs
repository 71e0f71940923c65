//! The wire-facing entity record delivered to the bot endpoint

use serde::{Deserialize, Serialize};

use crate::{EntityId, EntityKind, STATE_UNKNOWN};

/// Category of an entity in the platform registry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityCategory {
    /// Configuration entity (e.g., a settings toggle)
    Config,
    /// Diagnostic entity (e.g., signal strength)
    Diagnostic,
}

/// One entity as presented to the bot
///
/// Built fresh from the registry entry and the live value for every
/// delivery, never cached between deliveries. The `snapshot` field is
/// omitted from JSON when no image was attached.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityRecord {
    /// Full entity ID
    pub entity_id: EntityId,

    /// Display name; falls back to the entity ID text when the registry
    /// has none
    pub original_name: String,

    /// Integration that provides the entity
    pub platform: String,

    /// Registry category, when set
    pub entity_category: Option<EntityCategory>,

    /// Current state string, "unknown" when the platform has no value
    pub state: String,

    /// Base64-encoded snapshot for camera and image entities
    #[serde(skip_serializing_if = "Option::is_none")]
    pub snapshot: Option<String>,

    /// Kind resolved from the entity ID; not part of the wire format
    #[serde(skip)]
    pub kind: EntityKind,
}

impl EntityRecord {
    /// Create a record with unknown state and no snapshot
    pub fn new(
        entity_id: EntityId,
        original_name: impl Into<String>,
        platform: impl Into<String>,
    ) -> Self {
        let kind = entity_id.kind();
        Self {
            entity_id,
            original_name: original_name.into(),
            platform: platform.into(),
            entity_category: None,
            state: STATE_UNKNOWN.to_string(),
            snapshot: None,
            kind,
        }
    }

    /// Set the state string
    pub fn with_state(mut self, state: impl Into<String>) -> Self {
        self.state = state.into();
        self
    }

    /// Set the registry category
    pub fn with_category(mut self, category: Option<EntityCategory>) -> Self {
        self.entity_category = category;
        self
    }

    /// Attach a base64-encoded snapshot
    pub fn with_snapshot(mut self, snapshot: impl Into<String>) -> Self {
        self.snapshot = Some(snapshot.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(id: &str) -> EntityRecord {
        EntityRecord::new(id.parse().unwrap(), "Some Entity", "demo")
    }

    #[test]
    fn test_new_defaults() {
        let rec = record("camera.front_door");
        assert_eq!(rec.state, STATE_UNKNOWN);
        assert_eq!(rec.kind, EntityKind::Camera);
        assert!(rec.snapshot.is_none());
        assert!(rec.entity_category.is_none());
    }

    #[test]
    fn test_json_shape_without_snapshot() {
        let rec = record("sensor.temperature").with_state("21.5");
        let value = serde_json::to_value(&rec).unwrap();
        assert_eq!(
            value,
            json!({
                "entity_id": "sensor.temperature",
                "original_name": "Some Entity",
                "platform": "demo",
                "entity_category": null,
                "state": "21.5",
            })
        );
    }

    #[test]
    fn test_json_shape_with_snapshot() {
        let rec = record("camera.front_door")
            .with_state("idle")
            .with_snapshot("aGVsbG8=");
        let value = serde_json::to_value(&rec).unwrap();
        assert_eq!(value["snapshot"], json!("aGVsbG8="));
        // kind never appears on the wire
        assert!(value.get("kind").is_none());
    }

    #[test]
    fn test_category_casing() {
        let rec = record("sensor.rssi").with_category(Some(EntityCategory::Diagnostic));
        let value = serde_json::to_value(&rec).unwrap();
        assert_eq!(value["entity_category"], json!("diagnostic"));
    }
}
