//! Live entity values as read from the host platform

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// State string reported for entities that have no recorded value
pub const STATE_UNKNOWN: &str = "unknown";

/// The value of one entity at a point in time
///
/// Carries the state string, any associated attributes, and the change
/// timestamp. The owning entity is identified by the lookup key, not
/// stored here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityState {
    /// The state value (e.g., "on", "21.5", "unavailable")
    pub state: String,

    /// Additional attributes associated with the value
    #[serde(default)]
    pub attributes: HashMap<String, serde_json::Value>,

    /// When the value last changed
    pub last_changed: DateTime<Utc>,
}

impl EntityState {
    /// Create a new value with the current timestamp and no attributes
    pub fn new(state: impl Into<String>) -> Self {
        Self {
            state: state.into(),
            attributes: HashMap::new(),
            last_changed: Utc::now(),
        }
    }

    /// Attach attributes to the value
    pub fn with_attributes(mut self, attributes: HashMap<String, serde_json::Value>) -> Self {
        self.attributes = attributes;
        self
    }

    /// Check if the value represents an unavailable entity
    pub fn is_unavailable(&self) -> bool {
        self.state == "unavailable"
    }
}
