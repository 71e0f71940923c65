//! Entity ID type representing a domain.object_id pair, plus the kind
//! classification derived from the domain

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Error type for invalid entity IDs
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum EntityIdError {
    #[error("entity_id must contain exactly one '.' separator")]
    InvalidFormat,

    #[error("entity_id has an empty domain or object_id part")]
    EmptyPart,

    #[error(
        "entity_id contains invalid characters (parts must be lowercase alphanumeric with underscores, not starting or ending with underscore)"
    )]
    InvalidChars,
}

/// A platform entity ID such as `camera.front_door`
///
/// Entity IDs consist of a domain and an object_id separated by a period.
/// The full string is stored once together with the separator position, so
/// `as_str` and serialization never allocate.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct EntityId {
    text: String,
    dot: usize,
}

impl EntityId {
    /// Validate and wrap a full `domain.object_id` string
    pub fn new(s: impl Into<String>) -> Result<Self, EntityIdError> {
        let text = s.into();
        let dot = text.find('.').ok_or(EntityIdError::InvalidFormat)?;
        if text[dot + 1..].contains('.') {
            return Err(EntityIdError::InvalidFormat);
        }
        if dot == 0 || dot + 1 == text.len() {
            return Err(EntityIdError::EmptyPart);
        }
        if !is_valid_part(&text[..dot]) || !is_valid_part(&text[dot + 1..]) {
            return Err(EntityIdError::InvalidChars);
        }
        Ok(Self { text, dot })
    }

    /// Get the domain part of the entity ID
    pub fn domain(&self) -> &str {
        &self.text[..self.dot]
    }

    /// Get the object_id part of the entity ID
    pub fn object_id(&self) -> &str {
        &self.text[self.dot + 1..]
    }

    /// The full `domain.object_id` string
    pub fn as_str(&self) -> &str {
        &self.text
    }

    /// Classify this entity by its domain
    pub fn kind(&self) -> EntityKind {
        EntityKind::from_domain(self.domain())
    }
}

/// Check one side of the separator: lowercase alphanumeric + underscore,
/// cannot start or end with underscore
fn is_valid_part(s: &str) -> bool {
    if s.starts_with('_') || s.ends_with('_') {
        return false;
    }
    s.chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
}

impl FromStr for EntityId {
    type Err = EntityIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for EntityId {
    type Error = EntityIdError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::new(s)
    }
}

impl From<EntityId> for String {
    fn from(id: EntityId) -> String {
        id.text
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

/// Classification of an entity, resolved once from its domain when the
/// entity is read out of the registry
///
/// Whether an entity carries a snapshot is answered here, not by string
/// probing at use sites.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Sensor,
    Camera,
    Image,
    #[default]
    Other,
}

impl EntityKind {
    /// Classify a domain string
    pub fn from_domain(domain: &str) -> Self {
        match domain {
            "sensor" => Self::Sensor,
            "camera" => Self::Camera,
            "image" => Self::Image,
            _ => Self::Other,
        }
    }

    /// Whether entities of this kind expose a snapshot proxy endpoint
    pub fn has_snapshot(&self) -> bool {
        matches!(self, Self::Camera | Self::Image)
    }
}
