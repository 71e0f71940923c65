//! Core types shared across the homecord relay: entity identifiers and
//! their kinds, live values, change notifications, and the wire-facing
//! entity record.

pub mod entity_id;
pub mod event;
pub mod record;
pub mod state;

pub use entity_id::{EntityId, EntityIdError, EntityKind};
pub use event::ChangeEvent;
pub use record::{EntityCategory, EntityRecord};
pub use state::{EntityState, STATE_UNKNOWN};
