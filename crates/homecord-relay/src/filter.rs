//! Deciding whether a change notification becomes a delivery

use std::sync::Arc;

use homecord_core::{ChangeEvent, EntityRecord};
use homecord_registry::{EntityDirectory, StateLookup};
use tracing::debug;

use crate::records::{build_record, decorate};
use crate::snapshot::SnapshotFetcher;

/// Outcome of filtering one change notification
#[derive(Debug, Clone, PartialEq)]
pub enum Decision {
    /// Deliver exactly these records
    Emit(Vec<EntityRecord>),
    /// Not our device, or no longer registered; deliver nothing
    Suppress,
}

/// Filters change notifications down to deliveries for one target device
pub struct ChangeFilter {
    directory: Arc<dyn EntityDirectory>,
    states: Arc<dyn StateLookup>,
    device_id: String,
}

impl ChangeFilter {
    pub fn new(
        directory: Arc<dyn EntityDirectory>,
        states: Arc<dyn StateLookup>,
        device_id: impl Into<String>,
    ) -> Self {
        Self {
            directory,
            states,
            device_id: device_id.into(),
        }
    }

    /// Decide what one change notification becomes
    ///
    /// Emitted records carry the entity's value as read now, not the value
    /// at notification time. The whole-device allowlist does not apply
    /// here; any changed entity of the target device is emitted.
    pub async fn decide(
        &self,
        event: &ChangeEvent,
        fetcher: Option<&SnapshotFetcher>,
    ) -> Decision {
        let entry = match self.directory.entry(&event.entity_id).await {
            Some(entry) => entry,
            None => {
                // The registry lost the entity between notification and
                // lookup; stale notifications are dropped, not errors
                debug!(entity_id = %event.entity_id, "Change for unregistered entity, suppressing");
                return Decision::Suppress;
            }
        };

        if !entry.belongs_to(&self.device_id) {
            return Decision::Suppress;
        }

        let state = self.states.state_of(&entry.entity_id).await;
        let record = decorate(fetcher, build_record(&entry, state.as_ref())).await;
        Decision::Emit(vec![record])
    }
}
