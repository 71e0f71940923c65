//! Building wire records from registry entries and live values

use futures::future::join_all;
use homecord_core::{EntityRecord, EntityState, STATE_UNKNOWN};
use homecord_registry::{EntityDirectory, EntityEntry, StateLookup};
use tracing::warn;

use crate::snapshot::{encode_snapshot, SnapshotFetcher};

/// Assemble a record from a registry entry and the live value read now
///
/// Entities with no recorded value report the state "unknown".
pub fn build_record(entry: &EntityEntry, state: Option<&EntityState>) -> EntityRecord {
    EntityRecord {
        entity_id: entry.entity_id.clone(),
        original_name: entry.display_name().to_string(),
        platform: entry.platform.clone(),
        entity_category: entry.entity_category,
        state: state
            .map(|s| s.state.clone())
            .unwrap_or_else(|| STATE_UNKNOWN.to_string()),
        snapshot: None,
        kind: entry.kind,
    }
}

/// Attach a snapshot to camera and image records, when one can be fetched
///
/// Fetch failures leave the record without a snapshot; a delivery never
/// fails on account of a missing image.
pub async fn decorate(
    fetcher: Option<&SnapshotFetcher>,
    mut record: EntityRecord,
) -> EntityRecord {
    let fetcher = match fetcher {
        Some(fetcher) if record.kind.has_snapshot() => fetcher,
        _ => return record,
    };

    match fetcher.fetch(&record.entity_id).await {
        Ok(bytes) => record.snapshot = Some(encode_snapshot(&bytes)),
        Err(error) => {
            warn!(
                entity_id = %record.entity_id,
                error = %error,
                "Snapshot unavailable, sending record without it"
            );
        }
    }
    record
}

/// Check an entry against the configured allowlist
///
/// An empty allowlist admits every entity. Matching is exact, against
/// the display name or the full entity ID.
pub fn allowlisted(entry: &EntityEntry, allowlist: &[String]) -> bool {
    allowlist.is_empty()
        || allowlist
            .iter()
            .any(|name| name == entry.display_name() || name == entry.entity_id.as_str())
}

/// Query every entity of a device, apply the allowlist, and decorate
///
/// Snapshot fetches run concurrently, but the returned set is complete
/// and in registry order before the caller sends anything.
pub async fn device_records(
    directory: &dyn EntityDirectory,
    states: &dyn StateLookup,
    fetcher: Option<&SnapshotFetcher>,
    device_id: &str,
    allowlist: &[String],
) -> Vec<EntityRecord> {
    let entries = directory.entries_for_device(device_id).await;

    let mut records = Vec::with_capacity(entries.len());
    for entry in entries.iter().filter(|e| allowlisted(e, allowlist)) {
        let state = states.state_of(&entry.entity_id).await;
        records.push(build_record(entry, state.as_ref()));
    }

    join_all(records.into_iter().map(|record| decorate(fetcher, record))).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use homecord_core::EntityId;
    use homecord_registry::MemoryDirectory;

    fn id(s: &str) -> EntityId {
        s.parse().unwrap()
    }

    #[test]
    fn test_build_record_reads_value_or_unknown() {
        let entry = EntityEntry::new(id("sensor.temperature"), "demo").with_name("Temperature");

        let with_value = build_record(&entry, Some(&EntityState::new("21.5")));
        assert_eq!(with_value.state, "21.5");
        assert_eq!(with_value.original_name, "Temperature");

        let without_value = build_record(&entry, None);
        assert_eq!(without_value.state, STATE_UNKNOWN);
    }

    #[test]
    fn test_build_record_name_falls_back_to_id() {
        let entry = EntityEntry::new(id("sensor.temperature"), "demo");
        let record = build_record(&entry, None);
        assert_eq!(record.original_name, "sensor.temperature");
    }

    #[test]
    fn test_allowlist_matching() {
        let entry = EntityEntry::new(id("camera.front_door"), "demo").with_name("Front Camera");

        assert!(allowlisted(&entry, &[]));
        assert!(allowlisted(&entry, &["Front Camera".to_string()]));
        assert!(allowlisted(&entry, &["camera.front_door".to_string()]));
        assert!(!allowlisted(&entry, &["Front".to_string()]));
        assert!(!allowlisted(&entry, &["Back Camera".to_string()]));
    }

    #[tokio::test]
    async fn test_decorate_without_fetcher_is_a_no_op() {
        let entry = EntityEntry::new(id("camera.front_door"), "demo");
        let record = decorate(None, build_record(&entry, None)).await;
        assert!(record.snapshot.is_none());
    }

    #[tokio::test]
    async fn test_device_records_filters_and_orders() {
        let dir = MemoryDirectory::new();
        dir.add_entry(
            EntityEntry::new(id("sensor.temperature"), "demo")
                .with_name("Temperature")
                .with_device("d1"),
        );
        dir.add_entry(
            EntityEntry::new(id("camera.front_door"), "demo")
                .with_name("Front Camera")
                .with_device("d1"),
        );
        dir.add_entry(EntityEntry::new(id("sensor.elsewhere"), "demo").with_device("d2"));
        dir.set_state(id("sensor.temperature"), EntityState::new("21.5"));

        let all = device_records(&dir, &dir, None, "d1", &[]).await;
        let ids: Vec<&str> = all.iter().map(|r| r.entity_id.as_str()).collect();
        assert_eq!(ids, vec!["sensor.temperature", "camera.front_door"]);
        assert_eq!(all[0].state, "21.5");
        // No value recorded for the camera yet
        assert_eq!(all[1].state, STATE_UNKNOWN);

        let narrowed =
            device_records(&dir, &dir, None, "d1", &["Temperature".to_string()]).await;
        assert_eq!(narrowed.len(), 1);
        assert_eq!(narrowed[0].entity_id.as_str(), "sensor.temperature");
    }
}
