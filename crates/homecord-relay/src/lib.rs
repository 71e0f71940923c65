//! Outbound delivery subsystem relaying entity changes to a chat bot
//!
//! Changes of one device's entities arrive on the change feed, are
//! filtered and decorated (camera and image entities get a base64
//! snapshot), and leave through the delivery channel: a lazily connected
//! streaming session with a one-shot HTTP fallback. Whole-device updates
//! can also be triggered manually or on a periodic interval.

pub mod channel;
pub mod config;
pub mod dispatcher;
pub mod filter;
pub mod payload;
pub mod records;
pub mod snapshot;

pub use channel::{ChannelState, DeliveryChannel, DeliveryError, DeliveryOutcome};
pub use config::{ConfigError, RelayConfig};
pub use dispatcher::{Dispatcher, DispatcherError};
pub use filter::{ChangeFilter, Decision};
pub use payload::{StreamEnvelope, UpdatePayload};
pub use snapshot::{encode_snapshot, SnapshotError, SnapshotFetcher};
