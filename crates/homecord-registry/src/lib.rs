//! Host platform seam for the homecord relay
//!
//! The relay consumes the smart-home platform through the traits in this
//! crate: the entity directory (registry rows), the live value lookup, and
//! the change feed. `MemoryDirectory` implements the whole seam in memory
//! for tests and for embedders that drive the relay directly.

pub mod entry;
pub mod feed;
pub mod memory;
pub mod traits;

pub use entry::EntityEntry;
pub use feed::ChangeFeed;
pub use memory::MemoryDirectory;
pub use traits::{EntityDirectory, StateLookup};
