//! Session memory storage for Helix: the vector index and the per-session
//! chronological record log.

pub mod error;
pub mod index;
pub mod model;
pub mod policy;
pub mod store;

/// Memory error type.
pub use error::MemoryError;
/// Vector index and search types.
pub use index::{IndexStats, SearchHit, VectorIndex};
/// Memory record model.
pub use model::MemoryRecord;
/// Eviction policy.
pub use policy::EvictionPolicy;
/// Per-session record store.
pub use store::{MemoryStore, SessionMemorySummary};
