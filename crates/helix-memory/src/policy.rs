//! Eviction policy for bounded session memory.

/// Policy controlling how many records a session may retain.
#[derive(Debug, Clone, Copy)]
pub struct EvictionPolicy {
    /// Maximum records kept per session; the oldest are dropped first.
    pub max_items: usize,
}

impl EvictionPolicy {
    /// Build a policy with an explicit per-session bound.
    pub fn with_max_items(max_items: usize) -> Self {
        Self { max_items }
    }
}

impl Default for EvictionPolicy {
    /// Default bound matching the accepted memory contract.
    fn default() -> Self {
        Self { max_items: 100 }
    }
}
