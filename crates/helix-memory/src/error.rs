//! Error types for memory operations.

/// Errors returned by the memory store and vector index.
#[derive(Debug, thiserror::Error)]
pub enum MemoryError {
    /// IO error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    /// Serialization error.
    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
    /// A record embedding did not match the index dimension.
    #[error("embedding dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },
    /// A record embedding was empty.
    #[error("empty embedding for record {0}")]
    EmptyEmbedding(uuid::Uuid),
}
