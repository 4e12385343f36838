//! Configuration schema for the Helix pipeline.

use serde::{Deserialize, Serialize};

/// Root config for the Helix engine.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct HelixConfig {
    #[serde(default, rename = "$schema")]
    pub schema: Option<String>,
    #[serde(default)]
    pub sessions: SessionsConfig,
    #[serde(default)]
    pub memory: MemoryConfig,
    #[serde(default)]
    pub ingest: IngestConfig,
    #[serde(default)]
    pub analyze: AnalyzeConfig,
}

impl HelixConfig {
    /// Start building a config programmatically with defaults applied.
    pub fn builder() -> HelixConfigBuilder {
        HelixConfigBuilder::new()
    }
}

/// Builder for assembling a `HelixConfig` in code.
#[derive(Debug, Default, Clone)]
pub struct HelixConfigBuilder {
    config: HelixConfig,
}

impl HelixConfigBuilder {
    /// Create a new builder seeded with default config values.
    pub fn new() -> Self {
        Self {
            config: HelixConfig::default(),
        }
    }

    /// Replace the session lifecycle configuration.
    pub fn sessions(mut self, sessions: SessionsConfig) -> Self {
        self.config.sessions = sessions;
        self
    }

    /// Replace the memory storage configuration.
    pub fn memory(mut self, memory: MemoryConfig) -> Self {
        self.config.memory = memory;
        self
    }

    /// Replace the ingestion configuration.
    pub fn ingest(mut self, ingest: IngestConfig) -> Self {
        self.config.ingest = ingest;
        self
    }

    /// Replace the analyze operation configuration.
    pub fn analyze(mut self, analyze: AnalyzeConfig) -> Self {
        self.config.analyze = analyze;
        self
    }

    /// Finalize and return the built `HelixConfig`.
    pub fn build(self) -> HelixConfig {
        self.config
    }
}

/// Session lifecycle configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionsConfig {
    /// Hours after which an inactive session expires.
    #[serde(default = "default_expiry_hours")]
    pub expiry_hours: i64,
    /// Interval between periodic expiry sweeps, in seconds.
    #[serde(default = "default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,
}

impl Default for SessionsConfig {
    fn default() -> Self {
        Self {
            expiry_hours: default_expiry_hours(),
            sweep_interval_secs: default_sweep_interval_secs(),
        }
    }
}

fn default_expiry_hours() -> i64 {
    24
}

fn default_sweep_interval_secs() -> u64 {
    300
}

/// Memory storage configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryConfig {
    /// Maximum memory records retained per session.
    #[serde(default = "default_max_items")]
    pub max_items: usize,
    /// Root directory for session memory logs.
    #[serde(default)]
    pub path: Option<String>,
    /// Snapshot file for the vector index.
    #[serde(default)]
    pub index_path: Option<String>,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            max_items: default_max_items(),
            path: None,
            index_path: None,
        }
    }
}

fn default_max_items() -> usize {
    100
}

/// Attachment ingestion configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestConfig {
    /// Upload size ceiling in bytes.
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: usize,
    /// Sliding window size for text chunking, in characters.
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    /// Overlap carried between adjacent chunks, in characters.
    #[serde(default = "default_chunk_overlap")]
    pub chunk_overlap: usize,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            max_upload_bytes: default_max_upload_bytes(),
            chunk_size: default_chunk_size(),
            chunk_overlap: default_chunk_overlap(),
        }
    }
}

fn default_max_upload_bytes() -> usize {
    50 * 1024 * 1024
}

fn default_chunk_size() -> usize {
    2000
}

fn default_chunk_overlap() -> usize {
    200
}

/// Analyze operation configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalyzeConfig {
    /// End-to-end ceiling for one analyze call, in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Number of memory records retrieved as context.
    #[serde(default = "default_retrieval_k")]
    pub retrieval_k: usize,
    /// Characters kept when building record previews.
    #[serde(default = "default_preview_chars")]
    pub preview_chars: usize,
}

impl Default for AnalyzeConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
            retrieval_k: default_retrieval_k(),
            preview_chars: default_preview_chars(),
        }
    }
}

fn default_timeout_secs() -> u64 {
    120
}

fn default_retrieval_k() -> usize {
    5
}

fn default_preview_chars() -> usize {
    200
}

#[cfg(test)]
mod tests {
    use super::{HelixConfig, MemoryConfig, SessionsConfig};
    use pretty_assertions::assert_eq;

    #[test]
    fn defaults_match_the_documented_contract() {
        let config = HelixConfig::default();
        assert_eq!(config.sessions.expiry_hours, 24);
        assert_eq!(config.memory.max_items, 100);
        assert_eq!(config.ingest.max_upload_bytes, 50 * 1024 * 1024);
        assert_eq!(config.ingest.chunk_size, 2000);
        assert_eq!(config.analyze.timeout_secs, 120);
        assert_eq!(config.analyze.retrieval_k, 5);
    }

    #[test]
    fn builder_replaces_sections() {
        let config = HelixConfig::builder()
            .sessions(SessionsConfig {
                expiry_hours: 1,
                sweep_interval_secs: 10,
            })
            .memory(MemoryConfig {
                max_items: 3,
                ..MemoryConfig::default()
            })
            .build();
        assert_eq!(config.sessions.expiry_hours, 1);
        assert_eq!(config.memory.max_items, 3);
        assert_eq!(config.analyze.retrieval_k, 5);
    }

    #[test]
    fn partial_json_fills_defaults() {
        let config: HelixConfig =
            serde_json::from_str(r#"{ "memory": { "max_items": 7 } }"#).expect("config");
        assert_eq!(config.memory.max_items, 7);
        assert_eq!(config.sessions.expiry_hours, 24);
    }
}
