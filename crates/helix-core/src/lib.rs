//! Core analysis pipeline: session lifecycle, attachment ingestion,
//! memory retrieval, reasoning orchestration, and streaming output.
//!
//! The entry point is [`HelixEngine`], which owns the session registry,
//! the memory store, and handles to the embedding and reasoning backends.

mod charts;
mod coordinator;
mod engine;
mod error;
mod ingest;
mod retrieval;
mod sessions;

pub use charts::{extract_charts, generate_chart, generate_diagram};
pub use coordinator::{AnalysisCoordinator, AnalysisRequest, AnalysisResult};
pub use engine::{AnalyzeStream, HelixEngine, VectorizeReceipt};
pub use error::HelixCoreError;
pub use ingest::{Attachment, IngestedAttachment, Ingestor};
pub use retrieval::RetrievalOrchestrator;
pub use sessions::{Session, SessionRegistry};
