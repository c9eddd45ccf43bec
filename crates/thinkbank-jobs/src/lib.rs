//! # thinkbank-jobs
//!
//! In-process topic queue and the two-stage ingestion pipeline built on it.
//!
//! - [`TopicQueue`]: bounded, drop-on-full, competing-consumer topics with a
//!   configurable [`FaultPolicy`] and an explicit drain on shutdown.
//! - [`IngestionPipeline`]: the Normalize and Embed stages.
//! - [`UploadService`]: the producer that starts files through the pipeline.

pub mod fetch;
pub mod handler;
pub mod pipeline;
pub mod queue;
pub mod upload;

pub use fetch::SourceFetcher;
pub use handler::{FnHandler, Message, MessageHandler};
pub use pipeline::{
    date_sub_path, storage_name, EmbedStage, IngestionPipeline, NormalizeStage, NormalizedAsset,
    PipelineConfig,
};
pub use queue::{
    FaultPolicy, PublishOutcome, QueueConfig, QueueEvent, TopicQueue, TopicStats,
};
pub use upload::{UploadFile, UploadService, UploadedAsset};

// Re-export core types
pub use thinkbank_core::*;
