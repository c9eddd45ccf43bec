//! # thinkbank-search
//!
//! Hybrid search over media assets.
//!
//! This crate provides:
//! - Weighted score fusion of lexical and vector candidates ([`fuse_scores`])
//! - Text search that fuses both rankers and hydrates the results
//! - Image search by vector similarity
//!
//! ## Example
//!
//! ```ignore
//! use thinkbank_search::{HybridSearchEngine, SearchRequest};
//!
//! let engine = HybridSearchEngine::new(index, assets, inference, tmp_storage);
//!
//! // Default hybrid search (top 10, alpha 0.5)
//! let results = engine.search("dog on a beach", 10, 0.5).await?;
//!
//! // Lexical-weighted search
//! let results = SearchRequest::new("receipt 2024")
//!     .with_alpha(0.8)
//!     .with_top_k(20)
//!     .execute(&engine)
//!     .await?;
//! ```

pub mod fusion;
pub mod hybrid;

// Re-export core types
pub use thinkbank_core::*;

pub use fusion::{fuse_scores, similarities};
pub use hybrid::{HybridSearchConfig, HybridSearchEngine, SearchRequest};
