//! # thinkbank-core
//!
//! Core types, traits, and abstractions for thinkbank.
//!
//! This crate provides the foundational data structures and trait definitions
//! that the other thinkbank crates depend on.

pub mod defaults;
pub mod error;
pub mod file_types;
pub mod logging;
pub mod models;
pub mod traits;

// Re-export commonly used types at crate root
pub use error::{Error, Result};
pub use file_types::{classify_extension, classify_file_name, file_extension, is_image_extension};
pub use models::*;
pub use traits::*;
