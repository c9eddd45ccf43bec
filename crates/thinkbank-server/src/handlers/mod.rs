//! HTTP handler modules.

pub mod files;
pub mod search;
pub mod upload;
