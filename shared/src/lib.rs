//! Shared types and utilities for tracesieve
//!
//! This crate contains the event model, provider identifiers, header layouts
//! and the portable trace container used by the filter engine and the CLI.

pub mod headers;
pub mod types;
pub mod utils;

#[cfg(feature = "wire-protocol")]
pub mod protocol;

// Re-export commonly used types
pub use types::{events::*, guid::Guid, providers};
