//! Portable trace container
//!
//! The on-disk format used to feed recorded kernel events to the filter and
//! to store the filtered result.

pub mod wire;
