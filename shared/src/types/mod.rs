//! Core type definitions

pub mod events;
pub mod guid;
pub mod providers;
