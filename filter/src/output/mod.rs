//! Output generation for filter runs

pub mod json;
