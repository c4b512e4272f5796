//! CLI command implementations

pub mod advise;
pub mod predict;
pub mod status;
