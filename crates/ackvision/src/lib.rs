//! AckVision HTTP service
//!
//! The router and configuration live in the library so integration tests
//! can drive them without binding a socket.

pub mod api;
pub mod config;
