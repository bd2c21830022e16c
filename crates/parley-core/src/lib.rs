//! Domain layer for Parley.
//!
//! Holds the conversation session model, persona slot resolution, the
//! normalized backend envelope types, configuration, and the shared error
//! taxonomy. Nothing in this crate performs I/O beyond reading the config file.

pub mod config;
pub mod envelope;
pub mod error;
pub mod persona;
pub mod session;

// Re-export common error type
pub use error::{ParleyError, RejectReason, Result};
