//! Shared utilities for warmup
//!
//! Logging setup, structured prefetch log events and terminal detection used
//! across the workspace.

pub mod terminal;
pub mod tracing;

pub use terminal::*;
pub use self::tracing::*;
