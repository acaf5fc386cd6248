//! Core domain types for the prefetch subsystem.
//!
//! - **`newtypes`**: validated identifiers such as `ResourceKey`
//! - **`prefetch`**: trigger sources, entry statuses and attempt outcomes

pub mod newtypes;
pub mod prefetch;

pub use newtypes::*;
pub use prefetch::*;
