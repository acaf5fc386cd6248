//! Configuration management for warmup
//!
//! This crate loads the prefetch subsystem's settings from defaults and the
//! environment, and exposes a builder for settings chosen in code.

pub mod config;
pub mod loader;


pub use config::*;
pub use loader::*;
