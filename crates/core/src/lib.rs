//! Core domain types, errors, and constants for `warmup`.
//!
//! ## Key Components
//!
//! - **`errors`**: the primary `Error` enum and `Result` alias shared by every
//!   crate in the workspace.
//! - **`types`**: newtype wrappers and enums (`ResourceKey`, `PrefetchSource`,
//!   `PrefetchStatus`, `PrefetchOutcome`) that enforce invariants at the type level.
//! - **`constants`**: environment variable names, default TTL and admission thresholds.

pub mod constants;
pub mod errors;
pub mod types;

pub use self::{
    constants::*,
    errors::{Error, Result, ResultExt},
    types::*,
};
