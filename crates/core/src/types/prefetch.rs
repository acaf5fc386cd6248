//! Prefetch trigger sources, entry statuses and attempt outcomes

use crate::errors::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Opaque key/value annotations attached to a prefetch entry
pub type Meta = BTreeMap<String, String>;

/// Why a prefetch was requested.
///
/// Admission control uses the source to decide how strict to be: high-intent
/// sources survive a slow link, background sources are the first to go.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PrefetchSource {
    /// Pointer hovering over a link
    Hover,
    /// Navigation in progress
    Nav,
    /// Link scrolled into the viewport
    Viewport,
    /// Background warming while the host is idle
    Idle,
    /// Keyboard focus on a link
    Keyboard,
}

impl PrefetchSource {
    pub const ALL: [PrefetchSource; 5] = [
        PrefetchSource::Hover,
        PrefetchSource::Nav,
        PrefetchSource::Viewport,
        PrefetchSource::Idle,
        PrefetchSource::Keyboard,
    ];

    /// Sources that signal a user is about to use the resource
    pub fn is_high_intent(self) -> bool {
        matches!(self, PrefetchSource::Hover | PrefetchSource::Keyboard)
    }

    /// Speculative sources with no direct user gesture behind them
    pub fn is_background(self) -> bool {
        matches!(self, PrefetchSource::Viewport | PrefetchSource::Idle)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            PrefetchSource::Hover => "hover",
            PrefetchSource::Nav => "nav",
            PrefetchSource::Viewport => "viewport",
            PrefetchSource::Idle => "idle",
            PrefetchSource::Keyboard => "keyboard",
        }
    }
}

impl fmt::Display for PrefetchSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PrefetchSource {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "hover" => Ok(PrefetchSource::Hover),
            "nav" => Ok(PrefetchSource::Nav),
            "viewport" => Ok(PrefetchSource::Viewport),
            "idle" => Ok(PrefetchSource::Idle),
            "keyboard" => Ok(PrefetchSource::Keyboard),
            other => Err(Error::configuration(format!(
                "unknown prefetch source '{other}'"
            ))),
        }
    }
}

/// Lifecycle state of a tracked prefetch entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PrefetchStatus {
    Pending,
    Completed,
    Error,
    Aborted,
    Skipped,
    /// A fresh completed entry satisfied a later request
    Reused,
}

impl PrefetchStatus {
    /// Statuses an attempt may be finalized into
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            PrefetchStatus::Completed
                | PrefetchStatus::Error
                | PrefetchStatus::Aborted
                | PrefetchStatus::Skipped
        )
    }

    /// Statuses whose resource is loaded and may satisfy a later request
    pub fn is_loaded(self) -> bool {
        matches!(self, PrefetchStatus::Completed | PrefetchStatus::Reused)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            PrefetchStatus::Pending => "pending",
            PrefetchStatus::Completed => "completed",
            PrefetchStatus::Error => "error",
            PrefetchStatus::Aborted => "aborted",
            PrefetchStatus::Skipped => "skipped",
            PrefetchStatus::Reused => "reused",
        }
    }
}

impl fmt::Display for PrefetchStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Final result of one `prefetch` call, delivered through its handle
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", content = "reason", rename_all = "lowercase")]
pub enum PrefetchOutcome {
    /// The producer finished successfully
    Completed,
    /// The producer failed for a reason other than cancellation
    Failed(String),
    /// Cancellation was observed before the producer settled
    Aborted(String),
    /// Admission control denied the attempt
    Skipped,
    /// A fresh entry satisfied the request without running the producer
    Reused,
}

impl PrefetchOutcome {
    /// The entry status this outcome is recorded as
    pub fn status(&self) -> PrefetchStatus {
        match self {
            PrefetchOutcome::Completed => PrefetchStatus::Completed,
            PrefetchOutcome::Failed(_) => PrefetchStatus::Error,
            PrefetchOutcome::Aborted(_) => PrefetchStatus::Aborted,
            PrefetchOutcome::Skipped => PrefetchStatus::Skipped,
            PrefetchOutcome::Reused => PrefetchStatus::Reused,
        }
    }

    /// Failure description, if any
    pub fn reason(&self) -> Option<&str> {
        match self {
            PrefetchOutcome::Failed(reason) | PrefetchOutcome::Aborted(reason) => Some(reason),
            _ => None,
        }
    }

    /// True when the resource is available after this outcome
    pub fn is_loaded(&self) -> bool {
        matches!(self, PrefetchOutcome::Completed | PrefetchOutcome::Reused)
    }
}
