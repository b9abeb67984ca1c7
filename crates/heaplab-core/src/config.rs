//! Sandbox configuration.
//!
//! The write-poisoning policy can be set via the `HEAPLAB_WRITE_POLICY`
//! environment variable:
//! - `permissive` (default): a write into a range that still holds poison
//!   bytes is flagged in the event log but proceeds and reports success.
//! - `strict`: such a write is aborted before any byte is stored and
//!   reports failure.

use std::sync::OnceLock;

use crate::heap::strategy::FitStrategy;

/// Policy for writes whose destination range still contains poison bytes.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WritePolicy {
    /// Flag the garbage in the event log, perform the write, report success.
    #[default]
    Permissive,
    /// Abort the write before storing any byte and report failure.
    Strict,
}

impl WritePolicy {
    /// Parse from string (case-insensitive).
    #[must_use]
    pub fn from_str_loose(s: &str) -> Self {
        match s.to_ascii_lowercase().as_str() {
            "strict" | "deny" | "abort" => Self::Strict,
            "permissive" | "default" | "allow" => Self::Permissive,
            _ => Self::Permissive,
        }
    }

    /// Returns true if a poisoned destination should abort the write.
    #[must_use]
    pub const fn rejects_garbage(self) -> bool {
        matches!(self, Self::Strict)
    }
}

static ENV_WRITE_POLICY: OnceLock<Option<WritePolicy>> = OnceLock::new();

/// Write policy from the environment, if set (reads the env var on first
/// call, caches thereafter).
#[must_use]
pub fn env_write_policy() -> Option<WritePolicy> {
    *ENV_WRITE_POLICY.get_or_init(|| {
        std::env::var("HEAPLAB_WRITE_POLICY")
            .ok()
            .map(|v| WritePolicy::from_str_loose(&v))
    })
}

/// Startup configuration for a [`crate::MemorySandbox`].
///
/// The heap region itself is supplied separately by the caller; the config
/// only carries policy knobs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SandboxConfig {
    /// Fit strategy used by the default `malloc(size)` form.
    pub strategy: FitStrategy,
    /// Behavior of writes into still-poisoned destination ranges.
    pub write_policy: WritePolicy,
}

impl Default for SandboxConfig {
    fn default() -> Self {
        Self {
            strategy: FitStrategy::First,
            write_policy: env_write_policy().unwrap_or_default(),
        }
    }
}
