//! Shared construction context.

use std::path::PathBuf;

use crate::clock::Clock;
use crate::paths::Paths;

/// Everything a component needs to find its durable state and tell time.
///
/// Passed explicitly to every component constructor; there is no
/// process-global configuration.
#[derive(Debug, Clone, Default)]
pub struct Context {
    /// Filesystem layout under the base path.
    pub paths: Paths,
    /// Injectable time source.
    pub clock: Clock,
}

impl Context {
    /// Context over `base` with the system clock.
    #[must_use]
    pub fn new(base: impl Into<PathBuf>) -> Self {
        Self {
            paths: Paths::new(base),
            clock: Clock::System,
        }
    }

    /// Context over `base` with an explicit clock.
    #[must_use]
    pub fn with_clock(base: impl Into<PathBuf>, clock: Clock) -> Self {
        Self {
            paths: Paths::new(base),
            clock,
        }
    }
}
