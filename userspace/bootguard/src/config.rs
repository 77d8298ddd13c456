// Copyright 2026 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0
//
//! CONTEXT: Thresholds and durations for the probation window
//! OWNERS: @runtime
//! STATUS: Functional
//! API_STABILITY: Stable (v1.0)
//! TEST_COVERAGE: 2 unit tests

use core::time::Duration;

/// Probation tuning. Injected so tests can run on a fast clock.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GuardConfig {
    /// Consecutive unvalidated boots tolerated before a crash-loop rollback.
    pub max_boot_attempts: u32,
    /// Continuous connectivity required to validate.
    pub stability: Duration,
    /// Total time after boot allowed to reach validation.
    pub probation: Duration,
    /// Pause before restarting when no backup image exists.
    pub degraded_restart_delay: Duration,
}

impl Default for GuardConfig {
    fn default() -> Self {
        Self {
            max_boot_attempts: 3,
            stability: Duration::from_secs(60),
            probation: Duration::from_secs(300),
            degraded_restart_delay: Duration::from_secs(2),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("max_boot_attempts must be at least 1")]
    ZeroBootAttempts,
    #[error("stability window ({stability:?}) must be shorter than probation ({probation:?})")]
    StabilityExceedsProbation {
        stability: Duration,
        probation: Duration,
    },
}

impl GuardConfig {
    /// Rejects configurations under which validation could never happen.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_boot_attempts == 0 {
            return Err(ConfigError::ZeroBootAttempts);
        }
        if self.stability >= self.probation {
            return Err(ConfigError::StabilityExceedsProbation {
                stability: self.stability,
                probation: self.probation,
            });
        }
        Ok(())
    }
}
