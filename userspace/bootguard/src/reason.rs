// Copyright 2026 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0
//
//! CONTEXT: Persisted rollback cause codes
//! OWNERS: @runtime
//! STATUS: Functional
//! API_STABILITY: Stable (v1.0)
//! TEST_COVERAGE: 4 unit tests
//!
//! INVARIANT: Code values are persisted under `last_fail` and MUST NOT change.

use alloc::string::{String, ToString};
use core::fmt;
use core::str::FromStr;

/// Why the most recent rollback happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(u32)]
pub enum FailureReason {
    /// No failure recorded.
    #[default]
    None = 0,
    /// Too many consecutive boots without validation.
    CrashLoop = 1,
    /// Primary link never came up within probation.
    LinkTimeout = 2,
    /// Primary link up, secondary service never reached within probation.
    ServiceTimeout = 3,
    /// Both signals reachable but never continuously stable long enough.
    Unstable = 4,
    /// Reserved for images that gate validation on wall-clock sync.
    TimeSyncFailure = 5,
}

/// Persisted code that does not map to a known reason.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("unknown failure reason code {0}")]
pub struct UnknownReason(pub u32);

/// Text that is not the label of any reason.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown failure reason label {0:?}")]
pub struct UnknownLabel(pub String);

impl FailureReason {
    pub const ALL: [FailureReason; 6] = [
        FailureReason::None,
        FailureReason::CrashLoop,
        FailureReason::LinkTimeout,
        FailureReason::ServiceTimeout,
        FailureReason::Unstable,
        FailureReason::TimeSyncFailure,
    ];

    pub fn code(self) -> u32 {
        self as u32
    }

    pub fn from_code(code: u32) -> Result<Self, UnknownReason> {
        Self::ALL
            .iter()
            .copied()
            .find(|reason| reason.code() == code)
            .ok_or(UnknownReason(code))
    }

    pub fn label(self) -> &'static str {
        match self {
            FailureReason::None => "none",
            FailureReason::CrashLoop => "crash-loop",
            FailureReason::LinkTimeout => "link-timeout",
            FailureReason::ServiceTimeout => "service-timeout",
            FailureReason::Unstable => "unstable",
            FailureReason::TimeSyncFailure => "time-sync-failure",
        }
    }

    pub fn is_failure(self) -> bool {
        self != FailureReason::None
    }

    /// Classifies a probation timeout from the signals seen on the expiring poll.
    /// The primary link is checked first because the service depends on it.
    pub fn classify_timeout(link_up: bool, service_up: bool) -> Self {
        if !link_up {
            FailureReason::LinkTimeout
        } else if !service_up {
            FailureReason::ServiceTimeout
        } else {
            FailureReason::Unstable
        }
    }
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for FailureReason {
    type Err = UnknownLabel;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|reason| reason.label() == s)
            .ok_or_else(|| UnknownLabel(s.to_string()))
    }
}
