// Copyright 2026 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0
//
//! CONTEXT: Connectivity probes and monotonic clock for the host probation loop
//! OWNERS: @runtime
//! STATUS: Functional
//! API_STABILITY: Unstable
//! TEST_COVERAGE: 1 unit test

use std::path::{Path, PathBuf};
use std::time::Instant;

use bootguard::Millis;

/// Reports whether one required connectivity signal currently holds.
pub trait Probe {
    fn is_up(&self) -> bool;
}

/// Signal is up while its flag file exists. The network stack touches and
/// removes the flag; this daemon only reads it.
#[derive(Debug, Clone)]
pub struct FlagProbe {
    path: PathBuf,
}

impl FlagProbe {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Probe for FlagProbe {
    fn is_up(&self) -> bool {
        self.path.exists()
    }
}

/// Monotonic time source.
pub trait Clock {
    fn now(&self) -> Millis;
}

/// Milliseconds since the daemon started; one daemon start is one boot.
#[derive(Debug, Clone, Copy)]
pub struct MonotonicClock {
    origin: Instant,
}

impl MonotonicClock {
    pub fn start() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Clock for MonotonicClock {
    fn now(&self) -> Millis {
        Millis::from(self.origin.elapsed())
    }
}
