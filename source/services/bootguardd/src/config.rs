// Copyright 2026 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0
//
//! CONTEXT: TOML configuration for bootguardd
//! OWNERS: @runtime
//! STATUS: Functional
//! API_STABILITY: Unstable
//! TEST_COVERAGE: 4 unit tests
//!
//! Every field is optional; missing fields fall back to the firmware defaults.
//!
//! ```toml
//! max_boot_attempts = 3
//! stability_ms = 60000
//! probation_ms = 300000
//! degraded_restart_delay_ms = 2000
//! poll_interval_ms = 1000
//! state_dir = "/var/lib/bootguard"
//! link_flag = "/run/bootguard/link-up"
//! service_flag = "/run/bootguard/service-up"
//! ```

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use bootguard::GuardConfig;
use serde::Deserialize;

use crate::Error;

pub const DEFAULT_STATE_DIR: &str = "/var/lib/bootguard";
pub const DEFAULT_LINK_FLAG: &str = "/run/bootguard/link-up";
pub const DEFAULT_SERVICE_FLAG: &str = "/run/bootguard/service-up";
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(1000);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DaemonConfig {
    pub guard: GuardConfig,
    pub poll_interval: Duration,
    pub state_dir: PathBuf,
    pub link_flag: PathBuf,
    pub service_flag: PathBuf,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            guard: GuardConfig::default(),
            poll_interval: DEFAULT_POLL_INTERVAL,
            state_dir: PathBuf::from(DEFAULT_STATE_DIR),
            link_flag: PathBuf::from(DEFAULT_LINK_FLAG),
            service_flag: PathBuf::from(DEFAULT_SERVICE_FLAG),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawConfig {
    max_boot_attempts: Option<u32>,
    stability_ms: Option<u64>,
    probation_ms: Option<u64>,
    degraded_restart_delay_ms: Option<u64>,
    poll_interval_ms: Option<u64>,
    state_dir: Option<PathBuf>,
    link_flag: Option<PathBuf>,
    service_flag: Option<PathBuf>,
}

impl DaemonConfig {
    /// Loads `path` when given, otherwise returns the defaults.
    pub fn load(path: Option<&Path>) -> Result<Self, Error> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let data = fs::read_to_string(path).map_err(|source| Error::ReadConfig {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&data, path)
    }

    /// Parses TOML text; `origin` is only used in error messages.
    pub fn parse(data: &str, origin: &Path) -> Result<Self, Error> {
        let raw: RawConfig = toml::from_str(data).map_err(|source| Error::ParseConfig {
            path: origin.to_path_buf(),
            source,
        })?;
        let defaults = Self::default();
        let guard = GuardConfig {
            max_boot_attempts: raw
                .max_boot_attempts
                .unwrap_or(defaults.guard.max_boot_attempts),
            stability: raw
                .stability_ms
                .map(Duration::from_millis)
                .unwrap_or(defaults.guard.stability),
            probation: raw
                .probation_ms
                .map(Duration::from_millis)
                .unwrap_or(defaults.guard.probation),
            degraded_restart_delay: raw
                .degraded_restart_delay_ms
                .map(Duration::from_millis)
                .unwrap_or(defaults.guard.degraded_restart_delay),
        };
        guard.validate()?;
        Ok(Self {
            guard,
            poll_interval: raw
                .poll_interval_ms
                .map(Duration::from_millis)
                .unwrap_or(defaults.poll_interval),
            state_dir: raw.state_dir.unwrap_or(defaults.state_dir),
            link_flag: raw.link_flag.unwrap_or(defaults.link_flag),
            service_flag: raw.service_flag.unwrap_or(defaults.service_flag),
        })
    }
}
