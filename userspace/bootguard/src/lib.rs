// Copyright 2026 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0
//
//! CONTEXT: Boot-health watchdog and automatic rollback controller for A/B images
//! OWNERS: @runtime
//! STATUS: Functional
//! API_STABILITY: Stable (v1.0)
//! TEST_COVERAGE: Unit tests per module + integration tests (via tests/bootguard_host)
//!   - boot-loop detection and crash-attempt threshold
//!   - stability streak start/reset/validation
//!   - probation timeout classification
//!   - failure record persistence across simulated reboots
//!
//! PUBLIC API:
//!   - BootHealthMonitor: probation state machine (initialize/poll/validate/rollback)
//!   - Directive/Restart: terminal commands executed by the host loop
//!   - FailureReason: persisted rollback cause
//!   - StateStore/MemStore: persisted-state seam
//!   - Bootloader: A/B rollback capability seam
//!   - GuardConfig: thresholds and durations
//!
//! DEPENDENCIES:
//!   - log: event logging
//!   - thiserror: error types

#![forbid(unsafe_code)]
#![cfg_attr(not(feature = "std"), no_std)]

extern crate alloc;

#[cfg(all(not(feature = "std"), not(feature = "os-lite")))]
compile_error!("Either 'std' or 'os-lite' feature must be enabled");

pub mod bootloader;
pub mod config;
pub mod monitor;
pub mod reason;
pub mod store;

pub use bootloader::{Bootloader, BootloaderError, NoBackup};
pub use config::{ConfigError, GuardConfig};
pub use monitor::{BootHealthMonitor, Directive, GuardError, Millis, Phase, Restart};
pub use reason::{FailureReason, UnknownLabel, UnknownReason};
pub use store::{keys, MemStore, StateStore, StoreError};
