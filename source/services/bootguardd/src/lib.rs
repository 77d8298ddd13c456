#![forbid(unsafe_code)]
// Copyright 2026 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0
//
//! CONTEXT: bootguardd host daemon – probation loop, file-backed state and A/B slot control
//! OWNERS: @runtime
//! STATUS: Functional
//! API_STABILITY: Unstable
//! TEST_COVERAGE: Unit tests per module + tests/bootguard_host
//!
//! PUBLIC API: service_main_loop(), run_probation(), report_status(), acknowledge(), set_pending()
//! DEPENDS_ON: bootguard domain library

pub mod config;
pub mod file_store;
pub mod probe;
pub mod slots;
mod std_server;

pub use config::DaemonConfig;
pub use file_store::FileStore;
pub use probe::{Clock, FlagProbe, MonotonicClock, Probe};
pub use slots::{Slot, SlotBootloader, SlotRecord};
pub use std_server::*;
