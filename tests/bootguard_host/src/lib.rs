// Copyright 2026 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0
//
//! CONTEXT: Host integration test fixtures for the boot-health monitor and bootguardd
//! OWNERS: @runtime
//! STATUS: Experimental
//! API_STABILITY: Stable
//! TEST_COVERAGE: Fixtures only (tests live in tests/)

use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::time::Duration;

use bootguard::{
    BootHealthMonitor, Bootloader, BootloaderError, GuardConfig, MemStore, Millis, StateStore,
    StoreError,
};
use bootguardd::{Clock, Probe};

/// Ordered log of store and bootloader calls shared between test doubles.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Journal(Rc<RefCell<Vec<String>>>);

impl Journal {
    fn push(&self, entry: impl Into<String>) {
        self.0.borrow_mut().push(entry.into());
    }

    pub fn entries(&self) -> Vec<String> {
        self.0.borrow().clone()
    }

    pub fn clear(&self) {
        self.0.borrow_mut().clear();
    }
}

/// In-memory store that journals every write and flush.
#[derive(Debug)]
pub struct JournaledStore {
    inner: MemStore,
    journal: Journal,
}

impl JournaledStore {
    pub fn new(journal: Journal) -> Self {
        Self {
            inner: MemStore::new(),
            journal,
        }
    }

    pub fn inner(&self) -> &MemStore {
        &self.inner
    }
}

impl StateStore for JournaledStore {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        self.inner.get(key)
    }

    fn put(&mut self, key: &str, value: &[u8]) -> Result<(), StoreError> {
        self.inner.put(key, value)?;
        self.journal.push(format!("put {key}"));
        Ok(())
    }

    fn sync(&mut self) -> Result<(), StoreError> {
        self.inner.sync()?;
        self.journal.push("sync");
        Ok(())
    }
}

/// Bootloader double that counts calls.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScriptedBootloader {
    pub backup: bool,
    pub rollbacks: u32,
    pub marked_valid: u32,
    journal: Option<Journal>,
}

impl ScriptedBootloader {
    pub fn with_backup() -> Self {
        Self {
            backup: true,
            ..Self::default()
        }
    }

    /// Backup available; every call is also written to `journal`.
    pub fn with_journal(journal: Journal) -> Self {
        Self {
            journal: Some(journal),
            ..Self::with_backup()
        }
    }

    fn record(&self, entry: &str) {
        if let Some(journal) = &self.journal {
            journal.push(entry);
        }
    }
}

impl Bootloader for ScriptedBootloader {
    fn can_rollback(&self) -> bool {
        self.backup
    }

    fn rollback(&mut self) -> Result<(), BootloaderError> {
        if !self.backup {
            return Err(BootloaderError::NoRollbackTarget);
        }
        self.rollbacks += 1;
        self.record("rollback");
        Ok(())
    }

    fn mark_valid(&mut self) -> Result<(), BootloaderError> {
        self.marked_valid += 1;
        self.record("mark_valid");
        Ok(())
    }
}

/// Firmware defaults: 3 attempts, 60 s stability, 300 s probation, 2 s degraded delay.
pub fn firmware_config() -> GuardConfig {
    GuardConfig::default()
}

pub fn fast_config(max_boot_attempts: u32, stability_ms: u64, probation_ms: u64) -> GuardConfig {
    GuardConfig {
        max_boot_attempts,
        stability: Duration::from_millis(stability_ms),
        probation: Duration::from_millis(probation_ms),
        degraded_restart_delay: Duration::ZERO,
    }
}

pub fn fresh_monitor(config: GuardConfig) -> BootHealthMonitor<MemStore, ScriptedBootloader> {
    BootHealthMonitor::new(MemStore::new(), ScriptedBootloader::with_backup(), config)
}

/// Drops all in-memory state and keeps what survives a power cycle.
pub fn reboot<S: StateStore, B: Bootloader>(
    monitor: BootHealthMonitor<S, B>,
) -> BootHealthMonitor<S, B> {
    let config = *monitor.config();
    let (store, bootloader) = monitor.into_parts();
    BootHealthMonitor::new(store, bootloader, config)
}

/// Clock that advances by a fixed step on every reading.
#[derive(Debug)]
pub struct SteppingClock {
    next: Cell<u64>,
    step: u64,
}

impl SteppingClock {
    pub fn new(start: u64, step: u64) -> Self {
        Self {
            next: Cell::new(start),
            step,
        }
    }
}

impl Clock for SteppingClock {
    fn now(&self) -> Millis {
        let now = self.next.get();
        self.next.set(now.saturating_add(self.step));
        Millis(now)
    }
}

/// Probe with a fixed answer.
#[derive(Debug, Clone, Copy)]
pub struct Fixed(pub bool);

impl Probe for Fixed {
    fn is_up(&self) -> bool {
        self.0
    }
}

/// Probe that reports up only after `after` readings.
#[derive(Debug)]
pub struct UpAfter {
    remaining: Cell<u32>,
}

impl UpAfter {
    pub fn new(after: u32) -> Self {
        Self {
            remaining: Cell::new(after),
        }
    }
}

impl Probe for UpAfter {
    fn is_up(&self) -> bool {
        match self.remaining.get() {
            0 => true,
            n => {
                self.remaining.set(n - 1);
                false
            }
        }
    }
}
