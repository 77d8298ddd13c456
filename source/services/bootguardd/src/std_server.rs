// Copyright 2026 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0
//
//! CONTEXT: bootguardd host backend (std) – probation main loop and reporting commands
//! OWNERS: @runtime
//! STATUS: Functional
//! API_STABILITY: Unstable
//! TEST_COVERAGE: tests/bootguard_host/tests/daemon_flow.rs

use std::fmt;
use std::io;
use std::path::PathBuf;
use std::thread;

use bootguard::{
    BootHealthMonitor, Bootloader, ConfigError, Directive, FailureReason, GuardError, Restart,
    StateStore, StoreError,
};
use log::{error, info};

use crate::config::DaemonConfig;
use crate::file_store::FileStore;
use crate::probe::{Clock, FlagProbe, MonotonicClock, Probe};
use crate::slots::{Slot, SlotBootloader};

/// Result type surfaced by the host daemon.
pub type Result<T> = core::result::Result<T, Error>;

/// Errors emitted by the host daemon.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("failed to read config {path}: {source}")]
    ReadConfig {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to parse config {path}: {source}")]
    ParseConfig {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("invalid config: {0}")]
    Config(#[from] ConfigError),
    #[error("state store: {0}")]
    Store(#[from] StoreError),
    #[error(transparent)]
    Guard(#[from] GuardError),
}

/// Ready notifier invoked once the boot has been counted.
pub struct ReadyNotifier(Box<dyn FnOnce() + Send>);

impl ReadyNotifier {
    /// Creates a notifier from the provided closure.
    pub fn new<F>(func: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        Self(Box::new(func))
    }

    /// Signals readiness to the caller.
    pub fn notify(self) {
        (self.0)();
    }
}

/// How the probation loop ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Exit {
    /// Running image proven good; nothing left to watch this boot.
    Validated,
    /// Device must restart now (restart delay already elapsed).
    Restart(Restart),
}

/// Drives one boot: counts it, then polls until validation or a restart.
///
/// Store failures during polling are logged and retried on the next tick;
/// only the initial boot count is fatal, since without it crash loops go
/// undetected.
pub fn run_probation<S, B, C, L, P>(
    monitor: &mut BootHealthMonitor<S, B>,
    clock: &C,
    link: &L,
    service: &P,
    poll_interval: std::time::Duration,
    notifier: ReadyNotifier,
) -> Result<Exit>
where
    S: StateStore,
    B: Bootloader,
    C: Clock,
    L: Probe,
    P: Probe,
{
    let directive = monitor.initialize(clock.now())?;
    notifier.notify();
    if let Directive::Restart(restart) = directive {
        return Ok(finish(restart));
    }

    loop {
        match monitor.poll(clock.now(), link.is_up(), service.is_up()) {
            Ok(Directive::Continue) => {}
            Ok(Directive::Validated) => return Ok(Exit::Validated),
            Ok(Directive::Restart(restart)) => return Ok(finish(restart)),
            Err(err) => error!("bootguardd: poll failed: {err}"),
        }
        if !poll_interval.is_zero() {
            thread::sleep(poll_interval);
        }
    }
}

fn finish(restart: Restart) -> Exit {
    info!(
        "bootguardd: restart requested (reason={} rolled_back={} delay={:?})",
        restart.reason, restart.rolled_back, restart.delay
    );
    if !restart.delay.is_zero() {
        thread::sleep(restart.delay);
    }
    Exit::Restart(restart)
}

type HostMonitor = BootHealthMonitor<FileStore, SlotBootloader<FileStore>>;

fn open_monitor(config: &DaemonConfig) -> Result<HostMonitor> {
    let store = FileStore::open(&config.state_dir)?;
    let bootloader = SlotBootloader::load(store.clone())?;
    Ok(BootHealthMonitor::new(store, bootloader, config.guard))
}

/// Runs the host daemon for one boot.
pub fn service_main_loop(config: &DaemonConfig, notifier: ReadyNotifier) -> Result<Exit> {
    let mut monitor = open_monitor(config)?;
    info!("bootguardd: state_dir={}", config.state_dir.display());
    if let Some(slot) = monitor.bootloader().active_slot() {
        info!("bootguardd: booted slot {slot}");
    }
    let clock = MonotonicClock::start();
    let link = FlagProbe::new(&config.link_flag);
    let service = FlagProbe::new(&config.service_flag);
    let interval = config.poll_interval;
    run_probation(&mut monitor, &clock, &link, &service, interval, notifier)
}

/// Failure record and counters as seen by the reporting path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Status {
    pub last_failure: FailureReason,
    pub failed_update_id: String,
    pub boot_count: u32,
    /// `None` when the slot record is unreadable.
    pub active_slot: Option<Slot>,
    pub can_rollback: bool,
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "last_failure: {}", self.last_failure)?;
        writeln!(f, "failed_update_id: {}", self.failed_update_id)?;
        writeln!(f, "boot_count: {}", self.boot_count)?;
        match self.active_slot {
            Some(slot) => writeln!(f, "active_slot: {slot}")?,
            None => writeln!(f, "active_slot: unknown")?,
        }
        write!(f, "can_rollback: {}", self.can_rollback)
    }
}

pub fn report_status(config: &DaemonConfig) -> Result<Status> {
    let monitor = open_monitor(config)?;
    Ok(Status {
        last_failure: monitor.last_failure_reason()?,
        failed_update_id: monitor.failed_update_id()?,
        boot_count: monitor.boot_count()?,
        active_slot: monitor.bootloader().active_slot(),
        can_rollback: monitor.bootloader().can_rollback(),
    })
}

/// Clears the failure record after it has been reported upstream.
pub fn acknowledge(config: &DaemonConfig) -> Result<()> {
    let mut monitor = open_monitor(config)?;
    monitor.acknowledge_failure()?;
    info!("bootguardd: failure record acknowledged");
    Ok(())
}

/// Records `update_id` and switches to the standby slot for the next boot.
pub fn set_pending(config: &DaemonConfig, update_id: &str) -> Result<Slot> {
    let mut monitor = open_monitor(config)?;
    monitor.set_pending_update_id(update_id)?;
    let (_, mut bootloader) = monitor.into_parts();
    let slot = bootloader.stage_update()?;
    info!("bootguardd: update {update_id} staged on slot {slot}");
    Ok(slot)
}
