// Copyright 2026 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0
//
//! CONTEXT: Boot-health probation state machine (boot-loop check, stability streak,
//!          probation deadline, validation and rollback)
//! OWNERS: @runtime
//! STATUS: Functional
//! API_STABILITY: Stable (v1.0)
//! TEST_COVERAGE: 10 unit tests + tests/bootguard_host
//!   - crash-loop threshold on initialize
//!   - streak start/reset/validate
//!   - probation timeout classification
//!   - terminal restart is sticky
//!   - validation is idempotent and retried after a failed write
//!
//! Single caller, cooperative polling. The host calls `initialize` once per
//! boot and then `poll` from its main loop. Any `Directive::Restart` is
//! terminal: the host must execute it, and every later call hands back the
//! same command without touching persisted state.

use alloc::string::String;
use core::time::Duration;

use log::{error, info, warn};

use crate::bootloader::Bootloader;
use crate::config::GuardConfig;
use crate::reason::FailureReason;
use crate::store::{decode_u32, encode_u32, keys, StateStore, StoreError};

/// Longest update identifier accepted by `set_pending_update_id`.
pub const MAX_UPDATE_ID_LEN: usize = 255;

/// Monotonic milliseconds since some fixed origin (normally power-on).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(transparent)]
pub struct Millis(pub u64);

impl Millis {
    /// Time from `earlier` to `self`; a reading before `earlier` counts as zero.
    pub fn since(self, earlier: Millis) -> Duration {
        Duration::from_millis(self.0.saturating_sub(earlier.0))
    }
}

impl From<Duration> for Millis {
    fn from(value: Duration) -> Self {
        Millis(u64::try_from(value.as_millis()).unwrap_or(u64::MAX))
    }
}

/// Terminal command: restart the device after `delay`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Restart {
    pub reason: FailureReason,
    /// Whether the bootloader switched to the previous image.
    pub rolled_back: bool,
    pub delay: Duration,
}

/// What the host loop must do after a monitor call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Directive {
    /// Keep running and keep polling.
    Continue,
    /// This call validated the running image. Returned once per boot.
    Validated,
    /// Stop and restart the device.
    Restart(Restart),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Uninitialized,
    Probation,
    Validated,
    RollingBack(Restart),
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GuardError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("monitor polled before initialize")]
    NotInitialized,
    #[error("monitor already initialized for this boot")]
    AlreadyInitialized,
    #[error("rollback already decided for this boot")]
    RollbackPending,
    #[error("update id is {len} bytes, limit is {max}")]
    UpdateIdTooLong { len: usize, max: usize },
}

#[derive(Debug)]
pub struct BootHealthMonitor<S: StateStore, B: Bootloader> {
    store: S,
    bootloader: B,
    config: GuardConfig,
    phase: Phase,
    boot_time: Millis,
    stability_start: Option<Millis>,
    boot_attempt: u32,
}

impl<S: StateStore, B: Bootloader> BootHealthMonitor<S, B> {
    pub fn new(store: S, bootloader: B, config: GuardConfig) -> Self {
        Self {
            store,
            bootloader,
            config,
            phase: Phase::Uninitialized,
            boot_time: Millis(0),
            stability_start: None,
            boot_attempt: 0,
        }
    }

    pub fn config(&self) -> &GuardConfig {
        &self.config
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn is_validated(&self) -> bool {
        self.phase == Phase::Validated
    }

    pub fn stability_started_at(&self) -> Option<Millis> {
        self.stability_start
    }

    /// Boot attempt number recorded by `initialize` (0 before it ran).
    pub fn boot_attempt(&self) -> u32 {
        self.boot_attempt
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn bootloader(&self) -> &B {
        &self.bootloader
    }

    /// Hands back the persisted-state handle and bootloader (used to model a reboot).
    pub fn into_parts(self) -> (S, B) {
        (self.store, self.bootloader)
    }

    /// Counts this boot and rolls back on a crash loop.
    ///
    /// Runs before anything else in the boot so images that die ahead of the
    /// polling phase are still caught.
    pub fn initialize(&mut self, now: Millis) -> Result<Directive, GuardError> {
        match self.phase {
            Phase::Uninitialized => {}
            Phase::RollingBack(restart) => return Ok(Directive::Restart(restart)),
            Phase::Probation | Phase::Validated => return Err(GuardError::AlreadyInitialized),
        }

        let stored = self.read_u32(keys::BOOT_COUNT)?.unwrap_or(0);
        let boots = stored.saturating_add(1);
        self.store.put(keys::BOOT_COUNT, &encode_u32(boots))?;
        self.store.sync()?;
        self.boot_attempt = boots;
        self.boot_time = now;
        self.stability_start = None;
        let limit = self.config.max_boot_attempts;
        info!("bootguard: boot attempt {boots}/{limit}");

        if boots > limit {
            warn!("bootguard: crash loop detected after {boots} unvalidated boots");
            let restart = self.trigger_rollback(FailureReason::CrashLoop);
            return Ok(Directive::Restart(restart));
        }

        self.phase = Phase::Probation;
        Ok(Directive::Continue)
    }

    /// Advances the probation state machine with the current connectivity.
    ///
    /// The probation deadline is checked first and short-circuits the call.
    /// Both signals must hold continuously for longer than the stability window;
    /// any drop discards the running streak.
    pub fn poll(
        &mut self,
        now: Millis,
        link_up: bool,
        service_up: bool,
    ) -> Result<Directive, GuardError> {
        match self.phase {
            Phase::Probation => {}
            Phase::Validated => return Ok(Directive::Continue),
            Phase::RollingBack(restart) => return Ok(Directive::Restart(restart)),
            Phase::Uninitialized => return Err(GuardError::NotInitialized),
        }

        if now.since(self.boot_time) > self.config.probation {
            let reason = FailureReason::classify_timeout(link_up, service_up);
            warn!(
                "bootguard: probation expired after {:?} (link={link_up} service={service_up})",
                self.config.probation
            );
            return Ok(Directive::Restart(self.trigger_rollback(reason)));
        }

        if link_up && service_up {
            let start = match self.stability_start {
                Some(start) => start,
                None => {
                    info!(
                        "bootguard: connectivity established, stability check {:?}",
                        self.config.stability
                    );
                    self.stability_start = Some(now);
                    now
                }
            };
            if now.since(start) > self.config.stability {
                self.validate()?;
                return Ok(Directive::Validated);
            }
        } else if self.stability_start.take().is_some() {
            info!("bootguard: stability streak reset (link={link_up} service={service_up})");
        }

        Ok(Directive::Continue)
    }

    /// Marks the running image good: clears the boot counter and failure record.
    ///
    /// Persisted writes happen before the in-memory flag flips, so a failed
    /// write leaves the monitor in probation and the next poll retries.
    pub fn validate(&mut self) -> Result<(), GuardError> {
        match self.phase {
            Phase::Probation => {}
            Phase::Validated => return Ok(()),
            Phase::RollingBack(_) => return Err(GuardError::RollbackPending),
            Phase::Uninitialized => return Err(GuardError::NotInitialized),
        }

        let cleared = encode_u32(FailureReason::None.code());
        self.store.put(keys::BOOT_COUNT, &encode_u32(0))?;
        self.store.put(keys::LAST_FAIL, &cleared)?;
        self.store.put(keys::FAIL_OTA_ID, b"")?;
        self.store.sync()?;

        self.phase = Phase::Validated;
        self.stability_start = None;
        let attempt = self.boot_attempt;
        info!("bootguard: firmware validated after boot attempt {attempt}");

        if let Err(err) = self.bootloader.mark_valid() {
            warn!("bootguard: bootloader mark-valid failed: {err}");
        }
        Ok(())
    }

    /// Records `reason`, reverts to the previous image when possible and
    /// returns the restart command. Never fails: store and bootloader errors
    /// are logged and the restart is still issued.
    pub fn trigger_rollback(&mut self, reason: FailureReason) -> Restart {
        if let Phase::RollingBack(restart) = self.phase {
            return restart;
        }
        warn!("bootguard: rolling back, reason={reason}");

        let store = &mut self.store;
        if let Err(err) = store.put(keys::LAST_FAIL, &encode_u32(reason.code())) {
            error!("bootguard: failed to record rollback reason: {err}");
        }
        if let Err(err) = store.put(keys::BOOT_COUNT, &encode_u32(0)) {
            error!("bootguard: failed to reset boot counter: {err}");
        }
        if let Err(err) = store.sync() {
            error!("bootguard: failed to flush state before restart: {err}");
        }

        let degraded = Restart {
            reason,
            rolled_back: false,
            delay: self.config.degraded_restart_delay,
        };
        let restart = if self.bootloader.can_rollback() {
            match self.bootloader.rollback() {
                Ok(()) => Restart {
                    reason,
                    rolled_back: true,
                    delay: Duration::ZERO,
                },
                Err(err) => {
                    error!("bootguard: rollback failed: {err}; restarting anyway");
                    degraded
                }
            }
        } else {
            error!("bootguard: no backup image; restarting into current image");
            degraded
        };

        self.phase = Phase::RollingBack(restart);
        self.stability_start = None;
        restart
    }

    /// Last recorded rollback reason; `None` when absent or unreadable.
    pub fn last_failure_reason(&self) -> Result<FailureReason, GuardError> {
        let Some(code) = self.read_u32(keys::LAST_FAIL)? else {
            return Ok(FailureReason::None);
        };
        Ok(FailureReason::from_code(code).unwrap_or_else(|err| {
            warn!("bootguard: {err} in {}, treating as none", keys::LAST_FAIL);
            FailureReason::None
        }))
    }

    /// Update identifier attributed to the last rollback; empty when absent.
    pub fn failed_update_id(&self) -> Result<String, GuardError> {
        let Some(bytes) = self.store.get(keys::FAIL_OTA_ID)? else {
            return Ok(String::new());
        };
        Ok(String::from_utf8(bytes).unwrap_or_else(|_| {
            let key = keys::FAIL_OTA_ID;
            warn!("bootguard: non-UTF-8 {key}, treating as empty");
            String::new()
        }))
    }

    /// Clears the failure record once it has been reported upstream.
    pub fn acknowledge_failure(&mut self) -> Result<(), GuardError> {
        let cleared = encode_u32(FailureReason::None.code());
        self.store.put(keys::LAST_FAIL, &cleared)?;
        self.store.put(keys::FAIL_OTA_ID, b"")?;
        self.store.sync()?;
        Ok(())
    }

    /// Records the identifier of the update about to be applied.
    pub fn set_pending_update_id(&mut self, id: &str) -> Result<(), GuardError> {
        if id.len() > MAX_UPDATE_ID_LEN {
            return Err(GuardError::UpdateIdTooLong {
                len: id.len(),
                max: MAX_UPDATE_ID_LEN,
            });
        }
        self.store.put(keys::FAIL_OTA_ID, id.as_bytes())?;
        self.store.sync()?;
        Ok(())
    }

    /// Persisted boot counter as currently stored.
    pub fn boot_count(&self) -> Result<u32, GuardError> {
        Ok(self.read_u32(keys::BOOT_COUNT)?.unwrap_or(0))
    }

    #[cfg(test)]
    fn store_mut(&mut self) -> &mut S {
        &mut self.store
    }

    fn read_u32(&self, key: &str) -> Result<Option<u32>, StoreError> {
        let Some(bytes) = self.store.get(key)? else {
            return Ok(None);
        };
        match decode_u32(&bytes) {
            Some(value) => Ok(Some(value)),
            None => {
                let len = bytes.len();
                warn!("bootguard: malformed {len}-byte {key}, treating as unset");
                Ok(None)
            }
        }
    }
}
