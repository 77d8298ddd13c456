// Copyright 2026 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0
//
//! CONTEXT: Persisted A/B slot record backing the rollback capability on host builds
//! OWNERS: @runtime
//! STATUS: Functional
//! API_STABILITY: Unstable
//! TEST_COVERAGE: 6 unit tests
//!   - stage/rollback/mark-valid flow
//!   - rollback without a previous slot fails
//!   - record survives reopen
//!   - corrupted record rejected by decode
//!   - unreadable record loads with rollback disabled
//!
//! Record format (key `bootctl`, v1): [version, active, previous|0xff, confirmed]
//! with slots encoded A=1, B=2.
//!
//! An unreadable record never blocks the boot: it loads as "no fallback" so the
//! boot is still counted and crash loops still restart the device.

use std::fmt;

use bootguard::{Bootloader, BootloaderError, StateStore, StoreError};
use log::{error, info};

pub const BOOTCTL_KEY: &str = "bootctl";
const BOOTCTL_VERSION: u8 = 1;
const SLOT_NONE: u8 = 0xff;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Slot {
    A,
    B,
}

impl Slot {
    pub fn other(self) -> Self {
        match self {
            Slot::A => Slot::B,
            Slot::B => Slot::A,
        }
    }
}

impl fmt::Display for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Slot::A => "a",
            Slot::B => "b",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlotRecord {
    pub active: Slot,
    /// Known-good image to fall back to, if any.
    pub previous: Option<Slot>,
    /// Whether the active slot has been confirmed by a validation.
    pub confirmed: bool,
}

impl Default for SlotRecord {
    fn default() -> Self {
        Self {
            active: Slot::A,
            previous: None,
            confirmed: true,
        }
    }
}

fn encode_slot(slot: Slot) -> u8 {
    match slot {
        Slot::A => 1,
        Slot::B => 2,
    }
}

fn decode_slot(byte: u8) -> Result<Option<Slot>, StoreError> {
    match byte {
        1 => Ok(Some(Slot::A)),
        2 => Ok(Some(Slot::B)),
        SLOT_NONE => Ok(None),
        _ => Err(corrupted()),
    }
}

fn corrupted() -> StoreError {
    StoreError::Io(format!("{BOOTCTL_KEY}: corrupted slot record"))
}

impl SlotRecord {
    pub fn encode(&self) -> [u8; 4] {
        [
            BOOTCTL_VERSION,
            encode_slot(self.active),
            self.previous.map(encode_slot).unwrap_or(SLOT_NONE),
            u8::from(self.confirmed),
        ]
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, StoreError> {
        if bytes.len() != 4 || bytes[0] != BOOTCTL_VERSION || bytes[3] > 1 {
            return Err(corrupted());
        }
        let active = decode_slot(bytes[1])?.ok_or_else(corrupted)?;
        let previous = decode_slot(bytes[2])?;
        if previous == Some(active) {
            return Err(corrupted());
        }
        Ok(Self {
            active,
            previous,
            confirmed: bytes[3] == 1,
        })
    }
}

/// Bootloader stand-in that flips the active slot in a persisted record.
#[derive(Debug)]
pub struct SlotBootloader<S: StateStore> {
    store: S,
    /// `None` when the persisted record could not be decoded.
    record: Option<SlotRecord>,
}

impl<S: StateStore> SlotBootloader<S> {
    /// Loads the slot record, starting from slot A when none exists yet.
    ///
    /// Only store I/O fails here; an undecodable record is logged and loads
    /// with rollback disabled.
    pub fn load(store: S) -> Result<Self, StoreError> {
        let record = match store.get(BOOTCTL_KEY)? {
            None => Some(SlotRecord::default()),
            Some(bytes) => match SlotRecord::decode(&bytes) {
                Ok(record) => Some(record),
                Err(err) => {
                    error!("bootguardd: {err}; no fallback slot this boot");
                    None
                }
            },
        };
        Ok(Self { store, record })
    }

    pub fn record(&self) -> Option<SlotRecord> {
        self.record
    }

    pub fn active_slot(&self) -> Option<Slot> {
        self.record.map(|record| record.active)
    }

    /// Switches to the standby slot, keeping the current one as the fallback.
    pub fn stage_update(&mut self) -> Result<Slot, StoreError> {
        let current = self.record.ok_or_else(corrupted)?;
        let previous = current.active;
        let next = SlotRecord {
            active: previous.other(),
            previous: Some(previous),
            confirmed: false,
        };
        self.persist(next)?;
        let active = next.active;
        info!("bootguardd: staged slot {active} (fallback {previous})");
        Ok(active)
    }

    fn persist(&mut self, record: SlotRecord) -> Result<(), StoreError> {
        self.store.put(BOOTCTL_KEY, &record.encode())?;
        self.store.sync()?;
        self.record = Some(record);
        Ok(())
    }
}

fn failed(err: StoreError) -> BootloaderError {
    BootloaderError::Failed(err.to_string())
}

impl<S: StateStore> Bootloader for SlotBootloader<S> {
    fn can_rollback(&self) -> bool {
        self.record.and_then(|record| record.previous).is_some()
    }

    fn rollback(&mut self) -> Result<(), BootloaderError> {
        let current = self.record.ok_or(BootloaderError::NoRollbackTarget)?;
        let target = current.previous.ok_or(BootloaderError::NoRollbackTarget)?;
        let next = SlotRecord {
            active: target,
            previous: None,
            confirmed: true,
        };
        self.persist(next).map_err(failed)?;
        let failed_slot = current.active;
        info!("bootguardd: rolled back slot {failed_slot} -> {target}");
        Ok(())
    }

    fn mark_valid(&mut self) -> Result<(), BootloaderError> {
        let Some(current) = self.record else {
            let reason = "slot record unreadable".to_string();
            return Err(BootloaderError::Failed(reason));
        };
        if current.confirmed {
            return Ok(());
        }
        let mut next = current;
        next.confirmed = true;
        self.persist(next).map_err(failed)
    }
}
