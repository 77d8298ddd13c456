// Copyright 2026 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0
//
//! CONTEXT: Bootloader rollback capability consumed by the monitor
//! OWNERS: @runtime
//! STATUS: Functional
//! API_STABILITY: Stable (v1.0)
//! TEST_COVERAGE: Exercised through monitor tests

use alloc::string::String;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BootloaderError {
    /// No previous image to fall back to.
    #[error("no rollback target")]
    NoRollbackTarget,
    /// The bootloader rejected or failed the request.
    #[error("bootloader failure: {0}")]
    Failed(String),
}

/// Dual-image bootloader capability.
///
/// `rollback` changes which image boots next; it does not restart. The
/// monitor always follows it with a restart command.
pub trait Bootloader {
    fn can_rollback(&self) -> bool;

    fn rollback(&mut self) -> Result<(), BootloaderError>;

    /// Confirms the running image so the bootloader stops counting it as on trial.
    fn mark_valid(&mut self) -> Result<(), BootloaderError> {
        Ok(())
    }
}

impl<T: Bootloader + ?Sized> Bootloader for &mut T {
    fn can_rollback(&self) -> bool {
        (**self).can_rollback()
    }

    fn rollback(&mut self) -> Result<(), BootloaderError> {
        (**self).rollback()
    }

    fn mark_valid(&mut self) -> Result<(), BootloaderError> {
        (**self).mark_valid()
    }
}

/// Bootloader with a single image (nothing to roll back to).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NoBackup;

impl Bootloader for NoBackup {
    fn can_rollback(&self) -> bool {
        false
    }

    fn rollback(&mut self) -> Result<(), BootloaderError> {
        Err(BootloaderError::NoRollbackTarget)
    }
}
