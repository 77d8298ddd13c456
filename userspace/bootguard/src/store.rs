// Copyright 2026 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0
//
//! CONTEXT: Persisted-state seam for the boot-health monitor
//! OWNERS: @runtime
//! STATUS: Functional
//! API_STABILITY: Stable (v1.0)
//! TEST_COVERAGE: 4 unit tests
//!
//! The backing engine (statefs, flash preferences, files) owns durability.
//! This module only fixes the key schema and the value encodings:
//!   - integers: 4-byte little-endian u32
//!   - strings: raw UTF-8 bytes
//!
//! INVARIANT: Key names and encodings MUST NOT change; values written by one
//! image are read back by the next one.

use alloc::collections::BTreeMap;
use alloc::string::String;
use alloc::vec::Vec;

/// Persisted key names.
pub mod keys {
    /// Boots since the last validation or rollback.
    pub const BOOT_COUNT: &str = "boot_count";
    /// Last rollback reason code.
    pub const LAST_FAIL: &str = "last_fail";
    /// Update identifier blamed for the last rollback.
    pub const FAIL_OTA_ID: &str = "fail_ota_id";
}

/// Storage failure surfaced by a [`StateStore`] backend.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    /// Key rejected by the backend.
    #[error("invalid key: {0}")]
    InvalidKey(String),
    /// Value exceeds what the backend accepts.
    #[error("value too large for key {0}")]
    ValueTooLarge(String),
    /// Read, write or flush failed.
    #[error("store i/o failure: {0}")]
    Io(String),
}

/// Durable key-value store consumed by the monitor.
///
/// Writes are assumed atomic per key. `sync` flushes everything written so
/// far; the monitor calls it before handing back a restart command.
pub trait StateStore {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError>;

    fn put(&mut self, key: &str, value: &[u8]) -> Result<(), StoreError>;

    fn sync(&mut self) -> Result<(), StoreError>;
}

impl<T: StateStore + ?Sized> StateStore for &mut T {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        (**self).get(key)
    }

    fn put(&mut self, key: &str, value: &[u8]) -> Result<(), StoreError> {
        (**self).put(key, value)
    }

    fn sync(&mut self) -> Result<(), StoreError> {
        (**self).sync()
    }
}

pub(crate) fn encode_u32(value: u32) -> [u8; 4] {
    value.to_le_bytes()
}

/// Returns `None` when the stored bytes are not exactly four wide.
pub(crate) fn decode_u32(bytes: &[u8]) -> Option<u32> {
    let array: [u8; 4] = bytes.try_into().ok()?;
    Some(u32::from_le_bytes(array))
}

/// In-memory store for tests and os-lite bring-up.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MemStore {
    kv: BTreeMap<String, Vec<u8>>,
    syncs: usize,
    fail_writes: bool,
}

impl MemStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of successful `sync` calls so far.
    pub fn sync_count(&self) -> usize {
        self.syncs
    }

    /// Makes every subsequent `put`/`sync` fail (fault injection).
    pub fn set_fail_writes(&mut self, fail: bool) {
        self.fail_writes = fail;
    }

    pub fn raw(&self, key: &str) -> Option<&[u8]> {
        self.kv.get(key).map(Vec::as_slice)
    }

    pub fn len(&self) -> usize {
        self.kv.len()
    }

    pub fn is_empty(&self) -> bool {
        self.kv.is_empty()
    }
}

impl StateStore for MemStore {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        Ok(self.kv.get(key).cloned())
    }

    fn put(&mut self, key: &str, value: &[u8]) -> Result<(), StoreError> {
        if self.fail_writes {
            return Err(StoreError::Io("injected write failure".into()));
        }
        if key.is_empty() {
            return Err(StoreError::InvalidKey(key.into()));
        }
        self.kv.insert(key.into(), value.to_vec());
        Ok(())
    }

    fn sync(&mut self) -> Result<(), StoreError> {
        if self.fail_writes {
            return Err(StoreError::Io("injected sync failure".into()));
        }
        self.syncs += 1;
        Ok(())
    }
}
