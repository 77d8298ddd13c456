// Copyright 2026 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0
//
//! CONTEXT: File-per-key persisted store for host builds
//! OWNERS: @runtime
//! STATUS: Functional
//! API_STABILITY: Unstable
//! TEST_COVERAGE: 5 unit tests
//!
//! Each key lives in its own file under the state directory. `put` writes a
//! temporary sibling, fsyncs it and renames it over the key so a reader sees
//! either the old or the new value. A failed `put` removes its temporary file.
//! `sync` fsyncs the directory so renames survive power loss.

use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use bootguard::{StateStore, StoreError};

/// Maximum key length in bytes.
pub const MAX_KEY_LEN: usize = 64;

/// Maximum value size in bytes (64 KiB).
pub const MAX_VALUE_SIZE: usize = 65536;

#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    /// Opens (creating if needed) the state directory.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let dir = dir.into();
        fs::create_dir_all(&dir).map_err(|err| io_error(&dir, err))?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> Result<PathBuf, StoreError> {
        validate_key(key)?;
        Ok(self.dir.join(key))
    }
}

fn is_key_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || matches!(b, b'_' | b'-' | b'.')
}

fn validate_key(key: &str) -> Result<(), StoreError> {
    let valid = !key.is_empty()
        && key.len() <= MAX_KEY_LEN
        && !key.starts_with('.')
        && key.bytes().all(is_key_byte);
    if valid {
        Ok(())
    } else {
        Err(StoreError::InvalidKey(key.to_string()))
    }
}

fn io_error(path: &Path, err: io::Error) -> StoreError {
    StoreError::Io(format!("{}: {err}", path.display()))
}

fn write_synced(path: &Path, value: &[u8]) -> io::Result<()> {
    let mut file = File::create(path)?;
    file.write_all(value)?;
    file.sync_all()
}

impl StateStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        let path = self.path_for(key)?;
        match fs::read(&path) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(io_error(&path, err)),
        }
    }

    fn put(&mut self, key: &str, value: &[u8]) -> Result<(), StoreError> {
        let path = self.path_for(key)?;
        if value.len() > MAX_VALUE_SIZE {
            return Err(StoreError::ValueTooLarge(key.to_string()));
        }
        let tmp = self.dir.join(format!(".{key}.tmp"));
        let written = write_synced(&tmp, value)
            .and_then(|()| fs::rename(&tmp, &path));
        if let Err(err) = written {
            let _ = fs::remove_file(&tmp);
            return Err(io_error(&path, err));
        }
        Ok(())
    }

    fn sync(&mut self) -> Result<(), StoreError> {
        #[cfg(unix)]
        {
            let dir = File::open(&self.dir).map_err(|err| io_error(&self.dir, err))?;
            dir.sync_all().map_err(|err| io_error(&self.dir, err))?;
        }
        Ok(())
    }
}
