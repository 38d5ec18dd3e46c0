// SPDX-License-Identifier: MIT

//! I/O abstraction for the Run Store, mirroring the teacher's
//! `CheckpointWriter` trait: every filesystem operation goes through here so
//! tests can inject a fake and exercise crash/retry scenarios.

use crate::error::StoreError;
use std::path::Path;

/// Abstracts atomic-write-to-temp-then-rename filesystem operations.
pub trait RunStoreIo: Send + Sync + 'static {
    fn write_bytes(&self, path: &Path, data: &[u8]) -> Result<(), StoreError>;
    fn read_bytes(&self, path: &Path) -> Result<Vec<u8>, StoreError>;
    fn rename(&self, from: &Path, to: &Path) -> Result<(), StoreError>;
    fn append_bytes(&self, path: &Path, data: &[u8]) -> Result<(), StoreError>;
    fn exists(&self, path: &Path) -> bool;
    fn create_dir_all(&self, path: &Path) -> Result<(), StoreError>;
    fn list_dir(&self, path: &Path) -> Result<Vec<std::path::PathBuf>, StoreError>;
}

/// Production I/O using the real filesystem.
#[derive(Clone, Default)]
pub struct FsRunStoreIo;

impl RunStoreIo for FsRunStoreIo {
    fn write_bytes(&self, path: &Path, data: &[u8]) -> Result<(), StoreError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, data)?;
        Ok(())
    }

    fn read_bytes(&self, path: &Path) -> Result<Vec<u8>, StoreError> {
        Ok(std::fs::read(path)?)
    }

    fn rename(&self, from: &Path, to: &Path) -> Result<(), StoreError> {
        std::fs::rename(from, to)?;
        Ok(())
    }

    fn append_bytes(&self, path: &Path, data: &[u8]) -> Result<(), StoreError> {
        use std::io::Write;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)?;
        file.write_all(data)?;
        Ok(())
    }

    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }

    fn create_dir_all(&self, path: &Path) -> Result<(), StoreError> {
        std::fs::create_dir_all(path)?;
        Ok(())
    }

    fn list_dir(&self, path: &Path) -> Result<Vec<std::path::PathBuf>, StoreError> {
        if !path.exists() {
            return Ok(Vec::new());
        }
        let mut out = Vec::new();
        for entry in std::fs::read_dir(path)? {
            out.push(entry?.path());
        }
        Ok(out)
    }
}

/// Atomically write `data` to `path` via write-to-temp-then-rename (§4.1,
/// modeled on `oj-storage::checkpoint::FsCheckpointWriter`).
pub fn atomic_write(io: &dyn RunStoreIo, path: &Path, data: &[u8]) -> Result<(), StoreError> {
    let tmp = path.with_extension("tmp");
    io.write_bytes(&tmp, data)?;
    io.rename(&tmp, path)?;
    Ok(())
}
