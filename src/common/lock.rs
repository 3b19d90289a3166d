use std::{collections::BTreeMap, io::Write, path::Path};

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};

use crate::common::{sha256_file, PendingWrite};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileHash {
    pub sha256: String,
}

/// Pinned digests of the cached upstream inputs, stored as `inputs.lock.json`
/// in the data directory. Paths are relative to the data directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputLock {
    version: u32,
    files: BTreeMap<String, FileHash>,
}

/// Outcome of checking one input against the lock.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockStatus {
    /// The digest was not pinned before and has now been recorded.
    Recorded,
    /// The digest matches the pinned one.
    Matched,
    /// The digest differed and the new one replaced it.
    Updated,
}

impl Default for InputLock {
    fn default() -> Self {
        Self { version: Self::VERSION, files: BTreeMap::new() }
    }
}

impl InputLock {
    pub const FILE_NAME: &'static str = "inputs.lock.json";
    const VERSION: u32 = 1;

    /// Load the lock from `data_dir`, or an empty lock if there is none yet.
    pub fn load(data_dir: &Path) -> Result<Self> {
        let path = data_dir.join(Self::FILE_NAME);
        if !path.exists() {
            return Ok(Self::default());
        }
        let bytes = std::fs::read(&path)
            .with_context(|| format!("read {}", path.display()))?;
        let lock: Self = serde_json::from_slice(&bytes)
            .with_context(|| format!("parse {}", path.display()))?;
        if lock.version != Self::VERSION {
            bail!("unsupported lock file version {} in {}", lock.version, path.display());
        }
        Ok(lock)
    }

    pub fn save(&self, data_dir: &Path) -> Result<()> {
        let path = data_dir.join(Self::FILE_NAME);
        let mut sink = PendingWrite::open(&path, true)?;
        serde_json::to_writer_pretty(&mut sink, self)
            .with_context(|| format!("write {}", path.display()))?;
        sink.write_all(b"\n")?;
        sink.finalize()
    }

    pub fn get(&self, rel_path: &str) -> Option<&FileHash> {
        self.files.get(rel_path)
    }

    /// Hash `data_dir/rel_path` and compare it with the pinned digest.
    ///
    /// With `locked`, a missing or different digest is an error. Otherwise the
    /// new digest is recorded and the caller is told what happened.
    pub fn check(&mut self, data_dir: &Path, rel_path: &str, locked: bool) -> Result<LockStatus> {
        let sha256 = sha256_file(&data_dir.join(rel_path))?;

        match self.files.get(rel_path) {
            Some(pinned) if pinned.sha256 == sha256 => return Ok(LockStatus::Matched),
            Some(pinned) if locked => bail!(
                "{rel_path} does not match its pinned digest (expected {}, found {sha256})",
                pinned.sha256
            ),
            None if locked => bail!("{rel_path} is not pinned in {}", Self::FILE_NAME),
            _ => {}
        }

        let previous = self.files.insert(rel_path.to_string(), FileHash { sha256 });
        Ok(if previous.is_some() { LockStatus::Updated } else { LockStatus::Recorded })
    }
}
