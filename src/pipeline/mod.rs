//! The batch procedures: fetch inputs, join, patch, write.

mod link_small_areas;
mod postcodes;
mod small_areas;

use std::path::{Path, PathBuf};

use anyhow::Result;

use crate::common::{ensure_dir_exists, fetch_cached, fetch_cached_archive, InputLock, LockStatus};
use crate::datasets::{Source, SourceFormat, ALL_SOURCES, WORKING_CRS};
use crate::partition::Partition;

pub use link_small_areas::{linked_small_areas_stem, LinkSmallAreas};
pub use postcodes::{postcode_label, DUBLIN_POSTCODES_OUTPUT};
pub use small_areas::{dublin_small_areas_stem, SmallAreaOutputs};

/// Shared state for one run: where data lives, how chatty to be, and the input lock.
#[derive(Debug)]
pub struct Pipeline {
    data_dir: PathBuf,
    verbose: u8,
    locked: bool,
    force: bool,
    lock: InputLock,
}

impl Pipeline {
    /// Open the data directory (created if missing) and its input lock.
    pub fn new(data_dir: impl Into<PathBuf>, verbose: u8) -> Result<Self> {
        let data_dir = data_dir.into();
        ensure_dir_exists(&data_dir)?;
        let lock = InputLock::load(&data_dir)?;
        Ok(Self { data_dir, verbose, locked: false, force: false, lock })
    }

    /// Require every cached input to match the digest pinned in the lock file.
    pub fn locked(mut self, locked: bool) -> Self {
        self.locked = locked;
        self
    }

    /// Allow outputs to replace existing files.
    pub fn force(mut self, force: bool) -> Self {
        self.force = force;
        self
    }

    #[inline] pub fn data_dir(&self) -> &Path { &self.data_dir }

    #[inline] pub fn verbose(&self) -> u8 { self.verbose }

    #[inline] pub(crate) fn overwrite(&self) -> bool { self.force }

    #[inline] pub(crate) fn output_path(&self, file_name: &str) -> PathBuf {
        self.data_dir.join(file_name)
    }

    /// Make sure a source is cached, then check it against the lock.
    pub fn fetch(&mut self, source: &Source) -> Result<()> {
        let path = source.local_path(&self.data_dir);
        match source.format {
            SourceFormat::GeoJson => { fetch_cached(source.url, &path, self.verbose)?; }
            SourceFormat::ZippedShapefile => { fetch_cached_archive(source.url, &path, self.verbose)?; }
        }
        self.pin(source)
    }

    /// Fetch every upstream input.
    pub fn fetch_all(&mut self) -> Result<()> {
        for source in &ALL_SOURCES {
            self.fetch(source)?;
        }
        Ok(())
    }

    /// Fetch, read and reproject a source into the working coordinate system.
    pub fn load(&mut self, source: &Source, id_field: Option<&str>) -> Result<Partition> {
        self.fetch(source)?;
        let partition = source.read(&self.data_dir, id_field)?;

        if self.verbose > 0 {
            eprintln!("[load] {} records from {} ({})", partition.len(), source.key, partition.epsg());
        }

        partition.to_crs(WORKING_CRS)
    }

    fn pin(&mut self, source: &Source) -> Result<()> {
        let pinned = source.pinned_file();
        if !self.data_dir.join(&pinned).exists() {
            // Archive removed after extraction; nothing left to hash.
            if self.locked {
                anyhow::bail!("{pinned} is missing, so {} cannot be verified against the lock", source.key);
            }
            eprintln!("[lock] warning: {pinned} is missing; {} is not pinned", source.key);
            return Ok(());
        }

        match self.lock.check(&self.data_dir, &pinned, self.locked)? {
            LockStatus::Matched => {}
            LockStatus::Recorded => {
                if self.verbose > 0 { eprintln!("[lock] pinned {pinned}"); }
                self.lock.save(&self.data_dir)?;
            }
            LockStatus::Updated => {
                eprintln!("[lock] warning: {pinned} changed since it was pinned; digest updated");
                self.lock.save(&self.data_dir)?;
            }
        }
        Ok(())
    }
}
