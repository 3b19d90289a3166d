use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::common::{ensure_dir_exists, extract_zip};
#[cfg(feature = "download")]
use crate::common::PendingWrite;

/// Download a large file from `file_url` to `out_path`.
#[cfg(feature = "download")]
pub fn download_big_file(file_url: &str, out_path: &Path, force: bool) -> Result<()> {
    // Safe big-file write (tempfile -> atomic rename), no accidental overwrite unless forced
    let mut sink = PendingWrite::open(out_path, force)?;

    let mut resp = reqwest::blocking::get(file_url)
        .with_context(|| format!("GET {file_url}"))?
        .error_for_status()
        .with_context(|| format!("GET {file_url} returned error status"))?;

    std::io::copy(&mut resp, &mut sink).with_context(|| format!("write {}", out_path.display()))?;

    sink.finalize()
}

#[cfg(not(feature = "download"))]
pub fn download_big_file(file_url: &str, out_path: &Path, _force: bool) -> Result<()> {
    anyhow::bail!(
        "{} is not cached and this build has no download support (enable the `download` feature to fetch {file_url})",
        out_path.display()
    )
}

/// Fetch `file_url` into `out_path` unless a cached copy already exists there.
/// Returns true if a download happened.
pub fn fetch_cached(file_url: &str, out_path: &Path, verbose: u8) -> Result<bool> {
    if out_path.exists() {
        if verbose > 1 { eprintln!("[fetch] cached {}", out_path.display()); }
        return Ok(false);
    }

    if verbose > 0 { eprintln!("[download] {file_url} -> {}", out_path.display()); }
    download_big_file(file_url, out_path, false)?;
    Ok(true)
}

/// Fetch a zip archive and extract it into `out_dir`, unless `out_dir` already exists.
/// The archive is kept next to the directory (as `<out_dir>.zip`) so it can be hashed.
/// Extraction happens in a staging directory beside `out_dir`, so `out_dir` only
/// appears once the whole archive has been unpacked.
pub fn fetch_cached_archive(file_url: &str, out_dir: &Path, verbose: u8) -> Result<PathBuf> {
    let zip_path = out_dir.with_extension("zip");
    if out_dir.exists() {
        if verbose > 1 { eprintln!("[fetch] cached {}", out_dir.display()); }
        return Ok(zip_path);
    }

    fetch_cached(file_url, &zip_path, verbose)?;

    if verbose > 0 { eprintln!("[extract] {} -> {}", zip_path.display(), out_dir.display()); }
    let parent = out_dir.parent().filter(|p| !p.as_os_str().is_empty()).unwrap_or(Path::new("."));
    ensure_dir_exists(parent)?;
    let staging = tempfile::Builder::new()
        .prefix(".extract-")
        .tempdir_in(parent)
        .with_context(|| format!("create staging directory in {}", parent.display()))?;

    extract_zip(&zip_path, staging.path(), false)?;
    std::fs::rename(staging.path(), out_dir)
        .with_context(|| format!("move extracted archive into {}", out_dir.display()))?;

    Ok(zip_path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cached_file_is_not_fetched() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dublin_boundary.geojson");
        std::fs::write(&path, b"{}").unwrap();

        // The url is never contacted because the path already exists.
        let fetched = fetch_cached("http://invalid.invalid/dublin_boundary.geojson", &path, 0).unwrap();
        assert!(!fetched);
    }

    #[test]
    fn cached_archive_directory_is_not_fetched() {
        let dir = tempfile::tempdir().unwrap();
        let out_dir = dir.path().join("Census2011_Small_Areas_generalised20m");
        std::fs::create_dir_all(&out_dir).unwrap();

        let zip_path = fetch_cached_archive("http://invalid.invalid/sa.zip", &out_dir, 0).unwrap();
        assert_eq!(zip_path, dir.path().join("Census2011_Small_Areas_generalised20m.zip"));
    }

    fn write_zip(path: &Path, entry: &str, contents: &[u8]) {
        use std::io::Write;
        let mut writer = zip::ZipWriter::new(std::fs::File::create(path).unwrap());
        writer.start_file(entry, zip::write::SimpleFileOptions::default()).unwrap();
        writer.write_all(contents).unwrap();
        writer.finish().unwrap();
    }

    #[test]
    fn archive_is_extracted_into_place() {
        let dir = tempfile::tempdir().unwrap();
        let out_dir = dir.path().join("sa");
        write_zip(&dir.path().join("sa.zip"), "a/boundaries.shp", b"shape bytes");

        fetch_cached_archive("http://invalid.invalid/sa.zip", &out_dir, 0).unwrap();
        assert_eq!(std::fs::read(out_dir.join("a/boundaries.shp")).unwrap(), b"shape bytes");
    }

    #[test]
    fn corrupt_archive_leaves_nothing_cached() {
        let dir = tempfile::tempdir().unwrap();
        let out_dir = dir.path().join("sa");
        let zip_path = dir.path().join("sa.zip");

        let contents: Vec<u8> = (0..16_384u32).map(|i| (i * 31 % 251) as u8).collect();
        write_zip(&zip_path, "a/boundaries.shp", &contents);

        // Scramble the start of the compressed stream, just past the local header.
        let mut bytes = std::fs::read(&zip_path).unwrap();
        let name_len = u16::from_le_bytes([bytes[26], bytes[27]]) as usize;
        let extra_len = u16::from_le_bytes([bytes[28], bytes[29]]) as usize;
        let data_start = 30 + name_len + extra_len;
        for byte in &mut bytes[data_start + 4..data_start + 24] {
            *byte ^= 0xFF;
        }
        std::fs::write(&zip_path, &bytes).unwrap();

        assert!(fetch_cached_archive("http://invalid.invalid/sa.zip", &out_dir, 0).is_err());
        assert!(!out_dir.exists());

        // A rerun fails again instead of trusting a half-written directory.
        assert!(fetch_cached_archive("http://invalid.invalid/sa.zip", &out_dir, 0).is_err());
        let leftovers: Vec<_> = std::fs::read_dir(dir.path()).unwrap()
            .map(|entry| entry.unwrap().file_name())
            .collect();
        assert_eq!(leftovers, vec![std::ffi::OsString::from("sa.zip")]);
    }
}
