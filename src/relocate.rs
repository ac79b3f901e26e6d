//! Moving engine products out of the working directory and scrubbing scratch.
use std::fs;
use std::io::{self, Write};
use std::path::Path;

/// Suffixes of the engine leftovers removed between stages.
///
/// `fits` has no leading dot so compressed or oddly named intermediates
/// (`*.tfits`, `*_fits`) go too.
const SCRATCH_SUFFIXES: [&str; 3] = ["fits", ".log", ".dump"];

/// Move `source` to `dest`, creating the destination directory.
///
/// Falls back to copy-then-remove when a rename is not possible, e.g. across
/// filesystems.
pub fn move_file(source: &Path, dest: &Path) -> io::Result<()> {
    if let Some(parent) = dest.parent() {
        fs::create_dir_all(parent)?;
    }
    if fs::rename(source, dest).is_ok() {
        return Ok(());
    }
    fs::copy(source, dest)?;
    fs::remove_file(source)
}

/// Delete leftover scratch files in `work_dir`; returns how many were removed.
pub fn scrub_scratch(work_dir: &Path) -> io::Result<usize> {
    let mut removed = 0;
    let mut entries: Vec<_> = fs::read_dir(work_dir)?
        .map(|entry| entry.map(|entry| entry.path()))
        .collect::<io::Result<_>>()?;
    entries.sort();
    for path in entries {
        if !path.is_file() {
            continue;
        }
        let Some(name) = path.file_name().and_then(|name| name.to_str()) else {
            continue;
        };
        if SCRATCH_SUFFIXES.iter().any(|suffix| name.ends_with(suffix)) {
            fs::remove_file(&path)?;
            tracing::debug!(file = name, "removed scratch file");
            removed += 1;
        }
    }
    Ok(removed)
}

/// Write `bytes` to `path` through a temporary file in the same directory.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> io::Result<()> {
    let parent = path.parent().unwrap_or_else(|| Path::new("."));
    fs::create_dir_all(parent)?;
    let mut tmp = tempfile::NamedTempFile::new_in(parent)?;
    tmp.write_all(bytes)?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|err| err.error)?;
    Ok(())
}
