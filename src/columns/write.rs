use anyhow::{Context, Result};
use serde_json;
use std::{
    collections::BTreeMap,
    fs,
    io::{BufReader, Write},
    path::Path,
};

use super::ColumnDescriptor;

pub type CacheEntries = BTreeMap<String, ColumnDescriptor>;

/// Read a persisted cache file. A missing file is `Ok(None)`.
pub fn read_entries(path: &Path) -> Result<Option<CacheEntries>> {
    if !path.exists() {
        return Ok(None);
    }
    let f = fs::File::open(path).with_context(|| format!("opening {:?}", path))?;
    let entries = serde_json::from_reader(BufReader::new(f))
        .with_context(|| format!("parsing {:?}", path))?;
    Ok(Some(entries))
}

/// Write the whole cache to `path`.
///
/// Writes atomically: to a dot-prefixed tmp file next to `path`, then
/// renames over the original.
pub fn write_entries(path: &Path, entries: &CacheEntries) -> Result<()> {
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .with_context(|| format!("cache path {:?} has no file name", path))?;
    let tmp_path = dir.join(format!(".{}.tmp", file_name));

    let mut tmp =
        fs::File::create(&tmp_path).with_context(|| format!("creating {:?}", tmp_path))?;
    // pretty-print with a trailing newline
    serde_json::to_writer_pretty(&mut tmp, entries).context("serializing column cache")?;
    tmp.write_all(b"\n")?;
    tmp.sync_all()
        .with_context(|| format!("syncing {:?}", tmp_path))?;

    fs::rename(&tmp_path, path)
        .with_context(|| format!("renaming {:?} -> {:?}", tmp_path, path))?;
    Ok(())
}
