// src/archive/mod.rs
use anyhow::{bail, Context, Result};
use glob::{glob, Pattern};
use std::{
    fs::File,
    io::{BufReader, Read},
    path::{Path, PathBuf},
};
use tar::Archive;
use tracing::{debug, trace};
use xz2::read::XzDecoder;

use crate::error::LoadError;

/// Compound suffix of the source archives.
pub const ARCHIVE_SUFFIX: &str = ".tar.xz";
/// Suffix of the tabular member inside each archive.
pub const TABULAR_SUFFIX: &str = ".csv";

/// Upper bound on the buffer reserved from a tar header's declared size.
const MAX_PREALLOC: u64 = 8 << 20;

/// The tabular entry pulled out of an archive, buffered in memory.
#[derive(Debug)]
pub struct TabularMember {
    /// Entry path as recorded in the archive.
    pub name: String,
    pub bytes: Vec<u8>,
}

/// List every `*.tar.xz` file directly inside `dir`, ordered by file name.
pub fn discover<P: AsRef<Path>>(dir: P) -> Result<Vec<PathBuf>, LoadError> {
    let dir = dir.as_ref();
    if !dir.is_dir() {
        return Err(LoadError::DirectoryNotFound(dir.to_path_buf()));
    }

    let dir_str = dir.to_str().ok_or_else(|| {
        LoadError::Config(format!("datasets path {:?} is not valid UTF-8", dir))
    })?;
    // escape the directory part so brackets etc. in the path match literally
    let pattern = format!("{}/*{}", Pattern::escape(dir_str), ARCHIVE_SUFFIX);
    let paths = glob(&pattern)
        .map_err(|e| LoadError::Config(format!("bad datasets path {:?}: {}", dir, e)))?;

    let mut found: Vec<PathBuf> = paths
        .filter_map(|entry| match entry {
            Ok(path) => Some(path),
            Err(e) => {
                debug!("skipping unreadable entry: {}", e);
                None
            }
        })
        .filter(|p| p.is_file())
        .collect();
    found.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    Ok(found)
}

/// Destination table name for an archive: drop `.tar.xz`, then dots become underscores.
pub fn derive_table_name(archive_name: &str) -> String {
    archive_name
        .strip_suffix(ARCHIVE_SUFFIX)
        .unwrap_or(archive_name)
        .replace('.', "_")
}

/// Open `archive_path` and return the first regular `.csv` entry, in archive order.
/// `Ok(None)` means the archive was readable but held no CSV.
#[tracing::instrument(level = "debug", skip(archive_path), fields(path = %archive_path.as_ref().display()))]
pub fn extract_tabular_member<P: AsRef<Path>>(archive_path: P) -> Result<Option<TabularMember>> {
    let archive_path = archive_path.as_ref();
    let file = File::open(archive_path)
        .with_context(|| format!("Failed to open archive: {:?}", archive_path))?;
    let mut archive = Archive::new(XzDecoder::new(BufReader::new(file)));

    let entries = archive
        .entries()
        .with_context(|| format!("Failed to read tar entries of {:?}", archive_path))?;

    for (idx, entry) in entries.enumerate() {
        let mut entry = entry.with_context(|| {
            format!("Failed to read entry #{} in {:?}", idx, archive_path)
        })?;
        let name = entry
            .path()
            .with_context(|| format!("Bad path for entry #{} in {:?}", idx, archive_path))?
            .to_string_lossy()
            .to_string();

        if !entry.header().entry_type().is_file() || !name.ends_with(TABULAR_SUFFIX) {
            trace!(entry = %name, "not tabular, skipping");
            continue;
        }

        // the header size is untrusted; grow past the cap only as data arrives
        let declared = entry.size();
        let mut bytes = Vec::with_capacity(declared.min(MAX_PREALLOC) as usize);
        entry
            .read_to_end(&mut bytes)
            .with_context(|| format!("Failed to read {} into memory", name))?;
        if bytes.len() as u64 != declared {
            bail!(
                "Truncated entry {} in {:?}: header says {} bytes, read {}",
                name,
                archive_path,
                declared,
                bytes.len()
            );
        }
        debug!(entry = %name, bytes = bytes.len(), "found tabular member");
        return Ok(Some(TabularMember { name, bytes }));
    }

    Ok(None)
}
