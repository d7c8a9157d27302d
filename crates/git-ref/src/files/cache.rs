use std::collections::BTreeMap;
use std::fs;
use std::io::Write as _;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use git_utils::lockfile::LockFile;

use crate::error::RefError;
use crate::name::RefName;

use super::packed::{self, PackedEntry, PeelingMode};

/// In-memory view of the packed-refs file, refreshed on demand against the
/// file's last-modified time.
///
/// A single generation of staleness tracking: `refresh()` reparses exactly
/// when the on-disk mtime differs from the one last observed. There is no
/// deeper caching policy (see module docs on the crate's non-goals).
#[derive(Debug, Default)]
pub struct RefCache {
    entries: BTreeMap<RefName, PackedEntry>,
    mtime: Option<SystemTime>,
    peeling_mode: PeelingMode,
    /// True once `refresh` has run at least once, so callers that only ever
    /// look at an empty map can distinguish "never loaded" from "loaded and
    /// genuinely empty" if they need to (the cache itself doesn't care).
    loaded: bool,
}

impl RefCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> &BTreeMap<RefName, PackedEntry> {
        &self.entries
    }

    pub fn peeling_mode(&self) -> PeelingMode {
        self.peeling_mode
    }

    pub fn get(&self, name: &RefName) -> Option<&PackedEntry> {
        self.entries.get(name)
    }

    /// Refresh the cache against `packed_refs_path`.
    ///
    /// 1. Missing file → clear the map, succeed.
    /// 2. Present, mtime unchanged → succeed without reparsing.
    /// 3. Present, mtime changed → reparse into a fresh map, then swap it in
    ///    along with the new mtime. The old map is simply dropped.
    /// 4. Parse failure → the cache is left *empty*, not stale, and the
    ///    error propagates to the caller.
    pub fn refresh(&mut self, packed_refs_path: &Path) -> Result<(), RefError> {
        let metadata = match fs::metadata(packed_refs_path) {
            Ok(m) => m,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %packed_refs_path.display(), "packed-refs missing, cache cleared");
                self.entries.clear();
                self.peeling_mode = PeelingMode::None;
                self.mtime = None;
                self.loaded = true;
                return Ok(());
            }
            Err(e) => {
                return Err(RefError::IoPath {
                    path: packed_refs_path.to_path_buf(),
                    source: e,
                })
            }
        };

        let current_mtime = metadata.modified().ok();
        if self.loaded && current_mtime.is_some() && current_mtime == self.mtime {
            tracing::debug!(path = %packed_refs_path.display(), "packed-refs unchanged, cache reused");
            return Ok(());
        }

        let data = fs::read(packed_refs_path).map_err(|e| RefError::IoPath {
            path: packed_refs_path.to_path_buf(),
            source: e,
        })?;

        match packed::parse(&data) {
            Ok(parsed) => {
                tracing::debug!(
                    path = %packed_refs_path.display(),
                    entries = parsed.entries.len(),
                    "packed-refs reparsed"
                );
                self.entries = parsed.entries;
                self.peeling_mode = parsed.peeling_mode;
                self.mtime = current_mtime;
                self.loaded = true;
                Ok(())
            }
            Err(e) => {
                tracing::debug!(path = %packed_refs_path.display(), error = %e, "packed-refs parse failed");
                self.entries.clear();
                self.peeling_mode = PeelingMode::None;
                self.mtime = None;
                self.loaded = false;
                Err(e)
            }
        }
    }

    /// Clear the transient `SHADOWED` bit from every entry. Called at the
    /// start of every iterator pass so a previous pass's marks never leak
    /// into the next one.
    pub fn clear_shadowed(&mut self) {
        for entry in self.entries.values_mut() {
            entry.flags.remove(packed::PackedRefFlags::SHADOWED);
        }
    }

    /// Mark every packed entry whose name appears in `loose_names` as
    /// `SHADOWED`.
    pub fn mark_shadowed(&mut self, loose_names: &std::collections::HashSet<&RefName>) {
        for (name, entry) in self.entries.iter_mut() {
            if loose_names.contains(name) {
                entry.flags.insert(packed::PackedRefFlags::SHADOWED);
            }
        }
    }

    /// Replace the cache's contents wholesale (used by the compactor after a
    /// successful repack) and remember the new file's mtime so the next
    /// `refresh` sees it as already current.
    pub fn replace(
        &mut self,
        entries: BTreeMap<RefName, PackedEntry>,
        packed_refs_path: &Path,
    ) -> Result<(), RefError> {
        self.entries = entries;
        self.peeling_mode = PeelingMode::Standard;
        self.mtime = fs::metadata(packed_refs_path).ok().and_then(|m| m.modified().ok());
        self.loaded = true;
        Ok(())
    }
}

pub fn packed_refs_path(root: &Path) -> PathBuf {
    root.join("packed-refs")
}

/// Commit `bytes` as the new packed-refs file atomically via the same
/// temp-file-then-rename lock protocol every other write in this crate uses.
pub(crate) fn write_packed_file(path: &Path, bytes: &[u8]) -> Result<(), RefError> {
    let mut lock = LockFile::acquire(path)?;
    lock.write_all(bytes).map_err(|e| RefError::IoPath {
        path: path.to_path_buf(),
        source: e,
    })?;
    lock.commit()?;
    Ok(())
}
