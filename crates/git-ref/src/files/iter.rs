use std::collections::HashSet;
use std::path::Path;

use bstr::BStr;
use git_utils::wildmatch::{self, WildmatchFlags};

use crate::error::RefError;
use crate::name::RefName;
use crate::Reference;

use super::cache::RefCache;
use super::packed::PackedRefFlags;
use super::loose;

fn glob_matches(glob: Option<&BStr>, name: &RefName) -> bool {
    match glob {
        None => true,
        Some(pattern) => wildmatch::wildmatch(pattern, name.as_bstr(), WildmatchFlags::PATHNAME),
    }
}

/// Enumerate the merged loose+packed view as full `Reference` values.
///
/// Construction walks `<root>/refs/` for loose files and marks every packed
/// entry sharing a name with a loose file `SHADOWED` (a transient flag,
/// reset at the start of every call so stale marks from a previous pass
/// never leak). Iteration then proceeds in two phases: loose files first
/// (parse failures are logged and skipped — lookup of the same name still
/// surfaces the corruption), then packed entries that were not shadowed.
pub(crate) fn iter_references(
    root: &Path,
    cache: &mut RefCache,
    glob: Option<&BStr>,
) -> Result<Vec<Result<Reference, RefError>>, RefError> {
    cache.refresh(&super::cache::packed_refs_path(root))?;

    let loose_names = loose::enumerate_loose_refs(root)?;
    let loose_name_set: HashSet<&RefName> = loose_names.iter().collect();
    mark_shadowed(cache, &loose_name_set);

    let mut out = Vec::new();

    for name in &loose_names {
        if !glob_matches(glob, name) {
            continue;
        }
        match loose::read_loose_ref(root, name) {
            Ok(Some(read)) => out.push(Ok(read.reference)),
            Ok(None) => {
                // Removed between enumeration and read; not an error.
            }
            Err(e) => {
                tracing::warn!(name = %name, error = %e, "skipping unreadable loose ref during iteration");
            }
        }
    }

    for entry in cache.entries().values() {
        if entry.flags.contains(PackedRefFlags::SHADOWED) {
            continue;
        }
        if !glob_matches(glob, &entry.name) {
            continue;
        }
        out.push(Ok(Reference::Direct {
            name: entry.name.clone(),
            target: entry.oid,
            peel: entry.peel,
        }));
    }

    Ok(out)
}

/// Enumerate the merged view as names only, with no file content read.
///
/// Uses the same `SHADOWED`-based dedup as `iter_references` (unifying the
/// two iterators' shadowing semantics rather than the name-only iterator
/// filtering independently during its loose phase).
pub(crate) fn iter_names(
    root: &Path,
    cache: &mut RefCache,
    glob: Option<&BStr>,
) -> Result<Vec<RefName>, RefError> {
    cache.refresh(&super::cache::packed_refs_path(root))?;

    let loose_names = loose::enumerate_loose_refs(root)?;
    let loose_name_set: HashSet<&RefName> = loose_names.iter().collect();
    mark_shadowed(cache, &loose_name_set);

    let mut out = Vec::new();
    for name in &loose_names {
        if glob_matches(glob, name) {
            out.push(name.clone());
        }
    }
    for entry in cache.entries().values() {
        if entry.flags.contains(PackedRefFlags::SHADOWED) {
            continue;
        }
        if glob_matches(glob, &entry.name) {
            out.push(entry.name.clone());
        }
    }
    Ok(out)
}

fn mark_shadowed(cache: &mut RefCache, loose_names: &HashSet<&RefName>) {
    cache.clear_shadowed();
    cache.mark_shadowed(loose_names);
}
