use std::collections::HashSet;
use std::path::Path;

use git_hash::ObjectId;

use crate::error::RefError;
use crate::name::RefName;
use crate::Reference;

use super::cache::{self, RefCache};
use super::loose;
use super::view;

/// Check whether `new` can be written without colliding with an existing
/// reference's path, per the rule that a filesystem cannot host a file at
/// `refs/heads/a` and another at `refs/heads/a/b` simultaneously.
///
/// `old`, when set (renames), exempts the entry of that name from both the
/// existence check and the prefix-collision scan.
pub(crate) fn reference_path_available(
    root: &Path,
    cache: &mut RefCache,
    new: &RefName,
    old: Option<&RefName>,
    force: bool,
) -> Result<(), RefError> {
    // The prefix-collision scan below reads `cache.entries()` directly, so
    // the cache must be fresh regardless of `force` — `force` only waives
    // the `AlreadyExists` check, never the `PathCollision` one.
    cache.refresh(&cache::packed_refs_path(root))?;

    if !force && view::exists(root, cache, new)? {
        return Err(RefError::AlreadyExists(new.to_string()));
    }

    let mut candidates: HashSet<RefName> = cache.entries().keys().cloned().collect();
    for name in loose::enumerate_loose_refs(root)? {
        candidates.insert(name);
    }
    if let Some(old) = old {
        candidates.remove(old);
    }
    candidates.remove(new);

    for existing in &candidates {
        if is_strict_prefix(new.as_str(), existing.as_str())
            || is_strict_prefix(existing.as_str(), new.as_str())
        {
            return Err(RefError::PathCollision {
                name: new.to_string(),
                conflict: existing.to_string(),
            });
        }
    }
    Ok(())
}

fn is_strict_prefix(shorter: &str, longer: &str) -> bool {
    longer.len() > shorter.len()
        && longer.as_bytes()[shorter.len()] == b'/'
        && longer.starts_with(shorter)
}

/// Write a direct reference, creating or overwriting it.
pub(crate) fn write(
    root: &Path,
    cache: &mut RefCache,
    name: &RefName,
    target: ObjectId,
    force: bool,
) -> Result<(), RefError> {
    reference_path_available(root, cache, name, None, force)?;
    loose::write_loose_ref(root, name, &target)
}

/// Write a symbolic reference, creating or overwriting it.
pub(crate) fn write_symbolic(
    root: &Path,
    cache: &mut RefCache,
    name: &RefName,
    target: RefName,
    force: bool,
) -> Result<(), RefError> {
    reference_path_available(root, cache, name, None, force)?;
    loose::write_symbolic_ref(root, name, &target)
}

/// Delete a reference, loose and/or packed. `NotFound` if neither existed.
pub(crate) fn delete(root: &Path, cache: &mut RefCache, name: &RefName) -> Result<(), RefError> {
    let loose_removed = loose::delete_loose_ref(root, name)?;

    cache.refresh(&cache::packed_refs_path(root))?;
    let packed_removed = if cache.get(name).is_some() {
        let mut entries = cache.entries().clone();
        entries.remove(name);
        let packed_path = cache::packed_refs_path(root);
        cache::write_packed_file(&packed_path, &super::packed::serialize(entries.clone().into_values()))?;
        cache.replace(entries, &packed_path)?;
        true
    } else {
        false
    };

    if !loose_removed && !packed_removed {
        return Err(RefError::NotFound(name.to_string()));
    }
    Ok(())
}

/// Rename a reference, preserving its value. Not atomic across the pair: a
/// crash between the delete of `old` and the write of `new` loses the
/// reference (documented trade-off, not a bug).
pub(crate) fn rename(
    root: &Path,
    cache: &mut RefCache,
    old: &RefName,
    new: &RefName,
    force: bool,
) -> Result<(), RefError> {
    reference_path_available(root, cache, new, Some(old), force)?;

    let reference = view::lookup(root, cache, old)?.ok_or_else(|| RefError::NotFound(old.to_string()))?;
    delete(root, cache, old)?;

    match reference {
        Reference::Direct { target, .. } => loose::write_loose_ref(root, new, &target),
        Reference::Symbolic { target, .. } => loose::write_symbolic_ref(root, new, &target),
    }
}
