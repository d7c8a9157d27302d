use std::path::Path;

use git_hash::ObjectId;

use crate::error::RefError;
use crate::name::RefName;
use crate::Reference;

use super::cache::{self, RefCache};
use super::loose;

const MAX_SYMREF_DEPTH: usize = 10;

/// Does a reference by this name exist, loose or packed? No disambiguation:
/// a loose file counts even if its content doesn't parse, since existence
/// and well-formedness are different questions (spec.md §4.4) — this must
/// not route through `lookup`, which fails on a corrupt loose file instead
/// of reporting that it's there.
pub(crate) fn exists(root: &Path, cache: &mut RefCache, name: &RefName) -> Result<bool, RefError> {
    if loose::loose_ref_is_file(root, name)? {
        return Ok(true);
    }
    cache.refresh(&cache::packed_refs_path(root))?;
    Ok(cache.get(name).is_some())
}

/// Look up a reference, loose taking precedence over packed.
pub(crate) fn lookup(
    root: &Path,
    cache: &mut RefCache,
    name: &RefName,
) -> Result<Option<Reference>, RefError> {
    if let Some(read) = loose::read_loose_ref(root, name)? {
        return Ok(Some(read.reference));
    }

    cache.refresh(&cache::packed_refs_path(root))?;
    Ok(cache.get(name).map(|entry| Reference::Direct {
        name: entry.name.clone(),
        target: entry.oid,
        peel: entry.peel,
    }))
}

/// Resolve a ref name to its final object id, following symbolic ref chains
/// up to a bounded depth. `Ok(None)` signals an unborn branch: a symbolic
/// ref whose target does not (yet) exist.
pub(crate) fn resolve_to_oid(
    root: &Path,
    cache: &mut RefCache,
    name: &RefName,
) -> Result<Option<ObjectId>, RefError> {
    resolve_to_oid_inner(root, cache, name, 0)
}

fn resolve_to_oid_inner(
    root: &Path,
    cache: &mut RefCache,
    name: &RefName,
    depth: usize,
) -> Result<Option<ObjectId>, RefError> {
    if depth > MAX_SYMREF_DEPTH {
        return Err(RefError::SymrefLoop(name.to_string()));
    }
    match lookup(root, cache, name)? {
        Some(Reference::Direct { target, .. }) => Ok(Some(target)),
        Some(Reference::Symbolic { target, .. }) => {
            resolve_to_oid_inner(root, cache, &target, depth + 1)
        }
        None => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn oid(hex: &str) -> ObjectId {
        ObjectId::from_hex(hex).unwrap()
    }

    #[test]
    fn loose_shadows_packed() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        let name = RefName::new("refs/heads/main").unwrap();

        let packed_oid = oid("aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa");
        let loose_oid = oid("bbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbb");

        std::fs::create_dir_all(root.join("refs/heads")).unwrap();
        let bytes = super::super::packed::serialize(std::iter::once(
            super::super::packed::PackedEntry::new(name.clone(), packed_oid),
        ));
        std::fs::write(root.join("packed-refs"), bytes).unwrap();
        loose::write_loose_ref(root, &name, &loose_oid).unwrap();

        let mut cache = RefCache::new();
        let resolved = resolve_to_oid(root, &mut cache, &name).unwrap().unwrap();
        assert_eq!(resolved, loose_oid);
    }

    #[test]
    fn symref_loop_detected() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        let a = RefName::new("refs/heads/a").unwrap();
        let b = RefName::new("refs/heads/b").unwrap();
        loose::write_symbolic_ref(root, &a, &b).unwrap();
        loose::write_symbolic_ref(root, &b, &a).unwrap();

        let mut cache = RefCache::new();
        assert!(matches!(
            resolve_to_oid(root, &mut cache, &a),
            Err(RefError::SymrefLoop(_))
        ));
    }

    #[test]
    fn unborn_branch_resolves_to_none() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        let head = RefName::new("HEAD").unwrap();
        let target = RefName::new("refs/heads/main").unwrap();
        loose::write_symbolic_ref(root, &head, &target).unwrap();

        let mut cache = RefCache::new();
        assert!(resolve_to_oid(root, &mut cache, &head).unwrap().is_none());
        assert!(exists(root, &mut cache, &head).unwrap());
    }
}
