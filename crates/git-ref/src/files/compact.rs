use std::path::Path;

use crate::error::RefError;
use crate::peel::PeelSource;
use crate::Reference;

use super::cache::{self, RefCache};
use super::loose;
use super::packed::{self, PackedEntry, PackedRefFlags};

/// Fold every loose reference into the packed-refs file, peeling annotated
/// tags where not already known, then remove the loose files that were
/// folded in.
///
/// Ordering matters for crash safety: the new packed file is committed
/// before any loose file is unlinked, so a crash before the commit leaves
/// both representations intact and a crash during unlink loses nothing (the
/// packed copy is already authoritative). Unlink failures are accumulated;
/// the first is reported once as many as possible have been removed.
pub(crate) fn compress(
    root: &Path,
    cache: &mut RefCache,
    peel_source: &dyn PeelSource,
) -> Result<(), RefError> {
    cache.refresh(&cache::packed_refs_path(root))?;
    let mut entries = cache.entries().clone();

    let mut was_loose = Vec::new();
    for name in loose::enumerate_loose_refs(root)? {
        match loose::read_loose_ref(root, &name)? {
            Some(read) => match read.reference {
                Reference::Direct { target, .. } => {
                    let mut entry = PackedEntry::new(name.clone(), target);
                    entry.flags.insert(PackedRefFlags::WAS_LOOSE);
                    entries.insert(name.clone(), entry);
                    was_loose.push(name);
                }
                Reference::Symbolic { .. } => {
                    // Symbolic refs have no oid to pack; left as loose files.
                }
            },
            None => {}
        }
    }

    for entry in entries.values_mut() {
        if entry.flags.intersects(PackedRefFlags::HAS_PEEL | PackedRefFlags::CANNOT_PEEL) {
            continue;
        }
        if let Some(target) = peel_source.peel_tag(&entry.oid)? {
            entry.peel = Some(target);
            entry.flags.insert(PackedRefFlags::HAS_PEEL);
        }
    }

    let packed_path = cache::packed_refs_path(root);
    let bytes = packed::serialize(entries.values().cloned());
    cache::write_packed_file(&packed_path, &bytes)?;

    let mut first_unlink_err = None;
    for name in &was_loose {
        if let Err(e) = loose::delete_loose_ref(root, name) {
            tracing::warn!(name = %name, error = %e, "failed to unlink loose ref after repack");
            if first_unlink_err.is_none() {
                first_unlink_err = Some(e);
            }
        }
    }

    cache.replace(entries, &packed_path)?;

    if let Some(e) = first_unlink_err {
        return Err(e);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::name::RefName;
    use crate::peel::NoPeelSource;
    use git_hash::ObjectId;

    fn oid(hex: &str) -> ObjectId {
        ObjectId::from_hex(hex).unwrap()
    }

    struct FakeOdb(std::collections::HashMap<ObjectId, ObjectId>);
    impl PeelSource for FakeOdb {
        fn peel_tag(&self, oid: &ObjectId) -> Result<Option<ObjectId>, RefError> {
            Ok(self.0.get(oid).copied())
        }
    }

    #[test]
    fn folds_loose_into_packed_and_removes_files() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        let mut cache = RefCache::new();
        let name = RefName::new("refs/heads/main").unwrap();
        let target = oid("da39a3ee5e6b4b0d3255bfef95601890afd80709");

        loose::write_loose_ref(root, &name, &target).unwrap();
        compress(root, &mut cache, &NoPeelSource).unwrap();

        assert!(!loose::loose_ref_path(root, &name).exists());
        assert!(cache.get(&name).is_some());
        assert!(cache.get(&name).unwrap().flags.contains(PackedRefFlags::WAS_LOOSE));
    }

    #[test]
    fn peels_tags_via_peel_source() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        let mut cache = RefCache::new();
        let name = RefName::new("refs/tags/v1").unwrap();
        let tag_oid = oid("aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa");
        let target_oid = oid("bbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbb");

        loose::write_loose_ref(root, &name, &tag_oid).unwrap();
        let mut odb = std::collections::HashMap::new();
        odb.insert(tag_oid, target_oid);
        compress(root, &mut cache, &FakeOdb(odb)).unwrap();

        let entry = cache.get(&name).unwrap();
        assert!(entry.flags.contains(PackedRefFlags::HAS_PEEL));
        assert_eq!(entry.peel, Some(target_oid));
    }

    #[test]
    fn idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        let mut cache = RefCache::new();
        let name = RefName::new("refs/heads/main").unwrap();
        let target = oid("da39a3ee5e6b4b0d3255bfef95601890afd80709");

        loose::write_loose_ref(root, &name, &target).unwrap();
        compress(root, &mut cache, &NoPeelSource).unwrap();
        compress(root, &mut cache, &NoPeelSource).unwrap();

        assert_eq!(cache.entries().len(), 1);
        assert_eq!(cache.get(&name).unwrap().oid, target);
    }
}
