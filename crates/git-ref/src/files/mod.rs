pub(crate) mod cache;
mod compact;
mod iter;
pub(crate) mod loose;
mod mutate;
mod namespace;
pub mod packed;
mod view;

use std::cell::RefCell;
use std::path::{Path, PathBuf};

use bstr::BStr;
use git_hash::ObjectId;

use crate::error::RefError;
use crate::name::RefName;
use crate::peel::PeelSource;
use crate::store::RefStore;
use crate::Reference;

use self::cache::RefCache;

/// Files-backend reference store: loose refs as individual files under
/// `refs/` (plus a handful of special top-level names), packed refs in a
/// single `packed-refs` file, loose taking precedence over packed.
///
/// Designed for single-threaded use per instance (see the crate's
/// concurrency notes); the packed-refs cache is process-local and behind a
/// `RefCell` rather than a lock, since nothing here is meant to cross a
/// thread boundary on its own.
pub struct FilesRefStore {
    root: PathBuf,
    cache: RefCell<RefCache>,
}

impl FilesRefStore {
    /// Open a store rooted directly at `repo_dir` (no namespace).
    pub fn new(repo_dir: impl AsRef<Path>) -> Self {
        Self {
            root: repo_dir.as_ref().to_path_buf(),
            cache: RefCell::new(RefCache::new()),
        }
    }

    /// Open a store rooted at `repo_dir`'s namespaced subtree, creating the
    /// namespace directory hierarchy if it doesn't exist yet. See
    /// `refs/namespaces/<p1>/refs/namespaces/<p2>/...` translation.
    pub fn with_namespace(repo_dir: impl AsRef<Path>, namespace: &str) -> Result<Self, RefError> {
        let root = namespace::namespaced_root(repo_dir.as_ref(), Some(namespace))?;
        Ok(Self {
            root,
            cache: RefCell::new(RefCache::new()),
        })
    }

    /// The physical root this store operates under (post-namespace
    /// translation).
    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl RefStore for FilesRefStore {
    fn exists(&self, name: &RefName) -> Result<bool, RefError> {
        view::exists(&self.root, &mut self.cache.borrow_mut(), name)
    }

    fn lookup(&self, name: &RefName) -> Result<Option<Reference>, RefError> {
        view::lookup(&self.root, &mut self.cache.borrow_mut(), name)
    }

    fn resolve_to_oid(&self, name: &RefName) -> Result<Option<ObjectId>, RefError> {
        view::resolve_to_oid(&self.root, &mut self.cache.borrow_mut(), name)
    }

    fn iter(
        &self,
        glob: Option<&BStr>,
    ) -> Result<Box<dyn Iterator<Item = Result<Reference, RefError>> + '_>, RefError> {
        let refs = iter::iter_references(&self.root, &mut self.cache.borrow_mut(), glob)?;
        Ok(Box::new(refs.into_iter()))
    }

    fn iter_names(&self, glob: Option<&BStr>) -> Result<Box<dyn Iterator<Item = RefName> + '_>, RefError> {
        let names = iter::iter_names(&self.root, &mut self.cache.borrow_mut(), glob)?;
        Ok(Box::new(names.into_iter()))
    }

    fn write(&self, name: &RefName, target: ObjectId, force: bool) -> Result<(), RefError> {
        mutate::write(&self.root, &mut self.cache.borrow_mut(), name, target, force)
    }

    fn write_symbolic(&self, name: &RefName, target: RefName, force: bool) -> Result<(), RefError> {
        mutate::write_symbolic(&self.root, &mut self.cache.borrow_mut(), name, target, force)
    }

    fn delete(&self, name: &RefName) -> Result<(), RefError> {
        mutate::delete(&self.root, &mut self.cache.borrow_mut(), name)
    }

    fn rename(&self, old: &RefName, new: &RefName, force: bool) -> Result<(), RefError> {
        mutate::rename(&self.root, &mut self.cache.borrow_mut(), old, new, force)
    }

    fn compress(&self, peel_source: &dyn PeelSource) -> Result<(), RefError> {
        compact::compress(&self.root, &mut self.cache.borrow_mut(), peel_source)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::peel::NoPeelSource;

    fn oid(hex: &str) -> ObjectId {
        ObjectId::from_hex(hex).unwrap()
    }

    #[test]
    fn end_to_end_write_iterate_compress() {
        let dir = tempfile::tempdir().unwrap();
        let store = FilesRefStore::new(dir.path());
        let target = oid("da39a3ee5e6b4b0d3255bfef95601890afd80709");

        store.write(&RefName::new("refs/heads/main").unwrap(), target, false).unwrap();
        store.write(&RefName::new("refs/heads/feature").unwrap(), target, false).unwrap();
        store.write(&RefName::new("refs/tags/v1").unwrap(), target, false).unwrap();

        let names: Vec<_> = store.iter_names(None).unwrap().collect();
        assert_eq!(names.len(), 3);

        store.compress(&NoPeelSource).unwrap();
        assert!(store.exists(&RefName::new("refs/heads/main").unwrap()).unwrap());

        let refs: Vec<_> = store.iter(None).unwrap().collect::<Result<_, _>>().unwrap();
        assert_eq!(refs.len(), 3);
    }

    #[test]
    fn namespace_isolates_roots() {
        let dir = tempfile::tempdir().unwrap();
        let store = FilesRefStore::with_namespace(dir.path(), "p1/p2").unwrap();
        assert_eq!(
            store.root(),
            dir.path().join("refs/namespaces/p1/refs/namespaces/p2")
        );

        let target = oid("da39a3ee5e6b4b0d3255bfef95601890afd80709");
        store.write(&RefName::new("refs/heads/main").unwrap(), target, false).unwrap();
        assert!(dir
            .path()
            .join("refs/namespaces/p1/refs/namespaces/p2/refs/heads/main")
            .is_file());
    }

    #[test]
    fn delete_then_lookup_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = FilesRefStore::new(dir.path());
        let name = RefName::new("refs/heads/main").unwrap();
        let target = oid("da39a3ee5e6b4b0d3255bfef95601890afd80709");

        store.write(&name, target, false).unwrap();
        store.delete(&name).unwrap();
        assert!(store.lookup(&name).unwrap().is_none());
    }
}
