use bstr::BStr;
use git_hash::ObjectId;

use crate::error::RefError;
use crate::name::RefName;
use crate::peel::PeelSource;
use crate::Reference;

/// Operations a reference database backend exposes.
///
/// There is deliberately no transactional multi-reference update: every
/// mutation here is a single named reference, and the caller is responsible
/// for composing several of them if it needs an all-or-nothing batch.
///
/// Implementations are not required to be `Send`/`Sync` — see the crate's
/// concurrency notes: a store is meant to be used from one thread at a time,
/// with external locking (e.g. one store per process, guarded by the
/// filesystem lock files this crate already takes for each write) layered on
/// top by callers that need more.
pub trait RefStore {
    /// Does a reference by this name exist (loose or packed)?
    fn exists(&self, name: &RefName) -> Result<bool, RefError>;

    /// Look up a reference by name, loose taking precedence over packed.
    fn lookup(&self, name: &RefName) -> Result<Option<Reference>, RefError>;

    /// Resolve a ref name to its final object id, following symbolic ref
    /// chains. Returns `Ok(None)` for an unborn branch (a symbolic ref whose
    /// target doesn't exist yet).
    fn resolve_to_oid(&self, name: &RefName) -> Result<Option<ObjectId>, RefError>;

    /// Iterate references, most-specific (loose) view first, in sorted
    /// order, optionally filtered by a `git-check-ref-format`-style glob.
    fn iter(
        &self,
        glob: Option<&BStr>,
    ) -> Result<Box<dyn Iterator<Item = Result<Reference, RefError>> + '_>, RefError>;

    /// Same merge and sort as `iter`, but without reading loose file
    /// contents — useful when only the set of names is needed.
    fn iter_names(&self, glob: Option<&BStr>) -> Result<Box<dyn Iterator<Item = RefName> + '_>, RefError>;

    /// Write a direct reference, creating or overwriting it. `force` only
    /// waives the `AlreadyExists` check for an existing reference of this
    /// name; a path collision with a *different* reference (one name a
    /// strict path-prefix of the other) is rejected either way.
    fn write(&self, name: &RefName, target: ObjectId, force: bool) -> Result<(), RefError>;

    /// Write a symbolic reference, creating or overwriting it. `force` has
    /// the same meaning as in `write`.
    fn write_symbolic(&self, name: &RefName, target: RefName, force: bool) -> Result<(), RefError>;

    /// Delete a reference (loose and/or packed). Fails with
    /// `RefError::NotFound` if neither form existed.
    fn delete(&self, name: &RefName) -> Result<(), RefError>;

    /// Rename a reference, preserving its current value. Not atomic with
    /// respect to a reader observing the moment between the delete of `old`
    /// and the write of `new` (see the crate's concurrency notes).
    fn rename(&self, old: &RefName, new: &RefName, force: bool) -> Result<(), RefError>;

    /// Fold all loose references into the packed-refs file, peeling
    /// annotated tags via `peel_source` where not already known, and remove
    /// the loose files that were successfully packed.
    fn compress(&self, peel_source: &dyn PeelSource) -> Result<(), RefError>;
}
