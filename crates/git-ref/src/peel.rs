//! Collaborator boundary between this crate and whatever stores objects.
//!
//! The compactor needs exactly one fact from an object database: given a tag
//! object's oid, what does it point at? `PeelSource` narrows that to a
//! single method instead of depending on `git-odb`/`git-object` for an
//! `OdbBackend::read` call and a tag-type match.

use git_hash::ObjectId;

use crate::error::RefError;

/// Minimal object-lookup capability a repack needs to peel annotated tags.
pub trait PeelSource {
    /// If `oid` names a tag object, return the oid it points at. Returns
    /// `Ok(None)` for any non-tag object (or, depending on the backend, an
    /// oid it doesn't have).
    fn peel_tag(&self, oid: &ObjectId) -> Result<Option<ObjectId>, RefError>;
}

/// A `PeelSource` that never peels anything, for callers (mostly tests) with
/// no object database handy. `compress()` still succeeds with it; packed
/// tags just keep `CANNOT_PEEL` unset and no peel line.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoPeelSource;

impl PeelSource for NoPeelSource {
    fn peel_tag(&self, _oid: &ObjectId) -> Result<Option<ObjectId>, RefError> {
        Ok(None)
    }
}
