//! Reference database for the gitr git implementation.
//!
//! This crate stores and resolves git refs on top of a plain filesystem: a
//! ref is either a loose file under `refs/` (or a few special top-level
//! names like `HEAD`) or an entry in the `packed-refs` file. Loose refs take
//! precedence over packed ones of the same name.
//!
//! The sole backend is `files::FilesRefStore`. There is no transactional
//! multi-reference update here — callers that need atomic all-or-nothing
//! batches build that on top of single-reference `write`/`delete`, or wait
//! for a future backend that wants one.

mod error;
pub mod files;
mod name;
mod peel;
mod store;

pub use error::RefError;
pub use files::FilesRefStore;
pub use name::RefName;
pub use peel::{NoPeelSource, PeelSource};
pub use store::RefStore;

/// A git reference — either direct (points to an object) or symbolic (points
/// to another ref by name).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reference {
    /// Direct reference to an object, with an optional cached peeled oid
    /// (populated for packed tag entries once a repack has peeled them).
    Direct {
        name: RefName,
        target: git_hash::ObjectId,
        peel: Option<git_hash::ObjectId>,
    },
    /// Symbolic reference to another ref.
    Symbolic { name: RefName, target: RefName },
}

impl Reference {
    /// Get the ref name.
    pub fn name(&self) -> &RefName {
        match self {
            Reference::Direct { name, .. } => name,
            Reference::Symbolic { name, .. } => name,
        }
    }

    /// Is this a symbolic ref?
    pub fn is_symbolic(&self) -> bool {
        matches!(self, Reference::Symbolic { .. })
    }

    /// Is this a direct ref?
    pub fn is_direct(&self) -> bool {
        matches!(self, Reference::Direct { .. })
    }

    /// Get the target object id if this is a direct ref.
    pub fn target_oid(&self) -> Option<git_hash::ObjectId> {
        match self {
            Reference::Direct { target, .. } => Some(*target),
            Reference::Symbolic { .. } => None,
        }
    }

    /// Get the cached peeled object id, if this is a direct ref carrying one.
    pub fn peeled_oid(&self) -> Option<git_hash::ObjectId> {
        match self {
            Reference::Direct { peel, .. } => *peel,
            Reference::Symbolic { .. } => None,
        }
    }

    /// Get the symbolic target if this is a symbolic ref.
    pub fn symbolic_target(&self) -> Option<&RefName> {
        match self {
            Reference::Symbolic { target, .. } => Some(target),
            Reference::Direct { .. } => None,
        }
    }

    /// Resolve to a direct object id by following symbolic ref chains.
    pub fn peel_to_oid(&self, store: &dyn RefStore) -> Result<git_hash::ObjectId, RefError> {
        match self {
            Reference::Direct { target, .. } => Ok(*target),
            Reference::Symbolic { target, .. } => store
                .resolve_to_oid(target)?
                .ok_or_else(|| RefError::NotFound(target.to_string())),
        }
    }
}
