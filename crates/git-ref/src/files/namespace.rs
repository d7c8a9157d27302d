use std::fs;
use std::path::{Path, PathBuf};

use crate::error::RefError;

/// Translate a namespace string into the physical root a store operates
/// under, creating the directory hierarchy if needed.
///
/// `p1/p2/.../pk` becomes
/// `<repo>/refs/namespaces/p1/refs/namespaces/p2/.../refs/namespaces/pk`.
/// Without a namespace, the root is `<repo>` itself. Directory creation goes
/// through `fs::create_dir_all`, which already requests mode `0777` and lets
/// the kernel apply the process umask, matching every other directory this
/// crate creates under `refs/`.
pub(crate) fn namespaced_root(repo_root: &Path, namespace: Option<&str>) -> Result<PathBuf, RefError> {
    let Some(namespace) = namespace else {
        return Ok(repo_root.to_path_buf());
    };

    let mut root = repo_root.to_path_buf();
    for part in namespace.split('/').filter(|p| !p.is_empty()) {
        root = root.join("refs").join("namespaces").join(part);
    }

    fs::create_dir_all(&root).map_err(|e| RefError::IoPath {
        path: root.clone(),
        source: e,
    })?;

    Ok(root)
}
