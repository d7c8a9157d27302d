use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use bstr::ByteSlice;
use git_hash::ObjectId;
use git_utils::lockfile::LockFile;

use crate::error::RefError;
use crate::name::RefName;
use crate::Reference;

/// Result of reading a loose ref file, carrying the file's mtime so a caller
/// doing repeated polling can skip reparsing when nothing changed.
pub struct LooseRefRead {
    pub reference: Reference,
    pub mtime: Option<SystemTime>,
}

/// Does a loose ref file exist as a regular file? Unlike `read_loose_ref`,
/// this never reads or parses the file's content, so a loose file with
/// unparseable garbage in it still reports `true` here — existence and
/// well-formedness are different questions (spec: "no disambiguation
/// needed").
pub(crate) fn loose_ref_is_file(root: &Path, name: &RefName) -> Result<bool, RefError> {
    let path = loose_ref_path(root, name);
    match fs::metadata(&path) {
        Ok(m) => Ok(m.is_file()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(RefError::IoPath {
            path,
            source: e,
        }),
    }
}

/// Read a loose ref file and parse its contents.
///
/// Format: either `ref: <target>\n` (symbolic) or 40 lowercase hex bytes
/// optionally followed by whitespace (direct). Anything else is
/// `RefError::CorruptLooseRef`.
pub(crate) fn read_loose_ref(
    root: &Path,
    name: &RefName,
) -> Result<Option<LooseRefRead>, RefError> {
    let path = loose_ref_path(root, name);
    let metadata = match fs::metadata(&path) {
        Ok(m) => m,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => {
            return Err(RefError::IoPath {
                path: path.clone(),
                source: e,
            })
        }
    };
    if !metadata.is_file() {
        return Ok(None);
    }

    let contents = fs::read(&path).map_err(|e| RefError::IoPath {
        path: path.clone(),
        source: e,
    })?;
    let trimmed = contents.trim();

    let reference = parse_loose_contents(name, trimmed)?;
    Ok(Some(LooseRefRead {
        reference,
        mtime: metadata.modified().ok(),
    }))
}

fn parse_loose_contents(name: &RefName, trimmed: &[u8]) -> Result<Reference, RefError> {
    if let Some(target) = trimmed.strip_prefix(b"ref: ") {
        if target.is_empty() {
            return Err(corrupt(name, "symbolic ref has empty target"));
        }
        let target_str = target
            .to_str()
            .map_err(|_| corrupt(name, "symbolic ref target is not valid UTF-8"))?;
        let target_name = RefName::new(target_str)
            .map_err(|e| corrupt(name, &format!("invalid symbolic ref target: {e}")))?;
        return Ok(Reference::Symbolic {
            name: name.clone(),
            target: target_name,
        });
    }

    if trimmed.len() < 40 {
        return Err(corrupt(name, "too short to be an object id"));
    }
    let (hex, rest) = trimmed.split_at(40);
    if !rest.is_empty() && !rest[0].is_ascii_whitespace() {
        return Err(corrupt(name, "object id followed by non-whitespace"));
    }
    let hex = hex
        .to_str()
        .map_err(|_| corrupt(name, "object id is not valid UTF-8"))?;
    let oid = ObjectId::from_hex(hex).map_err(|e| corrupt(name, &format!("invalid object id: {e}")))?;

    Ok(Reference::Direct {
        name: name.clone(),
        target: oid,
        peel: None,
    })
}

fn corrupt(name: &RefName, reason: &str) -> RefError {
    RefError::CorruptLooseRef {
        name: name.to_string(),
        reason: reason.to_string(),
    }
}

/// Write a direct loose ref atomically.
pub(crate) fn write_loose_ref(root: &Path, name: &RefName, oid: &ObjectId) -> Result<(), RefError> {
    write_loose_contents(root, name, format!("{}\n", oid.to_hex()).as_bytes())
}

/// Write a symbolic loose ref atomically.
pub(crate) fn write_symbolic_ref(
    root: &Path,
    name: &RefName,
    target: &RefName,
) -> Result<(), RefError> {
    write_loose_contents(root, name, format!("ref: {}\n", target).as_bytes())
}

fn write_loose_contents(root: &Path, name: &RefName, contents: &[u8]) -> Result<(), RefError> {
    let path = loose_ref_path(root, name);

    // Clear a stale empty-directory shadow left by a previous delete, e.g.
    // deleting refs/heads/a/b can leave an empty refs/heads/a directory that
    // would block writing a ref literally named refs/heads/a.
    if path.is_dir() {
        let _ = remove_dir_if_empty(&path);
    }

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| RefError::IoPath {
            path: parent.to_path_buf(),
            source: e,
        })?;
    }

    let mut lock = LockFile::acquire(&path)?;
    lock.write_all(contents).map_err(|e| RefError::IoPath {
        path: path.clone(),
        source: e,
    })?;
    lock.commit()?;
    Ok(())
}

/// Delete the loose ref file, if present, and clean up any now-empty parent
/// directories under `refs/`. Returns whether a file was actually removed.
pub(crate) fn delete_loose_ref(root: &Path, name: &RefName) -> Result<bool, RefError> {
    let path = loose_ref_path(root, name);
    if !path.is_file() {
        return Ok(false);
    }
    fs::remove_file(&path).map_err(|e| RefError::IoPath {
        path: path.clone(),
        source: e,
    })?;

    let refs_dir = root.join("refs");
    let mut dir = path.parent().map(Path::to_path_buf);
    while let Some(d) = dir {
        if d == refs_dir || d == *root {
            break;
        }
        if remove_dir_if_empty(&d) {
            dir = d.parent().map(Path::to_path_buf);
        } else {
            break;
        }
    }
    Ok(true)
}

fn remove_dir_if_empty(dir: &Path) -> bool {
    match fs::read_dir(dir) {
        Ok(mut entries) if entries.next().is_none() => fs::remove_dir(dir).is_ok(),
        _ => false,
    }
}

const SPECIAL_REFS: &[&str] = &[
    "HEAD",
    "MERGE_HEAD",
    "CHERRY_PICK_HEAD",
    "REVERT_HEAD",
    "BISECT_HEAD",
    "ORIG_HEAD",
    "FETCH_HEAD",
    "AUTO_MERGE",
    "REBASE_HEAD",
];

/// Recursively collect every regular-file path under `<root>/refs/` (plus the
/// special top-level refs like `HEAD`) that is not `.lock`-suffixed, as
/// `RefName`s sorted by name.
pub(crate) fn enumerate_loose_refs(root: &Path) -> Result<Vec<RefName>, RefError> {
    let mut result = Vec::new();

    let refs_dir = root.join("refs");
    if refs_dir.is_dir() {
        collect_recursive(root, &refs_dir, &mut result)?;
    }

    for special in SPECIAL_REFS {
        let path = root.join(special);
        if path.is_file() {
            if let Ok(name) = RefName::new(*special) {
                result.push(name);
            }
        }
    }

    result.sort();
    Ok(result)
}

fn collect_recursive(root: &Path, dir: &Path, result: &mut Vec<RefName>) -> Result<(), RefError> {
    let entries = match fs::read_dir(dir) {
        Ok(e) => e,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
        Err(e) => {
            return Err(RefError::IoPath {
                path: dir.to_path_buf(),
                source: e,
            })
        }
    };

    for entry in entries {
        let entry = entry.map_err(|e| RefError::IoPath {
            path: dir.to_path_buf(),
            source: e,
        })?;
        let path = entry.path();

        if path.is_dir() {
            collect_recursive(root, &path, result)?;
            continue;
        }
        if !path.is_file() {
            continue;
        }

        let rel = path
            .strip_prefix(root)
            .map_err(|_| RefError::CorruptLooseRef {
                name: path.display().to_string(),
                reason: "path escapes repository root".into(),
            })?;
        let Some(name_str) = rel.to_str() else { continue };
        if name_str.ends_with(".lock") {
            continue;
        }
        // gitr uses '/' path separators in ref names even when read from a
        // platform path; normalize defensively.
        let name_str = name_str.replace(std::path::MAIN_SEPARATOR, "/");
        if let Ok(name) = RefName::new(name_str) {
            result.push(name);
        }
    }
    Ok(())
}

pub(crate) fn loose_ref_path(root: &Path, name: &RefName) -> PathBuf {
    root.join(name.as_str())
}
