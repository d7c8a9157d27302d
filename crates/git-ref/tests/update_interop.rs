//! Integration tests: verify ref update interoperability with C git.
//!
//! These tests update refs with gitr and verify with C git, then update with
//! C git and verify with gitr.

use std::process::Command;

use git_hash::ObjectId;
use git_ref::{FilesRefStore, RefName, RefStore};

fn setup_git_repo() -> (tempfile::TempDir, std::path::PathBuf) {
    let dir = tempfile::tempdir().unwrap();

    let status = Command::new("git")
        .args(["init"])
        .current_dir(dir.path())
        .stdout(std::process::Stdio::null())
        .stderr(std::process::Stdio::null())
        .status()
        .unwrap();
    assert!(status.success());

    let status = Command::new("git")
        .args(["commit", "--allow-empty", "-m", "initial commit"])
        .current_dir(dir.path())
        .env("GIT_AUTHOR_NAME", "Test")
        .env("GIT_AUTHOR_EMAIL", "test@example.com")
        .env("GIT_COMMITTER_NAME", "Test")
        .env("GIT_COMMITTER_EMAIL", "test@example.com")
        .stdout(std::process::Stdio::null())
        .stderr(std::process::Stdio::null())
        .status()
        .unwrap();
    assert!(status.success());

    let git_dir = dir.path().join(".git");
    (dir, git_dir)
}

fn git_rev_parse(repo_dir: &std::path::Path, refspec: &str) -> String {
    let output = Command::new("git")
        .args(["rev-parse", refspec])
        .current_dir(repo_dir)
        .output()
        .unwrap();
    assert!(
        output.status.success(),
        "git rev-parse {} failed: {}",
        refspec,
        String::from_utf8_lossy(&output.stderr)
    );
    String::from_utf8(output.stdout).unwrap().trim().to_string()
}

// ── Create ref with gitr, verify with C git ─────────────────────────────────

#[test]
fn create_branch_readable_by_c_git() {
    let (dir, git_dir) = setup_git_repo();
    let store = FilesRefStore::new(&git_dir);

    let head_oid_hex = git_rev_parse(dir.path(), "HEAD");
    let oid = ObjectId::from_hex(&head_oid_hex).unwrap();

    let name = RefName::new("refs/heads/gitr-branch").unwrap();
    store.write(&name, oid, false).unwrap();

    let c_oid = git_rev_parse(dir.path(), "refs/heads/gitr-branch");
    assert_eq!(c_oid, head_oid_hex);
}

#[test]
fn update_branch_readable_by_c_git() {
    let (dir, git_dir) = setup_git_repo();
    let store = FilesRefStore::new(&git_dir);

    let first_oid_hex = git_rev_parse(dir.path(), "HEAD");
    let first_oid = ObjectId::from_hex(&first_oid_hex).unwrap();

    let status = Command::new("git")
        .args(["commit", "--allow-empty", "-m", "second commit"])
        .current_dir(dir.path())
        .env("GIT_AUTHOR_NAME", "Test")
        .env("GIT_AUTHOR_EMAIL", "test@example.com")
        .env("GIT_COMMITTER_NAME", "Test")
        .env("GIT_COMMITTER_EMAIL", "test@example.com")
        .stdout(std::process::Stdio::null())
        .stderr(std::process::Stdio::null())
        .status()
        .unwrap();
    assert!(status.success());

    let second_oid_hex = git_rev_parse(dir.path(), "HEAD");
    let second_oid = ObjectId::from_hex(&second_oid_hex).unwrap();

    let name = RefName::new("refs/heads/test-update").unwrap();
    store.write(&name, first_oid, false).unwrap();
    store.write(&name, second_oid, true).unwrap();

    let c_oid = git_rev_parse(dir.path(), "refs/heads/test-update");
    assert_eq!(c_oid, second_oid_hex);
}

#[test]
fn delete_branch_verified_by_c_git() {
    let (dir, git_dir) = setup_git_repo();
    let store = FilesRefStore::new(&git_dir);

    let head_oid_hex = git_rev_parse(dir.path(), "HEAD");
    let oid = ObjectId::from_hex(&head_oid_hex).unwrap();

    let name = RefName::new("refs/heads/to-delete").unwrap();
    store.write(&name, oid, false).unwrap();
    assert_eq!(git_rev_parse(dir.path(), "refs/heads/to-delete"), head_oid_hex);

    store.delete(&name).unwrap();

    let output = Command::new("git")
        .args(["rev-parse", "refs/heads/to-delete"])
        .current_dir(dir.path())
        .output()
        .unwrap();
    assert!(!output.status.success(), "ref should not exist after delete");
}

// ── Update with C git, verify with gitr ─────────────────────────────────────

#[test]
fn read_c_git_branch_update() {
    let (dir, git_dir) = setup_git_repo();

    let status = Command::new("git")
        .args(["branch", "c-branch"])
        .current_dir(dir.path())
        .stdout(std::process::Stdio::null())
        .stderr(std::process::Stdio::null())
        .status()
        .unwrap();
    assert!(status.success());

    let c_oid = git_rev_parse(dir.path(), "refs/heads/c-branch");

    let store = FilesRefStore::new(&git_dir);
    let name = RefName::new("refs/heads/c-branch").unwrap();
    let gitr_oid = store.resolve_to_oid(&name).unwrap().unwrap();
    assert_eq!(gitr_oid.to_hex(), c_oid);
}

#[test]
fn write_without_force_rejects_existing_ref() {
    let (dir, git_dir) = setup_git_repo();
    let store = FilesRefStore::new(&git_dir);

    let head_oid_hex = git_rev_parse(dir.path(), "HEAD");
    let oid = ObjectId::from_hex(&head_oid_hex).unwrap();

    let name = RefName::new("refs/heads/no-force-test").unwrap();
    store.write(&name, oid, false).unwrap();

    let other_oid = ObjectId::from_hex("0000000000000000000000000000000000000002").unwrap();
    let result = store.write(&name, other_oid, false);
    assert!(result.is_err(), "write without force should reject an existing ref");

    // Original value should be unchanged
    let gitr_oid = store.resolve_to_oid(&name).unwrap().unwrap();
    assert_eq!(gitr_oid, oid);
}

#[test]
fn renamed_branch_readable_by_c_git() {
    let (dir, git_dir) = setup_git_repo();
    let store = FilesRefStore::new(&git_dir);

    let head_oid_hex = git_rev_parse(dir.path(), "HEAD");
    let oid = ObjectId::from_hex(&head_oid_hex).unwrap();

    let old = RefName::new("refs/heads/branch-a").unwrap();
    let new = RefName::new("refs/heads/branch-b").unwrap();
    store.write(&old, oid, false).unwrap();
    store.rename(&old, &new, false).unwrap();

    let c_oid = git_rev_parse(dir.path(), "refs/heads/branch-b");
    assert_eq!(c_oid, head_oid_hex);

    let output = Command::new("git")
        .args(["rev-parse", "refs/heads/branch-a"])
        .current_dir(dir.path())
        .output()
        .unwrap();
    assert!(!output.status.success(), "old name should be gone after rename");
}
