//! Artifact detection against real git repositories.

use std::path::Path;
use std::process::Command;

use fuzzcatch_core::{find_new_corpus, GitWorkspace};

fn run_git(repo_dir: &Path, args: &[&str]) {
    let output = Command::new("git")
        .args(args)
        .current_dir(repo_dir)
        .output()
        .unwrap();
    assert!(
        output.status.success(),
        "git {:?} failed: {}",
        args,
        String::from_utf8_lossy(&output.stderr)
    );
}

fn make_git_repo() -> tempfile::TempDir {
    let dir = tempfile::tempdir().unwrap();
    run_git(dir.path(), &["init"]);
    run_git(dir.path(), &["config", "user.name", "test-user"]);
    run_git(dir.path(), &["config", "user.email", "test@example.com"]);
    run_git(dir.path(), &["commit", "--allow-empty", "-m", "initial"]);
    dir
}

fn write_file(repo: &Path, rel: &str, contents: &[u8]) {
    let path = repo.join(rel);
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(path, contents).unwrap();
}

#[tokio::test]
async fn single_new_corpus_file_is_detected() {
    let repo = make_git_repo();
    write_file(
        repo.path(),
        "example/fuzz/testdata/fuzz/FuzzReverse/abcdef",
        b"go test fuzz v1\n",
    );

    let git = GitWorkspace::new(repo.path());
    let artifact = find_new_corpus(&git).await.unwrap().unwrap();
    assert_eq!(artifact.path, "example/fuzz/testdata/fuzz/FuzzReverse/abcdef");
    assert_eq!(artifact.entry_point, "FuzzReverse");
    assert_eq!(artifact.case_id, "abcdef");
}

#[tokio::test]
async fn clean_tree_yields_no_artifact() {
    let repo = make_git_repo();
    let git = GitWorkspace::new(repo.path());
    assert!(find_new_corpus(&git).await.unwrap().is_none());
}

#[tokio::test]
async fn two_corpus_files_are_ambiguous() {
    let repo = make_git_repo();
    write_file(
        repo.path(),
        "pkg/testdata/fuzz/FuzzReverse/aaaa",
        b"go test fuzz v1\n",
    );
    write_file(
        repo.path(),
        "pkg/testdata/fuzz/FuzzParse/bbbb",
        b"go test fuzz v1\n",
    );

    let git = GitWorkspace::new(repo.path());
    assert!(find_new_corpus(&git).await.unwrap().is_none());
}

#[tokio::test]
async fn non_corpus_changes_yield_no_artifact() {
    let repo = make_git_repo();
    write_file(repo.path(), "pkg/reverse.go", b"package pkg\n");
    write_file(repo.path(), "go.sum", b"\n");

    let git = GitWorkspace::new(repo.path());
    assert!(find_new_corpus(&git).await.unwrap().is_none());
}

#[tokio::test]
async fn unrelated_changes_do_not_hide_the_corpus_file() {
    let repo = make_git_repo();
    write_file(
        repo.path(),
        "pkg/testdata/fuzz/FuzzReverse/abcdef",
        b"go test fuzz v1\n",
    );
    write_file(repo.path(), "go.sum", b"\n");

    let git = GitWorkspace::new(repo.path());
    let artifact = find_new_corpus(&git).await.unwrap().unwrap();
    assert_eq!(artifact.entry_point, "FuzzReverse");
}

#[tokio::test]
async fn entry_point_without_fuzz_prefix_is_ignored() {
    let repo = make_git_repo();
    write_file(
        repo.path(),
        "pkg/testdata/fuzz/TestReverse/abcdef",
        b"not a fuzz corpus\n",
    );

    let git = GitWorkspace::new(repo.path());
    assert!(find_new_corpus(&git).await.unwrap().is_none());
}
