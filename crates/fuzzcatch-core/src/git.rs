//! Git staging-state queries for artifact detection and cleanup.
//!
//! The working tree and index are the source of truth for "did the fuzz
//! engine write a new corpus file": the detector stages everything, diffs
//! the index against HEAD, and the pipeline unstages again when it is done.
//! The caller guarantees exclusive use of the working directory for the
//! duration of one invocation.

use std::path::{Path, PathBuf};
use std::process::Output;

use tokio::process::Command;
use tracing::warn;

use crate::error::{FuzzcatchError, Result};

/// Handle to the git working directory the pipeline operates in.
#[derive(Debug, Clone)]
pub struct GitWorkspace {
    dir: PathBuf,
}

impl GitWorkspace {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// The working directory this workspace points at.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    async fn run(&self, args: &[&str]) -> Result<Output> {
        Command::new("git")
            .args(args)
            .current_dir(&self.dir)
            .output()
            .await
            .map_err(|e| FuzzcatchError::Git(format!("failed to run git: {e}")))
    }

    async fn run_checked(&self, args: &[&str]) -> Result<Output> {
        let output = self.run(args).await?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(FuzzcatchError::Git(format!(
                "git {} failed: {}",
                args.join(" "),
                stderr.trim()
            )));
        }
        Ok(output)
    }

    /// Stage all working-tree changes (`git add .`).
    pub async fn stage_all(&self) -> Result<()> {
        self.run_checked(&["add", "."]).await?;
        Ok(())
    }

    /// Whether the staged tree differs from HEAD.
    pub async fn has_staged_changes(&self) -> Result<bool> {
        let output = self
            .run(&["diff", "--cached", "--exit-code", "--quiet"])
            .await?;
        match output.status.code() {
            Some(0) => Ok(false),
            Some(1) => Ok(true),
            _ => {
                let stderr = String::from_utf8_lossy(&output.stderr);
                Err(FuzzcatchError::Git(format!(
                    "git diff --cached failed: {}",
                    stderr.trim()
                )))
            }
        }
    }

    /// List staged paths, additions and modifications only.
    pub async fn staged_paths(&self) -> Result<Vec<String>> {
        let output = self
            .run_checked(&[
                "diff",
                "--name-only",
                "--cached",
                "--no-renames",
                "--diff-filter=d",
            ])
            .await?;
        Ok(String::from_utf8_lossy(&output.stdout)
            .lines()
            .filter(|line| !line.is_empty())
            .map(str::to_string)
            .collect())
    }

    /// The staged diff of a single file, as unified patch text.
    pub async fn staged_patch(&self, path: &str) -> Result<String> {
        let output = self
            .run_checked(&["diff", "--cached", "--no-renames", "--", path])
            .await?;
        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }

    /// The commit id of HEAD.
    pub async fn head_oid(&self) -> Result<String> {
        let output = self.run_checked(&["rev-parse", "HEAD"]).await?;
        let oid = String::from_utf8_lossy(&output.stdout).trim().to_string();
        if oid.is_empty() {
            return Err(FuzzcatchError::Git(
                "git rev-parse HEAD returned empty output".to_string(),
            ));
        }
        Ok(oid)
    }

    /// Unstage everything (`git restore --staged .`).
    ///
    /// A non-zero exit is logged and ignored: this runs during cleanup,
    /// where a stale index must not mask the pipeline's real outcome.
    pub async fn restore_staged(&self) -> Result<()> {
        let output = self.run(&["restore", "--staged", "."]).await?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            warn!("git restore --staged exited non-zero: {}", stderr.trim());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;
    use std::process::Command as StdCommand;

    fn run_git(repo_dir: &Path, args: &[&str]) {
        let output = StdCommand::new("git")
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

    #[tokio::test]
    async fn test_head_oid_returns_40_hex_chars() {
        let repo = make_git_repo();
        let git = GitWorkspace::new(repo.path());
        let oid = git.head_oid().await.unwrap();
        assert_eq!(oid.len(), 40, "oid should be 40 hex chars, got: {oid}");
        assert!(oid.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[tokio::test]
    async fn test_head_oid_fails_outside_repo() {
        let dir = tempfile::tempdir().unwrap();
        let git = GitWorkspace::new(dir.path());
        assert!(git.head_oid().await.is_err());
    }

    #[tokio::test]
    async fn test_stage_and_list_new_file() {
        let repo = make_git_repo();
        let git = GitWorkspace::new(repo.path());

        assert!(!git.has_staged_changes().await.unwrap());

        std::fs::write(repo.path().join("hello.txt"), b"hello").unwrap();
        git.stage_all().await.unwrap();

        assert!(git.has_staged_changes().await.unwrap());
        assert_eq!(git.staged_paths().await.unwrap(), vec!["hello.txt"]);
    }

    #[tokio::test]
    async fn test_staged_patch_contains_added_lines() {
        let repo = make_git_repo();
        let git = GitWorkspace::new(repo.path());

        std::fs::write(repo.path().join("data.txt"), b"some seed\n").unwrap();
        git.stage_all().await.unwrap();

        let patch = git.staged_patch("data.txt").await.unwrap();
        assert!(patch.contains("+some seed"), "patch was: {patch}");
    }

    #[tokio::test]
    async fn test_restore_staged_clears_the_index() {
        let repo = make_git_repo();
        let git = GitWorkspace::new(repo.path());

        std::fs::write(repo.path().join("a.txt"), b"a").unwrap();
        git.stage_all().await.unwrap();
        assert!(git.has_staged_changes().await.unwrap());

        git.restore_staged().await.unwrap();
        assert!(!git.has_staged_changes().await.unwrap());
    }
}
