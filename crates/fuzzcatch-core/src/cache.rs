//! Fuzz corpus cache: key derivation and a best-effort local store.
//!
//! Restore matches historical keys by prefix (any commit of the same
//! `{os, package, regexp}` combination is a usable starting corpus); save
//! writes an exact key including the current commit id. Both directions
//! are best-effort: callers log failures as warnings and continue.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::{FuzzcatchError, Result};

/// Restore key prefix: `go-fuzz-<os>-<package>-<regexp>-`.
pub fn restore_key_prefix(os: &str, package_name: &str, fuzz_regexp: &str) -> String {
    format!("go-fuzz-{os}-{package_name}-{fuzz_regexp}-")
}

/// Exact save key: the restore prefix plus the current commit id.
pub fn save_key(os: &str, package_name: &str, fuzz_regexp: &str, commit: &str) -> String {
    format!("{}{commit}", restore_key_prefix(os, package_name, fuzz_regexp))
}

/// Directory-backed cache store, one subdirectory per key.
///
/// Key strings contain path separators (package names are slash-separated),
/// so keys are stored percent-free by replacing `/` with `__`.
pub struct DirCache {
    root: PathBuf,
}

impl DirCache {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn entry_name(key: &str) -> String {
        key.replace('/', "__")
    }

    /// Save `src` under the exact key. An existing entry for the same key
    /// is left untouched (the commit id makes the key content-stable).
    pub fn save(&self, key: &str, src: &Path) -> Result<()> {
        let dest = self.root.join(Self::entry_name(key));
        if dest.exists() {
            debug!(key, "cache entry already exists, skipping save");
            return Ok(());
        }
        if !src.exists() {
            return Err(FuzzcatchError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("cache source {} does not exist", src.display()),
            )));
        }
        fs::create_dir_all(&self.root)?;
        copy_tree(src, &dest)?;
        debug!(key, "cache entry saved");
        Ok(())
    }

    /// Restore the newest entry whose key starts with `prefix` into `dest`.
    /// Returns whether anything was restored.
    pub fn restore(&self, prefix: &str, dest: &Path) -> Result<bool> {
        let wanted = Self::entry_name(prefix);
        let mut newest: Option<(std::time::SystemTime, PathBuf)> = None;

        let entries = match fs::read_dir(&self.root) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(false),
            Err(e) => return Err(e.into()),
        };
        for entry in entries {
            let entry = entry?;
            let name = entry.file_name().to_string_lossy().to_string();
            if !name.starts_with(&wanted) {
                continue;
            }
            let modified = entry.metadata()?.modified()?;
            if newest.as_ref().map(|(t, _)| modified > *t).unwrap_or(true) {
                newest = Some((modified, entry.path()));
            }
        }

        let Some((_, path)) = newest else {
            debug!(prefix, "no cache entry matched");
            return Ok(false);
        };
        fs::create_dir_all(dest)?;
        copy_tree(&path, dest)?;
        debug!(prefix, entry = %path.display(), "cache entry restored");
        Ok(true)
    }
}

fn copy_tree(src: &Path, dest: &Path) -> Result<()> {
    fs::create_dir_all(dest)?;
    for entry in fs::read_dir(src)? {
        let entry = entry?;
        let target = dest.join(entry.file_name());
        if entry.file_type()?.is_dir() {
            copy_tree(&entry.path(), &target)?;
        } else {
            fs::copy(entry.path(), &target)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_save_key_is_an_exact_match_for_the_restore_prefix() {
        let prefix = restore_key_prefix("Linux", "example/fuzz", "^Fuzz");
        let key = save_key("Linux", "example/fuzz", "^Fuzz", "deadbeef");
        assert!(key.starts_with(&prefix));
        assert_eq!(key, "go-fuzz-Linux-example/fuzz-^Fuzz-deadbeef");
    }

    #[test]
    fn test_keys_differ_per_commit() {
        let a = save_key("Linux", "pkg", "^Fuzz", "aaaa");
        let b = save_key("Linux", "pkg", "^Fuzz", "bbbb");
        assert_ne!(a, b);
    }

    #[test]
    fn test_save_then_restore_roundtrip() {
        let tmp = tempfile::tempdir().unwrap();
        let src = tmp.path().join("fuzz");
        fs::create_dir_all(src.join("FuzzReverse")).unwrap();
        fs::write(src.join("FuzzReverse/corpus-1"), b"seed").unwrap();

        let cache = DirCache::new(tmp.path().join("store"));
        let key = save_key("Linux", "example/fuzz", "^Fuzz", "deadbeef");
        cache.save(&key, &src).unwrap();

        let dest = tmp.path().join("restored");
        let prefix = restore_key_prefix("Linux", "example/fuzz", "^Fuzz");
        assert!(cache.restore(&prefix, &dest).unwrap());
        assert_eq!(
            fs::read(dest.join("FuzzReverse/corpus-1")).unwrap(),
            b"seed"
        );
    }

    #[test]
    fn test_restore_without_match_is_a_miss() {
        let tmp = tempfile::tempdir().unwrap();
        let cache = DirCache::new(tmp.path().join("store"));
        let dest = tmp.path().join("restored");
        assert!(!cache.restore("go-fuzz-Linux-pkg-^Fuzz-", &dest).unwrap());
    }

    #[test]
    fn test_save_is_idempotent_per_key() {
        let tmp = tempfile::tempdir().unwrap();
        let src = tmp.path().join("fuzz");
        fs::create_dir_all(&src).unwrap();
        fs::write(src.join("a"), b"1").unwrap();

        let cache = DirCache::new(tmp.path().join("store"));
        cache.save("key-1", &src).unwrap();
        fs::write(src.join("a"), b"2").unwrap();
        cache.save("key-1", &src).unwrap();

        let dest = tmp.path().join("restored");
        assert!(cache.restore("key-", &dest).unwrap());
        assert_eq!(fs::read(dest.join("a")).unwrap(), b"1");
    }
}
