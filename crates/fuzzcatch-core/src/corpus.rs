//! New-corpus detection from git staging state.
//!
//! A fuzz corpus file always lands under the fixed four-segment suffix
//! `<pkg>/testdata/fuzz/<EntryPoint>/<CaseId>`, where the entry point name
//! carries the engine's naming convention prefix. That suffix is what
//! discriminates corpus files from any other change the run left behind.

use tracing::info;

use crate::error::Result;
use crate::git::GitWorkspace;

/// Fixed naming-convention prefix of fuzz entry points.
pub const FUZZ_ENTRY_PREFIX: &str = "Fuzz";

/// A newly added fuzz corpus file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CorpusArtifact {
    /// Repo-relative path of the corpus file.
    pub path: String,

    /// Name of the fuzz entry point (second-to-last path segment).
    pub entry_point: String,

    /// Case identifier (last path segment).
    pub case_id: String,
}

impl CorpusArtifact {
    /// Parse a changed path into a corpus artifact, if it matches the
    /// `.../testdata/fuzz/<EntryPoint>/<CaseId>` suffix.
    pub fn from_path(path: &str) -> Option<Self> {
        let segments: Vec<&str> = path.split('/').collect();
        let n = segments.len();
        if n < 4 {
            return None;
        }
        if segments[n - 4] != "testdata" || segments[n - 3] != "fuzz" {
            return None;
        }
        let entry_point = segments[n - 2];
        let case_id = segments[n - 1];
        if !entry_point.starts_with(FUZZ_ENTRY_PREFIX) || case_id.is_empty() {
            return None;
        }
        Some(Self {
            path: path.to_string(),
            entry_point: entry_point.to_string(),
            case_id: case_id.to_string(),
        })
    }
}

/// Pick the single new corpus file out of a changed-path list.
///
/// Zero matches means the failure left no corpus behind; two or more means
/// the failure cannot be attributed to one entry point without guessing.
/// Both cases yield `None`.
pub fn single_new_corpus(paths: &[String]) -> Option<CorpusArtifact> {
    let mut candidates: Vec<CorpusArtifact> = paths
        .iter()
        .filter_map(|p| CorpusArtifact::from_path(p))
        .collect();
    if candidates.len() != 1 {
        return None;
    }
    Some(candidates.remove(0))
}

/// Stage all changes and locate the single newly added corpus file, if any.
pub async fn find_new_corpus(git: &GitWorkspace) -> Result<Option<CorpusArtifact>> {
    git.stage_all().await?;
    if !git.has_staged_changes().await? {
        return Ok(None);
    }

    let paths = git.staged_paths().await?;
    let artifact = single_new_corpus(&paths);
    if artifact.is_none() {
        info!(
            changed = paths.len(),
            "staged changes did not isolate exactly one corpus file"
        );
    }
    Ok(artifact)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn paths(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_from_path_accepts_corpus_suffix() {
        let artifact =
            CorpusArtifact::from_path("example/fuzz/testdata/fuzz/FuzzReverse/abcdef").unwrap();
        assert_eq!(artifact.entry_point, "FuzzReverse");
        assert_eq!(artifact.case_id, "abcdef");
        assert_eq!(artifact.path, "example/fuzz/testdata/fuzz/FuzzReverse/abcdef");
    }

    #[test]
    fn test_from_path_requires_four_segments() {
        assert!(CorpusArtifact::from_path("testdata/fuzz/FuzzX").is_none());
        // exactly four segments is the minimum
        assert!(CorpusArtifact::from_path("testdata/fuzz/FuzzX/seed").is_some());
    }

    #[test]
    fn test_from_path_requires_entry_point_prefix() {
        assert!(CorpusArtifact::from_path("pkg/testdata/fuzz/TestReverse/abcdef").is_none());
        assert!(CorpusArtifact::from_path("pkg/testdata/fuzz/fuzzreverse/abcdef").is_none());
    }

    #[test]
    fn test_from_path_rejects_other_testdata_files() {
        assert!(CorpusArtifact::from_path("pkg/testdata/golden/FuzzX/abcdef").is_none());
        assert!(CorpusArtifact::from_path("pkg/fuzz/testdata/FuzzX/abcdef").is_none());
        assert!(CorpusArtifact::from_path("README.md").is_none());
    }

    #[test]
    fn test_single_new_corpus_exactly_one_match() {
        let artifact = single_new_corpus(&paths(&[
            "pkg/testdata/fuzz/FuzzReverse/abcdef",
            "pkg/reverse.go",
            "go.sum",
        ]))
        .unwrap();
        assert_eq!(artifact.entry_point, "FuzzReverse");
    }

    #[test]
    fn test_single_new_corpus_zero_matches() {
        assert!(single_new_corpus(&paths(&["pkg/reverse.go", "go.sum"])).is_none());
        assert!(single_new_corpus(&[]).is_none());
    }

    #[test]
    fn test_single_new_corpus_multiple_matches_is_ambiguous() {
        assert!(single_new_corpus(&paths(&[
            "pkg/testdata/fuzz/FuzzReverse/abcdef",
            "pkg/testdata/fuzz/FuzzParse/012345",
        ]))
        .is_none());
    }
}
