//! Failure report composition for each delivery channel.

use crate::corpus::CorpusArtifact;

const ATTRIBUTION_URL: &str = "https://github.com/stevedores-org/fuzzcatch";

/// Everything a publisher needs to file one fuzz failure.
#[derive(Debug, Clone)]
pub struct Report {
    /// Resolved display name of the failing package.
    pub package_name: String,

    /// The newly added corpus file.
    pub artifact: CorpusArtifact,

    /// Raw corpus file contents.
    pub contents: Vec<u8>,

    /// Staged diff of the corpus file, for the webhook channel.
    pub patch: Option<String>,

    /// Local HEAD commit id the report was captured against. The published
    /// branch is created at this commit and the artifact commit is applied
    /// relative to it.
    pub head_oid: String,

    /// Command that deterministically reproduces the failure.
    pub repro_command: String,

    /// Captured output of the reproduction run.
    pub repro_output: String,
}

impl Report {
    /// The reproduction command for an artifact:
    /// `go test -run=<EntryPoint>/<CaseId> <packages>`.
    pub fn repro_command_for(artifact: &CorpusArtifact, packages: &str) -> String {
        format!(
            "go test -run={}/{} {}",
            artifact.entry_point, artifact.case_id, packages
        )
    }

    /// Head branch name: `<prefix>/<package>/<EntryPoint>/<CaseId>`.
    pub fn branch_name(&self, prefix: &str) -> String {
        format!(
            "{}/{}/{}/{}",
            prefix, self.package_name, self.artifact.entry_point, self.artifact.case_id
        )
    }

    /// Commit headline naming the entry point and package.
    pub fn commit_headline(&self) -> String {
        format!(
            "Add a new fuzz input data for {} in {}.",
            self.artifact.entry_point, self.package_name
        )
    }

    /// Commit body: reproduction command, its output, attribution.
    pub fn commit_body(&self) -> String {
        format!(
            "`{}` failed with the following output:\n\n```\n{}\n```\n\nThis fuzz data is generated by [fuzzcatch]({}).\n",
            self.repro_command, self.repro_output, ATTRIBUTION_URL
        )
    }

    /// One-line summary shared by the pull-request title and webhook text.
    pub fn title(&self) -> String {
        format!(
            "{} in the package {} failed",
            self.artifact.entry_point, self.package_name
        )
    }

    /// Pull-request body: mirrors the commit body, plus an attribution
    /// footer and an optional deep link to the triggering run's log.
    pub fn pull_request_body(&self, log_url: Option<&str>) -> String {
        let mut body = format!(
            "`{}` failed with the following output:\n\n```\n{}\n```\n\n---\n\nThis pull request is generated by [fuzzcatch]({}).\n",
            self.repro_command, self.repro_output, ATTRIBUTION_URL
        );
        if let Some(url) = log_url {
            body.push_str(&format!("\n[See the log]({url}).\n"));
        }
        body
    }
}
