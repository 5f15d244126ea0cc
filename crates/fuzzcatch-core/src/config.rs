//! Immutable configuration threaded through one pipeline invocation.
//!
//! Everything the pipeline needs from the invoking environment (repository,
//! credential, endpoint URLs, branch names, delivery channel) is resolved
//! once at the edge and carried in [`RunContext`]; the core never reads
//! process-global state.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::{FuzzcatchError, Result};

/// Report delivery channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ReportMethod {
    /// Open a pull request carrying the corpus file and reproduction log.
    PullRequest,

    /// Post one message to a chat webhook.
    Webhook,
}

/// Immutable context for one pipeline invocation.
#[derive(Debug, Clone)]
pub struct RunContext {
    /// Repository in `owner/name` form.
    pub repository: String,

    /// API credential. Required for the pull-request channel.
    pub token: Option<String>,

    /// GraphQL endpoint URL.
    pub graphql_url: String,

    /// Web server URL, used to build the run-log deep link.
    pub server_url: String,

    /// Identifier of the invoking pipeline run, when available.
    pub run_id: Option<String>,

    /// Attempt number of the invoking pipeline run, when available.
    pub run_attempt: Option<String>,

    /// Base branch that pull requests target.
    pub base_branch: String,

    /// Prefix for generated head branch names.
    pub head_branch_prefix: String,

    /// Selected delivery channel.
    pub report_method: ReportMethod,

    /// Webhook endpoint. Required for the webhook channel.
    pub webhook_url: Option<String>,
}

impl RunContext {
    /// Split `repository` into `(owner, name)`.
    pub fn owner_and_name(&self) -> Result<(&str, &str)> {
        self.repository
            .split_once('/')
            .filter(|(owner, name)| !owner.is_empty() && !name.is_empty())
            .ok_or_else(|| {
                FuzzcatchError::Config(format!(
                    "invalid repository {:?}: expected owner/name",
                    self.repository
                ))
            })
    }

    /// Deep link to the invoking run's log, when run identity is available.
    pub fn run_log_url(&self) -> Option<String> {
        match (&self.run_id, &self.run_attempt) {
            (Some(id), Some(attempt)) => Some(format!(
                "{}/{}/actions/runs/{}/attempts/{}",
                self.server_url, self.repository, id, attempt
            )),
            _ => None,
        }
    }

    /// The credential, or a configuration error naming what is missing.
    pub fn require_token(&self) -> Result<&str> {
        self.token
            .as_deref()
            .ok_or_else(|| FuzzcatchError::Config("missing API token".to_string()))
    }
}

/// Input to one fuzz orchestration pass. Constructed once, read-only after.
#[derive(Debug, Clone)]
pub struct FuzzRunRequest {
    /// Package selector passed to the engine (e.g. `./...`).
    pub packages: String,

    /// Regular expression selecting which fuzz entry point to run.
    pub fuzz_regexp: String,

    /// Total fuzz time budget, in the engine's duration syntax (e.g. `300s`).
    pub fuzz_time: String,

    /// Minimization time budget, in the engine's duration syntax.
    pub fuzz_minimize_time: String,

    /// Directory the engine and version-control queries run in.
    pub working_dir: PathBuf,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn context() -> RunContext {
        RunContext {
            repository: "octo/example".to_string(),
            token: Some("t0ken".to_string()),
            graphql_url: "https://api.github.com/graphql".to_string(),
            server_url: "https://github.com".to_string(),
            run_id: Some("12345".to_string()),
            run_attempt: Some("2".to_string()),
            base_branch: "main".to_string(),
            head_branch_prefix: "gofuzz".to_string(),
            report_method: ReportMethod::PullRequest,
            webhook_url: None,
        }
    }

    #[test]
    fn test_owner_and_name_splits_repository() {
        let ctx = context();
        let (owner, name) = ctx.owner_and_name().unwrap();
        assert_eq!(owner, "octo");
        assert_eq!(name, "example");
    }

    #[test]
    fn test_owner_and_name_rejects_malformed_repository() {
        let mut ctx = context();
        ctx.repository = "no-slash".to_string();
        assert!(ctx.owner_and_name().is_err());

        ctx.repository = "/name".to_string();
        assert!(ctx.owner_and_name().is_err());
    }

    #[test]
    fn test_run_log_url_requires_both_id_and_attempt() {
        let ctx = context();
        assert_eq!(
            ctx.run_log_url().unwrap(),
            "https://github.com/octo/example/actions/runs/12345/attempts/2"
        );

        let mut ctx = context();
        ctx.run_attempt = None;
        assert!(ctx.run_log_url().is_none());
    }

    #[test]
    fn test_report_method_serde_uses_kebab_case() {
        let json = serde_json::to_string(&ReportMethod::PullRequest).unwrap();
        assert_eq!(json, "\"pull-request\"");
        let parsed: ReportMethod = serde_json::from_str("\"webhook\"").unwrap();
        assert_eq!(parsed, ReportMethod::Webhook);
    }
}
