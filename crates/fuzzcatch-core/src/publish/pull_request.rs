//! Pull-request publisher.
//!
//! The remote API has no atomic multi-object commit, so publication is a
//! linear state machine over three mutations, each gated on the previous
//! one's output:
//!
//! ```text
//! ResolveRepository -> CreateBranch -> CreateCommit -> CreatePullRequest -> Done
//!                          |
//!                          v (branch already exists)
//!                      Suppressed
//! ```
//!
//! A branch-name conflict means this exact failure was already reported by
//! an earlier run; that exit is a normal `found: false` result, not an
//! error. Every other mutation failure is fatal.

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use tracing::info;

use crate::config::RunContext;
use crate::error::{FuzzcatchError, Result};
use crate::github::{
    new_mutation_id, CommitBranch, CommitMessage, CreateCommitInput, CreatePullRequestInput,
    CreateRefInput, FileAddition, FileChanges, GithubClient,
};
use crate::publish::{PublishResult, Publisher};
use crate::report::Report;

/// Publishes one failure report as a branch, commit, and pull request.
pub struct PullRequestPublisher {
    client: GithubClient,
    ctx: RunContext,
}

/// States of the publication sequence. Each state carries exactly the
/// remote identifiers the next mutation needs.
enum State {
    ResolveRepository,
    CreateBranch {
        repository_id: String,
    },
    CreateCommit {
        repository_id: String,
        head_branch: String,
    },
    CreatePullRequest {
        repository_id: String,
        head_branch: String,
    },
    Suppressed,
    Done(PublishResult),
}

impl PullRequestPublisher {
    pub fn new(client: GithubClient, ctx: RunContext) -> Self {
        Self { client, ctx }
    }

    /// Publisher over HTTPS, configured from the run context.
    pub fn over_http(ctx: RunContext) -> Result<Self> {
        let client = GithubClient::over_http(&ctx)?;
        Ok(Self::new(client, ctx))
    }

    async fn step(&self, state: State, report: &Report) -> Result<State> {
        match state {
            State::ResolveRepository => {
                let (owner, name) = self.ctx.owner_and_name()?;
                let repository_id = self.client.repository_id(owner, name).await?;
                Ok(State::CreateBranch { repository_id })
            }

            State::CreateBranch { repository_id } => {
                let head_branch = report.branch_name(&self.ctx.head_branch_prefix);
                let created = self
                    .client
                    .create_branch(CreateRefInput {
                        client_mutation_id: new_mutation_id(),
                        repository_id: repository_id.clone(),
                        name: format!("refs/heads/{head_branch}"),
                        oid: report.head_oid.clone(),
                    })
                    .await;
                match created {
                    Ok(()) => Ok(State::CreateCommit {
                        repository_id,
                        head_branch,
                    }),
                    Err(FuzzcatchError::RemoteConflict { .. }) => {
                        info!(
                            branch = %head_branch,
                            "branch already exists; this failure was already reported"
                        );
                        Ok(State::Suppressed)
                    }
                    Err(e) => Err(e),
                }
            }

            State::CreateCommit {
                repository_id,
                head_branch,
            } => {
                self.client
                    .create_commit(CreateCommitInput {
                        client_mutation_id: new_mutation_id(),
                        branch: CommitBranch {
                            repository_name_with_owner: self.ctx.repository.clone(),
                            branch_name: head_branch.clone(),
                        },
                        file_changes: FileChanges {
                            additions: vec![FileAddition {
                                path: report.artifact.path.clone(),
                                contents: BASE64.encode(&report.contents),
                            }],
                            deletions: vec![],
                        },
                        expected_head_oid: report.head_oid.clone(),
                        message: CommitMessage {
                            headline: report.commit_headline(),
                            body: report.commit_body(),
                        },
                    })
                    .await?;
                Ok(State::CreatePullRequest {
                    repository_id,
                    head_branch,
                })
            }

            State::CreatePullRequest {
                repository_id,
                head_branch,
            } => {
                let pr = self
                    .client
                    .create_pull_request(CreatePullRequestInput {
                        base_ref_name: self.ctx.base_branch.clone(),
                        body: report.pull_request_body(self.ctx.run_log_url().as_deref()),
                        client_mutation_id: new_mutation_id(),
                        draft: false,
                        head_ref_name: head_branch.clone(),
                        head_repository_id: repository_id.clone(),
                        maintainer_can_modify: true,
                        repository_id,
                        title: report.title(),
                    })
                    .await?;
                info!(number = pr.number, url = %pr.url, "pull request opened");
                Ok(State::Done(PublishResult {
                    found: true,
                    head_branch: Some(head_branch),
                    pull_request_number: Some(pr.number),
                    pull_request_url: Some(pr.url),
                }))
            }

            State::Suppressed => Ok(State::Done(PublishResult::not_found())),

            State::Done(result) => Ok(State::Done(result)),
        }
    }
}

#[async_trait]
impl Publisher for PullRequestPublisher {
    async fn publish(&self, report: &Report) -> Result<PublishResult> {
        let mut state = State::ResolveRepository;
        loop {
            state = match self.step(state, report).await? {
                State::Done(result) => return Ok(result),
                next => next,
            };
        }
    }
}
