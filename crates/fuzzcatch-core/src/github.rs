//! GitHub GraphQL client with classified remote errors.
//!
//! One endpoint, four operations: resolve a repository id, create a ref,
//! create a commit on a branch, open a pull request. The remote offers no
//! atomic multi-object commit, so every mutation is classified precisely
//! enough for the publisher to tell a harmless duplicate from a missing
//! permission from a real failure.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, error};

use crate::config::RunContext;
use crate::error::{FuzzcatchError, Result};

/// Header opting in to the next-generation global node id format.
const NEXT_GLOBAL_ID_HEADER: &str = "X-Github-Next-Global-ID";

// ref. https://docs.github.com/en/graphql/reference/queries#repository
const REPOSITORY_ID_QUERY: &str = "query ($owner: String!, $name: String!) {
  repository(owner: $owner, name: $name) {
    id
  }
}";

// ref. https://docs.github.com/en/graphql/reference/mutations#createref
const CREATE_REF_MUTATION: &str = "mutation ($input: CreateRefInput!) {
  createRef(input: $input) {
    clientMutationId
  }
}";

// ref. https://docs.github.com/en/graphql/reference/mutations#createcommitonbranch
const CREATE_COMMIT_MUTATION: &str = "mutation ($input: CreateCommitOnBranchInput!) {
  createCommitOnBranch(input: $input) {
    commit {
      oid
      url
    }
  }
}";

// ref. https://docs.github.com/en/graphql/reference/mutations#createpullrequest
const CREATE_PULL_REQUEST_MUTATION: &str = "mutation ($input: CreatePullRequestInput!) {
  createPullRequest(input: $input) {
    pullRequest {
      number
      url
    }
  }
}";

/// Fresh idempotency token for one mutation. Distinct per call; the remote
/// uses it to recognise accidental request coalescing, not client retries.
pub fn new_mutation_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

// ---------------------------------------------------------------------------
// Error classification
// ---------------------------------------------------------------------------

/// One entry of a GraphQL `errors` list.
#[derive(Debug, Clone, Deserialize)]
pub struct GraphqlError {
    /// Machine-readable error type (e.g. `FORBIDDEN`, `UNPROCESSABLE`).
    #[serde(rename = "type", default)]
    pub kind: String,

    /// Human-readable message.
    #[serde(default)]
    pub message: String,
}

/// Classification of a failed remote mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoteErrorKind {
    /// The credential lacks write access. Fatal.
    Permission,

    /// The target already exists. Recoverable at the call site.
    Conflict,

    /// Anything else. Fatal; the remote's messages are logged verbatim.
    Other,
}

/// Classify a GraphQL error list.
pub fn classify(errors: &[GraphqlError]) -> RemoteErrorKind {
    if errors.iter().any(|e| e.kind == "FORBIDDEN") {
        return RemoteErrorKind::Permission;
    }
    if errors.iter().any(|e| {
        e.kind == "UNPROCESSABLE" && e.message.to_ascii_lowercase().contains("already exists")
    }) {
        return RemoteErrorKind::Conflict;
    }
    RemoteErrorKind::Other
}

#[derive(Debug, Deserialize)]
struct GraphqlEnvelope {
    #[serde(default)]
    data: Option<Value>,

    #[serde(default)]
    errors: Vec<GraphqlError>,
}

// ---------------------------------------------------------------------------
// Transport
// ---------------------------------------------------------------------------

/// Seam over the HTTP layer: post one GraphQL request body, return the raw
/// response body.
#[async_trait]
pub trait GraphqlTransport: Send + Sync {
    async fn post(&self, request: &Value) -> Result<Value>;
}

/// reqwest-backed transport with bearer authentication.
pub struct HttpTransport {
    client: reqwest::Client,
    url: String,
    token: String,
}

impl HttpTransport {
    pub fn new(url: &str, token: &str) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("fuzzcatch/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            client,
            url: url.to_string(),
            token: token.to_string(),
        })
    }
}

#[async_trait]
impl GraphqlTransport for HttpTransport {
    async fn post(&self, request: &Value) -> Result<Value> {
        let response = self
            .client
            .post(&self.url)
            .bearer_auth(&self.token)
            .header(NEXT_GLOBAL_ID_HEADER, "1")
            .json(request)
            .send()
            .await?
            .error_for_status()?;
        Ok(response.json().await?)
    }
}

// ---------------------------------------------------------------------------
// Typed inputs and outputs
// ---------------------------------------------------------------------------

/// ref. https://docs.github.com/en/graphql/reference/input-objects#createrefinput
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateRefInput {
    pub client_mutation_id: String,

    /// Node id of the repository to create the ref in.
    pub repository_id: String,

    /// Fully qualified ref name (`refs/heads/...`).
    pub name: String,

    /// Commit id the new ref shall target.
    pub oid: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommitBranch {
    pub repository_name_with_owner: String,
    pub branch_name: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct FileAddition {
    pub path: String,

    /// Base64-encoded file contents.
    pub contents: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct FileDeletion {
    pub path: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct FileChanges {
    pub additions: Vec<FileAddition>,
    pub deletions: Vec<FileDeletion>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CommitMessage {
    pub headline: String,
    pub body: String,
}

/// ref. https://docs.github.com/en/graphql/reference/input-objects#createcommitonbranchinput
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateCommitInput {
    pub client_mutation_id: String,
    pub branch: CommitBranch,
    pub file_changes: FileChanges,

    /// Commit id the branch head is expected to be at. Guards, best-effort,
    /// against a concurrent external push between ref and commit creation.
    pub expected_head_oid: String,

    pub message: CommitMessage,
}

/// ref. https://docs.github.com/en/graphql/reference/input-objects#createpullrequestinput
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatePullRequestInput {
    pub base_ref_name: String,
    pub body: String,
    pub client_mutation_id: String,
    pub draft: bool,
    pub head_ref_name: String,
    pub head_repository_id: String,
    pub maintainer_can_modify: bool,
    pub repository_id: String,
    pub title: String,
}

/// Commit created by `createCommitOnBranch`.
#[derive(Debug, Clone, Deserialize)]
pub struct CreatedCommit {
    pub oid: String,
    pub url: String,
}

/// Pull request created by `createPullRequest`.
#[derive(Debug, Clone, Deserialize)]
pub struct CreatedPullRequest {
    pub number: u64,
    pub url: String,
}

#[derive(Debug, Deserialize)]
struct RepositoryIdData {
    repository: Option<RepositoryNode>,
}

#[derive(Debug, Deserialize)]
struct RepositoryNode {
    id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateCommitData {
    create_commit_on_branch: Option<CreateCommitNode>,
}

#[derive(Debug, Deserialize)]
struct CreateCommitNode {
    commit: CreatedCommit,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreatePullRequestData {
    create_pull_request: Option<CreatePullRequestNode>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreatePullRequestNode {
    pull_request: CreatedPullRequest,
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

/// Thin typed layer over one GraphQL endpoint.
pub struct GithubClient {
    transport: Arc<dyn GraphqlTransport>,
}

impl GithubClient {
    pub fn new(transport: Arc<dyn GraphqlTransport>) -> Self {
        Self { transport }
    }

    /// Client over HTTPS, configured from the run context.
    pub fn over_http(ctx: &RunContext) -> Result<Self> {
        let transport = HttpTransport::new(&ctx.graphql_url, ctx.require_token()?)?;
        Ok(Self::new(Arc::new(transport)))
    }

    /// Execute one request and return its `data` payload.
    ///
    /// Every remote-reported error message is logged at error level before
    /// a classified error is raised, so the operator always sees the
    /// remote's own wording even when the call site suppresses the error.
    async fn execute(&self, action: &'static str, query: &str, variables: Value) -> Result<Value> {
        let request = json!({ "query": query, "variables": variables });
        debug!(action, request = %request, "graphql request");

        let response = self.transport.post(&request).await?;
        debug!(action, response = %response, "graphql response");

        let envelope: GraphqlEnvelope = serde_json::from_value(response)?;
        if !envelope.errors.is_empty() {
            for entry in &envelope.errors {
                error!(action, error_type = %entry.kind, "{}", entry.message);
            }
            return Err(match classify(&envelope.errors) {
                RemoteErrorKind::Permission => FuzzcatchError::RemotePermission { action },
                RemoteErrorKind::Conflict => FuzzcatchError::RemoteConflict { action },
                RemoteErrorKind::Other => FuzzcatchError::Remote { action },
            });
        }
        envelope.data.ok_or(FuzzcatchError::Remote { action })
    }

    /// Resolve the repository's opaque node id from its owner and name.
    pub async fn repository_id(&self, owner: &str, name: &str) -> Result<String> {
        let action = "get repository id";
        let data = self
            .execute(
                action,
                REPOSITORY_ID_QUERY,
                json!({ "owner": owner, "name": name }),
            )
            .await?;
        let parsed: RepositoryIdData = serde_json::from_value(data)?;
        parsed
            .repository
            .map(|r| r.id)
            .ok_or(FuzzcatchError::Remote { action })
    }

    /// Create a ref at the given commit.
    pub async fn create_branch(&self, input: CreateRefInput) -> Result<()> {
        self.execute(
            "create a branch",
            CREATE_REF_MUTATION,
            json!({ "input": input }),
        )
        .await?;
        Ok(())
    }

    /// Create a commit on an existing branch.
    pub async fn create_commit(&self, input: CreateCommitInput) -> Result<CreatedCommit> {
        let action = "create a commit";
        let data = self
            .execute(action, CREATE_COMMIT_MUTATION, json!({ "input": input }))
            .await?;
        let parsed: CreateCommitData = serde_json::from_value(data)?;
        parsed
            .create_commit_on_branch
            .map(|node| node.commit)
            .ok_or(FuzzcatchError::Remote { action })
    }

    /// Open a pull request.
    pub async fn create_pull_request(
        &self,
        input: CreatePullRequestInput,
    ) -> Result<CreatedPullRequest> {
        let action = "create a pull request";
        let data = self
            .execute(
                action,
                CREATE_PULL_REQUEST_MUTATION,
                json!({ "input": input }),
            )
            .await?;
        let parsed: CreatePullRequestData = serde_json::from_value(data)?;
        parsed
            .create_pull_request
            .map(|node| node.pull_request)
            .ok_or(FuzzcatchError::Remote { action })
    }
}
