//! fuzzcatch core library
//!
//! Unattended regression capture for Go fuzz testing: run the engine for a
//! bounded time budget, detect the new failing corpus artifact via git
//! staging state, reproduce the failure, and publish a report as a pull
//! request or a chat webhook message.

pub mod cache;
pub mod config;
pub mod corpus;
pub mod engine;
pub mod error;
pub mod fakes;
pub mod git;
pub mod github;
pub mod pipeline;
pub mod publish;
pub mod report;
pub mod telemetry;

pub use config::{FuzzRunRequest, ReportMethod, RunContext};
pub use corpus::{find_new_corpus, single_new_corpus, CorpusArtifact, FUZZ_ENTRY_PREFIX};
pub use engine::{list_fuzz_targets, FuzzEngine, FuzzTarget, GoFuzzEngine};
pub use error::{FuzzcatchError, Result};
pub use git::GitWorkspace;
pub use github::{GithubClient, GraphqlTransport, HttpTransport};
pub use pipeline::{FuzzPipeline, FuzzRunOutcome};
pub use publish::{
    select_publisher, PublishResult, Publisher, PullRequestPublisher, WebhookPublisher,
};
pub use report::Report;
pub use telemetry::init_tracing;

/// fuzzcatch version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
