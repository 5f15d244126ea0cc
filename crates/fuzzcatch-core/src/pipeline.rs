//! Fuzz run orchestration.
//!
//! One invocation is one strictly sequential pass: run the engine, detect
//! the new corpus file, build the report, dispatch it, clean up. Once an
//! artifact has been detected, cleanup (unstage everything, delete the
//! corpus file) runs on every exit path so the next run's diff baseline
//! stays clean.

use std::sync::Arc;

use tracing::{info, warn};

use crate::config::FuzzRunRequest;
use crate::corpus::{find_new_corpus, CorpusArtifact};
use crate::engine::FuzzEngine;
use crate::error::Result;
use crate::git::GitWorkspace;
use crate::publish::{PublishResult, Publisher};
use crate::report::Report;

/// Outcome of the capture phase of one fuzz run.
#[derive(Debug)]
pub enum FuzzRunOutcome {
    /// The engine exited cleanly; there is nothing to report.
    NoFailure,

    /// The engine failed but no single new corpus file could be isolated.
    /// Not an error: ambiguous or absent artifacts are unreportable.
    NoNewArtifact,

    /// The engine failed and exactly one new corpus file was detected.
    NewArtifact(Report),
}

/// Drives one fuzz run from engine invocation to published report.
pub struct FuzzPipeline {
    engine: Arc<dyn FuzzEngine>,
    publisher: Arc<dyn Publisher>,
}

impl FuzzPipeline {
    pub fn new(engine: Arc<dyn FuzzEngine>, publisher: Arc<dyn Publisher>) -> Self {
        Self { engine, publisher }
    }

    /// Run the engine and capture a report if it produced a new artifact.
    ///
    /// Cleanup is guaranteed once an artifact was detected, even when
    /// report construction fails.
    pub async fn capture(&self, request: &FuzzRunRequest) -> Result<FuzzRunOutcome> {
        let exit_code = self.engine.fuzz(request).await?;
        if exit_code == 0 {
            info!("no fuzzing error");
            return Ok(FuzzRunOutcome::NoFailure);
        }
        info!(exit_code, "fuzzing error occurred");

        let git = GitWorkspace::new(&request.working_dir);
        let Some(artifact) = find_new_corpus(&git).await? else {
            info!("no new corpus found");
            return Ok(FuzzRunOutcome::NoNewArtifact);
        };
        info!(path = %artifact.path, "new corpus found");

        match self.build_report(request, &git, &artifact).await {
            Ok(report) => Ok(FuzzRunOutcome::NewArtifact(report)),
            Err(e) => {
                if let Err(cleanup_err) = cleanup(request, &git, &artifact).await {
                    warn!(error = %cleanup_err, "cleanup failed after report construction error");
                }
                Err(e)
            }
        }
    }

    /// Run the full pipeline: capture, dispatch, clean up.
    pub async fn run(&self, request: &FuzzRunRequest) -> Result<PublishResult> {
        match self.capture(request).await? {
            FuzzRunOutcome::NoFailure | FuzzRunOutcome::NoNewArtifact => {
                Ok(PublishResult::not_found())
            }
            FuzzRunOutcome::NewArtifact(report) => {
                let git = GitWorkspace::new(&request.working_dir);
                let published = self.publisher.publish(&report).await;
                let cleaned = cleanup(request, &git, &report.artifact).await;
                match (published, cleaned) {
                    (Ok(result), Ok(())) => Ok(result),
                    // Leftover staged state would be read as a new artifact
                    // on the next run.
                    (Ok(_), Err(cleanup_err)) => Err(cleanup_err),
                    (Err(publish_err), Ok(())) => Err(publish_err),
                    (Err(publish_err), Err(cleanup_err)) => {
                        warn!(error = %cleanup_err, "cleanup failed after publish error");
                        Err(publish_err)
                    }
                }
            }
        }
    }

    async fn build_report(
        &self,
        request: &FuzzRunRequest,
        git: &GitWorkspace,
        artifact: &CorpusArtifact,
    ) -> Result<Report> {
        let package_name = self.engine.package_name(request).await?;
        let head_oid = git.head_oid().await?;
        let repro_output = self
            .engine
            .reproduce(request, &artifact.entry_point, &artifact.case_id)
            .await?;
        let contents = tokio::fs::read(request.working_dir.join(&artifact.path)).await?;
        let patch = git.staged_patch(&artifact.path).await?;

        Ok(Report {
            package_name,
            artifact: artifact.clone(),
            contents,
            patch: Some(patch),
            head_oid,
            repro_command: Report::repro_command_for(artifact, &request.packages),
            repro_output,
        })
    }
}

/// Unstage everything and delete the artifact file.
async fn cleanup(
    request: &FuzzRunRequest,
    git: &GitWorkspace,
    artifact: &CorpusArtifact,
) -> Result<()> {
    git.restore_staged().await?;
    tokio::fs::remove_file(request.working_dir.join(&artifact.path)).await?;
    Ok(())
}
