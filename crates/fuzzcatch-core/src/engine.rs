//! Go fuzz engine invocations.
//!
//! The engine is an opaque external process. A non-zero exit from a fuzz
//! or reproduction run is an expected outcome, never a tooling error; only
//! a process that cannot start (or listing output that cannot be parsed)
//! is fatal.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::process::Command;
use tracing::{debug, info};

use crate::config::FuzzRunRequest;
use crate::error::{FuzzcatchError, Result};

/// Seam over the external fuzz engine.
#[async_trait]
pub trait FuzzEngine: Send + Sync {
    /// Run the engine with the request's budgets; returns the exit code.
    async fn fuzz(&self, request: &FuzzRunRequest) -> Result<i32>;

    /// Re-run a single failing case and capture its output verbatim,
    /// regardless of exit status.
    async fn reproduce(
        &self,
        request: &FuzzRunRequest,
        entry_point: &str,
        case_id: &str,
    ) -> Result<String>;

    /// Resolve the request's package selector to a display name.
    async fn package_name(&self, request: &FuzzRunRequest) -> Result<String>;

    /// Directory holding the engine's persistent fuzz corpus cache.
    async fn fuzz_cache_dir(&self, working_dir: &Path) -> Result<PathBuf>;
}

/// `go test`-backed engine.
#[derive(Debug, Clone, Default)]
pub struct GoFuzzEngine;

impl GoFuzzEngine {
    pub fn new() -> Self {
        Self
    }

    async fn go_output(working_dir: &Path, args: &[String]) -> Result<std::process::Output> {
        Command::new("go")
            .args(args)
            .current_dir(working_dir)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|e| FuzzcatchError::Toolchain(format!("failed to run go: {e}")))
    }
}

#[async_trait]
impl FuzzEngine for GoFuzzEngine {
    async fn fuzz(&self, request: &FuzzRunRequest) -> Result<i32> {
        info!(
            regexp = %request.fuzz_regexp,
            fuzz_time = %request.fuzz_time,
            minimize_time = %request.fuzz_minimize_time,
            packages = %request.packages,
            "fuzzing"
        );
        // Output streams straight to the operator's log; only the exit
        // status matters here.
        let status = Command::new("go")
            .args([
                "test".to_string(),
                format!("-fuzz={}", request.fuzz_regexp),
                format!("-fuzztime={}", request.fuzz_time),
                format!("-fuzzminimizetime={}", request.fuzz_minimize_time),
                request.packages.clone(),
            ])
            .current_dir(&request.working_dir)
            .status()
            .await
            .map_err(|e| FuzzcatchError::Toolchain(format!("failed to run go: {e}")))?;
        Ok(status.code().unwrap_or(-1))
    }

    async fn reproduce(
        &self,
        request: &FuzzRunRequest,
        entry_point: &str,
        case_id: &str,
    ) -> Result<String> {
        let args = vec![
            "test".to_string(),
            format!("-run={entry_point}/{case_id}"),
            request.packages.clone(),
        ];
        let output = Self::go_output(&request.working_dir, &args).await?;
        debug!(exit_code = output.status.code().unwrap_or(-1), "reproduction run finished");
        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }

    async fn package_name(&self, request: &FuzzRunRequest) -> Result<String> {
        let args = vec!["list".to_string(), request.packages.clone()];
        let output = Self::go_output(&request.working_dir, &args).await?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(FuzzcatchError::Toolchain(format!(
                "go list {} failed: {}",
                request.packages,
                stderr.trim()
            )));
        }
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }

    async fn fuzz_cache_dir(&self, working_dir: &Path) -> Result<PathBuf> {
        let args = vec!["env".to_string(), "GOCACHE".to_string()];
        let output = Self::go_output(working_dir, &args).await?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(FuzzcatchError::Toolchain(format!(
                "go env GOCACHE failed: {}",
                stderr.trim()
            )));
        }
        let cache = String::from_utf8_lossy(&output.stdout).trim().to_string();
        if cache.is_empty() {
            return Err(FuzzcatchError::Toolchain(
                "go env GOCACHE returned empty output".to_string(),
            ));
        }
        Ok(PathBuf::from(cache).join("fuzz"))
    }
}

// ---------------------------------------------------------------------------
// Fuzz target listing (test2json)
// ---------------------------------------------------------------------------

/// One event line of `go test -json` output.
/// ref. https://pkg.go.dev/cmd/test2json
#[derive(Debug, Clone, Deserialize)]
struct TestEvent {
    #[serde(rename = "Action")]
    action: String,

    #[serde(rename = "Package", default)]
    package: String,

    #[serde(rename = "Output", default)]
    output: Option<String>,
}

/// A fuzz entry point discovered by listing.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FuzzTarget {
    /// Import path of the package the entry point lives in.
    pub package: String,

    /// Anchored regexp selecting exactly this entry point (`^Name$`).
    pub func: String,
}

/// Parse `go test -list ^Fuzz -json` output into sorted fuzz targets.
pub fn parse_fuzz_list(stdout: &str) -> Result<Vec<FuzzTarget>> {
    let mut targets = Vec::new();
    for line in stdout.lines().filter(|l| !l.is_empty()) {
        let event: TestEvent = serde_json::from_str(line).map_err(|e| {
            FuzzcatchError::Toolchain(format!("unparsable go test -json line: {e}"))
        })?;
        if event.action != "output" {
            continue;
        }
        let Some(output) = event.output else { continue };
        let name = output.trim();
        if !name.starts_with(crate::corpus::FUZZ_ENTRY_PREFIX) {
            continue;
        }
        targets.push(FuzzTarget {
            package: event.package,
            func: format!("^{name}$"),
        });
    }
    // Stable order keeps downstream pipeline matrices deterministic.
    targets.sort();
    Ok(targets)
}

/// List fuzz entry points in the given packages.
pub async fn list_fuzz_targets(
    working_dir: &Path,
    packages: &[String],
    tags: Option<&str>,
) -> Result<Vec<FuzzTarget>> {
    let mut args = vec![
        "test".to_string(),
        "-list".to_string(),
        format!("^{}", crate::corpus::FUZZ_ENTRY_PREFIX),
        "-json".to_string(),
        "-run".to_string(),
        "^$".to_string(),
    ];
    if let Some(tags) = tags {
        args.push("-tags".to_string());
        args.push(tags.to_string());
    }
    args.extend(packages.iter().cloned());

    let output = GoFuzzEngine::go_output(working_dir, &args).await?;
    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(FuzzcatchError::Toolchain(format!(
            "go test -list failed: {}",
            stderr.trim()
        )));
    }
    parse_fuzz_list(&String::from_utf8_lossy(&output.stdout))
}
