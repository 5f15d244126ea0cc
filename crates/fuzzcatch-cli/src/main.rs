//! fuzzcatch - capture Go fuzz regressions from automated pipelines.
//!
//! ## Commands
//!
//! - `run`: fuzz for a bounded time budget and report a new failing input
//! - `list`: enumerate fuzz entry points (for pipeline matrix generation)
//! - `save-cache`: persist the engine's fuzz corpus cache (post-run step)

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use tracing::warn;

use fuzzcatch_core::cache::{restore_key_prefix, save_key, DirCache};
use fuzzcatch_core::{
    list_fuzz_targets, select_publisher, FuzzEngine, FuzzPipeline, FuzzRunRequest, GitWorkspace,
    GoFuzzEngine, ReportMethod, RunContext,
};

#[derive(Parser)]
#[command(name = "fuzzcatch")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Capture Go fuzz regressions and file them as pull requests", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum ReportMethodArg {
    /// Open a pull request carrying the corpus file
    PullRequest,

    /// Post a message to a chat webhook
    Webhook,
}

impl From<ReportMethodArg> for ReportMethod {
    fn from(arg: ReportMethodArg) -> Self {
        match arg {
            ReportMethodArg::PullRequest => ReportMethod::PullRequest,
            ReportMethodArg::Webhook => ReportMethod::Webhook,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Run the fuzz engine and report a new failing input, if any
    Run {
        /// Package selector passed to the engine
        #[arg(long, default_value = "./...")]
        packages: String,

        /// Directory to run in
        #[arg(long, default_value = ".")]
        working_directory: PathBuf,

        /// Regexp selecting which fuzz entry point to run
        #[arg(long, default_value = "^Fuzz")]
        fuzz_regexp: String,

        /// Total fuzz time budget (engine duration syntax)
        #[arg(long, default_value = "300s")]
        fuzz_time: String,

        /// Minimization time budget (engine duration syntax)
        #[arg(long, default_value = "60s")]
        fuzz_minimize_time: String,

        /// Repository in owner/name form
        #[arg(long, env = "GITHUB_REPOSITORY")]
        repository: String,

        /// API token with contents and pull-request write access
        #[arg(long, env = "GITHUB_TOKEN", hide_env_values = true)]
        github_token: Option<String>,

        /// GraphQL endpoint
        #[arg(long, env = "GITHUB_GRAPHQL_URL", default_value = "https://api.github.com/graphql")]
        graphql_url: String,

        /// Web server URL, used for run-log deep links
        #[arg(long, env = "GITHUB_SERVER_URL", default_value = "https://github.com")]
        server_url: String,

        /// Identifier of the invoking pipeline run
        #[arg(long, env = "GITHUB_RUN_ID")]
        run_id: Option<String>,

        /// Attempt number of the invoking pipeline run
        #[arg(long, env = "GITHUB_RUN_ATTEMPT")]
        run_attempt: Option<String>,

        /// Base branch pull requests target
        #[arg(long, default_value = "main")]
        base_branch: String,

        /// Prefix for generated head branch names
        #[arg(long, default_value = "gofuzz")]
        head_branch_prefix: String,

        /// Report delivery channel
        #[arg(long, value_enum, default_value = "pull-request")]
        report_method: ReportMethodArg,

        /// Webhook endpoint for the webhook channel
        #[arg(long, env = "FUZZCATCH_WEBHOOK_URL", hide_env_values = true)]
        webhook_url: Option<String>,

        /// Local corpus cache directory (restored before the run)
        #[arg(long)]
        cache_dir: Option<PathBuf>,
    },

    /// List fuzz entry points in the given packages as JSON
    List {
        /// Directory to run in
        #[arg(long, default_value = ".")]
        working_directory: PathBuf,

        /// Build tags passed to the engine
        #[arg(long)]
        tags: Option<String>,

        /// Package selectors
        #[arg(default_value = "./...")]
        packages: Vec<String>,
    },

    /// Save the engine's fuzz corpus cache (post-run step)
    SaveCache {
        /// Package selector the run used
        #[arg(long, default_value = "./...")]
        packages: String,

        /// Directory the run executed in
        #[arg(long, default_value = ".")]
        working_directory: PathBuf,

        /// Regexp the run used
        #[arg(long, default_value = "^Fuzz")]
        fuzz_regexp: String,

        /// Local corpus cache directory
        #[arg(long)]
        cache_dir: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    fuzzcatch_core::init_tracing(cli.json, cli.verbose);

    match cli.command {
        Commands::Run {
            packages,
            working_directory,
            fuzz_regexp,
            fuzz_time,
            fuzz_minimize_time,
            repository,
            github_token,
            graphql_url,
            server_url,
            run_id,
            run_attempt,
            base_branch,
            head_branch_prefix,
            report_method,
            webhook_url,
            cache_dir,
        } => {
            let ctx = RunContext {
                repository,
                token: github_token,
                graphql_url,
                server_url,
                run_id,
                run_attempt,
                base_branch,
                head_branch_prefix,
                report_method: report_method.into(),
                webhook_url,
            };
            let request = FuzzRunRequest {
                packages,
                fuzz_regexp,
                fuzz_time,
                fuzz_minimize_time,
                working_dir: working_directory,
            };
            cmd_run(ctx, request, cache_dir.as_deref()).await
        }
        Commands::List {
            working_directory,
            tags,
            packages,
        } => cmd_list(&working_directory, tags.as_deref(), &packages).await,
        Commands::SaveCache {
            packages,
            working_directory,
            fuzz_regexp,
            cache_dir,
        } => {
            let request = FuzzRunRequest {
                packages,
                fuzz_regexp,
                fuzz_time: String::new(),
                fuzz_minimize_time: String::new(),
                working_dir: working_directory,
            };
            cmd_save_cache(&request, &cache_dir).await
        }
    }
}

/// Run the full capture pipeline once.
async fn cmd_run(ctx: RunContext, request: FuzzRunRequest, cache_dir: Option<&Path>) -> Result<()> {
    let engine = Arc::new(GoFuzzEngine::new());

    if let Some(cache_dir) = cache_dir {
        restore_corpus_cache(engine.as_ref(), &request, cache_dir).await;
    }

    let publisher = select_publisher(&ctx)
        .context("failed to configure the report channel")?
        .into();
    let pipeline = FuzzPipeline::new(engine, publisher);
    let result = pipeline.run(&request).await?;

    if result.found {
        match result.pull_request_url.as_deref() {
            Some(url) => {
                println!("Reported a new fuzz failure:");
                println!("  branch: {}", result.head_branch.as_deref().unwrap_or("-"));
                println!("  pull request: {url}");
            }
            None => println!("Reported a new fuzz failure via webhook."),
        }
    } else {
        println!("No new fuzz failure to report.");
    }
    Ok(())
}

/// List fuzz entry points as JSON.
async fn cmd_list(working_dir: &Path, tags: Option<&str>, packages: &[String]) -> Result<()> {
    let targets = list_fuzz_targets(working_dir, packages, tags)
        .await
        .context("failed to list fuzz targets")?;
    println!("{}", serde_json::to_string_pretty(&targets)?);
    Ok(())
}

/// Save the fuzz corpus cache. Failures are warnings, never fatal.
async fn cmd_save_cache(request: &FuzzRunRequest, cache_dir: &Path) -> Result<()> {
    if let Err(e) = try_save_cache(request, cache_dir).await {
        warn!("error while saving cache: {e}");
    }
    Ok(())
}

async fn try_save_cache(request: &FuzzRunRequest, cache_dir: &Path) -> Result<()> {
    let engine = GoFuzzEngine::new();
    let fuzz_dir = engine.fuzz_cache_dir(&request.working_dir).await?;
    let package_name = engine.package_name(request).await?;
    let commit = GitWorkspace::new(&request.working_dir).head_oid().await?;

    let key = save_key(&runner_os(), &package_name, &request.fuzz_regexp, &commit);
    DirCache::new(cache_dir).save(&key, &fuzz_dir)?;
    println!("Saved fuzz corpus cache under key {key}");
    Ok(())
}

/// Restore the fuzz corpus cache before a run. Best-effort.
async fn restore_corpus_cache(engine: &GoFuzzEngine, request: &FuzzRunRequest, cache_dir: &Path) {
    let restored = async {
        let fuzz_dir = engine.fuzz_cache_dir(&request.working_dir).await?;
        let package_name = engine.package_name(request).await?;
        let prefix = restore_key_prefix(&runner_os(), &package_name, &request.fuzz_regexp);
        DirCache::new(cache_dir)
            .restore(&prefix, &fuzz_dir)
            .map_err(anyhow::Error::from)
    }
    .await;

    match restored {
        Ok(true) => {}
        Ok(false) => tracing::info!("no fuzz corpus cache entry to restore"),
        Err(e) => warn!("error while restoring cache: {e}"),
    }
}

/// OS tag for cache keys: the runner-provided tag when present, otherwise
/// derived from the build target.
fn runner_os() -> String {
    if let Ok(os) = std::env::var("RUNNER_OS") {
        if !os.is_empty() {
            return os;
        }
    }
    match std::env::consts::OS {
        "linux" => "Linux".to_string(),
        "macos" => "macOS".to_string(),
        "windows" => "Windows".to_string(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_defaults() {
        let cli = Cli::try_parse_from([
            "fuzzcatch",
            "run",
            "--repository",
            "octo/example",
        ])
        .unwrap();

        let Commands::Run {
            packages,
            fuzz_regexp,
            fuzz_time,
            fuzz_minimize_time,
            report_method,
            base_branch,
            head_branch_prefix,
            ..
        } = cli.command
        else {
            panic!("expected run command");
        };

        assert_eq!(packages, "./...");
        assert_eq!(fuzz_regexp, "^Fuzz");
        assert_eq!(fuzz_time, "300s");
        assert_eq!(fuzz_minimize_time, "60s");
        assert_eq!(report_method, ReportMethodArg::PullRequest);
        assert_eq!(base_branch, "main");
        assert_eq!(head_branch_prefix, "gofuzz");
    }

    #[test]
    fn test_report_method_parses_kebab_case() {
        let cli = Cli::try_parse_from([
            "fuzzcatch",
            "run",
            "--repository",
            "octo/example",
            "--report-method",
            "webhook",
        ])
        .unwrap();

        let Commands::Run { report_method, .. } = cli.command else {
            panic!("expected run command");
        };
        assert_eq!(report_method, ReportMethodArg::Webhook);
        assert_eq!(ReportMethod::from(report_method), ReportMethod::Webhook);
    }

    #[test]
    fn test_save_cache_requires_cache_dir() {
        let result = Cli::try_parse_from(["fuzzcatch", "save-cache"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_runner_os_is_never_empty() {
        assert!(!runner_os().is_empty());
    }
}
