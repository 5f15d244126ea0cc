//! Report publication: delivery channels and channel dispatch.

pub mod pull_request;
pub mod webhook;

use async_trait::async_trait;
use serde::Serialize;

use crate::config::{ReportMethod, RunContext};
use crate::error::{FuzzcatchError, Result};
use crate::report::Report;

pub use pull_request::PullRequestPublisher;
pub use webhook::WebhookPublisher;

/// Outcome of one publication attempt.
///
/// `found: false` covers both "no failure to report" and "failure already
/// reported"; neither is an error.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PublishResult {
    pub found: bool,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub head_branch: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub pull_request_number: Option<u64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub pull_request_url: Option<String>,
}

impl PublishResult {
    /// Nothing was (newly) reported.
    pub fn not_found() -> Self {
        Self::default()
    }
}

/// A delivery channel for one failure report.
#[async_trait]
pub trait Publisher: Send + Sync {
    async fn publish(&self, report: &Report) -> Result<PublishResult>;
}

/// Select the publisher for the configured channel.
pub fn select_publisher(ctx: &RunContext) -> Result<Box<dyn Publisher>> {
    match ctx.report_method {
        ReportMethod::PullRequest => {
            Ok(Box::new(PullRequestPublisher::over_http(ctx.clone())?))
        }
        ReportMethod::Webhook => {
            let url = ctx.webhook_url.clone().ok_or_else(|| {
                FuzzcatchError::Config("webhook channel selected but no webhook URL given".to_string())
            })?;
            Ok(Box::new(WebhookPublisher::new(url, ctx.run_log_url())?))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ReportMethod;

    fn context(method: ReportMethod) -> RunContext {
        RunContext {
            repository: "octo/example".to_string(),
            token: Some("t0ken".to_string()),
            graphql_url: "https://api.github.com/graphql".to_string(),
            server_url: "https://github.com".to_string(),
            run_id: None,
            run_attempt: None,
            base_branch: "main".to_string(),
            head_branch_prefix: "gofuzz".to_string(),
            report_method: method,
            webhook_url: None,
        }
    }

    #[test]
    fn test_select_publisher_webhook_requires_url() {
        let ctx = context(ReportMethod::Webhook);
        let err = select_publisher(&ctx).err().unwrap();
        assert!(err.to_string().contains("webhook URL"));
    }

    #[test]
    fn test_select_publisher_pull_request_requires_token() {
        let mut ctx = context(ReportMethod::PullRequest);
        ctx.token = None;
        let err = select_publisher(&ctx).err().unwrap();
        assert!(err.to_string().contains("token"));
    }

    #[test]
    fn test_publish_result_not_found_serializes_compactly() {
        let json = serde_json::to_string(&PublishResult::not_found()).unwrap();
        assert_eq!(json, "{\"found\":false}");
    }
}
