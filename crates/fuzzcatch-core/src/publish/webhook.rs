//! Chat webhook publisher.
//!
//! Posts one Block Kit-style message to a configured webhook URL. Chat
//! webhooks answer with an opaque acknowledgement, so any non-error HTTP
//! status counts as delivered; the response body is never parsed.

use async_trait::async_trait;
use serde::Serialize;
use tracing::info;

use crate::error::Result;
use crate::publish::{PublishResult, Publisher};
use crate::report::Report;

/// Publishes one failure report as a chat message.
pub struct WebhookPublisher {
    client: reqwest::Client,
    url: String,
    log_url: Option<String>,
}

#[derive(Debug, Serialize)]
struct WebhookMessage {
    text: String,
    blocks: Vec<Block>,
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum Block {
    Section { text: TextObject },
    Context { elements: Vec<TextObject> },
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum TextObject {
    Mrkdwn { text: String },
}

impl WebhookPublisher {
    pub fn new(url: String, log_url: Option<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("fuzzcatch/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            client,
            url,
            log_url,
        })
    }

    fn message(&self, report: &Report) -> WebhookMessage {
        let mut blocks = vec![
            Block::Section {
                text: TextObject::Mrkdwn {
                    text: format!("*{}*", report.title()),
                },
            },
            Block::Section {
                text: TextObject::Mrkdwn {
                    text: format!(
                        "`{}` failed with the following output:\n```{}```",
                        report.repro_command, report.repro_output
                    ),
                },
            },
        ];

        if let Some(patch) = &report.patch {
            blocks.push(Block::Section {
                text: TextObject::Mrkdwn {
                    text: format!("New corpus file:\n```{patch}```"),
                },
            });
        }

        let footer = match &self.log_url {
            Some(url) => format!("Generated by fuzzcatch. <{url}|See the log>."),
            None => "Generated by fuzzcatch.".to_string(),
        };
        blocks.push(Block::Context {
            elements: vec![TextObject::Mrkdwn { text: footer }],
        });

        WebhookMessage {
            text: report.title(),
            blocks,
        }
    }
}

#[async_trait]
impl Publisher for WebhookPublisher {
    async fn publish(&self, report: &Report) -> Result<PublishResult> {
        let message = self.message(report);
        self.client
            .post(&self.url)
            .json(&message)
            .send()
            .await?
            .error_for_status()?;
        info!("webhook notification delivered");
        Ok(PublishResult {
            found: true,
            ..PublishResult::not_found()
        })
    }
}
