//! Amazon SQS adapter.
//!
//! Credentials and region come from the default AWS provider chain. The SDK
//! retries transport errors on its own; nothing here retries.

use async_trait::async_trait;
use aws_sdk_sqs::error::DisplayErrorContext;
use aws_sdk_sqs::types::SendMessageBatchRequestEntry;
use aws_sdk_sqs::Client;

use efficientsqs_core::MAX_BATCH_ITEMS;

use crate::queue::{BatchEntry, DownstreamQueue, FailedEntry, QueueError, QueueHandle, SendBatchOutput};

#[derive(Clone)]
pub struct SqsQueue {
    client: Client,
}

impl SqsQueue {
    pub async fn from_env() -> Self {
        let sdk_config = aws_config::load_from_env().await;
        Self::new(Client::new(&sdk_config))
    }

    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl DownstreamQueue for SqsQueue {
    async fn resolve_queue(&self, name: &str) -> Result<QueueHandle, QueueError> {
        let out = self
            .client
            .get_queue_url()
            .queue_name(name)
            .send()
            .await
            .map_err(|e| QueueError::NotFound {
                name: name.to_string(),
                reason: DisplayErrorContext(&e).to_string(),
            })?;
        let url = out.queue_url().ok_or_else(|| QueueError::NotFound {
            name: name.to_string(),
            reason: "no queue url returned".into(),
        })?;
        Ok(QueueHandle {
            name: name.to_string(),
            url: url.to_string(),
        })
    }

    async fn send_batch(
        &self,
        queue: &QueueHandle,
        entries: Vec<BatchEntry>,
    ) -> Result<SendBatchOutput, QueueError> {
        if entries.len() > MAX_BATCH_ITEMS {
            return Err(QueueError::TooManyEntries(entries.len()));
        }

        // SQS bodies are strings; a body that is not UTF-8 fails locally.
        let mut failed = Vec::new();
        let mut request = Vec::with_capacity(entries.len());
        for entry in entries {
            match String::from_utf8(entry.body.to_vec()) {
                Ok(body) => request.push(
                    SendMessageBatchRequestEntry::builder()
                        .id(entry.id)
                        .message_body(body)
                        .build()
                        .map_err(|e| QueueError::Transport(e.to_string()))?,
                ),
                Err(_) => failed.push(FailedEntry {
                    id: entry.id,
                    reason: "body is not valid UTF-8".into(),
                }),
            }
        }
        if request.is_empty() {
            return Ok(SendBatchOutput { failed });
        }

        let out = self
            .client
            .send_message_batch()
            .queue_url(&queue.url)
            .set_entries(Some(request))
            .send()
            .await
            .map_err(|e| QueueError::Transport(DisplayErrorContext(&e).to_string()))?;

        failed.extend(out.failed().iter().map(|f| FailedEntry {
            id: f.id().to_string(),
            reason: f.message().unwrap_or(f.code()).to_string(),
        }));
        Ok(SendBatchOutput { failed })
    }
}
