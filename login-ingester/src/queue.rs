use std::time::Duration;

use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_sqs::types::QueueAttributeName;
use aws_sdk_sqs::Client;

use crate::config::QueueConfig;
use crate::error::QueueError;

/// A message as pulled off the queue. The receipt handle is the opaque token
/// that acknowledges (deletes) this particular delivery; the body is not
/// touched until the decoder gets it.
#[derive(Debug, Clone)]
pub struct RawMessage {
    pub message_id: String,
    pub receipt_handle: String,
    pub body: String,
}

/// The consumed capability of the queue broker: at-least-once delivery with
/// redelivery after a visibility timeout, no ordering guarantee. Behind a
/// trait so the pipeline can be exercised against an in-memory queue in
/// tests.
#[async_trait]
pub trait QueueSource: Send + Sync {
    async fn receive(
        &self,
        max_messages: i32,
        wait_time: Duration,
    ) -> Result<Vec<RawMessage>, QueueError>;

    async fn delete(&self, receipt_handle: &str) -> Result<(), QueueError>;
}

#[derive(Clone)]
pub struct SqsQueue {
    client: Client,
    queue_url: String,
}

impl SqsQueue {
    pub async fn new(config: &QueueConfig) -> Self {
        let mut loader = aws_config::defaults(BehaviorVersion::latest());
        if let Some(endpoint) = &config.endpoint {
            loader = loader.endpoint_url(endpoint);
        }
        let sdk_config = loader.load().await;

        Self {
            client: Client::new(&sdk_config),
            queue_url: config.queue_url.clone(),
        }
    }

    /// Startup probe: a queue we cannot describe is a queue we cannot poll,
    /// and the process should refuse to start rather than spin on receives.
    pub async fn check_connectivity(&self) -> Result<(), QueueError> {
        self.client
            .get_queue_attributes()
            .queue_url(&self.queue_url)
            .attribute_names(QueueAttributeName::ApproximateNumberOfMessages)
            .send()
            .await
            .map_err(|e| QueueError::Receive(anyhow::Error::new(e)))?;
        Ok(())
    }
}

#[async_trait]
impl QueueSource for SqsQueue {
    async fn receive(
        &self,
        max_messages: i32,
        wait_time: Duration,
    ) -> Result<Vec<RawMessage>, QueueError> {
        let output = self
            .client
            .receive_message()
            .queue_url(&self.queue_url)
            .max_number_of_messages(max_messages)
            .wait_time_seconds(wait_time.as_secs() as i32)
            .send()
            .await
            .map_err(|e| QueueError::Receive(anyhow::Error::new(e)))?;

        let messages = output
            .messages
            .unwrap_or_default()
            .into_iter()
            .filter_map(|message| {
                // A message without a receipt handle cannot be acknowledged,
                // so there is no point handing it to the pipeline.
                let receipt_handle = message.receipt_handle?;
                Some(RawMessage {
                    message_id: message.message_id.unwrap_or_default(),
                    receipt_handle,
                    body: message.body.unwrap_or_default(),
                })
            })
            .collect();

        Ok(messages)
    }

    async fn delete(&self, receipt_handle: &str) -> Result<(), QueueError> {
        self.client
            .delete_message()
            .queue_url(&self.queue_url)
            .receipt_handle(receipt_handle)
            .send()
            .await
            .map_err(|e| QueueError::Delete(anyhow::Error::new(e)))?;
        Ok(())
    }
}
