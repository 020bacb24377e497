use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::app_context::AppContext;
use crate::config::{Config, DeadLetterMode};
use crate::error::WriteError;
use crate::liveness::LivenessHandle;
use crate::metrics_consts::{
    BACKOFF_APPLIED, DEAD_LETTERED, DECODE_FAILURES, DELETE_FAILURES, DUPLICATES_SKIPPED,
    EMPTY_RECEIVES, MESSAGES_RECEIVED, RECEIVE_BATCH_SIZE, RECEIVE_FAILURES, ROWS_INSERTED,
    WRITE_FAILURES, WRITE_TIME,
};
use crate::queue::{QueueSource, RawMessage};
use crate::types::{LoginEvent, MaskedRecord};
use crate::writer::WriteOutcome;

/// Where a message ended up after one processing attempt.
///
/// RECEIVED → DECODED → MASKED → WRITTEN → ACKNOWLEDGED collapses to
/// `Written`/`Duplicate`; `DeadLettered` is the exit for permanent failures;
/// `Redeliver` means the message was left untouched for the visibility
/// timeout to hand back.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageOutcome {
    Written,
    Duplicate,
    DeadLettered,
    Redeliver,
}

#[derive(Clone)]
pub struct WorkerSettings {
    pub max_messages: i32,
    pub wait_time: Duration,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
}

impl From<&Config> for WorkerSettings {
    fn from(config: &Config) -> Self {
        Self {
            max_messages: config.queue.max_messages,
            wait_time: Duration::from_secs(config.queue.wait_time_seconds as u64),
            initial_backoff: Duration::from_secs(config.initial_backoff_secs),
            max_backoff: Duration::from_secs(config.max_backoff_secs),
        }
    }
}

/// One sequential pipeline loop: receive a batch, run each message through
/// decode → mask → write → acknowledge, repeat until cancelled. Multiple
/// workers may run concurrently; they share only the queue client and the pg
/// pool and are coordinated by the queue's visibility timeout alone.
pub struct Worker {
    context: Arc<AppContext>,
    queue: Arc<dyn QueueSource>,
    settings: WorkerSettings,
    liveness: LivenessHandle,
}

impl Worker {
    pub fn new(
        context: Arc<AppContext>,
        queue: Arc<dyn QueueSource>,
        settings: WorkerSettings,
        liveness: LivenessHandle,
    ) -> Self {
        Self {
            context,
            queue,
            settings,
            liveness,
        }
    }

    pub async fn run(self, cancel: CancellationToken) {
        let mut backoff = self.settings.initial_backoff;

        loop {
            self.liveness.report_healthy();

            let received = tokio::select! {
                _ = cancel.cancelled() => break,
                received = self
                    .queue
                    .receive(self.settings.max_messages, self.settings.wait_time) => received,
            };

            let messages = match received {
                Ok(messages) => messages,
                Err(e) => {
                    metrics::counter!(RECEIVE_FAILURES).increment(1);
                    error!(error = %e, "failed to receive from queue");
                    backoff = self.apply_backoff(backoff, &cancel).await;
                    continue;
                }
            };

            if messages.is_empty() {
                metrics::counter!(EMPTY_RECEIVES).increment(1);
                continue;
            }

            metrics::counter!(MESSAGES_RECEIVED).increment(messages.len() as u64);
            metrics::histogram!(RECEIVE_BATCH_SIZE).record(messages.len() as f64);

            // Messages already in hand are finished even if shutdown arrives
            // mid-batch; cancellation only stops new receives. Each message
            // is processed independently so one poison message cannot block
            // the rest of the batch.
            let mut saw_retryable = false;
            for message in &messages {
                if self.process_message(message).await == MessageOutcome::Redeliver {
                    saw_retryable = true;
                }
            }

            if saw_retryable {
                backoff = self.apply_backoff(backoff, &cancel).await;
            } else {
                backoff = self.settings.initial_backoff;
            }
        }

        info!("worker stopped");
    }

    pub async fn process_message(&self, raw: &RawMessage) -> MessageOutcome {
        let event = match LoginEvent::from_raw(raw.body.as_bytes()) {
            Ok(event) => event,
            Err(e) => {
                metrics::counter!(DECODE_FAILURES).increment(1);
                warn!(message_id = %raw.message_id, error = %e, "message failed to decode");
                return self.dead_letter(raw).await;
            }
        };

        let record = MaskedRecord::from_event(event, &self.context.masker);

        let write_start = Instant::now();
        let written = self.context.writer.write(&record).await;
        metrics::histogram!(WRITE_TIME).record(write_start.elapsed().as_millis() as f64);

        match written {
            Ok(WriteOutcome::Inserted) => {
                metrics::counter!(ROWS_INSERTED).increment(1);
                self.acknowledge(raw).await;
                MessageOutcome::Written
            }
            Ok(WriteOutcome::Duplicate) => {
                metrics::counter!(DUPLICATES_SKIPPED).increment(1);
                info!(
                    message_id = %raw.message_id,
                    event_key = %record.event_key,
                    "redelivered message already written, acknowledging"
                );
                self.acknowledge(raw).await;
                MessageOutcome::Duplicate
            }
            Err(e @ WriteError::Retryable(_)) => {
                metrics::counter!(WRITE_FAILURES, &[("kind", "retryable")]).increment(1);
                warn!(
                    message_id = %raw.message_id,
                    error = %e,
                    "write failed, leaving message for redelivery"
                );
                MessageOutcome::Redeliver
            }
            Err(e @ WriteError::NonRetryable(_)) => {
                metrics::counter!(WRITE_FAILURES, &[("kind", "permanent")]).increment(1);
                error!(message_id = %raw.message_id, error = %e, "write rejected");
                self.dead_letter(raw).await
            }
        }
    }

    /// Deleting after the commit is what makes the pipeline at-least-once: a
    /// crash between the two leaves the message to be redelivered, where the
    /// dedup key collapses it into the existing row.
    async fn acknowledge(&self, raw: &RawMessage) {
        if let Err(e) = self.queue.delete(&raw.receipt_handle).await {
            metrics::counter!(DELETE_FAILURES).increment(1);
            warn!(
                message_id = %raw.message_id,
                error = %e,
                "failed to delete acknowledged message, redelivery will dedup"
            );
        }
    }

    async fn dead_letter(&self, raw: &RawMessage) -> MessageOutcome {
        metrics::counter!(DEAD_LETTERED).increment(1);
        match self.context.dead_letter_mode {
            DeadLetterMode::Delete => {
                if let Err(e) = self.queue.delete(&raw.receipt_handle).await {
                    metrics::counter!(DELETE_FAILURES).increment(1);
                    warn!(
                        message_id = %raw.message_id,
                        error = %e,
                        "failed to delete dead-lettered message"
                    );
                }
            }
            DeadLetterMode::Leave => {
                info!(
                    message_id = %raw.message_id,
                    "leaving dead-lettered message for manual inspection"
                );
            }
        }
        MessageOutcome::DeadLettered
    }

    async fn apply_backoff(&self, backoff: Duration, cancel: &CancellationToken) -> Duration {
        metrics::counter!(BACKOFF_APPLIED).increment(1);
        let jitter = Duration::from_millis(rand::random::<u64>() % 50);
        tokio::select! {
            _ = cancel.cancelled() => {}
            _ = tokio::time::sleep(backoff + jitter) => {}
        }
        (backoff * 2).min(self.settings.max_backoff)
    }
}
