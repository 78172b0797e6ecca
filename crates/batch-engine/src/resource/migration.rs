//! Group archive import

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{info, instrument, warn};

use super::model::ImportResult;
use super::service::{ArchiveService, ResourceError};
use crate::batch::{BatchConfig, BatchExecutor, BatchReport, Outcome, WorkItem};
use crate::config::EngineConfig;
use crate::reliability::ErrorPolicy;

/// Raw RFC 822 message shared between retry attempts
pub type Message = Arc<[u8]>;

/// Imports mail into group archives
pub struct GroupsMigration<S> {
    service: Arc<S>,
    batch: BatchConfig,
    cancel: CancellationToken,
}

impl<S: ArchiveService> GroupsMigration<S> {
    pub fn new(service: Arc<S>, config: &EngineConfig) -> Result<Self, ResourceError> {
        config.validate()?;
        Ok(Self {
            service,
            batch: config.batch.clone(),
            cancel: CancellationToken::new(),
        })
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    fn executor(&self, width: usize) -> BatchExecutor {
        BatchExecutor::new(self.batch.clone().with_concurrency(width))
            .with_cancellation(self.cancel.clone())
    }

    /// Import one message; an already imported message is skipped
    pub async fn import_message(&self, group_email: &str, message: &[u8]) -> Outcome<ImportResult> {
        let service = self.service.as_ref();
        let outcome = self
            .executor(1)
            .execute_one(
                WorkItem::new("message-0", group_email),
                &ErrorPolicy::insert(),
                |item: WorkItem| async move { service.insert_message(&item.target, message).await },
            )
            .await
            .outcome;

        match &outcome {
            Outcome::Succeeded(_) => {
                info!(group = %group_email, bytes = message.len(), "Message imported")
            }
            Outcome::Skipped(reason) => {
                info!(group = %group_email, bytes = message.len(), reason = %reason, "Message already imported")
            }
            Outcome::Failed(error) => {
                warn!(group = %group_email, bytes = message.len(), error = %error, "Message import failed")
            }
        }
        outcome
    }

    /// Import many messages in waves of `width`
    ///
    /// Item ids are `message-<n>` in input order.
    #[instrument(skip(self, messages), fields(total = messages.len()))]
    pub async fn import_messages(
        &self,
        group_email: &str,
        messages: Vec<Message>,
        width: usize,
    ) -> BatchReport<Message, ImportResult> {
        let items = messages
            .into_iter()
            .enumerate()
            .map(|(n, message)| WorkItem::with_payload(format!("message-{n}"), group_email, message))
            .collect();

        let service = Arc::clone(&self.service);
        let report = self
            .executor(width)
            .execute(items, ErrorPolicy::insert(), move |item: WorkItem<Message>| {
                let service = Arc::clone(&service);
                async move { service.insert_message(&item.target, &item.payload).await }
            })
            .await;

        let bytes: usize = report.succeeded().map(|(item, _)| item.payload.len()).sum();
        info!(group = %group_email, bytes, summary = %report.summary(), "Archive import complete");
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::batch::ItemError;
    use crate::error::RemoteError;
    use crate::resource::memory::{Fault, InMemoryWorkspace, Operation};
    use crate::resource::model::Group;

    fn message(subject: &str) -> Message {
        Arc::from(format!("Subject: {subject}\r\n\r\nbody").into_bytes())
    }

    fn migration() -> (Arc<InMemoryWorkspace>, GroupsMigration<InMemoryWorkspace>) {
        let ws = Arc::new(
            InMemoryWorkspace::new().with_group(Group::new("g1", "archive@example.com", "Archive")),
        );
        let migration = GroupsMigration::new(Arc::clone(&ws), &EngineConfig::default()).unwrap();
        (ws, migration)
    }

    #[tokio::test]
    async fn test_import_message() {
        let (ws, migration) = migration();
        let msg = message("hello");

        let outcome = migration.import_message("archive@example.com", &msg).await;
        assert_eq!(outcome.into_succeeded().unwrap().response_code, "SUCCESS");

        assert!(migration
            .import_message("archive@example.com", &msg)
            .await
            .is_skipped());
        assert_eq!(ws.archive("archive@example.com").len(), 1);
    }

    #[tokio::test]
    async fn test_import_into_unknown_group_fails() {
        let (_, migration) = migration();
        let outcome = migration
            .import_message("nobody@example.com", &message("lost"))
            .await;
        assert!(matches!(outcome, Outcome::Failed(ItemError::Remote(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_import_messages_in_waves() {
        let (ws, migration) = migration();
        ws.inject(
            Fault::new(Operation::InsertMessage, RemoteError::from_status(503, "Service Unavailable"))
                .after_calls(2),
        );

        let mut messages: Vec<Message> = (0..5).map(|i| message(&format!("m{i}"))).collect();
        messages.push(message("m0"));

        let report = migration
            .import_messages("archive@example.com", messages, 2)
            .await;

        let summary = report.summary();
        assert_eq!(summary.submitted, 6);
        assert_eq!(summary.succeeded, 5);
        assert_eq!(summary.skipped, 1);
        assert_eq!(report.items()[5].item.id, "message-5");
        assert!(report.items()[5].outcome.is_skipped());
        assert_eq!(ws.archive("archive@example.com").len(), 5);
    }
}
