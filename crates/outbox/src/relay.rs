/*
 *  Copyright 2025 Colliery Software
 *
 *  Licensed under the Apache License, Version 2.0 (the "License");
 *  you may not use this file except in compliance with the License.
 *  You may obtain a copy of the License at
 *
 *      http://www.apache.org/licenses/LICENSE-2.0
 *
 *  Unless required by applicable law or agreed to in writing, software
 *  distributed under the License is distributed on an "AS IS" BASIS,
 *  WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
 *  See the License for the specific language governing permissions and
 *  limitations under the License.
 */

//! # Outbox Relay
//!
//! The relay worker drains `PENDING` outbox records and publishes them to the
//! broker. One worker runs per process; ticks execute inline in its loop, so
//! two batches never overlap and missed timer fires are delayed rather than
//! bursted.
//!
//! ## Per-record outcomes
//!
//! - published: the record is marked `PROCESSED`
//! - publish failed: one attempt is consumed; the record is dead-lettered once
//!   its attempt count reaches `max_retries`, otherwise it waits for the next
//!   tick
//! - undecodable payload: handled by [`UndecodablePolicy`]; no attempt is
//!   consumed
//! - publish cancelled or publisher closed: the record stays `PENDING` with
//!   its attempt count untouched and the batch stops
//!
//! A failure on one record, including a store error during bookkeeping, is
//! logged and counted and never aborts the rest of the batch.

use std::sync::Arc;

use thiserror::Error;
use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::{RelayConfig, UndecodablePolicy};
use crate::error::OutboxError;
use crate::events::{DomainEvent, EventError};
use crate::models::outbox::OutboxRecord;
use crate::outbox::OutboxStore;
use crate::publisher::{EventPublisher, PublishError};

#[derive(Debug, Error)]
pub enum RelayError {
    #[error("Invalid relay configuration: {0}")]
    InvalidConfig(String),
}

/// Tally of one tick.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchReport {
    pub fetched: usize,
    pub published: usize,
    /// Publish failed; record left `PENDING` for a later tick.
    pub retried: usize,
    pub dead_lettered: usize,
    /// Undecodable records left `PENDING` under [`UndecodablePolicy::Skip`].
    pub skipped: usize,
    /// Store errors during bookkeeping.
    pub errors: usize,
    /// The batch stopped early on cancellation or a closed publisher.
    pub interrupted: bool,
}

enum Outcome {
    Published,
    Retried,
    DeadLettered,
    Skipped,
    StoreError,
    Interrupted,
}

pub struct OutboxRelay {
    store: Arc<dyn OutboxStore>,
    publisher: Arc<dyn EventPublisher>,
    config: RelayConfig,
}

impl OutboxRelay {
    pub fn new(
        store: Arc<dyn OutboxStore>,
        publisher: Arc<dyn EventPublisher>,
        config: RelayConfig,
    ) -> Self {
        Self {
            store,
            publisher,
            config,
        }
    }

    pub fn config(&self) -> &RelayConfig {
        &self.config
    }

    fn validate(&self) -> Result<(), RelayError> {
        if self.config.batch_size() == 0 {
            return Err(RelayError::InvalidConfig(
                "batch_size must be positive".to_string(),
            ));
        }
        if self.config.process_interval().is_zero() {
            return Err(RelayError::InvalidConfig(
                "process_interval must be positive".to_string(),
            ));
        }
        if self.config.max_retries() == 0 {
            return Err(RelayError::InvalidConfig(
                "max_retries must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Runs the relay loop until `cancel` fires.
    ///
    /// The publisher is left open; closing it is part of the caller's
    /// shutdown sequence.
    pub async fn start(&self, cancel: CancellationToken) -> Result<(), RelayError> {
        self.validate()?;

        info!(
            batch_size = self.config.batch_size(),
            process_interval_ms = self.config.process_interval().as_millis() as u64,
            max_retries = self.config.max_retries(),
            "Outbox relay started"
        );

        let mut ticker = interval(self.config.process_interval());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {
                    match self.process_batch(&cancel).await {
                        Ok(report) if report.fetched > 0 => info!(
                            fetched = report.fetched,
                            published = report.published,
                            retried = report.retried,
                            dead_lettered = report.dead_lettered,
                            skipped = report.skipped,
                            errors = report.errors,
                            interrupted = report.interrupted,
                            "Outbox batch processed"
                        ),
                        Ok(_) => debug!("No pending outbox messages"),
                        Err(e) => error!(error = %e, "Failed to fetch pending outbox messages"),
                    }
                }
            }
        }

        info!("Outbox relay stopped");
        Ok(())
    }

    /// Runs a single tick: fetches one batch and processes it in creation
    /// order.
    ///
    /// Only a failure to fetch is returned as an error.
    pub async fn process_batch(
        &self,
        cancel: &CancellationToken,
    ) -> Result<BatchReport, OutboxError> {
        let records = self
            .store
            .get_pending_messages(self.config.batch_size())
            .await?;

        let mut report = BatchReport {
            fetched: records.len(),
            ..BatchReport::default()
        };

        for record in &records {
            if cancel.is_cancelled() {
                report.interrupted = true;
                break;
            }

            match self.process_record(cancel, record).await {
                Outcome::Published => report.published += 1,
                Outcome::Retried => report.retried += 1,
                Outcome::DeadLettered => report.dead_lettered += 1,
                Outcome::Skipped => report.skipped += 1,
                Outcome::StoreError => report.errors += 1,
                Outcome::Interrupted => {
                    report.interrupted = true;
                    break;
                }
            }
        }

        Ok(report)
    }

    async fn process_record(&self, cancel: &CancellationToken, record: &OutboxRecord) -> Outcome {
        let event = match DomainEvent::decode(&record.event_type, &record.payload) {
            Ok(event) => event,
            Err(err) => return self.handle_undecodable(record, err).await,
        };

        let topic = self.config.topics().topic_for(event.event_type());
        match self.publisher.publish(cancel, topic, &event).await {
            Ok(()) => match self.store.mark_message_as_processed(record.id).await {
                Ok(()) => {
                    debug!(
                        message_id = %record.id,
                        topic,
                        event_type = %record.event_type,
                        "Outbox message published"
                    );
                    Outcome::Published
                }
                Err(e) => {
                    error!(
                        message_id = %record.id,
                        error = %e,
                        "Published but failed to mark outbox message as processed"
                    );
                    Outcome::StoreError
                }
            },
            Err(PublishError::Cancelled) => {
                debug!(message_id = %record.id, "Publish cancelled, message left pending");
                Outcome::Interrupted
            }
            Err(PublishError::Closed) => {
                warn!(message_id = %record.id, "Publisher closed, stopping batch");
                Outcome::Interrupted
            }
            Err(err) => self.handle_publish_failure(record, err).await,
        }
    }

    async fn handle_publish_failure(&self, record: &OutboxRecord, err: PublishError) -> Outcome {
        let attempts = match self.store.increment_attempt(record.id).await {
            Ok(attempts) => attempts,
            Err(e) => {
                error!(
                    message_id = %record.id,
                    publish_error = %err,
                    error = %e,
                    "Failed to record delivery attempt"
                );
                return Outcome::StoreError;
            }
        };

        if i64::from(attempts) < i64::from(self.config.max_retries()) {
            warn!(
                message_id = %record.id,
                attempts,
                max_retries = self.config.max_retries(),
                error = %err,
                "Publish failed, will retry"
            );
            return Outcome::Retried;
        }

        let reason = err.to_string();
        match self.store.mark_message_as_failed(record.id, &reason).await {
            Ok(()) => {
                error!(
                    message_id = %record.id,
                    aggregate_id = %record.aggregate_id,
                    attempts,
                    reason = %reason,
                    "Outbox message dead-lettered after exhausting retries"
                );
                Outcome::DeadLettered
            }
            Err(e) => {
                error!(message_id = %record.id, error = %e, "Failed to dead-letter outbox message");
                Outcome::StoreError
            }
        }
    }

    async fn handle_undecodable(&self, record: &OutboxRecord, err: EventError) -> Outcome {
        warn!(
            message_id = %record.id,
            event_type = %record.event_type,
            error = %err,
            "Undecodable outbox message"
        );

        match self.config.undecodable_policy() {
            UndecodablePolicy::Skip => Outcome::Skipped,
            UndecodablePolicy::DeadLetter => {
                let reason = format!("undecodable payload: {}", err);
                match self.store.mark_message_as_failed(record.id, &reason).await {
                    Ok(()) => {
                        error!(
                            message_id = %record.id,
                            reason = %reason,
                            "Outbox message dead-lettered"
                        );
                        Outcome::DeadLettered
                    }
                    Err(e) => {
                        error!(message_id = %record.id, error = %e, "Failed to dead-letter outbox message");
                        Outcome::StoreError
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use async_trait::async_trait;
    use tracing_test::traced_test;
    use uuid::Uuid;

    use crate::events::{build_event, EventKind};
    use crate::models::order::{NewOrderItem, Order};
    use crate::models::outbox::OutboxStatus;
    use crate::outbox::InMemoryOutboxStore;
    use crate::publisher::InMemoryBroker;

    fn enqueue_order(store: &InMemoryOutboxStore) -> OutboxRecord {
        let order = Order::new("customer-1", vec![NewOrderItem::new("sku-1", 1, 100)]);
        let event = build_event(&order, EventKind::Created);
        store
            .create_message(
                &order.id.to_string(),
                event.event_type(),
                event.to_payload().unwrap(),
            )
            .unwrap()
    }

    fn relay(
        store: &Arc<InMemoryOutboxStore>,
        broker: &Arc<InMemoryBroker>,
        config: RelayConfig,
    ) -> OutboxRelay {
        OutboxRelay::new(store.clone(), broker.clone(), config)
    }

    #[tokio::test]
    async fn test_batch_publishes_and_marks_processed() {
        let store = Arc::new(InMemoryOutboxStore::new());
        let broker = Arc::new(InMemoryBroker::new());
        let first = enqueue_order(&store);
        let second = enqueue_order(&store);

        let report = relay(&store, &broker, RelayConfig::default())
            .process_batch(&CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(report.fetched, 2);
        assert_eq!(report.published, 2);
        assert!(!report.interrupted);

        let published = broker.published_to("orders-created");
        assert_eq!(published.len(), 2);
        assert_eq!(published[0].key, first.aggregate_id);
        assert_eq!(published[1].key, second.aggregate_id);

        for record in store.records() {
            assert_eq!(record.status, OutboxStatus::Processed);
            assert!(record.processed_at.is_some());
            assert_eq!(record.attempt_count, 0);
        }
    }

    #[tokio::test]
    async fn test_record_dead_lettered_after_max_retries() {
        let store = Arc::new(InMemoryOutboxStore::new());
        let broker = Arc::new(InMemoryBroker::new());
        broker.set_unavailable(true);
        let record = enqueue_order(&store);
        let relay = relay(&store, &broker, RelayConfig::default());
        let cancel = CancellationToken::new();

        for expected_attempts in 1..=2 {
            let report = relay.process_batch(&cancel).await.unwrap();
            assert_eq!(report.retried, 1);
            let current = store.get(record.id).unwrap();
            assert_eq!(current.status, OutboxStatus::Pending);
            assert_eq!(current.attempt_count, expected_attempts);
        }

        let report = relay.process_batch(&cancel).await.unwrap();
        assert_eq!(report.dead_lettered, 1);

        let failed = store.get(record.id).unwrap();
        assert_eq!(failed.status, OutboxStatus::Failed);
        assert_eq!(failed.attempt_count, 3);
        assert_eq!(
            failed.fail_reason.as_deref(),
            Some("Broker error: broker unavailable")
        );

        broker.set_unavailable(false);
        let report = relay.process_batch(&cancel).await.unwrap();
        assert_eq!(report.fetched, 0);
        assert!(broker.published().is_empty());
    }

    #[tokio::test]
    async fn test_failure_does_not_abort_batch() {
        let store = Arc::new(InMemoryOutboxStore::new());
        let broker = Arc::new(InMemoryBroker::new());
        broker.fail_next(1);
        let first = enqueue_order(&store);
        let second = enqueue_order(&store);

        let report = relay(&store, &broker, RelayConfig::default())
            .process_batch(&CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(report.retried, 1);
        assert_eq!(report.published, 1);
        assert_eq!(store.get(first.id).unwrap().status, OutboxStatus::Pending);
        assert_eq!(store.get(second.id).unwrap().status, OutboxStatus::Processed);
    }

    #[tokio::test]
    #[traced_test]
    async fn test_undecodable_record_is_dead_lettered_by_default() {
        let store = Arc::new(InMemoryOutboxStore::new());
        let broker = Arc::new(InMemoryBroker::new());
        let bad = store
            .create_message("order-1", "order.teleported", b"{}".to_vec())
            .unwrap();

        let report = relay(&store, &broker, RelayConfig::default())
            .process_batch(&CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(report.dead_lettered, 1);
        let record = store.get(bad.id).unwrap();
        assert_eq!(record.status, OutboxStatus::Failed);
        assert_eq!(record.attempt_count, 0);
        assert!(record
            .fail_reason
            .unwrap()
            .contains("Unknown event type 'order.teleported'"));
        assert!(logs_contain("Undecodable outbox message"));
    }

    #[tokio::test]
    async fn test_undecodable_record_left_pending_when_skipped() {
        let store = Arc::new(InMemoryOutboxStore::new());
        let broker = Arc::new(InMemoryBroker::new());
        let bad = store
            .create_message("order-1", "order.created", b"not json".to_vec())
            .unwrap();
        let good = enqueue_order(&store);
        let config = RelayConfig::builder()
            .undecodable_policy(UndecodablePolicy::Skip)
            .build();

        let report = relay(&store, &broker, config)
            .process_batch(&CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(report.skipped, 1);
        assert_eq!(report.published, 1);
        assert_eq!(store.get(bad.id).unwrap().status, OutboxStatus::Pending);
        assert_eq!(store.get(good.id).unwrap().status, OutboxStatus::Processed);
    }

    #[tokio::test]
    async fn test_cancelled_token_leaves_batch_pending() {
        let store = Arc::new(InMemoryOutboxStore::new());
        let broker = Arc::new(InMemoryBroker::new());
        enqueue_order(&store);
        enqueue_order(&store);
        let cancel = CancellationToken::new();
        cancel.cancel();

        let report = relay(&store, &broker, RelayConfig::default())
            .process_batch(&cancel)
            .await
            .unwrap();

        assert!(report.interrupted);
        assert_eq!(report.published, 0);
        for record in store.records() {
            assert_eq!(record.status, OutboxStatus::Pending);
            assert_eq!(record.attempt_count, 0);
        }
    }

    #[tokio::test]
    async fn test_closed_publisher_consumes_no_attempts() {
        let store = Arc::new(InMemoryOutboxStore::new());
        let broker = Arc::new(InMemoryBroker::new());
        broker.close().await.unwrap();
        let record = enqueue_order(&store);

        let report = relay(&store, &broker, RelayConfig::default())
            .process_batch(&CancellationToken::new())
            .await
            .unwrap();

        assert!(report.interrupted);
        assert_eq!(store.get(record.id).unwrap().attempt_count, 0);
    }

    /// Store whose `mark_message_as_processed` always fails.
    #[derive(Default)]
    struct BrokenBookkeeping {
        inner: InMemoryOutboxStore,
    }

    #[async_trait]
    impl OutboxStore for BrokenBookkeeping {
        async fn get_pending_messages(
            &self,
            limit: usize,
        ) -> Result<Vec<OutboxRecord>, OutboxError> {
            self.inner.get_pending_messages(limit).await
        }

        async fn increment_attempt(&self, id: Uuid) -> Result<i32, OutboxError> {
            self.inner.increment_attempt(id).await
        }

        async fn mark_message_as_processed(&self, _id: Uuid) -> Result<(), OutboxError> {
            Err(OutboxError::Validation("store offline".to_string()))
        }

        async fn mark_message_as_failed(&self, id: Uuid, reason: &str) -> Result<(), OutboxError> {
            self.inner.mark_message_as_failed(id, reason).await
        }
    }

    #[tokio::test]
    async fn test_store_errors_are_counted_and_batch_continues() {
        let store = Arc::new(BrokenBookkeeping::default());
        enqueue_order(&store.inner);
        enqueue_order(&store.inner);
        let broker = Arc::new(InMemoryBroker::new());

        let relay = OutboxRelay::new(store.clone(), broker.clone(), RelayConfig::default());
        let report = relay.process_batch(&CancellationToken::new()).await.unwrap();

        assert_eq!(report.errors, 2);
        assert_eq!(broker.published().len(), 2);
    }

    #[tokio::test]
    async fn test_start_rejects_invalid_config() {
        let store = Arc::new(InMemoryOutboxStore::new());
        let broker = Arc::new(InMemoryBroker::new());
        let config = RelayConfig::builder().batch_size(0).build();

        let err = relay(&store, &broker, config)
            .start(CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, RelayError::InvalidConfig(_)));
    }

    #[tokio::test]
    #[traced_test]
    async fn test_start_drains_then_stops_on_cancel() {
        let store = Arc::new(InMemoryOutboxStore::new());
        let broker = Arc::new(InMemoryBroker::new());
        enqueue_order(&store);
        let config = RelayConfig::builder()
            .process_interval(Duration::from_millis(10))
            .build();
        let relay = Arc::new(relay(&store, &broker, config));
        let cancel = CancellationToken::new();

        let handle = tokio::spawn({
            let relay = relay.clone();
            let cancel = cancel.clone();
            async move { relay.start(cancel).await }
        });

        tokio::time::sleep(Duration::from_millis(100)).await;
        cancel.cancel();
        handle.await.unwrap().unwrap();

        assert_eq!(broker.published().len(), 1);
        assert!(logs_contain("Outbox relay stopped"));
    }
}
