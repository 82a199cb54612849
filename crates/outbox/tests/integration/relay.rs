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

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use outbox::models::order::NewOrderItem;
use outbox::models::outbox::OutboxStatus;
use outbox::publisher::InMemoryBroker;
use outbox::{DomainEvent, EventPublisher, OutboxRelay, PublishError, RelayConfig};
use tokio_util::sync::CancellationToken;

use crate::fixtures::TestFixture;

async fn create_orders(fixture: &TestFixture, count: usize) {
    let service = fixture.service();
    for i in 0..count {
        service
            .create_order(
                &format!("customer-{}", i),
                vec![NewOrderItem::new("sku-1", 1, 100)],
            )
            .await
            .unwrap();
    }
}

#[tokio::test]
async fn test_relay_delivers_committed_orders() {
    let fixture = TestFixture::new().await;
    create_orders(&fixture, 3).await;
    let broker = Arc::new(InMemoryBroker::new());
    let relay = OutboxRelay::new(
        Arc::new(fixture.dal()),
        broker.clone(),
        RelayConfig::default(),
    );

    let report = relay.process_batch(&CancellationToken::new()).await.unwrap();
    assert_eq!(report.fetched, 3);
    assert_eq!(report.published, 3);

    let published = broker.published_to("orders-created");
    assert_eq!(published.len(), 3);
    let stats = fixture.dal().outbox().stats().await.unwrap();
    assert_eq!(stats.processed, 3);
    assert_eq!(stats.pending, 0);

    for message in published {
        let event = message.decode().unwrap();
        assert_eq!(message.key, event.aggregate_id().to_string());
    }
}

#[tokio::test]
async fn test_three_failed_publishes_dead_letter_the_record() {
    let fixture = TestFixture::new().await;
    create_orders(&fixture, 1).await;
    let broker = Arc::new(InMemoryBroker::new());
    broker.set_unavailable(true);
    let relay = OutboxRelay::new(
        Arc::new(fixture.dal()),
        broker.clone(),
        RelayConfig::builder().max_retries(3).build(),
    );
    let cancel = CancellationToken::new();

    for _ in 0..3 {
        relay.process_batch(&cancel).await.unwrap();
    }

    let failed = fixture
        .dal()
        .outbox()
        .list(Some(OutboxStatus::Failed), 10)
        .await
        .unwrap();
    assert_eq!(failed.len(), 1);
    assert_eq!(failed[0].attempt_count, 3);
    assert!(failed[0].fail_reason.is_some());

    broker.set_unavailable(false);
    let report = relay.process_batch(&cancel).await.unwrap();
    assert_eq!(report.fetched, 0);
}

#[tokio::test]
async fn test_cancellation_mid_batch_leaves_remaining_records_pending() {
    let fixture = TestFixture::new().await;
    create_orders(&fixture, 5).await;
    let broker = Arc::new(InMemoryBroker::new().with_latency(Duration::from_millis(50)));
    let relay = OutboxRelay::new(
        Arc::new(fixture.dal()),
        broker.clone(),
        RelayConfig::default(),
    );
    let cancel = CancellationToken::new();

    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(75)).await;
        trigger.cancel();
    });

    let report = relay.process_batch(&cancel).await.unwrap();
    assert!(report.interrupted);
    assert!(report.published >= 1 && report.published < 5);

    let records = fixture.dal().outbox().list(None, 10).await.unwrap();
    let processed = records
        .iter()
        .filter(|r| r.status == OutboxStatus::Processed)
        .count();
    assert_eq!(processed, report.published);
    assert_eq!(broker.published().len(), report.published);
    for record in records.iter().filter(|r| r.status != OutboxStatus::Processed) {
        assert_eq!(record.status, OutboxStatus::Pending);
        assert_eq!(record.attempt_count, 0);
    }
}

/// Publisher that records how many publishes are in flight at once.
struct InFlightTracker {
    inner: InMemoryBroker,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

#[async_trait]
impl EventPublisher for InFlightTracker {
    async fn publish(
        &self,
        cancel: &CancellationToken,
        topic: &str,
        event: &DomainEvent,
    ) -> Result<(), PublishError> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        let result = self.inner.publish(cancel, topic, event).await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        result
    }

    async fn close(&self) -> Result<(), PublishError> {
        self.inner.close().await
    }
}

#[tokio::test]
async fn test_slow_batches_never_overlap() {
    let fixture = TestFixture::new().await;
    create_orders(&fixture, 4).await;
    let tracker = Arc::new(InFlightTracker {
        inner: InMemoryBroker::new().with_latency(Duration::from_millis(20)),
        in_flight: AtomicUsize::new(0),
        max_in_flight: AtomicUsize::new(0),
    });
    let config = RelayConfig::builder()
        .batch_size(2)
        .process_interval(Duration::from_millis(5))
        .build();
    let relay = Arc::new(OutboxRelay::new(
        Arc::new(fixture.dal()),
        tracker.clone(),
        config,
    ));
    let cancel = CancellationToken::new();

    let handle = tokio::spawn({
        let relay = relay.clone();
        let cancel = cancel.clone();
        async move { relay.start(cancel).await }
    });

    tokio::time::sleep(Duration::from_millis(300)).await;
    cancel.cancel();
    handle.await.unwrap().unwrap();

    assert_eq!(tracker.max_in_flight.load(Ordering::SeqCst), 1);
    assert_eq!(tracker.inner.published().len(), 4);
    assert_eq!(fixture.dal().outbox().stats().await.unwrap().processed, 4);
}
