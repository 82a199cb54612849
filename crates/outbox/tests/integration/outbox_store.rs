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

use chrono::{Duration, Utc};
use outbox::models::outbox::{OutboxRecord, OutboxStatus};
use outbox::{OutboxError, OutboxStore};
use uuid::Uuid;

use crate::fixtures::TestFixture;

async fn insert(fixture: &TestFixture, aggregate_id: &str) -> OutboxRecord {
    let aggregate_id = aggregate_id.to_string();
    fixture
        .database()
        .transaction(move |tx| {
            tx.outbox()
                .create_message(&aggregate_id, "order.created", b"{}".to_vec())
        })
        .await
        .expect("Failed to insert outbox message")
}

#[tokio::test]
async fn test_create_message_starts_pending() {
    let fixture = TestFixture::new().await;
    let record = insert(&fixture, "order-1").await;

    let stored = fixture.dal().outbox().get(record.id).await.unwrap().unwrap();
    assert_eq!(stored, record);
    assert_eq!(stored.status, OutboxStatus::Pending);
    assert_eq!(stored.attempt_count, 0);
    assert!(stored.processed_at.is_none());
    assert!(stored.fail_reason.is_none());
}

#[tokio::test]
async fn test_get_pending_respects_limit_and_excludes_terminal_records() {
    let fixture = TestFixture::new().await;
    let dal = fixture.dal();

    let mut ids = Vec::new();
    for i in 0..5 {
        ids.push(insert(&fixture, &format!("order-{}", i)).await.id);
    }
    dal.mark_message_as_processed(ids[0]).await.unwrap();
    dal.mark_message_as_failed(ids[1], "broker down").await.unwrap();

    let batch = dal.get_pending_messages(2).await.unwrap();
    assert_eq!(batch.len(), 2);
    assert_eq!(batch[0].id, ids[2]);
    assert_eq!(batch[1].id, ids[3]);

    let all = dal.get_pending_messages(100).await.unwrap();
    assert_eq!(all.len(), 3);
    assert!(all.iter().all(|r| r.status == OutboxStatus::Pending));
}

#[tokio::test]
async fn test_get_pending_keeps_creation_order_within_one_transaction() {
    let fixture = TestFixture::new().await;

    let ids: Vec<Uuid> = fixture
        .database()
        .transaction(|tx| {
            (0..200)
                .map(|i| {
                    tx.outbox()
                        .create_message(&format!("order-{}", i), "order.created", b"{}".to_vec())
                        .map(|record| record.id)
                })
                .collect::<Result<Vec<_>, OutboxError>>()
        })
        .await
        .expect("Failed to insert outbox messages");

    let pending: Vec<Uuid> = fixture
        .dal()
        .get_pending_messages(200)
        .await
        .unwrap()
        .into_iter()
        .map(|record| record.id)
        .collect();
    assert_eq!(pending, ids);
}

#[tokio::test]
async fn test_mark_processed_twice_keeps_first_timestamp() {
    let fixture = TestFixture::new().await;
    let dal = fixture.dal();
    let record = insert(&fixture, "order-1").await;

    dal.mark_message_as_processed(record.id).await.unwrap();
    let first = dal.outbox().get(record.id).await.unwrap().unwrap();
    assert_eq!(first.status, OutboxStatus::Processed);
    let processed_at = first.processed_at.expect("processed_at should be set");

    tokio::time::sleep(std::time::Duration::from_millis(5)).await;
    dal.mark_message_as_processed(record.id).await.unwrap();
    let second = dal.outbox().get(record.id).await.unwrap().unwrap();
    assert_eq!(second.processed_at, Some(processed_at));
}

#[tokio::test]
async fn test_terminal_records_reject_transitions() {
    let fixture = TestFixture::new().await;
    let dal = fixture.dal();
    let failed = insert(&fixture, "order-1").await;
    let processed = insert(&fixture, "order-2").await;

    dal.mark_message_as_failed(failed.id, "boom").await.unwrap();
    dal.mark_message_as_processed(processed.id).await.unwrap();

    assert!(matches!(
        dal.mark_message_as_processed(failed.id).await,
        Err(OutboxError::AlreadyFinalized {
            status: OutboxStatus::Failed,
            ..
        })
    ));
    assert!(matches!(
        dal.mark_message_as_failed(processed.id, "late").await,
        Err(OutboxError::AlreadyFinalized {
            status: OutboxStatus::Processed,
            ..
        })
    ));
    assert!(matches!(
        dal.increment_attempt(failed.id).await,
        Err(OutboxError::AlreadyFinalized { .. })
    ));

    let still_failed = dal.outbox().get(failed.id).await.unwrap().unwrap();
    assert_eq!(still_failed.fail_reason.as_deref(), Some("boom"));
}

#[tokio::test]
async fn test_unknown_ids_are_not_found() {
    let fixture = TestFixture::new().await;
    let dal = fixture.dal();
    let id = Uuid::new_v4();

    assert!(matches!(
        dal.increment_attempt(id).await,
        Err(OutboxError::NotFound(missing)) if missing == id
    ));
    assert!(matches!(
        dal.mark_message_as_processed(id).await,
        Err(OutboxError::NotFound(_))
    ));
    assert!(matches!(
        dal.mark_message_as_failed(id, "x").await,
        Err(OutboxError::NotFound(_))
    ));
}

#[tokio::test]
async fn test_increment_attempt_counts_up() {
    let fixture = TestFixture::new().await;
    let dal = fixture.dal();
    let record = insert(&fixture, "order-1").await;

    assert_eq!(dal.increment_attempt(record.id).await.unwrap(), 1);
    assert_eq!(dal.increment_attempt(record.id).await.unwrap(), 2);

    let stored = dal.outbox().get(record.id).await.unwrap().unwrap();
    assert_eq!(stored.attempt_count, 2);
    assert_eq!(stored.status, OutboxStatus::Pending);
}

#[tokio::test]
async fn test_stats_and_list_by_status() {
    let fixture = TestFixture::new().await;
    let dal = fixture.dal();
    let a = insert(&fixture, "order-1").await;
    let b = insert(&fixture, "order-2").await;
    insert(&fixture, "order-3").await;

    dal.mark_message_as_processed(a.id).await.unwrap();
    dal.mark_message_as_failed(b.id, "nope").await.unwrap();

    let stats = dal.outbox().stats().await.unwrap();
    assert_eq!(stats.pending, 1);
    assert_eq!(stats.processed, 1);
    assert_eq!(stats.failed, 1);
    assert_eq!(stats.total(), 3);

    let failed = dal
        .outbox()
        .list(Some(OutboxStatus::Failed), 10)
        .await
        .unwrap();
    assert_eq!(failed.len(), 1);
    assert_eq!(failed[0].id, b.id);

    assert_eq!(dal.outbox().list(None, 10).await.unwrap().len(), 3);
}

#[tokio::test]
async fn test_purge_only_removes_processed_records() {
    let fixture = TestFixture::new().await;
    let dal = fixture.dal();
    let processed = insert(&fixture, "order-1").await;
    let failed = insert(&fixture, "order-2").await;
    let pending = insert(&fixture, "order-3").await;

    dal.mark_message_as_processed(processed.id).await.unwrap();
    dal.mark_message_as_failed(failed.id, "nope").await.unwrap();

    let cutoff = Utc::now() + Duration::seconds(1);
    assert_eq!(dal.outbox().count_processed_before(cutoff).await.unwrap(), 1);
    assert_eq!(dal.outbox().delete_processed_before(cutoff).await.unwrap(), 1);

    assert!(dal.outbox().get(processed.id).await.unwrap().is_none());
    assert!(dal.outbox().get(failed.id).await.unwrap().is_some());
    assert!(dal.outbox().get(pending.id).await.unwrap().is_some());

    let earlier = Utc::now() - Duration::hours(1);
    assert_eq!(dal.outbox().delete_processed_before(earlier).await.unwrap(), 0);
}
