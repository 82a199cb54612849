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

use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::Mutex;
use uuid::Uuid;

use super::OutboxStore;
use crate::error::OutboxError;
use crate::models::outbox::{OutboxRecord, OutboxStatus};
use crate::models::utc_now;

/// Mutex-guarded in-memory outbox store.
///
/// Each instance owns its own map; nothing is shared between instances.
#[derive(Debug, Default)]
pub struct InMemoryOutboxStore {
    inner: Mutex<Inner>,
}

#[derive(Debug, Default)]
struct Inner {
    records: HashMap<Uuid, OutboxRecord>,
    // Insertion order, so pending scans are oldest first even when
    // timestamps collide.
    order: Vec<Uuid>,
}

impl InMemoryOutboxStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a new `PENDING` record.
    pub fn create_message(
        &self,
        aggregate_id: &str,
        event_type: &str,
        payload: Vec<u8>,
    ) -> Result<OutboxRecord, OutboxError> {
        if aggregate_id.trim().is_empty() {
            return Err(OutboxError::Validation(
                "aggregate id must not be empty".to_string(),
            ));
        }
        if event_type.trim().is_empty() {
            return Err(OutboxError::Validation(
                "event type must not be empty".to_string(),
            ));
        }

        let record = OutboxRecord {
            id: Uuid::now_v7(),
            aggregate_id: aggregate_id.to_string(),
            event_type: event_type.to_string(),
            payload,
            status: OutboxStatus::Pending,
            attempt_count: 0,
            created_at: utc_now(),
            processed_at: None,
            fail_reason: None,
        };

        let mut inner = self.inner.lock();
        inner.order.push(record.id);
        inner.records.insert(record.id, record.clone());
        Ok(record)
    }

    /// Returns a snapshot of a record.
    pub fn get(&self, id: Uuid) -> Option<OutboxRecord> {
        self.inner.lock().records.get(&id).cloned()
    }

    /// Returns snapshots of every record in creation order.
    pub fn records(&self) -> Vec<OutboxRecord> {
        let inner = self.inner.lock();
        inner
            .order
            .iter()
            .filter_map(|id| inner.records.get(id).cloned())
            .collect()
    }

    fn with_pending<T>(
        &self,
        id: Uuid,
        f: impl FnOnce(&mut OutboxRecord) -> T,
    ) -> Result<T, OutboxError> {
        let mut inner = self.inner.lock();
        let record = inner.records.get_mut(&id).ok_or(OutboxError::NotFound(id))?;
        if record.status.is_terminal() {
            return Err(OutboxError::AlreadyFinalized {
                id,
                status: record.status,
            });
        }
        Ok(f(record))
    }
}

#[async_trait]
impl OutboxStore for InMemoryOutboxStore {
    async fn get_pending_messages(&self, limit: usize) -> Result<Vec<OutboxRecord>, OutboxError> {
        let inner = self.inner.lock();
        Ok(inner
            .order
            .iter()
            .filter_map(|id| inner.records.get(id))
            .filter(|record| record.status == OutboxStatus::Pending)
            .take(limit)
            .cloned()
            .collect())
    }

    async fn increment_attempt(&self, id: Uuid) -> Result<i32, OutboxError> {
        self.with_pending(id, |record| {
            record.attempt_count += 1;
            record.attempt_count
        })
    }

    async fn mark_message_as_processed(&self, id: Uuid) -> Result<(), OutboxError> {
        match self.get(id).map(|record| record.status) {
            Some(OutboxStatus::Processed) => Ok(()),
            _ => self.with_pending(id, |record| {
                record.status = OutboxStatus::Processed;
                record.processed_at = Some(utc_now());
            }),
        }
    }

    async fn mark_message_as_failed(&self, id: Uuid, reason: &str) -> Result<(), OutboxError> {
        self.with_pending(id, |record| {
            record.status = OutboxStatus::Failed;
            record.fail_reason = Some(reason.to_string());
        })
    }
}
