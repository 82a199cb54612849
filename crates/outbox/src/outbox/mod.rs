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

//! The relay-facing outbox store port.
//!
//! The relay worker depends only on [`OutboxStore`]. The diesel-backed
//! [`DAL`](crate::dal::DAL) implements it for production use and
//! [`InMemoryOutboxStore`] implements it behind a mutex for tests and
//! embedding.
//!
//! Creating records is deliberately not part of this trait: records are
//! created through [`OutboxRepository`](crate::dal::OutboxRepository) on an
//! open transaction so they commit together with the business change.

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::OutboxError;
use crate::models::outbox::OutboxRecord;

mod memory;

pub use memory::InMemoryOutboxStore;

/// Operations the relay worker performs on stored outbox records.
#[async_trait]
pub trait OutboxStore: Send + Sync {
    /// Returns up to `limit` `PENDING` records in creation order.
    async fn get_pending_messages(&self, limit: usize) -> Result<Vec<OutboxRecord>, OutboxError>;

    /// Atomically increments the attempt count and returns the new value.
    async fn increment_attempt(&self, id: Uuid) -> Result<i32, OutboxError>;

    /// Marks a record `PROCESSED`. Idempotent for already processed records.
    async fn mark_message_as_processed(&self, id: Uuid) -> Result<(), OutboxError>;

    /// Dead-letters a `PENDING` record.
    async fn mark_message_as_failed(&self, id: Uuid, reason: &str) -> Result<(), OutboxError>;
}
