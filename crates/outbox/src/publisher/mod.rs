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

//! Broker publishers.
//!
//! [`EventPublisher`] is the only seam through which events leave the
//! process. The relay worker owns one publisher and calls it sequentially;
//! implementations must still be `Send + Sync` so the worker can run on any
//! runtime thread.
//!
//! Two implementations are provided:
//!
//! - [`InMemoryBroker`]: an in-process broker with configurable acceptance
//!   latency and failure injection
//! - `KafkaPublisher` (feature `kafka`): an rdkafka `FutureProducer`
//!
//! Every message is keyed by the aggregate id so per-order ordering is kept
//! within a partition, and carries `event_type` and `event_id` headers.

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::events::{DomainEvent, EventError};

mod memory;
pub use memory::{InMemoryBroker, PublishedMessage};

#[cfg(feature = "kafka")]
mod kafka;
#[cfg(feature = "kafka")]
pub use kafka::KafkaPublisher;

/// Header carrying the event type tag.
pub const HEADER_EVENT_TYPE: &str = "event_type";
/// Header carrying the event id, for consumer-side deduplication.
pub const HEADER_EVENT_ID: &str = "event_id";

#[derive(Debug, Error)]
pub enum PublishError {
    /// The publisher was closed; no further sends are accepted.
    #[error("Publisher is closed")]
    Closed,

    /// The caller's cancellation fired before the broker accepted the message.
    #[error("Publish cancelled before broker acknowledgement")]
    Cancelled,

    #[error("Broker did not acknowledge within {0:?}")]
    Timeout(Duration),

    #[error("Broker error: {0}")]
    Broker(String),

    #[error(transparent)]
    Event(#[from] EventError),
}

/// Sends domain events to a message broker.
#[async_trait]
pub trait EventPublisher: Send + Sync {
    /// Publishes `event` to `topic`, returning once the broker has accepted it.
    ///
    /// If `cancel` fires first the call returns [`PublishError::Cancelled`].
    /// The message may still reach the broker in that case; consumers
    /// deduplicate on the `event_id` header.
    async fn publish(
        &self,
        cancel: &CancellationToken,
        topic: &str,
        event: &DomainEvent,
    ) -> Result<(), PublishError>;

    /// Flushes buffered sends and releases the connection.
    ///
    /// Every `publish` after `close` fails with [`PublishError::Closed`].
    async fn close(&self) -> Result<(), PublishError>;
}
