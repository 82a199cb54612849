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

//! In-process broker used by tests and the CLI's demo mode.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::{EventPublisher, PublishError, HEADER_EVENT_ID, HEADER_EVENT_TYPE};
use crate::events::{DomainEvent, EventError};

/// A message accepted by the [`InMemoryBroker`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishedMessage {
    pub topic: String,
    pub key: String,
    pub headers: Vec<(String, String)>,
    pub payload: Vec<u8>,
}

impl PublishedMessage {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    /// Decodes the payload using the `event_type` header.
    pub fn decode(&self) -> Result<DomainEvent, EventError> {
        let event_type = self.header(HEADER_EVENT_TYPE).unwrap_or_default();
        DomainEvent::decode(event_type, &self.payload)
    }
}

#[derive(Debug, Default)]
struct BrokerState {
    messages: Vec<PublishedMessage>,
    fail_next: usize,
    unavailable: bool,
}

/// Broker that keeps accepted messages in memory.
///
/// Acceptance can be delayed with [`with_latency`](Self::with_latency) to
/// exercise cancellation, and failures can be injected with
/// [`fail_next`](Self::fail_next) or [`set_unavailable`](Self::set_unavailable).
#[derive(Debug, Default)]
pub struct InMemoryBroker {
    state: Mutex<BrokerState>,
    closed: AtomicBool,
    latency: Duration,
}

impl InMemoryBroker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Delays every acceptance by `latency`.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Rejects the next `count` publishes with a broker error.
    pub fn fail_next(&self, count: usize) {
        self.state.lock().fail_next = count;
    }

    /// Rejects every publish while `unavailable` is set.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.state.lock().unavailable = unavailable;
    }

    /// Messages accepted so far, in acceptance order.
    pub fn published(&self) -> Vec<PublishedMessage> {
        self.state.lock().messages.clone()
    }

    pub fn published_to(&self, topic: &str) -> Vec<PublishedMessage> {
        self.state
            .lock()
            .messages
            .iter()
            .filter(|m| m.topic == topic)
            .cloned()
            .collect()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    fn accept(&self, message: PublishedMessage) -> Result<(), PublishError> {
        let mut state = self.state.lock();
        if state.unavailable {
            return Err(PublishError::Broker("broker unavailable".to_string()));
        }
        if state.fail_next > 0 {
            state.fail_next -= 1;
            return Err(PublishError::Broker("injected failure".to_string()));
        }
        state.messages.push(message);
        Ok(())
    }
}

#[async_trait]
impl EventPublisher for InMemoryBroker {
    async fn publish(
        &self,
        cancel: &CancellationToken,
        topic: &str,
        event: &DomainEvent,
    ) -> Result<(), PublishError> {
        if self.is_closed() {
            return Err(PublishError::Closed);
        }
        if cancel.is_cancelled() {
            return Err(PublishError::Cancelled);
        }

        let message = PublishedMessage {
            topic: topic.to_string(),
            key: event.aggregate_id().to_string(),
            headers: vec![
                (HEADER_EVENT_TYPE.to_string(), event.event_type().to_string()),
                (HEADER_EVENT_ID.to_string(), event.event_id().to_string()),
            ],
            payload: event.to_payload()?,
        };

        if !self.latency.is_zero() {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(PublishError::Cancelled),
                _ = tokio::time::sleep(self.latency) => {}
            }
        }

        self.accept(message)?;
        debug!(
            topic,
            event_type = event.event_type(),
            event_id = %event.event_id(),
            "Message accepted"
        );
        Ok(())
    }

    async fn close(&self) -> Result<(), PublishError> {
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}
