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

//! Kafka publisher backed by an rdkafka `FutureProducer`.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use rdkafka::config::ClientConfig;
use rdkafka::error::KafkaError;
use rdkafka::message::{Header, OwnedHeaders};
use rdkafka::producer::{FutureProducer, FutureRecord, Producer};
use rdkafka::types::RDKafkaErrorCode;
use rdkafka::util::Timeout;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::{EventPublisher, PublishError, HEADER_EVENT_ID, HEADER_EVENT_TYPE};
use crate::config::BrokerConfig;
use crate::events::DomainEvent;

/// Publishes events to Kafka and waits for the delivery report.
pub struct KafkaPublisher {
    producer: FutureProducer,
    message_timeout: Duration,
    closed: AtomicBool,
}

impl std::fmt::Debug for KafkaPublisher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KafkaPublisher")
            .field("message_timeout", &self.message_timeout)
            .field("closed", &self.closed)
            .finish_non_exhaustive()
    }
}

impl KafkaPublisher {
    /// Creates a producer from `config`.
    ///
    /// No connection is made here; librdkafka connects lazily on first send.
    pub fn new(config: &BrokerConfig) -> Result<Self, PublishError> {
        if config.brokers.is_empty() {
            return Err(PublishError::Broker(
                "at least one broker address is required".to_string(),
            ));
        }

        let mut client = ClientConfig::new();
        for (key, value) in config.client_properties() {
            client.set(key, value);
        }
        let producer: FutureProducer = client
            .create()
            .map_err(|e| PublishError::Broker(format!("failed to create producer: {}", e)))?;

        info!(
            brokers = %config.brokers.join(","),
            client_id = %config.client_id,
            "Kafka producer created"
        );

        Ok(Self {
            producer,
            message_timeout: config.producer.message_timeout(),
            closed: AtomicBool::new(false),
        })
    }

    fn map_error(&self, err: KafkaError) -> PublishError {
        match err.rdkafka_error_code() {
            Some(RDKafkaErrorCode::MessageTimedOut) => PublishError::Timeout(self.message_timeout),
            _ => PublishError::Broker(err.to_string()),
        }
    }
}

#[async_trait]
impl EventPublisher for KafkaPublisher {
    async fn publish(
        &self,
        cancel: &CancellationToken,
        topic: &str,
        event: &DomainEvent,
    ) -> Result<(), PublishError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(PublishError::Closed);
        }

        let payload = event.to_payload()?;
        let key = event.aggregate_id().to_string();
        let event_id = event.event_id().to_string();
        let headers = OwnedHeaders::new()
            .insert(Header {
                key: HEADER_EVENT_TYPE,
                value: Some(event.event_type()),
            })
            .insert(Header {
                key: HEADER_EVENT_ID,
                value: Some(event_id.as_str()),
            });

        let record = FutureRecord::to(topic)
            .payload(&payload)
            .key(&key)
            .headers(headers);

        let delivery = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(PublishError::Cancelled),
            result = self.producer.send(record, Timeout::After(self.message_timeout)) => result,
        };

        match delivery {
            Ok(_) => {
                debug!(
                    topic,
                    key = %key,
                    event_type = event.event_type(),
                    "Delivered to Kafka"
                );
                Ok(())
            }
            Err((err, _message)) => Err(self.map_error(err)),
        }
    }

    async fn close(&self) -> Result<(), PublishError> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }

        let producer = self.producer.clone();
        let timeout = self.message_timeout;
        let flushed = tokio::task::spawn_blocking(move || producer.flush(Timeout::After(timeout)))
            .await
            .map_err(|e| PublishError::Broker(format!("flush task failed: {}", e)))?;

        match flushed {
            Ok(()) => {
                info!("Kafka producer flushed and closed");
                Ok(())
            }
            Err(err) => {
                warn!(error = %err, "Kafka producer flush incomplete");
                Err(self.map_error(err))
            }
        }
    }
}
