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

//! Configuration for the relay worker and the broker publisher.
//!
//! [`RelayConfig`] follows the builder pattern used by the runner configs:
//! private fields, getters, and a builder seeded with defaults.
//! [`BrokerConfig`] and [`TopicConfig`] are plain serde structs so they can be
//! read straight out of a TOML file.

use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::events::{ORDER_CANCELLED, ORDER_CREATED, ORDER_STATUS_CHANGED};

/// What the relay does with a record whose payload cannot be decoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UndecodablePolicy {
    /// Mark the record FAILED immediately with the decode error as reason.
    #[default]
    DeadLetter,
    /// Leave the record PENDING so an operator can repair it in place.
    Skip,
}

/// Configuration for [`OutboxRelay`](crate::relay::OutboxRelay).
///
/// ```rust,ignore
/// let config = RelayConfig::builder()
///     .batch_size(50)
///     .process_interval(Duration::from_secs(1))
///     .build();
/// ```
#[derive(Debug, Clone)]
pub struct RelayConfig {
    batch_size: usize,
    process_interval: Duration,
    max_retries: u32,
    undecodable_policy: UndecodablePolicy,
    topics: TopicConfig,
}

impl RelayConfig {
    pub fn builder() -> RelayConfigBuilder {
        RelayConfigBuilder::default()
    }

    /// Maximum number of records fetched per tick.
    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Delay between ticks. Also acts as the retry backoff.
    pub fn process_interval(&self) -> Duration {
        self.process_interval
    }

    /// Failed publishes allowed before a record is dead-lettered.
    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    pub fn undecodable_policy(&self) -> UndecodablePolicy {
        self.undecodable_policy
    }

    pub fn topics(&self) -> &TopicConfig {
        &self.topics
    }
}

impl Default for RelayConfig {
    fn default() -> Self {
        RelayConfigBuilder::default().build()
    }
}

#[derive(Debug, Clone)]
pub struct RelayConfigBuilder {
    config: RelayConfig,
}

impl Default for RelayConfigBuilder {
    fn default() -> Self {
        Self {
            config: RelayConfig {
                batch_size: 100,
                process_interval: Duration::from_secs(5),
                max_retries: 3,
                undecodable_policy: UndecodablePolicy::DeadLetter,
                topics: TopicConfig::default(),
            },
        }
    }
}

impl RelayConfigBuilder {
    pub fn batch_size(mut self, value: usize) -> Self {
        self.config.batch_size = value;
        self
    }

    pub fn process_interval(mut self, value: Duration) -> Self {
        self.config.process_interval = value;
        self
    }

    pub fn max_retries(mut self, value: u32) -> Self {
        self.config.max_retries = value;
        self
    }

    pub fn undecodable_policy(mut self, value: UndecodablePolicy) -> Self {
        self.config.undecodable_policy = value;
        self
    }

    pub fn topics(mut self, value: TopicConfig) -> Self {
        self.config.topics = value;
        self
    }

    pub fn build(self) -> RelayConfig {
        self.config
    }
}

/// Destination topic per event type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TopicConfig {
    pub order_created: String,
    pub order_status_changed: String,
    pub order_cancelled: String,
}

impl Default for TopicConfig {
    fn default() -> Self {
        Self {
            order_created: "orders-created".to_string(),
            order_status_changed: "orders-updated".to_string(),
            order_cancelled: "orders-cancelled".to_string(),
        }
    }
}

impl TopicConfig {
    /// Resolves the topic for an event type, falling back to the type itself.
    pub fn topic_for<'a>(&'a self, event_type: &'a str) -> &'a str {
        match event_type {
            ORDER_CREATED => &self.order_created,
            ORDER_STATUS_CHANGED => &self.order_status_changed,
            ORDER_CANCELLED => &self.order_cancelled,
            other => other,
        }
    }
}

/// Acknowledgement level the producer waits for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequiredAcks {
    None,
    Leader,
    #[default]
    All,
}

impl RequiredAcks {
    pub fn as_str(&self) -> &'static str {
        match self {
            RequiredAcks::None => "0",
            RequiredAcks::Leader => "1",
            RequiredAcks::All => "all",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SecurityProtocol {
    #[default]
    Plaintext,
    Ssl,
    SaslPlaintext,
    SaslSsl,
}

impl SecurityProtocol {
    pub fn as_str(&self) -> &'static str {
        match self {
            SecurityProtocol::Plaintext => "plaintext",
            SecurityProtocol::Ssl => "ssl",
            SecurityProtocol::SaslPlaintext => "sasl_plaintext",
            SecurityProtocol::SaslSsl => "sasl_ssl",
        }
    }

    fn uses_sasl(&self) -> bool {
        matches!(
            self,
            SecurityProtocol::SaslPlaintext | SecurityProtocol::SaslSsl
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SaslMechanism {
    #[default]
    #[serde(rename = "PLAIN")]
    Plain,
    #[serde(rename = "SCRAM-SHA-256")]
    ScramSha256,
    #[serde(rename = "SCRAM-SHA-512")]
    ScramSha512,
}

impl SaslMechanism {
    pub fn as_str(&self) -> &'static str {
        match self {
            SaslMechanism::Plain => "PLAIN",
            SaslMechanism::ScramSha256 => "SCRAM-SHA-256",
            SaslMechanism::ScramSha512 => "SCRAM-SHA-512",
        }
    }
}

/// TLS and SASL settings. Ignored entirely unless `enabled` is set.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SecurityConfig {
    pub enabled: bool,
    pub protocol: SecurityProtocol,
    pub sasl_mechanism: SaslMechanism,
    pub username: Option<String>,
    pub password: Option<String>,
    pub ca_location: Option<String>,
}

impl fmt::Debug for SecurityConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SecurityConfig")
            .field("enabled", &self.enabled)
            .field("protocol", &self.protocol)
            .field("sasl_mechanism", &self.sasl_mechanism)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "****"))
            .field("ca_location", &self.ca_location)
            .finish()
    }
}

/// Producer retry and delivery settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProducerConfig {
    pub retry_max: u32,
    pub retry_backoff_ms: u64,
    pub message_timeout_ms: u64,
    pub required_acks: RequiredAcks,
}

impl Default for ProducerConfig {
    fn default() -> Self {
        Self {
            retry_max: 3,
            retry_backoff_ms: 100,
            message_timeout_ms: 5_000,
            required_acks: RequiredAcks::All,
        }
    }
}

impl ProducerConfig {
    pub fn message_timeout(&self) -> Duration {
        Duration::from_millis(self.message_timeout_ms)
    }
}

/// Connection settings for the message broker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BrokerConfig {
    pub brokers: Vec<String>,
    pub client_id: String,
    pub connection_timeout_ms: u64,
    pub producer: ProducerConfig,
    pub security: SecurityConfig,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            brokers: vec!["localhost:9092".to_string()],
            client_id: "outbox-relay".to_string(),
            connection_timeout_ms: 10_000,
            producer: ProducerConfig::default(),
            security: SecurityConfig::default(),
        }
    }
}

impl BrokerConfig {
    pub fn connection_timeout(&self) -> Duration {
        Duration::from_millis(self.connection_timeout_ms)
    }

    /// Renders the settings as librdkafka client properties.
    pub fn client_properties(&self) -> BTreeMap<String, String> {
        let mut props = BTreeMap::new();
        let mut set = |key: &str, value: String| {
            props.insert(key.to_string(), value);
        };

        set("bootstrap.servers", self.brokers.join(","));
        set("client.id", self.client_id.clone());
        set(
            "socket.connection.setup.timeout.ms",
            self.connection_timeout_ms.to_string(),
        );
        set("message.send.max.retries", self.producer.retry_max.to_string());
        set("retry.backoff.ms", self.producer.retry_backoff_ms.to_string());
        set(
            "message.timeout.ms",
            self.producer.message_timeout_ms.to_string(),
        );
        set(
            "request.required.acks",
            self.producer.required_acks.as_str().to_string(),
        );

        let security = &self.security;
        if security.enabled {
            set("security.protocol", security.protocol.as_str().to_string());
            if security.protocol.uses_sasl() {
                set("sasl.mechanism", security.sasl_mechanism.as_str().to_string());
                if let Some(username) = &security.username {
                    set("sasl.username", username.clone());
                }
                if let Some(password) = &security.password {
                    set("sasl.password", password.clone());
                }
            }
            if let Some(ca) = &security.ca_location {
                set("ssl.ca.location", ca.clone());
            }
        } else {
            set("security.protocol", SecurityProtocol::Plaintext.as_str().to_string());
        }

        props
    }
}
