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

use std::time::Duration;

use outbox::{BrokerConfig, RelayConfig, TopicConfig, UndecodablePolicy};
use serde::{Deserialize, Serialize};

/// Top-level `outbox.toml` layout.
///
/// ```toml
/// [database]
/// url = "${DATABASE_URL:-sqlite://outbox.db}"
///
/// [relay]
/// batch_size = 100
/// process_interval_ms = 5000
///
/// [broker]
/// brokers = ["localhost:9092"]
///
/// [topics]
/// order_created = "orders-created"
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutboxCtlConfig {
    pub database: DatabaseSettings,
    pub relay: RelaySettings,
    pub broker: BrokerConfig,
    pub topics: TopicConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseSettings {
    pub url: Option<String>,
    pub pool_size: u32,
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        Self {
            url: None,
            pool_size: 10,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RelaySettings {
    pub batch_size: usize,
    pub process_interval_ms: u64,
    pub max_retries: u32,
    pub undecodable_policy: UndecodablePolicy,
}

impl Default for RelaySettings {
    fn default() -> Self {
        Self {
            batch_size: 100,
            process_interval_ms: 5_000,
            max_retries: 3,
            undecodable_policy: UndecodablePolicy::DeadLetter,
        }
    }
}

impl OutboxCtlConfig {
    pub fn relay_config(&self) -> RelayConfig {
        RelayConfig::builder()
            .batch_size(self.relay.batch_size)
            .process_interval(Duration::from_millis(self.relay.process_interval_ms))
            .max_retries(self.relay.max_retries)
            .undecodable_policy(self.relay.undecodable_policy)
            .topics(self.topics.clone())
            .build()
    }
}
