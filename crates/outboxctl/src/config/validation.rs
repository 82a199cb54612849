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

use outbox::{BackendType, BrokerConfig, TopicConfig};

use crate::config::types::{DatabaseSettings, OutboxCtlConfig, RelaySettings};
use crate::config::ValidationError;

pub trait Validate {
    fn validate(&self) -> Result<(), ValidationError>;
}

impl Validate for OutboxCtlConfig {
    fn validate(&self) -> Result<(), ValidationError> {
        let mut errors = Vec::new();

        if let Err(e) = self.database.validate() {
            errors.push(e);
        }
        if let Err(e) = self.relay.validate() {
            errors.push(e);
        }
        if let Err(e) = self.broker.validate() {
            errors.push(e);
        }
        if let Err(e) = self.topics.validate() {
            errors.push(e);
        }

        match errors.len() {
            0 => Ok(()),
            1 => Err(errors.remove(0)),
            _ => Err(ValidationError::Multiple { errors }),
        }
    }
}

impl Validate for DatabaseSettings {
    fn validate(&self) -> Result<(), ValidationError> {
        let url = self
            .url
            .as_deref()
            .filter(|url| !url.trim().is_empty())
            .ok_or(ValidationError::MissingDatabaseUrl)?;

        if BackendType::from_url(url).is_err() {
            return Err(ValidationError::InvalidDatabaseUrl {
                url: url.to_string(),
            });
        }

        if self.pool_size == 0 || self.pool_size > 100 {
            return Err(ValidationError::InvalidPoolSize {
                size: self.pool_size,
            });
        }

        Ok(())
    }
}

impl Validate for RelaySettings {
    fn validate(&self) -> Result<(), ValidationError> {
        if self.batch_size == 0 {
            return Err(ValidationError::InvalidBatchSize {
                size: self.batch_size,
            });
        }
        if self.process_interval_ms == 0 {
            return Err(ValidationError::InvalidInterval {
                interval_ms: self.process_interval_ms,
            });
        }
        if self.max_retries == 0 {
            return Err(ValidationError::InvalidMaxRetries {
                retries: self.max_retries,
            });
        }
        Ok(())
    }
}

impl Validate for BrokerConfig {
    fn validate(&self) -> Result<(), ValidationError> {
        if self.brokers.iter().all(|b| b.trim().is_empty()) {
            return Err(ValidationError::NoBrokers);
        }
        Ok(())
    }
}

impl Validate for TopicConfig {
    fn validate(&self) -> Result<(), ValidationError> {
        let topics = [
            ("order.created", &self.order_created),
            ("order.status_changed", &self.order_status_changed),
            ("order.cancelled", &self.order_cancelled),
        ];
        for (event_type, topic) in topics {
            if topic.trim().is_empty() {
                return Err(ValidationError::EmptyTopic { event_type });
            }
        }
        Ok(())
    }
}
