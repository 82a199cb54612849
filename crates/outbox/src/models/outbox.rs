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

//! Outbox Record Model
//!
//! An outbox record is a durable announcement written in the same transaction
//! as the business change it describes. The relay worker later moves it from
//! `PENDING` to exactly one terminal state.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Represents an outbox record (domain type).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutboxRecord {
    /// Unique identifier, generated at creation
    pub id: Uuid,
    /// Identifier of the entity that produced the event; used as the broker key
    pub aggregate_id: String,
    /// Schema tag of the payload (e.g., "order.created")
    pub event_type: String,
    /// Serialized event, written once and never mutated
    pub payload: Vec<u8>,
    /// Delivery state
    pub status: OutboxStatus,
    /// Number of delivery attempts made so far
    pub attempt_count: i32,
    /// When the record was written
    pub created_at: DateTime<Utc>,
    /// When the record was acknowledged by the broker
    pub processed_at: Option<DateTime<Utc>>,
    /// Description of the last error when dead-lettered
    pub fail_reason: Option<String>,
}

impl OutboxRecord {
    /// Returns true once the record has reached `PROCESSED` or `FAILED`.
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}

/// Delivery state of an outbox record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OutboxStatus {
    /// Waiting for delivery
    Pending,
    /// Accepted by the broker
    Processed,
    /// Dead-lettered; requires operator intervention
    Failed,
}

impl OutboxStatus {
    /// Returns the string representation stored in the database.
    pub fn as_str(&self) -> &'static str {
        match self {
            OutboxStatus::Pending => "PENDING",
            OutboxStatus::Processed => "PROCESSED",
            OutboxStatus::Failed => "FAILED",
        }
    }

    /// Parses a status from its stored representation.
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "PENDING" => Some(OutboxStatus::Pending),
            "PROCESSED" => Some(OutboxStatus::Processed),
            "FAILED" => Some(OutboxStatus::Failed),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, OutboxStatus::Pending)
    }
}

impl std::fmt::Display for OutboxStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Per-status record counts, used for monitoring.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutboxStats {
    pub pending: i64,
    pub processed: i64,
    pub failed: i64,
}

impl OutboxStats {
    pub fn total(&self) -> i64 {
        self.pending + self.processed + self.failed
    }
}
