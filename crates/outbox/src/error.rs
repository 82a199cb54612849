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

//! Error types shared across the persistence and use-case layers.
//!
//! Each layer owns one enum. Lower layers convert upward through `From`
//! so `?` carries a store failure from a repository call all the way to the
//! use case that opened the transaction.

use thiserror::Error;
use uuid::Uuid;

use crate::events::EventError;
use crate::models::order::OrderStatus;
use crate::models::outbox::OutboxStatus;

/// Failures raised while talking to the relational store.
#[derive(Debug, Error)]
pub enum DatabaseError {
    /// A connection could not be checked out of the pool.
    #[error("Connection pool error: {0}")]
    ConnectionPool(String),

    /// The blocking connection task panicked or was aborted.
    #[error("Connection interaction failed: {0}")]
    Interact(String),

    /// The query itself failed.
    #[error("Query failed: {0}")]
    Query(#[from] diesel::result::Error),

    /// Embedded migrations could not be applied.
    #[error("Migration failed: {0}")]
    Migration(String),

    /// The connection string does not name a backend compiled into this build.
    #[error("Unsupported database URL '{url}': {reason}")]
    UnsupportedBackend { url: String, reason: String },

    /// A stored row could not be mapped back into its domain type.
    #[error("Invalid row in '{table}': {message}")]
    InvalidRow { table: &'static str, message: String },
}

/// Failures from outbox store operations.
#[derive(Debug, Error)]
pub enum OutboxError {
    #[error("Outbox message not found: {0}")]
    NotFound(Uuid),

    /// The record already reached a terminal state and cannot move again.
    #[error("Outbox message {id} is already {status}")]
    AlreadyFinalized { id: Uuid, status: OutboxStatus },

    #[error("Invalid outbox message: {0}")]
    Validation(String),

    #[error(transparent)]
    Database(#[from] DatabaseError),
}

impl From<diesel::result::Error> for OutboxError {
    fn from(err: diesel::result::Error) -> Self {
        OutboxError::Database(DatabaseError::Query(err))
    }
}

/// Failures from order use cases.
#[derive(Debug, Error)]
pub enum OrderError {
    #[error("Invalid order: {0}")]
    Validation(String),

    #[error("Order not found: {0}")]
    NotFound(Uuid),

    #[error("Order {id} cannot move from {from} to {to}")]
    InvalidTransition {
        id: Uuid,
        from: OrderStatus,
        to: OrderStatus,
    },

    #[error(transparent)]
    Outbox(#[from] OutboxError),

    #[error(transparent)]
    Event(#[from] EventError),

    #[error(transparent)]
    Database(#[from] DatabaseError),
}

impl From<diesel::result::Error> for OrderError {
    fn from(err: diesel::result::Error) -> Self {
        OrderError::Database(DatabaseError::Query(err))
    }
}
