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

//! # Outbox
//!
//! A transactional outbox for services that must change business state and
//! announce that change to a message broker without losing either half.
//!
//! The crate is organised leaves first:
//!
//! - [`database`]: connection pooling, migrations and the transactional handle
//! - [`dal`]: repositories bound to a transaction plus pool-level accessors
//! - [`unit_of_work`]: one begin/commit/rollback cycle around a closure
//! - [`events`]: pure construction and decoding of domain event payloads
//! - [`publisher`]: broker adapters (in-memory, and Kafka behind `kafka`)
//! - [`relay`]: the background worker that drains pending records
//! - [`service`]: order use cases that write an entity and its event atomically
//!
//! ## Writing an entity and its event together
//!
//! ```rust,ignore
//! use outbox::{Database, OrderService};
//! use outbox::models::order::NewOrderItem;
//!
//! let database = Database::try_new("sqlite://orders.db", 1)?;
//! database.run_migrations().await?;
//!
//! let service = OrderService::new(database.clone());
//! let order = service
//!     .create_order("customer-1", vec![NewOrderItem::new("sku-1", 2, 1_250)])
//!     .await?;
//! ```
//!
//! ## Relaying pending records
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use outbox::{dal::DAL, publisher::InMemoryBroker, OutboxRelay, RelayConfig};
//! use tokio_util::sync::CancellationToken;
//!
//! let relay = OutboxRelay::new(
//!     Arc::new(DAL::new(database)),
//!     Arc::new(InMemoryBroker::new()),
//!     RelayConfig::default(),
//! );
//! let shutdown = CancellationToken::new();
//! tokio::spawn({
//!     let shutdown = shutdown.clone();
//!     async move { relay.start(shutdown).await }
//! });
//! ```

#[cfg(not(any(feature = "postgres", feature = "sqlite")))]
compile_error!("at least one database backend feature (`postgres` or `sqlite`) must be enabled");

pub mod config;
pub mod dal;
pub mod database;
pub mod error;
pub mod events;
pub mod models;
pub mod outbox;
pub mod publisher;
pub mod relay;
pub mod service;
pub mod unit_of_work;

pub use config::{BrokerConfig, RelayConfig, TopicConfig, UndecodablePolicy};
pub use database::{BackendType, Database, Transaction};
pub use error::{DatabaseError, OrderError, OutboxError};
pub use events::{build_event, DomainEvent, EventError, EventKind};
pub use outbox::{InMemoryOutboxStore, OutboxStore};
pub use publisher::{EventPublisher, PublishError};
pub use relay::{BatchReport, OutboxRelay, RelayError};
pub use service::OrderService;
pub use unit_of_work::UnitOfWork;
