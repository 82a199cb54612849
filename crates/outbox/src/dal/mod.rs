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

//! Data Access Layer with runtime backend selection.
//!
//! Repositories come in two shapes:
//!
//! - transaction-bound repositories ([`OrderRepository`], [`OutboxRepository`])
//!   obtained from a [`Transaction`](crate::database::Transaction) inside a
//!   unit of work
//! - pool-level accessors ([`OrderDAL`], [`OutboxDAL`]) obtained from [`DAL`],
//!   each call running in its own short transaction
//!
//! # Example
//!
//! ```rust,ignore
//! use outbox::dal::DAL;
//! use outbox::database::Database;
//!
//! let dal = DAL::new(Database::try_new("sqlite://orders.db", 1)?);
//! let pending = dal.outbox().get_pending_messages(100).await?;
//! ```

use crate::database::{BackendType, Database};

pub mod models;
pub mod order;
pub mod outbox;

pub use order::{OrderDAL, OrderRepository};
pub use outbox::{OutboxDAL, OutboxRepository};

/// The Data Access Layer struct.
///
/// `DAL` is `Clone`; every clone shares the same connection pool.
#[derive(Clone, Debug)]
pub struct DAL {
    /// The database instance with connection pool
    pub database: Database,
}

impl DAL {
    pub fn new(database: Database) -> Self {
        DAL { database }
    }

    /// Returns the backend type for this DAL instance.
    pub fn backend(&self) -> BackendType {
        self.database.backend()
    }

    /// Returns a reference to the underlying database.
    pub fn database(&self) -> &Database {
        &self.database
    }

    /// Returns an outbox DAL for relay-side outbox operations.
    pub fn outbox(&self) -> OutboxDAL<'_> {
        OutboxDAL::new(self)
    }

    /// Returns an order DAL for read-only order queries.
    pub fn orders(&self) -> OrderDAL<'_> {
        OrderDAL::new(self)
    }
}
