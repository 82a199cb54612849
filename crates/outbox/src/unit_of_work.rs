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

//! Unit of work: one atomic boundary around a business write and the outbox
//! records describing it.
//!
//! ```rust,ignore
//! let uow = UnitOfWork::new(database);
//! uow.execute("create_order", move |tx| {
//!     tx.orders().insert(&order)?;
//!     tx.outbox().create_message(&aggregate_id, "order.created", payload)?;
//!     Ok::<_, OrderError>(order)
//! })
//! .await?;
//! ```
//!
//! The closure runs on a pooled connection inside a blocking task. When it
//! returns `Ok` the transaction commits; on `Err` it rolls back and the
//! closure's error is returned unchanged, so no entity write is ever visible
//! without its outbox record.

use std::fmt::Display;
use std::time::Instant;

use tracing::{debug, warn};

use crate::database::{Database, Transaction};
use crate::error::DatabaseError;

#[derive(Clone, Debug)]
pub struct UnitOfWork {
    database: Database,
}

impl UnitOfWork {
    pub fn new(database: Database) -> Self {
        Self { database }
    }

    pub fn database(&self) -> &Database {
        &self.database
    }

    /// Runs `op` in a single transaction.
    ///
    /// `label` only identifies the unit in logs.
    pub async fn execute<T, E, F>(&self, label: &'static str, op: F) -> Result<T, E>
    where
        F: FnOnce(&mut Transaction<'_>) -> Result<T, E> + Send + 'static,
        T: Send + 'static,
        E: From<DatabaseError> + Display + Send + 'static,
    {
        let started = Instant::now();
        let result = self.database.transaction(op).await;
        let elapsed_ms = started.elapsed().as_millis() as u64;

        match &result {
            Ok(_) => debug!(unit = label, elapsed_ms, "Unit of work committed"),
            Err(err) => warn!(unit = label, elapsed_ms, error = %err, "Unit of work rolled back"),
        }
        result
    }
}
