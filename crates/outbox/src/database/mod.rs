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

//! Database layer: connection pools, embedded migrations and the
//! transactional handle that repositories are bound to.
//!
//! Backends are compiled in by feature (`postgres`, `sqlite`) and selected at
//! runtime from the connection URL.

pub mod connection;
pub mod schema;

pub use connection::{AnyPool, BackendType, Database};

use diesel_migrations::{embed_migrations, EmbeddedMigrations};

use crate::dal::order::OrderRepository;
use crate::dal::outbox::OutboxRepository;

#[cfg(feature = "postgres")]
pub const POSTGRES_MIGRATIONS: EmbeddedMigrations =
    embed_migrations!("src/database/migrations/postgres");

#[cfg(feature = "sqlite")]
pub const SQLITE_MIGRATIONS: EmbeddedMigrations =
    embed_migrations!("src/database/migrations/sqlite");

/// A connection with an open transaction.
///
/// Handed to unit-of-work closures. Every read and write made through
/// [`Transaction::orders`] or [`Transaction::outbox`] joins the same
/// transaction; nothing here opens a transaction of its own.
pub enum Transaction<'a> {
    #[cfg(feature = "postgres")]
    Postgres(&'a mut diesel::PgConnection),
    #[cfg(feature = "sqlite")]
    Sqlite(&'a mut diesel::SqliteConnection),
}

impl<'a> Transaction<'a> {
    /// Returns the backend this transaction runs on.
    pub fn backend(&self) -> BackendType {
        match self {
            #[cfg(feature = "postgres")]
            Transaction::Postgres(_) => BackendType::Postgres,
            #[cfg(feature = "sqlite")]
            Transaction::Sqlite(_) => BackendType::Sqlite,
        }
    }

    /// Order repository bound to this transaction.
    pub fn orders(&mut self) -> OrderRepository<'_, 'a> {
        OrderRepository::new(self)
    }

    /// Outbox repository bound to this transaction.
    pub fn outbox(&mut self) -> OutboxRepository<'_, 'a> {
        OutboxRepository::new(self)
    }
}

impl std::fmt::Debug for Transaction<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Transaction::{:?}(...)", self.backend())
    }
}

/// Runs `$body` with `$conn` bound to the concrete diesel connection behind a
/// [`Transaction`].
///
/// The body is expanded once per enabled backend, so it must type-check
/// against every connection type.
macro_rules! with_connection {
    ($tx:expr, $conn:ident => $body:expr) => {
        match $tx {
            #[cfg(feature = "postgres")]
            $crate::database::Transaction::Postgres(inner) => {
                let $conn: &mut diesel::PgConnection = &mut **inner;
                $body
            }
            #[cfg(feature = "sqlite")]
            $crate::database::Transaction::Sqlite(inner) => {
                let $conn: &mut diesel::SqliteConnection = &mut **inner;
                $body
            }
        }
    };
}

pub(crate) use with_connection;
