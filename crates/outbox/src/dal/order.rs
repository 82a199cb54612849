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

//! Order data access.

use diesel::prelude::*;
use uuid::Uuid;

use super::models::OrderRow;
use super::DAL;
use crate::database::schema::orders;
use crate::database::{with_connection, Transaction};
use crate::error::{DatabaseError, OrderError};
use crate::models::order::Order;

/// Order operations bound to an open transaction.
pub struct OrderRepository<'t, 'a> {
    tx: &'t mut Transaction<'a>,
}

impl<'t, 'a> OrderRepository<'t, 'a> {
    pub(crate) fn new(tx: &'t mut Transaction<'a>) -> Self {
        Self { tx }
    }

    pub fn insert(&mut self, order: &Order) -> Result<(), DatabaseError> {
        let row = OrderRow::try_from(order)?;
        with_connection!(&mut *self.tx, conn => {
            diesel::insert_into(orders::table).values(&row).execute(conn)
        })?;
        Ok(())
    }

    pub fn get(&mut self, id: Uuid) -> Result<Option<Order>, DatabaseError> {
        let key = id.to_string();
        let row: Option<OrderRow> = with_connection!(&mut *self.tx, conn => {
            orders::table
                .find(&key)
                .select(OrderRow::as_select())
                .first(conn)
                .optional()
        })?;

        row.map(Order::try_from).transpose()
    }

    /// Persists the status and `updated_at` of an existing order.
    ///
    /// Returns `false` when no order with that id exists.
    pub fn update_status(&mut self, order: &Order) -> Result<bool, DatabaseError> {
        let key = order.id.to_string();
        let status = order.status.as_str();
        let updated_at = order.updated_at.naive_utc();
        let updated = with_connection!(&mut *self.tx, conn => {
            diesel::update(orders::table.find(&key))
                .set((orders::status.eq(status), orders::updated_at.eq(updated_at)))
                .execute(conn)
        })?;
        Ok(updated > 0)
    }

    /// Lists orders, newest first.
    pub fn list(&mut self, limit: usize, offset: usize) -> Result<Vec<Order>, DatabaseError> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let offset = i64::try_from(offset).unwrap_or(i64::MAX);
        let rows: Vec<OrderRow> = with_connection!(&mut *self.tx, conn => {
            orders::table
                .order((orders::created_at.desc(), orders::id.desc()))
                .limit(limit)
                .offset(offset)
                .select(OrderRow::as_select())
                .load(conn)
        })?;

        rows.into_iter().map(Order::try_from).collect()
    }

    pub fn count(&mut self) -> Result<i64, DatabaseError> {
        let count: i64 = with_connection!(&mut *self.tx, conn => {
            orders::table.count().get_result(conn)
        })?;
        Ok(count)
    }
}

/// Pool-level read access to orders.
#[derive(Clone)]
pub struct OrderDAL<'a> {
    dal: &'a DAL,
}

impl<'a> OrderDAL<'a> {
    pub fn new(dal: &'a DAL) -> Self {
        Self { dal }
    }

    pub async fn get(&self, id: Uuid) -> Result<Option<Order>, OrderError> {
        self.dal
            .database
            .transaction(move |tx| Ok(tx.orders().get(id)?))
            .await
    }

    pub async fn list(&self, limit: usize, offset: usize) -> Result<Vec<Order>, OrderError> {
        self.dal
            .database
            .transaction(move |tx| Ok(tx.orders().list(limit, offset)?))
            .await
    }

    pub async fn count(&self) -> Result<i64, OrderError> {
        self.dal
            .database
            .transaction(|tx| Ok(tx.orders().count()?))
            .await
    }
}
