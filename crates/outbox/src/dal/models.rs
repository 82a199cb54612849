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

//! Backend-neutral row models and their conversion to domain types.

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use diesel::prelude::*;
use uuid::Uuid;

use crate::database::schema::{orders, outbox_messages};
use crate::error::DatabaseError;
use crate::models::order::{Order, OrderItem, OrderStatus};
use crate::models::outbox::{OutboxRecord, OutboxStatus};

/// Row model for `outbox_messages`.
#[derive(Debug, Clone, Queryable, Selectable, Insertable)]
#[diesel(table_name = outbox_messages)]
pub struct OutboxRow {
    pub id: String,
    pub aggregate_id: String,
    pub event_type: String,
    pub payload: Vec<u8>,
    pub status: String,
    pub attempt_count: i32,
    pub created_at: NaiveDateTime,
    pub processed_at: Option<NaiveDateTime>,
    pub fail_reason: Option<String>,
}

impl From<&OutboxRecord> for OutboxRow {
    fn from(record: &OutboxRecord) -> Self {
        Self {
            id: record.id.to_string(),
            aggregate_id: record.aggregate_id.clone(),
            event_type: record.event_type.clone(),
            payload: record.payload.clone(),
            status: record.status.as_str().to_string(),
            attempt_count: record.attempt_count,
            created_at: record.created_at.naive_utc(),
            processed_at: record.processed_at.map(|t| t.naive_utc()),
            fail_reason: record.fail_reason.clone(),
        }
    }
}

impl TryFrom<OutboxRow> for OutboxRecord {
    type Error = DatabaseError;

    fn try_from(row: OutboxRow) -> Result<Self, Self::Error> {
        let status =
            OutboxStatus::from_str(&row.status).ok_or_else(|| DatabaseError::InvalidRow {
                table: "outbox_messages",
                message: format!("unknown status '{}' for {}", row.status, row.id),
            })?;

        Ok(OutboxRecord {
            id: parse_uuid("outbox_messages", &row.id)?,
            aggregate_id: row.aggregate_id,
            event_type: row.event_type,
            payload: row.payload,
            status,
            attempt_count: row.attempt_count,
            created_at: to_utc(row.created_at),
            processed_at: row.processed_at.map(to_utc),
            fail_reason: row.fail_reason,
        })
    }
}

/// Row model for `orders`. Items are stored as a JSON array.
#[derive(Debug, Clone, Queryable, Selectable, Insertable)]
#[diesel(table_name = orders)]
pub struct OrderRow {
    pub id: String,
    pub customer_id: String,
    pub items: String,
    pub total_cents: i64,
    pub status: String,
    pub saga_id: String,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl TryFrom<&Order> for OrderRow {
    type Error = DatabaseError;

    fn try_from(order: &Order) -> Result<Self, Self::Error> {
        let items = serde_json::to_string(&order.items).map_err(|e| DatabaseError::InvalidRow {
            table: "orders",
            message: format!("cannot encode items for {}: {}", order.id, e),
        })?;

        Ok(Self {
            id: order.id.to_string(),
            customer_id: order.customer_id.clone(),
            items,
            total_cents: order.total_cents,
            status: order.status.as_str().to_string(),
            saga_id: order.saga_id.to_string(),
            created_at: order.created_at.naive_utc(),
            updated_at: order.updated_at.naive_utc(),
        })
    }
}

impl TryFrom<OrderRow> for Order {
    type Error = DatabaseError;

    fn try_from(row: OrderRow) -> Result<Self, Self::Error> {
        let items: Vec<OrderItem> =
            serde_json::from_str(&row.items).map_err(|e| DatabaseError::InvalidRow {
                table: "orders",
                message: format!("cannot decode items for {}: {}", row.id, e),
            })?;
        let status = OrderStatus::from_str(&row.status).ok_or_else(|| DatabaseError::InvalidRow {
            table: "orders",
            message: format!("unknown status '{}' for {}", row.status, row.id),
        })?;

        Ok(Order {
            id: parse_uuid("orders", &row.id)?,
            customer_id: row.customer_id,
            items,
            total_cents: row.total_cents,
            status,
            saga_id: parse_uuid("orders", &row.saga_id)?,
            created_at: to_utc(row.created_at),
            updated_at: to_utc(row.updated_at),
        })
    }
}

fn parse_uuid(table: &'static str, value: &str) -> Result<Uuid, DatabaseError> {
    Uuid::parse_str(value).map_err(|e| DatabaseError::InvalidRow {
        table,
        message: format!("invalid id '{}': {}", value, e),
    })
}

fn to_utc(naive: NaiveDateTime) -> DateTime<Utc> {
    Utc.from_utc_datetime(&naive)
}
