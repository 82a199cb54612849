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

//! Domain events and the event factory.
//!
//! [`build_event`] turns an order change into a self-contained event: every
//! field a consumer needs is copied into the payload, because the payload is
//! serialized once into the outbox and never recomputed. The relay worker uses
//! [`DomainEvent::decode`] to turn a stored payload back into a typed event
//! before publishing it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::models::order::{Order, OrderItem, OrderStatus};

pub const ORDER_CREATED: &str = "order.created";
pub const ORDER_STATUS_CHANGED: &str = "order.status_changed";
pub const ORDER_CANCELLED: &str = "order.cancelled";

/// Errors from encoding or decoding event payloads.
///
/// Decoding errors are permanent: retrying the same payload cannot succeed.
#[derive(Debug, Error)]
pub enum EventError {
    #[error("Unknown event type '{0}'")]
    UnknownEventType(String),

    #[error("Malformed '{event_type}' payload: {source}")]
    Malformed {
        event_type: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Failed to serialize event: {0}")]
    Serialization(#[source] serde_json::Error),
}

/// Which change to an order an event describes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventKind {
    Created,
    StatusChanged { previous: OrderStatus },
    Cancelled {
        previous: OrderStatus,
        reason: Option<String>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderCreated {
    pub event_id: Uuid,
    pub saga_id: Uuid,
    pub order_id: Uuid,
    pub customer_id: String,
    pub items: Vec<OrderItem>,
    pub total_cents: i64,
    pub status: OrderStatus,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderStatusChanged {
    pub event_id: Uuid,
    pub saga_id: Uuid,
    pub order_id: Uuid,
    pub customer_id: String,
    pub previous_status: OrderStatus,
    pub new_status: OrderStatus,
    pub total_cents: i64,
    pub changed_at: DateTime<Utc>,
}

/// Carries the cancelled lines so inventory can be released without a lookup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderCancelled {
    pub event_id: Uuid,
    pub saga_id: Uuid,
    pub order_id: Uuid,
    pub customer_id: String,
    pub previous_status: OrderStatus,
    pub items: Vec<OrderItem>,
    pub total_cents: i64,
    pub reason: Option<String>,
    pub cancelled_at: DateTime<Utc>,
}

/// A typed domain event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DomainEvent {
    OrderCreated(OrderCreated),
    OrderStatusChanged(OrderStatusChanged),
    OrderCancelled(OrderCancelled),
}

impl DomainEvent {
    /// The schema tag stored alongside the payload.
    pub fn event_type(&self) -> &'static str {
        match self {
            DomainEvent::OrderCreated(_) => ORDER_CREATED,
            DomainEvent::OrderStatusChanged(_) => ORDER_STATUS_CHANGED,
            DomainEvent::OrderCancelled(_) => ORDER_CANCELLED,
        }
    }

    pub fn event_id(&self) -> Uuid {
        match self {
            DomainEvent::OrderCreated(e) => e.event_id,
            DomainEvent::OrderStatusChanged(e) => e.event_id,
            DomainEvent::OrderCancelled(e) => e.event_id,
        }
    }

    /// Identifier of the order the event belongs to; used as the message key.
    pub fn aggregate_id(&self) -> Uuid {
        match self {
            DomainEvent::OrderCreated(e) => e.order_id,
            DomainEvent::OrderStatusChanged(e) => e.order_id,
            DomainEvent::OrderCancelled(e) => e.order_id,
        }
    }

    pub fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            DomainEvent::OrderCreated(e) => e.created_at,
            DomainEvent::OrderStatusChanged(e) => e.changed_at,
            DomainEvent::OrderCancelled(e) => e.cancelled_at,
        }
    }

    /// Serializes the event body to JSON bytes.
    pub fn to_payload(&self) -> Result<Vec<u8>, EventError> {
        let bytes = match self {
            DomainEvent::OrderCreated(e) => serde_json::to_vec(e),
            DomainEvent::OrderStatusChanged(e) => serde_json::to_vec(e),
            DomainEvent::OrderCancelled(e) => serde_json::to_vec(e),
        };
        bytes.map_err(EventError::Serialization)
    }

    /// Decodes a stored payload into the event shape named by `event_type`.
    pub fn decode(event_type: &str, payload: &[u8]) -> Result<Self, EventError> {
        let malformed = |source| EventError::Malformed {
            event_type: event_type.to_string(),
            source,
        };

        match event_type {
            ORDER_CREATED => serde_json::from_slice(payload)
                .map(DomainEvent::OrderCreated)
                .map_err(malformed),
            ORDER_STATUS_CHANGED => serde_json::from_slice(payload)
                .map(DomainEvent::OrderStatusChanged)
                .map_err(malformed),
            ORDER_CANCELLED => serde_json::from_slice(payload)
                .map(DomainEvent::OrderCancelled)
                .map_err(malformed),
            other => Err(EventError::UnknownEventType(other.to_string())),
        }
    }
}

/// Builds the event announcing `kind` for `order`.
///
/// Pure: the only non-deterministic field is the generated event id.
/// Timestamps come from the order itself.
pub fn build_event(order: &Order, kind: EventKind) -> DomainEvent {
    let event_id = Uuid::new_v4();
    match kind {
        EventKind::Created => DomainEvent::OrderCreated(OrderCreated {
            event_id,
            saga_id: order.saga_id,
            order_id: order.id,
            customer_id: order.customer_id.clone(),
            items: order.items.clone(),
            total_cents: order.total_cents,
            status: order.status,
            created_at: order.created_at,
        }),
        EventKind::StatusChanged { previous } => {
            DomainEvent::OrderStatusChanged(OrderStatusChanged {
                event_id,
                saga_id: order.saga_id,
                order_id: order.id,
                customer_id: order.customer_id.clone(),
                previous_status: previous,
                new_status: order.status,
                total_cents: order.total_cents,
                changed_at: order.updated_at,
            })
        }
        EventKind::Cancelled { previous, reason } => DomainEvent::OrderCancelled(OrderCancelled {
            event_id,
            saga_id: order.saga_id,
            order_id: order.id,
            customer_id: order.customer_id.clone(),
            previous_status: previous,
            items: order.items.clone(),
            total_cents: order.total_cents,
            reason,
            cancelled_at: order.updated_at,
        }),
    }
}
