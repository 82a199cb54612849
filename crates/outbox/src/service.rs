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

//! Order use cases.
//!
//! Every state-changing call writes the order and the outbox record that
//! announces it inside one [`UnitOfWork`]. Validation happens before a
//! transaction is opened.

use tracing::info;
use uuid::Uuid;

use crate::dal::DAL;
use crate::database::{Database, Transaction};
use crate::error::OrderError;
use crate::events::{build_event, EventKind};
use crate::models::order::{NewOrderItem, Order, OrderStatus};
use crate::unit_of_work::UnitOfWork;

#[derive(Clone, Debug)]
pub struct OrderService {
    uow: UnitOfWork,
    dal: DAL,
}

impl OrderService {
    pub fn new(database: Database) -> Self {
        Self {
            uow: UnitOfWork::new(database.clone()),
            dal: DAL::new(database),
        }
    }

    /// Creates a `PENDING` order and its `order.created` record.
    pub async fn create_order(
        &self,
        customer_id: &str,
        items: Vec<NewOrderItem>,
    ) -> Result<Order, OrderError> {
        validate_new_order(customer_id, &items)?;

        let order = Order::new(customer_id.trim(), items);
        let event = build_event(&order, EventKind::Created);
        let payload = event.to_payload()?;
        let event_type = event.event_type();

        let order = self
            .uow
            .execute("create_order", move |tx| -> Result<Order, OrderError> {
                tx.orders().insert(&order)?;
                tx.outbox()
                    .create_message(&order.id.to_string(), event_type, payload)?;
                Ok(order)
            })
            .await?;

        info!(
            order_id = %order.id,
            customer_id = %order.customer_id,
            total_cents = order.total_cents,
            "Order created"
        );
        Ok(order)
    }

    pub async fn get_order(&self, id: Uuid) -> Result<Order, OrderError> {
        self.dal
            .orders()
            .get(id)
            .await?
            .ok_or(OrderError::NotFound(id))
    }

    /// Newest orders first.
    pub async fn list_orders(&self, limit: usize, offset: usize) -> Result<Vec<Order>, OrderError> {
        if limit == 0 {
            return Err(OrderError::Validation("limit must be positive".to_string()));
        }
        self.dal.orders().list(limit, offset).await
    }

    /// Moves an order along its lifecycle and records `order.status_changed`.
    ///
    /// Moving to `CANCELLED` through here is equivalent to
    /// [`cancel_order`](Self::cancel_order) without a reason.
    pub async fn update_order_status(
        &self,
        id: Uuid,
        next: OrderStatus,
    ) -> Result<Order, OrderError> {
        if next == OrderStatus::Cancelled {
            return self.cancel_order(id, None).await;
        }

        let order = self
            .uow
            .execute("update_order_status", move |tx| {
                transition(tx, id, next, |previous| EventKind::StatusChanged { previous })
            })
            .await?;

        info!(order_id = %order.id, status = %order.status, "Order status updated");
        Ok(order)
    }

    /// Cancels an order that has not shipped and records `order.cancelled`.
    pub async fn cancel_order(
        &self,
        id: Uuid,
        reason: Option<String>,
    ) -> Result<Order, OrderError> {
        let reason = reason
            .map(|r| r.trim().to_string())
            .filter(|r| !r.is_empty());

        let order = self
            .uow
            .execute("cancel_order", move |tx| {
                transition(tx, id, OrderStatus::Cancelled, |previous| {
                    EventKind::Cancelled { previous, reason }
                })
            })
            .await?;

        info!(order_id = %order.id, "Order cancelled");
        Ok(order)
    }
}

fn transition(
    tx: &mut Transaction<'_>,
    id: Uuid,
    next: OrderStatus,
    kind: impl FnOnce(OrderStatus) -> EventKind,
) -> Result<Order, OrderError> {
    let mut order = tx.orders().get(id)?.ok_or(OrderError::NotFound(id))?;
    if !order.status.can_transition_to(next) {
        return Err(OrderError::InvalidTransition {
            id,
            from: order.status,
            to: next,
        });
    }

    let previous = order.change_status(next);
    if !tx.orders().update_status(&order)? {
        return Err(OrderError::NotFound(id));
    }

    let event = build_event(&order, kind(previous));
    tx.outbox()
        .create_message(&order.id.to_string(), event.event_type(), event.to_payload()?)?;
    Ok(order)
}

fn validate_new_order(customer_id: &str, items: &[NewOrderItem]) -> Result<(), OrderError> {
    if customer_id.trim().is_empty() {
        return Err(OrderError::Validation(
            "customer id must not be empty".to_string(),
        ));
    }
    if items.is_empty() {
        return Err(OrderError::Validation(
            "an order needs at least one item".to_string(),
        ));
    }

    let mut total: i64 = 0;
    for item in items {
        if item.product_id.trim().is_empty() {
            return Err(OrderError::Validation(
                "product id must not be empty".to_string(),
            ));
        }
        if item.quantity == 0 {
            return Err(OrderError::Validation(format!(
                "quantity for '{}' must be positive",
                item.product_id
            )));
        }
        if item.unit_price_cents < 0 {
            return Err(OrderError::Validation(format!(
                "price for '{}' must not be negative",
                item.product_id
            )));
        }
        total = item
            .unit_price_cents
            .checked_mul(i64::from(item.quantity))
            .and_then(|line| total.checked_add(line))
            .ok_or_else(|| OrderError::Validation("order total overflows".to_string()))?;
    }
    Ok(())
}
