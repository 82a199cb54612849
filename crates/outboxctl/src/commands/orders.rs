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

//! Implementation of the `orders` subcommands.
//!
//! Results are printed to stdout as pretty JSON so they can be piped into
//! other tools.

use anyhow::{anyhow, Context, Result};
use outbox::models::order::{NewOrderItem, Order, OrderStatus};
use outbox::{Database, OrderService};
use serde::Serialize;
use uuid::Uuid;

/// Parses an item given as `PRODUCT:QUANTITY:UNIT_PRICE_CENTS`.
pub(crate) fn parse_item(s: &str) -> Result<NewOrderItem> {
    let parts: Vec<&str> = s.split(':').collect();
    let [product_id, quantity, price] = parts.as_slice() else {
        return Err(anyhow!(
            "Invalid item '{}': expected PRODUCT:QUANTITY:UNIT_PRICE_CENTS",
            s
        ));
    };

    let quantity: u32 = quantity
        .trim()
        .parse()
        .with_context(|| format!("Invalid quantity in item '{}'", s))?;
    let price: i64 = price
        .trim()
        .parse()
        .with_context(|| format!("Invalid unit price in item '{}'", s))?;

    Ok(NewOrderItem::new(product_id.trim(), quantity, price))
}

pub(crate) fn parse_status(s: &str) -> Result<OrderStatus> {
    OrderStatus::from_str(s).ok_or_else(|| {
        anyhow!(
            "Unknown order status '{}'. Use pending, confirmed, failed, shipped, delivered or cancelled",
            s
        )
    })
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!(
        "{}",
        serde_json::to_string_pretty(value).context("Failed to render output")?
    );
    Ok(())
}

pub async fn create(database: Database, customer_id: &str, items: &[String]) -> Result<()> {
    let items = items
        .iter()
        .map(|item| parse_item(item))
        .collect::<Result<Vec<_>>>()?;

    let order = OrderService::new(database)
        .create_order(customer_id, items)
        .await
        .context("Failed to create order")?;
    print_json(&order)
}

pub async fn get(database: Database, id: Uuid) -> Result<()> {
    let order = OrderService::new(database)
        .get_order(id)
        .await
        .with_context(|| format!("Failed to load order {}", id))?;
    print_json(&order)
}

pub async fn list(database: Database, limit: usize, offset: usize) -> Result<()> {
    let orders: Vec<Order> = OrderService::new(database)
        .list_orders(limit, offset)
        .await
        .context("Failed to list orders")?;
    print_json(&orders)
}

pub async fn set_status(database: Database, id: Uuid, status: &str) -> Result<()> {
    let status = parse_status(status)?;
    let order = OrderService::new(database)
        .update_order_status(id, status)
        .await
        .with_context(|| format!("Failed to move order {} to {}", id, status))?;
    print_json(&order)
}

pub async fn cancel(database: Database, id: Uuid, reason: Option<String>) -> Result<()> {
    let order = OrderService::new(database)
        .cancel_order(id, reason)
        .await
        .with_context(|| format!("Failed to cancel order {}", id))?;
    print_json(&order)
}
