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

use outbox::models::order::{NewOrderItem, Order};
use outbox::{OrderError, OutboxError, UnitOfWork};

use crate::fixtures::TestFixture;

fn sample_order() -> Order {
    Order::new("customer-1", vec![NewOrderItem::new("sku-1", 1, 100)])
}

#[tokio::test]
async fn test_entity_write_rolled_back_when_outbox_write_fails() {
    let fixture = TestFixture::new().await;
    let uow = UnitOfWork::new(fixture.database());
    let order = sample_order();
    let order_id = order.id;

    let result = uow
        .execute("broken_create", move |tx| -> Result<(), OrderError> {
            tx.orders().insert(&order)?;
            tx.outbox().create_message("", "order.created", Vec::new())?;
            Ok(())
        })
        .await;

    assert!(matches!(
        result,
        Err(OrderError::Outbox(OutboxError::Validation(_)))
    ));

    let dal = fixture.dal();
    assert!(dal.orders().get(order_id).await.unwrap().is_none());
    assert_eq!(dal.outbox().stats().await.unwrap().total(), 0);
}

#[tokio::test]
async fn test_closure_error_rolls_back_both_writes() {
    let fixture = TestFixture::new().await;
    let uow = UnitOfWork::new(fixture.database());
    let order = sample_order();
    let order_id = order.id;

    let result = uow
        .execute("aborted", move |tx| -> Result<(), OrderError> {
            tx.orders().insert(&order)?;
            tx.outbox()
                .create_message(&order.id.to_string(), "order.created", b"{}".to_vec())?;
            Err(OrderError::Validation("changed my mind".to_string()))
        })
        .await;

    assert!(matches!(result, Err(OrderError::Validation(_))));
    let dal = fixture.dal();
    assert!(dal.orders().get(order_id).await.unwrap().is_none());
    assert_eq!(dal.outbox().stats().await.unwrap().pending, 0);
}

#[tokio::test]
async fn test_successful_unit_commits_entity_and_record() {
    let fixture = TestFixture::new().await;
    let uow = UnitOfWork::new(fixture.database());
    let order = sample_order();
    let order_id = order.id;

    let record = uow
        .execute("create", move |tx| -> Result<_, OrderError> {
            tx.orders().insert(&order)?;
            let record = tx.outbox().create_message(
                &order.id.to_string(),
                "order.created",
                b"{}".to_vec(),
            )?;
            Ok(record)
        })
        .await
        .unwrap();

    let dal = fixture.dal();
    assert!(dal.orders().get(order_id).await.unwrap().is_some());
    assert_eq!(record.aggregate_id, order_id.to_string());
    assert_eq!(dal.outbox().stats().await.unwrap().pending, 1);
}
