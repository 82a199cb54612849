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

use outbox::events::{ORDER_CANCELLED, ORDER_CREATED, ORDER_STATUS_CHANGED};
use outbox::models::order::{NewOrderItem, OrderStatus};
use outbox::models::outbox::OutboxStatus;
use outbox::{DomainEvent, OrderError};
use uuid::Uuid;

use crate::fixtures::TestFixture;

fn items() -> Vec<NewOrderItem> {
    vec![
        NewOrderItem::new("sku-1", 2, 1_250),
        NewOrderItem::new("sku-2", 1, 499),
    ]
}

#[tokio::test]
async fn test_create_order_writes_exactly_one_pending_record() {
    let fixture = TestFixture::new().await;
    let service = fixture.service();

    let order = service.create_order("customer-1", items()).await.unwrap();
    assert_eq!(order.total_cents, 2_999);
    assert_eq!(order.status, OrderStatus::Pending);

    let records = fixture.dal().outbox().list(None, 10).await.unwrap();
    assert_eq!(records.len(), 1);
    let record = &records[0];
    assert_eq!(record.aggregate_id, order.id.to_string());
    assert_eq!(record.event_type, ORDER_CREATED);
    assert_eq!(record.status, OutboxStatus::Pending);

    match DomainEvent::decode(&record.event_type, &record.payload).unwrap() {
        DomainEvent::OrderCreated(created) => {
            assert_eq!(created.order_id, order.id);
            assert_eq!(created.saga_id, order.saga_id);
            assert_eq!(created.items, order.items);
        }
        other => panic!("unexpected event: {:?}", other),
    }

    assert_eq!(service.get_order(order.id).await.unwrap(), order);
}

#[tokio::test]
async fn test_invalid_order_writes_nothing() {
    let fixture = TestFixture::new().await;
    let service = fixture.service();

    let err = service.create_order("customer-1", Vec::new()).await.unwrap_err();
    assert!(matches!(err, OrderError::Validation(_)));

    let dal = fixture.dal();
    assert_eq!(dal.orders().count().await.unwrap(), 0);
    assert_eq!(dal.outbox().stats().await.unwrap().total(), 0);
}

#[tokio::test]
async fn test_status_change_records_event() {
    let fixture = TestFixture::new().await;
    let service = fixture.service();
    let order = service.create_order("customer-1", items()).await.unwrap();

    let confirmed = service
        .update_order_status(order.id, OrderStatus::Confirmed)
        .await
        .unwrap();
    assert_eq!(confirmed.status, OrderStatus::Confirmed);

    let changed = fixture
        .dal()
        .outbox()
        .list(None, 10)
        .await
        .unwrap()
        .into_iter()
        .find(|r| r.event_type == ORDER_STATUS_CHANGED)
        .expect("status change record");

    match DomainEvent::decode(&changed.event_type, &changed.payload).unwrap() {
        DomainEvent::OrderStatusChanged(event) => {
            assert_eq!(event.previous_status, OrderStatus::Pending);
            assert_eq!(event.new_status, OrderStatus::Confirmed);
        }
        other => panic!("unexpected event: {:?}", other),
    }
}

#[tokio::test]
async fn test_invalid_transition_is_rejected_without_records() {
    let fixture = TestFixture::new().await;
    let service = fixture.service();
    let order = service.create_order("customer-1", items()).await.unwrap();

    let err = service
        .update_order_status(order.id, OrderStatus::Delivered)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        OrderError::InvalidTransition {
            from: OrderStatus::Pending,
            to: OrderStatus::Delivered,
            ..
        }
    ));

    assert_eq!(fixture.dal().outbox().stats().await.unwrap().total(), 1);
    assert_eq!(
        service.get_order(order.id).await.unwrap().status,
        OrderStatus::Pending
    );
}

#[tokio::test]
async fn test_cancel_from_confirmed_records_previous_status_and_reason() {
    let fixture = TestFixture::new().await;
    let service = fixture.service();
    let order = service.create_order("customer-1", items()).await.unwrap();
    service
        .update_order_status(order.id, OrderStatus::Confirmed)
        .await
        .unwrap();

    let cancelled = service
        .cancel_order(order.id, Some("out of stock".to_string()))
        .await
        .unwrap();
    assert_eq!(cancelled.status, OrderStatus::Cancelled);

    let record = fixture
        .dal()
        .outbox()
        .list(None, 10)
        .await
        .unwrap()
        .into_iter()
        .find(|r| r.event_type == ORDER_CANCELLED)
        .expect("cancellation record");

    match DomainEvent::decode(&record.event_type, &record.payload).unwrap() {
        DomainEvent::OrderCancelled(event) => {
            assert_eq!(event.previous_status, OrderStatus::Confirmed);
            assert_eq!(event.reason.as_deref(), Some("out of stock"));
            assert_eq!(event.items, order.items);
        }
        other => panic!("unexpected event: {:?}", other),
    }
}

#[tokio::test]
async fn test_shipped_order_cannot_be_cancelled() {
    let fixture = TestFixture::new().await;
    let service = fixture.service();
    let order = service.create_order("customer-1", items()).await.unwrap();
    service
        .update_order_status(order.id, OrderStatus::Confirmed)
        .await
        .unwrap();
    service
        .update_order_status(order.id, OrderStatus::Shipped)
        .await
        .unwrap();

    let err = service.cancel_order(order.id, None).await.unwrap_err();
    assert!(matches!(err, OrderError::InvalidTransition { .. }));
}

#[tokio::test]
async fn test_missing_order_is_not_found() {
    let fixture = TestFixture::new().await;
    let service = fixture.service();
    let id = Uuid::new_v4();

    assert!(matches!(
        service.get_order(id).await,
        Err(OrderError::NotFound(missing)) if missing == id
    ));
    assert!(matches!(
        service.cancel_order(id, None).await,
        Err(OrderError::NotFound(_))
    ));
}

#[tokio::test]
async fn test_list_orders_pages_newest_first() {
    let fixture = TestFixture::new().await;
    let service = fixture.service();

    let mut created = Vec::new();
    for i in 0..3 {
        created.push(
            service
                .create_order(&format!("customer-{}", i), items())
                .await
                .unwrap(),
        );
        tokio::time::sleep(std::time::Duration::from_millis(2)).await;
    }

    let first_page = service.list_orders(2, 0).await.unwrap();
    assert_eq!(first_page.len(), 2);
    assert_eq!(first_page[0].id, created[2].id);
    assert_eq!(first_page[1].id, created[1].id);

    let second_page = service.list_orders(2, 2).await.unwrap();
    assert_eq!(second_page.len(), 1);
    assert_eq!(second_page[0].id, created[0].id);
}
