use std::sync::Arc;

use rust_decimal::Decimal;

use procure_catalog::{Product, Supplier};
use procure_inventory::MovementKind;
use procure_purchasing::{DeliveryStatus, PurchaseOrderStatus, RngSource, ScriptedSource};

use super::*;
use crate::store::InMemoryStore;

fn dec(s: &str) -> Decimal {
    s.parse().unwrap()
}

struct Fixture {
    store: Arc<InMemoryStore>,
    supplier_id: SupplierId,
    product_id: ProductId,
}

fn test_fixture() -> Fixture {
    let store = Arc::new(InMemoryStore::new());
    let supplier = Supplier::new(SupplierId::generate(), "Acme Wholesale").unwrap();
    let product = Product::new(ProductId::generate(), "Keyboard", 0, dec("80.00")).unwrap();
    let fixture = Fixture {
        store: store.clone(),
        supplier_id: supplier.id,
        product_id: product.id,
    };
    store.insert_supplier(supplier).unwrap();
    store.insert_product(product).unwrap();
    fixture
}

fn add_product(store: &InMemoryStore, stock: i64) -> ProductId {
    let product = Product::new(ProductId::generate(), "Mouse", stock, dec("9.99")).unwrap();
    let id = product.id;
    store.insert_product(product).unwrap();
    id
}

/// Midpoint draws: no price change, no delay, complete delivery.
fn neutral_engine(store: Arc<InMemoryStore>) -> PurchaseOrderEngine<Arc<InMemoryStore>> {
    PurchaseOrderEngine::new(store, ScriptedSource::new([0.5]))
}

fn line(product_id: ProductId, qty: i64, price: &str) -> NewOrderLine {
    NewOrderLine {
        product_id,
        requested_quantity: qty,
        requested_unit_price: dec(price),
    }
}

fn received(product_id: ProductId, qty: i64) -> ReceivedLine {
    ReceivedLine {
        product_id,
        received_quantity: qty,
    }
}

#[tokio::test]
async fn order_through_invoice_scenario() {
    let f = test_fixture();
    let engine = PurchaseOrderEngine::new(f.store.clone(), RngSource::seeded(7));

    let created = engine
        .create_purchase_order(f.supplier_id, vec![line(f.product_id, 10, "100.00")])
        .await
        .unwrap();
    assert_eq!(created.status, PurchaseOrderStatus::Pending);
    assert!(created.expected_delay_days <= 5);
    let unit_price = created.lines[0].unit_price;
    assert!(unit_price >= dec("95.00") && unit_price <= dec("105.00"), "{unit_price}");
    assert_eq!(unit_price.round_dp(2), unit_price);

    let invoice = engine
        .confirm_delivery(created.order_id, vec![received(f.product_id, 8)])
        .await
        .unwrap();
    assert_eq!(invoice.total_amount, unit_price * Decimal::from(8));
    assert_eq!(invoice.lines[0].variance, -2);
    assert_eq!(invoice.lines[0].unit_price, unit_price);

    let product = f.store.product(f.product_id).await.unwrap().unwrap();
    assert_eq!(product.stock, 8);

    let movements = f.store.stock_movements(f.product_id).await.unwrap();
    assert_eq!(movements.len(), 1);
    assert_eq!(movements[0].kind, MovementKind::Income);
    assert_eq!(movements[0].quantity, 8);
    assert_eq!(movements[0].reference, Some(created.order_id.0));

    let order = engine.get_purchase_order(created.order_id).await.unwrap();
    assert_eq!(order.status, PurchaseOrderStatus::Completed);
    assert_eq!(order.invoice_id, Some(invoice.invoice_id.0));
    assert_eq!(engine.invoice_for_order(created.order_id).await.unwrap(), invoice);
}

#[tokio::test]
async fn simulation_replay_is_idempotent() {
    let f = test_fixture();
    let engine = PurchaseOrderEngine::new(f.store.clone(), RngSource::seeded(99));
    let other = add_product(&f.store, 0);

    let created = engine
        .create_purchase_order(
            f.supplier_id,
            vec![line(f.product_id, 10, "100.00"), line(other, 3, "4.20")],
        )
        .await
        .unwrap();

    let first = engine.simulate_provider_response(created.order_id).await.unwrap();
    let second = engine.simulate_provider_response(created.order_id).await.unwrap();
    assert_eq!(first, second);
    assert_eq!(first, created);
}

#[tokio::test]
async fn scripted_draws_force_each_outcome() {
    let f = test_fixture();
    let partial = add_product(&f.store, 0);
    let missing = add_product(&f.store, 0);

    // price x3 (midpoint), delay hit + 2 days, then line draws:
    // complete, partial with ratio 0.75, not available.
    let rng = ScriptedSource::new([0.5, 0.5, 0.5, 0.1, 0.3, 0.5, 0.2, 0.625, 0.05]);
    let engine = PurchaseOrderEngine::new(f.store.clone(), rng);

    let created = engine
        .create_purchase_order(
            f.supplier_id,
            vec![
                line(f.product_id, 4, "10.00"),
                line(partial, 10, "10.00"),
                line(missing, 6, "10.00"),
            ],
        )
        .await
        .unwrap();

    assert_eq!(created.expected_delay_days, 2);
    let statuses: Vec<_> = created.lines.iter().map(|l| l.delivery_status).collect();
    assert_eq!(
        statuses,
        vec![DeliveryStatus::Complete, DeliveryStatus::Partial, DeliveryStatus::NotAvailable]
    );
    assert_eq!(created.lines[1].simulated_quantity, 7);
    assert_eq!(created.lines[1].message, "Partial delivery: 7 of 10 units");
    assert_eq!(created.lines[2].message, "Product not available from supplier");
    assert!(created.lines.iter().all(|l| l.unit_price == dec("10.00")));
}

#[tokio::test]
async fn seeded_engines_are_reproducible() {
    let f = test_fixture();
    let a = PurchaseOrderEngine::new(f.store.clone(), RngSource::seeded(42));
    let b = PurchaseOrderEngine::new(f.store.clone(), RngSource::seeded(42));

    let lines = vec![line(f.product_id, 25, "19.99")];
    let ra = a.create_purchase_order(f.supplier_id, lines.clone()).await.unwrap();
    let rb = b.create_purchase_order(f.supplier_id, lines).await.unwrap();

    assert_ne!(ra.order_id, rb.order_id);
    assert_eq!(ra.expected_delay_days, rb.expected_delay_days);
    assert_eq!(ra.lines[0].unit_price, rb.lines[0].unit_price);
    assert_eq!(ra.lines[0].simulated_quantity, rb.lines[0].simulated_quantity);
}

#[tokio::test]
async fn foreign_product_confirmation_changes_nothing() {
    let f = test_fixture();
    let engine = neutral_engine(f.store.clone());
    let stranger = add_product(&f.store, 5);

    let created = engine
        .create_purchase_order(f.supplier_id, vec![line(f.product_id, 10, "1.00")])
        .await
        .unwrap();

    let err = engine
        .confirm_delivery(
            created.order_id,
            vec![received(f.product_id, 10), received(stranger, 1)],
        )
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::NotFound(_)), "got {err:?}");

    assert_eq!(f.store.product(f.product_id).await.unwrap().unwrap().stock, 0);
    assert_eq!(f.store.product(stranger).await.unwrap().unwrap().stock, 5);
    assert!(f.store.stock_movements(f.product_id).await.unwrap().is_empty());
    let order = engine.get_purchase_order(created.order_id).await.unwrap();
    assert_eq!(order.status, PurchaseOrderStatus::Pending);
    assert!(matches!(
        engine.invoice_for_order(created.order_id).await,
        Err(EngineError::NotFound(_))
    ));
}

#[tokio::test]
async fn second_confirmation_conflicts_and_stock_moves_once() {
    let f = test_fixture();
    let engine = neutral_engine(f.store.clone());
    let created = engine
        .create_purchase_order(f.supplier_id, vec![line(f.product_id, 10, "2.50")])
        .await
        .unwrap();

    engine
        .confirm_delivery(created.order_id, vec![received(f.product_id, 10)])
        .await
        .unwrap();
    let err = engine
        .confirm_delivery(created.order_id, vec![received(f.product_id, 10)])
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::ConflictingState(_)), "got {err:?}");

    assert_eq!(f.store.product(f.product_id).await.unwrap().unwrap().stock, 10);
    assert_eq!(f.store.stock_movements(f.product_id).await.unwrap().len(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_confirmations_issue_one_invoice() {
    let f = test_fixture();
    let engine = Arc::new(neutral_engine(f.store.clone()));
    let created = engine
        .create_purchase_order(f.supplier_id, vec![line(f.product_id, 6, "3.00")])
        .await
        .unwrap();

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let engine = engine.clone();
            let product_id = f.product_id;
            tokio::spawn(async move {
                engine
                    .confirm_delivery(created.order_id, vec![received(product_id, 6)])
                    .await
            })
        })
        .collect();

    let mut successes = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => successes += 1,
            Err(EngineError::ConflictingState(_)) => {}
            Err(other) => panic!("unexpected error: {other:?}"),
        }
    }
    assert_eq!(successes, 1);
    assert_eq!(f.store.product(f.product_id).await.unwrap().unwrap().stock, 6);
}

#[tokio::test]
async fn zero_quantity_confirmation_is_rejected() {
    let f = test_fixture();
    let engine = neutral_engine(f.store.clone());
    let other = add_product(&f.store, 2);
    let created = engine
        .create_purchase_order(
            f.supplier_id,
            vec![line(f.product_id, 3, "5.00"), line(other, 1, "7.25")],
        )
        .await
        .unwrap();

    let err = engine
        .confirm_delivery(
            created.order_id,
            vec![received(f.product_id, 0), received(other, 1)],
        )
        .await
        .unwrap_err();
    match err {
        EngineError::InvalidInput(msg) if msg.contains("must be positive") => {}
        other => panic!("expected invalid input, got {other:?}"),
    }

    assert!(f.store.stock_movements(other).await.unwrap().is_empty());
    assert_eq!(f.store.product(other).await.unwrap().unwrap().stock, 2);
    let order = engine.get_purchase_order(created.order_id).await.unwrap();
    assert_eq!(order.status, PurchaseOrderStatus::Pending);
    assert!(engine.invoice_for_order(created.order_id).await.is_err());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_confirmations_of_different_orders_share_stock() {
    let f = test_fixture();
    let engine = Arc::new(neutral_engine(f.store.clone()));

    let mut order_ids = Vec::new();
    for qty in 1..=6 {
        let created = engine
            .create_purchase_order(f.supplier_id, vec![line(f.product_id, qty, "2.50")])
            .await
            .unwrap();
        order_ids.push((created.order_id, qty));
    }

    let handles: Vec<_> = order_ids
        .iter()
        .map(|&(order_id, qty)| {
            let engine = engine.clone();
            let product_id = f.product_id;
            tokio::spawn(async move {
                engine
                    .confirm_delivery(order_id, vec![received(product_id, qty)])
                    .await
            })
        })
        .collect();

    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    let expected: i64 = order_ids.iter().map(|(_, qty)| qty).sum();
    assert_eq!(f.store.product(f.product_id).await.unwrap().unwrap().stock, expected);
    let movements = f.store.stock_movements(f.product_id).await.unwrap();
    assert_eq!(movements.len(), order_ids.len());
    assert!(movements.iter().all(|m| m.kind == MovementKind::Income));
}

#[tokio::test]
async fn cancelled_order_cannot_be_confirmed() {
    let f = test_fixture();
    let engine = neutral_engine(f.store.clone());
    let created = engine
        .create_purchase_order(f.supplier_id, vec![line(f.product_id, 1, "1.00")])
        .await
        .unwrap();

    let cancelled = engine
        .cancel_purchase_order(created.order_id, Some("duplicate order".to_string()))
        .await
        .unwrap();
    assert_eq!(cancelled.status, PurchaseOrderStatus::Cancelled);

    for result in [
        engine
            .confirm_delivery(created.order_id, vec![received(f.product_id, 1)])
            .await
            .map(|_| ()),
        engine
            .cancel_purchase_order(created.order_id, None)
            .await
            .map(|_| ()),
    ] {
        assert!(matches!(result, Err(EngineError::ConflictingState(_))), "got {result:?}");
    }
}

#[tokio::test]
async fn creation_rejects_bad_references_and_input() {
    let f = test_fixture();
    let engine = neutral_engine(f.store.clone());

    let unknown_supplier = engine
        .create_purchase_order(SupplierId::generate(), vec![line(f.product_id, 1, "1.00")])
        .await;
    assert!(matches!(unknown_supplier, Err(EngineError::NotFound(_))));

    let unknown_product = engine
        .create_purchase_order(f.supplier_id, vec![line(ProductId::generate(), 1, "1.00")])
        .await;
    assert!(matches!(unknown_product, Err(EngineError::NotFound(_))));

    for lines in [
        vec![],
        vec![line(f.product_id, 0, "1.00")],
        vec![line(f.product_id, 1, "-1.00")],
        vec![line(f.product_id, 1, "1.00"), line(f.product_id, 2, "1.00")],
    ] {
        let result = engine.create_purchase_order(f.supplier_id, lines).await;
        assert!(matches!(result, Err(EngineError::InvalidInput(_))), "got {result:?}");
    }

    assert!(engine.list_purchase_orders().await.unwrap().is_empty());
}

#[tokio::test]
async fn inactive_catalog_records_are_invalid_input() {
    let f = test_fixture();
    let engine = neutral_engine(f.store.clone());

    let mut retired = Product::new(ProductId::generate(), "Retired", 0, dec("1.00")).unwrap();
    retired.deactivate();
    let retired_id = retired.id;
    f.store.insert_product(retired).unwrap();
    let result = engine
        .create_purchase_order(f.supplier_id, vec![line(retired_id, 1, "1.00")])
        .await;
    assert!(matches!(result, Err(EngineError::InvalidInput(_))));

    let mut dormant = Supplier::new(SupplierId::generate(), "Dormant").unwrap();
    dormant.deactivate();
    let dormant_id = dormant.id;
    f.store.insert_supplier(dormant).unwrap();
    let result = engine
        .create_purchase_order(dormant_id, vec![line(f.product_id, 1, "1.00")])
        .await;
    assert!(matches!(result, Err(EngineError::InvalidInput(_))));
}

#[tokio::test]
async fn queries_on_unknown_orders_are_not_found() {
    let f = test_fixture();
    let engine = neutral_engine(f.store.clone());
    let id = PurchaseOrderId::generate();

    assert!(matches!(engine.get_purchase_order(id).await, Err(EngineError::NotFound(_))));
    assert!(matches!(
        engine.simulate_provider_response(id).await,
        Err(EngineError::NotFound(_))
    ));
    assert!(matches!(engine.invoice_for_order(id).await, Err(EngineError::NotFound(_))));
    assert!(matches!(
        engine.confirm_delivery(id, vec![received(f.product_id, 1)]).await,
        Err(EngineError::NotFound(_))
    ));
}

#[tokio::test]
async fn list_returns_orders_oldest_first() {
    let f = test_fixture();
    let engine = neutral_engine(f.store.clone());

    let mut ids = Vec::new();
    for qty in 1..=3 {
        let created = engine
            .create_purchase_order(f.supplier_id, vec![line(f.product_id, qty, "1.00")])
            .await
            .unwrap();
        ids.push(created.order_id);
        std::thread::sleep(std::time::Duration::from_millis(2));
    }

    let listed: Vec<_> = engine
        .list_purchase_orders()
        .await
        .unwrap()
        .into_iter()
        .map(|o| o.order_id)
        .collect();
    assert_eq!(listed, ids);
}
