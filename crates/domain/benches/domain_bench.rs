use common::{CartId, OrderId, ProductId, UserId};
use criterion::{Criterion, criterion_group, criterion_main};
use domain::cart::{Cart, CartLine, recompute};
use domain::inventory::{InventoryLedger, ListProduct};
use domain::order::{Order, OrderNumber, OrderStatus, PlaceOrder, ShippingAddress};
use domain::{Aggregate, Money, Transaction, load_aggregate};
use event_store::InMemoryEventStore;

fn lines(count: usize) -> Vec<CartLine> {
    (0..count)
        .map(|i| CartLine {
            product_id: ProductId::new(),
            product_name: format!("item-{i}"),
            quantity: (i % 5 + 1) as u32,
            unit_price: Money::from_minor(1_250 + i as i64),
        })
        .collect()
}

fn bench_recompute(c: &mut Criterion) {
    let lines = lines(50);
    c.bench_function("domain/cart_recompute_50_lines", |b| {
        b.iter(|| recompute(std::hint::black_box(&lines)));
    });
}

fn bench_order_replay(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let store = InMemoryEventStore::new();
    let order_id = OrderId::new();

    rt.block_on(async {
        let mut tx = Transaction::begin(&store);
        let mut order = Order::default();
        let events = order
            .place(PlaceOrder {
                order_id,
                order_number: OrderNumber::generate(),
                cart_id: CartId::new(),
                requester: UserId::new(),
                address: ShippingAddress {
                    first_name: "Bench".into(),
                    last_name: "Mark".into(),
                    phone_number: "01000000000".into(),
                    address: "1 Loop St".into(),
                    city: "Giza".into(),
                    region: None,
                },
                subtotal: Money::from_units(40),
                delivery_price: Money::from_units(5),
                delivery_date: None,
            })
            .unwrap();
        tx.stage(&mut order, events).unwrap();
        for status in [OrderStatus::Processing, OrderStatus::Shipped] {
            let events = order
                .change_status(status, common::OperatorId::new("bench"))
                .unwrap();
            tx.stage(&mut order, events).unwrap();
        }
        tx.commit().await.unwrap();
    });

    c.bench_function("domain/order_replay", |b| {
        b.iter(|| {
            rt.block_on(async {
                let order: Order = load_aggregate(&store, order_id.into()).await.unwrap();
                assert!(order.exists());
            });
        });
    });
}

fn bench_reserve(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let ledger = InventoryLedger::new(InMemoryEventStore::new());
    let product_id = rt.block_on(async {
        ledger
            .list_product(UserId::new(), ListProduct {
                name: "Bench".into(),
                organization_id: None,
                price: Money::from_units(10),
                purchase_price: Money::from_units(7),
                stock_qty: u32::MAX,
            })
            .await
            .unwrap()
            .product_id
    });

    c.bench_function("domain/inventory_reserve", |b| {
        b.iter(|| {
            rt.block_on(async {
                ledger.reserve(product_id, 1).await.unwrap();
            });
        });
    });
}

criterion_group!(benches, bench_recompute, bench_order_replay, bench_reserve);
criterion_main!(benches);
