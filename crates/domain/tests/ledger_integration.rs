//! Integration tests for the inventory ledger and cart service over the
//! in-memory store.

use std::sync::Arc;

use common::{Caller, ProductId, UserId};
use domain::cart::CartService;
use domain::inventory::{InventoryLedger, ListProduct};
use domain::{ErrorKind, Money};
use event_store::InMemoryEventStore;

fn listing(name: &str, price: i64, stock: u32) -> ListProduct {
    ListProduct {
        name: name.into(),
        organization_id: None,
        price: Money::from_units(price),
        purchase_price: Money::from_units(price / 2),
        stock_qty: stock,
    }
}

async fn list(store: &InMemoryEventStore, name: &str, price: i64, stock: u32) -> ProductId {
    InventoryLedger::new(store.clone())
        .list_product(UserId::new(), listing(name, price, stock))
        .await
        .unwrap()
        .product_id
}

mod reservations {
    use super::*;

    #[tokio::test]
    async fn concurrent_reservations_never_oversell() {
        let store = InMemoryEventStore::new();
        let product_id = list(&store, "Desk", 100, 10).await;
        let ledger = Arc::new(InventoryLedger::new(store.clone()).with_max_attempts(50));

        let mut handles = Vec::new();
        for _ in 0..8 {
            let ledger = Arc::clone(&ledger);
            handles.push(tokio::spawn(
                async move { ledger.reserve(product_id, 3).await },
            ));
        }

        let mut succeeded = 0;
        let mut short = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => succeeded += 1,
                Err(e) => {
                    assert_eq!(e.kind(), ErrorKind::InsufficientStock);
                    short += 1;
                }
            }
        }

        assert_eq!(succeeded, 3);
        assert_eq!(short, 5);
        let entry = ledger.product(product_id).await.unwrap();
        assert_eq!(entry.stock_qty, 1);
    }

    #[tokio::test]
    async fn release_restocks() {
        let store = InMemoryEventStore::new();
        let product_id = list(&store, "Chair", 40, 4).await;
        let ledger = InventoryLedger::new(store);

        ledger.reserve(product_id, 4).await.unwrap();
        let err = ledger.reserve(product_id, 1).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InsufficientStock);

        let entry = ledger.release(product_id, 2).await.unwrap();
        assert_eq!(entry.stock_qty, 2);
    }

    #[tokio::test]
    async fn unknown_product_is_not_found() {
        let ledger = InventoryLedger::new(InMemoryEventStore::new());
        let err = ledger.reserve(ProductId::new(), 1).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }
}

mod carts {
    use super::*;

    #[tokio::test]
    async fn totals_follow_every_mutation() {
        let store = InMemoryEventStore::new();
        let a = list(&store, "A", 10, 50).await;
        let b = list(&store, "B", 20, 50).await;
        let carts = CartService::new(store.clone());
        let caller = Caller::user(UserId::new());

        carts.add_item(&caller, a, 1).await.unwrap();
        carts.add_item(&caller, a, 1).await.unwrap();
        let cart = carts.add_item(&caller, b, 1).await.unwrap();
        assert_eq!(cart.lines().len(), 2);
        assert_eq!(cart.totals().quantity, 3);
        assert_eq!(cart.totals().price, Money::from_units(40));

        let cart = carts.change_quantity(&caller, b, 3).await.unwrap();
        assert_eq!(cart.totals().price, Money::from_units(80));

        let cart = carts.remove_item(&caller, a).await.unwrap();
        assert_eq!(cart.totals().quantity, 3);
        assert_eq!(cart.totals().price, Money::from_units(60));

        let cart = carts.clear(&caller).await.unwrap();
        assert_eq!(cart.totals().quantity, 0);
        assert!(cart.totals().price.is_zero());
    }

    #[tokio::test]
    async fn concurrent_first_adds_share_one_cart() {
        let store = InMemoryEventStore::new();
        let a = list(&store, "A", 10, 50).await;
        let carts = Arc::new(CartService::new(store.clone()).with_max_attempts(20));
        let caller = Caller::user(UserId::new());

        let mut handles = Vec::new();
        for _ in 0..4 {
            let carts = Arc::clone(&carts);
            let caller = caller.clone();
            handles.push(tokio::spawn(async move {
                carts.add_item(&caller, a, 1).await
            }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        let cart = carts.active_cart(&caller).await.unwrap().unwrap();
        assert_eq!(cart.totals().quantity, 4);
    }

    #[tokio::test]
    async fn carts_are_per_requester() {
        let store = InMemoryEventStore::new();
        let a = list(&store, "A", 10, 50).await;
        let carts = CartService::new(store.clone());
        let first = Caller::user(UserId::new());
        let second = Caller::user(UserId::new());

        let one = carts.add_item(&first, a, 1).await.unwrap();
        let two = carts.add_item(&second, a, 2).await.unwrap();
        assert_ne!(one.cart_id(), two.cart_id());

        let err = carts
            .change_quantity(&Caller::user(UserId::new()), a, 1)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }
}
