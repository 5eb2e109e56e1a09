use common::{PaymentId, ProductId, UserId};
use event_store::EventStore;

use crate::aggregate::Aggregate;
use crate::error::DomainError;
use crate::keys;
use crate::order::OrderNumber;
use crate::payment::{PaymentChannel, PaymentKind, PaymentRecord, PaymentStatus, RecordPayment};
use crate::transaction::{DEFAULT_MAX_ATTEMPTS, Transaction, load_aggregate, retry_on_conflict};

use super::{CatalogEntry, InventoryError, ListProduct, Product};

/// Stages a reservation of `quantity` units inside `tx`.
///
/// The product's stream is committed with the version read here, so a
/// concurrent reservation that commits first makes this one fail with a
/// retryable conflict instead of overselling.
pub async fn stage_reservation<S: EventStore + ?Sized>(
    tx: &mut Transaction<'_, S>,
    product_id: ProductId,
    quantity: u32,
    reference: Option<String>,
) -> Result<Product, DomainError> {
    let mut product: Product = tx.load_existing(product_id.into(), "Product").await?;
    let events = product.reserve(quantity, reference)?;
    tx.stage_with_snapshot(&mut product, events)?;
    metrics::counter!("inventory_reservations_total").increment(1);
    Ok(product)
}

/// Stages a release (restock) of `quantity` units inside `tx`.
pub async fn stage_release<S: EventStore + ?Sized>(
    tx: &mut Transaction<'_, S>,
    product_id: ProductId,
    quantity: u32,
    reference: Option<String>,
) -> Result<Product, DomainError> {
    let mut product: Product = tx.load_existing(product_id.into(), "Product").await?;
    let events = product.release(quantity, reference)?;
    tx.stage_with_snapshot(&mut product, events)?;
    metrics::counter!("inventory_releases_total").increment(1);
    Ok(product)
}

/// Stand-alone access to the ledger and the catalog view over it.
pub struct InventoryLedger<S: EventStore> {
    store: S,
    max_attempts: u32,
}

impl<S: EventStore> InventoryLedger<S> {
    pub fn new(store: S) -> Self {
        Self {
            store,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    /// Lists a product together with the cash expense of buying its
    /// opening stock, in one commit.
    #[tracing::instrument(skip(self, input), fields(name = %input.name))]
    pub async fn list_product(
        &self,
        listed_by: UserId,
        input: ListProduct,
    ) -> Result<CatalogEntry, DomainError> {
        let product_id = ProductId::new();
        let expense = input
            .purchase_price
            .checked_times(input.stock_qty)
            .ok_or(InventoryError::InvalidPrice(input.purchase_price))?;

        let mut tx = Transaction::begin(&self.store).on_behalf_of(listed_by);
        let mut product = Product::default();
        let events = product.list(product_id, input)?;
        tx.stage(&mut product, events)?;

        let payment_id = PaymentId::new();
        let number = OrderNumber::generate();
        let mut payment = PaymentRecord::default();
        let events = payment.record(RecordPayment {
            payment_id,
            order_number: number.clone(),
            payer: listed_by,
            status: PaymentStatus::Paid,
            channel: PaymentChannel::Cash,
            wallet: None,
            kind: PaymentKind::Expenses,
            reference: Some(product_id.to_string()),
            proof: None,
            total_price: expense,
        })?;
        tx.stage(&mut payment, events)?;
        tx.claim(keys::order_payment(&number), payment_id);
        tx.commit().await?;

        tracing::info!(%product_id, "product listed");
        catalog_entry(&product, product_id)
    }

    /// Catalog lookup by id.
    pub async fn product(&self, product_id: ProductId) -> Result<CatalogEntry, DomainError> {
        let product: Product = load_aggregate(&self.store, product_id.into()).await?;
        catalog_entry(&product, product_id)
    }

    #[tracing::instrument(skip(self))]
    pub async fn reserve(
        &self,
        product_id: ProductId,
        quantity: u32,
    ) -> Result<CatalogEntry, DomainError> {
        let store = &self.store;
        retry_on_conflict("inventory_reserve", self.max_attempts, move || async move {
            let mut tx = Transaction::begin(store);
            let product = stage_reservation(&mut tx, product_id, quantity, None).await?;
            tx.commit().await?;
            catalog_entry(&product, product_id)
        })
        .await
    }

    #[tracing::instrument(skip(self))]
    pub async fn release(
        &self,
        product_id: ProductId,
        quantity: u32,
    ) -> Result<CatalogEntry, DomainError> {
        let store = &self.store;
        retry_on_conflict("inventory_release", self.max_attempts, move || async move {
            let mut tx = Transaction::begin(store);
            let product = stage_release(&mut tx, product_id, quantity, None).await?;
            tx.commit().await?;
            catalog_entry(&product, product_id)
        })
        .await
    }
}

fn catalog_entry(product: &Product, product_id: ProductId) -> Result<CatalogEntry, DomainError> {
    if !product.exists() {
        return Err(DomainError::not_found("Product", product_id));
    }
    product
        .catalog_entry()
        .ok_or_else(|| DomainError::not_found("Product", product_id))
}

#[cfg(test)]
mod tests {
    use event_store::{EventStore, InMemoryEventStore};

    use super::*;
    use crate::error::ErrorKind;
    use crate::money::Money;

    fn desk(stock: u32) -> ListProduct {
        ListProduct {
            name: "Desk".into(),
            organization_id: None,
            price: Money::from_units(10),
            purchase_price: Money::from_units(7),
            stock_qty: stock,
        }
    }

    #[tokio::test]
    async fn reserve_and_release_round_trip() {
        let ledger = InventoryLedger::new(InMemoryEventStore::new());
        let entry = ledger.list_product(UserId::new(), desk(5)).await.unwrap();

        let after = ledger.reserve(entry.product_id, 3).await.unwrap();
        assert_eq!(after.stock_qty, 2);

        let restored = ledger.release(entry.product_id, 3).await.unwrap();
        assert_eq!(restored.stock_qty, 5);
    }

    #[tokio::test]
    async fn unknown_product_is_not_found() {
        let ledger = InventoryLedger::new(InMemoryEventStore::new());
        let err = ledger.reserve(ProductId::new(), 1).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn overselling_is_refused() {
        let ledger = InventoryLedger::new(InMemoryEventStore::new());
        let entry = ledger.list_product(UserId::new(), desk(1)).await.unwrap();
        let err = ledger.reserve(entry.product_id, 2).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InsufficientStock);
        assert_eq!(ledger.product(entry.product_id).await.unwrap().stock_qty, 1);
    }

    #[tokio::test]
    async fn concurrent_reservations_never_oversell() {
        let store = InMemoryEventStore::new();
        let ledger = std::sync::Arc::new(InventoryLedger::new(store).with_max_attempts(50));
        let entry = ledger.list_product(UserId::new(), desk(5)).await.unwrap();

        let mut handles = Vec::new();
        for _ in 0..8 {
            let ledger = ledger.clone();
            let id = entry.product_id;
            handles.push(tokio::spawn(async move { ledger.reserve(id, 1).await }));
        }

        let mut reserved = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => reserved += 1,
                Err(e) => assert_eq!(e.kind(), ErrorKind::InsufficientStock),
            }
        }

        assert_eq!(reserved, 5);
        assert_eq!(ledger.product(entry.product_id).await.unwrap().stock_qty, 0);
    }

    #[tokio::test]
    async fn hot_products_are_snapshotted() {
        let store = InMemoryEventStore::new();
        let ledger = InventoryLedger::new(store.clone());
        let entry = ledger.list_product(UserId::new(), desk(100)).await.unwrap();

        for _ in 0..55 {
            ledger.reserve(entry.product_id, 1).await.unwrap();
        }

        let snapshot = store.get_snapshot(entry.product_id.into()).await.unwrap();
        assert!(snapshot.is_some());
        assert_eq!(ledger.product(entry.product_id).await.unwrap().stock_qty, 45);
    }

    #[tokio::test]
    async fn listing_records_one_stock_expense() {
        use futures_util::StreamExt;

        use crate::payment::PaymentEvent;

        let store = InMemoryEventStore::new();
        let ledger = InventoryLedger::new(store.clone());
        let buyer = UserId::new();
        let entry = ledger.list_product(buyer, desk(5)).await.unwrap();

        let recorded: Vec<_> = store
            .stream_all_events()
            .await
            .unwrap()
            .map(|r| r.unwrap())
            .filter(|e| std::future::ready(e.event_type == "PaymentRecorded"))
            .collect()
            .await;
        assert_eq!(recorded.len(), 1);

        let PaymentEvent::PaymentRecorded(data) =
            serde_json::from_value(recorded[0].payload.clone()).unwrap()
        else {
            panic!("expected a PaymentRecorded event");
        };
        assert_eq!(data.kind, PaymentKind::Expenses);
        assert_eq!(data.channel, PaymentChannel::Cash);
        assert_eq!(data.status, PaymentStatus::Paid);
        assert_eq!(data.payer, buyer);
        assert_eq!(data.total_price, Money::from_units(35));
        assert_eq!(data.reference, Some(entry.product_id.to_string()));

        let owner = store
            .resolve_key(&keys::order_payment(&data.order_number))
            .await
            .unwrap();
        assert_eq!(owner, Some(data.payment_id.into()));
    }

    #[tokio::test]
    async fn unpriceable_opening_stock_is_refused() {
        let store = InMemoryEventStore::new();
        let ledger = InventoryLedger::new(store.clone());
        let mut listing = desk(2);
        listing.purchase_price = Money::from_minor(i64::MAX);

        let err = ledger.list_product(UserId::new(), listing).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
        let mut events = store.stream_all_events().await.unwrap();
        assert!(futures_util::StreamExt::next(&mut events).await.is_none());
    }
}
