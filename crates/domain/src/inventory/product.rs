use chrono::Utc;
use common::{AggregateId, OrganizationId, ProductId};
use event_store::Version;
use serde::{Deserialize, Serialize};

use crate::aggregate::{Aggregate, SnapshotCapable};
use crate::money::Money;

use super::{InventoryError, ProductEvent, ProductListedData, StockMovementData};

/// Catalog intake for a new product.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListProduct {
    pub name: String,
    pub organization_id: Option<OrganizationId>,
    pub price: Money,
    pub purchase_price: Money,
    pub stock_qty: u32,
}

/// What the catalog exposes about a product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogEntry {
    pub product_id: ProductId,
    pub name: String,
    pub organization_id: Option<OrganizationId>,
    pub price: Money,
    pub purchase_price: Money,
    pub stock_qty: u32,
}

/// A catalog product and its stock ledger.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Product {
    id: Option<ProductId>,
    #[serde(default)]
    version: Version,
    name: String,
    organization_id: Option<OrganizationId>,
    price: Money,
    purchase_price: Money,
    stock_qty: u32,
}

impl Aggregate for Product {
    type Event = ProductEvent;
    type Error = InventoryError;

    fn aggregate_type() -> &'static str {
        "Product"
    }

    fn id(&self) -> Option<AggregateId> {
        self.id.map(Into::into)
    }

    fn version(&self) -> Version {
        self.version
    }

    fn set_version(&mut self, version: Version) {
        self.version = version;
    }

    fn apply(&mut self, event: Self::Event) {
        match event {
            ProductEvent::ProductListed(data) => {
                self.id = Some(data.product_id);
                self.name = data.name;
                self.organization_id = data.organization_id;
                self.price = data.price;
                self.purchase_price = data.purchase_price;
                self.stock_qty = data.stock_qty;
            }
            ProductEvent::StockReserved(data) | ProductEvent::StockReleased(data) => {
                self.stock_qty = data.remaining;
            }
        }
    }
}

/// Every order touches its products, so their streams grow fastest.
impl SnapshotCapable for Product {
    fn snapshot_interval() -> i64 {
        50
    }
}

impl Product {
    pub fn product_id(&self) -> Option<ProductId> {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn price(&self) -> Money {
        self.price
    }

    pub fn stock_qty(&self) -> u32 {
        self.stock_qty
    }

    pub fn catalog_entry(&self) -> Option<CatalogEntry> {
        Some(CatalogEntry {
            product_id: self.id?,
            name: self.name.clone(),
            organization_id: self.organization_id.clone(),
            price: self.price,
            purchase_price: self.purchase_price,
            stock_qty: self.stock_qty,
        })
    }

    pub fn list(
        &self,
        product_id: ProductId,
        input: ListProduct,
    ) -> Result<Vec<ProductEvent>, InventoryError> {
        if self.id.is_some() {
            return Err(InventoryError::AlreadyListed(product_id));
        }
        for price in [input.price, input.purchase_price] {
            if price.is_negative() {
                return Err(InventoryError::InvalidPrice(price));
            }
        }

        Ok(vec![ProductEvent::ProductListed(ProductListedData {
            product_id,
            name: input.name,
            organization_id: input.organization_id,
            price: input.price,
            purchase_price: input.purchase_price,
            stock_qty: input.stock_qty,
            listed_at: Utc::now(),
        })])
    }

    /// Decrements stock by `quantity`, refusing to go below zero.
    pub fn reserve(
        &self,
        quantity: u32,
        reference: Option<String>,
    ) -> Result<Vec<ProductEvent>, InventoryError> {
        let product_id = self.ensure_listed()?;
        if quantity == 0 {
            return Err(InventoryError::InvalidQuantity(quantity));
        }
        let Some(remaining) = self.stock_qty.checked_sub(quantity) else {
            return Err(InventoryError::InsufficientStock {
                product_id,
                product_name: self.name.clone(),
                requested: quantity,
                available: self.stock_qty,
            });
        };

        Ok(vec![ProductEvent::StockReserved(StockMovementData {
            quantity,
            reference,
            remaining,
            at: Utc::now(),
        })])
    }

    pub fn release(
        &self,
        quantity: u32,
        reference: Option<String>,
    ) -> Result<Vec<ProductEvent>, InventoryError> {
        self.ensure_listed()?;
        if quantity == 0 {
            return Err(InventoryError::InvalidQuantity(quantity));
        }

        Ok(vec![ProductEvent::StockReleased(StockMovementData {
            quantity,
            reference,
            remaining: self.stock_qty.saturating_add(quantity),
            at: Utc::now(),
        })])
    }

    fn ensure_listed(&self) -> Result<ProductId, InventoryError> {
        self.id.ok_or(InventoryError::NotListed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn listed(stock: u32) -> Product {
        let mut product = Product::default();
        let events = product
            .list(
                ProductId::new(),
                ListProduct {
                    name: "Desk".into(),
                    organization_id: Some(OrganizationId::new("org-a")),
                    price: Money::from_units(10),
                    purchase_price: Money::from_units(7),
                    stock_qty: stock,
                },
            )
            .unwrap();
        product.apply_events(events);
        product
    }

    #[test]
    fn reserve_decrements_stock() {
        let mut product = listed(5);
        let events = product.reserve(2, Some("OR1".into())).unwrap();
        product.apply_events(events);
        assert_eq!(product.stock_qty(), 3);
    }

    #[test]
    fn reserve_cannot_go_below_zero() {
        let product = listed(1);
        match product.reserve(2, None) {
            Err(InventoryError::InsufficientStock {
                requested,
                available,
                product_name,
                ..
            }) => {
                assert_eq!((requested, available), (2, 1));
                assert_eq!(product_name, "Desk");
            }
            other => panic!("expected insufficient stock, got {other:?}"),
        }
    }

    #[test]
    fn reserve_exactly_the_remaining_stock() {
        let mut product = listed(2);
        let events = product.reserve(2, None).unwrap();
        product.apply_events(events);
        assert_eq!(product.stock_qty(), 0);
    }

    #[test]
    fn release_restocks() {
        let mut product = listed(0);
        let events = product.release(4, None).unwrap();
        product.apply_events(events);
        assert_eq!(product.stock_qty(), 4);
    }

    #[test]
    fn zero_quantities_are_invalid() {
        let product = listed(3);
        assert!(matches!(
            product.reserve(0, None),
            Err(InventoryError::InvalidQuantity(0))
        ));
        assert!(product.release(0, None).is_err());
    }

    #[test]
    fn cannot_list_twice() {
        let product = listed(3);
        let again = product.list(
            ProductId::new(),
            ListProduct {
                name: "Desk".into(),
                organization_id: None,
                price: Money::from_units(1),
                purchase_price: Money::zero(),
                stock_qty: 1,
            },
        );
        assert!(matches!(again, Err(InventoryError::AlreadyListed(_))));
    }

    #[test]
    fn unlisted_product_cannot_move_stock() {
        let product = Product::default();
        assert!(matches!(
            product.reserve(1, None),
            Err(InventoryError::NotListed)
        ));
    }
}
