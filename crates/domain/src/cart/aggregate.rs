use chrono::{DateTime, Utc};
use common::{AggregateId, CartId, OrderId, ProductId, UserId};
use event_store::Version;
use serde::{Deserialize, Serialize};

use crate::aggregate::Aggregate;
use crate::inventory::CatalogEntry;
use crate::money::Money;
use crate::order::OrderNumber;

use super::{
    CartConvertedData, CartError, CartEvent, CartOpenedData, LineAddedData,
    LineQuantityChangedData, LineRemovedData,
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartLine {
    pub product_id: ProductId,
    pub product_name: String,
    pub quantity: u32,
    pub unit_price: Money,
}

impl CartLine {
    pub fn subtotal(&self) -> Money {
        self.unit_price.times(self.quantity)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartTotals {
    pub quantity: u32,
    pub price: Money,
}

/// Derives the cart aggregates from its lines.
///
/// The only place totals are computed; [`Cart::apply`] calls it after
/// every line change.
pub fn recompute(lines: &[CartLine]) -> CartTotals {
    CartTotals {
        quantity: lines
            .iter()
            .fold(0u32, |acc, l| acc.saturating_add(l.quantity)),
        price: lines.iter().map(CartLine::subtotal).sum(),
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Cart {
    id: Option<CartId>,
    #[serde(default)]
    version: Version,
    owner: Option<UserId>,
    lines: Vec<CartLine>,
    totals: CartTotals,
    converted_to_order: bool,
    order_id: Option<OrderId>,
    opened_at: Option<DateTime<Utc>>,
}

impl Aggregate for Cart {
    type Event = CartEvent;
    type Error = CartError;

    fn aggregate_type() -> &'static str {
        "Cart"
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
            CartEvent::CartOpened(data) => {
                self.id = Some(data.cart_id);
                self.owner = Some(data.owner);
                self.opened_at = Some(data.opened_at);
            }
            CartEvent::LineAdded(data) => self.lines.push(CartLine {
                product_id: data.product_id,
                product_name: data.product_name,
                quantity: data.quantity,
                unit_price: data.unit_price,
            }),
            CartEvent::LineQuantityChanged(data) => {
                if let Some(line) = self.line_mut(data.product_id) {
                    line.quantity = data.quantity;
                }
            }
            CartEvent::LineRemoved(data) => {
                self.lines.retain(|l| l.product_id != data.product_id);
            }
            CartEvent::CartCleared => self.lines.clear(),
            CartEvent::CartConverted(data) => {
                self.converted_to_order = true;
                self.order_id = Some(data.order_id);
            }
        }
        self.totals = recompute(&self.lines);
    }
}

impl Cart {
    pub fn cart_id(&self) -> Option<CartId> {
        self.id
    }

    pub fn owner(&self) -> Option<UserId> {
        self.owner
    }

    pub fn lines(&self) -> &[CartLine] {
        &self.lines
    }

    pub fn line(&self, product_id: ProductId) -> Option<&CartLine> {
        self.lines.iter().find(|l| l.product_id == product_id)
    }

    pub fn totals(&self) -> CartTotals {
        self.totals
    }

    pub fn is_converted(&self) -> bool {
        self.converted_to_order
    }

    pub fn order_id(&self) -> Option<OrderId> {
        self.order_id
    }

    pub fn open(&self, cart_id: CartId, owner: UserId) -> Result<Vec<CartEvent>, CartError> {
        if self.id.is_some() {
            return Err(CartError::AlreadyOpened);
        }
        Ok(vec![CartEvent::CartOpened(CartOpenedData {
            cart_id,
            owner,
            opened_at: Utc::now(),
        })])
    }

    /// Adds `quantity` of a product, merging into an existing line.
    pub fn add_line(
        &self,
        product: &CatalogEntry,
        quantity: u32,
    ) -> Result<Vec<CartEvent>, CartError> {
        self.ensure_mutable("add items")?;
        if quantity == 0 {
            return Err(CartError::InvalidQuantity(quantity));
        }

        let event = match self.line(product.product_id) {
            Some(line) => {
                let merged = line
                    .quantity
                    .checked_add(quantity)
                    .ok_or(CartError::TooLarge)?;
                self.checked_totals_with(product.product_id, merged, line.unit_price)?;
                CartEvent::LineQuantityChanged(LineQuantityChangedData {
                    product_id: product.product_id,
                    quantity: merged,
                })
            }
            None => {
                self.checked_totals_with(product.product_id, quantity, product.price)?;
                CartEvent::LineAdded(LineAddedData {
                product_id: product.product_id,
                product_name: product.name.clone(),
                quantity,
                    unit_price: product.price,
                })
            }
        };
        Ok(vec![event])
    }

    pub fn change_quantity(
        &self,
        product_id: ProductId,
        quantity: u32,
    ) -> Result<Vec<CartEvent>, CartError> {
        self.ensure_mutable("change quantities")?;
        if quantity == 0 {
            return Err(CartError::InvalidQuantity(quantity));
        }
        let line = self
            .line(product_id)
            .ok_or(CartError::LineNotFound(product_id))?;
        if line.quantity == quantity {
            return Ok(vec![]);
        }
        self.checked_totals_with(product_id, quantity, line.unit_price)?;
        Ok(vec![CartEvent::LineQuantityChanged(
            LineQuantityChangedData {
                product_id,
                quantity,
            },
        )])
    }

    pub fn remove_line(&self, product_id: ProductId) -> Result<Vec<CartEvent>, CartError> {
        self.ensure_mutable("remove items")?;
        if self.line(product_id).is_none() {
            return Err(CartError::LineNotFound(product_id));
        }
        Ok(vec![CartEvent::LineRemoved(LineRemovedData { product_id })])
    }

    pub fn clear(&self) -> Result<Vec<CartEvent>, CartError> {
        self.ensure_mutable("clear")?;
        if self.lines.is_empty() {
            return Ok(vec![]);
        }
        Ok(vec![CartEvent::CartCleared])
    }

    /// Marks the cart as converted into `order_id`. Allowed once.
    pub fn convert(
        &self,
        order_id: OrderId,
        order_number: &OrderNumber,
    ) -> Result<Vec<CartEvent>, CartError> {
        if self.converted_to_order {
            return Err(CartError::AlreadyConverted);
        }
        if self.totals.quantity == 0 {
            return Err(CartError::Empty);
        }
        Ok(vec![CartEvent::CartConverted(CartConvertedData {
            order_id,
            order_number: order_number.to_string(),
            converted_at: Utc::now(),
        })])
    }

    fn ensure_mutable(&self, action: &'static str) -> Result<(), CartError> {
        if self.converted_to_order {
            return Err(CartError::Converted { action });
        }
        Ok(())
    }

    /// Totals the cart would have with `product_id` at `quantity`, or
    /// `TooLarge` if any sum leaves the supported range.
    fn checked_totals_with(
        &self,
        product_id: ProductId,
        quantity: u32,
        unit_price: Money,
    ) -> Result<CartTotals, CartError> {
        let mut totals = CartTotals {
            quantity,
            price: unit_price
                .checked_times(quantity)
                .ok_or(CartError::TooLarge)?,
        };
        for line in self.lines.iter().filter(|l| l.product_id != product_id) {
            totals.quantity = totals
                .quantity
                .checked_add(line.quantity)
                .ok_or(CartError::TooLarge)?;
            totals.price = line
                .unit_price
                .checked_times(line.quantity)
                .and_then(|subtotal| totals.price.checked_add(subtotal))
                .ok_or(CartError::TooLarge)?;
        }
        Ok(totals)
    }

    fn line_mut(&mut self, product_id: ProductId) -> Option<&mut CartLine> {
        self.lines.iter_mut().find(|l| l.product_id == product_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    fn entry(name: &str, price: i64) -> CatalogEntry {
        CatalogEntry {
            product_id: ProductId::new(),
            name: name.into(),
            organization_id: None,
            price: Money::from_units(price),
            purchase_price: Money::zero(),
            stock_qty: 100,
        }
    }

    fn open_cart() -> Cart {
        let mut cart = Cart::default();
        let events = cart.open(CartId::new(), UserId::new()).unwrap();
        cart.apply_events(events);
        cart
    }

    fn add(cart: &mut Cart, product: &CatalogEntry, quantity: u32) {
        let events = cart.add_line(product, quantity).unwrap();
        cart.apply_events(events);
    }

    #[test]
    fn recompute_sums_lines() {
        let a = entry("A", 10);
        let b = entry("B", 20);
        let lines = vec![
            CartLine {
                product_id: a.product_id,
                product_name: a.name.clone(),
                quantity: 2,
                unit_price: a.price,
            },
            CartLine {
                product_id: b.product_id,
                product_name: b.name.clone(),
                quantity: 1,
                unit_price: b.price,
            },
        ];
        assert_eq!(
            recompute(&lines),
            CartTotals {
                quantity: 3,
                price: Money::from_units(40)
            }
        );
        assert_eq!(recompute(&[]), CartTotals::default());
    }

    #[test]
    fn totals_follow_every_mutation() {
        let a = entry("A", 10);
        let b = entry("B", 20);
        let mut cart = open_cart();

        add(&mut cart, &a, 1);
        add(&mut cart, &a, 1);
        add(&mut cart, &b, 1);
        assert_eq!(cart.lines().len(), 2);
        assert_eq!(cart.totals().price, Money::from_units(40));

        let events = cart.change_quantity(b.product_id, 3).unwrap();
        cart.apply_events(events);
        assert_eq!(cart.totals().quantity, 5);
        assert_eq!(cart.totals().price, Money::from_units(80));

        let events = cart.remove_line(a.product_id).unwrap();
        cart.apply_events(events);
        assert_eq!(cart.totals().price, Money::from_units(60));

        let events = cart.clear().unwrap();
        cart.apply_events(events);
        assert_eq!(cart.totals(), CartTotals::default());
    }

    #[test]
    fn unit_price_is_a_snapshot() {
        let mut a = entry("A", 10);
        let mut cart = open_cart();
        add(&mut cart, &a, 1);

        a.price = Money::from_units(99);
        add(&mut cart, &a, 1);
        assert_eq!(cart.totals().price, Money::from_units(20));
    }

    #[test]
    fn converted_cart_is_immutable() {
        let a = entry("A", 10);
        let mut cart = open_cart();
        add(&mut cart, &a, 1);

        let events = cart
            .convert(OrderId::new(), &OrderNumber::generate())
            .unwrap();
        cart.apply_events(events);
        assert!(cart.is_converted());

        assert!(matches!(
            cart.add_line(&a, 1),
            Err(CartError::Converted { .. })
        ));
        assert!(matches!(
            cart.convert(OrderId::new(), &OrderNumber::generate()),
            Err(CartError::AlreadyConverted)
        ));
    }

    #[test]
    fn empty_cart_cannot_convert() {
        let cart = open_cart();
        assert!(matches!(
            cart.convert(OrderId::new(), &OrderNumber::generate()),
            Err(CartError::Empty)
        ));
    }

    #[test]
    fn unknown_line_and_zero_quantity() {
        let cart = open_cart();
        assert!(matches!(
            cart.remove_line(ProductId::new()),
            Err(CartError::LineNotFound(_))
        ));
        assert!(matches!(
            cart.add_line(&entry("A", 1), 0),
            Err(CartError::InvalidQuantity(0))
        ));
    }

    #[test]
    fn oversized_quantities_and_totals_are_rejected() {
        let a = entry("A", 1);
        let mut cart = open_cart();
        add(&mut cart, &a, u32::MAX);
        assert!(matches!(cart.add_line(&a, 1), Err(CartError::TooLarge)));
        assert!(matches!(
            cart.add_line(&entry("B", 1), 1),
            Err(CartError::TooLarge)
        ));
        assert_eq!(cart.totals().quantity, u32::MAX);

        let mut pricey = entry("C", 0);
        pricey.price = Money::from_minor(i64::MAX);
        let cart = open_cart();
        let err = cart.add_line(&pricey, 2).unwrap_err();
        assert!(matches!(err, CartError::TooLarge));
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
    }

    #[test]
    fn quantity_change_checks_the_new_total() {
        let mut pricey = entry("C", 0);
        pricey.price = Money::from_minor(i64::MAX / 2);
        let mut cart = open_cart();
        add(&mut cart, &pricey, 1);
        assert!(matches!(
            cart.change_quantity(pricey.product_id, 3),
            Err(CartError::TooLarge)
        ));
        assert!(cart.change_quantity(pricey.product_id, 2).is_ok());
    }
}
