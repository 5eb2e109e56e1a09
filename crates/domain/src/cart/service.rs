use common::{CartId, Caller, ProductId, UserId};
use event_store::{EventStore, EventStoreError};

use crate::aggregate::Aggregate;
use crate::error::DomainError;
use crate::inventory::Product;
use crate::keys;
use crate::transaction::{DEFAULT_MAX_ATTEMPTS, Transaction, load_aggregate, retry_on_conflict};

use super::{Cart, CartEvent};

/// Requester-facing cart operations.
pub struct CartService<S: EventStore> {
    store: S,
    max_attempts: u32,
}

impl<S: EventStore> CartService<S> {
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

    /// The caller's open cart, if any.
    pub async fn active_cart(&self, caller: &Caller) -> Result<Option<Cart>, DomainError> {
        let Some(cart_id) = self
            .store
            .resolve_key(&keys::active_cart(caller.user_id))
            .await?
        else {
            return Ok(None);
        };
        let cart: Cart = load_aggregate(&self.store, cart_id).await?;
        Ok((cart.exists() && !cart.is_converted()).then_some(cart))
    }

    /// Adds an item, opening the caller's cart first if needed.
    #[tracing::instrument(skip(self, caller), fields(user_id = %caller.user_id))]
    pub async fn add_item(
        &self,
        caller: &Caller,
        product_id: ProductId,
        quantity: u32,
    ) -> Result<Cart, DomainError> {
        let cart_id = self.ensure_open_cart(caller.user_id).await?;
        self.mutate(
            caller,
            cart_id,
            Some(product_id),
            "cart_add_item",
            move |product, cart| {
                let entry = product
                    .and_then(Product::catalog_entry)
                    .ok_or_else(|| DomainError::not_found("Product", product_id))?;
                Ok(cart.add_line(&entry, quantity)?)
            },
        )
        .await
    }

    #[tracing::instrument(skip(self, caller), fields(user_id = %caller.user_id))]
    pub async fn change_quantity(
        &self,
        caller: &Caller,
        product_id: ProductId,
        quantity: u32,
    ) -> Result<Cart, DomainError> {
        let cart_id = self.require_open_cart(caller.user_id).await?;
        self.mutate(caller, cart_id, None, "cart_change_quantity", move |_, cart| {
            Ok(cart.change_quantity(product_id, quantity)?)
        })
        .await
    }

    #[tracing::instrument(skip(self, caller), fields(user_id = %caller.user_id))]
    pub async fn remove_item(
        &self,
        caller: &Caller,
        product_id: ProductId,
    ) -> Result<Cart, DomainError> {
        let cart_id = self.require_open_cart(caller.user_id).await?;
        self.mutate(caller, cart_id, None, "cart_remove_item", move |_, cart| {
            Ok(cart.remove_line(product_id)?)
        })
        .await
    }

    #[tracing::instrument(skip(self, caller), fields(user_id = %caller.user_id))]
    pub async fn clear(&self, caller: &Caller) -> Result<Cart, DomainError> {
        let cart_id = self.require_open_cart(caller.user_id).await?;
        self.mutate(caller, cart_id, None, "cart_clear", |_, cart| Ok(cart.clear()?))
            .await
    }

    /// Loads the cart (and optionally a product) in a fresh transaction,
    /// stages what `command` decides, and commits; retried on conflicts.
    async fn mutate<F>(
        &self,
        caller: &Caller,
        cart_id: CartId,
        product_id: Option<ProductId>,
        operation: &'static str,
        command: F,
    ) -> Result<Cart, DomainError>
    where
        F: Fn(Option<&Product>, &Cart) -> Result<Vec<CartEvent>, DomainError>,
    {
        let store = &self.store;
        let command = &command;
        let user_id = caller.user_id;
        retry_on_conflict(operation, self.max_attempts, move || async move {
            let mut tx = Transaction::begin(store).on_behalf_of(user_id);
            let mut cart: Cart = tx.load_existing(cart_id.into(), "Cart").await?;
            let product = match product_id {
                Some(id) => Some(tx.load_existing::<Product>(id.into(), "Product").await?),
                None => None,
            };

            let events = command(product.as_ref(), &cart)?;
            tx.stage(&mut cart, events)?;
            tx.commit().await?;
            Ok(cart)
        })
        .await
    }

    async fn require_open_cart(&self, user_id: UserId) -> Result<CartId, DomainError> {
        self.store
            .resolve_key(&keys::active_cart(user_id))
            .await?
            .map(CartId::from)
            .ok_or_else(|| DomainError::not_found("Cart", user_id))
    }

    /// Opens a cart for `user_id` unless one is already open.
    async fn ensure_open_cart(&self, user_id: UserId) -> Result<CartId, DomainError> {
        if let Some(cart_id) = self.store.resolve_key(&keys::active_cart(user_id)).await? {
            return Ok(cart_id.into());
        }

        let cart_id = CartId::new();
        let mut tx = Transaction::begin(&self.store).on_behalf_of(user_id);
        let mut cart = Cart::default();
        let events = cart.open(cart_id, user_id)?;
        tx.stage(&mut cart, events)?;
        tx.claim(keys::active_cart(user_id), cart_id);

        match tx.commit().await {
            Ok(_) => {
                tracing::info!(%cart_id, %user_id, "cart opened");
                Ok(cart_id)
            }
            // Another request opened the cart first.
            Err(DomainError::EventStore(EventStoreError::UniqueViolation { .. })) => {
                self.require_open_cart(user_id).await
            }
            Err(e) => Err(e),
        }
    }
}
