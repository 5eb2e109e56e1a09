//! Unique-key namespaces claimed through the event store.

use common::{CartId, UserId};
use event_store::UniqueKey;

use crate::order::OrderNumber;

/// The open (non-converted) cart of a requester.
pub fn active_cart(user_id: UserId) -> UniqueKey {
    UniqueKey::new("active_cart", user_id)
}

/// The order created from a cart. Claimed once, never released.
pub fn cart_order(cart_id: CartId) -> UniqueKey {
    UniqueKey::new("cart_order", cart_id)
}

pub fn order_number(number: &OrderNumber) -> UniqueKey {
    UniqueKey::new("order_number", number)
}

/// The payment record of an order, addressed by order number.
pub fn order_payment(number: &OrderNumber) -> UniqueKey {
    UniqueKey::new("payment_order", number)
}
