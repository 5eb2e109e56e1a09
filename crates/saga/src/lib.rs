//! Order fulfillment saga.
//!
//! Creating an order converts the requester's cart, places the order,
//! reserves stock for every line, records the payment and enqueues two
//! notifications, all in one atomic commit. Status updates keep the
//! payment in step and release stock when an order is cancelled.

pub mod coordinator;
pub mod order_fulfillment;

pub use coordinator::OrderFulfillmentSaga;
pub use order_fulfillment::{OrderDetails, PaymentIntent, PlaceOrderRequest};
