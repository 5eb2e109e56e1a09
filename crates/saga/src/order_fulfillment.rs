//! Inputs, outputs and step names of the order fulfillment saga.

use chrono::{DateTime, Utc};
use domain::Money;
use domain::cart::CartLine;
use domain::order::{Order, OrderNumber, ShippingAddress};
use domain::payment::{PaymentChannel, PaymentRecord, PaymentStatus, PaymentWallet};
use serde::{Deserialize, Serialize};

pub const SAGA_TYPE: &str = "OrderFulfillment";

pub const STEP_CONVERT_CART: &str = "convert_cart";
pub const STEP_PLACE_ORDER: &str = "place_order";
pub const STEP_RESERVE_INVENTORY: &str = "reserve_inventory";
pub const STEP_RECORD_PAYMENT: &str = "record_payment";
pub const STEP_NOTIFY: &str = "notify";

/// Compensation applied when an order is cancelled.
pub const STEP_RELEASE_INVENTORY: &str = "release_inventory";

/// How the requester intends to pay.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PaymentIntent {
    #[serde(default)]
    pub channel: PaymentChannel,
    pub wallet: Option<PaymentWallet>,
    /// Defaults to `Deposit`.
    pub status: Option<PaymentStatus>,
    /// External payment reference, e.g. a wallet transaction number.
    pub reference: Option<String>,
    /// Externally supplied order identifier; generated when absent.
    pub order_number: Option<OrderNumber>,
    /// The single proof-of-payment attachment, already uploaded.
    pub proof: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlaceOrderRequest {
    pub address: ShippingAddress,
    #[serde(default)]
    pub delivery_price: Money,
    pub delivery_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub payment: PaymentIntent,
}

/// An order together with its payment record and the converted cart lines.
#[derive(Debug, Clone)]
pub struct OrderDetails {
    pub order: Order,
    pub payment: PaymentRecord,
    pub lines: Vec<CartLine>,
}
