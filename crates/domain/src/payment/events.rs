use chrono::{DateTime, Utc};
use common::{OperatorId, PaymentId, UserId};
use serde::{Deserialize, Serialize};

use crate::aggregate::DomainEvent;
use crate::money::Money;
use crate::order::OrderNumber;

use super::{PaymentChannel, PaymentKind, PaymentStatus, PaymentWallet};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum PaymentEvent {
    PaymentRecorded(PaymentRecordedData),
    OperatorRecorded(OperatorRecordedData),
    PaymentStatusChanged(PaymentStatusChangedData),
}

impl DomainEvent for PaymentEvent {
    fn event_type(&self) -> &'static str {
        match self {
            PaymentEvent::PaymentRecorded(_) => "PaymentRecorded",
            PaymentEvent::OperatorRecorded(_) => "OperatorRecorded",
            PaymentEvent::PaymentStatusChanged(_) => "PaymentStatusChanged",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentRecordedData {
    pub payment_id: PaymentId,
    pub order_number: OrderNumber,
    pub payer: UserId,
    pub status: PaymentStatus,
    pub channel: PaymentChannel,
    pub wallet: Option<PaymentWallet>,
    pub kind: PaymentKind,
    pub reference: Option<String>,
    pub proof: Option<String>,
    pub total_price: Money,
    pub recorded_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OperatorRecordedData {
    pub operator: OperatorId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentStatusChangedData {
    pub from: PaymentStatus,
    pub to: PaymentStatus,
    pub changed_at: DateTime<Utc>,
}
