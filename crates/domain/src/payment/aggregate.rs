use chrono::{DateTime, Utc};
use common::{AggregateId, OperatorId, PaymentId, UserId};
use event_store::Version;
use serde::{Deserialize, Serialize};

use crate::aggregate::Aggregate;
use crate::money::Money;
use crate::order::OrderNumber;

use super::{
    OperatorRecordedData, PaymentChannel, PaymentError, PaymentEvent, PaymentKind,
    PaymentRecordedData, PaymentStatus, PaymentStatusChangedData, PaymentWallet,
};

#[derive(Debug, Clone)]
pub struct RecordPayment {
    pub payment_id: PaymentId,
    pub order_number: OrderNumber,
    pub payer: UserId,
    pub status: PaymentStatus,
    pub channel: PaymentChannel,
    pub wallet: Option<PaymentWallet>,
    pub kind: PaymentKind,
    pub reference: Option<String>,
    /// Media reference of the proof-of-payment attachment.
    pub proof: Option<String>,
    pub total_price: Money,
}

/// Payment of one order, addressed by its order number.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PaymentRecord {
    id: Option<PaymentId>,
    #[serde(default)]
    version: Version,
    order_number: Option<OrderNumber>,
    payer: Option<UserId>,
    status: PaymentStatus,
    channel: PaymentChannel,
    wallet: Option<PaymentWallet>,
    kind: PaymentKind,
    reference: Option<String>,
    proof: Option<String>,
    total_price: Money,
    /// Append-only audit trail of operators that handled this payment.
    operators: Vec<OperatorId>,
    recorded_at: Option<DateTime<Utc>>,
}

impl Aggregate for PaymentRecord {
    type Event = PaymentEvent;
    type Error = PaymentError;

    fn aggregate_type() -> &'static str {
        "Payment"
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
            PaymentEvent::PaymentRecorded(data) => {
                self.id = Some(data.payment_id);
                self.order_number = Some(data.order_number);
                self.payer = Some(data.payer);
                self.status = data.status;
                self.channel = data.channel;
                self.wallet = data.wallet;
                self.kind = data.kind;
                self.reference = data.reference;
                self.proof = data.proof;
                self.total_price = data.total_price;
                self.recorded_at = Some(data.recorded_at);
            }
            PaymentEvent::OperatorRecorded(data) => self.operators.push(data.operator),
            PaymentEvent::PaymentStatusChanged(data) => self.status = data.to,
        }
    }
}

impl PaymentRecord {
    pub fn payment_id(&self) -> Option<PaymentId> {
        self.id
    }

    pub fn order_number(&self) -> Option<&OrderNumber> {
        self.order_number.as_ref()
    }

    pub fn payer(&self) -> Option<UserId> {
        self.payer
    }

    pub fn status(&self) -> PaymentStatus {
        self.status
    }

    pub fn channel(&self) -> PaymentChannel {
        self.channel
    }

    pub fn wallet(&self) -> Option<PaymentWallet> {
        self.wallet
    }

    pub fn kind(&self) -> PaymentKind {
        self.kind
    }

    pub fn reference(&self) -> Option<&str> {
        self.reference.as_deref()
    }

    pub fn proof(&self) -> Option<&str> {
        self.proof.as_deref()
    }

    pub fn total_price(&self) -> Money {
        self.total_price
    }

    pub fn operators(&self) -> &[OperatorId] {
        &self.operators
    }

    pub fn record(&self, input: RecordPayment) -> Result<Vec<PaymentEvent>, PaymentError> {
        if self.id.is_some() {
            return Err(PaymentError::AlreadyRecorded);
        }
        if input.total_price.is_negative() {
            return Err(PaymentError::NegativeTotal);
        }

        Ok(vec![PaymentEvent::PaymentRecorded(PaymentRecordedData {
            payment_id: input.payment_id,
            order_number: input.order_number,
            payer: input.payer,
            status: input.status,
            channel: input.channel,
            wallet: input.wallet,
            kind: input.kind,
            reference: input.reference,
            proof: input.proof,
            total_price: input.total_price,
            recorded_at: Utc::now(),
        })])
    }

    /// Adds `operator` to the audit trail unless already present.
    pub fn touch(&self, operator: &OperatorId) -> Result<Vec<PaymentEvent>, PaymentError> {
        self.ensure_recorded()?;
        if self.operators.contains(operator) {
            return Ok(vec![]);
        }
        Ok(vec![PaymentEvent::OperatorRecorded(OperatorRecordedData {
            operator: operator.clone(),
        })])
    }

    /// Moves the payment to `to`. Repeating the current status is a no-op;
    /// moves outside [`PaymentStatus::can_transition_to`] are refused.
    pub fn set_status(&self, to: PaymentStatus) -> Result<Vec<PaymentEvent>, PaymentError> {
        self.ensure_recorded()?;
        if self.status == to {
            return Ok(vec![]);
        }
        if !self.status.can_transition_to(to) {
            return Err(PaymentError::InvalidTransition {
                from: self.status,
                to,
            });
        }
        Ok(vec![PaymentEvent::PaymentStatusChanged(
            PaymentStatusChangedData {
                from: self.status,
                to,
                changed_at: Utc::now(),
            },
        )])
    }

    fn ensure_recorded(&self) -> Result<(), PaymentError> {
        match self.id {
            Some(_) => Ok(()),
            None => Err(PaymentError::NotRecorded),
        }
    }
}
