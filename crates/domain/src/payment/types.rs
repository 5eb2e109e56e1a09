use serde::{Deserialize, Serialize};

use crate::order::OrderStatus;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum PaymentStatus {
    Paid,
    #[default]
    Deposit,
    Refunded,
    Cancelled,
}

impl PaymentStatus {
    /// Payment status implied by an order entering `status`, if any.
    ///
    /// Only cancellation and delivery move the payment; every other order
    /// status leaves it as it is.
    pub fn implied_by(status: OrderStatus) -> Option<PaymentStatus> {
        match status {
            OrderStatus::Cancelled => Some(PaymentStatus::Cancelled),
            OrderStatus::Delivered => Some(PaymentStatus::Paid),
            _ => None,
        }
    }

    /// Refunded and cancelled payments are final.
    pub fn is_terminal(&self) -> bool {
        matches!(self, PaymentStatus::Refunded | PaymentStatus::Cancelled)
    }

    /// Deposits may settle, be refunded or be cancelled; a paid record
    /// may only be refunded or cancelled.
    pub fn can_transition_to(&self, next: PaymentStatus) -> bool {
        match self {
            PaymentStatus::Deposit => next != PaymentStatus::Deposit,
            PaymentStatus::Paid => {
                matches!(next, PaymentStatus::Refunded | PaymentStatus::Cancelled)
            }
            PaymentStatus::Refunded | PaymentStatus::Cancelled => false,
        }
    }
}

impl std::fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        std::fmt::Debug::fmt(self, f)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum PaymentChannel {
    #[default]
    Cash,
    Online,
}

/// Mobile wallet used for an online payment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PaymentWallet {
    InstaPay,
    Vodafone,
}

/// Direction of money. Orders record revenues; stock purchases record
/// expenses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum PaymentKind {
    #[default]
    Revenues,
    Expenses,
}
