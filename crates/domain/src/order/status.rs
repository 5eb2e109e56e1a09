use serde::{Deserialize, Serialize};

/// Lifecycle of an order.
///
/// ```text
/// UnderReview ──► Processing ──► Shipped ──► Delivered
///      │              │             │
///      └──────────────┴─────────────┴──────► Cancelled
/// ```
///
/// Forward moves may skip steps. `Delivered` and `Cancelled` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum OrderStatus {
    #[default]
    UnderReview,
    Processing,
    Shipped,
    Delivered,
    Cancelled,
}

impl OrderStatus {
    pub const ALL: [OrderStatus; 5] = [
        OrderStatus::UnderReview,
        OrderStatus::Processing,
        OrderStatus::Shipped,
        OrderStatus::Delivered,
        OrderStatus::Cancelled,
    ];

    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::Delivered | OrderStatus::Cancelled)
    }

    /// The transition table.
    pub fn can_transition_to(&self, next: OrderStatus) -> bool {
        if self.is_terminal() {
            return false;
        }
        match next {
            OrderStatus::Cancelled => true,
            _ => next.rank() > self.rank(),
        }
    }

    fn rank(&self) -> u8 {
        match self {
            OrderStatus::UnderReview => 0,
            OrderStatus::Processing => 1,
            OrderStatus::Shipped => 2,
            OrderStatus::Delivered => 3,
            OrderStatus::Cancelled => u8::MAX,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::UnderReview => "UnderReview",
            OrderStatus::Processing => "Processing",
            OrderStatus::Shipped => "Shipped",
            OrderStatus::Delivered => "Delivered",
            OrderStatus::Cancelled => "Cancelled",
        }
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for OrderStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        OrderStatus::ALL
            .into_iter()
            .find(|status| status.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("unknown order status: {s}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn forward_moves_are_allowed() {
        use OrderStatus::*;
        assert!(UnderReview.can_transition_to(Processing));
        assert!(Processing.can_transition_to(Shipped));
        assert!(Shipped.can_transition_to(Delivered));
        assert!(UnderReview.can_transition_to(Delivered));
    }

    #[test]
    fn backward_and_self_moves_are_refused() {
        use OrderStatus::*;
        assert!(!Shipped.can_transition_to(Processing));
        assert!(!Processing.can_transition_to(Processing));
        assert!(!Processing.can_transition_to(UnderReview));
    }

    #[test]
    fn cancel_from_any_non_terminal_status() {
        use OrderStatus::*;
        for status in [UnderReview, Processing, Shipped] {
            assert!(status.can_transition_to(Cancelled));
        }
        assert!(!Delivered.can_transition_to(Cancelled));
        assert!(!Cancelled.can_transition_to(Cancelled));
    }

    #[test]
    fn terminal_statuses_have_no_exits() {
        for next in OrderStatus::ALL {
            assert!(!OrderStatus::Delivered.can_transition_to(next));
            assert!(!OrderStatus::Cancelled.can_transition_to(next));
        }
    }

    #[test]
    fn parses_case_insensitively() {
        assert_eq!("cancelled".parse::<OrderStatus>(), Ok(OrderStatus::Cancelled));
        assert!("lost".parse::<OrderStatus>().is_err());
    }
}
