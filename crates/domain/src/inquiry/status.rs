use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum InquiryStatus {
    #[default]
    Active,
    Accepted,
    Ended,
}

impl InquiryStatus {
    /// `active -> accepted -> ended`, plus `accepted -> active` on
    /// rejection. Nothing leaves `ended`.
    pub fn can_transition_to(self, to: InquiryStatus) -> bool {
        matches!(
            (self, to),
            (InquiryStatus::Active, InquiryStatus::Accepted)
                | (InquiryStatus::Accepted, InquiryStatus::Active)
                | (InquiryStatus::Accepted, InquiryStatus::Ended)
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            InquiryStatus::Active => "active",
            InquiryStatus::Accepted => "accepted",
            InquiryStatus::Ended => "ended",
        }
    }
}

impl std::fmt::Display for InquiryStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ReplyStatus {
    #[default]
    Pending,
    Accepted,
    Rejected,
}

impl std::fmt::Display for ReplyStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            ReplyStatus::Pending => "pending",
            ReplyStatus::Accepted => "accepted",
            ReplyStatus::Rejected => "rejected",
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ended_is_terminal() {
        for to in [
            InquiryStatus::Active,
            InquiryStatus::Accepted,
            InquiryStatus::Ended,
        ] {
            assert!(!InquiryStatus::Ended.can_transition_to(to));
        }
    }

    #[test]
    fn active_cannot_skip_to_ended() {
        assert!(!InquiryStatus::Active.can_transition_to(InquiryStatus::Ended));
        assert!(InquiryStatus::Accepted.can_transition_to(InquiryStatus::Active));
    }
}
