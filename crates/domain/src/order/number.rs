use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::OrderError;

const MAX_LEN: usize = 64;

/// Human-readable order identifier, e.g. `OR9F86D081884C7D65`.
///
/// Generated once at creation and never reused; the `order_number` unique
/// key enforces this across orders. Deserialization goes through
/// [`OrderNumber::parse`].
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct OrderNumber(String);

impl OrderNumber {
    /// `OR` followed by 16 uppercase hex characters of a random UUID.
    pub fn generate() -> Self {
        let hex = Uuid::new_v4().simple().to_string().to_uppercase();
        Self(format!("OR{}", &hex[..16]))
    }

    /// Accepts an externally supplied identifier.
    pub fn parse(value: &str) -> Result<Self, OrderError> {
        let value = value.trim();
        let valid = !value.is_empty()
            && value.len() <= MAX_LEN
            && value
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        if !valid {
            return Err(OrderError::InvalidNumber(value.to_string()));
        }
        Ok(Self(value.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for OrderNumber {
    type Error = OrderError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<OrderNumber> for String {
    fn from(number: OrderNumber) -> Self {
        number.0
    }
}

impl std::fmt::Display for OrderNumber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}
