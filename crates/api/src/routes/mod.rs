pub mod carts;
pub mod catalog;
pub mod health;
pub mod inquiries;
pub mod metrics;
pub mod notifications;
pub mod orders;

use std::str::FromStr;

use common::{Caller, Role};
use domain::DomainError;

use crate::error::ApiError;

/// Parses an id taken from the path.
pub(crate) fn parse_id<T: FromStr>(entity: &str, raw: &str) -> Result<T, ApiError> {
    raw.parse()
        .map_err(|_| ApiError::BadRequest(format!("Invalid {entity} id: {raw:?}")))
}

pub(crate) fn require_staff(caller: &Caller, action: &str) -> Result<(), ApiError> {
    if matches!(caller.role, Role::Operation | Role::Admin) {
        return Ok(());
    }
    Err(DomainError::Forbidden(format!("only operations or admins may {action}")).into())
}
