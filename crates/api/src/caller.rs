//! Caller identity taken from headers set by the authenticating gateway.

use axum::extract::FromRequestParts;
use axum::http::HeaderMap;
use axum::http::request::Parts;
use common::{Caller, CallerProfile, OperatorId, OrganizationId, Role, UserId};

use crate::error::ApiError;

pub const USER_ID: &str = "x-user-id";
pub const USER_ROLE: &str = "x-user-role";
pub const ORGANIZATION_ID: &str = "x-organization-id";
pub const OPERATION_ID: &str = "x-operation-id";
pub const USER_NAME: &str = "x-user-name";
pub const USER_EMAIL: &str = "x-user-email";
pub const USER_PHONE: &str = "x-user-phone";

/// The already-authenticated caller of a request.
///
/// `x-user-id` is required; `x-user-role` defaults to `user`.
#[derive(Debug, Clone)]
pub struct AuthenticatedCaller(pub Caller);

impl<S> FromRequestParts<S> for AuthenticatedCaller
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        caller_from_headers(&parts.headers).map(AuthenticatedCaller)
    }
}

pub fn caller_from_headers(headers: &HeaderMap) -> Result<Caller, ApiError> {
    let user_id: UserId = header(headers, USER_ID)
        .ok_or_else(|| ApiError::Unauthenticated(format!("missing {USER_ID} header")))?
        .parse()
        .map_err(|_| ApiError::Unauthenticated(format!("malformed {USER_ID} header")))?;
    let role = match header(headers, USER_ROLE) {
        Some(role) => role
            .parse::<Role>()
            .map_err(|e| ApiError::Unauthenticated(e.to_string()))?,
        None => Role::User,
    };

    let mut caller = Caller::new(user_id, role).with_profile(CallerProfile {
        name: header(headers, USER_NAME),
        email: header(headers, USER_EMAIL),
        phone_number: header(headers, USER_PHONE),
    });
    if let Some(org) = header(headers, ORGANIZATION_ID) {
        caller = caller.with_organization(OrganizationId::new(org));
    }
    if let Some(op) = header(headers, OPERATION_ID) {
        caller = caller.with_operator(OperatorId::new(op));
    }
    Ok(caller)
}

fn header(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}
