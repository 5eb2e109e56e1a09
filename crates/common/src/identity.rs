use serde::{Deserialize, Serialize};

use crate::UserId;

/// Organization owning products and inquiry replies.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OrganizationId(String);

impl OrganizationId {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for OrganizationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Operator identity recorded on payment audit trails.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OperatorId(String);

impl OperatorId {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for OperatorId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Role-class of a caller. Notifications may target a whole role-class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    User,
    Operation,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::User => "user",
            Role::Operation => "operation",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownRole(pub String);

impl std::fmt::Display for UnknownRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "unknown role: {}", self.0)
    }
}

impl std::error::Error for UnknownRole {}

impl std::str::FromStr for Role {
    type Err = UnknownRole;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "admin" => Ok(Role::Admin),
            "user" => Ok(Role::User),
            "operation" => Ok(Role::Operation),
            other => Err(UnknownRole(other.to_string())),
        }
    }
}

/// Contact details carried by the authenticated user.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallerProfile {
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone_number: Option<String>,
}

/// An already-authenticated caller handed to every core operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Caller {
    pub user_id: UserId,
    pub role: Role,
    pub organization_id: Option<OrganizationId>,
    pub operator_id: Option<OperatorId>,
    #[serde(default)]
    pub profile: CallerProfile,
}

impl Caller {
    pub fn new(user_id: UserId, role: Role) -> Self {
        Self {
            user_id,
            role,
            organization_id: None,
            operator_id: None,
            profile: CallerProfile::default(),
        }
    }

    /// Shorthand for a requester-class caller.
    pub fn user(user_id: UserId) -> Self {
        Self::new(user_id, Role::User)
    }

    pub fn with_organization(mut self, organization_id: OrganizationId) -> Self {
        self.organization_id = Some(organization_id);
        self
    }

    pub fn with_operator(mut self, operator_id: OperatorId) -> Self {
        self.operator_id = Some(operator_id);
        self
    }

    pub fn with_profile(mut self, profile: CallerProfile) -> Self {
        self.profile = profile;
        self
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    /// Identity written to audit trails. Falls back to the user id when the
    /// caller carries no operator id.
    pub fn operator(&self) -> OperatorId {
        self.operator_id
            .clone()
            .unwrap_or_else(|| OperatorId::new(self.user_id.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_parses_case_insensitively() {
        assert_eq!("Operation".parse::<Role>().unwrap(), Role::Operation);
        assert_eq!("admin".parse::<Role>().unwrap(), Role::Admin);
        assert!("guest".parse::<Role>().is_err());
    }

    #[test]
    fn operator_falls_back_to_user_id() {
        let user_id = UserId::new();
        let caller = Caller::new(user_id, Role::Admin);
        assert_eq!(caller.operator().as_str(), user_id.to_string());

        let caller = caller.with_operator(OperatorId::new("op-7"));
        assert_eq!(caller.operator().as_str(), "op-7");
    }
}
