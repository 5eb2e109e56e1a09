use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::AggregateId;

/// Declares a UUID-backed identifier that converts to and from [`AggregateId`].
macro_rules! uuid_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(Uuid);

        impl $name {
            /// Creates a new random identifier.
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            pub fn from_uuid(uuid: Uuid) -> Self {
                Self(uuid)
            }

            pub fn as_uuid(&self) -> Uuid {
                self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl std::str::FromStr for $name {
            type Err = uuid::Error;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Uuid::parse_str(s).map(Self)
            }
        }

        impl From<Uuid> for $name {
            fn from(uuid: Uuid) -> Self {
                Self(uuid)
            }
        }

        impl From<$name> for AggregateId {
            fn from(id: $name) -> Self {
                AggregateId::from_uuid(id.0)
            }
        }

        impl From<AggregateId> for $name {
            fn from(id: AggregateId) -> Self {
                Self(id.as_uuid())
            }
        }
    };
}

uuid_id!(
    /// Identity of an authenticated user.
    UserId
);
uuid_id!(
    /// Catalog product; also the id of its inventory stream.
    ProductId
);
uuid_id!(CartId);
uuid_id!(OrderId);
uuid_id!(PaymentId);
uuid_id!(NotificationId);
uuid_id!(InquiryId);
uuid_id!(
    /// Reply embedded in an inquiry. Never used as a stream id.
    ReplyId
);
