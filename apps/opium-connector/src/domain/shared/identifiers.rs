//! Strongly-typed identifiers for connector entities.
//!
//! These prevent mixing up IDs from different contexts: the locally
//! generated client order id, the id the venue assigns after submission,
//! and the venue's per-fill trade id used for deduplication.

use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! define_id {
    ($name:ident, $doc:expr) => {
        #[doc = $doc]
        #[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Create a new identifier from a string.
            #[must_use]
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            /// Get the inner string value.
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// Consume and return the inner string.
            #[must_use]
            pub fn into_inner(self) -> String {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self(value)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }
    };
}

define_id!(
    ClientOrderId,
    "Locally generated order identifier, unique for the connector lifetime."
);
define_id!(
    ExchangeOrderId,
    "Venue-assigned order identifier, available only after submission is acknowledged."
);
define_id!(
    TradeId,
    "Venue-assigned identifier for a single fill, used to deduplicate fills."
);

impl ClientOrderId {
    /// Generate a new unique client order id, tagged with the order side.
    ///
    /// The side prefix makes operator logs readable; uniqueness comes from
    /// the UUID suffix.
    #[must_use]
    pub fn generate(side_tag: &str) -> Self {
        Self(format!("{side_tag}-{}", uuid::Uuid::new_v4().simple()))
    }
}
