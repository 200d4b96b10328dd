//! Identity types for remote tracker entities

use serde::{Deserialize, Serialize};
use std::fmt;

/// Define a numeric identifier newtype for a remote entity.
///
/// Identifiers are assigned by the remote service, so these wrap the raw
/// `u64` instead of generating values locally.
///
/// # Example
/// ```ignore
/// define_remote_id!(ItemId, "item");
/// let id = ItemId::new(100);
/// assert_eq!(id.to_string(), "100");
/// ```
macro_rules! define_remote_id {
    ($name:ident, $label:literal) => {
        #[doc = concat!("Identifier of a remote ", $label, ".")]
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(u64);

        impl $name {
            pub const fn new(raw: u64) -> Self {
                Self(raw)
            }

            pub const fn get(self) -> u64 {
                self.0
            }
        }

        impl From<u64> for $name {
            fn from(raw: u64) -> Self {
                Self(raw)
            }
        }

        impl From<$name> for u64 {
            fn from(id: $name) -> u64 {
                id.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

define_remote_id!(ProjectId, "project");
define_remote_id!(TrackerId, "tracker");
define_remote_id!(ItemId, "item");
define_remote_id!(AssociationId, "association");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_is_raw_number() {
        assert_eq!(ItemId::new(100).to_string(), "100");
        assert_eq!(ProjectId::from(7).get(), 7);
    }

    #[test]
    fn test_serde_is_transparent() {
        let json = serde_json::to_string(&TrackerId::new(42)).unwrap();
        assert_eq!(json, "42");
        let back: TrackerId = serde_json::from_str("42").unwrap();
        assert_eq!(back, TrackerId::new(42));
    }

    #[test]
    fn test_ordering_follows_raw_value() {
        let mut ids = vec![ItemId::new(3), ItemId::new(1), ItemId::new(2)];
        ids.sort();
        assert_eq!(ids, vec![ItemId::new(1), ItemId::new(2), ItemId::new(3)]);
    }
}
