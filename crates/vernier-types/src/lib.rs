//! Shared vocabulary types for the Vernier annotation runtime.
//!
//! Everything in this crate is a plain value type: dense identifiers, the
//! closed set of attribute value types, the attribute descriptor, and the
//! packed snapshot-entry encoding. There is no synchronization and no
//! allocation beyond `Arc<str>` attribute names, so these types are safe to
//! copy out of locked regions and to hand to asynchronous observers.

pub mod attribute;
pub mod snapshot;
pub mod value;

pub use attribute::{Attribute, Properties};
pub use snapshot::{
    ContextEntry, ENTRY_ATTR_SHIFT, ENTRY_KIND_INLINE, ENTRY_KIND_MASK, ENTRY_KIND_REFERENCE,
    ENTRY_WORDS, EntryValue, entries,
};
pub use value::ValueType;

use std::fmt;

/// Raw identifier value reserved as "invalid" across all id spaces.
///
/// Matches the all-ones sentinel convention of the wire format: a dense id
/// can never legitimately reach this value because the snapshot encoding
/// caps usable ids at 63 bits.
pub const INVALID_ID: u64 = u64::MAX;

macro_rules! dense_id {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(
            Debug,
            Clone,
            Copy,
            PartialEq,
            Eq,
            PartialOrd,
            Ord,
            Hash,
            serde::Serialize,
            serde::Deserialize,
        )]
        #[repr(transparent)]
        pub struct $name(u64);

        impl $name {
            /// The reserved invalid sentinel.
            pub const INVALID: Self = Self(INVALID_ID);

            /// Wrap a raw identifier value.
            #[inline]
            #[must_use]
            pub const fn new(raw: u64) -> Self {
                Self(raw)
            }

            /// Get the raw identifier value.
            #[inline]
            #[must_use]
            pub const fn raw(self) -> u64 {
                self.0
            }

            /// `true` unless this is the invalid sentinel.
            #[inline]
            #[must_use]
            pub const fn is_valid(self) -> bool {
                self.0 != INVALID_ID
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                if self.is_valid() {
                    write!(f, "{}", self.0)
                } else {
                    f.write_str("inv")
                }
            }
        }
    };
}

dense_id! {
    /// Identifies one execution environment (typically one per thread).
    ///
    /// Environment 0 exists from runtime construction; further ids are
    /// assigned densely by `clone_environment`.
    EnvId
}

dense_id! {
    /// Dense id of a registered attribute, stable for the process lifetime.
    AttrId
}

dense_id! {
    /// Dense id of an annotation node. The node at vector slot `i` has id `i`;
    /// ids are assigned at append time and never change.
    NodeId
}

#[cfg(test)]
mod tests {
    use super::{AttrId, EnvId, INVALID_ID, NodeId};

    #[test]
    fn invalid_sentinel_is_not_valid() {
        assert!(!AttrId::INVALID.is_valid());
        assert!(!NodeId::INVALID.is_valid());
        assert!(!EnvId::INVALID.is_valid());
        assert_eq!(AttrId::INVALID.raw(), INVALID_ID);
    }

    #[test]
    fn dense_ids_round_trip() {
        let id = NodeId::new(42);
        assert!(id.is_valid());
        assert_eq!(id.raw(), 42);
        assert_eq!(id.to_string(), "42");
        assert_eq!(NodeId::INVALID.to_string(), "inv");
    }

    #[test]
    fn ids_serialize_as_raw_integers() {
        let json = serde_json::to_string(&AttrId::new(7)).unwrap();
        assert_eq!(json, "7");
        let back: AttrId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, AttrId::new(7));
    }
}
