//! Attribute descriptors and their property bitfield.

use std::fmt;
use std::sync::Arc;

use crate::{AttrId, ValueType};

bitflags::bitflags! {
    /// Behavioral properties of an attribute.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Properties: u32 {
        /// No special behavior.
        const DEFAULT = 0;
        /// The current value is stored inline in the context map as a 64-bit
        /// scalar instead of as a node reference.
        const STORE_AS_VALUE = 1;
        /// Mutations propagate into the process-wide global overlay and are
        /// visible from every environment.
        const GLOBAL = 2;
    }
}

impl Default for Properties {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl serde::Serialize for Properties {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.bits().serialize(serializer)
    }
}

impl<'de> serde::Deserialize<'de> for Properties {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let bits = u32::deserialize(deserializer)?;
        Self::from_bits(bits)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid Properties bits: {bits:#x}")))
    }
}

/// A registered annotation dimension: dense id, unique name, value type,
/// and property bits.
///
/// Attributes are immutable once created and cheap to clone (the name is
/// reference-counted), so registry lookups hand out copies and no lock is
/// held while a caller inspects one.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Attribute {
    id: AttrId,
    name: Arc<str>,
    value_type: ValueType,
    properties: Properties,
}

impl Attribute {
    /// Assemble a descriptor. Only the attribute registry assigns ids;
    /// everything else should treat descriptors as opaque.
    #[must_use]
    pub fn new(id: AttrId, name: impl Into<Arc<str>>, value_type: ValueType, properties: Properties) -> Self {
        Self {
            id,
            name: name.into(),
            value_type,
            properties,
        }
    }

    /// The invalid sentinel: invalid id, empty name, `ValueType::Inv`.
    #[must_use]
    pub fn invalid() -> Self {
        Self::new(AttrId::INVALID, "", ValueType::Inv, Properties::DEFAULT)
    }

    #[inline]
    #[must_use]
    pub fn id(&self) -> AttrId {
        self.id
    }

    #[inline]
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    #[must_use]
    pub fn value_type(&self) -> ValueType {
        self.value_type
    }

    #[inline]
    #[must_use]
    pub fn properties(&self) -> Properties {
        self.properties
    }

    /// `true` if this is the invalid sentinel.
    #[inline]
    #[must_use]
    pub fn is_invalid(&self) -> bool {
        !self.id.is_valid()
    }

    /// Values of this attribute live inline in the context map.
    #[inline]
    #[must_use]
    pub fn store_as_value(&self) -> bool {
        self.properties.contains(Properties::STORE_AS_VALUE)
    }

    /// Mutations of this attribute target the global overlay.
    #[inline]
    #[must_use]
    pub fn is_global(&self) -> bool {
        self.properties.contains(Properties::GLOBAL)
    }
}

impl fmt::Display for Attribute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}:{}", self.name, self.id, self.value_type)
    }
}

#[cfg(test)]
mod tests {
    use super::{Attribute, Properties};
    use crate::{AttrId, ValueType};

    #[test]
    fn invalid_sentinel() {
        let inv = Attribute::invalid();
        assert!(inv.is_invalid());
        assert_eq!(inv.name(), "");
        assert_eq!(inv.value_type(), ValueType::Inv);
        assert!(!inv.store_as_value());
        assert!(!inv.is_global());
    }

    #[test]
    fn property_accessors() {
        let a = Attribute::new(
            AttrId::new(3),
            "mem.allocated",
            ValueType::Uint,
            Properties::STORE_AS_VALUE | Properties::GLOBAL,
        );
        assert!(!a.is_invalid());
        assert!(a.store_as_value());
        assert!(a.is_global());
        assert_eq!(a.to_string(), "mem.allocated#3:uint");
    }

    #[test]
    fn clones_share_the_name() {
        let a = Attribute::new(AttrId::new(0), "phase", ValueType::String, Properties::DEFAULT);
        let b = a.clone();
        assert_eq!(a, b);
        assert_eq!(b.name(), "phase");
    }
}
