//! The interned attribute registry.
//!
//! Descriptors are created lazily, keyed both by dense id and by unique
//! name. Creation is idempotent by name: asking again returns the existing
//! descriptor unchanged, whatever type or properties the second caller
//! requested. The registry has its own lock, independent of the node lock,
//! so attribute creation never stalls tree traversal.

use std::collections::HashMap;
use std::sync::Arc;

use vernier_error::{Error, Result};
use vernier_types::{AttrId, Attribute, Properties, ValueType};

use crate::lock::SigsafeRwLock;

struct RegistryState {
    attrs: Vec<Attribute>,
    by_name: HashMap<Arc<str>, AttrId>,
}

pub struct AttributeRegistry {
    state: SigsafeRwLock<RegistryState>,
}

impl AttributeRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: SigsafeRwLock::new(RegistryState {
                attrs: Vec::new(),
                by_name: HashMap::new(),
            }),
        }
    }

    /// Create an attribute, or return the existing one with this name.
    ///
    /// The first creation assigns the next dense id; later calls with the
    /// same name return the original descriptor unchanged, ignoring the
    /// requested type and properties. Mutating an existing attribute is
    /// not possible.
    pub fn create(
        &self,
        name: &str,
        value_type: ValueType,
        properties: Properties,
    ) -> Result<Attribute> {
        {
            let state = self.state.read();
            if let Some(&id) = state.by_name.get(name) {
                return Ok(state.attrs[id.raw() as usize].clone());
            }
        }

        let mut state = self.state.write();
        if let Some(&id) = state.by_name.get(name) {
            return Ok(state.attrs[id.raw() as usize].clone());
        }

        let id = AttrId::new(state.attrs.len() as u64);
        if !id.is_valid() {
            return Err(Error::IdSpaceExhausted { what: "attribute" });
        }

        let name: Arc<str> = name.into();
        let attr = Attribute::new(id, Arc::clone(&name), value_type, properties);
        state.attrs.push(attr.clone());
        state.by_name.insert(name, id);
        Ok(attr)
    }

    /// Look up by id; the invalid sentinel if absent or out of range.
    #[must_use]
    pub fn get(&self, id: AttrId) -> Attribute {
        let state = self.state.read();
        state
            .attrs
            .get(id.raw() as usize)
            .cloned()
            .unwrap_or_else(Attribute::invalid)
    }

    /// Look up by name; the invalid sentinel if absent.
    #[must_use]
    pub fn get_by_name(&self, name: &str) -> Attribute {
        let state = self.state.read();
        match state.by_name.get(name) {
            Some(&id) => state.attrs[id.raw() as usize].clone(),
            None => Attribute::invalid(),
        }
    }

    /// Number of registered attributes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.state.read().attrs.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Visit every attribute. Descriptors are copied out under the read
    /// lock; the visitor runs with no lock held.
    pub fn for_each(&self, mut visitor: impl FnMut(&Attribute)) {
        let attrs = self.state.read().attrs.clone();
        for attr in &attrs {
            visitor(attr);
        }
    }
}

impl Default for AttributeRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::AttributeRegistry;
    use std::sync::{Arc, Barrier};
    use std::thread;
    use vernier_types::{AttrId, Properties, ValueType};

    #[test]
    fn creation_assigns_dense_ids() {
        let reg = AttributeRegistry::new();
        let a = reg
            .create("phase", ValueType::String, Properties::DEFAULT)
            .unwrap();
        let b = reg
            .create("count", ValueType::Uint, Properties::STORE_AS_VALUE)
            .unwrap();
        assert_eq!(a.id().raw(), 0);
        assert_eq!(b.id().raw(), 1);
        assert_eq!(reg.len(), 2);
    }

    #[test]
    fn creation_is_idempotent_by_name() {
        let reg = AttributeRegistry::new();
        let first = reg
            .create("phase", ValueType::String, Properties::DEFAULT)
            .unwrap();
        // A second creation with a different type and properties still
        // returns the original descriptor.
        let second = reg
            .create("phase", ValueType::Uint, Properties::GLOBAL)
            .unwrap();
        assert_eq!(first, second);
        assert_eq!(second.value_type(), ValueType::String);
        assert!(!second.is_global());
        assert_eq!(reg.len(), 1);
    }

    #[test]
    fn lookups_return_the_sentinel_on_miss() {
        let reg = AttributeRegistry::new();
        assert!(reg.get(AttrId::new(3)).is_invalid());
        assert!(reg.get(AttrId::INVALID).is_invalid());
        assert!(reg.get_by_name("nope").is_invalid());
    }

    #[test]
    fn for_each_sees_every_attribute() {
        let reg = AttributeRegistry::new();
        for name in ["a", "b", "c"] {
            reg.create(name, ValueType::String, Properties::DEFAULT)
                .unwrap();
        }
        let mut names = Vec::new();
        reg.for_each(|attr| names.push(attr.name().to_owned()));
        names.sort();
        assert_eq!(names, vec!["a", "b", "c"]);
    }

    /// Racing creators of one name agree on a single descriptor.
    #[test]
    fn concurrent_creation_converges() {
        let reg = Arc::new(AttributeRegistry::new());
        let barrier = Arc::new(Barrier::new(8));
        let mut handles = Vec::new();
        for _ in 0..8 {
            let reg = Arc::clone(&reg);
            let barrier = Arc::clone(&barrier);
            handles.push(thread::spawn(move || {
                barrier.wait();
                reg.create("shared", ValueType::String, Properties::DEFAULT)
                    .unwrap()
            }));
        }
        let attrs: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        for attr in &attrs {
            assert_eq!(attr, &attrs[0]);
        }
        assert_eq!(reg.len(), 1);
    }
}
