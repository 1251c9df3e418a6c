//! Snapshot decoding and whole-registry enumeration for serializers.

use vernier_error::{Error, Result};
use vernier_types::{Attribute, EntryValue, entries};

use crate::runtime::Runtime;
use crate::tree::NodeView;

/// A decoded snapshot value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UnpackedValue {
    /// Inline 64-bit scalar of a store-as-value attribute.
    Scalar(u64),
    /// Payloads along the referenced node's parent chain, leaf first.
    Path(Vec<Vec<u8>>),
}

/// One decoded snapshot entry: the attribute descriptor and its value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotRecord {
    pub attribute: Attribute,
    pub value: UnpackedValue,
}

impl Runtime {
    /// Decode a snapshot buffer produced by `get_context`.
    ///
    /// Each entry resolves through the attribute registry and, for node
    /// references, through the tree: the value carries the payload chain
    /// from the referenced node up to the root. Entries whose node id no
    /// longer resolves decode to an empty path; a dangling id cannot
    /// occur for buffers produced in-process because nodes are never
    /// removed.
    #[must_use]
    pub fn unpack(&self, buf: &[u64]) -> Vec<SnapshotRecord> {
        entries(buf)
            .map(|entry| SnapshotRecord {
                attribute: self.get_attribute(entry.attr),
                value: match entry.value {
                    EntryValue::Inline(scalar) => UnpackedValue::Scalar(scalar),
                    EntryValue::Reference(node) => {
                        UnpackedValue::Path(self.tree().path_payloads(node).unwrap_or_default())
                    }
                },
            })
            .collect()
    }

    /// Visit every node in id order. No lock is held while the visitor
    /// runs; nodes appended concurrently are not visited.
    pub fn for_each_node(&self, visitor: impl FnMut(&NodeView)) {
        self.tree().for_each(visitor);
    }

    /// Visit every attribute.
    pub fn for_each_attribute(&self, visitor: impl FnMut(&Attribute)) {
        self.attributes().for_each(visitor);
    }

    /// Serialize the attribute and node tables through the configured
    /// writer service. `"none"` succeeds without output; an unknown name
    /// logs and fails with `WriterNotFound`.
    pub fn write_metadata(&self) -> Result<()> {
        let name = self.config().output.as_str();
        if name == "none" {
            return Ok(());
        }

        let Some(writer) = self.services().writer(name) else {
            tracing::error!(target: "vernier.services", writer = name, "writer service not found");
            return Err(Error::WriterNotFound {
                name: name.to_owned(),
            });
        };

        writer.write(
            &mut |visit| self.for_each_attribute(|attr| visit(attr)),
            &mut |visit| self.for_each_node(|node| visit(node)),
        )
    }
}
