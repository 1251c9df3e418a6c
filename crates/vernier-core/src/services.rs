//! Metadata writer services.
//!
//! A writer serializes the attribute and node tables. Writers are looked
//! up by name in a registry populated during coordinator initialization;
//! `write_metadata` resolves the configured name, with `"none"` as a
//! success shortcut. This is a plain map lookup, not a plugin system.
//!
//! Writers receive two enumeration callbacks rather than references to
//! the runtime, so they stay decoupled from its locking discipline.

use std::collections::HashMap;
use std::io::{self, Write};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};

use vernier_error::Result;
use vernier_types::Attribute;

use crate::tree::NodeView;

/// Callback that runs a visitor over every registered attribute.
pub type AttributeEnumerator<'a> = &'a mut dyn FnMut(&mut dyn FnMut(&Attribute));

/// Callback that runs a visitor over every node, in id order.
pub type NodeEnumerator<'a> = &'a mut dyn FnMut(&mut dyn FnMut(&NodeView));

/// A pluggable metadata serializer.
pub trait MetadataWriter: Send + Sync {
    fn write(&self, attributes: AttributeEnumerator<'_>, nodes: NodeEnumerator<'_>) -> Result<()>;
}

/// Name → writer registry.
pub struct ServiceRegistry {
    writers: RwLock<HashMap<String, Arc<dyn MetadataWriter>>>,
}

impl ServiceRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self {
            writers: RwLock::new(HashMap::new()),
        }
    }

    /// Register a writer under `name`, replacing any previous registration.
    pub fn register_writer(&self, name: &str, writer: Arc<dyn MetadataWriter>) {
        tracing::debug!(target: "vernier.services", writer = name, "writer service registered");
        self.writers.write().insert(name.to_owned(), writer);
    }

    /// Look up a writer by name.
    #[must_use]
    pub fn writer(&self, name: &str) -> Option<Arc<dyn MetadataWriter>> {
        self.writers.read().get(name).cloned()
    }
}

impl Default for ServiceRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// The built-in CSV writer, registered under `"csv"`.
///
/// Output is line-oriented: one `attribute,...` record per attribute
/// followed by one `node,...` record per node. Payload bytes are escaped
/// so a record always stays on one line.
pub struct CsvWriter {
    sink: Mutex<Box<dyn Write + Send>>,
}

impl CsvWriter {
    /// Write to standard output.
    #[must_use]
    pub fn stdout() -> Self {
        Self::to(Box::new(io::stdout()))
    }

    /// Write to an arbitrary sink.
    #[must_use]
    pub fn to(sink: Box<dyn Write + Send>) -> Self {
        Self {
            sink: Mutex::new(sink),
        }
    }
}

impl MetadataWriter for CsvWriter {
    fn write(&self, attributes: AttributeEnumerator<'_>, nodes: NodeEnumerator<'_>) -> Result<()> {
        let mut sink = self.sink.lock();
        let mut failure: Option<io::Error> = None;

        attributes(&mut |attr: &Attribute| {
            if failure.is_some() {
                return;
            }
            let line = format!(
                "attribute,{},{},{},{}\n",
                attr.id(),
                escape(attr.name().as_bytes()),
                attr.value_type(),
                attr.properties().bits()
            );
            if let Err(e) = sink.write_all(line.as_bytes()) {
                failure = Some(e);
            }
        });

        nodes(&mut |node: &NodeView| {
            if failure.is_some() {
                return;
            }
            let line = format!(
                "node,{},{},{},{}\n",
                node.id,
                node.attr,
                node.parent,
                escape(&node.payload)
            );
            if let Err(e) = sink.write_all(line.as_bytes()) {
                failure = Some(e);
            }
        });

        if let Some(e) = failure {
            return Err(e.into());
        }
        sink.flush()?;
        Ok(())
    }
}

/// Escape payload bytes for single-line CSV fields: printable ASCII is
/// kept, commas, quotes, backslashes, and non-printable bytes become
/// `\xNN` sequences.
fn escape(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len());
    for &b in bytes {
        match b {
            b',' | b'"' | b'\\' => {
                out.push_str(&format!("\\x{b:02x}"));
            }
            0x20..=0x7e => out.push(b as char),
            _ => out.push_str(&format!("\\x{b:02x}")),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::{CsvWriter, MetadataWriter, ServiceRegistry, escape};
    use std::fs::File;
    use std::io::Read;
    use std::sync::Arc;
    use vernier_types::{AttrId, Attribute, NodeId, Properties, ValueType};

    use crate::tree::NodeView;

    #[test]
    fn escape_keeps_printable_ascii() {
        assert_eq!(escape(b"main loop"), "main loop");
        assert_eq!(escape(b"a,b"), "a\\x2cb");
        assert_eq!(escape(&[0x00, 0xff]), "\\x00\\xff");
    }

    #[test]
    fn registry_lookup_by_name() {
        let registry = ServiceRegistry::new();
        assert!(registry.writer("csv").is_none());
        registry.register_writer("csv", Arc::new(CsvWriter::stdout()));
        assert!(registry.writer("csv").is_some());
        assert!(registry.writer("xml").is_none());
    }

    #[test]
    fn csv_writer_emits_attribute_and_node_records() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let sink = file.reopen().unwrap();
        let writer = CsvWriter::to(Box::new(sink));

        let attr = Attribute::new(AttrId::new(0), "phase", ValueType::String, Properties::DEFAULT);
        let node = NodeView {
            id: NodeId::new(0),
            attr: AttrId::new(0),
            parent: NodeId::INVALID,
            payload: b"init".to_vec(),
        };

        writer
            .write(
                &mut |visit| visit(&attr),
                &mut |visit| visit(&node),
            )
            .unwrap();

        let mut text = String::new();
        File::open(file.path())
            .unwrap()
            .read_to_string(&mut text)
            .unwrap();
        assert_eq!(text, "attribute,0,phase,string,0\nnode,0,0,inv,init\n");
    }
}
