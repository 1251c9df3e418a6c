//! Public API facade for the Vernier annotation runtime.
//!
//! Vernier is an embeddable, process-wide registry that associates
//! per-environment key/value annotations with the program regions in
//! which they are active. Samplers and trace recorders observe annotation
//! changes through the event hub; metadata writers consume the traversal
//! surface; asynchronous interruption handlers snapshot the current
//! context through the signal-safe path.
//!
//! ```
//! use vernier::{Properties, Runtime, RuntimeConfig, ValueType};
//!
//! let runtime = Runtime::new(RuntimeConfig::default());
//! let phase = runtime
//!     .create_attribute("phase", ValueType::String, Properties::DEFAULT)
//!     .unwrap();
//!
//! let env = runtime.current_environment();
//! runtime.begin(env, &phase, b"solve").unwrap();
//!
//! let mut buf = [0u64; 16];
//! let words = runtime.get_context(env, &mut buf);
//! let records = runtime.unpack(&buf[..words]);
//! assert_eq!(records[0].attribute.name(), "phase");
//!
//! runtime.end(env, &phase).unwrap();
//! assert_eq!(runtime.context_size(env), 0);
//! ```
//!
//! Process-wide use goes through [`Runtime::instance`]; asynchronous
//! handlers probe [`Runtime::try_instance`], which never blocks and never
//! triggers initialization.

pub use vernier_core::{
    AttributeEnumerator, CsvWriter, Events, MetadataWriter, MetricsSnapshot, NodeEnumerator,
    NodeView, Runtime, RuntimeConfig, ServiceRegistry, SnapshotRecord, UnpackedValue,
    metrics_snapshot, reset_metrics,
};
pub use vernier_error::{Error, ErrorKind, Result};
pub use vernier_types::{
    AttrId, Attribute, ContextEntry, ENTRY_WORDS, EntryValue, EnvId, NodeId, Properties,
    ValueType, entries,
};
