//! The Vernier annotation runtime core.
//!
//! A process-wide registry associating per-environment key/value
//! annotations with the call sites and program regions in which they are
//! active, so that samplers, trace recorders, and metadata writers can
//! snapshot or traverse that state at any moment, including from
//! asynchronous interruption handlers.
//!
//! The pieces, leaves first:
//!
//! - [`arena`]: bump-allocated backing store for node payloads
//! - [`lock`]: RW lock whose read side is safe in signal context
//! - [`tree`]: the append-only annotation DAG with dense node ids
//! - [`attributes`]: the interned attribute registry
//! - [`context`]: per-environment value maps plus the global overlay
//! - [`events`]: begin/end/set/query observer fan-out
//! - [`runtime`]: the coordinator singleton tying it all together
//! - [`traverse`]: snapshot decoding and table enumeration
//! - [`services`]: metadata writer dispatch
//! - [`config`]: runtime configuration
//! - [`metrics`]: global counters

pub mod arena;
pub mod attributes;
pub mod config;
pub mod context;
pub mod events;
pub mod lock;
pub mod metrics;
pub mod runtime;
pub mod services;
pub mod traverse;
pub mod tree;

pub use config::RuntimeConfig;
pub use events::Events;
pub use metrics::{MetricsSnapshot, metrics_snapshot, reset_metrics};
pub use runtime::Runtime;
pub use services::{AttributeEnumerator, CsvWriter, MetadataWriter, NodeEnumerator, ServiceRegistry};
pub use traverse::{SnapshotRecord, UnpackedValue};
pub use tree::NodeView;
