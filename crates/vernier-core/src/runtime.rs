//! The process-wide annotation coordinator.
//!
//! `Runtime` ties the node tree, attribute registry, context store, event
//! hub, and writer services together behind the public annotation
//! contract. It is directly constructible for embedding and tests;
//! [`Runtime::instance`] manages the process singleton.
//!
//! ## Signal safety
//!
//! The singleton is published through a one-way initialization flag: the
//! flag is raised only after construction and service registration have
//! finished, so [`Runtime::try_instance`], the accessor for asynchronous
//! handlers, either observes a fully built coordinator or nothing. It
//! never blocks, allocates, logs, or triggers initialization.

use std::sync::Arc;
use std::sync::OnceLock;
use std::sync::atomic::{AtomicBool, Ordering};

use arc_swap::ArcSwapOption;
use parking_lot::Mutex;

use vernier_error::{Error, Result};
use vernier_types::{AttrId, Attribute, EntryValue, EnvId, NodeId, Properties, ValueType};

use crate::attributes::AttributeRegistry;
use crate::config::RuntimeConfig;
use crate::context::ContextStore;
use crate::events::Events;
use crate::metrics;
use crate::services::{CsvWriter, MetadataWriter, ServiceRegistry};
use crate::tree::{NodeTree, NodeView};

/// Maps the calling thread to its environment id.
pub type EnvCallback = Box<dyn Fn() -> EnvId + Send + Sync>;

static INSTANCE: OnceLock<Runtime> = OnceLock::new();
static INITIALIZED: AtomicBool = AtomicBool::new(false);
static INIT_GATE: Mutex<()> = Mutex::new(());

pub struct Runtime {
    config: RuntimeConfig,
    env_cb: ArcSwapOption<EnvCallback>,
    tree: NodeTree,
    attributes: AttributeRegistry,
    context: ContextStore,
    events: Events,
    services: ServiceRegistry,
}

impl Runtime {
    /// Build a coordinator with the given configuration. Embedders and
    /// tests use this directly; production code usually goes through
    /// [`Runtime::instance`].
    #[must_use]
    pub fn new(config: RuntimeConfig) -> Self {
        let runtime = Self {
            tree: NodeTree::new(config.node_pool_size),
            config,
            env_cb: ArcSwapOption::empty(),
            attributes: AttributeRegistry::new(),
            context: ContextStore::new(),
            events: Events::new(),
            services: ServiceRegistry::new(),
        };
        runtime.init();
        runtime
    }

    /// Deferred initialization: runs once the struct exists, so services
    /// can be registered against a usable coordinator.
    fn init(&self) {
        self.services.register_writer("csv", Arc::new(CsvWriter::stdout()));
        tracing::debug!(target: "vernier.runtime", config = ?self.config, "initialized");
    }

    /// The process singleton, constructed from the environment on first
    /// call. Construction and initialization happen under a one-shot
    /// gate; the init flag is raised afterwards, making the singleton
    /// visible to [`Runtime::try_instance`].
    pub fn instance() -> &'static Runtime {
        if let Some(runtime) = Self::try_instance() {
            return runtime;
        }
        let _gate = INIT_GATE.lock();
        let runtime = INSTANCE.get_or_init(|| Runtime::new(RuntimeConfig::from_env()));
        if !INITIALIZED.load(Ordering::Relaxed) {
            INITIALIZED.store(true, Ordering::Release);
        }
        runtime
    }

    /// The singleton, only if initialization has completed. This is the
    /// signal-context accessor: a relaxed flag probe plus a cell read,
    /// with no blocking and no side effects. `None` means "not present";
    /// callers on the signal path degrade to a no-op.
    #[must_use]
    pub fn try_instance() -> Option<&'static Runtime> {
        if INITIALIZED.load(Ordering::Relaxed) {
            INSTANCE.get()
        } else {
            None
        }
    }

    #[must_use]
    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    /// The event hub, for observer registration.
    #[must_use]
    pub fn events(&self) -> &Events {
        &self.events
    }

    // --- Environment interface

    /// The calling thread's environment, per the installed callback;
    /// environment 0 when no callback is installed.
    #[must_use]
    pub fn current_environment(&self) -> EnvId {
        match &*self.env_cb.load() {
            Some(cb) => cb(),
            None => EnvId::new(0),
        }
    }

    /// Install the thread → environment mapper.
    pub fn set_environment_callback(
        &self,
        cb: impl Fn() -> EnvId + Send + Sync + 'static,
    ) {
        self.env_cb.store(Some(Arc::new(Box::new(cb))));
    }

    /// Allocate a new environment started as a copy of `source`.
    pub fn clone_environment(&self, source: EnvId) -> Result<EnvId> {
        self.context.clone_environment(source)
    }

    /// Number of entries in the merged context of `env`.
    #[must_use]
    pub fn context_size(&self, env: EnvId) -> usize {
        self.context.context_size(env)
    }

    /// Snapshot the merged context of `env` into `buf`; returns the words
    /// written. Fires the *query* hook first so observers can materialize
    /// lazy state. Signal-safe, provided hook registration finished before
    /// signal-context snapshots began (see the events module).
    pub fn get_context(&self, env: EnvId, buf: &mut [u64]) -> usize {
        self.events.fire_query(self, env);
        self.context.get_context(env, buf)
    }

    // --- Annotation interface

    /// Push a value for `attr` on `env`.
    ///
    /// Store-as-value attributes with 8-byte payloads update the inline
    /// entry; everything else extends the tree below the current node
    /// (or the root) and points the context at the new child.
    pub fn begin(&self, env: EnvId, attr: &Attribute, payload: &[u8]) -> Result<()> {
        if attr.is_invalid() {
            return Err(Error::InvalidAttribute);
        }

        if attr.store_as_value() && payload.len() == 8 {
            let mut bytes = [0u8; 8];
            bytes.copy_from_slice(payload);
            self.context.set(
                env,
                attr.id(),
                EntryValue::Inline(u64::from_le_bytes(bytes)),
                attr.is_global(),
            )?;
        } else {
            let parent = self.current_node(env, attr.id());
            let node = self.tree.find_or_create(parent, attr.id(), payload)?;
            self.context
                .set(env, attr.id(), EntryValue::Reference(node), attr.is_global())?;
        }

        metrics::record_begin();
        self.events.fire_begin(self, env, attr);
        Ok(())
    }

    /// Pop the current value of `attr` on `env`.
    ///
    /// If the context points at a node of a different attribute (nested
    /// begins of several attributes on one path), the pop walks up to the
    /// nearest node carrying `attr` first.
    pub fn end(&self, env: EnvId, attr: &Attribute) -> Result<()> {
        if attr.is_invalid() {
            return Err(Error::InvalidAttribute);
        }

        if attr.store_as_value() {
            if !self.context.unset(env, attr.id())? {
                return Err(Error::UnmatchedEnd {
                    env,
                    attr: attr.id(),
                });
            }
        } else {
            let current = match self.context.get(env, attr.id()) {
                Some(EntryValue::Reference(node)) => node,
                _ => {
                    return Err(Error::UnmatchedEnd {
                        env,
                        attr: attr.id(),
                    });
                }
            };
            let parent = self
                .tree
                .exit_parent(current, attr.id())
                .ok_or(Error::UnmatchedEnd {
                    env,
                    attr: attr.id(),
                })?;
            if parent.is_valid() {
                self.context
                    .set(env, attr.id(), EntryValue::Reference(parent), false)?;
            } else {
                self.context.unset(env, attr.id())?;
            }
        }

        metrics::record_end();
        self.events.fire_end(self, env, attr);
        Ok(())
    }

    /// Replace the current value of `attr` on `env` without changing the
    /// stack depth: the new node is a sibling of the current one (a child
    /// of its parent, or of the root).
    pub fn set(&self, env: EnvId, attr: &Attribute, payload: &[u8]) -> Result<()> {
        if attr.is_invalid() {
            return Err(Error::InvalidAttribute);
        }

        if attr.store_as_value() && payload.len() == 8 {
            let mut bytes = [0u8; 8];
            bytes.copy_from_slice(payload);
            self.context.set(
                env,
                attr.id(),
                EntryValue::Inline(u64::from_le_bytes(bytes)),
                attr.is_global(),
            )?;
        } else {
            let parent = match self.current_node(env, attr.id()) {
                node if node.is_valid() => {
                    self.tree.parent_of(node).unwrap_or(NodeId::INVALID)
                }
                _ => NodeId::INVALID,
            };
            let node = self.tree.find_or_create(parent, attr.id(), payload)?;
            self.context
                .set(env, attr.id(), EntryValue::Reference(node), attr.is_global())?;
        }

        metrics::record_set();
        self.events.fire_set(self, env, attr);
        Ok(())
    }

    /// Node currently referenced by (env, attr); invalid when the stack
    /// for this attribute is empty.
    fn current_node(&self, env: EnvId, attr: AttrId) -> NodeId {
        match self.context.get(env, attr) {
            Some(EntryValue::Reference(node)) => node,
            _ => NodeId::INVALID,
        }
    }

    // --- Attribute interface

    #[must_use]
    pub fn num_attributes(&self) -> usize {
        self.attributes.len()
    }

    /// Descriptor for `id`; the invalid sentinel if absent.
    #[must_use]
    pub fn get_attribute(&self, id: AttrId) -> Attribute {
        self.attributes.get(id)
    }

    /// Descriptor for `name`; the invalid sentinel if absent.
    #[must_use]
    pub fn get_attribute_by_name(&self, name: &str) -> Attribute {
        self.attributes.get_by_name(name)
    }

    /// Create (or fetch, idempotently by name) an attribute.
    pub fn create_attribute(
        &self,
        name: &str,
        value_type: ValueType,
        properties: Properties,
    ) -> Result<Attribute> {
        self.attributes.create(name, value_type, properties)
    }

    // --- Node interface

    /// Bounds-checked node lookup.
    #[must_use]
    pub fn node(&self, id: NodeId) -> Option<NodeView> {
        self.tree.view(id)
    }

    /// Number of nodes created so far.
    #[must_use]
    pub fn num_nodes(&self) -> usize {
        self.tree.len()
    }

    pub(crate) fn tree(&self) -> &NodeTree {
        &self.tree
    }

    pub(crate) fn attributes(&self) -> &AttributeRegistry {
        &self.attributes
    }

    pub(crate) fn services(&self) -> &ServiceRegistry {
        &self.services
    }

    /// Register a writer service for `write_metadata` dispatch.
    pub fn register_writer(&self, name: &str, writer: Arc<dyn MetadataWriter>) {
        self.services.register_writer(name, writer);
    }
}

impl Drop for Runtime {
    fn drop(&mut self) {
        tracing::debug!(target: "vernier.runtime", "finished");
    }
}
