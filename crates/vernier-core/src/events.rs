//! Lifecycle notification fan-out.
//!
//! Four named hook lists: *begin*, *end*, *set*, and *query*. Observers
//! register during service initialization and are fired synchronously in
//! registration order: after the mutation for begin/end/set, and before
//! the snapshot is taken for query, so observers can materialize lazy
//! state into the context store.
//!
//! Hook lists live behind `ArcSwap`, not a lock: firing loads the current
//! list wait-free and runs the callbacks with nothing held, which keeps
//! the query hook usable on the signal-safe snapshot path (registration
//! must complete before signal-context snapshots begin). Observer failures
//! are logged and counted; they never alter the outcome of the operation
//! that fired the hook.

use std::sync::Arc;

use arc_swap::ArcSwap;

use vernier_error::Result;
use vernier_types::{Attribute, EnvId};

use crate::metrics;
use crate::runtime::Runtime;

/// Observer of begin/end/set operations.
pub type AnnotationHook = dyn Fn(&Runtime, EnvId, &Attribute) -> Result<()> + Send + Sync;

/// Observer fired before a context snapshot is taken.
pub type QueryHook = dyn Fn(&Runtime, EnvId) -> Result<()> + Send + Sync;

type HookList<T> = ArcSwap<Vec<Arc<T>>>;

fn empty<T: ?Sized>() -> HookList<T> {
    ArcSwap::from_pointee(Vec::new())
}

fn push<T: ?Sized>(list: &HookList<T>, hook: Arc<T>) {
    list.rcu(|current| {
        let mut next = (**current).clone();
        next.push(Arc::clone(&hook));
        next
    });
}

/// The event hub.
pub struct Events {
    begin: HookList<AnnotationHook>,
    end: HookList<AnnotationHook>,
    set: HookList<AnnotationHook>,
    query: HookList<QueryHook>,
}

impl Events {
    #[must_use]
    pub fn new() -> Self {
        Self {
            begin: empty(),
            end: empty(),
            set: empty(),
            query: empty(),
        }
    }

    pub fn on_begin(&self, hook: impl Fn(&Runtime, EnvId, &Attribute) -> Result<()> + Send + Sync + 'static) {
        push(&self.begin, Arc::new(hook));
    }

    pub fn on_end(&self, hook: impl Fn(&Runtime, EnvId, &Attribute) -> Result<()> + Send + Sync + 'static) {
        push(&self.end, Arc::new(hook));
    }

    pub fn on_set(&self, hook: impl Fn(&Runtime, EnvId, &Attribute) -> Result<()> + Send + Sync + 'static) {
        push(&self.set, Arc::new(hook));
    }

    pub fn on_query(&self, hook: impl Fn(&Runtime, EnvId) -> Result<()> + Send + Sync + 'static) {
        push(&self.query, Arc::new(hook));
    }

    pub(crate) fn fire_begin(&self, runtime: &Runtime, env: EnvId, attr: &Attribute) {
        Self::fire_annotation(&self.begin, "begin", runtime, env, attr);
    }

    pub(crate) fn fire_end(&self, runtime: &Runtime, env: EnvId, attr: &Attribute) {
        Self::fire_annotation(&self.end, "end", runtime, env, attr);
    }

    pub(crate) fn fire_set(&self, runtime: &Runtime, env: EnvId, attr: &Attribute) {
        Self::fire_annotation(&self.set, "set", runtime, env, attr);
    }

    pub(crate) fn fire_query(&self, runtime: &Runtime, env: EnvId) {
        let hooks = self.query.load();
        for hook in hooks.iter() {
            if let Err(error) = (hook.as_ref())(runtime, env) {
                metrics::record_observer_error();
                tracing::error!(target: "vernier.events", hook = "query", %env, %error, "observer failed");
            }
        }
    }

    fn fire_annotation(
        list: &HookList<AnnotationHook>,
        name: &'static str,
        runtime: &Runtime,
        env: EnvId,
        attr: &Attribute,
    ) {
        let hooks = list.load();
        for hook in hooks.iter() {
            if let Err(error) = (hook.as_ref())(runtime, env, attr) {
                metrics::record_observer_error();
                tracing::error!(
                    target: "vernier.events",
                    hook = name,
                    %env,
                    attribute = attr.name(),
                    %error,
                    "observer failed"
                );
            }
        }
    }
}

impl Default for Events {
    fn default() -> Self {
        Self::new()
    }
}
