//! The shared saturation state all engines act through.
//!
//! Holds at most one [`Context`] per indexed expression in a table of
//! [`OnceLock`] slots (the first writer installs, every other caller gets the
//! installed context), the lock-free queue of active contexts, the lock-free
//! queue of modified contexts and the context-creation listeners.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};

use crossbeam_channel::{Receiver, Sender};
use dashmap::DashMap;

use super::conclusion::Conclusion;
use super::context::Context;
use crate::index::ExprId;

/// Notified once for every context that gets installed.
pub trait ContextCreationListener: Send + Sync {
    fn context_created(&self, context: &Context);
}

/// Handle returned by [`SaturationState::register_listener`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

pub struct SaturationState {
    thing: ExprId,
    nothing: ExprId,
    contexts: Vec<OnceLock<Arc<Context>>>,
    active_tx: Sender<Arc<Context>>,
    active_rx: Receiver<Arc<Context>>,
    modified_tx: Sender<Arc<Context>>,
    modified_rx: Receiver<Arc<Context>>,
    listeners: DashMap<ListenerId, Arc<dyn ContextCreationListener>>,
    next_listener: AtomicU64,
}

impl SaturationState {
    pub fn new(thing: ExprId, nothing: ExprId) -> Self {
        let (active_tx, active_rx) = crossbeam_channel::unbounded();
        let (modified_tx, modified_rx) = crossbeam_channel::unbounded();
        Self {
            thing,
            nothing,
            contexts: Vec::new(),
            active_tx,
            active_rx,
            modified_tx,
            modified_rx,
            listeners: DashMap::new(),
            next_listener: AtomicU64::new(0),
        }
    }

    pub fn thing(&self) -> ExprId {
        self.thing
    }

    pub fn nothing(&self) -> ExprId {
        self.nothing
    }

    /// Grow the context table to cover `len` indexed nodes.
    pub fn sync_with_index(&mut self, len: usize) {
        if self.contexts.len() < len {
            self.contexts.resize_with(len, OnceLock::new);
        }
    }

    /// Drop every context and all queued work.
    pub fn reset_all(&mut self) {
        let len = self.contexts.len();
        self.contexts.clear();
        self.contexts.resize_with(len, OnceLock::new);
        while self.active_rx.try_recv().is_ok() {}
        while self.modified_rx.try_recv().is_ok() {}
    }

    // -- contexts -----------------------------------------------------------

    pub fn context(&self, root: ExprId) -> Option<&Arc<Context>> {
        self.contexts.get(root.index()).and_then(OnceLock::get)
    }

    /// Every installed context.
    pub fn contexts(&self) -> impl Iterator<Item = &Arc<Context>> + '_ {
        self.contexts.iter().filter_map(OnceLock::get)
    }

    pub fn context_count(&self) -> usize {
        self.contexts().count()
    }

    pub fn is_empty(&self) -> bool {
        self.contexts().next().is_none()
    }

    /// Return the context of `root`, installing it if absent. Only the
    /// installing caller seeds `ContextInit` and notifies listeners.
    ///
    /// The table must cover `root`; the reasoner grows it after every index
    /// change.
    pub fn get_create_context(&self, root: ExprId) -> Arc<Context> {
        let slot = &self.contexts[root.index()];
        if let Some(context) = slot.get() {
            return Arc::clone(context);
        }
        let mut installed = false;
        let context = Arc::clone(slot.get_or_init(|| {
            installed = true;
            Arc::new(Context::new(root))
        }));
        if installed {
            self.produce(&context, Conclusion::ContextInit);
            self.notify_created(&context);
        }
        context
    }

    // -- work queues --------------------------------------------------------

    /// Enqueue a conclusion; the producer that activates the context hands it
    /// to the active queue.
    pub fn produce(&self, context: &Arc<Context>, conclusion: Conclusion) {
        context.push(conclusion);
        if context.try_activate() {
            let _ = self.active_tx.send(Arc::clone(context));
        }
    }

    /// Non-blocking. `None` means no work is visible right now, not that
    /// saturation is finished.
    pub fn poll_for_context(&self) -> Option<Arc<Context>> {
        self.active_rx.try_recv().ok()
    }

    pub fn has_active_contexts(&self) -> bool {
        !self.active_rx.is_empty()
    }

    // -- modified contexts --------------------------------------------------

    /// Record a context whose derived state shrank. Each context is queued at
    /// most once until taken.
    pub fn mark_as_modified(&self, context: &Arc<Context>) {
        context.set_saturated(false);
        if context.try_mark_modified() {
            let _ = self.modified_tx.send(Arc::clone(context));
        }
    }

    /// Snapshot of the modified contexts, leaving them recorded.
    pub fn modified_contexts(&self) -> Vec<Arc<Context>> {
        let contexts: Vec<_> = self.modified_rx.try_iter().collect();
        for context in &contexts {
            let _ = self.modified_tx.send(Arc::clone(context));
        }
        contexts
    }

    /// Drain the modified contexts, clearing their flags.
    pub fn take_modified_contexts(&self) -> Vec<Arc<Context>> {
        let contexts: Vec<_> = self.modified_rx.try_iter().collect();
        for context in &contexts {
            context.clear_modified();
        }
        contexts
    }

    pub fn clear_modified_contexts(&self) {
        self.take_modified_contexts();
    }

    /// Flag every context saturated. Only valid at quiescence of a forward run.
    pub(crate) fn mark_all_saturated(&self) {
        for context in self.contexts() {
            context.set_saturated(true);
        }
    }

    // -- listeners ----------------------------------------------------------

    pub fn register_listener(&self, listener: Arc<dyn ContextCreationListener>) -> ListenerId {
        let id = ListenerId(self.next_listener.fetch_add(1, Ordering::Relaxed));
        self.listeners.insert(id, listener);
        id
    }

    pub fn deregister_listener(&self, id: ListenerId) -> bool {
        self.listeners.remove(&id).is_some()
    }

    fn notify_created(&self, context: &Context) {
        if self.listeners.is_empty() {
            return;
        }
        // Snapshot first so listeners may (de)register while being notified.
        let snapshot: Vec<Arc<dyn ContextCreationListener>> =
            self.listeners.iter().map(|entry| Arc::clone(entry.value())).collect();
        for listener in snapshot {
            listener.context_created(context);
        }
    }
}

impl std::fmt::Debug for SaturationState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SaturationState")
            .field("slots", &self.contexts.len())
            .field("contexts", &self.context_count())
            .field("active", &self.active_rx.len())
            .field("modified", &self.modified_rx.len())
            .field("listeners", &self.listeners.len())
            .finish()
    }
}
