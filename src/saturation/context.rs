//! Per-root inference state.
//!
//! A [`Context`] accumulates everything derived about one indexed class
//! expression (its root). Conclusions are pushed onto its lock-free todo queue
//! by any worker; only the worker that wins the activation CAS drains the
//! queue and touches the derived [`ContextState`]. The mutex around that state
//! is therefore uncontended during saturation. It exists so that sequential
//! phases and the taxonomy builder can read the state through `&Context`.

use std::collections::{HashMap, HashSet};
use std::hash::Hash;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use crossbeam_channel::{Receiver, Sender};

use super::conclusion::Conclusion;
use crate::index::{AxiomId, ExprId, PropertyId};

type Multimap<K, V> = HashMap<K, HashSet<V>>;

fn multimap_insert<K: Hash + Eq, V: Hash + Eq>(map: &mut Multimap<K, V>, key: K, value: V) -> bool {
    map.entry(key).or_default().insert(value)
}

fn multimap_remove<K: Hash + Eq + Copy, V: Hash + Eq>(map: &mut Multimap<K, V>, key: K, value: &V) -> bool {
    let Some(values) = map.get_mut(&key) else {
        return false;
    };
    let removed = values.remove(value);
    if values.is_empty() {
        map.remove(&key);
    }
    removed
}

fn multimap_contains<K: Hash + Eq, V: Hash + Eq>(map: &Multimap<K, V>, key: &K, value: &V) -> bool {
    map.get(key).is_some_and(|values| values.contains(value))
}

/// Derived conclusions of one context.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ContextState {
    subsumers: HashSet<ExprId>,
    backward_links: Multimap<PropertyId, ExprId>,
    forward_links: Multimap<PropertyId, ExprId>,
    propagations: Multimap<PropertyId, ExprId>,
    disjointness: Multimap<AxiomId, ExprId>,
    inconsistent: bool,
}

impl ContextState {
    pub fn subsumers(&self) -> &HashSet<ExprId> {
        &self.subsumers
    }

    pub fn contains_subsumer(&self, expr: ExprId) -> bool {
        self.subsumers.contains(&expr)
    }

    /// Backward link sources, keyed by property.
    pub fn backward_links(&self) -> &HashMap<PropertyId, HashSet<ExprId>> {
        &self.backward_links
    }

    pub fn backward_link_sources(&self, property: PropertyId) -> impl Iterator<Item = ExprId> + '_ {
        self.backward_links.get(&property).into_iter().flatten().copied()
    }

    /// Forward link targets, keyed by property.
    pub fn forward_links(&self) -> &HashMap<PropertyId, HashSet<ExprId>> {
        &self.forward_links
    }

    /// Propagated existentials, keyed by property.
    pub fn propagations(&self) -> &HashMap<PropertyId, HashSet<ExprId>> {
        &self.propagations
    }

    pub fn propagated_carries(&self, property: PropertyId) -> impl Iterator<Item = ExprId> + '_ {
        self.propagations.get(&property).into_iter().flatten().copied()
    }

    pub fn disjointness_members(&self, axiom: AxiomId) -> impl Iterator<Item = ExprId> + '_ {
        self.disjointness.get(&axiom).into_iter().flatten().copied()
    }

    pub fn disjointness(&self) -> &HashMap<AxiomId, HashSet<ExprId>> {
        &self.disjointness
    }

    pub fn is_inconsistent(&self) -> bool {
        self.inconsistent
    }

    /// Whether the conclusion is currently stored. `ContextInit` and
    /// `IndexChange` are never stored.
    pub fn contains(&self, conclusion: &Conclusion) -> bool {
        match *conclusion {
            Conclusion::Subsumer { expr, .. } => self.subsumers.contains(&expr),
            Conclusion::BackwardLink { source, property } => {
                multimap_contains(&self.backward_links, &property, &source)
            }
            Conclusion::ForwardLink { property, target } => {
                multimap_contains(&self.forward_links, &property, &target)
            }
            Conclusion::Propagation { property, carry } => {
                multimap_contains(&self.propagations, &property, &carry)
            }
            Conclusion::DisjointnessMember { axiom, member } => {
                multimap_contains(&self.disjointness, &axiom, &member)
            }
            Conclusion::Contradiction => self.inconsistent,
            Conclusion::ContextInit | Conclusion::IndexChange { .. } => false,
        }
    }

    /// Store the conclusion; `true` if it was new.
    pub(crate) fn insert(&mut self, conclusion: &Conclusion) -> bool {
        match *conclusion {
            Conclusion::Subsumer { expr, .. } => self.subsumers.insert(expr),
            Conclusion::BackwardLink { source, property } => {
                multimap_insert(&mut self.backward_links, property, source)
            }
            Conclusion::ForwardLink { property, target } => {
                multimap_insert(&mut self.forward_links, property, target)
            }
            Conclusion::Propagation { property, carry } => {
                multimap_insert(&mut self.propagations, property, carry)
            }
            Conclusion::DisjointnessMember { axiom, member } => {
                multimap_insert(&mut self.disjointness, axiom, member)
            }
            Conclusion::Contradiction => !std::mem::replace(&mut self.inconsistent, true),
            Conclusion::ContextInit | Conclusion::IndexChange { .. } => true,
        }
    }

    /// Remove the conclusion; `true` if it was present.
    pub(crate) fn remove(&mut self, conclusion: &Conclusion) -> bool {
        match *conclusion {
            Conclusion::Subsumer { expr, .. } => self.subsumers.remove(&expr),
            Conclusion::BackwardLink { source, property } => {
                multimap_remove(&mut self.backward_links, property, &source)
            }
            Conclusion::ForwardLink { property, target } => {
                multimap_remove(&mut self.forward_links, property, &target)
            }
            Conclusion::Propagation { property, carry } => {
                multimap_remove(&mut self.propagations, property, &carry)
            }
            Conclusion::DisjointnessMember { axiom, member } => {
                multimap_remove(&mut self.disjointness, axiom, &member)
            }
            Conclusion::Contradiction => std::mem::replace(&mut self.inconsistent, false),
            Conclusion::ContextInit | Conclusion::IndexChange { .. } => false,
        }
    }

    /// Every stored conclusion, for full retraction during cleaning.
    pub fn stored_conclusions(&self) -> Vec<Conclusion> {
        let mut out = Vec::new();
        out.extend(self.subsumers.iter().map(|&expr| Conclusion::positive(expr)));
        for (&property, sources) in &self.backward_links {
            out.extend(
                sources
                    .iter()
                    .map(|&source| Conclusion::BackwardLink { source, property }),
            );
        }
        for (&property, targets) in &self.forward_links {
            out.extend(
                targets
                    .iter()
                    .map(|&target| Conclusion::ForwardLink { property, target }),
            );
        }
        for (&property, carries) in &self.propagations {
            out.extend(
                carries
                    .iter()
                    .map(|&carry| Conclusion::Propagation { property, carry }),
            );
        }
        for (&axiom, members) in &self.disjointness {
            out.extend(
                members
                    .iter()
                    .map(|&member| Conclusion::DisjointnessMember { axiom, member }),
            );
        }
        if self.inconsistent {
            out.push(Conclusion::Contradiction);
        }
        out
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// Inference state for one root expression.
pub struct Context {
    root: ExprId,
    todo_tx: Sender<Conclusion>,
    todo_rx: Receiver<Conclusion>,
    active: AtomicBool,
    saturated: AtomicBool,
    modified: AtomicBool,
    state: Mutex<ContextState>,
}

impl Context {
    pub(crate) fn new(root: ExprId) -> Self {
        let (todo_tx, todo_rx) = crossbeam_channel::unbounded();
        Self {
            root,
            todo_tx,
            todo_rx,
            active: AtomicBool::new(false),
            saturated: AtomicBool::new(false),
            modified: AtomicBool::new(false),
            state: Mutex::new(ContextState::default()),
        }
    }

    pub fn root(&self) -> ExprId {
        self.root
    }

    /// Read access to the derived state. Only meaningful once the context is
    /// saturated or no engine is running.
    pub fn state(&self) -> MutexGuard<'_, ContextState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn is_saturated(&self) -> bool {
        self.saturated.load(Ordering::Acquire)
    }

    pub fn is_satisfiable(&self) -> bool {
        !self.state().is_inconsistent()
    }

    pub fn contains_subsumer(&self, expr: ExprId) -> bool {
        self.state().contains_subsumer(expr)
    }

    /// Snapshot of the derived subsumers.
    pub fn subsumers(&self) -> Vec<ExprId> {
        let mut out: Vec<ExprId> = self.state().subsumers().iter().copied().collect();
        out.sort_unstable();
        out
    }

    pub fn has_pending(&self) -> bool {
        !self.todo_rx.is_empty()
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    // -- protocol (crate-internal) -------------------------------------------

    pub(crate) fn push(&self, conclusion: Conclusion) {
        // Both ends live in `self`, so the channel is never disconnected.
        let _ = self.todo_tx.send(conclusion);
    }

    pub(crate) fn poll(&self) -> Option<Conclusion> {
        self.todo_rx.try_recv().ok()
    }

    /// idle → active; `true` if this caller won activation.
    pub(crate) fn try_activate(&self) -> bool {
        self.active
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// active → idle; `false` if the context was not active.
    pub(crate) fn try_deactivate(&self) -> bool {
        self.active
            .compare_exchange(true, false, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    pub(crate) fn set_saturated(&self, saturated: bool) {
        self.saturated.store(saturated, Ordering::Release);
    }

    /// unmodified → modified; `true` if this caller flipped the flag.
    pub(crate) fn try_mark_modified(&self) -> bool {
        self.modified
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    pub(crate) fn clear_modified(&self) {
        self.modified.store(false, Ordering::Release);
    }

    pub(crate) fn lock(&self) -> MutexGuard<'_, ContextState> {
        self.state()
    }

    /// Drop all derived state and flags; pending conclusions are discarded.
    pub(crate) fn reset(&self) {
        *self.lock() = ContextState::default();
        while self.poll().is_some() {}
        self.set_saturated(false);
        self.clear_modified();
    }
}

impl std::fmt::Debug for Context {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Context")
            .field("root", &self.root)
            .field("active", &self.is_active())
            .field("saturated", &self.is_saturated())
            .field("pending", &self.todo_rx.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn e(n: u32) -> ExprId {
        ExprId::new(n)
    }

    #[test]
    fn insert_and_remove_report_changes() {
        let mut state = ContextState::default();
        let link = Conclusion::BackwardLink {
            source: e(3),
            property: PropertyId::new(0),
        };
        assert!(state.insert(&link));
        assert!(!state.insert(&link));
        assert!(state.contains(&link));
        assert!(state.remove(&link));
        assert!(!state.remove(&link));
        assert!(state.is_empty());
    }

    #[test]
    fn contradiction_is_a_flag() {
        let mut state = ContextState::default();
        assert!(state.insert(&Conclusion::Contradiction));
        assert!(!state.insert(&Conclusion::Contradiction));
        assert!(state.is_inconsistent());
        assert!(state.remove(&Conclusion::Contradiction));
        assert!(!state.is_inconsistent());
    }

    #[test]
    fn stored_conclusions_cover_everything() {
        let mut state = ContextState::default();
        let conclusions = [
            Conclusion::positive(e(1)),
            Conclusion::ForwardLink {
                property: PropertyId::new(1),
                target: e(2),
            },
            Conclusion::Propagation {
                property: PropertyId::new(1),
                carry: e(5),
            },
            Conclusion::DisjointnessMember {
                axiom: AxiomId::new(0),
                member: e(1),
            },
            Conclusion::Contradiction,
        ];
        for c in &conclusions {
            state.insert(c);
        }
        let stored = state.stored_conclusions();
        assert_eq!(stored.len(), conclusions.len());
        for c in &stored {
            assert!(state.remove(c));
        }
        assert!(state.is_empty());
    }

    #[test]
    fn activation_is_exclusive() {
        let context = Context::new(e(0));
        assert!(context.try_activate());
        assert!(!context.try_activate());
        assert!(context.try_deactivate());
        assert!(!context.try_deactivate());
    }

    #[test]
    fn reset_clears_state_and_queue() {
        let context = Context::new(e(0));
        context.lock().insert(&Conclusion::positive(e(4)));
        context.push(Conclusion::ContextInit);
        context.set_saturated(true);
        context.reset();
        assert!(!context.has_pending());
        assert!(!context.is_saturated());
        assert!(context.subsumers().is_empty());
    }
}
