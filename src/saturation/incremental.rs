//! Seeding for incremental maintenance.
//!
//! Incremental updates follow delete/rederive:
//!
//! 1. For every removed rule contribution, every context holding its premise
//!    gets the retractions the contribution once produced, while the old rules
//!    are still in the index. The backward engine propagates them.
//! 2. Every context that lost a conclusion is cleaned: all of its conclusions
//!    are retracted, which may modify further contexts, until no new context
//!    is modified. Cleaned contexts are then reset.
//! 3. The index commits its pending changes.
//! 4. Cleaned contexts are re-initialized, intact contexts replay what they
//!    contribute to cleaned ones, contexts holding the premise of an added
//!    contribution get `IndexChange`, and the forward engine saturates.
//!
//! Every function here runs between engine passes, never concurrently with one.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use super::conclusion::Conclusion;
use super::context::{Context, ContextState};
use super::state::SaturationState;
use crate::index::{ExprId, ExprKind, OntologyIndex, PropertyHierarchy, RuleDelta};

/// Conclusions a single rule contribution produces in a context whose
/// subsumers contain its premise.
pub(crate) fn delta_conclusions(
    delta: &RuleDelta,
    state: &ContextState,
    properties: &PropertyHierarchy,
) -> Vec<Conclusion> {
    match *delta {
        RuleDelta::ToldSuper { sup, .. } => vec![Conclusion::positive(sup)],
        RuleDelta::ConjunctionComposition {
            other, conjunction, ..
        } => {
            if state.contains_subsumer(other) {
                vec![Conclusion::negative(conjunction)]
            } else {
                Vec::new()
            }
        }
        RuleDelta::ExistentialPropagation {
            property,
            existential,
            ..
        } => properties
            .sub_properties(property)
            .iter()
            .map(|&sub| Conclusion::Propagation {
                property: sub,
                carry: existential,
            })
            .collect(),
        RuleDelta::Disjointness { member, axiom } => {
            vec![Conclusion::DisjointnessMember { axiom, member }]
        }
    }
}

/// Queue the retractions of removed rule contributions. Returns the number
/// of retractions queued.
pub(crate) fn seed_removed_rules(
    state: &SaturationState,
    properties: &PropertyHierarchy,
    removed: &[RuleDelta],
) -> usize {
    if removed.is_empty() {
        return 0;
    }
    let mut by_premise: HashMap<ExprId, Vec<&RuleDelta>> = HashMap::new();
    for delta in removed {
        by_premise.entry(delta.premise()).or_default().push(delta);
    }

    let mut seeded = 0;
    for context in state.contexts() {
        let retractions: Vec<Conclusion> = {
            let derived = context.lock();
            by_premise
                .iter()
                .filter(|(premise, _)| derived.contains_subsumer(**premise))
                .flat_map(|(_, deltas)| deltas.iter())
                .flat_map(|delta| delta_conclusions(delta, &derived, properties))
                .collect()
        };
        seeded += retractions.len();
        for conclusion in retractions {
            state.produce(context, conclusion);
        }
    }
    seeded
}

/// Queue the retraction of every conclusion stored in `contexts`.
pub(crate) fn seed_cleaning(state: &SaturationState, contexts: &[Arc<Context>]) -> usize {
    let mut seeded = 0;
    for context in contexts {
        let retractions = context.lock().stored_conclusions();
        seeded += retractions.len();
        for conclusion in retractions {
            state.produce(context, conclusion);
        }
    }
    seeded
}

/// Reset cleaned contexts and queue their re-initialization.
pub(crate) fn reinitialize(state: &SaturationState, cleaned: &HashSet<ExprId>) {
    for &root in cleaned {
        if let Some(context) = state.context(root) {
            context.reset();
            state.produce(context, Conclusion::ContextInit);
        }
    }
}

/// Queue into cleaned contexts what intact contexts contribute to them.
///
/// Intact contexts are saturated and will not re-run their rules, so every
/// cross-context conclusion they once produced into a now cleaned context
/// has to be produced again.
pub(crate) fn replay_into_cleaned(
    index: &OntologyIndex,
    properties: &PropertyHierarchy,
    state: &SaturationState,
    cleaned: &HashSet<ExprId>,
) -> usize {
    if cleaned.is_empty() {
        return 0;
    }
    let mut replayed = 0;
    for context in state.contexts() {
        let root = context.root();
        if cleaned.contains(&root) {
            continue;
        }
        let productions = {
            let derived = context.lock();
            cross_context_productions(index, properties, root, &derived, cleaned)
        };
        replayed += productions.len();
        for (target, conclusion) in productions {
            if let Some(target) = state.context(target) {
                state.produce(target, conclusion);
            }
        }
    }
    replayed
}

fn cross_context_productions(
    index: &OntologyIndex,
    properties: &PropertyHierarchy,
    root: ExprId,
    derived: &ContextState,
    cleaned: &HashSet<ExprId>,
) -> Vec<(ExprId, Conclusion)> {
    let mut out = Vec::new();

    for &expr in derived.subsumers() {
        if let ExprKind::Existential { property, filler } = *index.kind(expr) {
            if cleaned.contains(&filler) {
                out.push((filler, Conclusion::BackwardLink { source: root, property }));
            }
        }
    }

    for (&property, sources) in derived.backward_links() {
        for &source in sources.iter().filter(|s| cleaned.contains(*s)) {
            if derived.is_inconsistent() {
                out.push((source, Conclusion::Contradiction));
            }
            for carry in derived.propagated_carries(property) {
                out.push((source, Conclusion::negative(carry)));
            }
            if properties.is_right_composable(property) {
                out.push((
                    source,
                    Conclusion::ForwardLink {
                        property,
                        target: root,
                    },
                ));
            }
        }
        for (&right, targets) in derived.forward_links() {
            for &composed in properties.compositions(property, right) {
                for &target in targets.iter().filter(|t| cleaned.contains(*t)) {
                    for &source in sources {
                        out.push((
                            target,
                            Conclusion::BackwardLink {
                                source,
                                property: composed,
                            },
                        ));
                    }
                }
            }
        }
    }
    out
}

/// Queue `IndexChange` for added rule contributions into intact contexts
/// holding their premise. Cleaned contexts re-derive with the new rules.
pub(crate) fn seed_added_rules(
    state: &SaturationState,
    added: &[RuleDelta],
    cleaned: &HashSet<ExprId>,
) -> usize {
    let premises: HashSet<ExprId> = added.iter().map(RuleDelta::premise).collect();
    if premises.is_empty() {
        return 0;
    }
    let mut seeded = 0;
    for context in state.contexts() {
        if cleaned.contains(&context.root()) {
            continue;
        }
        let present: Vec<ExprId> = {
            let derived = context.lock();
            premises
                .iter()
                .copied()
                .filter(|&premise| derived.contains_subsumer(premise))
                .collect()
        };
        seeded += present.len();
        for premise in present {
            state.produce(context, Conclusion::IndexChange { premise });
        }
    }
    seeded
}
