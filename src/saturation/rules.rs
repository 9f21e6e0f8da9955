//! Rule application for the EL saturation calculus.
//!
//! Applying a conclusion runs the rules intrinsic to its kind and the rules
//! chained on its premise node in the index. The same rule bodies serve both
//! modes: in [`RuleMode::Apply`] every produced conclusion is a derivation, in
//! [`RuleMode::Deapply`] it is a retraction of what the rule once derived.
//! Rules only read the derived state of their own context, which the caller
//! holds exclusively through the activation flag.

use std::sync::Arc;

use super::conclusion::Conclusion;
use super::context::{Context, ContextState};
use super::state::SaturationState;
use crate::index::{ChainableRule, ExprId, ExprKind, OntologyIndex, Polarity, PropertyHierarchy};

/// Whether conclusions are being derived or retracted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RuleMode {
    Apply,
    Deapply,
}

/// Hook invoked for every conclusion that changes a context, in either mode.
/// Must not influence the computation.
pub trait ConclusionVisitor: Send + Sync {
    fn visit(&self, root: ExprId, conclusion: &Conclusion, mode: RuleMode);
}

/// Everything a rule needs, borrowed for the duration of one engine run.
#[derive(Clone, Copy)]
pub(crate) struct RuleApplication<'a> {
    pub index: &'a OntologyIndex,
    pub properties: &'a PropertyHierarchy,
    pub state: &'a SaturationState,
    pub mode: RuleMode,
    pub visitor: Option<&'a dyn ConclusionVisitor>,
}

impl RuleApplication<'_> {
    /// Process one conclusion polled from `context`. Returns whether the
    /// context changed; duplicates and absent retractions are no-ops.
    pub fn process(&self, context: &Arc<Context>, conclusion: Conclusion) -> bool {
        let mut state = context.lock();
        match self.mode {
            RuleMode::Apply => {
                if !state.insert(&conclusion) {
                    return false;
                }
                if context.is_saturated() {
                    context.set_saturated(false);
                }
                self.trace(context, &conclusion);
                self.apply(context, &state, conclusion);
            }
            RuleMode::Deapply => {
                if !state.contains(&conclusion) {
                    return false;
                }
                self.trace(context, &conclusion);
                // Rules read the premise, so retract consequences first.
                self.apply(context, &state, conclusion);
                state.remove(&conclusion);
                drop(state);
                self.state.mark_as_modified(context);
            }
        }
        true
    }

    fn trace(&self, context: &Context, conclusion: &Conclusion) {
        tracing::trace!(root = %context.root(), ?conclusion, mode = ?self.mode, "conclusion");
        if let Some(visitor) = self.visitor {
            visitor.visit(context.root(), conclusion, self.mode);
        }
    }

    fn apply(&self, context: &Arc<Context>, state: &ContextState, conclusion: Conclusion) {
        let root = context.root();
        match conclusion {
            Conclusion::ContextInit => {
                self.local(context, Conclusion::positive(root));
                self.local(context, Conclusion::positive(self.state.thing()));
            }
            Conclusion::Subsumer { expr, polarity } => {
                if expr == self.state.nothing() {
                    self.local(context, Conclusion::Contradiction);
                }
                // Retraction cannot tell how the subsumer was first derived,
                // so it always undoes the decomposition too.
                if polarity == Polarity::Positive || self.mode == RuleMode::Deapply {
                    self.decompose(context, expr);
                }
                self.compose(context, state, expr);
            }
            Conclusion::BackwardLink { source, property } => {
                if state.is_inconsistent() {
                    self.remote(source, Conclusion::Contradiction);
                }
                for carry in state.propagated_carries(property) {
                    self.remote(source, Conclusion::negative(carry));
                }
                if self.properties.is_right_composable(property) {
                    self.remote(
                        source,
                        Conclusion::ForwardLink {
                            property,
                            target: root,
                        },
                    );
                }
                for (&right, targets) in state.forward_links() {
                    for &composed in self.properties.compositions(property, right) {
                        for &target in targets {
                            self.remote(
                                target,
                                Conclusion::BackwardLink {
                                    source,
                                    property: composed,
                                },
                            );
                        }
                    }
                }
            }
            Conclusion::ForwardLink {
                property: right,
                target,
            } => {
                for (&left, sources) in state.backward_links() {
                    for &composed in self.properties.compositions(left, right) {
                        for &source in sources {
                            self.remote(
                                target,
                                Conclusion::BackwardLink {
                                    source,
                                    property: composed,
                                },
                            );
                        }
                    }
                }
            }
            Conclusion::Propagation { property, carry } => {
                for source in state.backward_link_sources(property) {
                    self.remote(source, Conclusion::negative(carry));
                }
            }
            Conclusion::DisjointnessMember { axiom, member } => {
                if state.disjointness_members(axiom).any(|other| other != member) {
                    self.local(context, Conclusion::Contradiction);
                }
            }
            Conclusion::Contradiction => {
                for sources in state.backward_links().values() {
                    for &source in sources {
                        self.remote(source, Conclusion::Contradiction);
                    }
                }
            }
            Conclusion::IndexChange { premise } => {
                if state.contains_subsumer(premise) {
                    self.compose(context, state, premise);
                }
            }
        }
    }

    /// Intrinsic rules of a positive subsumer.
    fn decompose(&self, context: &Arc<Context>, expr: ExprId) {
        match *self.index.kind(expr) {
            ExprKind::Conjunction { first, second } => {
                self.local(context, Conclusion::positive(first));
                self.local(context, Conclusion::positive(second));
            }
            ExprKind::Existential { property, filler } => {
                self.remote(
                    filler,
                    Conclusion::BackwardLink {
                        source: context.root(),
                        property,
                    },
                );
            }
            ExprKind::Datatype { .. } => {
                for implied in datatype_subsumers(expr) {
                    self.local(context, Conclusion::positive(implied));
                }
            }
            ExprKind::Class(_) | ExprKind::Nominal(_) => {}
        }
    }

    /// Rules chained on the premise node.
    fn compose(&self, context: &Arc<Context>, state: &ContextState, premise: ExprId) {
        for rule in self.index.rules(premise).iter() {
            match rule {
                ChainableRule::SuperClassFromSubClass { told_supers } => {
                    for &sup in told_supers {
                        self.local(context, Conclusion::positive(sup));
                    }
                }
                ChainableRule::ConjunctionComposition { compositions } => {
                    for &(other, conjunction) in compositions {
                        if state.contains_subsumer(other) {
                            self.local(context, Conclusion::negative(conjunction));
                        }
                    }
                }
                ChainableRule::ExistentialPropagation { existentials } => {
                    for &(property, existential) in existentials {
                        for &sub in self.properties.sub_properties(property) {
                            self.local(
                                context,
                                Conclusion::Propagation {
                                    property: sub,
                                    carry: existential,
                                },
                            );
                        }
                    }
                }
                ChainableRule::DisjointnessMembership { axioms } => {
                    for &axiom in axioms {
                        self.local(
                            context,
                            Conclusion::DisjointnessMember {
                                axiom,
                                member: premise,
                            },
                        );
                    }
                }
            }
        }
    }

    fn local(&self, context: &Arc<Context>, conclusion: Conclusion) {
        self.state.produce(context, conclusion);
    }

    /// Produce into the context of `root`. Derivations create it on demand;
    /// retractions into a context that does not exist have nothing to undo.
    fn remote(&self, root: ExprId, conclusion: Conclusion) {
        match self.mode {
            RuleMode::Apply => {
                let context = self.state.get_create_context(root);
                self.state.produce(&context, conclusion);
            }
            RuleMode::Deapply => {
                if let Some(context) = self.state.context(root) {
                    self.state.produce(context, conclusion);
                }
            }
        }
    }
}

/// Subsumers implied by a datatype expression through its value space.
///
/// Value-space subsumption is not indexed, so no datatype expression implies
/// anything beyond itself.
fn datatype_subsumers(_expr: ExprId) -> std::iter::Empty<ExprId> {
    std::iter::empty()
}
