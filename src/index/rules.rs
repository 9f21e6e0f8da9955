//! Rules attached to indexed class expressions.
//!
//! A [`RuleChain`] holds at most one [`ChainableRule`] per [`RuleKind`]. Each
//! rule instance merges the contributions of every axiom that attached it, so
//! retracting one of two identical axioms leaves the other's contribution in
//! place. Chains are only mutated through [`RuleDelta`]s committed by the index
//! in a sequential phase.

use super::{AxiomId, ExprId, PropertyId};

/// Concrete rule types that can be chained on a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum RuleKind {
    SuperClassFromSubClass,
    ConjunctionComposition,
    ExistentialPropagation,
    DisjointnessMembership,
}

impl RuleKind {
    /// Every chainable rule type, in dispatch order.
    pub const ALL: [RuleKind; 4] = [
        RuleKind::SuperClassFromSubClass,
        RuleKind::ConjunctionComposition,
        RuleKind::ExistentialPropagation,
        RuleKind::DisjointnessMembership,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Self::SuperClassFromSubClass => "super-class-from-sub-class",
            Self::ConjunctionComposition => "conjunction-composition",
            Self::ExistentialPropagation => "existential-propagation",
            Self::DisjointnessMembership => "disjointness-membership",
        }
    }
}

/// A rule instance attached to one premise node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChainableRule {
    /// Told superclasses of the premise.
    SuperClassFromSubClass { told_supers: Vec<ExprId> },
    /// `(other conjunct, conjunction)` pairs for negatively occurring
    /// conjunctions the premise is a conjunct of.
    ConjunctionComposition { compositions: Vec<(ExprId, ExprId)> },
    /// `(property, existential)` pairs for negatively occurring existentials
    /// whose filler is the premise.
    ExistentialPropagation { existentials: Vec<(PropertyId, ExprId)> },
    /// Disjointness axioms the premise is a member of.
    DisjointnessMembership { axioms: Vec<AxiomId> },
}

impl ChainableRule {
    fn empty(kind: RuleKind) -> Self {
        match kind {
            RuleKind::SuperClassFromSubClass => Self::SuperClassFromSubClass {
                told_supers: Vec::new(),
            },
            RuleKind::ConjunctionComposition => Self::ConjunctionComposition {
                compositions: Vec::new(),
            },
            RuleKind::ExistentialPropagation => Self::ExistentialPropagation {
                existentials: Vec::new(),
            },
            RuleKind::DisjointnessMembership => Self::DisjointnessMembership { axioms: Vec::new() },
        }
    }

    pub fn kind(&self) -> RuleKind {
        match self {
            Self::SuperClassFromSubClass { .. } => RuleKind::SuperClassFromSubClass,
            Self::ConjunctionComposition { .. } => RuleKind::ConjunctionComposition,
            Self::ExistentialPropagation { .. } => RuleKind::ExistentialPropagation,
            Self::DisjointnessMembership { .. } => RuleKind::DisjointnessMembership,
        }
    }

    fn is_empty(&self) -> bool {
        match self {
            Self::SuperClassFromSubClass { told_supers } => told_supers.is_empty(),
            Self::ConjunctionComposition { compositions } => compositions.is_empty(),
            Self::ExistentialPropagation { existentials } => existentials.is_empty(),
            Self::DisjointnessMembership { axioms } => axioms.is_empty(),
        }
    }

    fn push(&mut self, delta: &RuleDelta) {
        match (self, *delta) {
            (Self::SuperClassFromSubClass { told_supers }, RuleDelta::ToldSuper { sup, .. }) => {
                told_supers.push(sup)
            }
            (
                Self::ConjunctionComposition { compositions },
                RuleDelta::ConjunctionComposition {
                    other, conjunction, ..
                },
            ) => compositions.push((other, conjunction)),
            (
                Self::ExistentialPropagation { existentials },
                RuleDelta::ExistentialPropagation {
                    property,
                    existential,
                    ..
                },
            ) => existentials.push((property, existential)),
            (Self::DisjointnessMembership { axioms }, RuleDelta::Disjointness { axiom, .. }) => {
                axioms.push(axiom)
            }
            _ => {}
        }
    }

    fn retract(&mut self, delta: &RuleDelta) -> bool {
        fn remove_one<T: PartialEq>(items: &mut Vec<T>, item: T) -> bool {
            match items.iter().position(|x| *x == item) {
                Some(pos) => {
                    items.remove(pos);
                    true
                }
                None => false,
            }
        }
        match (self, *delta) {
            (Self::SuperClassFromSubClass { told_supers }, RuleDelta::ToldSuper { sup, .. }) => {
                remove_one(told_supers, sup)
            }
            (
                Self::ConjunctionComposition { compositions },
                RuleDelta::ConjunctionComposition {
                    other, conjunction, ..
                },
            ) => remove_one(compositions, (other, conjunction)),
            (
                Self::ExistentialPropagation { existentials },
                RuleDelta::ExistentialPropagation {
                    property,
                    existential,
                    ..
                },
            ) => remove_one(existentials, (property, existential)),
            (Self::DisjointnessMembership { axioms }, RuleDelta::Disjointness { axiom, .. }) => {
                remove_one(axioms, axiom)
            }
            _ => false,
        }
    }
}

/// One contribution to one rule on one premise, produced when an axiom is
/// asserted or retracted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RuleDelta {
    ToldSuper {
        sub: ExprId,
        sup: ExprId,
    },
    ConjunctionComposition {
        conjunct: ExprId,
        other: ExprId,
        conjunction: ExprId,
    },
    ExistentialPropagation {
        filler: ExprId,
        property: PropertyId,
        existential: ExprId,
    },
    Disjointness {
        member: ExprId,
        axiom: AxiomId,
    },
}

impl RuleDelta {
    /// The node whose rule chain this contribution belongs to.
    pub fn premise(&self) -> ExprId {
        match *self {
            Self::ToldSuper { sub, .. } => sub,
            Self::ConjunctionComposition { conjunct, .. } => conjunct,
            Self::ExistentialPropagation { filler, .. } => filler,
            Self::Disjointness { member, .. } => member,
        }
    }

    pub fn kind(&self) -> RuleKind {
        match self {
            Self::ToldSuper { .. } => RuleKind::SuperClassFromSubClass,
            Self::ConjunctionComposition { .. } => RuleKind::ConjunctionComposition,
            Self::ExistentialPropagation { .. } => RuleKind::ExistentialPropagation,
            Self::Disjointness { .. } => RuleKind::DisjointnessMembership,
        }
    }
}

/// Rules attached to one node, at most one per [`RuleKind`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RuleChain {
    rules: Vec<ChainableRule>,
}

impl RuleChain {
    pub fn iter(&self) -> impl Iterator<Item = &ChainableRule> {
        self.rules.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn find(&self, kind: RuleKind) -> Option<&ChainableRule> {
        self.rules.iter().find(|r| r.kind() == kind)
    }

    pub(crate) fn add(&mut self, delta: &RuleDelta) {
        let kind = delta.kind();
        let pos = match self.rules.iter().position(|r| r.kind() == kind) {
            Some(pos) => pos,
            None => {
                self.rules.push(ChainableRule::empty(kind));
                self.rules.len() - 1
            }
        };
        self.rules[pos].push(delta);
    }

    /// Remove one contribution; an emptied rule leaves the chain.
    pub(crate) fn remove(&mut self, delta: &RuleDelta) -> bool {
        let kind = delta.kind();
        let Some(pos) = self.rules.iter().position(|r| r.kind() == kind) else {
            return false;
        };
        let removed = self.rules[pos].retract(delta);
        if self.rules[pos].is_empty() {
            self.rules.remove(pos);
        }
        removed
    }
}

/// Rule contributions awaiting commit.
///
/// A contribution retracted before its addition was committed cancels out
/// instead of being recorded twice, and vice versa.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AxiomChanges {
    added: Vec<RuleDelta>,
    removed: Vec<RuleDelta>,
}

impl AxiomChanges {
    pub fn added(&self) -> &[RuleDelta] {
        &self.added
    }

    pub fn removed(&self) -> &[RuleDelta] {
        &self.removed
    }

    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty()
    }

    pub(crate) fn record_addition(&mut self, delta: RuleDelta) {
        match self.removed.iter().position(|d| *d == delta) {
            Some(pos) => {
                self.removed.swap_remove(pos);
            }
            None => self.added.push(delta),
        }
    }

    pub(crate) fn record_removal(&mut self, delta: RuleDelta) {
        match self.added.iter().position(|d| *d == delta) {
            Some(pos) => {
                self.added.swap_remove(pos);
            }
            None => self.removed.push(delta),
        }
    }
}
