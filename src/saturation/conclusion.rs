//! Conclusions: the facts produced into and processed by contexts.

use crate::index::{AxiomId, ExprId, Polarity, PropertyId};

/// One derived (or, in deletion mode, retracted) fact about the root of the
/// context it is produced into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Conclusion {
    /// Seeds a fresh context with its root and Thing.
    ContextInit,
    /// `root ⊑ expr`. Positive subsumers are decomposed and composed,
    /// negative ones only composed.
    Subsumer { expr: ExprId, polarity: Polarity },
    /// `source ⊑ ∃property.root`.
    BackwardLink { source: ExprId, property: PropertyId },
    /// `root ⊑ ∃property.target`, kept only when `property` can be composed.
    ForwardLink { property: PropertyId, target: ExprId },
    /// Every backward link over `property` carries the existential `carry`.
    Propagation { property: PropertyId, carry: ExprId },
    /// `root ⊑ member` where `member` belongs to a disjointness axiom.
    DisjointnessMember { axiom: AxiomId, member: ExprId },
    /// `root ⊑ ⊥`.
    Contradiction,
    /// The rule chain of `premise` changed; re-apply it if present.
    IndexChange { premise: ExprId },
}

/// Discriminant of a [`Conclusion`], for counting and tracing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ConclusionKind {
    ContextInit,
    Subsumer,
    BackwardLink,
    ForwardLink,
    Propagation,
    DisjointnessMember,
    Contradiction,
    IndexChange,
}

impl ConclusionKind {
    pub const COUNT: usize = 8;

    pub const ALL: [ConclusionKind; Self::COUNT] = [
        ConclusionKind::ContextInit,
        ConclusionKind::Subsumer,
        ConclusionKind::BackwardLink,
        ConclusionKind::ForwardLink,
        ConclusionKind::Propagation,
        ConclusionKind::DisjointnessMember,
        ConclusionKind::Contradiction,
        ConclusionKind::IndexChange,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Self::ContextInit => "context-init",
            Self::Subsumer => "subsumer",
            Self::BackwardLink => "backward-link",
            Self::ForwardLink => "forward-link",
            Self::Propagation => "propagation",
            Self::DisjointnessMember => "disjointness-member",
            Self::Contradiction => "contradiction",
            Self::IndexChange => "index-change",
        }
    }

    pub(crate) fn slot(self) -> usize {
        self as usize
    }
}

impl Conclusion {
    pub fn kind(&self) -> ConclusionKind {
        match self {
            Self::ContextInit => ConclusionKind::ContextInit,
            Self::Subsumer { .. } => ConclusionKind::Subsumer,
            Self::BackwardLink { .. } => ConclusionKind::BackwardLink,
            Self::ForwardLink { .. } => ConclusionKind::ForwardLink,
            Self::Propagation { .. } => ConclusionKind::Propagation,
            Self::DisjointnessMember { .. } => ConclusionKind::DisjointnessMember,
            Self::Contradiction => ConclusionKind::Contradiction,
            Self::IndexChange { .. } => ConclusionKind::IndexChange,
        }
    }

    pub fn positive(expr: ExprId) -> Self {
        Self::Subsumer {
            expr,
            polarity: Polarity::Positive,
        }
    }

    pub fn negative(expr: ExprId) -> Self {
        Self::Subsumer {
            expr,
            polarity: Polarity::Negative,
        }
    }
}
