//! Inference recording: a [`ConclusionVisitor`] that keeps the conclusions
//! applied or retracted during saturation.
//!
//! Recording never changes what is derived. It exists for explanation and
//! debugging tools that want to replay how a subsumption came about.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};

use crate::index::{ExprId, OntologyIndex};
use crate::saturation::{Conclusion, ConclusionVisitor, RuleMode};

/// One recorded conclusion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InferenceRecord {
    /// Root of the context the conclusion changed.
    pub root: ExprId,
    pub conclusion: Conclusion,
    pub mode: RuleMode,
}

impl InferenceRecord {
    /// Render against the index the conclusion was derived with.
    pub fn describe(&self, index: &OntologyIndex) -> String {
        let root = index.display(self.root);
        let verb = match self.mode {
            RuleMode::Apply => "derived",
            RuleMode::Deapply => "retracted",
        };
        let fact = match self.conclusion {
            Conclusion::ContextInit => "init".to_string(),
            Conclusion::Subsumer { expr, .. } => format!("⊑ {}", index.display(expr)),
            Conclusion::BackwardLink { source, property } => format!(
                "{} ⊑ ∃{}.·",
                index.display(source),
                index.property_iri(property)
            ),
            Conclusion::ForwardLink { property, target } => format!(
                "⊑ ∃{}.{}",
                index.property_iri(property),
                index.display(target)
            ),
            Conclusion::Propagation { property, carry } => format!(
                "propagates {} over {}",
                index.display(carry),
                index.property_iri(property)
            ),
            Conclusion::DisjointnessMember { member, .. } => {
                format!("⊑ disjoint member {}", index.display(member))
            }
            Conclusion::Contradiction => "⊑ ⊥".to_string(),
            Conclusion::IndexChange { premise } => {
                format!("rules of {} changed", index.display(premise))
            }
        };
        format!("{verb} [{root}] {fact}")
    }
}

/// Records the first `limit` conclusions (all of them without a limit).
#[derive(Debug, Default)]
pub struct InferenceRecorder {
    limit: Option<usize>,
    seen: AtomicUsize,
    records: Mutex<Vec<InferenceRecord>>,
}

impl InferenceRecorder {
    pub fn new(limit: Option<usize>) -> Self {
        Self {
            limit,
            seen: AtomicUsize::new(0),
            records: Mutex::new(Vec::new()),
        }
    }

    /// Snapshot of what was recorded so far.
    pub fn records(&self) -> Vec<InferenceRecord> {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Number of conclusions visited, recorded or not.
    pub fn seen(&self) -> usize {
        self.seen.load(Ordering::Relaxed)
    }

    pub fn clear(&self) {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
        self.seen.store(0, Ordering::Relaxed);
    }
}

impl ConclusionVisitor for InferenceRecorder {
    fn visit(&self, root: ExprId, conclusion: &Conclusion, mode: RuleMode) {
        let position = self.seen.fetch_add(1, Ordering::Relaxed);
        if self.limit.is_some_and(|limit| position >= limit) {
            return;
        }
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(InferenceRecord {
                root,
                conclusion: *conclusion,
                mode,
            });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn limit_caps_recorded_conclusions() {
        let recorder = InferenceRecorder::new(Some(2));
        for _ in 0..5 {
            recorder.visit(ExprId::new(0), &Conclusion::Contradiction, RuleMode::Apply);
        }
        assert_eq!(recorder.records().len(), 2);
        assert_eq!(recorder.seen(), 5);
        recorder.clear();
        assert!(recorder.records().is_empty());
    }

    #[test]
    fn records_render_against_the_index() {
        let mut index = OntologyIndex::new();
        let a = index
            .intern(&crate::model::ClassExpression::class("A"))
            .unwrap();
        let record = InferenceRecord {
            root: a,
            conclusion: Conclusion::positive(index.thing()),
            mode: RuleMode::Deapply,
        };
        let text = record.describe(&index);
        assert!(text.starts_with("retracted [A]"));
        assert!(text.ends_with("owl#Thing"));
    }
}
