//! Reasoner facade: top-level API for the classifier.
//!
//! The `Reasoner` owns the index, the saturation state, the worker pool and
//! the stage bookkeeping. Axiom changes only invalidate stages; queries run
//! whatever stages are not done. With incremental maintenance enabled, class
//! axiom changes made after a saturation are applied by delete/rederive
//! instead of saturating from scratch.

use std::collections::{BTreeSet, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::config::ReasonerConfig;
use crate::error::{ReasonerError, ReasonerResult, SaturationError};
use crate::index::{ExprId, OntologyIndex, PropertyHierarchy};
use crate::interrupt::InterruptHandle;
use crate::model::{Axiom, OWL_NOTHING, OWL_THING};
use crate::provenance::InferenceRecorder;
use crate::saturation::{
    ConclusionVisitor, Context, ContextCreationListener, RuleMode, RuleStatistics, SaturationEngine,
    SaturationState, incremental,
};
use crate::stages::{self, StageKind, StageRunner, StageStatus};
use crate::taxonomy::{self, InstanceTaxonomy, Taxonomy};

/// Counts contexts created while a saturation stage runs.
#[derive(Debug, Default)]
struct ContextCounter(AtomicUsize);

impl ContextCreationListener for ContextCounter {
    fn context_created(&self, _context: &Context) {
        self.0.fetch_add(1, Ordering::Relaxed);
    }
}

/// Progress of an incremental update, kept across interruptions.
#[derive(Debug, Default)]
struct IncrementalProgress {
    deletions_seeded: bool,
    additions_seeded: bool,
    cleaned: HashSet<ExprId>,
}

impl IncrementalProgress {
    fn in_flight(&self) -> bool {
        self.deletions_seeded || self.additions_seeded || !self.cleaned.is_empty()
    }
}

/// The EL classifier.
pub struct Reasoner {
    config: ReasonerConfig,
    index: OntologyIndex,
    properties: PropertyHierarchy,
    state: SaturationState,
    stages: StageStatus,
    progress: IncrementalProgress,
    inconsistent: bool,
    taxonomy: Option<Taxonomy>,
    instances: Option<InstanceTaxonomy>,
    pool: rayon::ThreadPool,
    interrupt: InterruptHandle,
    visitor: Option<Arc<dyn ConclusionVisitor>>,
    statistics: RuleStatistics,
}

impl Reasoner {
    /// Create a reasoner with an empty ontology.
    pub fn new(config: ReasonerConfig) -> ReasonerResult<Self> {
        config.validate()?;
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(config.workers)
            .thread_name(|i| format!("el-saturation-{i}"))
            .build()
            .map_err(|e| SaturationError::ThreadPool {
                message: e.to_string(),
            })?;
        tracing::info!(
            workers = config.workers,
            incremental = config.incremental,
            "initializing reasoner"
        );

        let index = OntologyIndex::new();
        let state = SaturationState::new(index.thing(), index.nothing());
        Ok(Self {
            config,
            index,
            properties: PropertyHierarchy::new(),
            state,
            stages: StageStatus::default(),
            progress: IncrementalProgress::default(),
            inconsistent: false,
            taxonomy: None,
            instances: None,
            pool,
            interrupt: InterruptHandle::new(),
            visitor: None,
            statistics: RuleStatistics::default(),
        })
    }

    pub fn config(&self) -> &ReasonerConfig {
        &self.config
    }

    pub fn index(&self) -> &OntologyIndex {
        &self.index
    }

    pub fn saturation_state(&self) -> &SaturationState {
        &self.state
    }

    /// Handle that cancels the running stage from any thread.
    pub fn interrupt_handle(&self) -> InterruptHandle {
        self.interrupt.clone()
    }

    /// Conclusion counters accumulated over every saturation run.
    pub fn statistics(&self) -> &RuleStatistics {
        &self.statistics
    }

    /// Visitor invoked on every conclusion applied or retracted from now on.
    pub fn set_conclusion_visitor(&mut self, visitor: Option<Arc<dyn ConclusionVisitor>>) {
        self.visitor = visitor;
    }

    /// Install an [`InferenceRecorder`] capped at the configured trace limit.
    pub fn record_inferences(&mut self) -> Arc<InferenceRecorder> {
        let recorder = Arc::new(InferenceRecorder::new(self.config.trace_limit));
        self.visitor = Some(Arc::clone(&recorder) as Arc<dyn ConclusionVisitor>);
        recorder
    }

    // -- axiom changes ------------------------------------------------------

    /// Assert an axiom. Returns whether the ontology changed.
    pub fn add_axiom(&mut self, axiom: &Axiom) -> ReasonerResult<bool> {
        let changed = self.index.add_axiom(axiom);
        self.state.sync_with_index(self.index.len());
        let changed = changed?;
        if changed {
            self.axioms_changed();
        }
        Ok(changed)
    }

    /// Retract an axiom. Retracting an axiom that was never asserted is a
    /// no-op returning `false`.
    pub fn remove_axiom(&mut self, axiom: &Axiom) -> ReasonerResult<bool> {
        let changed = self.index.remove_axiom(axiom);
        self.state.sync_with_index(self.index.len());
        let changed = changed?;
        if changed {
            self.axioms_changed();
        }
        Ok(changed)
    }

    pub fn add_axioms<'a>(&mut self, axioms: impl IntoIterator<Item = &'a Axiom>) -> ReasonerResult<usize> {
        let mut changed = 0;
        for axiom in axioms {
            changed += usize::from(self.add_axiom(axiom)?);
        }
        Ok(changed)
    }

    fn axioms_changed(&mut self) {
        let roles_changed = self.index.take_property_axioms_changed();
        let saturated = self.state.context_count() > 0;
        if self.index.property_count() != self.properties.len() {
            self.stages.invalidate(StageKind::PropertyHierarchy);
        }

        if !saturated || !self.config.incremental || roles_changed || self.progress.in_flight() {
            if saturated && roles_changed {
                tracing::warn!("property axioms changed, discarding all contexts");
            } else if saturated && self.progress.in_flight() {
                tracing::warn!("axioms changed during an interrupted update, discarding all contexts");
            }
            self.reset();
            if roles_changed {
                self.stages.invalidate(StageKind::PropertyHierarchy);
            }
        } else {
            self.stages.invalidate(StageKind::IncrementalDeletion);
        }
        self.taxonomy = None;
        self.instances = None;
    }

    /// Commit pending changes and drop every context.
    fn reset(&mut self) {
        self.index.commit();
        self.state.reset_all();
        self.progress = IncrementalProgress::default();
        self.stages.invalidate(StageKind::IncrementalDeletion);
    }

    // -- queries ------------------------------------------------------------

    /// Run stages up to `target`. An interruption is consumed when reported,
    /// so the next query resumes.
    fn complete(&mut self, target: StageKind) -> ReasonerResult<()> {
        let result = stages::complete(self, target);
        if result.as_ref().is_err_and(ReasonerError::is_interrupted) {
            self.interrupt.clear();
        }
        result
    }

    /// Classify the ontology.
    pub fn classify(&mut self) -> ReasonerResult<&Taxonomy> {
        self.complete(StageKind::ClassTaxonomy)?;
        if self.config.validate_taxonomy {
            self.complete(StageKind::TaxonomyValidation)?;
        }
        let (index, state, inconsistent) = (&self.index, &self.state, self.inconsistent);
        Ok(self
            .taxonomy
            .get_or_insert_with(|| taxonomy::build_class_taxonomy(index, state, inconsistent)))
    }

    /// Compute direct types of every individual.
    pub fn realize(&mut self) -> ReasonerResult<&InstanceTaxonomy> {
        self.classify()?;
        self.complete(StageKind::InstanceTaxonomy)?;
        let (index, state, inconsistent) = (&self.index, &self.state, self.inconsistent);
        let taxonomy = self
            .taxonomy
            .get_or_insert_with(|| taxonomy::build_class_taxonomy(index, state, inconsistent));
        Ok(self.instances.get_or_insert_with(|| {
            taxonomy::build_instance_taxonomy(index, state, taxonomy, inconsistent)
        }))
    }

    pub fn is_inconsistent(&mut self) -> ReasonerResult<bool> {
        self.complete(StageKind::ConsistencyCheck)?;
        Ok(self.inconsistent)
    }

    /// Whether the named class is satisfiable. Unknown classes are.
    pub fn is_satisfiable(&mut self, class: &str) -> ReasonerResult<bool> {
        self.complete(StageKind::ConsistencyCheck)?;
        if self.inconsistent {
            return Ok(false);
        }
        Ok(self
            .index
            .class_id(class)
            .and_then(|id| self.state.context(id))
            .is_none_or(|context| context.is_satisfiable()))
    }

    /// Super-classes of a named class (canonical names, `owl:Thing`
    /// included). Unknown classes yield an empty set.
    pub fn super_classes(&mut self, class: &str, direct: bool) -> ReasonerResult<BTreeSet<String>> {
        let taxonomy = self.classify()?;
        let found = if direct {
            taxonomy.direct_super_classes(class)
        } else {
            taxonomy.super_classes(class)
        };
        Ok(owned(found))
    }

    /// Sub-classes of a named class (canonical names, `owl:Nothing`
    /// included). Unknown classes yield an empty set.
    pub fn sub_classes(&mut self, class: &str, direct: bool) -> ReasonerResult<BTreeSet<String>> {
        let taxonomy = self.classify()?;
        let found = if direct {
            taxonomy.direct_sub_classes(class)
        } else {
            taxonomy.sub_classes(class)
        };
        Ok(owned(found))
    }

    /// Classes equivalent to a named class, the class itself included.
    pub fn equivalent_classes(&mut self, class: &str) -> ReasonerResult<BTreeSet<String>> {
        let taxonomy = self.classify()?;
        Ok(owned(taxonomy.equivalent_classes(class)))
    }

    /// Types of a named individual (canonical class names).
    pub fn types(&mut self, individual: &str, direct: bool) -> ReasonerResult<BTreeSet<String>> {
        self.realize()?;
        let (Some(instances), Some(taxonomy)) = (&self.instances, &self.taxonomy) else {
            return Ok(BTreeSet::new());
        };
        let found = if direct {
            instances.direct_types(individual).cloned()
        } else {
            instances.types(individual, taxonomy)
        };
        Ok(found.unwrap_or_default())
    }

    /// Whether `sub ⊑ sup` holds between named classes.
    pub fn is_subsumed(&mut self, sub: &str, sup: &str) -> ReasonerResult<bool> {
        if self.is_inconsistent()? {
            return Ok(true);
        }
        let (Some(sub_id), Some(sup_id)) = (self.index.class_id(sub), self.index.class_id(sup)) else {
            return Ok(sub == sup || sup == OWL_THING || sub == OWL_NOTHING);
        };
        Ok(self.state.context(sub_id).is_some_and(|context| {
            !context.is_satisfiable() || context.contains_subsumer(sup_id)
        }))
    }

    // -- stage bodies -------------------------------------------------------

    fn saturate(&mut self, stage: StageKind, mode: RuleMode, roots: &[ExprId]) -> ReasonerResult<()> {
        let statistics = {
            let engine = SaturationEngine::new(
                &self.index,
                &self.properties,
                &self.state,
                &self.pool,
                &self.interrupt,
                mode,
                self.visitor.as_deref(),
                stage.name(),
            );
            for &root in roots {
                engine.submit(root)?;
            }
            engine.process()?
        };
        tracing::debug!(
            stage = stage.name(),
            processed = statistics.total_processed(),
            changed = statistics.total_changed(),
            contexts = statistics.contexts_drained(),
            rule_time_ms = statistics.total_time().as_millis() as u64,
            "saturation run finished"
        );
        self.statistics.merge(&statistics);
        Ok(())
    }

    fn run_deletion(&mut self) -> ReasonerResult<()> {
        if !self.progress.deletions_seeded && self.state.has_active_contexts() {
            // Forward work left by an interrupted run was derived with the
            // uncommitted rules; finish it before anything is retracted.
            tracing::debug!("completing interrupted saturation before deletion");
            self.saturate(StageKind::IncrementalDeletion, RuleMode::Apply, &[])?;
        }
        if !self.progress.deletions_seeded {
            let seeded = incremental::seed_removed_rules(
                &self.state,
                &self.properties,
                self.index.pending().removed(),
            );
            tracing::debug!(seeded, "removed rule contributions seeded");
            self.progress.deletions_seeded = true;
        }
        self.saturate(StageKind::IncrementalDeletion, RuleMode::Deapply, &[])
    }

    fn run_cleaning(&mut self) -> ReasonerResult<()> {
        loop {
            self.saturate(StageKind::IncrementalCleaning, RuleMode::Deapply, &[])?;
            let fresh: Vec<Arc<Context>> = self
                .state
                .take_modified_contexts()
                .into_iter()
                .filter(|context| self.progress.cleaned.insert(context.root()))
                .collect();
            if fresh.is_empty() {
                break;
            }
            let seeded = incremental::seed_cleaning(&self.state, &fresh);
            tracing::debug!(contexts = fresh.len(), seeded, "cleaning modified contexts");
        }
        tracing::debug!(cleaned = self.progress.cleaned.len(), "cleaning finished");
        Ok(())
    }

    fn run_addition(&mut self) -> ReasonerResult<()> {
        if !self.progress.additions_seeded {
            let changes = self.index.commit();
            self.state.sync_with_index(self.index.len());
            let cleaned = &self.progress.cleaned;
            incremental::reinitialize(&self.state, cleaned);
            let replayed =
                incremental::replay_into_cleaned(&self.index, &self.properties, &self.state, cleaned);
            let seeded = incremental::seed_added_rules(&self.state, changes.added(), cleaned);
            tracing::debug!(
                reinitialized = cleaned.len(),
                replayed,
                seeded,
                "re-derivation seeded"
            );
            self.progress.additions_seeded = true;
        }
        self.saturate(StageKind::IncrementalAddition, RuleMode::Apply, &[])?;
        self.progress = IncrementalProgress::default();
        Ok(())
    }

    fn run_class_saturation(&mut self) -> ReasonerResult<()> {
        self.state.sync_with_index(self.index.len());
        let roots: Vec<ExprId> = self.index.classes().chain(self.index.individuals()).collect();
        let counter = Arc::new(ContextCounter::default());
        let listener = self
            .state
            .register_listener(Arc::clone(&counter) as Arc<dyn ContextCreationListener>);
        let result = self.saturate(StageKind::ClassSaturation, RuleMode::Apply, &roots);
        self.state.deregister_listener(listener);
        tracing::debug!(
            roots = roots.len(),
            created = counter.0.load(Ordering::Relaxed),
            contexts = self.state.context_count(),
            "class saturation"
        );
        result
    }

    fn run_consistency_check(&mut self) {
        let unsatisfiable = |id: ExprId| {
            self.state
                .context(id)
                .is_some_and(|context| !context.is_satisfiable())
        };
        self.inconsistent =
            unsatisfiable(self.index.thing()) || self.index.individuals().any(unsatisfiable);
        if self.inconsistent {
            tracing::info!("ontology is inconsistent");
        }
    }
}

impl StageRunner for Reasoner {
    fn status(&self) -> &StageStatus {
        &self.stages
    }

    fn status_mut(&mut self) -> &mut StageStatus {
        &mut self.stages
    }

    fn run_stage(&mut self, stage: StageKind) -> ReasonerResult<()> {
        match stage {
            StageKind::PropertyHierarchy => {
                self.properties = PropertyHierarchy::build(&self.index);
                tracing::debug!(properties = self.properties.len(), "property hierarchy built");
            }
            StageKind::IncrementalDeletion => self.run_deletion()?,
            StageKind::IncrementalCleaning => self.run_cleaning()?,
            StageKind::IncrementalAddition => self.run_addition()?,
            StageKind::ClassSaturation => self.run_class_saturation()?,
            StageKind::ConsistencyCheck => self.run_consistency_check(),
            StageKind::ClassTaxonomy => {
                self.taxonomy = Some(taxonomy::build_class_taxonomy(
                    &self.index,
                    &self.state,
                    self.inconsistent,
                ));
                self.instances = None;
            }
            StageKind::InstanceTaxonomy => {
                let (index, state, inconsistent) = (&self.index, &self.state, self.inconsistent);
                let taxonomy = self
                    .taxonomy
                    .get_or_insert_with(|| taxonomy::build_class_taxonomy(index, state, inconsistent));
                self.instances = Some(taxonomy::build_instance_taxonomy(
                    index,
                    state,
                    taxonomy,
                    inconsistent,
                ));
            }
            StageKind::TaxonomyValidation => {
                if let Some(taxonomy) = &self.taxonomy {
                    taxonomy::validate(taxonomy, &self.index)?;
                }
            }
        }
        Ok(())
    }
}

impl std::fmt::Debug for Reasoner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reasoner")
            .field("config", &self.config)
            .field("index", &self.index)
            .field("contexts", &self.state.context_count())
            .field("stages", &self.stages)
            .field("inconsistent", &self.inconsistent)
            .finish_non_exhaustive()
    }
}

fn owned(found: Option<BTreeSet<&str>>) -> BTreeSet<String> {
    found
        .map(|set| set.into_iter().map(str::to_string).collect())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reasoner() -> Reasoner {
        Reasoner::new(ReasonerConfig::with_workers(2)).unwrap()
    }

    #[test]
    fn invalid_config_is_rejected() {
        assert!(Reasoner::new(ReasonerConfig::with_workers(0)).is_err());
    }

    #[test]
    fn told_hierarchy_is_classified() {
        let mut r = reasoner();
        r.add_axiom(&Axiom::sub_class_of("A", "B")).unwrap();
        r.add_axiom(&Axiom::sub_class_of("B", "C")).unwrap();
        assert_eq!(r.super_classes("A", true).unwrap(), BTreeSet::from(["B".to_string()]));
        assert!(r.super_classes("A", false).unwrap().contains("C"));
        assert!(r.is_subsumed("A", "C").unwrap());
        assert!(!r.is_subsumed("C", "A").unwrap());
    }

    #[test]
    fn queries_reuse_done_stages() {
        let mut r = reasoner();
        r.add_axiom(&Axiom::sub_class_of("A", "B")).unwrap();
        r.classify().unwrap();
        let processed = r.statistics().total_processed();
        r.classify().unwrap();
        r.super_classes("A", true).unwrap();
        assert_eq!(r.statistics().total_processed(), processed);
    }

    #[test]
    fn retracting_unknown_axiom_changes_nothing() {
        let mut r = reasoner();
        let axiom = Axiom::sub_class_of("A", "B");
        assert!(!r.remove_axiom(&axiom).unwrap());
        assert!(r.add_axiom(&axiom).unwrap());
        assert!(r.remove_axiom(&axiom).unwrap());
    }

    #[test]
    fn recorder_sees_conclusions() {
        let mut r = reasoner();
        let recorder = r.record_inferences();
        r.add_axiom(&Axiom::sub_class_of("A", "B")).unwrap();
        r.classify().unwrap();
        assert!(recorder.seen() > 0);
        assert!(recorder.records().iter().any(|rec| rec.mode == RuleMode::Apply));
    }
}
