//! Reasoning stages and their dependency-ordered execution.
//!
//! Each [`StageKind`] names a restartable unit of work. [`complete`] walks the
//! dependency DAG depth first and runs every stage that is not done yet. A
//! stage that fails or is interrupted stays not done, so calling [`complete`]
//! again resumes it. Axiom changes invalidate a stage together with every
//! stage that depends on it, leaving unaffected stages done.

use std::collections::HashSet;
use std::time::Instant;

use crate::error::ReasonerResult;

/// Stages of the reasoning pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum StageKind {
    /// Sub-property closure and chain compositions.
    PropertyHierarchy,
    /// Retractions of removed rules, run with the old index.
    IncrementalDeletion,
    /// Full retraction of every modified context.
    IncrementalCleaning,
    /// Commit of index changes and re-derivation.
    IncrementalAddition,
    /// Saturation of every indexed class and individual.
    ClassSaturation,
    /// Satisfiability of Thing and of every individual.
    ConsistencyCheck,
    /// Transitive reduction into the class taxonomy.
    ClassTaxonomy,
    /// Direct types of individuals.
    InstanceTaxonomy,
    /// Structural checks of the class taxonomy.
    TaxonomyValidation,
}

impl StageKind {
    pub const ALL: [StageKind; 9] = [
        StageKind::PropertyHierarchy,
        StageKind::IncrementalDeletion,
        StageKind::IncrementalCleaning,
        StageKind::IncrementalAddition,
        StageKind::ClassSaturation,
        StageKind::ConsistencyCheck,
        StageKind::ClassTaxonomy,
        StageKind::InstanceTaxonomy,
        StageKind::TaxonomyValidation,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Self::PropertyHierarchy => "property-hierarchy",
            Self::IncrementalDeletion => "incremental-deletion",
            Self::IncrementalCleaning => "incremental-cleaning",
            Self::IncrementalAddition => "incremental-addition",
            Self::ClassSaturation => "class-saturation",
            Self::ConsistencyCheck => "consistency-check",
            Self::ClassTaxonomy => "class-taxonomy",
            Self::InstanceTaxonomy => "instance-taxonomy",
            Self::TaxonomyValidation => "taxonomy-validation",
        }
    }

    pub fn dependencies(self) -> &'static [StageKind] {
        match self {
            Self::PropertyHierarchy => &[],
            Self::IncrementalDeletion => &[Self::PropertyHierarchy],
            Self::IncrementalCleaning => &[Self::IncrementalDeletion],
            Self::IncrementalAddition => &[Self::IncrementalCleaning],
            Self::ClassSaturation => &[Self::IncrementalAddition],
            Self::ConsistencyCheck => &[Self::ClassSaturation],
            Self::ClassTaxonomy => &[Self::ConsistencyCheck],
            Self::InstanceTaxonomy => &[Self::ClassTaxonomy],
            Self::TaxonomyValidation => &[Self::ClassTaxonomy],
        }
    }

    /// Stages listing `self` as a direct dependency.
    pub fn dependents(self) -> impl Iterator<Item = StageKind> {
        Self::ALL
            .into_iter()
            .filter(move |stage| stage.dependencies().contains(&self))
    }
}

impl std::fmt::Display for StageKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Completion flags of all stages.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StageStatus {
    done: HashSet<StageKind>,
}

impl StageStatus {
    pub fn is_done(&self, stage: StageKind) -> bool {
        self.done.contains(&stage)
    }

    pub fn mark_done(&mut self, stage: StageKind) {
        self.done.insert(stage);
    }

    /// Mark `stage` and everything depending on it, transitively, not done.
    pub fn invalidate(&mut self, stage: StageKind) {
        let mut pending = vec![stage];
        while let Some(current) = pending.pop() {
            if self.done.remove(&current) {
                tracing::trace!(stage = current.name(), "stage invalidated");
            }
            pending.extend(current.dependents());
        }
    }

    pub fn invalidate_all(&mut self) {
        self.done.clear();
    }
}

/// Something that can execute stages and tracks their completion.
pub trait StageRunner {
    fn status(&self) -> &StageStatus;
    fn status_mut(&mut self) -> &mut StageStatus;
    /// Execute one stage whose dependencies are all done.
    fn run_stage(&mut self, stage: StageKind) -> ReasonerResult<()>;
}

/// Run `target` and, first, every dependency that is not done.
pub fn complete<R: StageRunner + ?Sized>(runner: &mut R, target: StageKind) -> ReasonerResult<()> {
    if runner.status().is_done(target) {
        return Ok(());
    }
    for &dependency in target.dependencies() {
        complete(runner, dependency)?;
    }
    debug_assert!(
        target
            .dependencies()
            .iter()
            .all(|d| runner.status().is_done(*d))
    );

    let started = Instant::now();
    tracing::info!(stage = target.name(), "executing stage");
    runner.run_stage(target)?;
    runner.status_mut().mark_done(target);
    tracing::info!(
        stage = target.name(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        "stage done"
    );
    Ok(())
}
