//! Parallel saturation driver.
//!
//! A [`SaturationEngine`] runs one pass of rule application, in either mode,
//! on a rayon pool. Every worker loops: poll an active context, drain it,
//! repeat. A worker that sees no active context leaves the active-worker
//! count and waits until either work shows up again or every worker has left,
//! which is quiescence.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use super::conclusion::{Conclusion, ConclusionKind};
use super::context::Context;
use super::rules::{ConclusionVisitor, RuleApplication, RuleMode};
use super::state::SaturationState;
use crate::error::{SaturationError, SaturationResult};
use crate::index::{ExprId, OntologyIndex, PropertyHierarchy};
use crate::interrupt::InterruptHandle;

/// Per-kind conclusion counters and rule timings of a run.
///
/// Each worker counts locally; counters are merged once the run ends.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RuleStatistics {
    processed: [u64; ConclusionKind::COUNT],
    changed: [u64; ConclusionKind::COUNT],
    time: [Duration; ConclusionKind::COUNT],
    contexts: u64,
}

impl RuleStatistics {
    fn record(&mut self, kind: ConclusionKind, changed: bool, elapsed: Duration) {
        self.processed[kind.slot()] += 1;
        if changed {
            self.changed[kind.slot()] += 1;
        }
        self.time[kind.slot()] += elapsed;
    }

    pub fn merge(&mut self, other: &RuleStatistics) {
        for i in 0..ConclusionKind::COUNT {
            self.processed[i] += other.processed[i];
            self.changed[i] += other.changed[i];
            self.time[i] += other.time[i];
        }
        self.contexts += other.contexts;
    }

    /// Time spent applying rules to conclusions of `kind`, summed over workers.
    pub fn time(&self, kind: ConclusionKind) -> Duration {
        self.time[kind.slot()]
    }

    pub fn total_time(&self) -> Duration {
        self.time.iter().sum()
    }

    /// The conclusion kind whose rules took longest, if any ran.
    pub fn slowest(&self) -> Option<ConclusionKind> {
        ConclusionKind::ALL
            .into_iter()
            .filter(|kind| !self.time(*kind).is_zero())
            .max_by_key(|kind| self.time(*kind))
    }

    /// Conclusions of `kind` polled from a queue.
    pub fn processed(&self, kind: ConclusionKind) -> u64 {
        self.processed[kind.slot()]
    }

    /// Conclusions of `kind` that were new (or present, when retracting).
    pub fn changed(&self, kind: ConclusionKind) -> u64 {
        self.changed[kind.slot()]
    }

    pub fn total_processed(&self) -> u64 {
        self.processed.iter().sum()
    }

    pub fn total_changed(&self) -> u64 {
        self.changed.iter().sum()
    }

    /// Drain cycles, one per context taken from the active queue.
    pub fn contexts_drained(&self) -> u64 {
        self.contexts
    }
}

/// One saturation pass over the shared state.
pub struct SaturationEngine<'a> {
    rules: RuleApplication<'a>,
    pool: &'a rayon::ThreadPool,
    interrupt: &'a InterruptHandle,
    stage: &'static str,
}

impl<'a> SaturationEngine<'a> {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        index: &'a OntologyIndex,
        properties: &'a PropertyHierarchy,
        state: &'a SaturationState,
        pool: &'a rayon::ThreadPool,
        interrupt: &'a InterruptHandle,
        mode: RuleMode,
        visitor: Option<&'a dyn ConclusionVisitor>,
        stage: &'static str,
    ) -> Self {
        Self {
            rules: RuleApplication {
                index,
                properties,
                state,
                mode,
                visitor,
            },
            pool,
            interrupt,
            stage,
        }
    }

    pub fn mode(&self) -> RuleMode {
        self.rules.mode
    }

    fn interrupted(&self) -> SaturationError {
        SaturationError::Interrupted { stage: self.stage }
    }

    /// Seed saturation of `root`. Creating its context queues `ContextInit`;
    /// an existing context is left alone.
    pub fn submit(&self, root: ExprId) -> SaturationResult<()> {
        if self.interrupt.is_interrupted() {
            return Err(self.interrupted());
        }
        self.rules.state.get_create_context(root);
        Ok(())
    }

    /// Queue a conclusion into an existing or new context.
    pub fn produce(&self, root: ExprId, conclusion: Conclusion) {
        let context = self.rules.state.get_create_context(root);
        self.rules.state.produce(&context, conclusion);
    }

    /// Run until no worker has visible work, or until interrupted.
    ///
    /// After an uninterrupted forward run every context is saturated.
    pub fn process(&self) -> SaturationResult<RuleStatistics> {
        let workers = self.pool.current_num_threads().max(1);
        let active_workers = AtomicUsize::new(0);
        let (report_tx, report_rx) = crossbeam_channel::unbounded();

        self.pool.scope(|scope| {
            for _ in 0..workers {
                let report_tx = report_tx.clone();
                let active_workers = &active_workers;
                scope.spawn(move |_| {
                    let statistics = self.work(active_workers);
                    let _ = report_tx.send(statistics);
                });
            }
        });
        drop(report_tx);

        let mut statistics = RuleStatistics::default();
        for worker in report_rx.try_iter() {
            statistics.merge(&worker);
        }

        if self.interrupt.is_interrupted() {
            tracing::info!(stage = self.stage, "saturation interrupted");
            return Err(self.interrupted());
        }
        if self.rules.mode == RuleMode::Apply {
            self.rules.state.mark_all_saturated();
        }
        tracing::debug!(
            stage = self.stage,
            mode = ?self.rules.mode,
            workers,
            contexts = statistics.contexts_drained(),
            conclusions = statistics.total_processed(),
            changed = statistics.total_changed(),
            rule_time_us = statistics.total_time().as_micros() as u64,
            slowest = statistics.slowest().map(ConclusionKind::name),
            "saturation pass finished"
        );
        Ok(statistics)
    }

    fn work(&self, active_workers: &AtomicUsize) -> RuleStatistics {
        let mut statistics = RuleStatistics::default();
        active_workers.fetch_add(1, Ordering::SeqCst);
        loop {
            if self.interrupt.is_interrupted() {
                active_workers.fetch_sub(1, Ordering::SeqCst);
                break;
            }
            if let Some(context) = self.rules.state.poll_for_context() {
                self.drain(&context, &mut statistics);
                continue;
            }
            active_workers.fetch_sub(1, Ordering::SeqCst);
            if !self.wait_for_work(active_workers) {
                break;
            }
            active_workers.fetch_add(1, Ordering::SeqCst);
        }
        statistics
    }

    /// `true` once an active context is visible, `false` at quiescence or
    /// interruption. The caller is not counted as active while waiting.
    fn wait_for_work(&self, active_workers: &AtomicUsize) -> bool {
        let mut spins = 0u32;
        loop {
            if self.interrupt.is_interrupted() {
                return false;
            }
            if self.rules.state.has_active_contexts() {
                return true;
            }
            // Producers queue contexts before leaving the count, so an
            // empty queue seen after a zero count is final.
            if active_workers.load(Ordering::SeqCst) == 0 && !self.rules.state.has_active_contexts() {
                return false;
            }
            if spins < 64 {
                spins += 1;
                std::hint::spin_loop();
            } else {
                std::thread::yield_now();
            }
        }
    }

    fn drain(&self, context: &Arc<Context>, statistics: &mut RuleStatistics) {
        statistics.contexts += 1;
        loop {
            while let Some(conclusion) = context.poll() {
                let started = Instant::now();
                let changed = self.rules.process(context, conclusion);
                statistics.record(conclusion.kind(), changed, started.elapsed());
            }
            context.try_deactivate();
            // A producer that enqueued after the last poll saw the context
            // active and did not queue it; take it back and keep draining.
            if !context.has_pending() || !context.try_activate() {
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Axiom, ClassExpression};

    fn pool(workers: usize) -> rayon::ThreadPool {
        rayon::ThreadPoolBuilder::new()
            .num_threads(workers)
            .build()
            .unwrap()
    }

    fn saturate(index: &OntologyIndex, workers: usize) -> SaturationState {
        let properties = PropertyHierarchy::build(index);
        let mut state = SaturationState::new(index.thing(), index.nothing());
        state.sync_with_index(index.len());
        let pool = pool(workers);
        let interrupt = InterruptHandle::new();
        let engine = SaturationEngine::new(
            index,
            &properties,
            &state,
            &pool,
            &interrupt,
            RuleMode::Apply,
            None,
            "test",
        );
        for class in index.classes() {
            engine.submit(class).unwrap();
        }
        engine.process().unwrap();
        state
    }

    fn indexed(axioms: &[Axiom]) -> OntologyIndex {
        let mut index = OntologyIndex::new();
        for axiom in axioms {
            index.add_axiom(axiom).unwrap();
        }
        index.commit();
        index
    }

    #[test]
    fn told_chain_is_closed() {
        let index = indexed(&[Axiom::sub_class_of("A", "B"), Axiom::sub_class_of("B", "C")]);
        let state = saturate(&index, 2);
        let a = state.context(index.class_id("A").unwrap()).unwrap();
        assert!(a.is_saturated());
        let c = index.class_id("C").unwrap();
        assert!(a.contains_subsumer(c));
        assert!(a.contains_subsumer(index.thing()));
    }

    #[test]
    fn existential_filler_context_is_created() {
        let index = indexed(&[
            Axiom::SubClassOf {
                sub: ClassExpression::class("A"),
                sup: ClassExpression::some("r", ClassExpression::class("B")),
            },
            Axiom::sub_class_of("B", "C"),
            Axiom::SubClassOf {
                sub: ClassExpression::some("r", ClassExpression::class("C")),
                sup: ClassExpression::class("D"),
            },
        ]);
        let state = saturate(&index, 3);
        let a = state.context(index.class_id("A").unwrap()).unwrap();
        assert!(a.contains_subsumer(index.class_id("D").unwrap()));
    }

    #[test]
    fn interrupted_run_resumes() {
        let index = indexed(&[Axiom::sub_class_of("A", "B")]);
        let properties = PropertyHierarchy::build(&index);
        let mut state = SaturationState::new(index.thing(), index.nothing());
        state.sync_with_index(index.len());
        let pool = pool(2);
        let interrupt = InterruptHandle::new();
        let engine = SaturationEngine::new(
            &index,
            &properties,
            &state,
            &pool,
            &interrupt,
            RuleMode::Apply,
            None,
            "test",
        );
        let a = index.class_id("A").unwrap();
        engine.submit(a).unwrap();
        interrupt.interrupt();
        assert!(matches!(
            engine.process(),
            Err(SaturationError::Interrupted { stage: "test" })
        ));
        assert!(matches!(engine.submit(a), Err(SaturationError::Interrupted { .. })));
        assert!(!state.context(a).unwrap().is_saturated());

        interrupt.clear();
        engine.process().unwrap();
        let context = state.context(a).unwrap();
        assert!(context.is_saturated());
        assert!(context.contains_subsumer(index.class_id("B").unwrap()));
    }

    #[test]
    fn statistics_count_every_conclusion() {
        let index = indexed(&[Axiom::sub_class_of("A", "B")]);
        let properties = PropertyHierarchy::build(&index);
        let mut state = SaturationState::new(index.thing(), index.nothing());
        state.sync_with_index(index.len());
        let pool = pool(1);
        let interrupt = InterruptHandle::new();
        let engine = SaturationEngine::new(
            &index,
            &properties,
            &state,
            &pool,
            &interrupt,
            RuleMode::Apply,
            None,
            "test",
        );
        engine.submit(index.class_id("A").unwrap()).unwrap();
        let statistics = engine.process().unwrap();
        // A: init, A, Thing, B
        assert_eq!(statistics.processed(ConclusionKind::ContextInit), 1);
        assert_eq!(statistics.changed(ConclusionKind::Subsumer), 3);
        assert!(statistics.contexts_drained() >= 1);
        assert_eq!(
            statistics.total_time(),
            ConclusionKind::ALL.into_iter().map(|k| statistics.time(k)).sum()
        );
    }

    #[test]
    fn merged_statistics_add_counts_and_timings() {
        let mut first = RuleStatistics::default();
        first.record(ConclusionKind::Subsumer, true, Duration::from_micros(30));
        first.record(ConclusionKind::Subsumer, false, Duration::from_micros(10));
        let mut second = RuleStatistics::default();
        second.record(ConclusionKind::BackwardLink, true, Duration::from_micros(5));
        second.record(ConclusionKind::Subsumer, true, Duration::from_micros(2));

        first.merge(&second);
        assert_eq!(first.processed(ConclusionKind::Subsumer), 3);
        assert_eq!(first.changed(ConclusionKind::Subsumer), 2);
        assert_eq!(first.time(ConclusionKind::Subsumer), Duration::from_micros(42));
        assert_eq!(first.time(ConclusionKind::BackwardLink), Duration::from_micros(5));
        assert_eq!(first.total_time(), Duration::from_micros(47));
        assert_eq!(first.slowest(), Some(ConclusionKind::Subsumer));
        assert_eq!(RuleStatistics::default().slowest(), None);
    }
}
