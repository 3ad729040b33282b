//! Optimize and evaluate stages over whole populations.
//!
//! One [`Pipeline`] drives both per-candidate stages. A run snapshots the
//! population depth-first, hands clones to a rayon pool (or processes
//! them serially), supervises each item, and merges results back
//! positionally so the tree shape and member order are untouched.
//!
//! Supervision is per item: a collaborator error, a panic, or a timeout
//! marks that candidate failed and the run continues. A failed stage also
//! sets the stage-done marker, so the same work is not retried on later
//! passes. Items that already carry the stage's result are skipped
//! without touching the collaborator at all.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc};
use std::thread;
use std::time::Duration;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::cache::StateCache;
use crate::candidate::{Candidate, Fitness, Genome};
use crate::error::{ConfigError, EvaluateError, OptimizeError, PipelineError};
use crate::population::Population;

/// Refines a candidate's structure in place.
///
/// Must leave the fingerprint unchanged; see the stability contract on
/// [`Genome`].
pub trait StructureOptimizer<G: Genome>: Send + Sync {
    fn optimize(&self, candidate: &mut Candidate<G>) -> Result<(), OptimizeError>;
}

/// Scores a candidate, producing a scalar or raw vector fitness.
pub trait FitnessEvaluator<G: Genome>: Send + Sync {
    fn evaluate(&self, candidate: &Candidate<G>) -> Result<Fitness, EvaluateError>;
}

/// Execution knobs for both pipeline stages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Process candidates on a rayon pool; `false` runs them serially on
    /// the calling thread, without panic or timeout isolation.
    pub parallel: bool,
    /// Dedicated pool size; `None` uses the global rayon pool.
    pub num_threads: Option<usize>,
    /// Per-item wall-clock limit. Only enforced in parallel mode; an item
    /// over the limit is abandoned and marked failed.
    pub timeout: Option<Duration>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            parallel: true,
            num_threads: None,
            timeout: None,
        }
    }
}

impl PipelineConfig {
    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    pub fn with_num_threads(mut self, num_threads: usize) -> Self {
        self.num_threads = Some(num_threads);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.num_threads == Some(0) {
            return Err(ConfigError::PoolSize);
        }
        if self.timeout == Some(Duration::ZERO) {
            return Err(ConfigError::ZeroTimeout);
        }
        Ok(())
    }
}

/// Counts from one pipeline pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PipelineReport {
    /// Candidates the collaborator actually processed.
    pub processed: usize,
    /// Candidates skipped because they already carried the result.
    pub skipped: usize,
    /// Candidates marked failed during this pass.
    pub failed: usize,
}

/// Either stage, bundled with its collaborator so a worker can run it.
enum StageOp<G: Genome> {
    Optimize(Arc<dyn StructureOptimizer<G>>),
    Evaluate(Arc<dyn FitnessEvaluator<G>>),
}

impl<G: Genome> Clone for StageOp<G> {
    fn clone(&self) -> Self {
        match self {
            StageOp::Optimize(op) => StageOp::Optimize(op.clone()),
            StageOp::Evaluate(ev) => StageOp::Evaluate(ev.clone()),
        }
    }
}

impl<G: Genome> StageOp<G> {
    fn stage(&self) -> &'static str {
        match self {
            StageOp::Optimize(_) => "optimize",
            StageOp::Evaluate(_) => "evaluate",
        }
    }

    /// Whether this candidate already carries the stage's result.
    fn skip(&self, candidate: &Candidate<G>) -> bool {
        match self {
            StageOp::Optimize(_) => candidate.optimized(),
            StageOp::Evaluate(_) => candidate.failed() || candidate.fitness().is_some(),
        }
    }

    /// Marks the stage done, success or failure alike.
    fn mark_done(&self, candidate: &mut Candidate<G>) {
        if let StageOp::Optimize(_) = self {
            candidate.set_optimized(true);
        }
    }

    fn apply(&self, candidate: &mut Candidate<G>) -> Result<(), PipelineError> {
        match self {
            StageOp::Optimize(op) => op.optimize(candidate).map_err(PipelineError::from),
            StageOp::Evaluate(ev) => {
                let fitness = ev.evaluate(candidate)?;
                candidate.set_fitness(fitness);
                Ok(())
            }
        }
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum ItemOutcome {
    Skipped,
    Processed,
    Failed,
}

/// Stage executor with a fingerprint-keyed state cache and an optional
/// cancellation token.
pub struct Pipeline<G: Genome> {
    config: PipelineConfig,
    cache: StateCache<G>,
    cancel: Option<Arc<AtomicBool>>,
}

impl<G: Genome> Pipeline<G> {
    pub fn new(config: PipelineConfig) -> Self {
        Self {
            config,
            cache: StateCache::new(),
            cancel: None,
        }
    }

    /// Attaches a cooperative cancellation token. Once the token is set,
    /// not-yet-started items pass through untouched.
    pub fn with_cancel(mut self, token: Arc<AtomicBool>) -> Self {
        self.cancel = Some(token);
        self
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn cache(&self) -> &StateCache<G> {
        &self.cache
    }

    /// Runs the optimize stage over every member of `population`.
    pub fn optimize(
        &mut self,
        population: &mut Population<G>,
        optimizer: &Arc<dyn StructureOptimizer<G>>,
    ) -> PipelineReport {
        self.run(population, StageOp::Optimize(optimizer.clone()))
    }

    /// Runs the evaluate stage over every member of `population`.
    pub fn evaluate(
        &mut self,
        population: &mut Population<G>,
        evaluator: &Arc<dyn FitnessEvaluator<G>>,
    ) -> PipelineReport {
        self.run(population, StageOp::Evaluate(evaluator.clone()))
    }

    fn run(&mut self, population: &mut Population<G>, op: StageOp<G>) -> PipelineReport {
        // Known state first, so equal candidates skip redundant work.
        self.cache.apply(population);

        let snapshot: Vec<Candidate<G>> = population.iter().cloned().collect();
        let total = snapshot.len();
        let stage = op.stage();
        let timeout = self.config.timeout;
        let cancel = self.cancel.clone();

        let results: Vec<(Candidate<G>, ItemOutcome)> = if self.config.parallel {
            let work = |items: Vec<Candidate<G>>| {
                items
                    .into_par_iter()
                    .map(|candidate| {
                        if is_cancelled(&cancel) {
                            return (candidate, ItemOutcome::Skipped);
                        }
                        supervise(candidate, op.clone(), timeout, true)
                    })
                    .collect::<Vec<_>>()
            };
            match self.config.num_threads {
                Some(n) => match rayon::ThreadPoolBuilder::new().num_threads(n).build() {
                    Ok(pool) => pool.install(|| work(snapshot)),
                    Err(err) => {
                        log::warn!("dedicated pool unavailable ({err}), using the global pool");
                        work(snapshot)
                    }
                },
                None => work(snapshot),
            }
        } else {
            snapshot
                .into_iter()
                .map(|candidate| {
                    if is_cancelled(&cancel) {
                        (candidate, ItemOutcome::Skipped)
                    } else {
                        supervise(candidate, op.clone(), None, false)
                    }
                })
                .collect()
        };

        let mut report = PipelineReport::default();
        for (candidate, outcome) in &results {
            match outcome {
                ItemOutcome::Skipped => report.skipped += 1,
                ItemOutcome::Processed => report.processed += 1,
                ItemOutcome::Failed => report.failed += 1,
            }
            // Record every item so later passes and equal candidates in
            // other trees observe the same state.
            self.cache.record(candidate);
        }

        population.assign_members(results.into_iter().map(|(c, _)| c).collect());
        log::info!(
            "{stage}: {} processed, {} skipped, {} failed of {total}",
            report.processed,
            report.skipped,
            report.failed
        );
        report
    }
}

fn is_cancelled(token: &Option<Arc<AtomicBool>>) -> bool {
    token
        .as_ref()
        .is_some_and(|t| t.load(Ordering::Relaxed))
}

/// Runs one stage on one candidate under the failure-containment rules.
fn supervise<G: Genome>(
    mut candidate: Candidate<G>,
    op: StageOp<G>,
    timeout: Option<Duration>,
    isolate: bool,
) -> (Candidate<G>, ItemOutcome) {
    if op.skip(&candidate) {
        return (candidate, ItemOutcome::Skipped);
    }

    let result = if !isolate {
        op.apply(&mut candidate)
    } else if let Some(limit) = timeout {
        match run_with_timeout(candidate.clone(), op.clone(), limit) {
            Ok(done) => {
                candidate = done;
                Ok(())
            }
            Err(err) => Err(err),
        }
    } else {
        let attempt = panic::catch_unwind(AssertUnwindSafe({
            let op = op.clone();
            let mut scratch = candidate.clone();
            move || op.apply(&mut scratch).map(|()| scratch)
        }));
        match attempt {
            Ok(Ok(done)) => {
                candidate = done;
                Ok(())
            }
            Ok(Err(err)) => Err(err),
            Err(payload) => Err(PipelineError::Panicked(panic_message(payload.as_ref()))),
        }
    };

    match result {
        Ok(()) => {
            op.mark_done(&mut candidate);
            (candidate, ItemOutcome::Processed)
        }
        Err(err) => {
            log::error!("{} failed for '{}': {err}", op.stage(), candidate.name());
            candidate.set_failed(true);
            op.mark_done(&mut candidate);
            (candidate, ItemOutcome::Failed)
        }
    }
}

/// Runs the stage on a helper thread and waits at most `limit`.
///
/// On timeout the helper is abandoned (its late result, if any, is
/// dropped) and the caller's pre-stage candidate is marked failed.
fn run_with_timeout<G: Genome>(
    mut candidate: Candidate<G>,
    op: StageOp<G>,
    limit: Duration,
) -> Result<Candidate<G>, PipelineError> {
    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        let attempt = panic::catch_unwind(AssertUnwindSafe(|| {
            op.apply(&mut candidate).map(|()| candidate)
        }));
        let result = match attempt {
            Ok(inner) => inner,
            Err(payload) => Err(PipelineError::Panicked(panic_message(payload.as_ref()))),
        };
        // The receiver is gone after a timeout; nothing to do then.
        let _ = tx.send(result);
    });
    match rx.recv_timeout(limit) {
        Ok(result) => result,
        Err(_) => Err(PipelineError::TimedOut { limit }),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
