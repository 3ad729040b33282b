//! Generational driver.
//!
//! [`GaRunner`] owns the generational loop; everything problem-specific
//! lives in the [`GaTools`](crate::tools::GaTools) bundle attached to
//! the seed population. The loop per generation:
//!
//! 1. generate offspring and mutants from the current population,
//! 2. merge them in flat and collapse semantic duplicates, so the
//!    pipelines see each structure once,
//! 3. optimize, then evaluate (stage flags skip members processed in
//!    earlier generations),
//! 4. purge failed members and normalize fitness,
//! 5. select the next generation up to `population_size` (under-filling
//!    is allowed when the pool runs dry),
//! 6. check the exit criterion.
//!
//! The loop ends at the generation budget, on exit, or on cooperative
//! cancellation. Selection reproducibility comes from the seeded RNG
//! stream; parallel pipeline completion order is deliberately not part
//! of that contract.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::candidate::{Candidate, Genome};
use crate::config::RunConfig;
use crate::error::ConfigError;
use crate::pipeline::Pipeline;
use crate::population::{DuplicatePolicy, Population};
use crate::selection::MemberKind;
use crate::telemetry::SelectionTally;

/// Outcome of one generational run.
#[derive(Debug)]
pub struct RunResult<G: Genome> {
    /// The final generation, tools still attached.
    pub population: Population<G>,
    /// Completed generations (0 when cancelled before the first one).
    pub generations: usize,
    /// The exit criterion fired before the generation budget ran out.
    pub stopped_by_exit: bool,
    /// The cancellation token was observed set.
    pub cancelled: bool,
    /// Failed members purged over the whole run (each candidate counted
    /// once, whichever stage failed it) plus contained operator failures.
    pub total_failed: usize,
    /// Best scalar fitness after each evaluation pass, initial seed
    /// evaluation included.
    pub fitness_history: Vec<f64>,
}

/// Drives the generational loop over a seeded population.
#[derive(Debug, Clone)]
pub struct GaRunner {
    config: RunConfig,
}

impl GaRunner {
    pub fn new(config: RunConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    /// Runs to exit or the generation budget.
    pub fn run<G: Genome>(&self, seed: Population<G>) -> Result<RunResult<G>, ConfigError> {
        self.run_with_cancel(seed, None)
    }

    /// Like [`run`](Self::run), with a cooperative cancellation token.
    ///
    /// A set token stops the loop at the next generation boundary and
    /// stops the pipelines from dispatching new items; in-flight items
    /// finish or time out first.
    pub fn run_with_cancel<G: Genome>(
        &self,
        seed: Population<G>,
        cancel: Option<Arc<AtomicBool>>,
    ) -> Result<RunResult<G>, ConfigError> {
        self.config.validate()?;
        if !seed.has_tools() {
            return Err(ConfigError::MissingTools);
        }
        let tools = seed.tools();

        let mut rng = StdRng::seed_from_u64(self.config.seed);
        let mut pipeline = Pipeline::new(tools.pipeline.clone());
        if let Some(token) = &cancel {
            pipeline = pipeline.with_cancel(token.clone());
        }

        let mut population = seed;
        let mut total_failed = 0;
        let mut fitness_history = Vec::new();

        // Seed pass: members may arrive in any state; the stage flags
        // make this a no-op for already-processed ones.
        population.remove_duplicates(true);
        population.optimize_members(&mut pipeline);
        population.evaluate_members(&mut pipeline);
        total_failed += population.remove_failures();
        population.normalize();
        record_best(&population, &mut fitness_history);
        log::info!(
            "seed pass done: {} members, best {:?}",
            population.len(),
            fitness_history.last()
        );

        let mut generations = 0;
        let mut stopped_by_exit = false;
        let mut cancelled = is_cancelled(&cancel);

        while !cancelled && generations < self.config.max_generations && !population.is_empty() {
            let offspring = population.gen_offspring(&mut rng);
            tools.telemetry.record("crossover", &offspring.tally);
            total_failed += offspring.failures;

            let mutants = population.gen_mutants(&mut rng);
            tools.telemetry.record("mutation", &mutants.tally);
            total_failed += mutants.failures;

            let new_members: Vec<Candidate<G>> = offspring
                .offspring
                .iter()
                .chain(mutants.mutants.iter())
                .cloned()
                .collect();
            population.add_members(new_members, DuplicatePolicy::Allow);
            population.remove_duplicates(true);

            population.optimize_members(&mut pipeline);
            population.evaluate_members(&mut pipeline);
            total_failed += population.remove_failures();
            population.normalize();

            population = select_generation(&population, self.config.population_size, &mut rng);
            generations += 1;
            record_best(&population, &mut fitness_history);
            log::info!(
                "generation {generations}/{}: {} members, best {:?}",
                self.config.max_generations,
                population.len(),
                fitness_history.last()
            );

            cancelled = is_cancelled(&cancel);
            if population.should_stop() {
                stopped_by_exit = true;
                break;
            }
        }

        Ok(RunResult {
            population,
            generations,
            stopped_by_exit,
            cancelled,
            total_failed,
            fitness_history,
        })
    }
}

fn is_cancelled(token: &Option<Arc<AtomicBool>>) -> bool {
    token
        .as_ref()
        .is_some_and(|t| t.load(Ordering::Relaxed))
}

/// Draws the next generation from the generational stream and reports
/// the participation tally.
fn select_generation<G: Genome>(
    population: &Population<G>,
    size: usize,
    rng: &mut StdRng,
) -> Population<G> {
    let tools = population.tools();
    let selected: Vec<Candidate<G>> = population
        .select_members(MemberKind::Generational, rng)
        .take(size)
        .collect();

    let mut tally = SelectionTally::new();
    for candidate in &selected {
        tally.record(candidate);
    }
    tally.fill_missing(population);
    tools.telemetry.record("generational", &tally);

    Population::from_candidates(selected).with_tools(tools)
}

fn record_best<G: Genome>(population: &Population<G>, history: &mut Vec<f64>) {
    let best = population
        .iter()
        .filter(|c| !c.failed())
        .filter_map(Candidate::scalar_fitness)
        .fold(f64::NEG_INFINITY, f64::max);
    if best.is_finite() {
        history.push(best);
    }
}
