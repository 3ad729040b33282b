//! Generational evolutionary engine for expensive, failure-prone
//! candidate pipelines.
//!
//! The engine evolves a population of opaque domain genomes through
//! crossover, mutation, structure optimization, fitness evaluation, and
//! selection. It was built for domains where producing and scoring a
//! candidate is costly and can legitimately fail (structure refinement
//! diverges, a scoring routine crashes), so the core design commitments
//! are:
//!
//! - **Semantic identity.** Every candidate carries a content-derived
//!   fingerprint; equality, deduplication, and the work-sharing cache
//!   all key on it, never on object identity.
//! - **Failure containment.** An operator or pipeline failure is scoped
//!   to the one candidate it occurred on: the candidate is marked
//!   failed, the incident is logged, and the run continues.
//! - **Hierarchical populations.** A population is a tree of member
//!   lists with a canonical depth-first order; generated subsets
//!   (offspring, mutants) are populations themselves.
//! - **Pluggable everything.** Selection strategies are closed enums;
//!   crossover/mutation/normalization operators are named functions
//!   dispatched by configured probabilities; structure optimization and
//!   fitness evaluation are traits implemented by the caller.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use evoforge::{
//!     Candidate, Crossover, CrossoverFn, Exit, Fingerprint, Fitness, GaRunner,
//!     GaTools, Genome, Mutation, MutationFn, Population, RunConfig,
//! };
//! use evoforge::pipeline::{FitnessEvaluator, StructureOptimizer};
//! use evoforge::error::{EvaluateError, OptimizeError};
//!
//! #[derive(Clone)]
//! struct Bits(Vec<bool>);
//!
//! impl Genome for Bits {
//!     fn fingerprint(&self) -> Fingerprint {
//!         Fingerprint::new(
//!             self.0.iter().map(|b| if *b { '1' } else { '0' }).collect::<String>(),
//!         )
//!     }
//! }
//!
//! struct Noop;
//! impl StructureOptimizer<Bits> for Noop {
//!     fn optimize(&self, _: &mut Candidate<Bits>) -> Result<(), OptimizeError> {
//!         Ok(())
//!     }
//! }
//!
//! struct OneCount;
//! impl FitnessEvaluator<Bits> for OneCount {
//!     fn evaluate(&self, c: &Candidate<Bits>) -> Result<Fitness, EvaluateError> {
//!         Ok(Fitness::Scalar(c.genome().0.iter().filter(|b| **b).count() as f64))
//!     }
//! }
//!
//! # fn main() -> Result<(), evoforge::error::ConfigError> {
//! let splice: CrossoverFn<Bits> = Arc::new(|a, b, _| {
//!     let cut = a.genome().0.len() / 2;
//!     let mut bits = a.genome().0[..cut].to_vec();
//!     bits.extend_from_slice(&b.genome().0[cut..]);
//!     Ok(vec![Candidate::new("spliced", Bits(bits))])
//! });
//! let flip: MutationFn<Bits> = Arc::new(|p, rng| {
//!     use rand::Rng;
//!     let mut bits = p.genome().0.clone();
//!     let i = rng.random_range(0..bits.len());
//!     bits[i] = !bits[i];
//!     Ok(Candidate::new("flipped", Bits(bits)))
//! });
//!
//! let crossover = Crossover::new(vec![("splice".into(), splice)], None, 10)?;
//! let mutation = Mutation::new(vec![("flip".into(), flip)], None, 5)?;
//!
//! let tools = GaTools::new(crossover, mutation, Arc::new(Noop), Arc::new(OneCount))
//!     .with_exit(Exit::FitnessReached { target: 16.0 })
//!     .into_shared();
//! let seed = Population::from_candidates(
//!     (0..8).map(|i| Candidate::new(format!("seed_{i}"), Bits(vec![i % 2 == 0; 16]))),
//! )
//! .with_tools(tools);
//!
//! let result = GaRunner::new(RunConfig::new(20, 100).with_seed(42)).run(seed)?;
//! println!(
//!     "best after {} generations: {:?}",
//!     result.generations,
//!     result.fitness_history.last(),
//! );
//! # Ok(())
//! # }
//! ```

pub mod cache;
pub mod candidate;
pub mod config;
pub mod crossover;
mod dispatch;
pub mod error;
pub mod exit;
pub mod mutation;
pub mod normalization;
pub mod persist;
pub mod pipeline;
pub mod population;
pub mod registry;
pub mod runner;
pub mod selection;
pub mod telemetry;
pub mod tools;

pub use candidate::{Candidate, Fingerprint, Fitness, Genome};
pub use config::{ExitConfig, OperatorSet, RunConfig, ToolsConfig};
pub use crossover::{Crossover, CrossoverFn, CrossoverOutcome};
pub use error::{
    BuildError, ConfigError, EvaluateError, OptimizeError, PersistError, PipelineError,
};
pub use exit::Exit;
pub use mutation::{Mutation, MutationFn, MutationOutcome};
pub use normalization::{Normalization, NormalizationFn};
pub use persist::{dump, load, LoadMode};
pub use pipeline::{
    FitnessEvaluator, Pipeline, PipelineConfig, PipelineReport, StructureOptimizer,
};
pub use population::{DuplicatePolicy, Population};
pub use registry::OperatorRegistry;
pub use runner::{GaRunner, RunResult};
pub use selection::{MemberKind, MemberSelection, ParentSelection, SelectionEngine};
pub use telemetry::{LogSink, NullSink, SelectionTally, TelemetrySink};
pub use tools::GaTools;
