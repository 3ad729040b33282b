//! The tools bundle carried by every population tree.
//!
//! Bundles everything a generational run needs: the selection engine,
//! the crossover and mutation dispatchers, the normalization sequence,
//! the optimize/evaluate collaborators, and the exit criterion. The
//! bundle is attached to the root population behind an [`Arc`] and
//! inherited by derived populations, so operations like
//! [`Population::gen_offspring`](crate::population::Population::gen_offspring)
//! need no extra arguments.

use std::fmt;
use std::sync::Arc;

use crate::candidate::Genome;
use crate::crossover::Crossover;
use crate::exit::Exit;
use crate::mutation::Mutation;
use crate::normalization::Normalization;
use crate::pipeline::{FitnessEvaluator, PipelineConfig, StructureOptimizer};
use crate::selection::SelectionEngine;
use crate::telemetry::{NullSink, TelemetrySink};

/// Everything a population needs to evolve itself.
pub struct GaTools<G: Genome> {
    pub selection: SelectionEngine,
    pub crossover: Crossover<G>,
    pub mutation: Mutation<G>,
    pub normalization: Normalization<G>,
    pub optimizer: Arc<dyn StructureOptimizer<G>>,
    pub evaluator: Arc<dyn FitnessEvaluator<G>>,
    pub pipeline: PipelineConfig,
    pub exit: Exit<G>,
    pub telemetry: Arc<dyn TelemetrySink>,
}

impl<G: Genome> GaTools<G> {
    /// Bundles the required collaborators with default selection, an
    /// empty normalization sequence, and no early exit.
    pub fn new(
        crossover: Crossover<G>,
        mutation: Mutation<G>,
        optimizer: Arc<dyn StructureOptimizer<G>>,
        evaluator: Arc<dyn FitnessEvaluator<G>>,
    ) -> Self {
        Self {
            selection: SelectionEngine::default(),
            crossover,
            mutation,
            normalization: Normalization::default(),
            optimizer,
            evaluator,
            pipeline: PipelineConfig::default(),
            exit: Exit::Never,
            telemetry: Arc::new(NullSink),
        }
    }

    pub fn with_selection(mut self, selection: SelectionEngine) -> Self {
        self.selection = selection;
        self
    }

    pub fn with_normalization(mut self, normalization: Normalization<G>) -> Self {
        self.normalization = normalization;
        self
    }

    pub fn with_pipeline(mut self, pipeline: PipelineConfig) -> Self {
        self.pipeline = pipeline;
        self
    }

    pub fn with_exit(mut self, exit: Exit<G>) -> Self {
        self.exit = exit;
        self
    }

    pub fn with_telemetry(mut self, telemetry: Arc<dyn TelemetrySink>) -> Self {
        self.telemetry = telemetry;
        self
    }

    /// Wraps the bundle for attachment to a population tree.
    pub fn into_shared(self) -> Arc<Self> {
        Arc::new(self)
    }
}

impl<G: Genome> fmt::Debug for GaTools<G> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GaTools")
            .field("selection", &self.selection)
            .field("crossover_budget", &self.crossover.num_crossovers())
            .field("mutation_budget", &self.mutation.num_mutations())
            .field("pipeline", &self.pipeline)
            .field("exit", &self.exit)
            .finish_non_exhaustive()
    }
}
