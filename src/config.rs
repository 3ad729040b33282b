//! Run and tools configuration.
//!
//! [`RunConfig`] carries the run-shape knobs (population size,
//! generation budget, RNG seed). [`ToolsConfig`] is the serde-able
//! description of a tools bundle: operators referred to by name,
//! resolved eagerly against an [`OperatorRegistry`] by
//! [`ToolsConfig::build`]. Every name is checked up front, so a typo in
//! a config file fails before any structure work starts.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::candidate::Genome;
use crate::crossover::Crossover;
use crate::error::ConfigError;
use crate::exit::Exit;
use crate::mutation::Mutation;
use crate::normalization::Normalization;
use crate::pipeline::{FitnessEvaluator, PipelineConfig, StructureOptimizer};
use crate::registry::OperatorRegistry;
use crate::selection::SelectionEngine;
use crate::tools::GaTools;

/// Shape of one generational run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunConfig {
    /// Target size of each selected generation. Under-filling is allowed
    /// when the selection pool runs dry.
    pub population_size: usize,
    /// Hard generation budget; the run stops here even if no exit
    /// criterion ever fires.
    pub max_generations: usize,
    /// Seed for the selection RNG stream.
    pub seed: u64,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            population_size: 50,
            max_generations: 100,
            seed: 0,
        }
    }
}

impl RunConfig {
    pub fn new(population_size: usize, max_generations: usize) -> Self {
        Self {
            population_size,
            max_generations,
            ..Default::default()
        }
    }

    pub fn with_population_size(mut self, population_size: usize) -> Self {
        self.population_size = population_size;
        self
    }

    pub fn with_max_generations(mut self, max_generations: usize) -> Self {
        self.max_generations = max_generations;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.population_size == 0 {
            return Err(ConfigError::PopulationSize);
        }
        if self.max_generations == 0 {
            return Err(ConfigError::MaxGenerations);
        }
        Ok(())
    }
}

/// Named operators plus weights for one dispatcher.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperatorSet {
    /// Registry names, resolved at build time.
    pub operators: Vec<String>,
    /// Per-operator probabilities; `None` means uniform.
    #[serde(default)]
    pub weights: Option<Vec<f64>>,
    /// Per-round draw budget for the dispatcher.
    pub budget: usize,
}

impl OperatorSet {
    pub fn uniform(operators: Vec<String>, budget: usize) -> Self {
        Self {
            operators,
            weights: None,
            budget,
        }
    }
}

/// Serde-able exit criterion. The in-memory [`Exit::Custom`] predicate
/// has no config-file form.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum ExitConfig {
    Never,
    FitnessReached { target: f64 },
}

impl Default for ExitConfig {
    fn default() -> Self {
        ExitConfig::Never
    }
}

impl ExitConfig {
    fn build<G: Genome>(self) -> Exit<G> {
        match self {
            ExitConfig::Never => Exit::Never,
            ExitConfig::FitnessReached { target } => Exit::FitnessReached { target },
        }
    }
}

/// Serde-able description of a [`GaTools`] bundle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolsConfig {
    pub crossover: OperatorSet,
    pub mutation: OperatorSet,
    /// Normalization names, applied in this order.
    #[serde(default)]
    pub normalization: Vec<String>,
    #[serde(default)]
    pub selection: SelectionEngine,
    #[serde(default)]
    pub pipeline: PipelineConfig,
    #[serde(default)]
    pub exit: ExitConfig,
}

impl ToolsConfig {
    /// Resolves every operator name and assembles the bundle.
    ///
    /// Unknown names, bad weights, and invalid selection or pipeline
    /// settings all fail here, before any run starts.
    pub fn build<G: Genome>(
        &self,
        registry: &OperatorRegistry<G>,
        optimizer: Arc<dyn StructureOptimizer<G>>,
        evaluator: Arc<dyn FitnessEvaluator<G>>,
    ) -> Result<GaTools<G>, ConfigError> {
        self.selection.validate()?;
        self.pipeline.validate()?;

        let crossover_ops = self
            .crossover
            .operators
            .iter()
            .map(|name| Ok((name.clone(), registry.crossover(name)?)))
            .collect::<Result<Vec<_>, ConfigError>>()?;
        let crossover = Crossover::new(
            crossover_ops,
            self.crossover.weights.clone(),
            self.crossover.budget,
        )?;

        let mutation_ops = self
            .mutation
            .operators
            .iter()
            .map(|name| Ok((name.clone(), registry.mutation(name)?)))
            .collect::<Result<Vec<_>, ConfigError>>()?;
        let mutation = Mutation::new(
            mutation_ops,
            self.mutation.weights.clone(),
            self.mutation.budget,
        )?;

        let normalization_ops = self
            .normalization
            .iter()
            .map(|name| Ok((name.clone(), registry.normalization(name)?)))
            .collect::<Result<Vec<_>, ConfigError>>()?;

        Ok(GaTools::new(crossover, mutation, optimizer, evaluator)
            .with_selection(self.selection.clone())
            .with_normalization(Normalization::new(normalization_ops))
            .with_pipeline(self.pipeline.clone())
            .with_exit(self.exit.build()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::candidate::{Candidate, Fingerprint, Fitness};
    use crate::error::{EvaluateError, OptimizeError};

    #[derive(Debug, Clone)]
    struct Tag(String);

    impl Genome for Tag {
        fn fingerprint(&self) -> Fingerprint {
            Fingerprint::new(self.0.clone())
        }
    }

    struct NoopOptimizer;

    impl StructureOptimizer<Tag> for NoopOptimizer {
        fn optimize(&self, _: &mut Candidate<Tag>) -> Result<(), OptimizeError> {
            Ok(())
        }
    }

    struct LenEvaluator;

    impl FitnessEvaluator<Tag> for LenEvaluator {
        fn evaluate(&self, candidate: &Candidate<Tag>) -> Result<Fitness, EvaluateError> {
            Ok(Fitness::Scalar(candidate.genome().0.len() as f64))
        }
    }

    fn registry() -> OperatorRegistry<Tag> {
        let mut registry = OperatorRegistry::new();
        registry.register_crossover(
            "merge",
            Arc::new(|a: &Candidate<Tag>, b: &Candidate<Tag>, _: &mut _| {
                let tag = format!("{}{}", a.genome().0, b.genome().0);
                Ok(vec![Candidate::new(tag.clone(), Tag(tag))])
            }),
        );
        registry.register_mutation(
            "grow",
            Arc::new(|parent: &Candidate<Tag>, _: &mut _| {
                let tag = format!("{}+", parent.genome().0);
                Ok(Candidate::new(tag.clone(), Tag(tag)))
            }),
        );
        registry.register_normalization("shift_up", crate::normalization::shift_up());
        registry
    }

    fn tools_config() -> ToolsConfig {
        ToolsConfig {
            crossover: OperatorSet::uniform(vec!["merge".into()], 3),
            mutation: OperatorSet::uniform(vec!["grow".into()], 2),
            normalization: vec!["shift_up".into()],
            selection: SelectionEngine::default(),
            pipeline: PipelineConfig::default(),
            exit: ExitConfig::FitnessReached { target: 10.0 },
        }
    }

    #[test]
    fn test_run_config_validation() {
        assert!(RunConfig::default().validate().is_ok());
        assert!(matches!(
            RunConfig::default().with_population_size(0).validate(),
            Err(ConfigError::PopulationSize)
        ));
        assert!(matches!(
            RunConfig::default().with_max_generations(0).validate(),
            Err(ConfigError::MaxGenerations)
        ));
    }

    #[test]
    fn test_build_resolves_all_names() {
        let tools = tools_config()
            .build(&registry(), Arc::new(NoopOptimizer), Arc::new(LenEvaluator))
            .expect("all names registered");
        assert_eq!(tools.crossover.num_crossovers(), 3);
        assert_eq!(tools.mutation.num_mutations(), 2);
        assert_eq!(tools.normalization.names().count(), 1);
    }

    #[test]
    fn test_unknown_operator_rejected_before_run() {
        let mut config = tools_config();
        config.mutation.operators.push("shrink".into());
        let err = config
            .build(&registry(), Arc::new(NoopOptimizer), Arc::new(LenEvaluator))
            .unwrap_err();
        assert!(matches!(
            err,
            ConfigError::UnknownOperator {
                kind: "mutation",
                ..
            }
        ));
    }

    #[test]
    fn test_bad_weights_rejected_at_build() {
        let mut config = tools_config();
        config.crossover.weights = Some(vec![0.4, 0.4]);
        let err = config
            .build(&registry(), Arc::new(NoopOptimizer), Arc::new(LenEvaluator))
            .unwrap_err();
        assert!(matches!(err, ConfigError::WeightCountMismatch { .. }));
    }

    #[test]
    fn test_config_round_trips_through_json() {
        let config = tools_config();
        let json = serde_json::to_string(&config).expect("serializable");
        let back: ToolsConfig = serde_json::from_str(&json).expect("deserializable");
        assert_eq!(back, config);
    }
}
