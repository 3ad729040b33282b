//! Exit criteria.
//!
//! Checked by the driver once per generation, after the next generation
//! has been selected. The default never stops on its own — the driver's
//! generation budget is the fallback termination condition.

use std::fmt;
use std::sync::Arc;

use crate::candidate::Genome;
use crate::population::Population;

/// When the generational loop should stop early.
#[derive(Clone)]
pub enum Exit<G: Genome> {
    /// Never stop; rely on the generation budget.
    Never,
    /// Stop once any healthy member reaches the target scalar fitness.
    FitnessReached { target: f64 },
    /// Arbitrary predicate over the population.
    Custom(Arc<dyn Fn(&Population<G>) -> bool + Send + Sync>),
}

impl<G: Genome> Exit<G> {
    pub fn should_stop(&self, population: &Population<G>) -> bool {
        match self {
            Exit::Never => false,
            Exit::FitnessReached { target } => population
                .iter()
                .filter(|c| !c.failed())
                .filter_map(|c| c.scalar_fitness())
                .any(|f| f >= *target),
            Exit::Custom(predicate) => predicate(population),
        }
    }
}

impl<G: Genome> Default for Exit<G> {
    fn default() -> Self {
        Exit::Never
    }
}

impl<G: Genome> fmt::Debug for Exit<G> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Exit::Never => f.write_str("Exit::Never"),
            Exit::FitnessReached { target } => {
                write!(f, "Exit::FitnessReached {{ target: {target} }}")
            }
            Exit::Custom(_) => f.write_str("Exit::Custom(..)"),
        }
    }
}
