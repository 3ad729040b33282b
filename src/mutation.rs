//! Mutation dispatcher.
//!
//! Same pattern as the crossover dispatcher, over single candidates: a
//! weighted set of named perturbation functions, one drawn per selected
//! member, failures contained per draw, and the resulting mutants
//! deduplicated against the input population before being returned.

use std::sync::Arc;

use rand::rngs::StdRng;

use crate::candidate::{Candidate, Genome};
use crate::dispatch::WeightedOps;
use crate::error::{BuildError, ConfigError};
use crate::population::{DuplicatePolicy, Population};
use crate::selection::{MemberKind, SelectionEngine};
use crate::telemetry::SelectionTally;

/// A perturbation function: one candidate in, one fresh mutant out.
///
/// Must not mutate its argument; the mutant is a new candidate.
pub type MutationFn<G> =
    Arc<dyn Fn(&Candidate<G>, &mut StdRng) -> Result<Candidate<G>, BuildError> + Send + Sync>;

/// What one mutation round produced.
pub struct MutationOutcome<G: Genome> {
    /// Novel mutants only (input-population matches already removed).
    pub mutants: Population<G>,
    /// Complete participation tally, zero counts included.
    pub tally: SelectionTally,
    /// Builder failures that were contained and logged.
    pub failures: usize,
}

/// Weighted dispatcher over named mutation functions.
pub struct Mutation<G: Genome> {
    ops: WeightedOps<MutationFn<G>>,
    num_mutations: usize,
}

impl<G: Genome> Mutation<G> {
    /// Builds the dispatcher; weight rules are identical to
    /// [`Crossover::new`](crate::crossover::Crossover::new).
    pub fn new(
        ops: Vec<(String, MutationFn<G>)>,
        weights: Option<Vec<f64>>,
        num_mutations: usize,
    ) -> Result<Self, ConfigError> {
        Ok(Self {
            ops: WeightedOps::new(ops, weights)?,
            num_mutations,
        })
    }

    pub fn num_mutations(&self) -> usize {
        self.num_mutations
    }

    /// Registered operator names, in configuration order.
    pub fn operator_names(&self) -> impl Iterator<Item = &str> {
        self.ops.names()
    }

    /// Selection probability per operator, aligned with
    /// [`operator_names`](Self::operator_names).
    pub fn operator_weights(&self) -> &[f64] {
        self.ops.weights()
    }

    /// Runs one mutation round over `population`.
    pub fn mutate(
        &self,
        population: &Population<G>,
        selection: &SelectionEngine,
        rng: &mut StdRng,
    ) -> MutationOutcome<G> {
        let mut raw = Population::new();
        let mut tally = SelectionTally::new();
        let mut failures = 0;

        let targets: Vec<_> = selection
            .select_members(population, MemberKind::Mutation, rng)
            .take(self.num_mutations)
            .collect();
        for target in targets {
            tally.record(&target);
            let (op_name, op) = self.ops.sample(rng);
            match op(&target, rng) {
                Ok(mutant) => raw.add_members([mutant], DuplicatePolicy::Allow),
                Err(err) => {
                    failures += 1;
                    log::error!("mutation '{op_name}' failed on '{}': {err}", target.name());
                }
            }
        }

        tally.fill_missing(population);
        MutationOutcome {
            mutants: raw.difference(population),
            tally,
            failures,
        }
    }
}
