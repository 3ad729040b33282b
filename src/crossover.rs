//! Crossover dispatcher.
//!
//! Wraps a weighted set of named recombination functions. Each call
//! draws parent pairs from the selection engine, dispatches every pair
//! to one function chosen per the configured probabilities, and collects
//! the offspring. Builder failures are contained to the pair they
//! occurred on: logged with the parent identities and the operator name,
//! then the batch continues. Offspring already semantically present in
//! the input population are removed at the end — only genuinely novel
//! structures are returned.

use std::sync::Arc;

use rand::rngs::StdRng;

use crate::candidate::{Candidate, Genome};
use crate::dispatch::WeightedOps;
use crate::error::{BuildError, ConfigError};
use crate::population::{DuplicatePolicy, Population};
use crate::selection::SelectionEngine;
use crate::telemetry::SelectionTally;

/// A recombination function: two parents in, zero or more offspring out.
///
/// Must not mutate its arguments; offspring are fresh candidates.
pub type CrossoverFn<G> = Arc<
    dyn Fn(&Candidate<G>, &Candidate<G>, &mut StdRng) -> Result<Vec<Candidate<G>>, BuildError>
        + Send
        + Sync,
>;

/// What one crossover round produced.
pub struct CrossoverOutcome<G: Genome> {
    /// Novel offspring only (input-population matches already removed).
    pub offspring: Population<G>,
    /// Complete parent-participation tally, zero counts included.
    pub tally: SelectionTally,
    /// Builder failures that were contained and logged.
    pub failures: usize,
}

/// Weighted dispatcher over named crossover functions.
pub struct Crossover<G: Genome> {
    ops: WeightedOps<CrossoverFn<G>>,
    num_crossovers: usize,
}

impl<G: Genome> Crossover<G> {
    /// Builds the dispatcher.
    ///
    /// `weights` must align 1:1 with `ops` and sum to 1 (`None` =
    /// uniform); violations are a [`ConfigError`] here, never a call-time
    /// surprise. `num_crossovers` is the per-round budget of parent
    /// pairs drawn.
    pub fn new(
        ops: Vec<(String, CrossoverFn<G>)>,
        weights: Option<Vec<f64>>,
        num_crossovers: usize,
    ) -> Result<Self, ConfigError> {
        Ok(Self {
            ops: WeightedOps::new(ops, weights)?,
            num_crossovers,
        })
    }

    pub fn num_crossovers(&self) -> usize {
        self.num_crossovers
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

    /// Runs one crossover round over `population`.
    ///
    /// Draws up to the configured budget of parent pairs (fewer when the
    /// pool is exhausted first — never an error), accumulates all
    /// offspring without filtering, then subtracts the input population
    /// so only novel offspring remain.
    pub fn cross(
        &self,
        population: &Population<G>,
        selection: &SelectionEngine,
        rng: &mut StdRng,
    ) -> CrossoverOutcome<G> {
        let mut raw = Population::new();
        let mut tally = SelectionTally::new();
        let mut failures = 0;

        let pairs: Vec<_> = selection
            .select_parents(population, rng)
            .take(self.num_crossovers)
            .collect();
        for (number, (a, b)) in pairs.into_iter().enumerate() {
            log::debug!(
                "crossover {}/{}: '{}' x '{}'",
                number + 1,
                self.num_crossovers,
                a.name(),
                b.name()
            );
            tally.record(&a);
            tally.record(&b);

            let (op_name, op) = self.ops.sample(rng);
            match op(&a, &b, rng) {
                Ok(children) => raw.add_members(children, DuplicatePolicy::Allow),
                Err(err) => {
                    failures += 1;
                    log::error!(
                        "crossover '{op_name}' failed on parents '{}' and '{}': {err}",
                        a.name(),
                        b.name()
                    );
                }
            }
        }

        tally.fill_missing(population);
        CrossoverOutcome {
            offspring: raw.difference(population),
            tally,
            failures,
        }
    }
}
