//! Name-to-operator bindings.
//!
//! Configuration files refer to operators by name; the registry is the
//! explicit object those names resolve against. It is always passed by
//! reference where needed, never ambient state, so two runs in one
//! process can use disjoint operator sets.

use std::collections::HashMap;

use crate::candidate::Genome;
use crate::crossover::CrossoverFn;
use crate::error::ConfigError;
use crate::mutation::MutationFn;
use crate::normalization::NormalizationFn;

/// Registered crossover, mutation, and normalization operators, keyed
/// by name.
pub struct OperatorRegistry<G: Genome> {
    crossovers: HashMap<String, CrossoverFn<G>>,
    mutations: HashMap<String, MutationFn<G>>,
    normalizations: HashMap<String, NormalizationFn<G>>,
}

impl<G: Genome> Default for OperatorRegistry<G> {
    fn default() -> Self {
        Self {
            crossovers: HashMap::new(),
            mutations: HashMap::new(),
            normalizations: HashMap::new(),
        }
    }
}

impl<G: Genome> OperatorRegistry<G> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a crossover operator, replacing any previous binding of
    /// the same name.
    pub fn register_crossover(&mut self, name: impl Into<String>, op: CrossoverFn<G>) -> &mut Self {
        self.crossovers.insert(name.into(), op);
        self
    }

    pub fn register_mutation(&mut self, name: impl Into<String>, op: MutationFn<G>) -> &mut Self {
        self.mutations.insert(name.into(), op);
        self
    }

    pub fn register_normalization(
        &mut self,
        name: impl Into<String>,
        op: NormalizationFn<G>,
    ) -> &mut Self {
        self.normalizations.insert(name.into(), op);
        self
    }

    pub fn crossover(&self, name: &str) -> Result<CrossoverFn<G>, ConfigError> {
        self.crossovers
            .get(name)
            .cloned()
            .ok_or_else(|| ConfigError::UnknownOperator {
                kind: "crossover",
                name: name.to_string(),
            })
    }

    pub fn mutation(&self, name: &str) -> Result<MutationFn<G>, ConfigError> {
        self.mutations
            .get(name)
            .cloned()
            .ok_or_else(|| ConfigError::UnknownOperator {
                kind: "mutation",
                name: name.to_string(),
            })
    }

    pub fn normalization(&self, name: &str) -> Result<NormalizationFn<G>, ConfigError> {
        self.normalizations
            .get(name)
            .cloned()
            .ok_or_else(|| ConfigError::UnknownOperator {
                kind: "normalization",
                name: name.to_string(),
            })
    }
}
