//! Core candidate model.
//!
//! A [`Candidate`] is one evolvable unit of work: an opaque domain genome
//! plus the bookkeeping the engine needs — an identity hint, an optional
//! fitness value, the `optimized`/`failed` flags, and a content-derived
//! [`Fingerprint`] that defines semantic equality. Two candidates are the
//! *same* iff their fingerprints match, regardless of where they live in
//! memory; every deduplication and membership decision in the engine goes
//! through that test.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Content-derived equality key.
///
/// Distinguishes "same candidate" from "same object". Produced by
/// [`Genome::fingerprint`] and captured once at candidate construction.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Fingerprint(String);

impl Fingerprint {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The domain-specific content of a candidate.
///
/// The engine treats genomes as opaque: they are built by structure
/// builders, refined in place by structure optimizers, and scored by
/// fitness evaluators. The single obligation is a content fingerprint.
///
/// # Fingerprint stability
///
/// The fingerprint must be invariant under the refinement performed by a
/// [`StructureOptimizer`](crate::pipeline::StructureOptimizer): optimizing
/// a candidate changes *how good* its structure is, not *what it is*. The
/// state cache and all deduplication rely on this.
pub trait Genome: Clone + Send + Sync + 'static {
    /// Returns the content fingerprint of this genome.
    fn fingerprint(&self) -> Fingerprint;
}

/// A fitness value: a single scalar or a vector of raw components.
///
/// Evaluators may return either; normalization transforms collapse
/// vectors into scalars before selection runs. Higher is better once
/// normalized.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Fitness {
    Scalar(f64),
    Vector(Vec<f64>),
}

impl Fitness {
    /// Returns the scalar value, or `None` for vector fitness.
    pub fn scalar(&self) -> Option<f64> {
        match self {
            Fitness::Scalar(v) => Some(*v),
            Fitness::Vector(_) => None,
        }
    }

    /// Returns the raw components (a scalar is a one-element slice).
    pub fn components(&self) -> &[f64] {
        match self {
            Fitness::Scalar(v) => std::slice::from_ref(v),
            Fitness::Vector(vs) => vs,
        }
    }
}

impl From<f64> for Fitness {
    fn from(v: f64) -> Self {
        Fitness::Scalar(v)
    }
}

impl From<Vec<f64>> for Fitness {
    fn from(vs: Vec<f64>) -> Self {
        Fitness::Vector(vs)
    }
}

/// One evolvable unit of work tracked by the engine.
///
/// Lifecycle: created by a structure builder (or a bulk initializer) →
/// optionally optimized in place → evaluated (fitness attached) →
/// consumed by selection → eventually dropped from all population nodes.
/// A candidate may legitimately appear in several population nodes at
/// once; removal from one node never affects another.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Candidate<G> {
    name: String,
    fingerprint: Fingerprint,
    fitness: Option<Fitness>,
    optimized: bool,
    failed: bool,
    genome: G,
}

impl<G: Genome> Candidate<G> {
    /// Creates a fresh candidate: no fitness, not optimized, not failed.
    ///
    /// The fingerprint is captured here and never recomputed; see
    /// [`Genome`] for the stability contract.
    pub fn new(name: impl Into<String>, genome: G) -> Self {
        let fingerprint = genome.fingerprint();
        Self {
            name: name.into(),
            fingerprint,
            fitness: None,
            optimized: false,
            failed: false,
            genome,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    pub fn fingerprint(&self) -> &Fingerprint {
        &self.fingerprint
    }

    /// Semantic equality: fingerprint match, independent of identity.
    pub fn same(&self, other: &Self) -> bool {
        self.fingerprint == other.fingerprint
    }

    pub fn fitness(&self) -> Option<&Fitness> {
        self.fitness.as_ref()
    }

    /// The scalar fitness, if evaluated and already collapsed to one.
    pub fn scalar_fitness(&self) -> Option<f64> {
        self.fitness.as_ref().and_then(Fitness::scalar)
    }

    pub fn set_fitness(&mut self, fitness: impl Into<Fitness>) {
        self.fitness = Some(fitness.into());
    }

    pub fn clear_fitness(&mut self) {
        self.fitness = None;
    }

    pub fn optimized(&self) -> bool {
        self.optimized
    }

    pub fn set_optimized(&mut self, optimized: bool) {
        self.optimized = optimized;
    }

    pub fn failed(&self) -> bool {
        self.failed
    }

    pub fn set_failed(&mut self, failed: bool) {
        self.failed = failed;
    }

    pub fn genome(&self) -> &G {
        &self.genome
    }

    /// Mutable access for in-place structure refinement.
    ///
    /// The fingerprint captured at construction is deliberately left
    /// untouched; refinement must not change candidate identity.
    pub fn genome_mut(&mut self) -> &mut G {
        &mut self.genome
    }

    /// Recomputes the fingerprint from the genome.
    ///
    /// Used by the loader, where the genome is authoritative and the
    /// persisted fingerprint is only an audit record.
    pub(crate) fn rederive_fingerprint(&mut self) {
        self.fingerprint = self.genome.fingerprint();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq)]
    struct Tag(&'static str);

    impl Genome for Tag {
        fn fingerprint(&self) -> Fingerprint {
            Fingerprint::new(self.0)
        }
    }

    #[test]
    fn test_same_is_fingerprint_equality() {
        let a = Candidate::new("a", Tag("x"));
        let b = Candidate::new("b", Tag("x"));
        let c = Candidate::new("c", Tag("y"));
        assert!(a.same(&b), "distinct objects, same content");
        assert!(!a.same(&c));
    }

    #[test]
    fn test_fresh_candidate_state() {
        let c = Candidate::new("seed", Tag("x"));
        assert!(c.fitness().is_none());
        assert!(!c.optimized());
        assert!(!c.failed());
    }

    #[test]
    fn test_scalar_and_vector_fitness() {
        let mut c = Candidate::new("seed", Tag("x"));
        c.set_fitness(2.5);
        assert_eq!(c.scalar_fitness(), Some(2.5));

        c.set_fitness(vec![1.0, 2.0]);
        assert_eq!(c.scalar_fitness(), None);
        assert_eq!(c.fitness().map(Fitness::components), Some(&[1.0, 2.0][..]));
    }

    #[test]
    fn test_fingerprint_survives_genome_mutation() {
        let mut c = Candidate::new("seed", Tag("x"));
        *c.genome_mut() = Tag("refined");
        // Identity is captured at construction; refinement must not
        // change what the candidate is.
        assert_eq!(c.fingerprint().as_str(), "x");
    }
}
