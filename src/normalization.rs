//! Fitness normalization.
//!
//! Unlike crossover and mutation, normalization is not selection-driven:
//! it runs a configured, *ordered* list of transforms over the entire
//! population's fitness values, each transform mutating fitness in
//! place. Order of application is significant and preserved exactly as
//! configured — e.g. `combine` must collapse raw vectors to scalars
//! before `shift_up` can translate them.
//!
//! Failed and unevaluated members are passed over by every built-in.

use std::sync::Arc;

use crate::candidate::{Candidate, Fitness, Genome};
use crate::population::Population;

/// A fitness transform applied to the whole population in place.
pub type NormalizationFn<G> = Arc<dyn Fn(&mut Population<G>) + Send + Sync>;

/// Ordered sequence of named fitness transforms.
pub struct Normalization<G: Genome> {
    ops: Vec<(String, NormalizationFn<G>)>,
}

impl<G: Genome> Normalization<G> {
    /// An empty sequence is valid and leaves fitness untouched.
    pub fn new(ops: Vec<(String, NormalizationFn<G>)>) -> Self {
        Self { ops }
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.ops.iter().map(|(name, _)| name.as_str())
    }

    /// Applies every transform, in configuration order.
    pub fn normalize(&self, population: &mut Population<G>) {
        for (name, op) in &self.ops {
            log::debug!("applying normalization '{name}'");
            op(population);
        }
    }
}

impl<G: Genome> Default for Normalization<G> {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

fn for_each_scalar<G: Genome>(population: &mut Population<G>, f: &mut impl FnMut(f64) -> f64) {
    population.for_each_member_mut(&mut |candidate: &mut Candidate<G>| {
        if candidate.failed() {
            return;
        }
        if let Some(value) = candidate.scalar_fitness() {
            candidate.set_fitness(f(value));
        }
    });
}

/// Collapses vector fitness into one scalar:
/// `sum(coefficient_i * component_i ^ exponent_i)`.
///
/// Components are zipped with the coefficient/exponent lists; members
/// whose fitness is already scalar are left as they are.
pub fn combine<G: Genome>(coefficients: Vec<f64>, exponents: Vec<f64>) -> NormalizationFn<G> {
    Arc::new(move |population| {
        population.for_each_member_mut(&mut |candidate: &mut Candidate<G>| {
            if candidate.failed() {
                return;
            }
            if let Some(Fitness::Vector(components)) = candidate.fitness() {
                let scalar: f64 = components
                    .iter()
                    .zip(coefficients.iter().zip(&exponents))
                    .map(|(&x, (&c, &p))| c * x.powf(p))
                    .sum();
                candidate.set_fitness(scalar);
            }
        });
    })
}

/// Translates scalar fitness so the population minimum becomes 1.
///
/// Leaves the population untouched when every value is already positive.
pub fn shift_up<G: Genome>() -> NormalizationFn<G> {
    Arc::new(|population| {
        let minimum = population
            .iter()
            .filter(|c| !c.failed())
            .filter_map(Candidate::scalar_fitness)
            .fold(f64::INFINITY, f64::min);
        if !minimum.is_finite() || minimum > 0.0 {
            return;
        }
        let shift = 1.0 - minimum;
        for_each_scalar(population, &mut |value| value + shift);
    })
}

/// Replaces scalar fitness `x` with `1/x`, turning cost-like raw values
/// into higher-is-better ones. Zero values are passed over.
pub fn invert<G: Genome>() -> NormalizationFn<G> {
    Arc::new(|population| {
        for_each_scalar(population, &mut |value| {
            if value == 0.0 {
                value
            } else {
                1.0 / value
            }
        });
    })
}
