//! Weighted dispatch over named operator functions.
//!
//! Shared core of the crossover and mutation dispatchers: a list of
//! named functions plus per-function selection probabilities, validated
//! when the dispatcher is built — never at call time.

use rand::distr::weighted::WeightedIndex;
use rand::distr::Distribution;
use rand::rngs::StdRng;

use crate::error::ConfigError;

/// Tolerance when checking that weights sum to 1.
const WEIGHT_SUM_TOLERANCE: f64 = 1e-6;

pub(crate) struct WeightedOps<F> {
    ops: Vec<(String, F)>,
    weights: Vec<f64>,
    dist: WeightedIndex<f64>,
}

impl<F> WeightedOps<F> {
    /// Builds the dispatch table.
    ///
    /// `weights` must align 1:1 with `ops`, be finite and positive, and
    /// sum to 1; `None` means uniform probabilities.
    pub fn new(ops: Vec<(String, F)>, weights: Option<Vec<f64>>) -> Result<Self, ConfigError> {
        if ops.is_empty() {
            return Err(ConfigError::NoOperators);
        }
        let weights = match weights {
            Some(weights) => {
                if weights.len() != ops.len() {
                    return Err(ConfigError::WeightCountMismatch {
                        expected: ops.len(),
                        actual: weights.len(),
                    });
                }
                for (index, &weight) in weights.iter().enumerate() {
                    if !weight.is_finite() || weight <= 0.0 {
                        return Err(ConfigError::InvalidWeight { index, weight });
                    }
                }
                let sum: f64 = weights.iter().sum();
                if (sum - 1.0).abs() > WEIGHT_SUM_TOLERANCE {
                    return Err(ConfigError::WeightSum { sum });
                }
                weights
            }
            None => vec![1.0 / ops.len() as f64; ops.len()],
        };
        let dist = WeightedIndex::new(&weights)
            .map_err(|_| ConfigError::WeightSum { sum: weights.iter().sum() })?;
        Ok(Self { ops, weights, dist })
    }

    /// Draws one operator per the configured probabilities.
    pub fn sample(&self, rng: &mut StdRng) -> (&str, &F) {
        let (name, func) = &self.ops[self.dist.sample(rng)];
        (name, func)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.ops.iter().map(|(name, _)| name.as_str())
    }

    pub fn weights(&self) -> &[f64] {
        &self.weights
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    fn ops(n: usize) -> Vec<(String, usize)> {
        (0..n).map(|i| (format!("op{i}"), i)).collect()
    }

    #[test]
    fn test_empty_ops_rejected() {
        assert!(matches!(
            WeightedOps::<usize>::new(vec![], None),
            Err(ConfigError::NoOperators)
        ));
    }

    #[test]
    fn test_weight_count_mismatch_rejected() {
        assert!(matches!(
            WeightedOps::new(ops(2), Some(vec![1.0])),
            Err(ConfigError::WeightCountMismatch { expected: 2, actual: 1 })
        ));
    }

    #[test]
    fn test_weights_must_sum_to_one() {
        assert!(matches!(
            WeightedOps::new(ops(2), Some(vec![0.5, 0.6])),
            Err(ConfigError::WeightSum { .. })
        ));
    }

    #[test]
    fn test_nonpositive_weight_rejected() {
        assert!(matches!(
            WeightedOps::new(ops(2), Some(vec![1.0, 0.0])),
            Err(ConfigError::InvalidWeight { index: 1, .. })
        ));
    }

    #[test]
    fn test_uniform_default() {
        let table = WeightedOps::new(ops(4), None).expect("valid");
        assert_eq!(table.weights(), &[0.25; 4]);
    }

    #[test]
    fn test_weighted_dispatch_distribution() {
        // Declared 0.3/0.7 split must show up over a large seeded sample.
        let table = WeightedOps::new(ops(2), Some(vec![0.3, 0.7])).expect("valid");
        let mut rng = rand::rngs::StdRng::seed_from_u64(42);
        let n = 10_000;
        let mut counts = [0usize; 2];
        for _ in 0..n {
            let (_, &idx) = table.sample(&mut rng);
            counts[idx] += 1;
        }
        let observed = counts[1] as f64 / n as f64;
        assert!(
            (observed - 0.7).abs() < 0.02,
            "expected ~0.7, observed {observed}"
        );
    }
}
