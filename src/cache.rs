//! Fingerprint-keyed candidate state cache.
//!
//! Parallel pipeline workers operate on private clones, so a candidate
//! that was just optimized or evaluated may have semantically-equal
//! twins elsewhere (a parent pool, an offspring pool, another subtree)
//! still carrying stale state. The cache closes that gap: after each
//! pipeline drain the coordinating thread records the latest known state
//! per fingerprint, and applies it to any equal candidate the next time
//! a population passes through. Updates happen only on the coordinating
//! thread — no cross-worker shared mutation, no locks.

use std::collections::HashMap;

use crate::candidate::{Candidate, Fingerprint, Fitness, Genome};
use crate::population::Population;

/// Latest known state of one candidate identity.
#[derive(Debug, Clone)]
pub struct CachedState<G> {
    /// The genome as last seen — carries refined structure forward to
    /// equal candidates that were never themselves optimized.
    pub genome: G,
    pub fitness: Option<Fitness>,
    pub optimized: bool,
    pub failed: bool,
}

/// Maps fingerprints to the latest known candidate state.
pub struct StateCache<G: Genome> {
    states: HashMap<Fingerprint, CachedState<G>>,
}

impl<G: Genome> Default for StateCache<G> {
    fn default() -> Self {
        Self {
            states: HashMap::new(),
        }
    }
}

impl<G: Genome> StateCache<G> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records `candidate`'s current state, replacing anything older.
    pub fn record(&mut self, candidate: &Candidate<G>) {
        self.states.insert(
            candidate.fingerprint().clone(),
            CachedState {
                genome: candidate.genome().clone(),
                fitness: candidate.fitness().cloned(),
                optimized: candidate.optimized(),
                failed: candidate.failed(),
            },
        );
    }

    pub fn lookup(&self, fingerprint: &Fingerprint) -> Option<&CachedState<G>> {
        self.states.get(fingerprint)
    }

    /// Pushes known state onto every semantically-equal member.
    ///
    /// The merge only moves candidates forward: an optimized cached
    /// state overwrites an unoptimized member (genome included), cached
    /// fitness fills a missing one, and a cached failure is adopted so
    /// the work is not retried. Nothing is ever un-done.
    pub fn apply(&self, population: &mut Population<G>) {
        if self.states.is_empty() {
            return;
        }
        population.for_each_member_mut(&mut |member: &mut Candidate<G>| {
            let Some(state) = self.states.get(member.fingerprint()) else {
                return;
            };
            if state.optimized && !member.optimized() {
                *member.genome_mut() = state.genome.clone();
                member.set_optimized(true);
            }
            if member.fitness().is_none() {
                if let Some(fitness) = &state.fitness {
                    member.set_fitness(fitness.clone());
                }
            }
            if state.failed {
                member.set_failed(true);
            }
        });
    }

    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq)]
    struct Tag(String);

    impl Genome for Tag {
        fn fingerprint(&self) -> Fingerprint {
            Fingerprint::new(self.0.clone())
        }
    }

    #[test]
    fn test_equal_candidates_observe_recorded_state() {
        let mut done = Candidate::new("done", Tag("x".into()));
        done.set_optimized(true);
        done.set_fitness(3.0);

        let mut cache = StateCache::new();
        cache.record(&done);

        let twin = Candidate::new("twin", Tag("x".into()));
        let mut pop = Population::from_candidates([twin]);
        cache.apply(&mut pop);

        let twin = pop.get(0).expect("present");
        assert!(twin.optimized());
        assert_eq!(twin.scalar_fitness(), Some(3.0));
    }

    #[test]
    fn test_apply_is_forward_only() {
        // A member that already has fitness keeps it.
        let mut old = Candidate::new("old", Tag("x".into()));
        old.set_fitness(1.0);
        let mut cache = StateCache::new();
        let mut newer = Candidate::new("newer", Tag("x".into()));
        newer.set_fitness(9.0);
        cache.record(&newer);

        let mut pop = Population::from_candidates([old]);
        cache.apply(&mut pop);
        assert_eq!(pop.get(0).and_then(|c| c.scalar_fitness()), Some(1.0));
    }

    #[test]
    fn test_failure_state_propagates() {
        let mut failed = Candidate::new("failed", Tag("x".into()));
        failed.set_failed(true);
        let mut cache = StateCache::new();
        cache.record(&failed);

        let mut pop = Population::from_candidates([Candidate::new("twin", Tag("x".into()))]);
        cache.apply(&mut pop);
        assert!(pop.get(0).is_some_and(Candidate::failed));
    }

    #[test]
    fn test_unrelated_fingerprints_untouched() {
        let mut done = Candidate::new("done", Tag("x".into()));
        done.set_optimized(true);
        let mut cache = StateCache::new();
        cache.record(&done);

        let mut pop = Population::from_candidates([Candidate::new("other", Tag("y".into()))]);
        cache.apply(&mut pop);
        assert!(!pop.get(0).is_some_and(Candidate::optimized));
    }
}
