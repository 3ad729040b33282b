//! Selection tallies for diagnostic visualization.
//!
//! The engine's only telemetry obligation is to produce a complete tally
//! of how often each member of a population participated in a selection
//! round — zero counts included — and hand it to a [`TelemetrySink`].
//! Rendering is someone else's problem.

use std::collections::HashMap;

use crate::candidate::{Candidate, Fingerprint, Genome};
use crate::population::Population;

/// How often each candidate was selected, keyed by fingerprint.
#[derive(Debug, Clone, Default)]
pub struct SelectionTally {
    entries: HashMap<Fingerprint, TallyEntry>,
}

#[derive(Debug, Clone)]
pub struct TallyEntry {
    pub name: String,
    pub count: usize,
}

impl SelectionTally {
    pub fn new() -> Self {
        Self::default()
    }

    /// Counts one selection of `candidate`.
    pub fn record<G: Genome>(&mut self, candidate: &Candidate<G>) {
        self.entries
            .entry(candidate.fingerprint().clone())
            .or_insert_with(|| TallyEntry {
                name: candidate.name().to_string(),
                count: 0,
            })
            .count += 1;
    }

    /// Adds zero-count entries for every member of `population` not yet
    /// tallied, making the tally complete.
    pub fn fill_missing<G: Genome>(&mut self, population: &Population<G>) {
        for candidate in population.iter() {
            self.entries
                .entry(candidate.fingerprint().clone())
                .or_insert_with(|| TallyEntry {
                    name: candidate.name().to_string(),
                    count: 0,
                });
        }
    }

    pub fn count(&self, fingerprint: &Fingerprint) -> usize {
        self.entries.get(fingerprint).map_or(0, |e| e.count)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Fingerprint, &TallyEntry)> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Receives selection tallies produced by the dispatchers and the driver.
pub trait TelemetrySink: Send + Sync {
    /// `stage` names the selection round: "crossover", "mutation", or
    /// "generational".
    fn record(&self, stage: &str, tally: &SelectionTally);
}

/// Discards everything. The default sink.
#[derive(Debug, Default)]
pub struct NullSink;

impl TelemetrySink for NullSink {
    fn record(&self, _stage: &str, _tally: &SelectionTally) {}
}

/// Logs tallies at debug level.
#[derive(Debug, Default)]
pub struct LogSink;

impl TelemetrySink for LogSink {
    fn record(&self, stage: &str, tally: &SelectionTally) {
        for (_, entry) in tally.iter() {
            log::debug!("{stage} tally: '{}' selected {} times", entry.name, entry.count);
        }
    }
}
