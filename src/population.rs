//! Hierarchical population container.
//!
//! A [`Population`] is a tree node holding candidates directly
//! (`members`) and nested sub-nodes (`subpopulations`), with an optional
//! [`GaTools`] bundle attached at the root. The set of candidates
//! reachable from a node is the depth-first union of its own members and
//! everything below it; that traversal order is canonical — it defines
//! indexing, length, the pipeline's positional merge, and which copy
//! wins when duplicates are collapsed.
//!
//! The container supports set-like operations keyed on semantic equality
//! (fingerprint match): membership, [`difference`](Population::difference),
//! [`remove_duplicates`](Population::remove_duplicates). Node membership
//! lists are independent: a candidate may sit in several nodes at once,
//! and removing it from one node never affects another.

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use rand::rngs::StdRng;

use crate::candidate::{Candidate, Fingerprint, Genome};
use crate::crossover::CrossoverOutcome;
use crate::mutation::MutationOutcome;
use crate::pipeline::{Pipeline, PipelineReport};
use crate::selection::{MemberKind, MemberStream, ParentStream};
use crate::tools::GaTools;

/// Whether `add_members` admits candidates already semantically present.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DuplicatePolicy {
    /// Append everything, even fingerprint matches.
    Allow,
    /// Skip candidates whose fingerprint is already in the tree.
    SkipExisting,
}

/// A node of the population tree.
pub struct Population<G: Genome> {
    members: Vec<Candidate<G>>,
    subpopulations: Vec<Population<G>>,
    tools: Option<Arc<GaTools<G>>>,
}

impl<G: Genome> Clone for Population<G> {
    fn clone(&self) -> Self {
        Self {
            members: self.members.clone(),
            subpopulations: self.subpopulations.clone(),
            tools: self.tools.clone(),
        }
    }
}

impl<G: Genome> Default for Population<G> {
    fn default() -> Self {
        Self::new()
    }
}

impl<G: Genome> Population<G> {
    /// An empty node with no tools attached.
    pub fn new() -> Self {
        Self {
            members: Vec::new(),
            subpopulations: Vec::new(),
            tools: None,
        }
    }

    /// A flat node holding the given candidates as direct members.
    pub fn from_candidates(members: impl IntoIterator<Item = Candidate<G>>) -> Self {
        Self {
            members: members.into_iter().collect(),
            subpopulations: Vec::new(),
            tools: None,
        }
    }

    /// A node holding the given trees as subpopulations, no direct members.
    pub fn from_subpopulations(subpopulations: impl IntoIterator<Item = Population<G>>) -> Self {
        Self {
            members: Vec::new(),
            subpopulations: subpopulations.into_iter().collect(),
            tools: None,
        }
    }

    /// Attaches a tools bundle (builder style).
    pub fn with_tools(mut self, tools: Arc<GaTools<G>>) -> Self {
        self.tools = Some(tools);
        self
    }

    pub fn set_tools(&mut self, tools: Arc<GaTools<G>>) {
        self.tools = Some(tools);
    }

    pub fn has_tools(&self) -> bool {
        self.tools.is_some()
    }

    /// The attached tools bundle.
    ///
    /// # Panics
    ///
    /// Panics if no bundle is attached. A population without tools is a
    /// valid container, but delegating GA operations to it is a
    /// programming error, not a runtime condition to recover from.
    pub fn tools(&self) -> Arc<GaTools<G>> {
        self.tools
            .clone()
            .expect("population has no GA tools attached")
    }

    // ------------------------------------------------------------------
    // Container operations
    // ------------------------------------------------------------------

    /// Direct members of this node, excluding subpopulations.
    pub fn direct_members(&self) -> &[Candidate<G>] {
        &self.members
    }

    /// Child nodes of this node.
    pub fn subpopulations(&self) -> &[Population<G>] {
        &self.subpopulations
    }

    /// Depth-first iterator over every reachable candidate.
    pub fn iter(&self) -> Members<'_, G> {
        Members {
            frames: vec![Frame::new(self)],
        }
    }

    /// Number of reachable candidates, subpopulations included.
    pub fn len(&self) -> usize {
        self.members.len()
            + self
                .subpopulations
                .iter()
                .map(Population::len)
                .sum::<usize>()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The i-th candidate in depth-first order.
    pub fn get(&self, index: usize) -> Option<&Candidate<G>> {
        self.iter().nth(index)
    }

    /// Semantic membership: is anything in the tree the same candidate?
    pub fn contains(&self, candidate: &Candidate<G>) -> bool {
        self.contains_fingerprint(candidate.fingerprint())
    }

    pub fn contains_fingerprint(&self, fingerprint: &Fingerprint) -> bool {
        self.iter().any(|c| c.fingerprint() == fingerprint)
    }

    /// Appends candidates to this node's direct members.
    ///
    /// With [`DuplicatePolicy::SkipExisting`], a candidate is dropped
    /// when its fingerprint is already reachable from this node —
    /// including matches among the candidates added earlier in the same
    /// call.
    pub fn add_members(
        &mut self,
        candidates: impl IntoIterator<Item = Candidate<G>>,
        policy: DuplicatePolicy,
    ) {
        match policy {
            DuplicatePolicy::Allow => self.members.extend(candidates),
            DuplicatePolicy::SkipExisting => {
                let mut seen: HashSet<Fingerprint> =
                    self.iter().map(|c| c.fingerprint().clone()).collect();
                for candidate in candidates {
                    if seen.insert(candidate.fingerprint().clone()) {
                        self.members.push(candidate);
                    }
                }
            }
        }
    }

    /// Appends a child node.
    pub fn add_subpopulation(&mut self, subpopulation: Population<G>) {
        self.subpopulations.push(subpopulation);
    }

    /// Collapses semantically-equal candidates.
    ///
    /// With `between_subpops`, duplicates are removed across the whole
    /// tree and the first candidate in depth-first order wins, wherever
    /// it lives. Otherwise each node only collapses its own direct
    /// member list.
    pub fn remove_duplicates(&mut self, between_subpops: bool) {
        if between_subpops {
            let mut seen = HashSet::new();
            self.dedupe_global(&mut seen);
        } else {
            self.dedupe_local();
        }
    }

    fn dedupe_global(&mut self, seen: &mut HashSet<Fingerprint>) {
        self.members
            .retain(|c| seen.insert(c.fingerprint().clone()));
        for sub in &mut self.subpopulations {
            sub.dedupe_global(seen);
        }
    }

    fn dedupe_local(&mut self) {
        let mut seen = HashSet::new();
        self.members
            .retain(|c| seen.insert(c.fingerprint().clone()));
        for sub in &mut self.subpopulations {
            sub.dedupe_local();
        }
    }

    /// Drops every candidate whose `failed` flag is set, at all levels.
    ///
    /// Never automatic: failure flags are preserved through pipeline runs
    /// for auditability, and this is the caller's explicit opt-in to
    /// purge them. Returns the number of candidates removed.
    pub fn remove_failures(&mut self) -> usize {
        let before = self.members.len();
        self.members.retain(|c| !c.failed());
        let mut removed = before - self.members.len();
        for sub in &mut self.subpopulations {
            removed += sub.remove_failures();
        }
        removed
    }

    /// A flat population of everything in `self` not semantically
    /// present in `other` (internal duplicates collapsed).
    ///
    /// Subpopulation structure of `self` is not preserved; the tools
    /// bundle is inherited.
    pub fn difference(&self, other: &Population<G>) -> Population<G> {
        let excluded: HashSet<Fingerprint> =
            other.iter().map(|c| c.fingerprint().clone()).collect();
        let mut result = Population {
            members: Vec::new(),
            subpopulations: Vec::new(),
            tools: self.tools.clone(),
        };
        result.add_members(
            self.iter()
                .filter(|c| !excluded.contains(c.fingerprint()))
                .cloned(),
            DuplicatePolicy::SkipExisting,
        );
        result
    }

    /// A new root holding `self` and `other` as its two subpopulations.
    ///
    /// The tools bundle is inherited from `self`.
    pub fn union(self, other: Population<G>) -> Population<G> {
        let tools = self.tools.clone();
        Population {
            members: Vec::new(),
            subpopulations: vec![self, other],
            tools,
        }
    }

    /// A flat copy: every reachable candidate as a direct member.
    pub fn flattened(&self) -> Population<G> {
        Population {
            members: self.iter().cloned().collect(),
            subpopulations: Vec::new(),
            tools: self.tools.clone(),
        }
    }

    /// Applies `f` to every reachable candidate in depth-first order.
    pub fn for_each_member_mut(&mut self, f: &mut impl FnMut(&mut Candidate<G>)) {
        for member in &mut self.members {
            f(member);
        }
        for sub in &mut self.subpopulations {
            sub.for_each_member_mut(f);
        }
    }

    /// Replaces every candidate positionally, preserving tree shape.
    ///
    /// Used by the pipeline to merge worker results back: the i-th
    /// replacement lands where the i-th candidate (depth-first) was.
    ///
    /// # Panics
    ///
    /// Panics if the replacement count differs from `self.len()`; the
    /// pipeline guarantees a result for every input, so a mismatch is a
    /// bug.
    pub(crate) fn assign_members(&mut self, replacements: Vec<Candidate<G>>) {
        assert_eq!(
            replacements.len(),
            self.len(),
            "positional merge requires one replacement per member"
        );
        let mut source = replacements.into_iter();
        self.assign_from(&mut source);
    }

    fn assign_from(&mut self, source: &mut impl Iterator<Item = Candidate<G>>) {
        for slot in &mut self.members {
            // Length checked by assign_members.
            if let Some(replacement) = source.next() {
                *slot = replacement;
            }
        }
        for sub in &mut self.subpopulations {
            sub.assign_from(source);
        }
    }

    // ------------------------------------------------------------------
    // GA delegation: the node forwards to its attached tools bundle
    // ------------------------------------------------------------------

    /// Lazy stream of members per the configured strategy for `kind`.
    pub fn select_members(&self, kind: MemberKind, rng: &mut StdRng) -> MemberStream<G> {
        self.tools().selection.select_members(self, kind, rng)
    }

    /// Lazy stream of parent pairs for crossover.
    pub fn select_parents(&self, rng: &mut StdRng) -> ParentStream<G> {
        self.tools().selection.select_parents(self, rng)
    }

    /// Generates offspring via the crossover dispatcher.
    pub fn gen_offspring(&self, rng: &mut StdRng) -> CrossoverOutcome<G> {
        let tools = self.tools();
        tools.crossover.cross(self, &tools.selection, rng)
    }

    /// Generates mutants via the mutation dispatcher.
    pub fn gen_mutants(&self, rng: &mut StdRng) -> MutationOutcome<G> {
        let tools = self.tools();
        tools.mutation.mutate(self, &tools.selection, rng)
    }

    /// Applies the configured normalization sequence to fitness values.
    pub fn normalize(&mut self) {
        let tools = self.tools();
        tools.normalization.normalize(self);
    }

    /// Runs the optimize pipeline over every member.
    pub fn optimize_members(&mut self, pipeline: &mut Pipeline<G>) -> PipelineReport {
        let tools = self.tools();
        pipeline.optimize(self, &tools.optimizer)
    }

    /// Runs the evaluate pipeline over every member.
    pub fn evaluate_members(&mut self, pipeline: &mut Pipeline<G>) -> PipelineReport {
        let tools = self.tools();
        pipeline.evaluate(self, &tools.evaluator)
    }

    /// Asks the configured exit criterion whether to stop.
    pub fn should_stop(&self) -> bool {
        self.tools().exit.should_stop(self)
    }
}

impl<G: Genome> fmt::Debug for Population<G> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Population")
            .field("members", &self.members.len())
            .field("subpopulations", &self.subpopulations.len())
            .field("total", &self.len())
            .field("has_tools", &self.tools.is_some())
            .finish()
    }
}

impl<'a, G: Genome> IntoIterator for &'a Population<G> {
    type Item = &'a Candidate<G>;
    type IntoIter = Members<'a, G>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

struct Frame<'a, G: Genome> {
    members: std::slice::Iter<'a, Candidate<G>>,
    subpopulations: std::slice::Iter<'a, Population<G>>,
}

impl<'a, G: Genome> Frame<'a, G> {
    fn new(node: &'a Population<G>) -> Self {
        Self {
            members: node.members.iter(),
            subpopulations: node.subpopulations.iter(),
        }
    }
}

/// Depth-first traversal over a population tree.
pub struct Members<'a, G: Genome> {
    frames: Vec<Frame<'a, G>>,
}

impl<'a, G: Genome> Iterator for Members<'a, G> {
    type Item = &'a Candidate<G>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let frame = self.frames.last_mut()?;
            if let Some(candidate) = frame.members.next() {
                return Some(candidate);
            }
            match frame.subpopulations.next() {
                Some(sub) => self.frames.push(Frame::new(sub)),
                None => {
                    self.frames.pop();
                }
            }
        }
    }
}
