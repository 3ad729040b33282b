//! Population dump and load.
//!
//! The on-disk format is a nested JSON list mirroring the tree: a
//! candidate is a flat object of its attributes, a subpopulation is a
//! nested array, and the root array mixes both freely. Member order and
//! tree shape round-trip losslessly; the tools bundle does not (a
//! loaded population has no tools attached).
//!
//! The genome is authoritative on load. Fingerprints are re-derived
//! from it, so a dump whose fingerprint field was edited by hand (or
//! produced by an older fingerprint scheme) still loads with correct
//! identities; the stored value is only an audit record.

use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::candidate::{Candidate, Genome};
use crate::error::PersistError;
use crate::population::Population;

/// What to do with persisted candidate names on load.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadMode {
    /// Keep the names recorded in the dump.
    KeepNames,
    /// Discard them and assign fresh sequential names in depth-first
    /// order.
    DiscardNames,
}

/// One node of the persisted tree. Untagged: an object is a candidate,
/// an array is a subpopulation.
#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum PopRecord<G> {
    Branch(Vec<PopRecord<G>>),
    Member(Candidate<G>),
}

fn to_records<G>(population: &Population<G>) -> Vec<PopRecord<G>>
where
    G: Genome + Serialize,
{
    let mut records: Vec<PopRecord<G>> = population
        .direct_members()
        .iter()
        .cloned()
        .map(PopRecord::Member)
        .collect();
    records.extend(
        population
            .subpopulations()
            .iter()
            .map(|sub| PopRecord::Branch(to_records(sub))),
    );
    records
}

fn from_records<G>(records: Vec<PopRecord<G>>, mode: LoadMode, counter: &mut usize) -> Population<G>
where
    G: Genome,
{
    let mut population = Population::new();
    for record in records {
        match record {
            PopRecord::Member(mut candidate) => {
                candidate.rederive_fingerprint();
                if mode == LoadMode::DiscardNames {
                    candidate.set_name(format!("member_{counter}"));
                    *counter += 1;
                }
                population.add_members([candidate], crate::population::DuplicatePolicy::Allow);
            }
            PopRecord::Branch(nested) => {
                population.add_subpopulation(from_records(nested, mode, counter));
            }
        }
    }
    population
}

/// Writes `population` to `path` as pretty-printed nested-list JSON.
pub fn dump<G>(population: &Population<G>, path: impl AsRef<Path>) -> Result<(), PersistError>
where
    G: Genome + Serialize,
{
    let file = File::create(path)?;
    serde_json::to_writer_pretty(BufWriter::new(file), &to_records(population))?;
    Ok(())
}

/// Reads a population from `path`.
///
/// The returned tree has no tools attached; attach a bundle before
/// delegating GA operations to it.
pub fn load<G>(path: impl AsRef<Path>, mode: LoadMode) -> Result<Population<G>, PersistError>
where
    G: Genome + DeserializeOwned,
{
    let file = File::open(path)?;
    let records: Vec<PopRecord<G>> = serde_json::from_reader(BufReader::new(file))?;
    let mut counter = 0;
    Ok(from_records(records, mode, &mut counter))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::candidate::Fingerprint;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Tag(String);

    impl Genome for Tag {
        fn fingerprint(&self) -> Fingerprint {
            Fingerprint::new(self.0.clone())
        }
    }

    fn evaluated(tag: &str, fitness: f64) -> Candidate<Tag> {
        let mut c = Candidate::new(tag, Tag(tag.to_string()));
        c.set_fitness(fitness);
        c
    }

    fn sample_tree() -> Population<Tag> {
        let mut root = Population::from_candidates([evaluated("a", 1.0), evaluated("b", 2.0)]);
        let mut failed = Candidate::new("c", Tag("c".into()));
        failed.set_failed(true);
        root.add_subpopulation(Population::from_candidates([failed, evaluated("d", 4.0)]));
        root
    }

    #[test]
    fn test_round_trip_preserves_tree_and_state() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("pop.json");

        let original = sample_tree();
        dump(&original, &path).expect("dump");
        let loaded: Population<Tag> = load(&path, LoadMode::KeepNames).expect("load");

        assert_eq!(loaded.len(), original.len());
        assert_eq!(loaded.direct_members().len(), 2);
        assert_eq!(loaded.subpopulations().len(), 1);

        let names: Vec<_> = loaded.iter().map(|c| c.name().to_string()).collect();
        assert_eq!(names, ["a", "b", "c", "d"]);

        let c = loaded.iter().find(|c| c.name() == "c").expect("present");
        assert!(c.failed());
        let d = loaded.iter().find(|c| c.name() == "d").expect("present");
        assert_eq!(d.scalar_fitness(), Some(4.0));
    }

    #[test]
    fn test_discard_names_renames_depth_first() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("pop.json");

        dump(&sample_tree(), &path).expect("dump");
        let loaded: Population<Tag> = load(&path, LoadMode::DiscardNames).expect("load");

        let names: Vec<_> = loaded.iter().map(|c| c.name().to_string()).collect();
        assert_eq!(names, ["member_0", "member_1", "member_2", "member_3"]);
        // Genomes and fingerprints are untouched by renaming.
        assert!(loaded.iter().any(|c| c.fingerprint().as_str() == "a"));
    }

    #[test]
    fn test_fingerprint_rederived_from_genome() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("pop.json");

        // A candidate whose stored fingerprint is stale: the genome was
        // replaced after construction.
        let mut candidate = Candidate::new("x", Tag("old".into()));
        *candidate.genome_mut() = Tag("new".into());
        assert_eq!(candidate.fingerprint().as_str(), "old");

        dump(&Population::from_candidates([candidate]), &path).expect("dump");
        let loaded: Population<Tag> = load(&path, LoadMode::KeepNames).expect("load");
        assert_eq!(
            loaded.get(0).map(|c| c.fingerprint().as_str().to_string()),
            Some("new".to_string())
        );
    }

    #[test]
    fn test_malformed_dump_is_format_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("pop.json");
        std::fs::write(&path, "{not json").expect("write");

        let err = load::<Tag>(&path, LoadMode::KeepNames).unwrap_err();
        assert!(matches!(err, PersistError::Format(_)));
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let err = load::<Tag>("/nonexistent/pop.json", LoadMode::KeepNames).unwrap_err();
        assert!(matches!(err, PersistError::Io(_)));
    }
}
