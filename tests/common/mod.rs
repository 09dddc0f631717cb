//! Hand-built tree sequences with SLiM mutation metadata.

#![allow(dead_code)]

use std::path::{Path, PathBuf};

use selcoeff_rs::{MutationStackEntry, SlimMutationMetadata};
use tskit::metadata::{MetadataError, MetadataRoundtrip, MutationMetadata};

pub const SEQUENCE_LENGTH: f64 = 100.0;

/// Where a fixture mutation sits.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Lineage {
    /// Above the first sample; survives simplification.
    Sampled,
    /// Above a non-sample leaf; removed by simplification.
    DeadEnd,
}

/// What to write as the mutation's metadata.
#[derive(Clone, Debug)]
pub enum Blob {
    Stack(Vec<f32>),
    Legacy(Vec<f32>),
    Nothing,
}

/// Metadata written verbatim, for layouts the crate does not encode.
struct RawMetadata(Vec<u8>);

impl MetadataRoundtrip for RawMetadata {
    fn encode(&self) -> Result<Vec<u8>, MetadataError> {
        Ok(self.0.clone())
    }

    fn decode(metadata: &[u8]) -> Result<Self, MetadataError> {
        Ok(Self(metadata.to_vec()))
    }
}

impl MutationMetadata for RawMetadata {}

fn entry(mutation_type: i32, selection_coeff: f32) -> MutationStackEntry {
    MutationStackEntry {
        mutation_type,
        selection_coeff,
        subpopulation: 1,
        origin_tick: 100,
        nucleotide: None,
    }
}

fn legacy_bytes(coeffs: &[f32]) -> Vec<u8> {
    let mut out = Vec::new();
    for &s in coeffs {
        out.extend_from_slice(&1_i32.to_le_bytes());
        out.extend_from_slice(&s.to_le_bytes());
        out.extend_from_slice(&1_i32.to_le_bytes());
        out.extend_from_slice(&100_i32.to_le_bytes());
    }
    out
}

/// Root at time 2 over two samples and one non-sample leaf, below a unary
/// input root at time 3; one site per mutation. Mutation type ids are 1 for
/// nonnegative and 2 for negative coefficients.
pub fn build(mutations: &[(Lineage, Blob)]) -> tskit::TreeSequence {
    let mut tables = tskit::TableCollection::new(SEQUENCE_LENGTH).unwrap();
    let top = tables
        .add_node(tskit::NodeFlags::default(), 3.0, -1, -1)
        .unwrap();
    let root = tables
        .add_node(tskit::NodeFlags::default(), 2.0, -1, -1)
        .unwrap();
    let sample0 = tables
        .add_node(tskit::NodeFlags::new_sample(), 0.0, -1, -1)
        .unwrap();
    let sample1 = tables
        .add_node(tskit::NodeFlags::new_sample(), 0.0, -1, -1)
        .unwrap();
    let dead_end = tables
        .add_node(tskit::NodeFlags::default(), 1.0, -1, -1)
        .unwrap();
    tables.add_edge(0.0, SEQUENCE_LENGTH, top, root).unwrap();
    for child in [sample0, sample1, dead_end] {
        tables.add_edge(0.0, SEQUENCE_LENGTH, root, child).unwrap();
    }

    for (i, (lineage, blob)) in mutations.iter().enumerate() {
        let site = tables.add_site(1.0 + i as f64, None).unwrap();
        let (node, time) = match lineage {
            Lineage::Sampled => (sample0, 0.5),
            Lineage::DeadEnd => (dead_end, 1.5),
        };
        match blob {
            Blob::Stack(coeffs) => {
                let md = SlimMutationMetadata::new(
                    coeffs
                        .iter()
                        .map(|&s| entry(if s < 0.0 { 2 } else { 1 }, s))
                        .collect(),
                );
                tables
                    .add_mutation_with_metadata(site, node, tskit::MutationId::NULL, time, None, &md)
                    .unwrap();
            }
            Blob::Legacy(coeffs) => {
                let md = RawMetadata(legacy_bytes(coeffs));
                tables
                    .add_mutation_with_metadata(site, node, tskit::MutationId::NULL, time, None, &md)
                    .unwrap();
            }
            Blob::Nothing => {
                tables
                    .add_mutation(site, node, tskit::MutationId::NULL, time, None)
                    .unwrap();
            }
        }
    }

    tables
        .full_sort(tskit::TableSortOptions::default())
        .unwrap();
    tables.build_index().unwrap();
    tables
        .tree_sequence(tskit::TreeSequenceFlags::default())
        .unwrap()
}

/// Build and dump to `dir/name`.
pub fn write(dir: &Path, name: &str, mutations: &[(Lineage, Blob)]) -> PathBuf {
    let path = dir.join(name);
    build(mutations)
        .dump(path.to_str().unwrap(), tskit::TableOutputOptions::default())
        .unwrap();
    path
}

pub fn stack(coeffs: &[f32]) -> (Lineage, Blob) {
    (Lineage::Sampled, Blob::Stack(coeffs.to_vec()))
}
