use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tskit::metadata::{MetadataError, MetadataRoundtrip, MutationMetadata};

use crate::error::DecodeError;

/// Size of one stack entry in files written by SLiM 3.3 and later.
pub const CURRENT_RECORD_SIZE: usize = 17;
/// Size of one stack entry in files written before nucleotides were recorded.
pub const LEGACY_RECORD_SIZE: usize = 16;

/// Nucleotide value SLiM writes for non-nucleotide mutations.
const NO_NUCLEOTIDE: i8 = -1;

// ── Record layout ─────────────────────────────────────────────────────────────

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum MetadataLayout {
    /// Pick the record size from the length of each blob, preferring 17 bytes.
    #[default]
    Auto,
    /// `type:i32, coeff:f32, subpop:i32, tick:i32, nucleotide:i8`
    Current,
    /// Same as `Current` without the trailing nucleotide byte.
    Legacy,
}

impl MetadataLayout {
    /// Resolve the record size used for a blob of `len` bytes.
    pub fn record_size(self, len: usize) -> Result<usize, DecodeError> {
        let size = match self {
            Self::Current => CURRENT_RECORD_SIZE,
            Self::Legacy => LEGACY_RECORD_SIZE,
            Self::Auto => {
                return if len % CURRENT_RECORD_SIZE == 0 {
                    if len % LEGACY_RECORD_SIZE == 0 {
                        log::debug!(
                            "{len}-byte metadata fits both layouts; reading it as {} current records",
                            len / CURRENT_RECORD_SIZE
                        );
                    }
                    Ok(CURRENT_RECORD_SIZE)
                } else if len % LEGACY_RECORD_SIZE == 0 {
                    Ok(LEGACY_RECORD_SIZE)
                } else {
                    Err(DecodeError::UnknownLayout { len })
                };
            }
        };
        if len % size != 0 {
            return Err(DecodeError::Misaligned {
                len,
                record_size: size,
            });
        }
        Ok(size)
    }
}

// ── Stack entries ─────────────────────────────────────────────────────────────

/// One mutation of a (possibly stacked) SLiM mutation.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct MutationStackEntry {
    pub mutation_type: i32,
    pub selection_coeff: f32,
    pub subpopulation: i32,
    pub origin_tick: i32,
    /// `None` for non-nucleotide mutations and for legacy records.
    pub nucleotide: Option<i8>,
}

impl MutationStackEntry {
    fn read(record: &[u8]) -> Self {
        let word = |at: usize| [record[at], record[at + 1], record[at + 2], record[at + 3]];
        let nucleotide = record
            .get(LEGACY_RECORD_SIZE)
            .map(|&b| b as i8)
            .filter(|&n| n != NO_NUCLEOTIDE);
        Self {
            mutation_type: i32::from_le_bytes(word(0)),
            selection_coeff: f32::from_le_bytes(word(4)),
            subpopulation: i32::from_le_bytes(word(8)),
            origin_tick: i32::from_le_bytes(word(12)),
            nucleotide,
        }
    }

    fn write(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.mutation_type.to_le_bytes());
        out.extend_from_slice(&self.selection_coeff.to_le_bytes());
        out.extend_from_slice(&self.subpopulation.to_le_bytes());
        out.extend_from_slice(&self.origin_tick.to_le_bytes());
        out.push(self.nucleotide.unwrap_or(NO_NUCLEOTIDE) as u8);
    }
}

/// Decoded metadata of a single tskit mutation: the SLiM mutation stack.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SlimMutationMetadata {
    pub stack: Vec<MutationStackEntry>,
}

impl SlimMutationMetadata {
    pub fn new(stack: Vec<MutationStackEntry>) -> Self {
        Self { stack }
    }

    pub fn decode_with(bytes: &[u8], layout: MetadataLayout) -> Result<Self, DecodeError> {
        if bytes.is_empty() {
            return Err(DecodeError::Missing);
        }
        let size = layout.record_size(bytes.len())?;
        let stack = bytes
            .chunks_exact(size)
            .map(MutationStackEntry::read)
            .enumerate()
            .map(|(index, entry)| {
                if entry.selection_coeff.is_finite() {
                    Ok(entry)
                } else {
                    Err(DecodeError::NonFiniteCoefficient {
                        index,
                        value: entry.selection_coeff,
                    })
                }
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { stack })
    }

    /// Serialize in the current (17-byte) layout.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.stack.len() * CURRENT_RECORD_SIZE);
        for entry in &self.stack {
            entry.write(&mut out);
        }
        out
    }

    pub fn selection_coeffs(&self) -> impl Iterator<Item = f32> + '_ {
        self.stack.iter().map(|e| e.selection_coeff)
    }
}

impl MetadataRoundtrip for SlimMutationMetadata {
    fn encode(&self) -> Result<Vec<u8>, MetadataError> {
        Ok(self.to_bytes())
    }

    fn decode(metadata: &[u8]) -> Result<Self, MetadataError>
    where
        Self: Sized,
    {
        Self::decode_with(metadata, MetadataLayout::Auto)
            .map_err(|err| MetadataError::RoundtripError { value: Box::new(err) })
    }
}

impl MutationMetadata for SlimMutationMetadata {}

// ── Table scan ────────────────────────────────────────────────────────────────

/// Decode the metadata of every mutation in `ts`, in table order.
///
/// The first undecodable mutation aborts the scan; its id is attached to the
/// returned error.
pub fn decode_mutations(
    ts: &tskit::TreeSequence,
    layout: MetadataLayout,
) -> Result<Vec<SlimMutationMetadata>> {
    ts.mutations()
        .iter()
        .map(|row| {
            let bytes = row.metadata.unwrap_or_default();
            SlimMutationMetadata::decode_with(&bytes, layout)
                .with_context(|| format!("decoding metadata of mutation {}", row.id))
        })
        .collect()
}
