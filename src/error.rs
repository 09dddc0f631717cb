use thiserror::Error;

/// Errors raised while decoding SLiM mutation metadata.
#[derive(Debug, Error, PartialEq)]
pub enum DecodeError {
    #[error("mutation has no metadata (was it recorded without SLiM mutation metadata?)")]
    Missing,
    #[error("metadata of {len} bytes is not a whole number of {record_size}-byte mutation records")]
    Misaligned { len: usize, record_size: usize },
    #[error("metadata of {len} bytes matches neither the 17-byte nor the 16-byte record layout")]
    UnknownLayout { len: usize },
    #[error("stack entry {index} has a non-finite selection coefficient ({value})")]
    NonFiniteCoefficient { index: usize, value: f32 },
}
