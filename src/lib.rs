//! Selection-coefficient summaries for tree sequences recorded by SLiM.
//!
//! The pipeline is: load a `.trees` file, simplify it onto its samples,
//! decode the SLiM metadata of every mutation and partition the selection
//! coefficients of all stack entries by sign.

pub mod error;
pub mod logger;
pub mod metadata;
pub mod stats;
pub mod synthetic;

use anyhow::{Context, Result};
use std::fmt;

pub use error::DecodeError;
pub use metadata::{MetadataLayout, MutationStackEntry, SlimMutationMetadata, decode_mutations};
pub use stats::{CoefficientSummary, Effect, EffectTally, SelectionReport};

// ── Loading and simplification ────────────────────────────────────────────────

#[derive(Clone, Copy, Debug, Default)]
pub struct SimplifyOptions {
    /// Keep the roots of the input trees and the unary nodes above the
    /// samples' most recent common ancestors.
    pub keep_input_roots: bool,
}

impl SimplifyOptions {
    fn flags(&self) -> tskit::SimplificationOptions {
        // Sites, populations and individuals nothing refers to any more are
        // dropped, as pyslim and tskit-python do by default.
        let mut flags = tskit::SimplificationOptions::FILTER_SITES
            | tskit::SimplificationOptions::FILTER_POPULATIONS
            | tskit::SimplificationOptions::FILTER_INDIVIDUALS;
        if self.keep_input_roots {
            flags = flags | tskit::SimplificationOptions::KEEP_INPUT_ROOTS;
        }
        flags
    }
}

pub fn load_tree_sequence(path: &str) -> Result<tskit::TreeSequence> {
    tskit::TreeSequence::load(path).with_context(|| format!("loading tree sequence from {path}"))
}

/// Simplify `ts` onto its own sample nodes.
pub fn simplify(ts: &tskit::TreeSequence, options: SimplifyOptions) -> Result<tskit::TreeSequence> {
    let (simplified, _) = ts
        .simplify(ts.sample_nodes(), options.flags(), false)
        .context("simplifying tree sequence")?;
    Ok(simplified)
}

/// Row counts of the main tables; used for logging and comparisons.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TableSizes {
    pub samples: usize,
    pub nodes: usize,
    pub edges: usize,
    pub sites: usize,
    pub mutations: usize,
}

impl TableSizes {
    pub fn of(ts: &tskit::TreeSequence) -> Self {
        Self {
            samples: ts.sample_nodes().len(),
            nodes: ts.nodes().num_rows().as_usize(),
            edges: ts.edges().num_rows().as_usize(),
            sites: ts.sites().num_rows().as_usize(),
            mutations: ts.mutations().num_rows().as_usize(),
        }
    }
}

impl fmt::Display for TableSizes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} samples, {} nodes, {} edges, {} sites, {} mutations",
            self.samples, self.nodes, self.edges, self.sites, self.mutations
        )
    }
}

// ── Analysis ──────────────────────────────────────────────────────────────────

#[derive(Clone, Copy, Debug)]
pub struct AnalysisOptions {
    pub layout: MetadataLayout,
    /// `None` analyses the tree sequence as loaded.
    pub simplify: Option<SimplifyOptions>,
}

impl Default for AnalysisOptions {
    fn default() -> Self {
        Self {
            layout: MetadataLayout::Auto,
            simplify: Some(SimplifyOptions::default()),
        }
    }
}

/// Simplify (unless disabled), decode and aggregate.
pub fn analyze(ts: &tskit::TreeSequence, options: AnalysisOptions) -> Result<SelectionReport> {
    log::info!("loaded: {}", TableSizes::of(ts));

    let simplified;
    let ts = match options.simplify {
        Some(simplify_options) => {
            simplified = simplify(ts, simplify_options)?;
            log::info!("simplified: {}", TableSizes::of(&simplified));
            &simplified
        }
        None => ts,
    };

    let metadata = decode_mutations(ts, options.layout)?;
    let report = SelectionReport::from_metadata(&metadata);
    log::info!(
        "scanned {} mutations with {} stack entries ({} neutral)",
        report.mutations,
        report.stack_entries,
        report.totals.neutral
    );
    if let Some((first, last)) = report.origin_ticks {
        log::debug!("origin ticks range from {first} to {last}");
    }
    Ok(report)
}

pub fn analyze_file(path: &str, options: AnalysisOptions) -> Result<SelectionReport> {
    let ts = load_tree_sequence(path)?;
    analyze(&ts, options)
}
