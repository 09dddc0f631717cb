//! Writes SLiM-style tree sequences without running SLiM.
//!
//! A haploid Wright-Fisher population is recorded forward in time with no
//! intermediate simplification, so the output still holds the history of
//! lineages that died out. Mutations carry SLiM's binary mutation metadata.

use anyhow::{Result, anyhow, bail};
use indicatif::ProgressBar;
use rand::SeedableRng;
use rand::distr::weighted::WeightedIndex;
use rand::distr::{Distribution, Uniform};
use rand::prelude::*;
use rand::rngs::SmallRng;
use rand_distr::{Exp, Gamma, Poisson};
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use crate::metadata::{MutationStackEntry, SlimMutationMetadata};

// ── Distribution of fitness effects ──────────────────────────────────────────

/// The DFE kinds SLiM offers for a mutation type.
#[derive(Clone, Debug, PartialEq)]
pub enum Dfe {
    /// `f`: every mutation gets the same coefficient.
    Fixed(f64),
    /// `e`: exponential with the given mean; a negative mean yields
    /// deleterious draws.
    Exponential { mean: f64 },
    /// `g`: gamma with the given mean and shape; the sign follows the mean.
    Gamma { mean: f64, shape: f64 },
}

impl Dfe {
    pub fn sample(&self, rng: &mut SmallRng) -> Result<f64> {
        Ok(match *self {
            Self::Fixed(s) => s,
            Self::Exponential { mean } => {
                if mean == 0.0 {
                    return Ok(0.0);
                }
                mean.signum() * Exp::new(1.0 / mean.abs())?.sample(rng)
            }
            Self::Gamma { mean, shape } => {
                if mean == 0.0 {
                    return Ok(0.0);
                }
                mean.signum() * Gamma::new(shape, mean.abs() / shape)?.sample(rng)
            }
        })
    }
}

impl FromStr for Dfe {
    type Err = anyhow::Error;

    /// Parses `f:<s>`, `e:<mean>` or `g:<mean>:<shape>`.
    fn from_str(s: &str) -> Result<Self> {
        let mut parts = s.split(':');
        let kind = parts.next().unwrap_or_default();
        let params = parts
            .map(|p| p.trim().parse::<f64>())
            .collect::<Result<Vec<_>, _>>()?;
        if params.iter().any(|p| !p.is_finite()) {
            bail!("DFE parameters must be finite in '{s}'");
        }
        match (kind, params.as_slice()) {
            ("f", &[s]) => Ok(Self::Fixed(s)),
            ("e", &[mean]) => Ok(Self::Exponential { mean }),
            ("g", &[mean, shape]) if shape > 0.0 => Ok(Self::Gamma { mean, shape }),
            ("g", &[_, _]) => bail!("gamma shape must be positive in '{s}'"),
            _ => bail!("invalid DFE '{s}' (expected f:<s>, e:<mean> or g:<mean>:<shape>)"),
        }
    }
}

impl fmt::Display for Dfe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Fixed(s) => write!(f, "f:{s}"),
            Self::Exponential { mean } => write!(f, "e:{mean}"),
            Self::Gamma { mean, shape } => write!(f, "g:{mean}:{shape}"),
        }
    }
}

// ── Mutation types ────────────────────────────────────────────────────────────

#[derive(Clone, Debug, PartialEq)]
pub struct MutationType {
    /// SLiM id, i.e. the `1` of `m1`.
    pub id: i32,
    /// Relative frequency among new mutations.
    pub weight: f64,
    pub dfe: Dfe,
}

impl FromStr for MutationType {
    type Err = anyhow::Error;

    /// Parses `<id>:<weight>:<dfe>`, e.g. `2:0.4:g:-0.03:0.2`.
    fn from_str(s: &str) -> Result<Self> {
        let mut parts = s.splitn(3, ':');
        let (Some(id), Some(weight), Some(dfe)) = (parts.next(), parts.next(), parts.next())
        else {
            bail!("invalid mutation type '{s}' (expected <id>:<weight>:<dfe>)");
        };
        let weight: f64 = weight.trim().parse()?;
        if !(weight >= 0.0) {
            bail!("mutation type weight must be non-negative in '{s}'");
        }
        Ok(Self {
            id: id.trim().trim_start_matches('m').parse()?,
            weight,
            dfe: dfe.parse()?,
        })
    }
}

// ── Population metadata ───────────────────────────────────────────────────────

#[derive(
    serde::Serialize, serde::Deserialize, tskit::metadata::tskit_derive::PopulationMetadata,
)]
#[serializer("serde_json")]
pub struct PopulationMetadata {
    pub name: String,
    pub slim_id: i32,
}

// ── Parameters ────────────────────────────────────────────────────────────────

#[derive(Clone, Debug)]
pub struct Parameters {
    pub random_seed: u64,
    pub population_size: usize,
    pub generations: usize,
    /// Number of integer positions a mutation can land on.
    pub sequence_length: f64,
    /// Per position, per birth.
    pub mutation_rate: f64,
    /// Chance that a new mutation is recorded as a two-entry stack.
    pub stack_probability: f64,
    pub mutation_types: Vec<MutationType>,
}

impl Default for Parameters {
    fn default() -> Self {
        let mut rng = rand::rng();
        let random_seed = rng.random_range(1..u64::MAX);
        Self {
            random_seed,
            population_size: 100,
            generations: 200,
            sequence_length: 1e6,
            mutation_rate: 1e-7,
            stack_probability: 0.05,
            mutation_types: default_mutation_types(),
        }
    }
}

/// Neutral, weakly deleterious and rare beneficial mutations.
pub fn default_mutation_types() -> Vec<MutationType> {
    vec![
        MutationType {
            id: 1,
            weight: 0.5,
            dfe: Dfe::Fixed(0.0),
        },
        MutationType {
            id: 2,
            weight: 0.4,
            dfe: Dfe::Gamma {
                mean: -0.03,
                shape: 0.2,
            },
        },
        MutationType {
            id: 3,
            weight: 0.1,
            dfe: Dfe::Exponential { mean: 0.01 },
        },
    ]
}

// ── Simulator ─────────────────────────────────────────────────────────────────

pub struct SyntheticSlim {
    pub params: Parameters,
    pub tables: tskit::TableCollection,
    pub rng: SmallRng,
    /// Nodes of the current generation.
    pub parents: Vec<tskit::NodeId>,
    pub population_id: tskit::PopulationId,
    /// Number of tskit mutations written so far.
    pub num_mutations: usize,

    next_slim_id: i64,
    used_positions: HashSet<u64>,
    type_index: Option<WeightedIndex<f64>>,
    mut_poisson: Option<Poisson<f64>>,
    position_dist: Uniform<u64>,
}

impl SyntheticSlim {
    pub fn initialize(params: Parameters) -> Result<Self> {
        if params.population_size == 0 {
            bail!("population size must be positive");
        }
        if params.sequence_length < 1.0 {
            bail!("sequence length must be at least 1");
        }
        if !(0.0..=1.0).contains(&params.stack_probability) {
            bail!("stack probability must lie in [0, 1]");
        }

        let mut tables = tskit::TableCollection::new(params.sequence_length)?;

        let mut populations = tskit::PopulationTable::default();
        let population_id = populations.add_row_with_metadata(&PopulationMetadata {
            name: "p1".to_owned(),
            slim_id: 1,
        })?;
        tables.set_populations(&populations)?;

        let founder_time = params.generations as f64;
        let founder_flags = if params.generations == 0 {
            tskit::NodeFlags::new_sample()
        } else {
            tskit::NodeFlags::default()
        };
        let parents = (0..params.population_size)
            .map(|_| tables.add_node(founder_flags, founder_time, population_id, -1))
            .collect::<Result<Vec<_>, _>>()?;

        let type_index = if params.mutation_types.is_empty() {
            None
        } else {
            let weights: Vec<f64> = params.mutation_types.iter().map(|m| m.weight).collect();
            Some(WeightedIndex::new(&weights)?)
        };
        let mut_poisson = if type_index.is_some()
            && params.mutation_rate * params.sequence_length > 0.0
        {
            Some(Poisson::new(params.mutation_rate * params.sequence_length)?)
        } else {
            None
        };
        let position_dist = Uniform::new(0u64, params.sequence_length as u64)?;
        let rng = SmallRng::seed_from_u64(params.random_seed);

        Ok(Self {
            params,
            tables,
            rng,
            parents,
            population_id,
            num_mutations: 0,
            next_slim_id: 0,
            used_positions: HashSet::new(),
            type_index,
            mut_poisson,
            position_dist,
        })
    }

    fn draw_entry(&mut self, tick: i32) -> Result<MutationStackEntry> {
        let index = self
            .type_index
            .as_ref()
            .ok_or_else(|| anyhow!("no mutation types configured"))?
            .sample(&mut self.rng);
        let mutation_type = &self.params.mutation_types[index];
        let selection_coeff = mutation_type.dfe.sample(&mut self.rng)? as f32;
        Ok(MutationStackEntry {
            mutation_type: mutation_type.id,
            selection_coeff,
            subpopulation: 1,
            origin_tick: tick,
            nucleotide: None,
        })
    }

    fn draw_position(&mut self) -> Result<u64> {
        // Positions are drawn from [0, floor(sequence_length)).
        if self.used_positions.len() as u64 >= self.params.sequence_length as u64 {
            bail!("every position of the sequence already carries a mutation");
        }
        loop {
            let pos = self.position_dist.sample(&mut self.rng);
            if self.used_positions.insert(pos) {
                return Ok(pos);
            }
        }
    }

    /// Put `count` new mutations on `node`, born at `birth_time` in `tick`.
    fn add_mutations(
        &mut self,
        node: tskit::NodeId,
        birth_time: f64,
        tick: i32,
        count: usize,
    ) -> Result<()> {
        for _ in 0..count {
            let mut stack = vec![self.draw_entry(tick)?];
            if self.rng.random_bool(self.params.stack_probability) {
                stack.push(self.draw_entry(tick)?);
            }

            // Derived state lists the SLiM ids of the stacked mutations.
            let mut derived_state = Vec::with_capacity(8 * stack.len());
            for _ in &stack {
                derived_state.extend_from_slice(&self.next_slim_id.to_le_bytes());
                self.next_slim_id += 1;
            }

            let pos = self.draw_position()?;
            let site = self.tables.add_site(pos as f64, None)?;
            self.tables.add_mutation_with_metadata(
                site,
                node,
                tskit::MutationId::NULL,
                birth_time,
                Some(derived_state.as_slice()),
                &SlimMutationMetadata::new(stack),
            )?;
            self.num_mutations += 1;
        }
        Ok(())
    }

    /// Produce generation `tick` (1-based) from the current parents.
    pub fn step(&mut self, tick: usize) -> Result<()> {
        let n = self.params.population_size;
        let birth_time = (self.params.generations - tick) as f64;
        let flags = if tick == self.params.generations {
            tskit::NodeFlags::new_sample()
        } else {
            tskit::NodeFlags::default()
        };
        let seq_len = self.params.sequence_length;
        let uniform_parent = Uniform::new(0usize, n)?;

        let mut children = Vec::with_capacity(n);
        for _ in 0..n {
            let parent = self.parents[uniform_parent.sample(&mut self.rng)];
            let child = self
                .tables
                .add_node(flags, birth_time, self.population_id, -1)?;
            self.tables.add_edge(0.0, seq_len, parent, child)?;

            let num_new = match &self.mut_poisson {
                Some(dist) => dist.sample(&mut self.rng) as usize,
                None => 0,
            };
            self.add_mutations(child, birth_time, tick as i32, num_new)?;
            children.push(child);
        }
        self.parents = children;
        Ok(())
    }

    pub fn run(&mut self) -> Result<()> {
        let bar = ProgressBar::new(self.params.generations as u64);
        for tick in 1..=self.params.generations {
            bar.inc(1);
            self.step(tick)?;
        }
        bar.finish();
        Ok(())
    }

    /// Sort and index the recorded tables. The result is not simplified.
    pub fn finalize(mut self) -> Result<tskit::TreeSequence> {
        self.tables.full_sort(tskit::TableSortOptions::default())?;
        self.tables.build_index()?;
        let tree_sequence = self
            .tables
            .tree_sequence(tskit::TreeSequenceFlags::default())?;
        Ok(tree_sequence)
    }
}

/// Run a full simulation with `params`.
pub fn simulate(params: Parameters) -> Result<tskit::TreeSequence> {
    let mut sim = SyntheticSlim::initialize(params)?;
    sim.run()?;
    sim.finalize()
}
