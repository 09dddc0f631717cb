use anyhow::Result;
use clap::Parser;
use rand::Rng;
use selcoeff_rs::synthetic::*;
use selcoeff_rs::{TableSizes, logger};

// ── CLI ───────────────────────────────────────────────────────────────────────

#[derive(Parser)]
#[command(about = "Write a SLiM-style tree sequence from a haploid Wright-Fisher simulation")]
struct Args {
    /// Random seed (random if omitted)
    #[arg(long)]
    seed: Option<u64>,
    #[arg(long, default_value_t = 100)]
    population_size: usize,
    #[arg(long, default_value_t = 200)]
    generations: usize,
    #[arg(long, default_value_t = 1e6)]
    sequence_length: f64,
    #[arg(long, default_value_t = 1e-7)]
    mutation_rate: f64,
    #[arg(long, default_value_t = 0.05)]
    stack_probability: f64,
    /// `<id>:<weight>:<dfe>` with dfe one of `f:<s>`, `e:<mean>`, `g:<mean>:<shape>`.
    /// Repeat for several types; defaults to m1 neutral, m2 gamma deleterious,
    /// m3 exponential beneficial.
    #[arg(long = "mutation-type")]
    mutation_types: Vec<MutationType>,
    #[arg(long, default_value = "synthetic_slim.trees")]
    output: String,
}

// ── Main ─────────────────────────────────────────────────────────────────────

fn main() -> Result<()> {
    let args = Args::parse();
    logger::init(log::LevelFilter::Info);

    let random_seed = args
        .seed
        .unwrap_or_else(|| rand::rng().random_range(1..u64::MAX));

    let mutation_types = if args.mutation_types.is_empty() {
        default_mutation_types()
    } else {
        args.mutation_types
    };

    let params = Parameters {
        random_seed,
        population_size: args.population_size,
        generations: args.generations,
        sequence_length: args.sequence_length,
        mutation_rate: args.mutation_rate,
        stack_probability: args.stack_probability,
        mutation_types,
    };
    log::info!("{:?}", params);

    let mut sim = SyntheticSlim::initialize(params)?;
    sim.run()?;
    log::info!("recorded {} mutations", sim.num_mutations);
    let ts = sim.finalize()?;
    log::info!("{}", TableSizes::of(&ts));
    ts.dump(&args.output, tskit::TableOutputOptions::default())?;
    Ok(())
}
