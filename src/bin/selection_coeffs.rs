use anyhow::{Result, bail};
use clap::{Parser, ValueEnum};
use selcoeff_rs::*;

// ── CLI ───────────────────────────────────────────────────────────────────────

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Format {
    Text,
    Json,
}

#[derive(Parser)]
#[command(
    version,
    about = "Mean selection coefficients of beneficial and deleterious mutations in a SLiM tree sequence"
)]
struct Args {
    /// Tree sequence written by SLiM (`.trees`)
    trees: String,
    /// Mutation metadata record layout: auto, current (17 bytes) or legacy (16 bytes)
    #[arg(long, value_enum, default_value_t = MetadataLayout::Auto)]
    layout: MetadataLayout,
    /// Analyse the tree sequence as loaded, without simplifying it first
    #[arg(long)]
    no_simplify: bool,
    /// Keep the ancestors of the oldest sample lineages when simplifying
    #[arg(long, conflicts_with = "no_simplify")]
    keep_input_roots: bool,
    /// Also report every mutation type separately
    #[arg(long)]
    by_type: bool,
    #[arg(long, value_enum, default_value_t = Format::Text)]
    format: Format,
    /// Fail if there are no beneficial or no deleterious mutations
    #[arg(long)]
    require_both: bool,
    /// More log output on stderr (repeat for more)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
    /// Only log errors
    #[arg(short, long)]
    quiet: bool,
}

// ── Main ─────────────────────────────────────────────────────────────────────

fn main() -> Result<()> {
    let args = Args::parse();
    logger::init(logger::level_from_verbosity(args.verbose, args.quiet));

    let options = AnalysisOptions {
        layout: args.layout,
        simplify: (!args.no_simplify).then_some(SimplifyOptions {
            keep_input_roots: args.keep_input_roots,
        }),
    };
    let report = analyze_file(&args.trees, options)?;

    if args.require_both {
        if report.beneficial().is_empty() {
            bail!("no beneficial mutations in {}", args.trees);
        }
        if report.deleterious().is_empty() {
            bail!("no deleterious mutations in {}", args.trees);
        }
    } else if report.beneficial().is_empty() || report.deleterious().is_empty() {
        log::warn!("at least one bucket is empty; its mean is undefined");
    }

    match args.format {
        Format::Text => {
            println!("{report}");
            if args.by_type {
                for line in report.type_lines() {
                    println!("{line}");
                }
            }
        }
        Format::Json => println!("{}", serde_json::to_string_pretty(&report)?),
    }
    Ok(())
}
