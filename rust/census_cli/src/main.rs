// src/main.rs
#![forbid(unsafe_code)]

// census_cli: estimate how many chess diagrams are legal positions.
//
// Subcommands:
//   classes : list material classes with their exact diagram counts
//   run     : estimate legality ratios per class and the global total
//   merge   : combine checkpoints of range-sharded runs

mod census;

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use clap::{Args, Parser, Subcommand};
use log::info;

use crate::census::{
    ClassSink, NoopSink, OutputFormat, Runner, RunnerConfig, TableSink, summary_line,
    write_results,
};
use census_engine::board::{ClassEnumerator, DiagramCache, MaterialLimits};
use census_engine::estimate::{
    CheckpointWriter, DEFAULT_EXACT_THRESHOLD, DEFAULT_SEED, RetryPolicy, RunConfig, RunContext,
    SideToMove, StoppingRule, aggregate, merge_checkpoints, z_for_confidence,
};
use census_engine::oracle::{
    CoinOracle, ConstantOracle, LegalityOracle, StructuralOracle, StructuralRules, TimeoutOracle,
};

#[derive(Parser, Debug)]
#[command(name = "census_cli", about = "Monte Carlo census of legal chess diagrams")]
struct Cli {
    #[command(subcommand)]
    command: Cmd,
}

#[derive(Subcommand, Debug)]
enum Cmd {
    /// List material classes in enumeration order with their diagram counts
    Classes {
        /// Piece ceiling, kings included (2..=32).
        #[arg(long, default_value_t = 32)]
        max_pieces: usize,

        /// Print at most this many classes (the total line still covers all).
        #[arg(long)]
        limit: Option<usize>,

        /// Output: table | csv
        #[arg(long, default_value = "table")]
        format: String,
    },

    /// Estimate the number of legal diagrams
    Run(RunArgs),

    /// Merge checkpoint files from runs over disjoint class ranges
    Merge {
        /// Checkpoint files (JSON Lines) written by `run --checkpoint`.
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Output: table | csv | json
        #[arg(long, default_value = "table")]
        format: String,

        /// Write results here instead of stdout.
        #[arg(long)]
        output: Option<PathBuf>,
    },
}

#[derive(Args, Debug)]
struct RunArgs {
    // ---------------- stopping rule ----------------
    /// Fixed number of judged samples per class. Overrides the adaptive rule.
    #[arg(long)]
    trials: Option<u64>,

    /// Adaptive rule: stop once half-width / ratio drops to this.
    #[arg(long, default_value_t = 0.10)]
    target_rel_error: f64,

    /// Adaptive rule: never stop before this many trials.
    #[arg(long, default_value_t = StoppingRule::DEFAULT_MIN_TRIALS)]
    min_trials: u64,

    /// Adaptive rule: hard cap per class; reaching it flags the class.
    #[arg(long, default_value_t = 128_000)]
    max_trials: u64,

    /// Adaptive rule: also stop once the absolute half-width drops to this.
    #[arg(long)]
    abs_half_width: Option<f64>,

    // ---------------- statistics ----------------
    /// Base RNG seed. Per-shard seeds are derived from (seed, class index, shard).
    #[arg(long, default_value_t = DEFAULT_SEED)]
    seed: u64,

    /// Two-sided confidence level for every interval.
    #[arg(long, default_value_t = 0.95)]
    confidence: f64,

    /// Classes with at most this many diagrams are enumerated exhaustively.
    #[arg(long, default_value_t = DEFAULT_EXACT_THRESHOLD)]
    exact_threshold: u64,

    /// Side to move: uniform | white | black
    #[arg(long, default_value = "uniform")]
    side_to_move: String,

    // ---------------- execution ----------------
    /// RNG shards per class (part of the run fingerprint).
    #[arg(long, default_value_t = 8)]
    shards: u32,

    /// Worker threads; 0 = one per core. Does not change results.
    #[arg(long, default_value_t = 0)]
    threads: usize,

    /// Samples per adaptive round.
    #[arg(long, default_value_t = 1_000)]
    round_size: u64,

    /// Retries after a transient oracle fault.
    #[arg(long, default_value_t = 3)]
    retries: u32,

    /// Base backoff between retries, in ms (doubles per retry).
    #[arg(long, default_value_t = 1)]
    backoff_ms: u64,

    /// Abandon an oracle call after this many ms (a transient timeout fault).
    #[arg(long)]
    oracle_timeout_ms: Option<u64>,

    // ---------------- oracle ----------------
    /**
     * Legality oracle:
     *   structural        king safety, pawn and bishop structure (default)
     *   legal | illegal   constant verdict (calibration)
     *   coin:<q>          hash-keyed Bernoulli with probability q
     */
    #[arg(long, default_value = "structural")]
    oracle: String,

    /// Structural oracle: accept pawns on the first and last ranks.
    #[arg(long)]
    allow_backrank_pawns: bool,

    // ---------------- class range ----------------
    /// Piece ceiling, kings included (2..=32).
    #[arg(long, default_value_t = 32)]
    max_pieces: usize,

    /// First class index (inclusive) of this invocation's range.
    #[arg(long, default_value_t = 0)]
    start: usize,

    /// Last class index (exclusive); defaults to the end of the enumeration.
    #[arg(long)]
    end: Option<usize>,

    /// Compute at most this many new classes, then stop cleanly.
    #[arg(long)]
    class_limit: Option<usize>,

    // ---------------- persistence / output ----------------
    /// Checkpoint file (JSON Lines). Resumes if it exists.
    #[arg(long)]
    checkpoint: Option<PathBuf>,

    /// Write results here instead of stdout.
    #[arg(long)]
    output: Option<PathBuf>,

    /// Output: table | csv | json
    #[arg(long, default_value = "table")]
    format: String,

    /// Verbosity: 0=summary only, 1=progress bar, 2=progress bar + row per class.
    #[arg(long, default_value_t = 1)]
    verbosity: u8,
}

fn main() {
    let cli = Cli::parse();

    let quiet_logs = matches!(&cli.command, Cmd::Run(a) if a.verbosity >= 1);
    let default_filter = if quiet_logs { "warn" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .init();

    let result = match cli.command {
        Cmd::Classes {
            max_pieces,
            limit,
            format,
        } => cmd_classes(max_pieces, limit, &format),
        Cmd::Run(args) => cmd_run(args),
        Cmd::Merge {
            files,
            format,
            output,
        } => cmd_merge(&files, &format, output),
    };

    if let Err(e) = result {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}

fn cmd_classes(max_pieces: usize, limit: Option<usize>, format: &str) -> Result<()> {
    let format = OutputFormat::from_cli(format)?;
    let enumerator = ClassEnumerator::new(MaterialLimits::with_max_pieces(max_pieces))?;
    let mut cache = DiagramCache::new();

    let stdout = io::stdout();
    let mut out = BufWriter::new(stdout.lock());
    match format {
        OutputFormat::Csv => writeln!(out, "index,class,pieces,diagrams")?,
        _ => writeln!(out, "{:>7} {:<36} {:>6} {}", "index", "class", "pieces", "diagrams")?,
    }

    let mut total = num_bigint::BigUint::default();
    for (i, class) in enumerator.iter().enumerate() {
        let n = cache.get(&class)?;
        if limit.is_none_or(|l| i < l) {
            match format {
                OutputFormat::Csv => {
                    writeln!(out, "{i},{class},{},{n}", class.total_pieces())?
                }
                _ => writeln!(out, "{i:>7} {:<36} {:>6} {n}", class.descriptor(), class.total_pieces())?,
            }
        }
        total += n;
    }
    writeln!(
        out,
        "TOTAL: classes={} raw_diagrams={total}",
        enumerator.len()
    )?;
    out.flush()?;
    Ok(())
}

fn build_oracle(name: &str, rules: StructuralRules, seed: u64) -> Result<Arc<dyn LegalityOracle>> {
    let oracle: Arc<dyn LegalityOracle> = match name {
        "structural" => Arc::new(StructuralOracle::new(rules)),
        "legal" => Arc::new(ConstantOracle::legal()),
        "illegal" => Arc::new(ConstantOracle::illegal()),
        s => match s.strip_prefix("coin:") {
            Some(q) => {
                let q: f64 = q
                    .parse()
                    .with_context(|| format!("bad coin probability in '{s}'"))?;
                if !(0.0..=1.0).contains(&q) {
                    bail!("coin probability {q} outside [0, 1]");
                }
                Arc::new(CoinOracle::new(q, seed))
            }
            None => bail!("unknown oracle '{s}' (structural | legal | illegal | coin:<q>)"),
        },
    };
    Ok(oracle)
}

fn cmd_run(args: RunArgs) -> Result<()> {
    let format = OutputFormat::from_cli(&args.format)?;
    let side_to_move = SideToMove::from_cli(&args.side_to_move)
        .with_context(|| format!("unknown side to move '{}'", args.side_to_move))?;

    let stopping = match args.trials {
        Some(trials) => StoppingRule::Fixed { trials },
        None => StoppingRule::Adaptive {
            target_rel_error: args.target_rel_error,
            min_trials: args.min_trials,
            max_trials: args.max_trials,
            abs_half_width: args.abs_half_width,
        },
    };

    let cfg = RunConfig {
        stopping,
        seed: args.seed,
        confidence: args.confidence,
        exact_threshold: args.exact_threshold,
        side_to_move,
        shards: args.shards,
        round_size: args.round_size,
        threads: args.threads,
        retry: RetryPolicy {
            max_retries: args.retries,
            backoff: Duration::from_millis(args.backoff_ms),
        },
    };

    let rules = StructuralRules {
        allow_backrank_pawns: args.allow_backrank_pawns,
        ..StructuralRules::default()
    };
    let mut oracle = build_oracle(&args.oracle, rules, args.seed)?;
    match args.oracle_timeout_ms {
        Some(0) => bail!("--oracle-timeout-ms must be positive"),
        Some(ms) => oracle = Arc::new(TimeoutOracle::new(oracle, Duration::from_millis(ms))),
        None => {}
    }

    // Configuration faults surface here, before any class is touched.
    let enumerator = ClassEnumerator::new(MaterialLimits::with_max_pieces(args.max_pieces))?;
    let header = cfg.header(&oracle.name(), args.max_pieces);
    let mut ctx = RunContext::new(cfg, &*oracle)?;

    let len = enumerator.len();
    let end = args.end.unwrap_or(len).min(len);
    if args.start > end {
        bail!("empty class range {}..{end} (enumeration has {len} classes)", args.start);
    }

    let (mut writer, resumed) = match &args.checkpoint {
        Some(path) => {
            let (w, done) = CheckpointWriter::open(path, &header)
                .with_context(|| format!("opening checkpoint {}", path.display()))?;
            (Some(w), done)
        }
        None => (None, Vec::new()),
    };

    info!(
        "oracle {} | classes {}..{end} of {len} | seed {} | confidence {}",
        header.oracle, args.start, header.seed, header.confidence
    );

    let classes = enumerator
        .iter()
        .enumerate()
        .skip(args.start)
        .take(end - args.start)
        .map(|(i, c)| (i as u64, c));

    let sink: Box<dyn ClassSink> = if args.verbosity >= 2 {
        Box::new(TableSink::new(20))
    } else {
        Box::new(NoopSink)
    };
    let mut runner = Runner::new(
        RunnerConfig {
            total_classes: (end - args.start) as u64,
            class_limit: args.class_limit,
            verbosity: args.verbosity,
        },
        sink,
    );
    let (outcome, stats) = runner.run(&mut ctx, classes, resumed, writer.as_mut())?;

    let global = aggregate(&outcome.estimates, ctx.z())?;
    emit(&args.output, format, &outcome.estimates, &global)?;

    // Final one-line summary (useful for logs / grep).
    println!(
        "DONE: computed={} resumed={} skipped={} interrupted={} elapsed={:.3}s trials/s={:.1} trials={} faults={} capped={} exhaustive={}{}",
        outcome.computed,
        outcome.resumed,
        outcome.skipped.len(),
        outcome.interrupted,
        stats.elapsed_secs(),
        stats.trials_per_sec(),
        stats.trials,
        stats.faults,
        stats.capped,
        stats.exhaustive,
        stats
            .slowest
            .as_ref()
            .map(|(c, d)| format!(" slowest={c} ({d:.2?})"))
            .unwrap_or_default(),
    );
    Ok(())
}

fn cmd_merge(files: &[PathBuf], format: &str, output: Option<PathBuf>) -> Result<()> {
    let format = OutputFormat::from_cli(format)?;
    let merged = merge_checkpoints(files).context("merging checkpoints")?;
    let z = z_for_confidence(merged.header.confidence)?;
    let global = aggregate(&merged.estimates, z)?;
    emit(&output, format, &merged.estimates, &global)
}

fn emit(
    output: &Option<PathBuf>,
    format: OutputFormat,
    estimates: &[census_engine::estimate::ClassEstimate],
    global: &census_engine::estimate::GlobalEstimate,
) -> Result<()> {
    match output {
        Some(path) => {
            let file = File::create(path)
                .with_context(|| format!("creating output file {}", path.display()))?;
            let mut out = BufWriter::new(file);
            write_results(&mut out, format, estimates, global)?;
            out.flush()?;
            println!("{}", summary_line(global));
        }
        None => {
            let stdout = io::stdout();
            let mut out = BufWriter::new(stdout.lock());
            write_results(&mut out, format, estimates, global)?;
            out.flush()?;
            // Keep machine-readable stdout clean.
            if format != OutputFormat::Table {
                eprintln!("{}", summary_line(global));
            }
        }
    }
    Ok(())
}
