//! meshsim CLI
//!
//! Run gossip/block-publication experiments with configurable overlay and
//! consensus parameters. Single-threaded and reproducible when the same
//! seed is used.
//!
//! # Example
//!
//! ```bash
//! # One deterministic experiment on a 30-peer partial mesh
//! meshsim --seed 42 -p 30 -v 7 -d 60000 -o results.csv
//!
//! # Five repetitions of a full-mesh run with derived seeds
//! meshsim -p 10 --full-mesh --runs 5 --blocktime-ms 2000
//! ```

use clap::Parser;
use meshsim_engine::{ExperimentParams, TopologyConfig};
use meshsim_simulator::{BatchRunner, ExperimentRecord};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// meshsim experiment driver
///
/// Builds one experiment record per run, executes them sequentially and
/// appends one CSV row per experiment.
#[derive(Parser, Debug)]
#[command(name = "meshsim")]
#[command(version, about, long_about = None)]
struct Args {
    /// Number of peers in the overlay
    #[arg(short = 'p', long, default_value = "30")]
    peers: u32,

    /// Connect every pair of peers instead of sampling a partial graph
    #[arg(long)]
    full_mesh: bool,

    /// Minimum connections per peer
    #[arg(long, default_value = "3")]
    min_connections: u32,

    /// Maximum connections per peer
    #[arg(long, default_value = "12")]
    max_connections: u32,

    /// Lower clamp for edge delays (ms)
    #[arg(long, default_value = "10")]
    delay_min: u32,

    /// Upper clamp for edge delays (ms)
    #[arg(long, default_value = "200")]
    delay_max: u32,

    /// Multiplier applied to edge delays
    #[arg(long, default_value = "1")]
    delay_multiplier: u32,

    /// Number of validators
    #[arg(short = 'v', long, default_value = "7")]
    validators: u32,

    /// Simulated duration in ms
    #[arg(short = 'd', long, default_value = "1800000")]
    duration_ms: u64,

    /// Transactions injected per step
    #[arg(long, default_value = "150000")]
    injection_count: u64,

    /// Simulation step in ms
    #[arg(long, default_value = "1000")]
    step_ms: u64,

    /// Quorum threshold: percentage of the block a validator must know
    #[arg(long, default_value = "95.0")]
    threshold: f64,

    /// Blocktime in ms; also the forced-publish deadline
    #[arg(long, default_value = "3000")]
    blocktime_ms: u64,

    /// Per-sender bandwidth in KB/ms
    #[arg(long, default_value = "1000.0")]
    bandwidth: f64,

    /// Maximum transactions per block
    #[arg(long, default_value = "500000")]
    max_tx: usize,

    /// Maximum block size in KB
    #[arg(long, default_value = "1000000")]
    max_block_kb: u64,

    /// Minimum injected transaction size in KB
    #[arg(long, default_value = "1")]
    tx_size_min: u32,

    /// Maximum injected transaction size in KB
    #[arg(long, default_value = "5")]
    tx_size_max: u32,

    /// Knowledge-bitmap rows. When omitted, sized to cover every id the
    /// run can inject.
    #[arg(long)]
    known_rows: Option<u64>,

    /// Knowledge-bitmap columns
    #[arg(long, default_value = "20")]
    known_cols: u64,

    /// Random seed for reproducible results. When omitted, a random seed
    /// is used.
    #[arg(long)]
    seed: Option<u64>,

    /// Number of experiment repetitions (seeds derived from the base seed)
    #[arg(long, default_value = "1")]
    runs: u64,

    /// Output CSV path
    #[arg(short = 'o', long, default_value = "results.csv")]
    output: PathBuf,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("warn,meshsim_simulator=info")),
        )
        .init();

    let args = Args::parse();
    let seed = args.seed.unwrap_or_else(rand::random);

    let topology = TopologyConfig::new()
        .with_num_peers(args.peers)
        .with_full_mesh(args.full_mesh)
        .with_connections(args.min_connections, args.max_connections)
        .with_delay_range(args.delay_min, args.delay_max)
        .with_delay_multiplier(args.delay_multiplier);

    let params = ExperimentParams::new()
        .with_total_sim_ms(args.duration_ms)
        .with_injection_count(args.injection_count)
        .with_step_ms(args.step_ms)
        .with_threshold_pct(args.threshold)
        .with_blocktime_ms(args.blocktime_ms)
        .with_bandwidth_kb_per_ms(args.bandwidth)
        .with_max_tx_per_block(args.max_tx)
        .with_max_block_kb(args.max_block_kb);

    // Enough rows for every id the run can inject.
    let known_rows = args.known_rows.unwrap_or_else(|| {
        let max_steps = args.duration_ms / args.step_ms.max(1) + 1;
        max_steps * args.injection_count / args.known_cols.max(1) + 1
    });

    info!(
        seed,
        runs = args.runs,
        peers = args.peers,
        validators = args.validators,
        duration_ms = args.duration_ms,
        known_rows,
        known_cols = args.known_cols,
        "Starting experiment batch"
    );

    let mut runner = BatchRunner::new();
    for run in 0..args.runs {
        let record = ExperimentRecord::new()
            .with_id(run)
            .with_seed(seed.wrapping_add(run))
            .with_topology(topology.clone())
            .with_validators(args.validators)
            .with_known_shape(known_rows, args.known_cols)
            .with_tx_size_range(args.tx_size_min, args.tx_size_max)
            .with_params(params.clone());
        runner
            .run(record)
            .expect("experiment failed: invalid configuration");
    }

    runner
        .write_csv(&args.output)
        .expect("failed to write result CSV");
    info!(output = %args.output.display(), "Results written");

    runner.print_summary();
}
