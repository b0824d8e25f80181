use std::fs::File;
use std::io::BufReader;
use std::path::PathBuf;
use std::time::Instant;
use clap::{Parser, Subcommand, ValueEnum};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;
use cachelib::config::SimulationConfig;
use cachelib::error::SimulationError;
use cachelib::io::open_trace;
use cachelib::observer::TracingObserver;
use cachelib::simulator::{PolicyComparison, Simulator};
use cachelib::trace::read_way_trace;

#[cfg(debug_assertions)]
const DEBUG_DEFAULT: bool = true;

#[cfg(not(debug_assertions))]
const DEBUG_DEFAULT: bool = false;

#[derive(Parser, Debug)]
#[command(about = String::from("Set associative cache simulator"))]
struct Args {
    /// More log output on stderr, repeat for more. RUST_LOG takes precedence when set
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Replay an access trace over every cache in a JSON configuration
    Run {
        config: PathBuf,
        trace: PathBuf,

        #[arg(short, long, value_enum, default_value_t = Format::Text)]
        format: Format,

        #[arg(short, long)]
        performance: bool,

        #[arg(short, long, default_value_t = DEBUG_DEFAULT)]
        debug: bool,
    },
    /// Feed a trace of way indices to every replacement policy and show the victims they pick
    Policies {
        trace: PathBuf,

        #[arg(short, long, default_value_t = 4)]
        ways: usize,

        #[arg(short, long, default_value_t = 0)]
        seed: u64,

        #[arg(short, long, value_enum, default_value_t = Format::Text)]
        format: Format,
    },
}

#[derive(ValueEnum, Copy, Clone, Debug, PartialEq, Eq)]
enum Format {
    Text,
    Json,
}

fn init_logging(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> Result<(), SimulationError> {
    let args = Args::parse();
    init_logging(args.verbose);
    match args.command {
        Command::Run { config, trace, format, performance, debug } => run(config, trace, format, performance, debug),
        Command::Policies { trace, ways, seed, format } => policies(trace, ways, seed, format),
    }
}

fn run(config_path: PathBuf, trace_path: PathBuf, format: Format, performance: bool, debug: bool) -> Result<(), SimulationError> {
    let start = Instant::now();
    let config_file = File::open(&config_path)?;
    let config: SimulationConfig = serde_json::from_reader(BufReader::new(config_file))?;
    info!(path = %config_path.display(), caches = config.caches.len(), "loaded configuration");
    let mut simulator = Simulator::with_observer(&config, TracingObserver)?;
    let result = simulator.simulate(open_trace(&trace_path)?)?;
    match format {
        Format::Text => print!("{result}"),
        Format::Json => println!("{}", serde_json::to_string_pretty(&result)?),
    }
    if performance {
        let total_time = start.elapsed();
        println!("Simulation time: {}s", simulator.get_execution_time().as_nanos() as f64 / 1e9);
        println!("Total execution time (includes initial parsing, configuration, and output): {}s", total_time.as_nanos() as f64 / 1e9)
    }
    if debug {
        #[cfg(debug_assertions)]
        println!("Running the debug binary, debug mode is enabled by default. If benchmarking, do not use this binary, re-compile with the --release argument when using cargo run");
        println!("Parsed input configuration: {config:?}");
        for (name, cache) in simulator.caches() {
            println!("{name}:");
            println!("{}", cache.geometry());
            println!("{}", cache.dump_contents());
        }
        let uninitialised_lines = simulator.get_uninitialised_line_counts();
        let formatted = config.caches
            .iter()
            .map(|c| c.name.as_str())
            .zip(uninitialised_lines.iter())
            .map(|(name, count)| format!("{name}: {count}"))
            .collect::<Vec<_>>()
            .join(", ");
        println!("Uninitialised cache lines by cache: ({formatted})");
        println!("Total uninitialised cache lines: {}", uninitialised_lines.iter().sum::<u64>())
    }
    Ok(())
}

fn policies(trace_path: PathBuf, ways: usize, seed: u64, format: Format) -> Result<(), SimulationError> {
    let trace = read_way_trace(open_trace(&trace_path)?, ways)?;
    debug!(accesses = trace.ways.len(), skipped = trace.skipped, "read way trace");
    let comparison = PolicyComparison::run(&trace.ways, ways, seed).map_err(|source| SimulationError::Configuration {
        name: format!("{ways}-way comparison"),
        source,
    })?;
    match format {
        Format::Text => print!("{comparison}"),
        Format::Json => println!("{}", serde_json::to_string_pretty(&comparison)?),
    }
    if trace.skipped > 0 {
        println!("{} malformed entries skipped", trace.skipped);
    }
    Ok(())
}
