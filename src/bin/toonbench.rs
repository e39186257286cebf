use clap::{Parser, Subcommand, ValueEnum};
use std::fs;
use std::io::{self, Write};
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;
use toonbench::dataset::{self, DEFAULT_USERS};
use toonbench::fixtures::Fixtures;
use toonbench::harness::{BenchConfig, Profile, Runner};
use toonbench::memory::TrackingAllocator;
use toonbench::schema::{BenchReport, RunMeta};
use toonbench::suite::{Suite, SuiteReport};
use toonbench::{CodecKind, Result};
use tracing_subscriber::EnvFilter;

#[global_allocator]
static GLOBAL: TrackingAllocator = TrackingAllocator;

#[derive(Clone, Copy, Debug, ValueEnum)]
enum ProfileArg {
    Quick,
    Full,
}

impl From<ProfileArg> for Profile {
    fn from(v: ProfileArg) -> Self {
        match v {
            ProfileArg::Quick => Profile::Quick,
            ProfileArg::Full => Profile::Full,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, ValueEnum, PartialEq, Eq)]
enum OutputFormat {
    /// Per-case result blocks and a summary table.
    #[default]
    Text,
    /// A single JSON report.
    Json,
}

#[derive(clap::Args, Debug, Default)]
struct RunArgs {
    /// Time budget per case in seconds (overrides the profile).
    #[arg(long, value_name = "SECS", allow_negative_numbers = true, value_parser = parse_time_budget)]
    time: Option<Duration>,

    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    format: OutputFormat,

    /// Where to write the JSON report. If omitted with --format json, prints to stdout.
    #[arg(long)]
    out: Option<PathBuf>,
}

fn parse_time_budget(s: &str) -> std::result::Result<Duration, String> {
    let secs: f64 = s
        .parse()
        .map_err(|_| format!("`{s}` is not a number of seconds"))?;
    if secs < 0.0 {
        return Err(format!("`{s}` is negative"));
    }
    Duration::try_from_secs_f64(secs).map_err(|e| format!("`{s}` is not a usable duration: {e}"))
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Measure encode/decode throughput for every selected codec (default).
    Run(RunArgs),

    /// Round-trip the fixture through every selected codec and compare.
    Verify,

    /// Show encoded size and SHA-256 of the fixture per codec.
    Fixtures {
        /// Also write each encoded form into this directory.
        #[arg(long, short = 'o', value_name = "DIR")]
        output: Option<PathBuf>,
    },
}

#[derive(Parser, Debug)]
#[command(name = "toonbench")]
#[command(about = "Serialization micro-benchmarks: JSON vs TOON vs protobuf vs bincode")]
struct Args {
    #[arg(long, value_enum, default_value_t = ProfileArg::Quick, global = true)]
    profile: ProfileArg,

    /// Number of user records in the fixture payload.
    #[arg(long, default_value_t = DEFAULT_USERS, global = true)]
    users: usize,

    /// Codec to include. Can be provided multiple times; defaults to all.
    #[arg(long, value_enum, action = clap::ArgAction::Append, global = true)]
    codec: Vec<CodecKind>,

    /// Log filter (e.g. "info", "toonbench=debug"); RUST_LOG takes precedence.
    #[arg(long, default_value = "warn", global = true)]
    log_level: String,

    #[command(subcommand)]
    cmd: Option<Command>,
}

fn init_tracing(default_filter: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .init();
}

fn now_utc() -> String {
    use std::time::{SystemTime, UNIX_EPOCH};
    let secs = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs();
    format!("unix:{secs}")
}

fn git_sha_short() -> Option<String> {
    // Best-effort: read from environment set by CI/build scripts.
    std::env::var("GIT_SHA")
        .ok()
        .or_else(|| std::env::var("GITHUB_SHA").ok())
        .map(|s| s.chars().take(12).collect())
}

fn selected_codecs(args: &Args) -> Vec<CodecKind> {
    if args.codec.is_empty() {
        CodecKind::ALL.to_vec()
    } else {
        args.codec.clone()
    }
}

fn print_summary(out: &mut dyn Write, report: &SuiteReport) -> io::Result<()> {
    let total_ms = report.total_wall_ns as f64 / 1e6;
    writeln!(
        out,
        "\nAll done. Total wall-clock for bench run: {:.0} ms ({:.3} s)\n",
        total_ms,
        total_ms / 1000.0
    )?;
    writeln!(out, "Summary:")?;
    for r in &report.results {
        let ns = if r.nanos_per_op.is_finite() {
            format!("{:.0}", r.nanos_per_op)
        } else {
            "N/A".to_string()
        };
        writeln!(
            out,
            "- {:28} elapsed(ms): {:>8.0}  ops/sec: {:>12.2}  ns/op: {:>12}",
            r.name,
            r.elapsed_ns as f64 / 1e6,
            r.ops_per_second,
            ns
        )?;
    }
    Ok(())
}

fn run(args: &Args, run_args: &RunArgs, fixtures: &Fixtures) -> Result<()> {
    let mut cfg = BenchConfig::new(args.profile.into());
    if let Some(budget) = run_args.time {
        cfg.max_time = budget;
    }
    let runner = Runner::new(cfg);
    runner.check_probe()?;

    let mut suite = Suite::new();
    suite.extend(fixtures.cases())?;

    let stdout = io::stdout();
    let mut stdout = stdout.lock();
    let text = run_args.format == OutputFormat::Text;
    if text {
        writeln!(
            stdout,
            "Starting benchmarks. Ensure minimal other activity for best results."
        )?;
        writeln!(stdout, "Payload users = {}", fixtures.payload().len())?;
    }

    let mut sink = io::sink();
    let progress: &mut dyn Write = if text { &mut stdout } else { &mut sink };
    let report = suite.run(&runner, progress)?;

    if text {
        print_summary(&mut stdout, &report)?;
    }

    if !text || run_args.out.is_some() {
        let bench_report = BenchReport {
            run: RunMeta {
                schema_version: 1,
                bench_version: env!("CARGO_PKG_VERSION").to_string(),
                profile: runner.config().profile.as_str().to_string(),
                users: fixtures.payload().len(),
                codecs: fixtures
                    .kinds()
                    .iter()
                    .map(|k| k.as_str().to_string())
                    .collect(),
                timestamp_utc: now_utc(),
                git_sha: git_sha_short(),
                total_wall_ns: report.total_wall_ns,
            },
            results: report.results,
        };
        let json = serde_json::to_string_pretty(&bench_report)?;
        match &run_args.out {
            Some(out) => fs::write(out, json)?,
            None => writeln!(stdout, "{json}")?,
        }
    }
    Ok(())
}

fn real_main(args: Args) -> Result<()> {
    let kinds = selected_codecs(&args);
    let payload = dataset::generate_payload(args.users);
    let fixtures = Fixtures::build(payload, &kinds)?;

    match &args.cmd {
        None => run(&args, &RunArgs::default(), &fixtures),
        Some(Command::Run(run_args)) => run(&args, run_args, &fixtures),
        Some(Command::Verify) => {
            fixtures.verify()?;
            for kind in fixtures.kinds() {
                println!("{kind}: ok");
            }
            Ok(())
        }
        Some(Command::Fixtures { output }) => {
            println!("Payload users = {}", fixtures.payload().len());
            for size in fixtures.sizes() {
                println!(
                    "{:10} {:>12} bytes  sha256:{}",
                    size.codec.as_str(),
                    size.bytes,
                    size.sha256
                );
            }
            if let Some(dir) = output {
                for path in fixtures.write_to(dir)? {
                    eprintln!("wrote {}", path.display());
                }
            }
            Ok(())
        }
    }
}

fn main() -> ExitCode {
    let args = Args::parse();
    init_tracing(&args.log_level);

    match real_main(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::from(e.exit_code())
        }
    }
}
