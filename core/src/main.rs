use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use indicatif::{ProgressBar, ProgressStyle};
use nullnova::drives::DriveDetector;
use nullnova::executor::concurrent::effective_lanes;
use nullnova::progress::LogSink;
use nullnova::scheduler::partition_lanes;
use nullnova::*;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "nullnova")]
#[command(about = "Chunked, lane-parallel block device overwrite")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable debug logging
    #[arg(long, global = true)]
    debug: bool,

    /// Emit logs as JSON lines on stderr
    #[arg(long, global = true)]
    json_logs: bool,

    /// Configuration file (defaults to the per-user config location)
    #[arg(long, global = true, env = "NULLNOVA_CONFIG")]
    config: Option<PathBuf>,

    /// Skip the root privilege check (DANGEROUS!)
    #[arg(long, global = true)]
    unsafe_mode: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Overwrite a whole device
    Wipe {
        /// Device path (e.g. /dev/sdb)
        device: PathBuf,

        /// Overwrite method
        #[arg(short, long, value_enum, default_value_t = MethodArg::Dod)]
        method: MethodArg,

        /// Chunk size in MiB
        #[arg(long, default_value_t = 128, value_parser = clap::value_parser!(u64).range(16..=512))]
        chunk_size_mb: u64,

        /// Run this many lanes in parallel instead of one sequential pass
        #[arg(short, long)]
        lanes: Option<usize>,

        /// Skip the sampling read-back after the last pass
        #[arg(long)]
        no_verify: bool,

        /// Open the device with O_DIRECT
        #[arg(long)]
        direct_io: bool,

        /// Write the JSON report here
        #[arg(short, long)]
        report: Option<PathBuf>,

        /// Do not ask for confirmation
        #[arg(long)]
        force: bool,
    },

    /// Show the chunk plan for a capacity without touching any device
    Plan {
        /// Capacity in bytes
        #[arg(long)]
        capacity: u64,

        /// Chunk size in MiB
        #[arg(long, default_value_t = 128)]
        chunk_size_mb: u64,

        /// Show how chunks split across this many lanes
        #[arg(short, long)]
        lanes: Option<usize>,
    },

    /// Print what the engine would be told about a device
    Probe {
        device: PathBuf,
    },

    /// Check a saved report's digest
    VerifyReport {
        path: PathBuf,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum MethodArg {
    /// DoD 5220.22-M 3-pass
    Dod,
    /// Zeros then encrypted zeros under a discarded key
    Crypto,
}

impl From<MethodArg> for WipeMethod {
    fn from(arg: MethodArg) -> Self {
        match arg {
            MethodArg::Dod => WipeMethod::DoDThreePass,
            MethodArg::Crypto => WipeMethod::CryptoErase,
        }
    }
}

/// Terminal progress bar fed by the engine's progress monitor
struct BarSink {
    bar: ProgressBar,
}

impl BarSink {
    fn new() -> Self {
        let bar = ProgressBar::new(0);
        bar.set_style(
            ProgressStyle::with_template("{spinner} [{elapsed_precise}] [{bar:40}] {percent:>3}% ({eta} left)")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("=> "),
        );
        Self { bar }
    }
}

impl ProgressSink for BarSink {
    fn on_progress(&self, snapshot: ProgressSnapshot) {
        self.bar.set_length(snapshot.operations_total);
        self.bar.set_position(snapshot.operations_done);
        if snapshot.is_complete() {
            self.bar.finish();
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.debug, cli.json_logs);

    match cli.command {
        Commands::Wipe {
            ref device,
            method,
            chunk_size_mb,
            lanes,
            no_verify,
            direct_io,
            ref report,
            force,
        } => {
            if !cli.unsafe_mode && !is_root() {
                eprintln!("Error: This program requires root privileges.");
                eprintln!("Please run with sudo or as root user.");
                std::process::exit(1);
            }

            let mut config = EngineConfig::load_from(cli.config.as_deref())?;
            if no_verify {
                config.verify = false;
            }
            if direct_io {
                config.use_direct_io = true;
            }

            let concurrency = match lanes {
                Some(n) => Concurrency::Parallel(n),
                None => Concurrency::Sequential,
            };
            let status = wipe_drive(
                device,
                method.into(),
                mib_to_bytes(chunk_size_mb)?,
                concurrency,
                config,
                report.as_deref(),
                force,
            )?;

            match status {
                JobStatus::Completed => {}
                JobStatus::Cancelled => std::process::exit(130),
                _ => std::process::exit(1),
            }
        }
        Commands::Plan {
            capacity,
            chunk_size_mb,
            lanes,
        } => show_plan(capacity, mib_to_bytes(chunk_size_mb)?, lanes)?,
        Commands::Probe { ref device } => {
            let device = DriveDetector::probe(device)?;
            println!("{}", serde_json::to_string_pretty(&device)?);
        }
        Commands::VerifyReport { ref path } => {
            let report = WipeReport::load(path)?;
            if report.verify_digest()? {
                println!("✅ Report {} is intact ({})", report.job_id, report.status);
            } else {
                println!("❌ Report {} has been modified since it was sealed", report.job_id);
                std::process::exit(1);
            }
        }
    }

    Ok(())
}

fn init_logging(debug: bool, json: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(if debug { "debug" } else { "info" }));

    if json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_writer(io::stderr)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .with_writer(io::stderr)
            .init();
    }
}

fn is_root() -> bool {
    nix::unistd::geteuid().is_root()
}

fn wipe_drive(
    device_path: &Path,
    method: WipeMethod,
    chunk_size: u64,
    concurrency: Concurrency,
    config: EngineConfig,
    report_path: Option<&Path>,
    force: bool,
) -> Result<JobStatus> {
    let device = DriveDetector::probe(device_path)
        .with_context(|| format!("Failed to probe {}", device_path.display()))?;

    if device.is_system {
        bail!(
            "{} hosts a mounted system filesystem and will not be wiped",
            device_path.display()
        );
    }

    println!("Device:   {}", device.path_display());
    println!("Capacity: {} bytes", device.capacity_bytes);
    println!("Method:   {}", method);
    println!("Passes:   {}", method.passes().iter().map(|p| p.label()).collect::<Vec<_>>().join(", "));

    if !force && !confirm(&device)? {
        println!("Aborted.");
        return Ok(JobStatus::Cancelled);
    }

    let mut engine = WipeEngine::new(config)?;
    setup_signal_handlers(engine.cancel_token())?;

    let bar = Arc::new(BarSink::new());
    engine.add_progress_sink(bar.clone());
    engine.add_progress_sink(Arc::new(LogSink::default()));

    let job = WipeJob::new(device, method, chunk_size, concurrency)?;
    let report = engine.run(job);
    bar.bar.finish_and_clear();

    print_summary(&report);

    if let Some(path) = report_path {
        report.save(path)?;
        println!("📄 Report saved to {}", path.display());
    }

    Ok(report.status)
}

fn confirm(device: &Device) -> Result<bool> {
    println!();
    println!("⚠️  ALL DATA ON {} WILL BE DESTROYED", device.path_display());
    print!("Type 'YES' to continue: ");
    io::stdout().flush()?;

    let mut input = String::new();
    io::stdin().read_line(&mut input)?;
    Ok(input.trim() == "YES")
}

fn print_summary(report: &WipeReport) {
    let duration = report.duration().to_std().unwrap_or_default();
    println!();
    match report.status {
        JobStatus::Completed => println!("✅ Wipe completed"),
        JobStatus::Cancelled => println!("🛑 Wipe cancelled; the device is partially overwritten"),
        _ => println!("❌ Wipe failed; the device is partially overwritten"),
    }
    println!("  Job:      {}", report.job_id);
    println!("  Chunks:   {}/{}", report.chunks_completed, report.chunks_planned);
    println!("  Written:  {} bytes", report.bytes_written);
    println!("  Lanes:    {}", report.lanes);
    println!("  Duration: {}", humantime::format_duration(duration));
    println!("  Verified: {}", if report.verified { "yes" } else { "no" });
    for err in &report.errors {
        match (err.lane, err.chunk) {
            (Some(lane), Some(chunk)) => println!("  ⚠️  lane {} chunk {}: {}", lane, chunk, err.message),
            (Some(lane), None) => println!("  ⚠️  lane {}: {}", lane, err.message),
            _ => println!("  ⚠️  {}", err.message),
        }
    }
}

fn mib_to_bytes(mb: u64) -> Result<u64> {
    mb.checked_mul(1024 * 1024)
        .with_context(|| format!("chunk size of {} MiB overflows", mb))
}

fn show_plan(capacity: u64, chunk_size: u64, lanes: Option<usize>) -> Result<()> {
    let chunks = ChunkScheduler::plan(capacity, chunk_size)?;
    println!("{} chunk(s) of up to {} bytes", chunks.len(), chunk_size);

    match lanes {
        Some(requested) => {
            let config = EngineConfig::default();
            let lanes = effective_lanes(requested, config.max_lanes, chunks.len());
            for (lane, range) in partition_lanes(chunks.len(), lanes).into_iter().enumerate() {
                let start = chunks[range.start].offset;
                let end = chunks[range.end - 1].end();
                println!(
                    "  lane {:>2}: chunks {:>5}..{:<5} bytes {}..{}",
                    lane, range.start, range.end, start, end
                );
            }
        }
        None => {
            for chunk in &chunks {
                println!("  {:>5}  offset {:>16}  length {:>12}", chunk.index, chunk.offset, chunk.length);
            }
        }
    }
    Ok(())
}

// Signal handler for graceful shutdown
fn setup_signal_handlers(cancel: CancelToken) -> Result<()> {
    use signal_hook::{
        consts::{SIGINT, SIGTERM},
        iterator::Signals,
    };

    let mut signals = Signals::new([SIGINT, SIGTERM])?;

    std::thread::Builder::new()
        .name("nullnova-signals".into())
        .spawn(move || {
            if let Some(sig) = signals.forever().next() {
                eprintln!("\n\n🛑 Signal {} received! Stopping at the next chunk boundary...", sig);
                cancel.cancel();
            }
        })?;

    Ok(())
}
