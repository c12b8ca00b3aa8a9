//! Timer Entropy CLI
//!
//! Runs the boot-time self-test, samples the noise source, or dumps a
//! seeded LCG run, against the simulated capture timer.

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use timer_entropy::{
    capture::{FileConfig, OutputConfig, SimulatedTimer},
    extraction::{NoiseSampler, MAX_BITS},
    metrics::{MetricsRegistry, MetricsSnapshot},
    selftest::{boot_dump, BlinkDriver, SelfTestRunner, StatusCell, DEFAULT_DUMP_WORDS},
};
use tracing::{debug, error, info, warn};

#[derive(Debug, Parser)]
#[command(name = "timer-entropy", version, about)]
struct Cli {
    /// TOML configuration file.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Seed for the simulated timer's jitter (default: OS entropy).
    #[arg(long, global = true)]
    timer_seed: Option<u64>,

    /// Probability that a captured LSB reads as 1.
    #[arg(long, global = true)]
    one_probability: Option<f64>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run the boot self-test and blink the result.
    Selftest {
        /// Write the self-test report to this TOML file.
        #[arg(long)]
        report: Option<PathBuf>,

        /// Blink ticks before exiting (0 = until Ctrl-C).
        #[arg(long)]
        blink_cycles: Option<u64>,

        /// Serve metrics on this port while blinking.
        #[arg(long)]
        metrics_port: Option<u16>,
    },
    /// Print words drawn from the noise source.
    Sample {
        /// Number of words.
        #[arg(short = 'n', long, default_value_t = 8)]
        count: usize,

        /// Bits per word (1-16).
        #[arg(short, long, default_value_t = MAX_BITS)]
        bits: u8,
    },
    /// Print a hardware seed followed by its LCG continuation.
    Dump {
        /// Total number of words.
        #[arg(short = 'n', long, default_value_t = DEFAULT_DUMP_WORDS)]
        count: usize,
    },
}

fn main() -> ExitCode {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let cli = Cli::parse();
    info!("Timer Entropy v{}", timer_entropy::VERSION);

    let mut config = match &cli.config {
        Some(path) => match FileConfig::from_file(path) {
            Ok(config) => config,
            Err(e) => {
                error!("Failed to load config {}: {}", path.display(), e);
                return ExitCode::from(2);
            }
        },
        None => FileConfig::default(),
    };

    if cli.timer_seed.is_some() {
        config.timer.seed = cli.timer_seed;
    }
    if let Some(p) = cli.one_probability {
        config.timer.one_probability = p;
    }
    if let Err(e) = config.validate() {
        error!("Invalid configuration: {}", e);
        return ExitCode::from(2);
    }

    let command = cli.command.unwrap_or(Command::Selftest {
        report: None,
        blink_cycles: None,
        metrics_port: None,
    });

    match command {
        Command::Selftest {
            report,
            blink_cycles,
            metrics_port,
        } => {
            if let Some(path) = report {
                config.output.report_path = Some(path);
            }
            if let Some(cycles) = blink_cycles {
                config.indicator.cycles = (cycles > 0).then_some(cycles);
            }
            if let Some(port) = metrics_port {
                config.output.metrics_port = port;
            }
            run_selftest(&config)
        }
        Command::Sample { count, bits } => run_sample(&config, count, bits),
        Command::Dump { count } => run_dump(&config, count),
    }
}

fn run_selftest(config: &FileConfig) -> ExitCode {
    let timer = SimulatedTimer::from_config(&config.timer);
    let mut runner = match SelfTestRunner::from_config(timer, config) {
        Ok(runner) => runner,
        Err(e) => {
            error!("Invalid self-test configuration: {}", e);
            return ExitCode::from(2);
        }
    };

    let cell = Arc::new(StatusCell::new());
    let registry = match MetricsRegistry::new() {
        Ok(registry) => Arc::new(registry),
        Err(e) => {
            error!("Failed to create metrics registry: {}", e);
            return ExitCode::FAILURE;
        }
    };
    serve_metrics(&registry, &cell, &config.output);

    let mut indicator = Arc::clone(&cell);
    info!("Running self-test...");
    let outcome = runner.run(&mut indicator);

    match &outcome {
        Ok(report) => {
            info!(
                "Self-test finished: {} (hardware sum {}/{}, stream sum {}/{})",
                report.status,
                report.hardware.sum,
                report.hardware.max_abs_sum,
                report.stream.sum,
                report.stream.max_abs_sum,
            );

            if let Some(path) = &config.output.report_path {
                if let Err(e) = report.write_to(path) {
                    warn!("Report not written: {}", e);
                }
            }
        }
        Err(e) => error!("Self-test aborted: {}", e),
    }

    registry.update(&MetricsSnapshot::from_outcome(
        &outcome,
        cell.get(),
        runner.sampler().capture_events(),
        1,
    ));
    match registry.encode() {
        Ok(text) => debug!("Metrics:\n{}", text),
        Err(e) => warn!("Failed to encode metrics: {}", e),
    }

    let stop = Arc::new(AtomicBool::new(false));
    {
        let stop = Arc::clone(&stop);
        if let Err(e) = ctrlc::set_handler(move || stop.store(true, Ordering::Relaxed)) {
            warn!("Ctrl-C handler not installed: {}", e);
        }
    }

    let mut driver = BlinkDriver::new(Arc::clone(&cell));
    driver.run(&config.indicator, &stop, |led| {
        info!(
            red = led.red,
            green = led.green,
            "[{}] [{}]",
            if led.red { "R" } else { " " },
            if led.green { "G" } else { " " }
        );
    });

    match cell.get() {
        Some(status) if status.is_ok() => ExitCode::SUCCESS,
        Some(status) => ExitCode::from(10 + status.bits()),
        None => ExitCode::FAILURE,
    }
}

#[cfg(feature = "metrics")]
fn serve_metrics(registry: &Arc<MetricsRegistry>, cell: &Arc<StatusCell>, output: &OutputConfig) {
    use timer_entropy::metrics::{MetricsServer, MetricsServerConfig};

    let Some(server_config) = MetricsServerConfig::from_output(output) else {
        return;
    };
    let server = MetricsServer::new(server_config, Arc::clone(registry), Arc::clone(cell));

    std::thread::spawn(move || {
        let runtime = match tokio::runtime::Runtime::new() {
            Ok(runtime) => runtime,
            Err(e) => {
                warn!("Metrics runtime not started: {}", e);
                return;
            }
        };
        if let Err(e) = runtime.block_on(server.run()) {
            warn!("Metrics exporter stopped: {}", e);
        }
    });
}

#[cfg(not(feature = "metrics"))]
fn serve_metrics(_registry: &Arc<MetricsRegistry>, _cell: &Arc<StatusCell>, output: &OutputConfig) {
    if output.metrics_port != 0 {
        warn!(
            "Built without the `metrics` feature; not serving port {}",
            output.metrics_port
        );
    }
}

fn run_sample(config: &FileConfig, count: usize, bits: u8) -> ExitCode {
    let timer = SimulatedTimer::from_config(&config.timer);
    let mut sampler = NoiseSampler::with_config(timer, config.sampler.clone());

    for _ in 0..count {
        match sampler.sample_bits(bits) {
            Ok(word) => println!("{:#06x}", word),
            Err(e) => {
                error!("Sampling failed: {}", e);
                return ExitCode::FAILURE;
            }
        }
    }

    info!(
        "Drew {} words from {} capture events",
        sampler.words_sampled(),
        sampler.capture_events()
    );
    ExitCode::SUCCESS
}

fn run_dump(config: &FileConfig, count: usize) -> ExitCode {
    let timer = SimulatedTimer::from_config(&config.timer);
    let mut sampler = NoiseSampler::with_config(timer, config.sampler.clone());
    let mut indicator = Arc::new(StatusCell::new());

    info!("Red on: waiting for the hardware seed");
    match boot_dump(&mut sampler, count, &mut indicator) {
        Ok(words) => {
            info!("Green on: dump complete");
            for (i, word) in words.iter().enumerate() {
                println!("{:2}: {:#06x}", i, word);
            }
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("Dump failed: {}", e);
            ExitCode::FAILURE
        }
    }
}
