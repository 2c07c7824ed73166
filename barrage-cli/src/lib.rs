//! Barrage command line
//!
//! `barrage attack` loads a plan, fires it at the configured rate and writes
//! one JSON line per result.

use anyhow::Context;
use attack_engine::config::{
    DEFAULT_CONNECTIONS, DEFAULT_EXTRACT_FIELD, DEFAULT_MAX_CONNECTIONS, DEFAULT_MAX_WORKERS, DEFAULT_REDIRECTS,
    DEFAULT_WORKERS,
};
use attack_engine::{parse_std_duration, AttackStatistics, Attacker, AttackerConfig, ConstantPacer, StaticTargeter};
use attack_plan::{load_plan, PlanFile, PlanFormat};
use clap::{ArgAction, Args, Parser, Subcommand};
use std::fs::File;
use std::net::IpAddr;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

pub mod logging;
pub mod output;


pub use logging::{init_logging, LoggingConfig};
pub use output::{open_output, JsonLinesEncoder};

#[derive(Parser, Debug, Clone)]
#[command(name = "barrage", author, version, about, long_about = None)]
pub struct Cli {
    #[command(flatten)]
    pub logging: LogArgs,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Run a load test against the targets of a plan
    Attack(AttackArgs),
}

#[derive(Args, Debug, Clone)]
pub struct LogArgs {
    /// Log level or filter directive; RUST_LOG takes precedence
    #[arg(long, global = true, env = "BARRAGE_LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    /// Emit logs as JSON lines on stderr
    #[arg(long, global = true, env = "BARRAGE_LOG_JSON")]
    pub log_json: bool,
}

impl LogArgs {
    pub fn to_logging_config(&self) -> LoggingConfig {
        LoggingConfig {
            level: self.log_level.clone(),
            json_format: self.log_json,
            ..Default::default()
        }
    }
}

#[derive(Args, Debug, Clone)]
pub struct AttackArgs {
    /// Attack name, sent in the X-Barrage-Attack header
    #[arg(long, env = "BARRAGE_NAME", default_value = "")]
    pub name: String,

    /// Plan file path, or "stdin"
    #[arg(short = 't', long, env = "BARRAGE_TARGET", default_value = "stdin")]
    pub target: String,

    /// Plan format (yaml or json); guessed from the file extension if unset
    #[arg(short = 'f', long, env = "BARRAGE_FORMAT")]
    pub format: Option<PlanFormat>,

    /// Request rate: "infinity", N, N/unit or N/duration
    #[arg(short = 'r', long, env = "BARRAGE_RATE", default_value = "50/1s")]
    pub rate: ConstantPacer,

    /// Initial number of workers [default: plan config.workers, else 10]
    #[arg(long, env = "BARRAGE_WORKERS")]
    pub workers: Option<u64>,

    /// Maximum number of workers [default: unlimited]
    #[arg(long, env = "BARRAGE_MAX_WORKERS")]
    pub max_workers: Option<u64>,

    /// Idle connections kept per target host
    #[arg(long, env = "BARRAGE_CONNECTIONS", default_value_t = DEFAULT_CONNECTIONS)]
    pub connections: usize,

    /// Concurrent connections per target host, 0 for no limit
    #[arg(long, env = "BARRAGE_MAX_CONNECTIONS", default_value_t = DEFAULT_MAX_CONNECTIONS)]
    pub max_connections: usize,

    /// Local IP address to send requests from
    #[arg(long, env = "BARRAGE_LADDR", default_value = "0.0.0.0")]
    pub laddr: IpAddr,

    /// Reuse connections between requests
    #[arg(long, env = "BARRAGE_KEEPALIVE", default_value_t = true, action = ArgAction::Set)]
    pub keepalive: bool,

    /// Timeout of a single request, body included
    #[arg(long, env = "BARRAGE_TIMEOUT", default_value = "30s", value_parser = parse_std_duration)]
    pub timeout: Duration,

    /// Redirects followed per request, 0 to never follow
    #[arg(long, env = "BARRAGE_REDIRECTS", default_value_t = DEFAULT_REDIRECTS)]
    pub redirects: usize,

    /// JSON field of a response body substituted into the next step's URL
    #[arg(long, env = "BARRAGE_EXTRACT_FIELD", default_value = DEFAULT_EXTRACT_FIELD)]
    pub extract_field: String,

    /// Output file path, or "stdout"
    #[arg(short = 'o', long, env = "BARRAGE_OUTPUT", default_value = "stdout")]
    pub output: String,

    /// Attack duration, 0 to run until interrupted
    #[arg(long, env = "BARRAGE_DURATION", default_value = "0", value_parser = parse_std_duration)]
    pub duration: Duration,
}

impl AttackArgs {
    /// Attacker settings from flags, falling back to the plan's worker count
    /// and then to the built-in defaults.
    pub fn attacker_config(&self, plan_workers: Option<u64>) -> anyhow::Result<AttackerConfig> {
        let config = AttackerConfig {
            workers: self.workers.or(plan_workers).unwrap_or(DEFAULT_WORKERS),
            max_workers: self.max_workers.unwrap_or(DEFAULT_MAX_WORKERS),
            connections: self.connections,
            max_connections: self.max_connections,
            keepalive: self.keepalive,
            local_addr: self.laddr,
            timeout: self.timeout,
            redirects: self.redirects,
            extract_field: self.extract_field.clone(),
        };
        config.validate().context("invalid attacker configuration")?;
        Ok(config)
    }

    pub fn read_plan(&self) -> anyhow::Result<PlanFile> {
        if self.target == "stdin" {
            let format = self.format.unwrap_or_default();
            return load_plan(std::io::stdin().lock(), format).context("failed to load plan from stdin");
        }
        let path = Path::new(&self.target);
        let format = self.format.unwrap_or_else(|| PlanFormat::from_path(path));
        let file = File::open(path).with_context(|| format!("failed to open plan {}", self.target))?;
        load_plan(file, format).with_context(|| format!("failed to load plan {}", self.target))
    }
}

/// Run an attack to completion and return its summary.
///
/// The first interrupt stops the attack and drains in-flight results; a
/// second one returns straight away.
pub async fn run_attack(args: AttackArgs) -> anyhow::Result<AttackStatistics> {
    let plan = args.read_plan()?;
    let chains = plan.chains().context("invalid attack plan")?;
    let config = args.attacker_config(plan.workers())?;
    let attacker = Attacker::new(config).context("failed to create attacker")?;

    let writer = open_output(&args.output).with_context(|| format!("failed to open output {}", args.output))?;
    let mut encoder = JsonLinesEncoder::new(writer);
    let mut interrupts = Interrupts::new().context("failed to install signal handlers")?;

    info!(
        name = %args.name,
        chains = chains.len(),
        rate = %args.rate,
        duration_ms = args.duration.as_millis() as u64,
        output = %args.output,
        "Loaded plan"
    );

    let targeter = Arc::new(StaticTargeter::new(chains));
    let mut results = attacker.attack(targeter, args.rate, args.duration, args.name.clone());
    let mut stats = AttackStatistics::new();

    loop {
        tokio::select! {
            _ = interrupts.recv() => {
                if attacker.stop() {
                    info!("Interrupt received, stopping attack and draining results");
                } else {
                    warn!("Second interrupt received, exiting without draining");
                    break;
                }
            }
            next = results.recv() => match next {
                Some(result) => {
                    stats.record(&result);
                    encoder.encode(&result).context("failed to write result")?;
                }
                None => break,
            },
        }
    }

    encoder.flush().context("failed to flush results")?;
    log_summary(&stats, results.workers());
    Ok(stats)
}

fn log_summary(stats: &AttackStatistics, workers: u64) {
    info!(
        requests = stats.total_requests,
        successful = stats.successful_requests,
        failed = stats.failed_requests,
        success_rate = stats.success_rate(),
        mean_latency_ms = stats.mean_latency().as_secs_f64() * 1000.0,
        max_latency_ms = stats.max_latency.as_secs_f64() * 1000.0,
        bytes_in = stats.bytes_in,
        bytes_out = stats.bytes_out,
        most_common_status = stats.most_common_status_code().unwrap_or_default(),
        workers,
        "Attack summary"
    );
    if let Some(error) = stats.most_common_error() {
        warn!(error = %error, "Most common error");
    }
}

/// Interrupt and terminate signals, delivered one at a time.
struct Interrupts {
    #[cfg(unix)]
    interrupt: tokio::signal::unix::Signal,
    #[cfg(unix)]
    terminate: tokio::signal::unix::Signal,
}

impl Interrupts {
    #[cfg(unix)]
    fn new() -> std::io::Result<Self> {
        use tokio::signal::unix::{signal, SignalKind};
        Ok(Self {
            interrupt: signal(SignalKind::interrupt())?,
            terminate: signal(SignalKind::terminate())?,
        })
    }

    #[cfg(not(unix))]
    fn new() -> std::io::Result<Self> {
        Ok(Self {})
    }

    #[cfg(unix)]
    async fn recv(&mut self) {
        tokio::select! {
            _ = self.interrupt.recv() => {}
            _ = self.terminate.recv() => {}
        }
    }

    #[cfg(not(unix))]
    async fn recv(&mut self) {
        if tokio::signal::ctrl_c().await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}
