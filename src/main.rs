mod bench;
mod config;
mod error;
mod sources;
mod traits;
mod transport;
mod types;
mod utils;

use anyhow::Result;
use bench::escalation::{EscalationOutcome, RoundReport};
use bench::Bench;
use clap::Parser;
use config::{Overrides, Settings};
use reqwest::Client;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};
use transport::ReqwestTransport;
use types::{Protocol, RankedResult};

// 代理列表下载的超时，列表文件较大，给足时间
const LIST_TIMEOUT: u64 = 30;

#[derive(Parser)]
#[command(name = "sockscraper", version)]
#[command(about = "Discover free proxies for a country and rank them by measured throughput", long_about = None)]
struct Cli {
    /// Country code to filter proxies by [default: US]
    #[arg(long, short)]
    country: Option<String>,

    /// Proxy protocol [default: socks5]
    #[arg(long, short, value_enum)]
    protocol: Option<Protocol>,

    /// Settings file (TOML). Defaults to the user config dir if present.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Give up after this many escalation rounds (0 = never)
    #[arg(long)]
    max_rounds: Option<u32>,

    /// Number of candidates re-measured for the final ranking
    #[arg(long)]
    top: Option<usize>,

    /// Concurrent probes per round [default: available cores]
    #[arg(long)]
    workers: Option<usize>,

    /// Base timeout of the escalation schedule, in milliseconds
    #[arg(long)]
    base_timeout_ms: Option<u64>,

    /// Print the final ranking as JSON
    #[arg(long)]
    json: bool,

    /// Hide the progress bar
    #[arg(long, short)]
    quiet: bool,
}

impl Cli {
    fn overrides(&self) -> Overrides {
        Overrides {
            country: self.country.clone(),
            protocol: self.protocol,
            base_timeout_ms: self.base_timeout_ms,
            max_rounds: self.max_rounds,
            ranking_count: self.top,
            workers: self.workers,
        }
    }
}

/// Logs go to stderr with time since start, so stdout carries only the ranking.
fn init_tracing() {
    use tracing_subscriber::fmt::time::Uptime;
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_timer(Uptime::default())
                .with_target(false),
        )
        .with(filter)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing();

    info!("Sockscraper {} initialized", env!("CARGO_PKG_VERSION"));

    let settings = Settings::load(cli.config.as_deref(), &cli.overrides())?;
    handle_scan(&settings, cli.json, cli.quiet).await
}

// --- Handlers ---

async fn handle_scan(settings: &Settings, json: bool, quiet: bool) -> Result<()> {
    let client = Client::builder()
        .timeout(Duration::from_secs(LIST_TIMEOUT))
        .build()?;
    let sources = sources::all_sources(settings)?;

    info!(
        "Fetching {} proxy data for {} from {}",
        settings.protocol,
        settings.country,
        sources::SUPPORTED_SOURCES.join(", ")
    );

    let endpoints = match sources::collect_endpoints(&sources, &client, &settings.country, settings.protocol).await {
        Ok(endpoints) => endpoints,
        Err(e) => {
            error!("Failed to fetch data: {}", e);
            return Err(e.into());
        }
    };

    if endpoints.is_empty() {
        error!("No proxies found");
        return Ok(());
    }
    info!("Benchmarking {} proxy servers", endpoints.len());

    let bench = Bench::new(
        Arc::new(ReqwestTransport::new(settings.protocol)),
        settings.payload_urls(&mut rand::thread_rng()),
        settings.policy(),
        settings.worker_count(),
    )
    .with_progress(!quiet);

    let (successes, timeout) = match bench.escalate(endpoints).await? {
        EscalationOutcome::Success {
            successes,
            timeout,
            rounds,
        } => {
            log_rounds(&rounds);
            (successes, timeout)
        }
        EscalationOutcome::Exhausted { reason, rounds } => {
            log_rounds(&rounds);
            error!("Benchmark gave up after {} rounds: {}", rounds.len(), reason);
            return Ok(());
        }
    };

    let listed: Vec<String> = successes.iter().map(|(e, _)| e.to_string()).collect();
    info!("Discovered {} possible servers: {:?}", successes.len(), listed);

    let ranked = bench.rank(&successes, settings.ranking_count, timeout).await;
    info!("Proxy data benchmarked");

    if ranked.is_empty() {
        warn!("Every candidate failed the re-measurement; try again or raise --base-timeout-ms");
    }

    print_ranking(&ranked, json)?;
    Ok(())
}

fn log_rounds(rounds: &[RoundReport]) {
    for r in rounds {
        debug!(
            "round {}: {:.1}s timeout, {} probed, {} ok, {} hard failures, {} left",
            r.level + 1,
            r.timeout.as_secs_f64(),
            r.probed,
            r.succeeded,
            r.hard_failures,
            r.survivors
        );
    }
}

fn print_ranking(ranked: &[RankedResult], json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(ranked)?);
        return Ok(());
    }

    for res in ranked {
        println!("{}", ranking_line(res));
    }
    Ok(())
}

/// `host:port - Speed: X.XXMB/s`
fn ranking_line(res: &RankedResult) -> String {
    format!("{} - Speed: {:.2}MB/s", res.endpoint, res.speed_mbps)
}
