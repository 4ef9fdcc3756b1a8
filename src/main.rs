//! Provider resilience simulator.
//!
//! Runs a synthetic workload against mock providers with configurable failure
//! rates and latencies, then prints the resulting load distribution and
//! provider health as JSON.
//!
//! ```text
//! resilience-sim --config resilience.toml run \
//!     --provider primary:0.05:30 --provider secondary:0.2:60 --calls 500
//! ```

use clap::{Parser, Subcommand};
use rand::Rng;
use serde_json::json;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use provider_resilience::config::{load_config, watcher::ConfigWatcher, ResilienceConfig};
use provider_resilience::observability::{logging, metrics};
use provider_resilience::{Provider, ProviderError, ResilienceEngine, SelectionStrategy};

#[derive(Parser)]
#[command(name = "resilience-sim")]
#[command(about = "Simulate provider selection, fallback and circuit breaking", long_about = None)]
struct Cli {
    /// TOML configuration file; defaults apply when omitted
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate the configuration and print the effective values
    Check,
    /// Run a synthetic workload
    Run {
        /// Mock provider as `id:failure_rate:latency_ms` (repeatable)
        #[arg(short, long = "provider")]
        providers: Vec<MockSpec>,

        /// Total number of fallback executions
        #[arg(short = 'n', long, default_value_t = 200)]
        calls: u64,

        /// Concurrent workers issuing calls
        #[arg(short = 'j', long, default_value_t = 4)]
        concurrency: u64,

        /// Override the configured selection strategy
        #[arg(short, long)]
        strategy: Option<SelectionStrategy>,

        /// Reload the configuration file when it changes
        #[arg(short, long)]
        watch: bool,
    },
}

/// Command-line description of a mock provider.
#[derive(Debug, Clone)]
struct MockSpec {
    id: String,
    failure_rate: f64,
    latency: Duration,
}

impl FromStr for MockSpec {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split(':').collect();
        let [id, rate, latency] = parts.as_slice() else {
            return Err(format!("expected id:failure_rate:latency_ms, got '{}'", s));
        };
        if id.trim().is_empty() {
            return Err("provider id must not be empty".to_string());
        }
        let failure_rate: f64 = rate
            .parse()
            .map_err(|e| format!("invalid failure rate '{}': {}", rate, e))?;
        if !(0.0..=1.0).contains(&failure_rate) {
            return Err(format!("failure rate must be within [0, 1], got {}", failure_rate));
        }
        let latency_ms: u64 = latency
            .parse()
            .map_err(|e| format!("invalid latency '{}': {}", latency, e))?;

        Ok(Self {
            id: id.trim().to_string(),
            failure_rate,
            latency: Duration::from_millis(latency_ms),
        })
    }
}

/// Simulated provider: sleeps for its latency, then fails with its failure rate.
#[derive(Debug)]
struct MockProvider {
    spec: MockSpec,
}

impl Provider for MockProvider {
    fn id(&self) -> &str {
        &self.spec.id
    }
}

impl MockProvider {
    async fn call(&self, cancel: CancellationToken) -> Result<Duration, ProviderError> {
        let fails = rand::thread_rng().gen_bool(self.spec.failure_rate);
        tokio::select! {
            _ = cancel.cancelled() => return Err(ProviderError::Cancelled),
            _ = tokio::time::sleep(self.spec.latency) => {}
        }
        if fails {
            Err(ProviderError::Transport(format!("{} dropped the connection", self.spec.id)))
        } else {
            Ok(self.spec.latency)
        }
    }
}

fn default_providers() -> Vec<MockSpec> {
    vec![
        MockSpec { id: "primary".into(), failure_rate: 0.05, latency: Duration::from_millis(30) },
        MockSpec { id: "secondary".into(), failure_rate: 0.2, latency: Duration::from_millis(60) },
        MockSpec { id: "backup".into(), failure_rate: 0.0, latency: Duration::from_millis(120) },
    ]
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => load_config(path)?,
        None => ResilienceConfig::default(),
    };

    logging::init_logging(&config.observability)?;

    match cli.command {
        Commands::Check => {
            println!("{}", serde_json::to_string_pretty(&config)?);
        }
        Commands::Run {
            providers,
            calls,
            concurrency,
            strategy,
            watch,
        } => {
            if let Some(strategy) = strategy {
                config.selection.strategy = strategy;
            }

            if config.observability.metrics_enabled {
                let addr = config.observability.metrics_address.parse()?;
                metrics::init_metrics(addr)?;
            }

            let specs = if providers.is_empty() { default_providers() } else { providers };
            let engine: ResilienceEngine<MockProvider> = ResilienceEngine::new(config)?;

            // The watcher handle must outlive the run.
            let _watcher = match (&cli.config, watch) {
                (Some(path), true) => {
                    let (watcher, updates) = ConfigWatcher::new(path);
                    let handle = watcher.run()?;
                    engine.watch_config(updates);
                    Some(handle)
                }
                (None, true) => {
                    tracing::warn!("--watch ignored without --config");
                    None
                }
                _ => None,
            };

            run_workload(&engine, specs, calls, concurrency.max(1)).await?;
        }
    }

    Ok(())
}

/// Reserve the next call slot unless the run was cancelled or all `calls` are taken.
fn claim_call(issued: &AtomicU64, calls: u64, cancel: &CancellationToken) -> bool {
    if cancel.is_cancelled() {
        return false;
    }
    issued
        .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |n| (n < calls).then_some(n + 1))
        .is_ok()
}

async fn run_workload(
    engine: &ResilienceEngine<MockProvider>,
    specs: Vec<MockSpec>,
    calls: u64,
    concurrency: u64,
) -> Result<(), Box<dyn std::error::Error>> {
    let providers: Arc<Vec<Arc<MockProvider>>> =
        Arc::new(specs.into_iter().map(|spec| Arc::new(MockProvider { spec })).collect());

    let cancel = CancellationToken::new();
    let interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Interrupt received, cancelling outstanding calls");
            interrupt.cancel();
        }
    });

    let mut events = engine.subscribe();
    let event_log = tokio::spawn(async move {
        while let Ok(event) = events.recv().await {
            tracing::info!(
                provider_id = %event.provider_id,
                healthy = event.healthy,
                circuit_state = ?event.circuit_state,
                "Provider health changed"
            );
        }
    });

    tracing::info!(
        providers = providers.len(),
        calls,
        concurrency,
        strategy = %engine.strategy(),
        "Starting simulated workload"
    );

    let issued = Arc::new(AtomicU64::new(0));
    let succeeded = Arc::new(AtomicU64::new(0));
    let mut workers = Vec::new();

    for _ in 0..concurrency {
        let engine = engine.clone();
        let providers = providers.clone();
        let cancel = cancel.clone();
        let issued = issued.clone();
        let succeeded = succeeded.clone();

        workers.push(tokio::spawn(async move {
            while claim_call(&issued, calls, &cancel) {
                let result = engine
                    .execute(&providers, None, &cancel, |provider, token| async move {
                        provider.call(token).await
                    })
                    .await;
                if result.is_success {
                    succeeded.fetch_add(1, Ordering::Relaxed);
                }
            }
        }));
    }

    for worker in workers {
        worker.await?;
    }
    event_log.abort();

    let executed = issued.load(Ordering::Relaxed);
    let succeeded = succeeded.load(Ordering::Relaxed);
    let summary = json!({
        "strategy": engine.strategy(),
        "executions": {
            "issued": executed,
            "succeeded": succeeded,
            "failed": executed.saturating_sub(succeeded),
            "cancelled": cancel.is_cancelled(),
        },
        "distribution": engine.load_distribution(),
        "health": engine.health_report(),
        "metrics": engine.store().get_all_metrics(),
    });
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}
