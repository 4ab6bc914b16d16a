use std::{net::SocketAddr, time::Duration};

use anyhow::{bail, Context, Result};
use clap::Parser;
use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use coordinator::{
    config::{self, expand_inputs},
    Coordinator, CoordinatorConfig,
};

#[derive(Parser)]
#[command(name = "coordinator")]
#[command(about = "Coordinator de un job partition/aggregate con workers remotos")]
struct Cli {
    /// Archivos o patrones de entrada, ej: "data/pg-*.txt"
    #[arg(value_name = "INPUT", required = true)]
    inputs: Vec<String>,

    /// Cantidad de buckets (tareas de agregación)
    #[arg(long, short = 'n', env = "COORDINATOR_BUCKETS", default_value_t = config::DEFAULT_BUCKETS)]
    buckets: u32,

    #[arg(long, env = "COORDINATOR_LISTEN", default_value = config::DEFAULT_LISTEN_ADDR)]
    listen: SocketAddr,

    /// Lease de cada despacho antes de reencolar la tarea
    #[arg(long, env = "COORDINATOR_LEASE_TIMEOUT_MS", default_value_t = 10_000)]
    lease_timeout_ms: u64,

    /// Espera entre el cierre del job y el apagado
    #[arg(long, env = "COORDINATOR_GRACE_PERIOD_MS", default_value_t = 3_000)]
    grace_period_ms: u64,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("coordinator=debug,tower_http=info")),
        )
        .init();

    let cli = Cli::parse();

    let inputs = expand_inputs(&cli.inputs)?;
    if inputs.is_empty() {
        warn!("ningún archivo de entrada; el job sólo producirá salidas vacías");
    }

    let config = CoordinatorConfig {
        inputs,
        buckets: cli.buckets,
        listen_addr: cli.listen,
        lease_timeout: Duration::from_millis(cli.lease_timeout_ms),
        grace_period: Duration::from_millis(cli.grace_period_ms),
    };

    let listener = TcpListener::bind(config.listen_addr)
        .await
        .with_context(|| format!("no se pudo escuchar en {}", config.listen_addr))?;

    let job = Coordinator::start(config)?;

    tokio::select! {
        res = coordinator::serve(listener, job.clone()) => res?,
        _ = tokio::signal::ctrl_c() => {
            bail!("interrumpido antes de terminar el job");
        }
    }

    let status = job.status().await;
    info!(
        "job completo: {} particiones, {} agregaciones, {} redespachos",
        status.completed_partition_tasks, status.completed_aggregate_tasks, status.redispatches
    );

    Ok(())
}
