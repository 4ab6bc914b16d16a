use std::{path::PathBuf, time::Duration};

use anyhow::{anyhow, Result};
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use common::application_by_name;
use worker::{config, Worker, WorkerConfig};

#[derive(Parser)]
#[command(name = "worker")]
#[command(about = "Worker que ejecuta tareas de partición y agregación")]
struct Cli {
    /// URL base del coordinator
    #[arg(long, env = "COORDINATOR_URL", default_value = config::DEFAULT_COORDINATOR_URL)]
    coordinator_url: String,

    /// Directorio de trabajo para intermedios y salidas
    #[arg(long, env = "WORKER_WORK_DIR", default_value = ".")]
    work_dir: PathBuf,

    /// Aplicación a ejecutar
    #[arg(long, env = "WORKER_APP", default_value = "wordcount")]
    app: String,

    #[arg(long, env = "WORKER_HEARTBEAT_INTERVAL_MS", default_value_t = 1_000)]
    heartbeat_interval_ms: u64,

    #[arg(long, env = "WORKER_HEARTBEAT_TIMEOUT_MS", default_value_t = 2_000)]
    heartbeat_timeout_ms: u64,

    #[arg(long, env = "WORKER_ACK_RETRY_MS", default_value_t = 500)]
    ack_retry_ms: u64,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("worker=debug,common=debug,reqwest=info")),
        )
        .init();

    let cli = Cli::parse();

    let app = application_by_name(&cli.app)
        .ok_or_else(|| anyhow!("aplicación desconocida: {}", cli.app))?;

    // Nombre de host (solo para info)
    let hostname = hostname::get()
        .unwrap_or_default()
        .to_string_lossy()
        .to_string();

    let config = WorkerConfig {
        coordinator_url: cli.coordinator_url,
        work_dir: cli.work_dir,
        heartbeat_interval: Duration::from_millis(cli.heartbeat_interval_ms),
        heartbeat_timeout: Duration::from_millis(cli.heartbeat_timeout_ms),
        ack_retry_interval: Duration::from_millis(cli.ack_retry_ms),
    };

    let worker = Worker::new(config, app)?;
    info!("worker {} arrancando en {}", worker.id(), hostname);

    let exit = worker.run().await?;
    info!("salida limpia: {:?}", exit);
    Ok(())
}
