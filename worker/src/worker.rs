use std::sync::Arc;

use anyhow::{bail, Context, Result};
use tokio::time::sleep;
use tracing::{info, warn};

use common::{engine, Application, LocalStorage, Storage, Task, TaskKind};

use crate::{
    client::{AckOutcome, CoordinatorClient},
    config::WorkerConfig,
};

/// Motivo por el que terminó el worker sin error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerExit {
    /// El heartbeat respondió unhealthy: el job terminó
    CoordinatorClosing,
    /// El heartbeat no llegó al coordinator
    CoordinatorUnreachable,
    /// FetchTask respondió sin tarea: el coordinator está cerrando
    TaskStreamClosed,
}

pub struct Worker {
    id: String,
    client: CoordinatorClient,
    app: Arc<dyn Application>,
    storage: Arc<dyn Storage>,
    config: WorkerConfig,
}

impl Worker {
    pub fn new(config: WorkerConfig, app: Arc<dyn Application>) -> Result<Self> {
        let storage: Arc<dyn Storage> = Arc::new(LocalStorage::new(config.work_dir.clone()));
        let client = CoordinatorClient::new(config.coordinator_url.clone())?
            .with_heartbeat_timeout(config.heartbeat_timeout);

        Ok(Self {
            id: uuid::Uuid::new_v4().to_string(),
            client,
            app,
            storage,
            config,
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Loop principal del worker: corre en paralelo
    /// - el loop de tareas (pedir, ejecutar, registrar, confirmar)
    /// - el loop de heartbeat (vigilar que el coordinator siga vivo)
    ///
    /// Termina apenas uno de los dos se detiene. Un `Err` es fatal: entrada
    /// ilegible, coordinator inalcanzable en FetchTask / RegisterAggregateInput
    /// o ack rechazado con un 4xx.
    pub async fn run(&self) -> Result<WorkerExit> {
        info!(
            "worker {} ejecutando {} contra {}",
            self.id,
            self.app.name(),
            self.client.base_url()
        );

        let exit = tokio::select! {
            res = self.task_loop() => res?,
            exit = self.heartbeat_loop() => exit,
        };

        info!("worker {} terminó: {:?}", self.id, exit);
        Ok(exit)
    }

    async fn task_loop(&self) -> Result<WorkerExit> {
        loop {
            let Some(task) = self.client.fetch_task().await? else {
                return Ok(WorkerExit::TaskStreamClosed);
            };
            self.execute(task).await?;
        }
    }

    async fn heartbeat_loop(&self) -> WorkerExit {
        loop {
            sleep(self.config.heartbeat_interval).await;

            match self.client.heartbeat().await {
                Ok(true) => {}
                Ok(false) => {
                    info!("coordinator cerrando, saliendo");
                    return WorkerExit::CoordinatorClosing;
                }
                Err(e) => {
                    warn!("heartbeat falló, asumiendo coordinator caído: {:?}", e);
                    return WorkerExit::CoordinatorUnreachable;
                }
            }
        }
    }

    /// Ejecuta una tarea completa. En partición, todos los buckets quedan
    /// registrados antes del ack.
    pub async fn execute(&self, task: Task) -> Result<()> {
        info!(
            kind = %task.kind,
            task_id = %task.id,
            "tengo tarea ({} entradas)",
            task.inputs.len()
        );

        let app = Arc::clone(&self.app);
        let storage = Arc::clone(&self.storage);
        let job = task.clone();

        match task.kind {
            TaskKind::Partition => {
                let outputs = tokio::task::spawn_blocking(move || {
                    engine::run_partition(&job, app.as_ref(), storage.as_ref())
                })
                .await
                .context("la tarea de partición no terminó")?
                .with_context(|| format!("tarea de partición {}", task.id))?;

                for out in &outputs {
                    self.client
                        .register_aggregate_input(&task.id, out.bucket, &out.location)
                        .await?;
                }
            }
            TaskKind::Aggregate => {
                let location = tokio::task::spawn_blocking(move || {
                    engine::run_aggregate(&job, app.as_ref(), storage.as_ref())
                })
                .await
                .context("la tarea de agregación no terminó")?
                .with_context(|| format!("tarea de agregación {}", task.id))?;

                info!(task_id = %task.id, "salida escrita en {}", location);
            }
        }

        self.acknowledge(&task).await
    }

    /// Reintenta sin límite ante errores de transporte y 5xx. `UnknownTask` no
    /// es un error: otro intento de la misma tarea ya la confirmó.
    async fn acknowledge(&self, task: &Task) -> Result<()> {
        let key = task.key();
        loop {
            match self.client.acknowledge(&key).await {
                Ok(AckOutcome::Accepted) => {
                    info!("ack de {} aceptado", key);
                    return Ok(());
                }
                Ok(AckOutcome::UnknownTask(reason)) => {
                    warn!("ack de {} ignorado por el coordinator: {}", key, reason);
                    return Ok(());
                }
                Ok(AckOutcome::Rejected { status, error }) => {
                    bail!("ack de {} rechazado ({}): {}", key, status, error);
                }
                Err(e) => {
                    warn!("ack de {} falló, reintentando: {:?}", key, e);
                    sleep(self.config.ack_retry_interval).await;
                }
            }
        }
    }
}
