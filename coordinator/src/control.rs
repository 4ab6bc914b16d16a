use std::sync::Arc;

use tokio::{
    sync::{mpsc, watch, RwLock},
    task::AbortHandle,
    time::sleep,
};
use tracing::{debug, info, warn};

use common::{JobStatus, Task, TaskKey};

use crate::{
    config::CoordinatorConfig,
    dispatch::DispatchQueue,
    error::Result,
    scheduler::Scheduler,
    state::{JobState, PhaseSignal},
};

/// Interfaz de control: FetchTask, Acknowledge, RegisterAggregateInput y
/// Heartbeat. Es el único punto de entrada al `JobState`.
#[derive(Clone)]
pub struct Coordinator {
    pub(crate) job: Arc<RwLock<JobState>>,
    pub(crate) dispatch: DispatchQueue,
    pub(crate) config: Arc<CoordinatorConfig>,
    signals: mpsc::UnboundedSender<PhaseSignal>,
    pub(crate) closing: Arc<watch::Sender<bool>>,
    pub(crate) done: Arc<watch::Sender<bool>>,
}

impl Coordinator {
    /// Crea el coordinator, lanza el scheduler y encola la fase de partición.
    /// Tiene que llamarse dentro de un runtime de tokio.
    pub fn start(config: CoordinatorConfig) -> Result<Self> {
        config.validate()?;

        let mut job = JobState::new(config.inputs.clone(), config.buckets);
        let initial = job.begin();

        let (signals_tx, signals_rx) = mpsc::unbounded_channel();
        let (closing, _) = watch::channel(false);
        let (done, _) = watch::channel(false);

        let coordinator = Self {
            job: Arc::new(RwLock::new(job)),
            dispatch: DispatchQueue::new(),
            config: Arc::new(config),
            signals: signals_tx,
            closing: Arc::new(closing),
            done: Arc::new(done),
        };

        info!(
            "job iniciado: {} splits, {} buckets, lease={:?}",
            coordinator.config.inputs.len(),
            coordinator.config.buckets,
            coordinator.config.lease_timeout
        );

        tokio::spawn(Scheduler::new(coordinator.clone(), signals_rx).run());
        for signal in initial {
            coordinator.signal(signal);
        }

        Ok(coordinator)
    }

    /* ---------------- FetchTask ---------------- */

    /// Bloquea hasta que haya una tarea, la registra como pendiente con su lease
    /// y la devuelve. Sólo devuelve `None` cuando el job ya está cerrando.
    pub async fn fetch_task(&self) -> Option<Task> {
        loop {
            let task = tokio::select! {
                task = self.dispatch.next() => task?,
                _ = self.wait_closing() => return None,
            };

            let key = task.key();
            let mut job = self.job.write().await;

            let Some(attempt) = job.track(&task) else {
                debug!("descartando copia de {} (ya confirmada)", key);
                continue;
            };

            let lease = self.spawn_lease(task.clone(), attempt);
            job.attach_lease(&key, attempt, lease);

            info!(
                kind = %task.kind,
                task_id = %task.id,
                attempt,
                "despachando tarea ({} entradas)",
                task.inputs.len()
            );
            return Some(task);
        }
    }

    fn spawn_lease(&self, task: Task, attempt: u32) -> AbortHandle {
        let coordinator = self.clone();
        let timeout = self.config.lease_timeout;

        tokio::spawn(async move {
            sleep(timeout).await;
            coordinator.expire_lease(task, attempt).await;
        })
        .abort_handle()
    }

    /// Lease vencido: si el registro sigue vivo (mismo intento) se reencola una
    /// copia. El worker original no se entera y puede terminar igual.
    async fn expire_lease(&self, task: Task, attempt: u32) {
        let key = task.key();
        let resubmit = {
            let mut job = self.job.write().await;
            job.lease_expired(&key, attempt)
        };

        if !resubmit {
            return;
        }

        warn!(
            kind = %task.kind,
            task_id = %task.id,
            attempt,
            "lease vencido sin ack, reencolando tarea"
        );
        // fuera del lock: puede bloquear hasta que algún worker pida tarea
        self.dispatch.submit(task).await;
    }

    /* ---------------- Acknowledge ---------------- */

    pub async fn acknowledge(&self, key: TaskKey) -> Result<()> {
        let mut job = self.job.write().await;
        let elapsed = job.pending().get(&key).map(|r| r.dispatched_at.elapsed());

        let signal = match job.acknowledge(&key) {
            Ok(signal) => signal,
            Err(e) => {
                warn!("ack rechazado: {}", e);
                return Err(e);
            }
        };

        info!(
            ?elapsed,
            "ack de {} (particiones {}/{}, agregaciones {}/{})",
            key,
            job.completed_partition_tasks(),
            self.config.inputs.len(),
            job.completed_aggregate_tasks(),
            job.buckets()
        );

        if let Some(signal) = signal {
            self.signal(signal);
        }
        Ok(())
    }

    /* ---------------- RegisterAggregateInput ---------------- */

    pub async fn register_aggregate_input(
        &self,
        source: &str,
        bucket: u32,
        location: String,
    ) -> Result<()> {
        let mut job = self.job.write().await;
        let phase = job.phase();

        debug!(
            source,
            bucket,
            %phase,
            "registrando entrada de agregación {}",
            location
        );
        job.register_aggregate_input(bucket, location)
    }

    /* ---------------- Heartbeat / estado ---------------- */

    pub async fn heartbeat(&self) -> bool {
        self.job.read().await.is_healthy()
    }

    pub async fn status(&self) -> JobStatus {
        self.job.read().await.status()
    }

    /// Bloquea hasta que el scheduler libera la señal de fin del job.
    pub async fn wait_done(&self) {
        let mut rx = self.done.subscribe();
        let _ = rx.wait_for(|done| *done).await;
    }

    pub fn is_done(&self) -> bool {
        *self.done.borrow()
    }

    async fn wait_closing(&self) {
        let mut rx = self.closing.subscribe();
        let _ = rx.wait_for(|closing| *closing).await;
    }

    fn signal(&self, signal: PhaseSignal) {
        if self.signals.send(signal).is_err() {
            warn!("scheduler detenido, señal de fase descartada");
        }
    }
}
