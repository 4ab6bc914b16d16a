// coordinator/src/state.rs

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use tokio::task::AbortHandle;

use common::{JobPhase, JobStatus, Task, TaskKey, TaskKind};

use crate::error::{CoordinatorError, Result};
use crate::tracker::PendingTracker;

/// Señales que el estado le manda al scheduler cuando cambia de fase.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PhaseSignal {
    /// Encolar las tareas de una fase
    Dispatch { phase: JobPhase, tasks: Vec<Task> },
    /// Todas las tareas confirmadas: empezar el cierre
    Finish,
}

/// Único estado mutable compartido del coordinator. Se accede siempre a través
/// del `RwLock` del `Coordinator`.
#[derive(Debug)]
pub struct JobState {
    phase: JobPhase,
    inputs: Vec<String>,
    buckets: u32,

    completed_partition_tasks: usize,
    completed_aggregate_tasks: usize,

    // bucket -> ubicaciones intermedias registradas
    aggregate_inputs: Vec<Vec<String>>,

    pending: PendingTracker,
    // tareas ya confirmadas; sus copias redespachadas se descartan
    completed: HashSet<TaskKey>,

    closing: bool,
    redispatches: u64,
    rejected_acks: u64,
    started_at: DateTime<Utc>,
    finished_at: Option<DateTime<Utc>>,
}

impl JobState {
    pub fn new(inputs: Vec<String>, buckets: u32) -> Self {
        Self {
            phase: JobPhase::Partition,
            inputs,
            buckets,
            completed_partition_tasks: 0,
            completed_aggregate_tasks: 0,
            aggregate_inputs: vec![Vec::new(); buckets as usize],
            pending: PendingTracker::new(),
            completed: HashSet::new(),
            closing: false,
            redispatches: 0,
            rejected_acks: 0,
            started_at: Utc::now(),
            finished_at: None,
        }
    }

    /// Arranque del job: encola las tareas de partición. Con cero splits la
    /// transición a Aggregate es inmediata.
    pub fn begin(&mut self) -> Vec<PhaseSignal> {
        let mut signals = vec![PhaseSignal::Dispatch {
            phase: JobPhase::Partition,
            tasks: self.partition_tasks(),
        }];
        while let Some(signal) = self.advance() {
            signals.push(signal);
        }
        signals
    }

    /// Una tarea por split, con ids 1..M.
    pub fn partition_tasks(&self) -> Vec<Task> {
        self.inputs
            .iter()
            .enumerate()
            .map(|(i, input)| Task::partition(i + 1, input.clone(), self.buckets))
            .collect()
    }

    /// Una tarea por bucket 0..N-1, con todo lo registrado hasta ahora.
    fn aggregate_tasks(&self) -> Vec<Task> {
        self.aggregate_inputs
            .iter()
            .enumerate()
            .map(|(bucket, locations)| {
                Task::aggregate(bucket as u32, locations.clone(), self.buckets)
            })
            .collect()
    }

    /// Registra el despacho de `task`. Devuelve el intento, o `None` si la tarea
    /// ya fue confirmada (copia vieja de un redespacho) y hay que descartarla.
    pub fn track(&mut self, task: &Task) -> Option<u32> {
        let key = task.key();
        if self.completed.contains(&key) {
            return None;
        }
        Some(self.pending.track(key))
    }

    pub fn attach_lease(&mut self, key: &TaskKey, attempt: u32, lease: AbortHandle) {
        self.pending.attach_lease(key, attempt, lease);
    }

    /// El lease `attempt` de `key` venció. Devuelve si hay que reencolar la tarea.
    pub fn lease_expired(&mut self, key: &TaskKey, attempt: u32) -> bool {
        if self.closing || !self.pending.is_current(key, attempt) {
            return false;
        }
        self.redispatches += 1;
        true
    }

    /// Ack de `(kind, id)`. Una clave desconocida o ya confirmada devuelve
    /// `UnknownTask` sin tocar los contadores.
    pub fn acknowledge(&mut self, key: &TaskKey) -> Result<Option<PhaseSignal>> {
        if !self.pending.clear(key) {
            self.rejected_acks += 1;
            return Err(CoordinatorError::UnknownTask(key.clone()));
        }
        self.completed.insert(key.clone());

        match key.kind {
            TaskKind::Partition => self.completed_partition_tasks += 1,
            TaskKind::Aggregate => self.completed_aggregate_tasks += 1,
        }

        Ok(self.advance())
    }

    pub fn register_aggregate_input(&mut self, bucket: u32, location: String) -> Result<()> {
        let buckets = self.buckets;
        let slot = self
            .aggregate_inputs
            .get_mut(bucket as usize)
            .ok_or(CoordinatorError::BucketOutOfRange { bucket, buckets })?;
        slot.push(location);
        Ok(())
    }

    /// Función de transición. Se evalúa bajo el mismo lock que actualiza los
    /// contadores, así que siempre ve una foto consistente.
    fn advance(&mut self) -> Option<PhaseSignal> {
        let partitions_done = self.completed_partition_tasks == self.inputs.len();

        match self.phase {
            JobPhase::Partition if partitions_done && self.completed_aggregate_tasks == 0 => {
                self.phase = JobPhase::Aggregate;
                Some(PhaseSignal::Dispatch {
                    phase: JobPhase::Aggregate,
                    tasks: self.aggregate_tasks(),
                })
            }
            JobPhase::Aggregate
                if partitions_done
                    && self.completed_aggregate_tasks == self.buckets as usize =>
            {
                self.phase = JobPhase::Finished;
                self.closing = true;
                self.finished_at = Some(Utc::now());
                Some(PhaseSignal::Finish)
            }
            _ => None,
        }
    }

    pub fn phase(&self) -> JobPhase {
        self.phase
    }

    pub fn is_healthy(&self) -> bool {
        !self.closing
    }

    pub fn buckets(&self) -> u32 {
        self.buckets
    }

    pub fn completed_partition_tasks(&self) -> usize {
        self.completed_partition_tasks
    }

    pub fn completed_aggregate_tasks(&self) -> usize {
        self.completed_aggregate_tasks
    }

    pub fn pending(&self) -> &PendingTracker {
        &self.pending
    }

    pub fn status(&self) -> JobStatus {
        JobStatus {
            phase: self.phase,
            closing: self.closing,
            total_partition_tasks: self.inputs.len(),
            total_aggregate_tasks: self.buckets as usize,
            completed_partition_tasks: self.completed_partition_tasks,
            completed_aggregate_tasks: self.completed_aggregate_tasks,
            pending_tasks: self.pending.len(),
            redispatches: self.redispatches,
            registered_aggregate_inputs: self.aggregate_inputs.iter().map(Vec::len).sum(),
            rejected_acks: self.rejected_acks,
            started_at: self.started_at,
            finished_at: self.finished_at,
        }
    }
}
