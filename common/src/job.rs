use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Fase del job. Sólo avanza: Partition -> Aggregate -> Finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobPhase {
    Partition,
    Aggregate,
    Finished,
}

impl fmt::Display for JobPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobPhase::Partition => write!(f, "PARTITION"),
            JobPhase::Aggregate => write!(f, "AGGREGATE"),
            JobPhase::Finished => write!(f, "FINISHED"),
        }
    }
}

/// Foto del estado del job para operadores (GET /api/v1/job).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobStatus {
    pub phase: JobPhase,
    pub closing: bool,

    /// -------- Métricas del job --------
    pub total_partition_tasks: usize,
    pub total_aggregate_tasks: usize,
    pub completed_partition_tasks: usize,
    pub completed_aggregate_tasks: usize,
    pub pending_tasks: usize,
    pub redispatches: u64,
    /// Incluye registros repetidos de tareas reejecutadas
    pub registered_aggregate_inputs: usize,
    /// Acks de claves que ya no estaban pendientes
    pub rejected_acks: u64,

    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}
