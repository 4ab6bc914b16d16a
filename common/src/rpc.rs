use serde::{Deserialize, Serialize};

use crate::task::{Task, TaskId, TaskKind};

/// Respuesta de FetchTask. `task` sólo es `None` cuando el coordinator ya está cerrando.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchTaskResponse {
    pub task: Option<Task>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AckRequest {
    pub kind: TaskKind,
    pub id: TaskId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AckResponse {
    pub ok: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterAggregateInputRequest {
    /// Tarea de partición que produjo la salida (sólo para logs)
    pub source: TaskId,
    pub bucket: u32,
    pub location: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterAggregateInputResponse {
    pub ok: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HeartbeatResponse {
    pub healthy: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}
