use std::fmt;

use serde::{Deserialize, Serialize};

pub type TaskId = String;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskKind {
    Partition,
    Aggregate,
}

impl fmt::Display for TaskKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskKind::Partition => write!(f, "partition"),
            TaskKind::Aggregate => write!(f, "aggregate"),
        }
    }
}

/// Unidad de trabajo. Inmutable una vez creada; viaja por valor en los mensajes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub kind: TaskKind,
    pub id: TaskId,

    /// Ubicaciones de entrada (split original o salidas intermedias de un bucket)
    pub inputs: Vec<String>,

    /// Cantidad de buckets de agregación (N)
    pub buckets: u32,
}

impl Task {
    /// Tarea de partición para el split número `number` (1..M).
    pub fn partition(number: usize, input: impl Into<String>, buckets: u32) -> Self {
        Self {
            kind: TaskKind::Partition,
            id: number.to_string(),
            inputs: vec![input.into()],
            buckets,
        }
    }

    /// Tarea de agregación del bucket `bucket` (0..N-1). El id es el índice del bucket.
    pub fn aggregate(bucket: u32, inputs: Vec<String>, buckets: u32) -> Self {
        Self {
            kind: TaskKind::Aggregate,
            id: bucket.to_string(),
            inputs,
            buckets,
        }
    }

    pub fn key(&self) -> TaskKey {
        TaskKey::new(self.kind, self.id.clone())
    }
}

/// Identidad de una tarea: `(kind, id)`. Es la clave de los registros pendientes
/// y de los acks.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TaskKey {
    pub kind: TaskKind,
    pub id: TaskId,
}

impl TaskKey {
    pub fn new(kind: TaskKind, id: impl Into<TaskId>) -> Self {
        Self {
            kind,
            id: id.into(),
        }
    }
}

impl fmt::Display for TaskKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.kind, self.id)
    }
}
