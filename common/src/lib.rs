//! Tipos compartidos entre coordinator y worker:
//! modelo de tareas, mensajes del protocolo de control, aplicaciones
//! (transform/aggregate), almacenamiento y el motor que ejecuta cada fase.

pub mod app;
pub mod engine;
pub mod error;
pub mod job;
pub mod rpc;
pub mod storage;
pub mod task;

pub use app::{application_by_name, Application, KeyValue, WordCount};
pub use engine::AggregateInput;
pub use error::{EngineError, StorageError};
pub use job::{JobPhase, JobStatus};
pub use rpc::{
    AckRequest, AckResponse, ErrorResponse, FetchTaskResponse, HeartbeatResponse,
    RegisterAggregateInputRequest, RegisterAggregateInputResponse,
};
pub use storage::{LocalStorage, Storage};
pub use task::{Task, TaskId, TaskKey, TaskKind};
