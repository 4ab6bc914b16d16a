use std::io;

use thiserror::Error;

use crate::task::TaskKind;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("no se pudo leer {location}: {source}")]
    Read {
        location: String,
        #[source]
        source: io::Error,
    },

    #[error("no se pudo escribir {location}: {source}")]
    Write {
        location: String,
        #[source]
        source: io::Error,
    },
}

#[derive(Error, Debug)]
pub enum EngineError {
    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error("contenido intermedio inválido en {location}: {source}")]
    Decode {
        location: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("no se pudo serializar el bucket {bucket}: {source}")]
    Encode {
        bucket: u32,
        #[source]
        source: serde_json::Error,
    },

    #[error("se esperaba una tarea {expected} pero llegó {found}")]
    WrongKind { expected: TaskKind, found: TaskKind },

    #[error("la tarea {0} no tiene buckets (N = 0)")]
    NoBuckets(String),
}
