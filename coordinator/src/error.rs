use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;

use common::{ErrorResponse, TaskKey};

#[derive(Error, Debug)]
pub enum CoordinatorError {
    #[error("tarea desconocida o ya confirmada: {0}")]
    UnknownTask(TaskKey),

    #[error("bucket {bucket} fuera de rango (N = {buckets})")]
    BucketOutOfRange { bucket: u32, buckets: u32 },

    #[error("configuración inválida: {0}")]
    Config(String),

    #[error("error interno: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, CoordinatorError>;

impl IntoResponse for CoordinatorError {
    fn into_response(self) -> Response {
        let status = match &self {
            CoordinatorError::UnknownTask(_) => StatusCode::NOT_FOUND,
            CoordinatorError::BucketOutOfRange { .. } | CoordinatorError::Config(_) => {
                StatusCode::BAD_REQUEST
            }
            CoordinatorError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        (
            status,
            Json(ErrorResponse {
                error: self.to_string(),
            }),
        )
            .into_response()
    }
}
