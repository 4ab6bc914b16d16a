pub mod config;
pub mod control;
pub mod dispatch;
pub mod error;
pub mod handlers;
pub mod scheduler;
pub mod state;
pub mod tracker;

use tokio::net::TcpListener;
use tracing::info;

pub use config::CoordinatorConfig;
pub use control::Coordinator;
pub use error::CoordinatorError;

/// Sirve la interfaz de control hasta que el job termina y luego hace un
/// apagado ordenado del servidor HTTP.
pub async fn serve(listener: TcpListener, coordinator: Coordinator) -> std::io::Result<()> {
    let app = handlers::build_router(coordinator.clone());

    info!("coordinator escuchando en {}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(async move { coordinator.wait_done().await })
        .await
}
