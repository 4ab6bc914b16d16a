use std::sync::Arc;

use tokio::sync::{mpsc, Mutex};
use tracing::warn;

use common::Task;

/// Capacidad del canal: lo más parecido a un rendezvous que permite mpsc.
pub const DISPATCH_CAPACITY: usize = 1;

/// Cola de despacho compartida por todas las fases.
/// Productores: el scheduler y los leases vencidos. Consumidor: FetchTask.
#[derive(Clone)]
pub struct DispatchQueue {
    tx: mpsc::Sender<Task>,
    rx: Arc<Mutex<mpsc::Receiver<Task>>>,
}

impl DispatchQueue {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::channel(DISPATCH_CAPACITY);
        Self {
            tx,
            rx: Arc::new(Mutex::new(rx)),
        }
    }

    /// Entrega una tarea. Bloquea hasta que haya lugar, nunca la descarta.
    pub async fn submit(&self, task: Task) {
        if let Err(e) = self.tx.send(task).await {
            // el receptor vive en esta misma estructura
            warn!("cola de despacho cerrada, tarea {} perdida", e.0.key());
        }
    }

    /// Espera la próxima tarea. Cada tarea llega a un único llamador.
    pub async fn next(&self) -> Option<Task> {
        let mut rx = self.rx.lock().await;
        rx.recv().await
    }
}

impl Default for DispatchQueue {
    fn default() -> Self {
        Self::new()
    }
}
