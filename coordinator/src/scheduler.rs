use tokio::{sync::mpsc, time::sleep};
use tracing::info;

use crate::{control::Coordinator, state::PhaseSignal};

/// Loop del scheduler de fases: queda inactivo hasta que el estado le manda una
/// señal (arranque, fin de particiones, fin de agregaciones).
pub struct Scheduler {
    coordinator: Coordinator,
    signals: mpsc::UnboundedReceiver<PhaseSignal>,
}

impl Scheduler {
    pub fn new(coordinator: Coordinator, signals: mpsc::UnboundedReceiver<PhaseSignal>) -> Self {
        Self {
            coordinator,
            signals,
        }
    }

    pub async fn run(mut self) {
        while let Some(signal) = self.signals.recv().await {
            match signal {
                PhaseSignal::Dispatch { phase, tasks } => {
                    info!("fase {}: encolando {} tareas", phase, tasks.len());
                    // cada submit bloquea hasta que un worker pide tarea
                    for task in tasks {
                        self.coordinator.dispatch.submit(task).await;
                    }
                }
                PhaseSignal::Finish => {
                    self.finish().await;
                    break;
                }
            }
        }
    }

    /// Cierre: los heartbeats ya responden unhealthy; se espera el período de
    /// gracia para que los workers lo vean y recién ahí se libera la señal de fin.
    async fn finish(&self) {
        let grace = self.coordinator.config.grace_period;
        info!("todas las tareas confirmadas, cerrando en {:?}", grace);

        self.coordinator.closing.send_replace(true);
        sleep(grace).await;
        self.coordinator.done.send_replace(true);

        info!("job terminado");
    }
}
