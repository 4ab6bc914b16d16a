use std::{path::PathBuf, time::Duration};

pub const DEFAULT_COORDINATOR_URL: &str = "http://localhost:8080";
pub const DEFAULT_HEARTBEAT_INTERVAL: Duration = Duration::from_secs(1);
pub const DEFAULT_HEARTBEAT_TIMEOUT: Duration = Duration::from_secs(2);
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
pub const DEFAULT_ACK_RETRY_INTERVAL: Duration = Duration::from_millis(500);

#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// URL base del coordinator, ej: http://coordinator:8080
    pub coordinator_url: String,
    /// Raíz del storage local (entradas relativas, intermedios y salidas)
    pub work_dir: PathBuf,
    pub heartbeat_interval: Duration,
    /// Un heartbeat sin respuesta en este plazo cuenta como coordinator caído
    pub heartbeat_timeout: Duration,
    pub ack_retry_interval: Duration,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            coordinator_url: DEFAULT_COORDINATOR_URL.to_string(),
            work_dir: PathBuf::from("."),
            heartbeat_interval: DEFAULT_HEARTBEAT_INTERVAL,
            heartbeat_timeout: DEFAULT_HEARTBEAT_TIMEOUT,
            ack_retry_interval: DEFAULT_ACK_RETRY_INTERVAL,
        }
    }
}
