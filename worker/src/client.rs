use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::{Client, StatusCode};

use common::{
    AckRequest, ErrorResponse, FetchTaskResponse, HeartbeatResponse,
    RegisterAggregateInputRequest, Task, TaskKey,
};

use crate::config::{DEFAULT_CONNECT_TIMEOUT, DEFAULT_HEARTBEAT_TIMEOUT};

/// Resultado de un ack que llegó al coordinator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AckOutcome {
    Accepted,
    /// La clave ya no estaba pendiente (otro intento la confirmó antes)
    UnknownTask(String),
    /// El coordinator rechazó el pedido (4xx): reintentar no sirve
    Rejected { status: u16, error: String },
}

/// Cliente HTTP de la interfaz de control. Cualquier `Err` es un error de
/// transporte o una respuesta inesperada del coordinator.
#[derive(Debug, Clone)]
pub struct CoordinatorClient {
    http: Client,
    base_url: String,
    heartbeat_timeout: Duration,
}

impl CoordinatorClient {
    /// Sin timeout global: FetchTask es un long poll y puede bloquear tanto como
    /// tarde en aparecer una tarea. Sólo se acota la conexión.
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        let http = Client::builder()
            .connect_timeout(DEFAULT_CONNECT_TIMEOUT)
            .build()
            .context("no se pudo crear el cliente HTTP")?;

        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            heartbeat_timeout: DEFAULT_HEARTBEAT_TIMEOUT,
        })
    }

    pub fn with_heartbeat_timeout(mut self, timeout: Duration) -> Self {
        self.heartbeat_timeout = timeout;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Long poll: bloquea hasta que el coordinator entrega una tarea.
    /// `None` significa que el coordinator está cerrando.
    pub async fn fetch_task(&self) -> Result<Option<Task>> {
        let url = format!("{}/api/v1/tasks/fetch", self.base_url);
        let res = self
            .http
            .post(&url)
            .send()
            .await
            .context("FetchTask")?
            .error_for_status()
            .context("FetchTask")?;

        let FetchTaskResponse { task } = res.json().await.context("FetchTask")?;
        Ok(task)
    }

    pub async fn acknowledge(&self, key: &TaskKey) -> Result<AckOutcome> {
        let url = format!("{}/api/v1/tasks/ack", self.base_url);
        let res = self
            .http
            .post(&url)
            .json(&AckRequest {
                kind: key.kind,
                id: key.id.clone(),
            })
            .send()
            .await
            .context("Acknowledge")?;

        let status = res.status();
        if status == StatusCode::NOT_FOUND {
            let ErrorResponse { error } = res.json().await.context("Acknowledge")?;
            return Ok(AckOutcome::UnknownTask(error));
        }
        if status.is_client_error() {
            let error = res.text().await.unwrap_or_default();
            return Ok(AckOutcome::Rejected {
                status: status.as_u16(),
                error,
            });
        }

        // 5xx: error transitorio del coordinator, el llamador reintenta
        res.error_for_status().context("Acknowledge")?;
        Ok(AckOutcome::Accepted)
    }

    pub async fn register_aggregate_input(
        &self,
        source: &str,
        bucket: u32,
        location: &str,
    ) -> Result<()> {
        let url = format!("{}/api/v1/aggregate-inputs", self.base_url);
        self.http
            .post(&url)
            .json(&RegisterAggregateInputRequest {
                source: source.to_string(),
                bucket,
                location: location.to_string(),
            })
            .send()
            .await
            .context("RegisterAggregateInput")?
            .error_for_status()
            .context("RegisterAggregateInput")?;
        Ok(())
    }

    pub async fn heartbeat(&self) -> Result<bool> {
        let url = format!("{}/api/v1/heartbeat", self.base_url);
        let res = self
            .http
            .get(&url)
            .timeout(self.heartbeat_timeout)
            .send()
            .await
            .context("Heartbeat")?
            .error_for_status()
            .context("Heartbeat")?;

        let HeartbeatResponse { healthy } = res.json().await.context("Heartbeat")?;
        Ok(healthy)
    }
}
