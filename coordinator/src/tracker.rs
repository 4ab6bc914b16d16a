use std::{collections::HashMap, time::Instant};

use tokio::task::AbortHandle;

use common::TaskKey;

/// Despacho de una tarea todavía sin ack.
#[derive(Debug)]
pub struct PendingRecord {
    /// Se incrementa con cada redespacho de la misma clave
    pub attempt: u32,
    pub dispatched_at: Instant,
    lease: Option<AbortHandle>,
}

impl PendingRecord {
    fn cancel_lease(&self) {
        if let Some(lease) = &self.lease {
            lease.abort();
        }
    }
}

/// Tareas en vuelo, por `(kind, id)`. Vive dentro de `JobState`, bajo su lock.
#[derive(Debug, Default)]
pub struct PendingTracker {
    records: HashMap<TaskKey, PendingRecord>,
}

impl PendingTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registra un despacho de `key` y devuelve su número de intento.
    /// Un redespacho reemplaza el registro y cancela el lease anterior.
    pub fn track(&mut self, key: TaskKey) -> u32 {
        let attempt = self.records.get(&key).map_or(1, |r| r.attempt + 1);
        let record = PendingRecord {
            attempt,
            dispatched_at: Instant::now(),
            lease: None,
        };
        if let Some(previous) = self.records.insert(key, record) {
            previous.cancel_lease();
        }
        attempt
    }

    /// Asocia el timer del lease al intento `attempt`. Si ese intento ya no es
    /// el actual, el timer se cancela en el acto.
    pub fn attach_lease(&mut self, key: &TaskKey, attempt: u32, lease: AbortHandle) {
        match self.records.get_mut(key) {
            Some(record) if record.attempt == attempt => {
                if let Some(old) = record.lease.replace(lease) {
                    old.abort();
                }
            }
            _ => lease.abort(),
        }
    }

    /// Quita el registro. Devuelve si existía.
    pub fn clear(&mut self, key: &TaskKey) -> bool {
        match self.records.remove(key) {
            Some(record) => {
                record.cancel_lease();
                true
            }
            None => false,
        }
    }

    pub fn is_current(&self, key: &TaskKey, attempt: u32) -> bool {
        self.records
            .get(key)
            .is_some_and(|record| record.attempt == attempt)
    }

    pub fn get(&self, key: &TaskKey) -> Option<&PendingRecord> {
        self.records.get(key)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
