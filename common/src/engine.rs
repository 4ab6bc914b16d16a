use tracing::debug;

use crate::{
    app::{Application, KeyValue},
    error::EngineError,
    storage::Storage,
    task::{Task, TaskKind},
};

/// Salida de una tarea de partición que hay que registrar en el coordinator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AggregateInput {
    pub bucket: u32,
    pub location: String,
}

/* =========================
   Nombres y hash de claves
   ========================= */

const FNV_OFFSET_BASIS: u32 = 0x811c_9dc5;
const FNV_PRIME: u32 = 0x0100_0193;

/// Bucket de una clave: FNV-1a de 32 bits (sin bit de signo) módulo `buckets`.
/// Estable entre procesos y compilaciones, a diferencia de `DefaultHasher`.
pub fn bucket_for_key(key: &str, buckets: u32) -> u32 {
    let mut h = FNV_OFFSET_BASIS;
    for b in key.as_bytes() {
        h ^= u32::from(*b);
        h = h.wrapping_mul(FNV_PRIME);
    }
    (h & 0x7fff_ffff) % buckets.max(1)
}

/// Ubicación intermedia de `(tarea de partición, bucket)`.
pub fn intermediate_location(task_id: &str, bucket: u32) -> String {
    format!("mr-{}-{}", task_id, bucket)
}

/// Ubicación final de una tarea de agregación.
pub fn output_location(task_id: &str) -> String {
    format!("mr-out-{}", task_id)
}

/* =========================
   Fase de partición
   ========================= */

/// Ejecuta una tarea de partición:
/// 1. lee todas las entradas (un error de lectura aborta la tarea)
/// 2. aplica `transform` a cada una
/// 3. reparte los pares en N buckets por hash de la clave
/// 4. escribe los N buckets (los vacíos como `[]`)
///
/// Devuelve las salidas a registrar, una por bucket, en orden de bucket.
pub fn run_partition(
    task: &Task,
    app: &dyn Application,
    storage: &dyn Storage,
) -> Result<Vec<AggregateInput>, EngineError> {
    expect_kind(task, TaskKind::Partition)?;
    if task.buckets == 0 {
        return Err(EngineError::NoBuckets(task.id.clone()));
    }

    // 1) Leer todo antes de emitir nada: sin salidas parciales
    let mut contents = Vec::with_capacity(task.inputs.len());
    for location in &task.inputs {
        contents.push((location.as_str(), storage.read(location)?));
    }

    // 2) + 3) transform y shuffle a buckets
    let mut buckets: Vec<Vec<KeyValue>> = vec![Vec::new(); task.buckets as usize];
    for (location, content) in &contents {
        for kv in app.transform(location, content) {
            let b = bucket_for_key(&kv.key, task.buckets) as usize;
            buckets[b].push(kv);
        }
    }

    // 4) Escribir cada bucket
    let mut outputs = Vec::with_capacity(buckets.len());
    for (bucket, records) in buckets.iter().enumerate() {
        let bucket = bucket as u32;
        let location = intermediate_location(&task.id, bucket);
        let encoded = serde_json::to_string(records)
            .map_err(|source| EngineError::Encode { bucket, source })?;
        storage.write(&location, &encoded)?;

        debug!(
            task_id = %task.id,
            bucket,
            records = records.len(),
            "bucket intermedio escrito en {}",
            location
        );
        outputs.push(AggregateInput { bucket, location });
    }

    Ok(outputs)
}

/* =========================
   Fase de agregación
   ========================= */

/// Ejecuta una tarea de agregación y devuelve la ubicación de salida.
/// El archivo queda con líneas `clave valor` ordenadas por clave.
pub fn run_aggregate(
    task: &Task,
    app: &dyn Application,
    storage: &dyn Storage,
) -> Result<String, EngineError> {
    expect_kind(task, TaskKind::Aggregate)?;

    let mut records: Vec<KeyValue> = Vec::new();
    for location in &task.inputs {
        let raw = storage.read(location)?;
        records.extend(decode_records(location, &raw)?);
    }

    let aggregated = aggregate_records(records, app);

    let mut out = String::new();
    for (key, value) in &aggregated {
        out.push_str(key);
        out.push(' ');
        out.push_str(value);
        out.push('\n');
    }

    let location = output_location(&task.id);
    storage.write(&location, &out)?;

    debug!(
        task_id = %task.id,
        inputs = task.inputs.len(),
        keys = aggregated.len(),
        "salida de agregación escrita en {}",
        location
    );
    Ok(location)
}

/// Ordena por clave (estable: conserva el orden de llegada de los valores),
/// agrupa claves iguales consecutivas y llama a `aggregate` una vez por clave.
pub fn aggregate_records(
    mut records: Vec<KeyValue>,
    app: &dyn Application,
) -> Vec<(String, String)> {
    records.sort_by(|a, b| a.key.cmp(&b.key));

    let mut out = Vec::new();
    let mut i = 0;
    while i < records.len() {
        let mut j = i + 1;
        while j < records.len() && records[j].key == records[i].key {
            j += 1;
        }

        let values: Vec<String> = records[i..j].iter().map(|kv| kv.value.clone()).collect();
        let key = records[i].key.clone();
        let value = app.aggregate(&key, &values);
        out.push((key, value));

        i = j;
    }
    out
}

/// Lee un archivo intermedio (array JSON de `{key, value}`). Vacío equivale a `[]`.
fn decode_records(location: &str, raw: &str) -> Result<Vec<KeyValue>, EngineError> {
    if raw.trim().is_empty() {
        return Ok(Vec::new());
    }
    serde_json::from_str(raw).map_err(|source| EngineError::Decode {
        location: location.to_string(),
        source,
    })
}

fn expect_kind(task: &Task, expected: TaskKind) -> Result<(), EngineError> {
    if task.kind != expected {
        return Err(EngineError::WrongKind {
            expected,
            found: task.kind,
        });
    }
    Ok(())
}
