use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// Par clave/valor emitido por `transform` y guardado en los archivos intermedios.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyValue {
    pub key: String,
    pub value: String,
}

impl KeyValue {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// Lógica de negocio que ejecuta el worker. El coordinator nunca la ve.
pub trait Application: Send + Sync {
    fn name(&self) -> &str;

    /// Fase de partición: `(nombre de la fuente, contenido)` -> pares clave/valor.
    fn transform(&self, source: &str, content: &str) -> Vec<KeyValue>;

    /// Fase de agregación: una llamada por clave distinta, con sus valores en orden.
    fn aggregate(&self, key: &str, values: &[String]) -> String;
}

/// WordCount: un par `(palabra, "1")` por token separado por espacios;
/// la agregación suma los valores.
#[derive(Debug, Clone, Copy, Default)]
pub struct WordCount;

impl Application for WordCount {
    fn name(&self) -> &str {
        "wordcount"
    }

    fn transform(&self, _source: &str, content: &str) -> Vec<KeyValue> {
        content
            .split_whitespace()
            .map(|token| KeyValue::new(token, "1"))
            .collect()
    }

    fn aggregate(&self, _key: &str, values: &[String]) -> String {
        let total: u64 = values
            .iter()
            .filter_map(|v| v.trim().parse::<u64>().ok())
            .sum();
        total.to_string()
    }
}

/// Aplicaciones incluidas, seleccionables por nombre desde la CLI del worker.
pub fn application_by_name(name: &str) -> Option<Arc<dyn Application>> {
    match name {
        "wordcount" => Some(Arc::new(WordCount)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wordcount_emite_un_par_por_token() {
        let kvs = WordCount.transform("a.txt", "a b\n  a\tc ");

        let keys: Vec<&str> = kvs.iter().map(|kv| kv.key.as_str()).collect();
        assert_eq!(keys, vec!["a", "b", "a", "c"]);
        assert!(kvs.iter().all(|kv| kv.value == "1"));
    }

    #[test]
    fn wordcount_sobre_contenido_vacio_no_emite_nada() {
        assert!(WordCount.transform("vacio.txt", "   \n").is_empty());
    }

    #[test]
    fn wordcount_aggregate_suma_valores() {
        let values = vec!["1".to_string(), "1".to_string(), "3".to_string()];
        assert_eq!(WordCount.aggregate("a", &values), "5");
    }

    #[test]
    fn application_by_name_resuelve_wordcount() {
        let app = application_by_name("wordcount").unwrap();
        assert_eq!(app.name(), "wordcount");
        assert!(application_by_name("grep").is_none());
    }
}
