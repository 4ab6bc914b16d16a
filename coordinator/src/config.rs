use std::{collections::HashSet, net::SocketAddr, time::Duration};

use glob::glob;
use tracing::warn;

use crate::error::{CoordinatorError, Result};

pub const DEFAULT_BUCKETS: u32 = 10;
pub const DEFAULT_LEASE_TIMEOUT: Duration = Duration::from_secs(10);
pub const DEFAULT_GRACE_PERIOD: Duration = Duration::from_secs(3);
pub const DEFAULT_LISTEN_ADDR: &str = "0.0.0.0:8080";

#[derive(Debug, Clone)]
pub struct CoordinatorConfig {
    /// Splits de entrada, uno por tarea de partición
    pub inputs: Vec<String>,
    /// N: cantidad de buckets / tareas de agregación
    pub buckets: u32,
    pub listen_addr: SocketAddr,
    /// Tiempo tras el despacho antes de reencolar una tarea sin ack
    pub lease_timeout: Duration,
    /// Espera entre marcar el job como cerrando y liberar la señal de fin
    pub grace_period: Duration,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            inputs: Vec::new(),
            buckets: DEFAULT_BUCKETS,
            listen_addr: SocketAddr::from(([0, 0, 0, 0], 8080)),
            lease_timeout: DEFAULT_LEASE_TIMEOUT,
            grace_period: DEFAULT_GRACE_PERIOD,
        }
    }
}

impl CoordinatorConfig {
    pub fn new(inputs: Vec<String>, buckets: u32) -> Self {
        Self {
            inputs,
            buckets,
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.buckets == 0 {
            return Err(CoordinatorError::Config(
                "se necesita al menos un bucket".to_string(),
            ));
        }
        if self.lease_timeout.is_zero() {
            return Err(CoordinatorError::Config(
                "el lease no puede ser cero".to_string(),
            ));
        }
        Ok(())
    }
}

/// Expande los patrones de entrada (ej: "data/pg-*.txt") a archivos concretos.
/// Conserva el orden de los patrones y descarta duplicados.
pub fn expand_inputs(patterns: &[String]) -> Result<Vec<String>> {
    let mut seen = HashSet::new();
    let mut inputs = Vec::new();

    for pattern in patterns {
        let entries = glob(pattern).map_err(|e| {
            CoordinatorError::Config(format!("patrón de entrada inválido {pattern}: {e}"))
        })?;

        let mut matched = 0;
        for path in entries.flatten() {
            if !path.is_file() {
                continue;
            }
            matched += 1;
            let input = path.to_string_lossy().to_string();
            if seen.insert(input.clone()) {
                inputs.push(input);
            }
        }

        if matched == 0 {
            warn!("el patrón {} no coincide con ningún archivo", pattern);
        }
    }

    Ok(inputs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::{env, fs, path::PathBuf};

    fn temp_dir(sub: &str) -> PathBuf {
        let base = env::temp_dir().join("coordinator_config_tests").join(sub);
        let _ = fs::remove_dir_all(&base);
        fs::create_dir_all(&base).unwrap();
        base
    }

    #[test]
    fn validate_rechaza_cero_buckets() {
        let config = CoordinatorConfig::new(vec![], 0);
        assert!(matches!(config.validate(), Err(CoordinatorError::Config(_))));
        assert!(CoordinatorConfig::new(vec![], 1).validate().is_ok());
    }

    #[test]
    fn expand_inputs_ordena_y_deduplica() {
        let tmp = temp_dir("expand");
        fs::write(tmp.join("b.txt"), "b").unwrap();
        fs::write(tmp.join("a.txt"), "a").unwrap();
        fs::create_dir_all(tmp.join("dir.txt")).unwrap();

        let all = format!("{}/*.txt", tmp.display());
        let only_a = format!("{}/a.txt", tmp.display());
        let inputs = expand_inputs(&[all, only_a]).unwrap();

        assert_eq!(inputs.len(), 2);
        assert!(inputs[0].ends_with("a.txt"));
        assert!(inputs[1].ends_with("b.txt"));
    }

    #[test]
    fn expand_inputs_con_patron_invalido_falla() {
        let err = expand_inputs(&["data/[".to_string()]).unwrap_err();
        assert!(matches!(err, CoordinatorError::Config(_)));
    }
}
