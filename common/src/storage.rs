use std::{
    fs,
    io,
    path::{Path, PathBuf},
};

use crate::error::StorageError;

/// Almacenamiento de "ubicaciones" completas: se leen enteras y se escriben
/// con semántica crear-o-truncar.
pub trait Storage: Send + Sync {
    fn read(&self, location: &str) -> Result<String, StorageError>;
    fn write(&self, location: &str, contents: &str) -> Result<(), StorageError>;
}

/// Storage sobre el filesystem local. Las ubicaciones relativas se resuelven
/// contra `root`; las absolutas se usan tal cual.
#[derive(Debug, Clone)]
pub struct LocalStorage {
    root: PathBuf,
}

impl LocalStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn resolve(&self, location: &str) -> PathBuf {
        self.root.join(location)
    }
}

impl Storage for LocalStorage {
    /// Bytes que no son UTF-8 válido se reemplazan por U+FFFD: un archivo en
    /// otra codificación sigue siendo legible.
    fn read(&self, location: &str) -> Result<String, StorageError> {
        let bytes = fs::read(self.resolve(location)).map_err(|source| StorageError::Read {
            location: location.to_string(),
            source,
        })?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    fn write(&self, location: &str, contents: &str) -> Result<(), StorageError> {
        let path = self.resolve(location);
        write_atomically(&path, contents).map_err(|source| StorageError::Write {
            location: location.to_string(),
            source,
        })
    }
}

/// Escribe en un temporal único y lo renombra sobre el destino, así dos workers
/// que producen la misma ubicación nunca mezclan contenido.
fn write_atomically(path: &Path, contents: &str) -> io::Result<()> {
    // Crear carpeta de salida si hace falta
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }

    let file_name = path.file_name().ok_or_else(|| {
        io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("ubicación sin nombre de archivo: {}", path.display()),
        )
    })?;

    let tmp = path.with_file_name(format!(
        ".{}.{}.tmp",
        file_name.to_string_lossy(),
        uuid::Uuid::new_v4()
    ));

    fs::write(&tmp, contents)?;
    if let Err(e) = fs::rename(&tmp, path) {
        let _ = fs::remove_file(&tmp);
        return Err(e);
    }
    Ok(())
}
