//! Archivos subidos
//!
//! Los bytes del multipart se vuelcan a un archivo temporal en `UPLOAD_DIR`.
//! `ScopedUpload` es dueño de ese archivo: se borra al llamar `release` o,
//! si la petición termina antes, al soltarse el valor.

use std::io;
use std::path::{Path, PathBuf};
use tempfile::{Builder, NamedTempFile};
use tracing::{debug, warn};

use crate::utils::validation::validate_extension;

pub struct ScopedUpload {
    file: NamedTempFile,
    original_name: String,
    extension: String,
}

/// Extensión declarada en el nombre del archivo, sin punto
///
/// `"rota.KML"` → `"KML"`; sin extensión → `""`.
pub fn extension_of(file_name: &str) -> String {
    Path::new(file_name)
        .extension()
        .and_then(|ext| ext.to_str())
        .unwrap_or_default()
        .to_string()
}

impl ScopedUpload {
    /// Guarda los bytes en un temporal dentro de `dir`
    pub async fn spool(dir: &Path, original_name: &str, bytes: &[u8]) -> io::Result<Self> {
        let extension = extension_of(original_name);
        // El sufijo solo es cosmético; nunca se usa un nombre del cliente tal cual
        let suffix = if validate_extension(&extension).is_ok() {
            format!(".{}", extension.to_ascii_lowercase())
        } else {
            String::new()
        };

        let file = Builder::new()
            .prefix("upload-")
            .suffix(&suffix)
            .tempfile_in(dir)?;
        tokio::fs::write(file.path(), bytes).await?;

        debug!(
            "📥 Upload '{}' ({} bytes) en {}",
            original_name,
            bytes.len(),
            file.path().display()
        );

        Ok(Self {
            file,
            original_name: original_name.to_string(),
            extension,
        })
    }

    pub fn extension(&self) -> &str {
        &self.extension
    }

    pub fn original_name(&self) -> &str {
        &self.original_name
    }

    pub fn path(&self) -> &Path {
        self.file.path()
    }

    pub async fn read_bytes(&self) -> io::Result<Vec<u8>> {
        tokio::fs::read(self.file.path()).await
    }

    /// Borra el temporal ya; un fallo al borrar solo se registra
    pub fn release(self) -> PathBuf {
        let path = self.file.path().to_path_buf();
        if let Err(e) = self.file.close() {
            warn!("⚠️ No se pudo borrar el upload {}: {}", path.display(), e);
        } else {
            debug!("🧹 Upload {} eliminado", path.display());
        }
        path
    }
}
