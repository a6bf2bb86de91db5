//! Local file storage for generated documents.

use std::path::{Path, PathBuf};

use crate::error::AppError;

const INVOICE_DIR: &str = "invoices";

#[derive(Debug, Clone)]
pub struct DocumentStorage {
    root: PathBuf,
}

impl DocumentStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path an invoice PDF with the given (already sanitized) stem is stored at.
    pub fn invoice_path(&self, file_stem: &str) -> PathBuf {
        self.root.join(INVOICE_DIR).join(format!("{}.pdf", file_stem))
    }

    pub async fn save_invoice_pdf(&self, file_stem: &str, bytes: &[u8]) -> Result<String, AppError> {
        let path = self.invoice_path(file_stem);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(|err| {
                AppError::Integration(format!("Failed to prepare document storage: {}", err))
            })?;
        }
        tokio::fs::write(&path, bytes).await.map_err(|err| {
            AppError::Integration(format!("Failed to store invoice PDF: {}", err))
        })?;
        tracing::debug!(path = %path.display(), size = bytes.len(), "Invoice PDF stored");
        Ok(path.to_string_lossy().into_owned())
    }

    pub async fn read(&self, stored_path: &str) -> Result<Vec<u8>, AppError> {
        match tokio::fs::read(stored_path).await {
            Ok(bytes) => Ok(bytes),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                Err(AppError::NotFound("Invoice PDF not found".into()))
            }
            Err(err) => Err(AppError::Integration(format!(
                "Failed to read invoice PDF: {}",
                err
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn saves_and_reads_back_under_invoice_dir() {
        let dir = tempfile::tempdir().expect("tempdir");
        let storage = DocumentStorage::new(dir.path());
        let path = storage
            .save_invoice_pdf("001-01-2026", b"%PDF-1.3 test")
            .await
            .expect("save");
        assert!(path.ends_with("invoices/001-01-2026.pdf"));
        let bytes = storage.read(&path).await.expect("read");
        assert_eq!(bytes, b"%PDF-1.3 test");
    }

    #[tokio::test]
    async fn missing_file_is_not_found() {
        let dir = tempfile::tempdir().expect("tempdir");
        let storage = DocumentStorage::new(dir.path());
        let missing = storage.invoice_path("nope");
        let err = storage
            .read(&missing.to_string_lossy())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }
}
