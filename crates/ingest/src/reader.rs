use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::document::Document;

const SUPPORTED_EXTENSIONS: [&str; 3] = ["txt", "md", "pdf"];

pub struct DocumentReader;

impl DocumentReader {
    pub fn is_supported(path: &Path) -> bool {
        path.extension()
            .and_then(|e| e.to_str())
            .map(|e| SUPPORTED_EXTENSIONS.contains(&e.to_lowercase().as_str()))
            .unwrap_or(false)
    }

    /// Extract plain text from a file
    pub async fn read_file(path: &Path) -> Result<String> {
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("")
            .to_lowercase();

        match extension.as_str() {
            "txt" | "md" => {
                let content = fs::read_to_string(path)
                    .await
                    .context(format!("Failed to read file: {:?}", path))?;
                Ok(content)
            }
            "pdf" => {
                let bytes = fs::read(path)
                    .await
                    .context(format!("Failed to read file: {:?}", path))?;

                let text = tokio::task::spawn_blocking(move || {
                    pdf_extract::extract_text_from_mem(&bytes)
                })
                .await
                .context("PDF extraction task panicked")?
                .map_err(|e| anyhow::anyhow!("Failed to extract PDF text {:?}: {}", path, e))?;

                Ok(text)
            }
            _ => anyhow::bail!("Unsupported file format: {}", extension),
        }
    }

    /// Read a document; extraction failures yield an empty document
    pub async fn read(path: &Path) -> Document {
        let source = path.to_string_lossy().to_string();

        match Self::read_file(path).await {
            Ok(text) => {
                debug!(source = %source, chars = text.len(), "Extracted document text");
                Document::new(source, text)
            }
            Err(e) => {
                warn!(source = %source, error = %e, "Failed to extract document text");
                Document::empty(source)
            }
        }
    }

    /// Supported files under `dir`, sorted by path
    pub fn list_directory(dir: &Path) -> Result<Vec<PathBuf>> {
        if !dir.is_dir() {
            anyhow::bail!("Not a directory: {:?}", dir);
        }

        let mut files = Vec::new();

        for entry in WalkDir::new(dir).sort_by_file_name() {
            let entry = entry.context(format!("Failed to walk directory: {:?}", dir))?;
            let path = entry.path();

            if path.is_file() && Self::is_supported(path) {
                files.push(path.to_path_buf());
            }
        }

        Ok(files)
    }

    /// Read every supported file under `dir`, in path order
    pub async fn read_directory(dir: &Path) -> Result<Vec<Document>> {
        let mut documents = Vec::new();
        for path in Self::list_directory(dir)? {
            documents.push(Self::read(&path).await);
        }
        Ok(documents)
    }
}
