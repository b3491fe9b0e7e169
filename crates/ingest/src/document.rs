use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::path::Path;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    pub doc_id: String,
    pub source: String,
    pub text: String,
}

impl Document {
    pub fn new(source: String, text: String) -> Self {
        let doc_id = generate_doc_id(&source);

        Self {
            doc_id,
            source,
            text,
        }
    }

    /// A document whose text could not be extracted.
    pub fn empty(source: String) -> Self {
        Self::new(source, String::new())
    }

    pub fn is_empty(&self) -> bool {
        self.text.trim().is_empty()
    }
}

/// File stem of a source path, used to name per-document output files
pub fn source_stem(source: &str) -> Option<String> {
    Path::new(source)
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
}

/// Generate a stable document ID from its source path
pub fn generate_doc_id(source: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(source.as_bytes());
    let result = hasher.finalize();
    hex::encode(&result[..16]) // First 16 bytes (32 hex chars)
}
