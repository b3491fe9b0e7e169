pub mod document;
pub mod preprocess;
pub mod reader;

pub use document::{Document, generate_doc_id, source_stem};
pub use preprocess::preprocess_text;
pub use reader::DocumentReader;

use anyhow::Result;
use std::path::Path;
use tracing::info;

/// Read every supported document in a directory
pub async fn ingest_directory(dir_path: &Path, preprocess: bool) -> Result<Vec<Document>> {
    let mut documents = DocumentReader::read_directory(dir_path).await?;

    if preprocess {
        for doc in documents.iter_mut().filter(|d| !d.is_empty()) {
            doc.text = preprocess_text(&doc.text);
        }
    }

    let readable = documents.iter().filter(|d| !d.is_empty()).count();
    info!(
        dir = %dir_path.display(),
        documents = documents.len(),
        readable,
        "Ingested directory"
    );

    Ok(documents)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_ingest_directory_keeps_unreadable_documents_empty() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.txt"), "Alice\n\nworks  at Acme.").unwrap();
        std::fs::write(dir.path().join("b.pdf"), b"garbage").unwrap();

        let docs = ingest_directory(dir.path(), true).await.unwrap();

        assert_eq!(docs.len(), 2);
        assert_eq!(docs[0].text, "Alice works at Acme.");
        assert!(docs[1].is_empty());
    }
}
