use anyhow::{Context, Result};
use extract::{
    ExtractedDocument, ExtractedKnowledge, Extractor, LanguageAnalyzer, NlpClient, RelationNormalizer,
    RelationVocabulary,
};
use graph::{FusekiStore, KnowledgeGraph, UploadOutcome};
use index::{CachedEncoder, EmbeddingClient, Encoder};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

use crate::config::{AppConfig, ServicesConfig};

pub const COMBINED_KNOWLEDGE_FILE: &str = "combined_knowledge.json";

pub fn encoder(services: &ServicesConfig) -> Arc<dyn Encoder> {
    let client: Arc<dyn Encoder> = Arc::new(EmbeddingClient::new(
        services.embedding_url.clone(),
        services.embedding_model.clone(),
    ));

    if services.cache_embeddings {
        Arc::new(CachedEncoder::new(client, services.max_cached_embeddings))
    } else {
        client
    }
}

pub fn analyzer(services: &ServicesConfig) -> Arc<dyn LanguageAnalyzer> {
    Arc::new(NlpClient::new(services.nlp_url.clone()))
}

fn write_json<T: serde::Serialize>(value: &T, path: &Path) -> Result<()> {
    let json = serde_json::to_string_pretty(value).context("Failed to serialize knowledge")?;
    std::fs::write(path, json).context(format!("Failed to write {:?}", path))
}

/// `<stem>_knowledge.json`; documents sharing a stem also carry a short doc id
pub fn knowledge_file_names(docs: &[ExtractedDocument]) -> Vec<String> {
    let stems: Vec<String> = docs.iter()
        .map(|doc| ingest::source_stem(&doc.source).unwrap_or_else(|| doc.doc_id.clone()))
        .collect();

    let mut counts: HashMap<&str, usize> = HashMap::new();
    for stem in &stems {
        *counts.entry(stem.as_str()).or_default() += 1;
    }

    docs.iter()
        .zip(&stems)
        .map(|(doc, stem)| {
            if counts[stem.as_str()] > 1 {
                let short_id: String = doc.doc_id.chars().take(8).collect();
                format!("{}_{}_knowledge.json", stem, short_id)
            } else {
                format!("{}_knowledge.json", stem)
            }
        })
        .collect()
}

/// Write one knowledge file per document plus `combined_knowledge.json`
pub fn write_knowledge_files(docs: &[ExtractedDocument], output_dir: &Path) -> Result<ExtractedKnowledge> {
    std::fs::create_dir_all(output_dir)
        .context(format!("Failed to create directory: {:?}", output_dir))?;

    for (doc, name) in docs.iter().zip(knowledge_file_names(docs)) {
        write_json(&doc.knowledge, &output_dir.join(name))?;
    }

    let combined = extract::combine(docs);
    write_json(&combined, &output_dir.join(COMBINED_KNOWLEDGE_FILE))?;

    info!(
        documents = docs.len(),
        entities = combined.entities.len(),
        relations = combined.relations.len(),
        dir = %output_dir.display(),
        "Wrote extracted knowledge"
    );

    Ok(combined)
}

pub fn read_knowledge(path: &Path) -> Result<ExtractedKnowledge> {
    let json = std::fs::read_to_string(path)
        .context(format!("Failed to read knowledge file: {:?}", path))?;
    serde_json::from_str(&json).context(format!("Invalid knowledge file: {:?}", path))
}

/// Documents in `docs_dir` → per-document and combined knowledge files in `output_dir`
pub async fn process(
    config: &AppConfig,
    docs_dir: &Path,
    output_dir: &Path,
    analyzer: Arc<dyn LanguageAnalyzer>,
    encoder: Arc<dyn Encoder>,
) -> Result<ExtractedKnowledge> {
    let vocabulary = RelationVocabulary::load(&config.extraction.ontology_path)?;
    let normalizer = RelationNormalizer::new(vocabulary, encoder, config.extraction.relation_threshold).await?;
    let extractor = Extractor::new(analyzer, normalizer);

    let documents = ingest::ingest_directory(docs_dir, config.extraction.preprocess).await?;
    let extracted = extractor.extract_documents(&documents).await;

    write_knowledge_files(&extracted, output_dir)
}

/// Knowledge file → Turtle graph file
pub fn build(input: &Path, graph_file: &Path) -> Result<KnowledgeGraph> {
    let knowledge = read_knowledge(input)?;
    graph::build_and_save(&knowledge, graph_file)
}

pub async fn upload(store: &FusekiStore, graph_file: &Path) -> Result<UploadOutcome> {
    let turtle = std::fs::read_to_string(graph_file)
        .context(format!("Failed to read graph: {:?}", graph_file))?;
    store.upload(&turtle).await
}

/// Create the working directories the commands write into
pub fn ensure_directories(config: &AppConfig) -> Result<()> {
    let mut dirs: Vec<PathBuf> = vec![config.paths.docs_dir.clone(), config.paths.extracted_dir.clone()];
    if let Some(parent) = config.paths.graph_file.parent().filter(|p| !p.as_os_str().is_empty()) {
        dirs.push(parent.to_path_buf());
    }

    for dir in dirs {
        std::fs::create_dir_all(&dir).context(format!("Failed to create directory: {:?}", dir))?;
    }
    Ok(())
}
