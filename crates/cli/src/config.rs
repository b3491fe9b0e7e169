use anyhow::{Context, Result};
use graph::StoreConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub services: ServicesConfig,
    pub store: StoreConfig,
    pub extraction: ExtractionConfig,
    pub paths: PathsConfig,
}

/// External NLP and embedding services
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServicesConfig {
    pub embedding_url: String,
    pub embedding_model: String,
    pub nlp_url: String,
    pub cache_embeddings: bool,
    pub max_cached_embeddings: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractionConfig {
    pub ontology_path: PathBuf,
    pub relation_threshold: f32,
    /// Collapse whitespace and strip stray symbols before extraction
    pub preprocess: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    pub docs_dir: PathBuf,
    pub extracted_dir: PathBuf,
    pub graph_file: PathBuf,
}

impl Default for ServicesConfig {
    fn default() -> Self {
        Self {
            embedding_url: "http://localhost:11434".to_string(),
            embedding_model: "all-minilm".to_string(),
            nlp_url: "http://localhost:8080".to_string(),
            cache_embeddings: true,
            max_cached_embeddings: 10000,
        }
    }
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            ontology_path: PathBuf::from("ontology/relations.ttl"),
            relation_threshold: extract::DEFAULT_RELATION_THRESHOLD,
            preprocess: false,
        }
    }
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            docs_dir: PathBuf::from("data/docs"),
            extracted_dir: PathBuf::from("data/extracted"),
            graph_file: PathBuf::from("data/knowledge_graphs/knowledge_graph.ttl"),
        }
    }
}

impl AppConfig {
    pub fn from_toml(text: &str) -> Result<Self> {
        toml::from_str(text).context("Invalid configuration")
    }

    /// Defaults when no file is given; missing sections and keys also fall back to defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };

        let text = std::fs::read_to_string(path)
            .context(format!("Failed to read config: {:?}", path))?;
        Self::from_toml(&text).context(format!("Failed to load config: {:?}", path))
    }

    pub fn combined_knowledge_file(&self) -> PathBuf {
        self.paths.extracted_dir.join(crate::pipeline::COMBINED_KNOWLEDGE_FILE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = AppConfig::load(None).unwrap();

        assert_eq!(config.services.embedding_model, "all-minilm");
        assert_eq!(config.store.dataset, "kg");
        assert_eq!(config.extraction.relation_threshold, 0.3);
        assert!(!config.extraction.preprocess);
        assert_eq!(
            config.combined_knowledge_file(),
            PathBuf::from("data/extracted/combined_knowledge.json")
        );
    }

    #[test]
    fn test_partial_file_keeps_other_defaults() {
        let config = AppConfig::from_toml(
            r#"
            [store]
            fuseki_url = "http://fuseki:3030"
            dataset = "travel"

            [extraction]
            relation_threshold = 0.45
            "#,
        )
        .unwrap();

        assert_eq!(config.store.fuseki_url, "http://fuseki:3030");
        assert_eq!(config.store.dataset, "travel");
        assert_eq!(config.store.request_timeout_secs, 30);
        assert_eq!(config.extraction.relation_threshold, 0.45);
        assert_eq!(config.extraction.ontology_path, PathBuf::from("ontology/relations.ttl"));
        assert_eq!(config.services.nlp_url, "http://localhost:8080");
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("kgraph.toml");
        std::fs::write(&path, "[paths]\ndocs_dir = \"pdfs\"\n").unwrap();

        let config = AppConfig::load(Some(path.as_path())).unwrap();
        let missing = dir.path().join("missing.toml");

        assert_eq!(config.paths.docs_dir, PathBuf::from("pdfs"));
        assert!(AppConfig::load(Some(missing.as_path())).is_err());
    }

    #[test]
    fn test_unknown_value_types_are_rejected() {
        assert!(AppConfig::from_toml("[extraction]\nrelation_threshold = \"high\"").is_err());
    }
}
