use anyhow::{Context, Result};
use extract::LanguageAnalyzer;
use graph::SparqlEndpoint;
use index::{Encoder, LabelIndex};
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};

use crate::classifier::{Classification, QuestionClassifier};
use crate::formatter::{Record, format_results};
use crate::translator::{QueryTranslator, Resolution, TranslateError};

#[derive(Debug, Error)]
pub enum QueryError {
    #[error("the knowledge graph has no labels yet; build and upload a graph first")]
    GraphEmpty,

    #[error(transparent)]
    Translate(TranslateError),
}

impl From<TranslateError> for QueryError {
    fn from(e: TranslateError) -> Self {
        match e {
            TranslateError::NoLabels => QueryError::GraphEmpty,
            other => QueryError::Translate(other),
        }
    }
}

#[derive(Debug, Clone)]
pub struct QueryAnswer {
    pub question: String,
    pub classification: Classification,
    pub explanation: String,
    pub sparql: String,
    pub resolutions: Vec<Resolution>,
    pub results: Vec<Record>,
}

/// Answers natural-language questions against a SPARQL endpoint
pub struct QueryEngine {
    classifier: QuestionClassifier,
    translator: QueryTranslator,
    store: Arc<dyn SparqlEndpoint>,
}

impl QueryEngine {
    /// Starts with an empty label index; call [`QueryEngine::refresh_labels`] before asking.
    pub fn new(
        analyzer: Arc<dyn LanguageAnalyzer>,
        encoder: Arc<dyn Encoder>,
        store: Arc<dyn SparqlEndpoint>,
    ) -> Self {
        Self {
            classifier: QuestionClassifier::new(analyzer),
            translator: QueryTranslator::new(encoder, LabelIndex::empty()),
            store,
        }
    }

    /// Rebuild the label index from the labels currently in the store
    pub async fn refresh_labels(&mut self) -> Result<usize> {
        let labels = self.store.labels().await.context("Failed to fetch graph labels")?;
        let count = self.translator.rebuild_labels(labels).await?;
        info!(labels = count, "Label index refreshed");
        Ok(count)
    }

    pub fn label_count(&self) -> usize {
        self.translator.labels().len()
    }

    pub async fn ask(&self, question: &str) -> Result<QueryAnswer, QueryError> {
        let classified = self.classifier.classify(question).await;
        let explanation = classified.classification.explanation();

        let translated = self.translator.translate(question, &classified).await?;

        let results = match self.store.select(&translated.sparql).await {
            Ok(raw) => format_results(&raw, classified.classification.intent()),
            Err(e) => {
                warn!(error = %e, "Query execution failed, returning no results");
                Vec::new()
            }
        };

        info!(
            intent = ?classified.classification.intent(),
            results = results.len(),
            "Answered question"
        );

        Ok(QueryAnswer {
            question: question.to_string(),
            classification: classified.classification,
            explanation,
            sparql: translated.sparql,
            resolutions: translated.resolutions,
            results,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use extract::AnalyzedText;
    use graph::{BindingValue, SparqlResults};

    struct NoEntities;

    #[async_trait]
    impl LanguageAnalyzer for NoEntities {
        async fn analyze(&self, _text: &str) -> Result<AnalyzedText> {
            Ok(AnalyzedText::default())
        }
    }

    struct ConstantEncoder;

    #[async_trait]
    impl Encoder for ConstantEncoder {
        async fn encode(&self, _text: &str) -> Result<Vec<f32>> {
            Ok(vec![1.0, 0.0])
        }
    }

    /// Serves a fixed label list and fails every other query
    struct FlakyStore {
        labels: Vec<&'static str>,
    }

    #[async_trait]
    impl SparqlEndpoint for FlakyStore {
        async fn select(&self, sparql: &str) -> Result<SparqlResults> {
            if sparql == graph::store::LABELS_QUERY {
                let rows = self.labels.iter()
                    .map(|l| [("label".to_string(), BindingValue::literal(*l))].into_iter().collect())
                    .collect();
                return Ok(SparqlResults::new(vec!["label".to_string()], rows));
            }
            anyhow::bail!("503 Service Unavailable")
        }
    }

    fn engine(labels: Vec<&'static str>) -> QueryEngine {
        QueryEngine::new(Arc::new(NoEntities), Arc::new(ConstantEncoder), Arc::new(FlakyStore { labels }))
    }

    #[tokio::test]
    async fn test_empty_graph_is_reported() {
        let mut engine = engine(vec![]);
        assert_eq!(engine.refresh_labels().await.unwrap(), 0);

        let result = engine.ask("Who is Alice?").await;

        assert!(matches!(result, Err(QueryError::GraphEmpty)));
    }

    #[tokio::test]
    async fn test_store_failure_yields_no_results() {
        let mut engine = engine(vec!["Alice"]);
        engine.refresh_labels().await.unwrap();

        let answer = engine.ask("Who is Alice?").await.unwrap();

        assert_eq!(answer.explanation, "Looking for attributes and information about 'Alice'.");
        assert!(answer.results.is_empty());
        assert!(answer.sparql.contains("SELECT ?predicate ?object ?objLabel"));
    }

    #[tokio::test]
    async fn test_punctuation_only_question_is_not_a_wildcard() {
        let mut engine = engine(vec!["Alice"]);
        engine.refresh_labels().await.unwrap();

        let result = engine.ask("?").await;

        assert!(matches!(result, Err(QueryError::Translate(TranslateError::NoKeyword))));
    }
}
