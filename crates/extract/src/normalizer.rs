use anyhow::{Context, Result};
use index::{Encoder, cosine_similarity};
use std::sync::Arc;
use tracing::info;

use crate::vocabulary::{RelationVocabulary, VocabularyError};

pub const DEFAULT_RELATION_THRESHOLD: f32 = 0.3;

/// Outcome of normalizing one candidate phrase.
///
/// `relation` is set only when `score` reached the acceptance threshold;
/// `score` is always the best similarity achieved.
#[derive(Debug, Clone, PartialEq)]
pub struct RelationMatch {
    pub relation: Option<String>,
    pub score: f32,
}

impl RelationMatch {
    pub fn is_accepted(&self) -> bool {
        self.relation.is_some()
    }
}

/// Maps free-form relation phrases onto the vocabulary by embedding similarity
pub struct RelationNormalizer {
    vocabulary: RelationVocabulary,
    embeddings: Vec<Vec<f32>>,
    encoder: Arc<dyn Encoder>,
    threshold: f32,
}

impl RelationNormalizer {
    /// Embeds every vocabulary relation once; the vectors live as long as the normalizer.
    pub async fn new(
        vocabulary: RelationVocabulary,
        encoder: Arc<dyn Encoder>,
        threshold: f32,
    ) -> Result<Self> {
        if vocabulary.is_empty() {
            return Err(VocabularyError::Empty.into());
        }

        let embeddings = encoder
            .encode_batch(vocabulary.names())
            .await
            .context("Failed to embed relation vocabulary")?;

        if embeddings.len() != vocabulary.len() {
            anyhow::bail!(
                "Encoder returned {} embeddings for {} relations",
                embeddings.len(),
                vocabulary.len()
            );
        }

        info!(relations = vocabulary.len(), threshold, "Relation normalizer ready");

        Ok(Self {
            vocabulary,
            embeddings,
            encoder,
            threshold,
        })
    }

    pub async fn normalize(&self, phrase: &str) -> Result<RelationMatch> {
        let embedding = self.encoder
            .encode(phrase)
            .await
            .context(format!("Failed to embed relation phrase '{}'", phrase))?;

        Ok(self.best_match(&embedding))
    }

    /// Closest vocabulary relation for an embedding; the first name wins ties.
    pub fn best_match(&self, embedding: &[f32]) -> RelationMatch {
        let mut best_index = 0;
        let mut best_score = f32::NEG_INFINITY;

        for (i, relation_embedding) in self.embeddings.iter().enumerate() {
            let score = cosine_similarity(embedding, relation_embedding);
            if score > best_score {
                best_index = i;
                best_score = score;
            }
        }

        let relation = (best_score >= self.threshold)
            .then(|| self.vocabulary.names()[best_index].clone());

        RelationMatch {
            relation,
            score: best_score,
        }
    }

    pub fn vocabulary(&self) -> &RelationVocabulary {
        &self.vocabulary
    }

    pub fn threshold(&self) -> f32 {
        self.threshold
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::collections::HashMap;

    /// Looks phrases up in a fixed table; unknown phrases map to a far-away axis.
    struct TableEncoder {
        table: HashMap<&'static str, Vec<f32>>,
    }

    #[async_trait]
    impl Encoder for TableEncoder {
        async fn encode(&self, text: &str) -> Result<Vec<f32>> {
            Ok(self.table.get(text).cloned().unwrap_or_else(|| vec![0.0, 0.0, 1.0]))
        }
    }

    fn encoder() -> Arc<dyn Encoder> {
        let table = HashMap::from([
            ("works_at", vec![1.0, 0.0, 0.0]),
            ("located_in", vec![0.0, 1.0, 0.0]),
            ("employ", vec![0.9, 0.1, 0.0]),
            ("sit", vec![0.1, 0.9, 0.0]),
            ("vaguely", vec![0.25, 0.0, 0.97]),
        ]);
        Arc::new(TableEncoder { table })
    }

    async fn normalizer(threshold: f32) -> RelationNormalizer {
        let vocabulary = RelationVocabulary::from_names(["works_at", "located_in"]).unwrap();
        RelationNormalizer::new(vocabulary, encoder(), threshold).await.unwrap()
    }

    #[tokio::test]
    async fn test_similar_phrase_maps_to_closest_relation() {
        let normalizer = normalizer(DEFAULT_RELATION_THRESHOLD).await;

        let m = normalizer.normalize("employ").await.unwrap();
        assert_eq!(m.relation.as_deref(), Some("works_at"));
        assert!(m.score > 0.9);

        let m = normalizer.normalize("sit").await.unwrap();
        assert_eq!(m.relation.as_deref(), Some("located_in"));
    }

    #[tokio::test]
    async fn test_phrase_below_threshold_is_rejected_with_score() {
        let normalizer = normalizer(DEFAULT_RELATION_THRESHOLD).await;

        let m = normalizer.normalize("vaguely").await.unwrap();

        assert!(!m.is_accepted());
        assert!(m.score > 0.2 && m.score < DEFAULT_RELATION_THRESHOLD);
    }

    #[tokio::test]
    async fn test_score_equal_to_threshold_is_accepted() {
        let normalizer = normalizer(1.0).await;

        let m = normalizer.best_match(&[1.0, 0.0, 0.0]);
        assert_eq!(m.relation.as_deref(), Some("works_at"));
    }

    #[tokio::test]
    async fn test_ties_go_to_first_vocabulary_entry() {
        let normalizer = normalizer(0.3).await;

        // Equidistant from both relations; "located_in" sorts first.
        let m = normalizer.best_match(&[1.0, 1.0, 0.0]);
        assert_eq!(m.relation.as_deref(), Some("located_in"));
    }

    #[tokio::test]
    async fn test_accepted_relations_are_vocabulary_members() {
        let normalizer = normalizer(0.0).await;

        for phrase in ["employ", "sit", "vaguely", "unknown_phrase"] {
            let m = normalizer.normalize(phrase).await.unwrap();
            if let Some(relation) = m.relation {
                assert!(normalizer.vocabulary().contains(&relation));
            }
        }
    }
}
