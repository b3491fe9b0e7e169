use anyhow::Result;
use std::collections::BTreeSet;
use thiserror::Error;
use tracing::info;

use crate::embeddings::{Encoder, cosine_similarity};

#[derive(Debug, Error)]
pub enum LabelIndexError {
    #[error("no labels available: the graph is empty")]
    Empty,

    #[error("failed to encode mention '{mention}': {message}")]
    Encoding { mention: String, message: String },
}

#[derive(Debug, Clone, PartialEq)]
pub struct LabelMatch {
    pub label: String,
    pub score: f32,
}

/// Embedding of every distinct label currently in the graph.
///
/// A point-in-time snapshot: it must be rebuilt whenever the graph changes.
pub struct LabelIndex {
    entries: Vec<(String, Vec<f32>)>,
}

impl LabelIndex {
    pub fn empty() -> Self {
        Self { entries: Vec::new() }
    }

    /// Embed each distinct, non-blank label. Entries are kept in label order.
    pub async fn build<I>(labels: I, encoder: &dyn Encoder) -> Result<Self>
    where
        I: IntoIterator<Item = String>,
    {
        let unique: BTreeSet<String> = labels.into_iter()
            .map(|l| l.trim().to_string())
            .filter(|l| !l.is_empty())
            .collect();
        let labels: Vec<String> = unique.into_iter().collect();

        let embeddings = encoder.encode_batch(&labels).await?;
        if embeddings.len() != labels.len() {
            anyhow::bail!(
                "Encoder returned {} embeddings for {} labels",
                embeddings.len(),
                labels.len()
            );
        }

        info!(labels = labels.len(), "Built label index");

        Ok(Self {
            entries: labels.into_iter().zip(embeddings).collect(),
        })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn labels(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(label, _)| label.as_str())
    }

    /// Highest-scoring label for an embedding; the first label wins ties.
    pub fn nearest_to(&self, embedding: &[f32]) -> Option<LabelMatch> {
        let mut best: Option<LabelMatch> = None;

        for (label, label_embedding) in &self.entries {
            let score = cosine_similarity(embedding, label_embedding);
            if best.as_ref().is_none_or(|b| score > b.score) {
                best = Some(LabelMatch {
                    label: label.clone(),
                    score,
                });
            }
        }

        best
    }

    /// Resolve a free-text mention to the nearest graph label (top-1, no threshold).
    pub async fn nearest(
        &self,
        mention: &str,
        encoder: &dyn Encoder,
    ) -> std::result::Result<LabelMatch, LabelIndexError> {
        if self.is_empty() {
            return Err(LabelIndexError::Empty);
        }

        let embedding = encoder.encode(mention).await.map_err(|e| LabelIndexError::Encoding {
            mention: mention.to_string(),
            message: e.to_string(),
        })?;

        self.nearest_to(&embedding).ok_or(LabelIndexError::Empty)
    }
}
