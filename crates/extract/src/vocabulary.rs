use sophia::api::prelude::*;
use std::collections::BTreeSet;
use std::convert::Infallible;
use std::path::Path;
use thiserror::Error;
use tracing::info;

#[derive(Debug, Error)]
pub enum VocabularyError {
    #[error("failed to read ontology {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse ontology: {0}")]
    Parse(String),

    #[error("ontology declares no relations (no subject of a `domain` statement)")]
    Empty,
}

/// The controlled set of relation names a normalized relation may carry.
///
/// Names are de-duplicated and kept in lexicographic order; that order is the
/// tie-break order used by the normalizer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelationVocabulary {
    names: Vec<String>,
}

impl RelationVocabulary {
    pub fn from_names<I, S>(names: I) -> Result<Self, VocabularyError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let unique: BTreeSet<String> = names.into_iter()
            .map(Into::into)
            .map(|n: String| n.trim().to_string())
            .filter(|n| !n.is_empty())
            .collect();

        if unique.is_empty() {
            return Err(VocabularyError::Empty);
        }

        Ok(Self {
            names: unique.into_iter().collect(),
        })
    }

    /// Relation names are the local names of every subject of a `…domain` predicate.
    pub fn from_turtle(ontology: &str) -> Result<Self, VocabularyError> {
        let mut names = BTreeSet::new();

        let mut parser = sophia::turtle::parser::turtle::parse_str(ontology);
        parser
            .try_for_each_triple(|t| -> Result<(), Infallible> {
                let (s, p) = (t.s(), t.p());
                let (Some(subject), Some(predicate)) = (s.iri(), p.iri()) else {
                    return Ok(());
                };
                if predicate.as_str().ends_with("domain") {
                    let name = local_name(subject.as_str());
                    if !name.is_empty() {
                        names.insert(name.to_string());
                    }
                }
                Ok(())
            })
            .map_err(|e| VocabularyError::Parse(e.to_string()))?;

        Self::from_names(names)
    }

    pub fn load(path: &Path) -> Result<Self, VocabularyError> {
        let ontology = std::fs::read_to_string(path).map_err(|source| VocabularyError::Io {
            path: path.display().to_string(),
            source,
        })?;

        let vocabulary = Self::from_turtle(&ontology)?;
        info!(
            path = %path.display(),
            relations = vocabulary.len(),
            "Loaded relation vocabulary"
        );
        Ok(vocabulary)
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn contains(&self, name: &str) -> bool {
        self.names.binary_search_by(|n| Ord::cmp(n.as_str(), name)).is_ok()
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

/// Fragment after `#`, else the last path segment.
pub fn local_name(iri: &str) -> &str {
    match iri.rsplit_once('#') {
        Some((_, fragment)) => fragment,
        None => iri.rsplit('/').next().unwrap_or(iri),
    }
}
