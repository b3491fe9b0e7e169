use extract::AnalyzedText;
use index::{Encoder, LabelIndex, LabelIndexError};
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

use crate::classifier::{Classification, ClassifiedQuestion};

const PREFIXES: &str = "PREFIX rdfs: <http://www.w3.org/2000/01/rdf-schema#>
PREFIX rdf: <http://www.w3.org/1999/02/22-rdf-syntax-ns#>
";

#[derive(Debug, Error)]
pub enum TranslateError {
    #[error("no labels to resolve against: the knowledge graph is empty")]
    NoLabels,

    #[error("failed to resolve '{mention}': {message}")]
    Resolution { mention: String, message: String },

    #[error("the question has nothing to look up")]
    NoKeyword,
}

impl From<LabelIndexError> for TranslateError {
    fn from(e: LabelIndexError) -> Self {
        match e {
            LabelIndexError::Empty => TranslateError::NoLabels,
            LabelIndexError::Encoding { mention, message } => TranslateError::Resolution { mention, message },
        }
    }
}

/// Escape text so a SPARQL `REGEX` matches it literally.
///
/// Regex metacharacters are backslash-escaped first, then the result is
/// escaped for a double-quoted SPARQL string.
pub fn regex_literal(text: &str) -> String {
    let mut pattern = String::with_capacity(text.len());
    for c in text.chars() {
        if matches!(c, '\\' | '.' | '?' | '*' | '+' | '(' | ')' | '{' | '}' | '[' | ']' | '^' | '$' | '|' | '-') {
            pattern.push('\\');
        }
        pattern.push(c);
    }

    let mut escaped = String::with_capacity(pattern.len());
    for c in pattern.chars() {
        match c {
            '\\' => escaped.push_str("\\\\"),
            '"' => escaped.push_str("\\\""),
            '\n' => escaped.push_str("\\n"),
            '\r' => escaped.push_str("\\r"),
            '\t' => escaped.push_str("\\t"),
            c => escaped.push(c),
        }
    }
    escaped
}

pub trait SparqlQuery {
    fn to_sparql(&self) -> String;
}

/// Edges whose subject label matches `source` and object label matches `target`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelationBetweenQuery {
    pub source: String,
    pub target: String,
}

impl SparqlQuery for RelationBetweenQuery {
    fn to_sparql(&self) -> String {
        format!(
            "{PREFIXES}SELECT ?subject ?predicate ?object ?sLabel ?oLabel WHERE {{
    ?subject ?predicate ?object .
    ?subject rdfs:label ?sLabel .
    ?object rdfs:label ?oLabel .
    FILTER(REGEX(?sLabel, \"{}\", \"i\"))
    FILTER(REGEX(?oLabel, \"{}\", \"i\"))
}}",
            regex_literal(&self.source),
            regex_literal(&self.target),
        )
    }
}

/// Every outgoing edge of the matching entity, with the object's label when it has one
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributeQuery {
    pub entity: String,
}

impl SparqlQuery for AttributeQuery {
    fn to_sparql(&self) -> String {
        format!(
            "{PREFIXES}SELECT ?predicate ?object ?objLabel WHERE {{
    ?entity rdfs:label ?label .
    FILTER(REGEX(?label, \"{}\", \"i\"))
    ?entity ?predicate ?object .
    OPTIONAL {{ ?object rdfs:label ?objLabel }}
}}",
            regex_literal(&self.entity),
        )
    }
}

/// Labelled neighbours of the matching entity, in either direction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelatedEntitiesQuery {
    pub entity: String,
}

impl SparqlQuery for RelatedEntitiesQuery {
    fn to_sparql(&self) -> String {
        let pattern = regex_literal(&self.entity);
        format!(
            "{PREFIXES}SELECT ?relation ?entity ?label WHERE {{
    {{
        ?subject rdfs:label ?sLabel .
        ?subject ?relation ?entity .
        ?entity rdfs:label ?label .
        FILTER(REGEX(?sLabel, \"{pattern}\", \"i\"))
    }} UNION {{
        ?entity ?relation ?object .
        ?entity rdfs:label ?label .
        ?object rdfs:label ?oLabel .
        FILTER(REGEX(?oLabel, \"{pattern}\", \"i\"))
    }}
}}"
        )
    }
}

/// Typed entities whose label matches a keyword
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FindEntityQuery {
    pub keyword: String,
}

impl SparqlQuery for FindEntityQuery {
    fn to_sparql(&self) -> String {
        format!(
            "{PREFIXES}SELECT ?entity ?label ?type WHERE {{
    ?entity rdfs:label ?label .
    ?entity a ?type .
    FILTER(REGEX(?label, \"{}\", \"i\"))
}}",
            regex_literal(&self.keyword),
        )
    }
}

fn first_entity(analysis: Option<&AnalyzedText>) -> Option<String> {
    analysis?.entities.iter()
        .map(|e| e.text.trim())
        .find(|t| !t.is_empty())
        .map(str::to_string)
}

fn first_noun_chunk(analysis: Option<&AnalyzedText>) -> Option<String> {
    analysis?.noun_chunks.iter()
        .map(|c| c.trim())
        .find(|c| !c.is_empty())
        .map(str::to_string)
}

fn stripped_question(question: &str) -> Option<String> {
    let stripped = question.replace('?', "");
    let stripped = stripped.trim();
    (!stripped.is_empty()).then(|| stripped.to_string())
}

/// Keyword for a general lookup: named entities, then noun chunks, then the bare question
pub fn lookup_keyword(question: &str, analysis: Option<&AnalyzedText>) -> Option<String> {
    first_entity(analysis)
        .or_else(|| first_noun_chunk(analysis))
        .or_else(|| stripped_question(question))
}

/// A raw mention and the graph label it resolved to
#[derive(Debug, Clone, PartialEq)]
pub struct Resolution {
    pub mention: String,
    pub label: String,
    pub score: f32,
}

#[derive(Debug, Clone)]
pub struct TranslatedQuery {
    pub sparql: String,
    pub resolutions: Vec<Resolution>,
}

/// Resolves mentions to graph labels and builds the query for an intent
pub struct QueryTranslator {
    encoder: Arc<dyn Encoder>,
    labels: LabelIndex,
}

impl QueryTranslator {
    pub fn new(encoder: Arc<dyn Encoder>, labels: LabelIndex) -> Self {
        Self { encoder, labels }
    }

    pub fn labels(&self) -> &LabelIndex {
        &self.labels
    }

    pub fn set_labels(&mut self, labels: LabelIndex) {
        self.labels = labels;
    }

    /// Build a fresh label index with this translator's encoder
    pub async fn rebuild_labels(&mut self, labels: Vec<String>) -> anyhow::Result<usize> {
        self.labels = LabelIndex::build(labels, self.encoder.as_ref()).await?;
        Ok(self.labels.len())
    }

    async fn resolve(&self, mention: &str) -> Result<Resolution, TranslateError> {
        let m = self.labels.nearest(mention, self.encoder.as_ref()).await?;
        debug!(mention, label = %m.label, score = m.score, "Resolved mention");
        Ok(Resolution {
            mention: mention.to_string(),
            label: m.label,
            score: m.score,
        })
    }

    pub async fn translate(
        &self,
        question: &str,
        classified: &ClassifiedQuestion,
    ) -> Result<TranslatedQuery, TranslateError> {
        if self.labels.is_empty() {
            return Err(TranslateError::NoLabels);
        }

        let mut resolutions = Vec::new();

        let sparql = match &classified.classification {
            Classification::RelationBetween { source, target } => {
                let source = self.resolve(source).await?;
                let target = self.resolve(target).await?;
                let query = RelationBetweenQuery {
                    source: source.label.clone(),
                    target: target.label.clone(),
                };
                resolutions.extend([source, target]);
                query.to_sparql()
            }
            Classification::AttributeOf { entity } => {
                let entity = self.resolve(entity).await?;
                let query = AttributeQuery { entity: entity.label.clone() };
                resolutions.push(entity);
                query.to_sparql()
            }
            Classification::EntitiesRelatedTo { entity } => {
                let entity = self.resolve(entity).await?;
                let query = RelatedEntitiesQuery { entity: entity.label.clone() };
                resolutions.push(entity);
                query.to_sparql()
            }
            Classification::GeneralLookup => {
                let keyword = lookup_keyword(question, classified.analysis.as_ref())
                    .ok_or(TranslateError::NoKeyword)?;
                debug!(keyword = %keyword, "General lookup keyword");
                FindEntityQuery { keyword }.to_sparql()
            }
        };

        Ok(TranslatedQuery { sparql, resolutions })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use async_trait::async_trait;
    use extract::EntityMention;

    /// Letter-frequency vectors; identical strings score 1.0.
    struct LetterEncoder;

    #[async_trait]
    impl Encoder for LetterEncoder {
        async fn encode(&self, text: &str) -> Result<Vec<f32>> {
            let mut v = vec![0.0; 26];
            for c in text.to_lowercase().chars().filter(|c| c.is_ascii_lowercase()) {
                v[(c as u8 - b'a') as usize] += 1.0;
            }
            Ok(v)
        }
    }

    async fn translator(labels: &[&str]) -> QueryTranslator {
        let encoder: Arc<dyn Encoder> = Arc::new(LetterEncoder);
        let index = LabelIndex::build(labels.iter().map(|l| l.to_string()), encoder.as_ref())
            .await
            .unwrap();
        QueryTranslator::new(encoder, index)
    }

    fn classified(classification: Classification, analysis: Option<AnalyzedText>) -> ClassifiedQuestion {
        ClassifiedQuestion { classification, analysis }
    }

    #[test]
    fn test_regex_literal_escaping() {
        assert_eq!(regex_literal("Acme Corp"), "Acme Corp");
        assert_eq!(regex_literal("A.B (x)"), "A\\\\.B \\\\(x\\\\)");
        assert_eq!(regex_literal("say \"hi\""), "say \\\"hi\\\"");
    }

    #[tokio::test]
    async fn test_mentions_resolve_to_graph_labels() {
        let translator = translator(&["Acme Corp", "Alice", "Paris"]).await;
        let c = classified(
            Classification::RelationBetween {
                source: "alice".to_string(),
                target: "ACME corp".to_string(),
            },
            None,
        );

        let translated = translator.translate("", &c).await.unwrap();

        let labels: Vec<&str> = translated.resolutions.iter().map(|r| r.label.as_str()).collect();
        assert_eq!(labels, vec!["Alice", "Acme Corp"]);
        assert!(translated.sparql.contains("FILTER(REGEX(?sLabel, \"Alice\", \"i\"))"));
        assert!(translated.sparql.contains("FILTER(REGEX(?oLabel, \"Acme Corp\", \"i\"))"));
    }

    #[tokio::test]
    async fn test_empty_index_is_no_labels_for_every_intent() {
        let translator = QueryTranslator::new(Arc::new(LetterEncoder), LabelIndex::empty());

        for classification in [
            Classification::RelationBetween { source: "a".to_string(), target: "b".to_string() },
            Classification::AttributeOf { entity: "a".to_string() },
            Classification::EntitiesRelatedTo { entity: "a".to_string() },
            Classification::GeneralLookup,
        ] {
            let result = translator.translate("hello", &classified(classification, None)).await;
            assert!(matches!(result, Err(TranslateError::NoLabels)));
        }
    }

    #[tokio::test]
    async fn test_general_lookup_keyword_fallbacks() {
        let translator = translator(&["Alice"]).await;

        let with_chunks = AnalyzedText {
            noun_chunks: vec!["hello".to_string()],
            ..Default::default()
        };
        let translated = translator
            .translate("hello", &classified(Classification::GeneralLookup, Some(with_chunks)))
            .await
            .unwrap();
        assert!(translated.sparql.contains("FILTER(REGEX(?label, \"hello\", \"i\"))"));
        assert!(translated.resolutions.is_empty());

        let translated = translator
            .translate("  hello? ", &classified(Classification::GeneralLookup, None))
            .await
            .unwrap();
        assert!(translated.sparql.contains("FILTER(REGEX(?label, \"hello\", \"i\"))"));
    }

    #[test]
    fn test_lookup_keyword_prefers_entities() {
        let analysis = AnalyzedText {
            entities: vec![EntityMention {
                text: "Kerala".to_string(),
                label: "GPE".to_string(),
                ..Default::default()
            }],
            noun_chunks: vec!["the backwaters".to_string()],
            ..Default::default()
        };

        assert_eq!(lookup_keyword("the backwaters of Kerala?", Some(&analysis)).as_deref(), Some("Kerala"));
        assert_eq!(lookup_keyword(" ?? ", None), None);
    }

    #[tokio::test]
    async fn test_question_without_keyword_is_rejected() {
        let translator = translator(&["Alice"]).await;

        let result = translator
            .translate("?", &classified(Classification::GeneralLookup, Some(AnalyzedText::default())))
            .await;

        assert!(matches!(result, Err(TranslateError::NoKeyword)));
    }

    #[test]
    fn test_related_query_matches_both_directions() {
        let sparql = RelatedEntitiesQuery { entity: "Paris".to_string() }.to_sparql();

        assert!(sparql.contains("UNION"));
        assert!(sparql.contains("FILTER(REGEX(?sLabel, \"Paris\", \"i\"))"));
        assert!(sparql.contains("FILTER(REGEX(?oLabel, \"Paris\", \"i\"))"));
    }
}
