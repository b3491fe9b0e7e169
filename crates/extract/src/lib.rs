pub mod nlp;
pub mod normalizer;
pub mod schema;
pub mod vocabulary;

pub use nlp::{AnalyzedText, EntityMention, LanguageAnalyzer, NlpClient, SentenceSpan, Token};
pub use normalizer::{DEFAULT_RELATION_THRESHOLD, RelationMatch, RelationNormalizer};
pub use schema::{
    CandidateRelation, Entity, EntityType, ExtractedDocument, ExtractedKnowledge, Relation,
    entity_id, sanitize,
};
pub use vocabulary::{RelationVocabulary, VocabularyError};

use anyhow::{Context, Result};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Phrase used when no verb separates two entities
pub const RELATED_TO: &str = "related_to";

pub struct Extractor {
    analyzer: Arc<dyn LanguageAnalyzer>,
    normalizer: RelationNormalizer,
}

/// A kept entity mention with its token span
struct Mention {
    id: String,
    start: usize,
    end: usize,
}

impl Extractor {
    pub fn new(analyzer: Arc<dyn LanguageAnalyzer>, normalizer: RelationNormalizer) -> Self {
        Self {
            analyzer,
            normalizer,
        }
    }

    /// Extract typed entities and vocabulary relations from a text.
    ///
    /// Candidates the normalizer rejects are dropped rather than recorded
    /// under a generic relation.
    pub async fn extract_from_text(&self, text: &str) -> Result<ExtractedKnowledge> {
        if text.trim().is_empty() {
            return Ok(ExtractedKnowledge::default());
        }

        let analysis = self.analyzer
            .analyze(text)
            .await
            .context("Failed to analyze text")?;

        let entities = collect_entities(&analysis);
        let candidates = candidate_relations(&analysis);

        // Dense sentences repeat the same verb phrase; encode each phrase once.
        let mut decisions: HashMap<String, RelationMatch> = HashMap::new();
        let mut relations = Vec::new();
        let mut rejected = 0usize;

        for candidate in candidates {
            let decision = match decisions.get(&candidate.phrase) {
                Some(decision) => decision.clone(),
                None => {
                    let decision = self.normalizer.normalize(&candidate.phrase).await?;
                    decisions.insert(candidate.phrase.clone(), decision.clone());
                    decision
                }
            };

            match decision.relation {
                Some(relation) => relations.push(Relation {
                    source: candidate.source,
                    target: candidate.target,
                    relation,
                    sentence: Some(candidate.sentence),
                }),
                None => {
                    rejected += 1;
                    debug!(
                        phrase = %candidate.phrase,
                        score = decision.score,
                        threshold = self.normalizer.threshold(),
                        source = %candidate.source,
                        target = %candidate.target,
                        "Dropped relation below threshold"
                    );
                }
            }
        }

        debug!(
            entities = entities.len(),
            relations = relations.len(),
            rejected,
            "Extracted knowledge from text"
        );

        Ok(ExtractedKnowledge {
            entities,
            relations,
        })
    }

    pub async fn extract_document(&self, document: &ingest::Document) -> Result<ExtractedDocument> {
        let knowledge = self.extract_from_text(&document.text).await?;

        Ok(ExtractedDocument {
            doc_id: document.doc_id.clone(),
            source: document.source.clone(),
            knowledge,
        })
    }

    /// Extract every readable document; failures are logged and the document skipped.
    pub async fn extract_documents(&self, documents: &[ingest::Document]) -> Vec<ExtractedDocument> {
        let mut extracted = Vec::new();

        for document in documents {
            if document.is_empty() {
                warn!(source = %document.source, "Skipping document without text");
                continue;
            }

            match self.extract_document(document).await {
                Ok(doc) => {
                    info!(
                        source = %doc.source,
                        entities = doc.knowledge.entities.len(),
                        relations = doc.knowledge.relations.len(),
                        "Extracted document"
                    );
                    extracted.push(doc);
                }
                Err(e) => {
                    warn!(source = %document.source, error = %e, "Extraction failed, skipping document");
                }
            }
        }

        extracted
    }

    pub fn normalizer(&self) -> &RelationNormalizer {
        &self.normalizer
    }
}

/// Merge per-document knowledge into one combined set
pub fn combine(documents: &[ExtractedDocument]) -> ExtractedKnowledge {
    let mut combined = ExtractedKnowledge::default();
    for doc in documents {
        combined.merge(doc.knowledge.clone());
    }
    combined
}

fn kept_mention(mention: &EntityMention) -> Option<(EntityType, String)> {
    let entity_type = EntityType::from_tag(&mention.label)?;
    let id = entity_id(entity_type, &mention.text)?;
    Some((entity_type, id))
}

/// Allow-listed entities keyed by id; the first mention of an id keeps its span.
pub fn collect_entities(analysis: &AnalyzedText) -> BTreeMap<String, Entity> {
    let mut entities = BTreeMap::new();

    for mention in &analysis.entities {
        let Some((entity_type, id)) = kept_mention(mention) else {
            continue;
        };
        entities.entry(id).or_insert_with(|| Entity {
            text: mention.text.clone(),
            entity_type,
            start: mention.start_char,
            end: mention.end_char,
        });
    }

    entities
}

/// Candidate relations between every ordered pair of allow-listed entities
/// sharing a sentence. The phrase is the underscore-joined lemmas of the verbs
/// between the two mentions, or [`RELATED_TO`] when there are none.
pub fn candidate_relations(analysis: &AnalyzedText) -> Vec<CandidateRelation> {
    let mut mentions: Vec<Mention> = analysis.entities.iter()
        .filter_map(|m| {
            kept_mention(m).map(|(_, id)| Mention {
                id,
                start: m.start,
                end: m.end,
            })
        })
        .collect();
    mentions.sort_by_key(|m| m.start);

    let mut candidates = Vec::new();

    for sentence in &analysis.sentences {
        let in_sentence: Vec<&Mention> = mentions.iter()
            .filter(|m| m.start >= sentence.start && m.end <= sentence.end)
            .collect();

        if in_sentence.len() < 2 {
            continue;
        }

        let sentence_text = analysis.sentence_text(sentence);

        for (i, first) in in_sentence.iter().enumerate() {
            for second in &in_sentence[i + 1..] {
                let between = first.end..second.start.max(first.end);
                let verbs: Vec<&str> = analysis.tokens
                    .get(between)
                    .unwrap_or_default()
                    .iter()
                    .filter(|t| t.pos == "VERB")
                    .map(|t| t.lemma.as_str())
                    .collect();

                let phrase = if verbs.is_empty() {
                    RELATED_TO.to_string()
                } else {
                    verbs.join("_")
                };

                candidates.push(CandidateRelation {
                    source: first.id.clone(),
                    target: second.id.clone(),
                    phrase,
                    sentence: sentence_text.clone(),
                });
            }
        }
    }

    candidates
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use index::Encoder;

    fn token(text: &str, lemma: &str, pos: &str) -> Token {
        Token {
            text: text.to_string(),
            lemma: lemma.to_string(),
            pos: pos.to_string(),
            ws: " ".to_string(),
        }
    }

    fn mention(text: &str, label: &str, start: usize, end: usize, start_char: usize) -> EntityMention {
        EntityMention {
            text: text.to_string(),
            label: label.to_string(),
            start,
            end,
            start_char,
            end_char: start_char + text.len(),
        }
    }

    /// "Alice works at Acme Corp in Paris."
    fn alice_analysis() -> AnalyzedText {
        AnalyzedText {
            tokens: vec![
                token("Alice", "Alice", "PROPN"),
                token("works", "work", "VERB"),
                token("at", "at", "ADP"),
                token("Acme", "Acme", "PROPN"),
                token("Corp", "Corp", "PROPN"),
                token("in", "in", "ADP"),
                token("Paris", "Paris", "PROPN"),
                token(".", ".", "PUNCT"),
            ],
            sentences: vec![SentenceSpan {
                start: 0,
                end: 8,
                text: "Alice works at Acme Corp in Paris.".to_string(),
            }],
            entities: vec![
                mention("Alice", "PERSON", 0, 1, 0),
                mention("Acme Corp", "ORG", 3, 5, 15),
                mention("Paris", "GPE", 6, 7, 28),
            ],
            noun_chunks: vec!["Alice".to_string(), "Acme Corp".to_string(), "Paris".to_string()],
        }
    }

    struct FixedAnalyzer(AnalyzedText);

    #[async_trait]
    impl LanguageAnalyzer for FixedAnalyzer {
        async fn analyze(&self, _text: &str) -> Result<AnalyzedText> {
            Ok(self.0.clone())
        }
    }

    struct FailingAnalyzer;

    #[async_trait]
    impl LanguageAnalyzer for FailingAnalyzer {
        async fn analyze(&self, _text: &str) -> Result<AnalyzedText> {
            anyhow::bail!("service unavailable")
        }
    }

    /// "work" lies next to "works_at"; everything else is orthogonal to the vocabulary.
    struct VerbEncoder;

    #[async_trait]
    impl Encoder for VerbEncoder {
        async fn encode(&self, text: &str) -> Result<Vec<f32>> {
            Ok(match text {
                "works_at" => vec![1.0, 0.0, 0.0],
                "work" => vec![0.95, 0.05, 0.0],
                "located_in" => vec![0.0, 1.0, 0.0],
                _ => vec![0.0, 0.0, 1.0],
            })
        }
    }

    async fn extractor(analyzer: Arc<dyn LanguageAnalyzer>) -> Extractor {
        let vocabulary = RelationVocabulary::from_names(["works_at", "located_in"]).unwrap();
        let normalizer = RelationNormalizer::new(vocabulary, Arc::new(VerbEncoder), DEFAULT_RELATION_THRESHOLD)
            .await
            .unwrap();
        Extractor::new(analyzer, normalizer)
    }

    #[test]
    fn test_candidates_cover_every_pair_in_order() {
        let candidates = candidate_relations(&alice_analysis());

        let pairs: Vec<(&str, &str, &str)> = candidates.iter()
            .map(|c| (c.source.as_str(), c.target.as_str(), c.phrase.as_str()))
            .collect();

        assert_eq!(
            pairs,
            vec![
                ("PERSON_Alice", "ORG_Acme_Corp", "work"),
                ("PERSON_Alice", "GPE_Paris", "work"),
                ("ORG_Acme_Corp", "GPE_Paris", RELATED_TO),
            ]
        );
        assert!(candidates.iter().all(|c| c.sentence == "Alice works at Acme Corp in Paris."));
    }

    #[test]
    fn test_entities_outside_allow_list_are_ignored() {
        let mut analysis = alice_analysis();
        analysis.entities.push(mention("2024", "DATE", 7, 8, 34));

        let entities = collect_entities(&analysis);
        let candidates = candidate_relations(&analysis);

        assert_eq!(entities.len(), 3);
        assert!(!entities.contains_key("DATE_2024"));
        assert_eq!(candidates.len(), 3);
    }

    #[test]
    fn test_entities_in_different_sentences_are_not_paired() {
        let mut analysis = alice_analysis();
        analysis.sentences = vec![
            SentenceSpan { start: 0, end: 3, text: String::new() },
            SentenceSpan { start: 3, end: 8, text: String::new() },
        ];

        let candidates = candidate_relations(&analysis);

        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].source, "ORG_Acme_Corp");
        assert_eq!(candidates[0].sentence, "Acme Corp in Paris .");
    }

    #[test]
    fn test_multiple_verbs_are_joined() {
        let mut analysis = alice_analysis();
        analysis.tokens[2] = token("joined", "join", "VERB");

        let candidates = candidate_relations(&analysis);

        assert_eq!(candidates[0].phrase, "work_join");
    }

    #[tokio::test]
    async fn test_alice_works_at_acme() {
        let extractor = extractor(Arc::new(FixedAnalyzer(alice_analysis()))).await;

        let knowledge = extractor
            .extract_from_text("Alice works at Acme Corp in Paris.")
            .await
            .unwrap();

        assert_eq!(knowledge.entities.len(), 3);
        assert_eq!(knowledge.entities["ORG_Acme_Corp"].start, 15);
        assert!(knowledge.relations.contains(&Relation {
            source: "PERSON_Alice".to_string(),
            target: "ORG_Acme_Corp".to_string(),
            relation: "works_at".to_string(),
            sentence: Some("Alice works at Acme Corp in Paris.".to_string()),
        }));
        // "related_to" between Acme Corp and Paris scores 0 and is dropped
        assert!(!knowledge.relations.iter().any(|r| r.source == "ORG_Acme_Corp"));
        assert!(knowledge.relations.iter().all(|r| extractor.normalizer().vocabulary().contains(&r.relation)));
    }

    #[tokio::test]
    async fn test_empty_text_yields_empty_knowledge() {
        let extractor = extractor(Arc::new(FailingAnalyzer)).await;

        let knowledge = extractor.extract_from_text("   ").await.unwrap();

        assert!(knowledge.is_empty());
    }

    #[tokio::test]
    async fn test_failed_documents_are_skipped() {
        let extractor = extractor(Arc::new(FailingAnalyzer)).await;
        let docs = vec![
            ingest::Document::new("a.txt".to_string(), "Alice works at Acme.".to_string()),
            ingest::Document::empty("b.pdf".to_string()),
        ];

        let extracted = extractor.extract_documents(&docs).await;

        assert!(extracted.is_empty());
    }

    #[tokio::test]
    async fn test_combine_merges_documents() {
        let extractor = extractor(Arc::new(FixedAnalyzer(alice_analysis()))).await;
        let docs = vec![
            ingest::Document::new("a.txt".to_string(), "Alice works at Acme Corp in Paris.".to_string()),
            ingest::Document::new("b.txt".to_string(), "Alice works at Acme Corp in Paris.".to_string()),
        ];

        let extracted = extractor.extract_documents(&docs).await;
        let combined = combine(&extracted);

        assert_eq!(extracted.len(), 2);
        assert_eq!(combined.entities.len(), 3);
        assert_eq!(combined.relations.len(), 4);
    }
}
