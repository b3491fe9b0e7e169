use extract::{AnalyzedText, LanguageAnalyzer};
use regex::Regex;
use std::sync::{Arc, LazyLock};
use tracing::{debug, warn};

/// Shape of a question; each intent has exactly one query builder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QueryIntent {
    RelationBetween,
    AttributeOf,
    EntitiesRelatedTo,
    GeneralLookup,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Classification {
    RelationBetween { source: String, target: String },
    AttributeOf { entity: String },
    EntitiesRelatedTo { entity: String },
    GeneralLookup,
}

impl Classification {
    pub fn intent(&self) -> QueryIntent {
        match self {
            Classification::RelationBetween { .. } => QueryIntent::RelationBetween,
            Classification::AttributeOf { .. } => QueryIntent::AttributeOf,
            Classification::EntitiesRelatedTo { .. } => QueryIntent::EntitiesRelatedTo,
            Classification::GeneralLookup => QueryIntent::GeneralLookup,
        }
    }

    /// Raw mentions captured from the question, in capture order
    pub fn mentions(&self) -> Vec<&str> {
        match self {
            Classification::RelationBetween { source, target } => vec![source.as_str(), target.as_str()],
            Classification::AttributeOf { entity } | Classification::EntitiesRelatedTo { entity } => {
                vec![entity.as_str()]
            }
            Classification::GeneralLookup => Vec::new(),
        }
    }

    /// One-sentence description of the search about to run
    pub fn explanation(&self) -> String {
        match self {
            Classification::RelationBetween { source, target } => {
                format!("Searching for relationships between '{}' and '{}'.", source, target)
            }
            Classification::AttributeOf { entity } => {
                format!("Looking for attributes and information about '{}'.", entity)
            }
            Classification::EntitiesRelatedTo { entity } => {
                format!("Finding entities related to '{}'.", entity)
            }
            Classification::GeneralLookup => {
                "Performing a general search based on keywords in your question.".to_string()
            }
        }
    }
}

/// One step of the classification cascade
pub struct QuestionPattern {
    pub intent: QueryIntent,
    pub regex: Regex,
}

fn pattern(intent: QueryIntent, regex: &str) -> QuestionPattern {
    QuestionPattern {
        intent,
        regex: Regex::new(regex).unwrap(),
    }
}

static PATTERNS: LazyLock<Vec<QuestionPattern>> = LazyLock::new(|| {
    vec![
        pattern(QueryIntent::RelationBetween, r"(?i)(?:relation|relationship) between (.*) and (.*)"),
        pattern(QueryIntent::RelationBetween, r"(?i)how (?:is|are) (.*) (?:related|connected) to (.*)"),
        pattern(QueryIntent::RelationBetween, r"(?i)what (?:connects|links) (.*) (?:and|to|with) (.*)"),
        pattern(QueryIntent::AttributeOf, r"(?i)what (?:is|are) (.*)"),
        pattern(QueryIntent::AttributeOf, r"(?i)tell me about (.*)"),
        pattern(QueryIntent::AttributeOf, r"(?i)who (?:is|was) (.*)"),
        pattern(QueryIntent::AttributeOf, r"(?i)describe (.*)"),
    ]
});

/// The ordered pattern cascade; the first match wins.
pub fn patterns() -> &'static [QuestionPattern] {
    &PATTERNS
}

fn clean_mention(raw: &str) -> Option<String> {
    let cleaned = raw
        .trim()
        .trim_end_matches(['?', '.', '!'])
        .trim();
    (!cleaned.is_empty()).then(|| cleaned.to_string())
}

/// Classify from the pattern cascade alone
pub fn match_patterns(question: &str) -> Option<Classification> {
    for p in patterns() {
        let Some(caps) = p.regex.captures(question) else {
            continue;
        };

        let classification = match p.intent {
            QueryIntent::RelationBetween => {
                let source = caps.get(1).and_then(|m| clean_mention(m.as_str()));
                let target = caps.get(2).and_then(|m| clean_mention(m.as_str()));
                match (source, target) {
                    (Some(source), Some(target)) => Classification::RelationBetween { source, target },
                    _ => continue,
                }
            }
            _ => match caps.get(1).and_then(|m| clean_mention(m.as_str())) {
                Some(entity) => Classification::AttributeOf { entity },
                None => continue,
            },
        };

        return Some(classification);
    }

    None
}

/// Fallback once no pattern matched: the first entity mention, else a general lookup
pub fn classify_analyzed(analysis: &AnalyzedText) -> Classification {
    analysis.entities.iter()
        .find_map(|e| clean_mention(&e.text))
        .map(|entity| Classification::EntitiesRelatedTo { entity })
        .unwrap_or(Classification::GeneralLookup)
}

/// A classification plus the analysis it was derived from, if one was needed
#[derive(Debug, Clone)]
pub struct ClassifiedQuestion {
    pub classification: Classification,
    pub analysis: Option<AnalyzedText>,
}

pub struct QuestionClassifier {
    analyzer: Arc<dyn LanguageAnalyzer>,
}

impl QuestionClassifier {
    pub fn new(analyzer: Arc<dyn LanguageAnalyzer>) -> Self {
        Self { analyzer }
    }

    /// Patterns first, then entity detection. An analyzer failure degrades to a general lookup.
    pub async fn classify(&self, question: &str) -> ClassifiedQuestion {
        if let Some(classification) = match_patterns(question) {
            debug!(intent = ?classification.intent(), "Question matched pattern");
            return ClassifiedQuestion {
                classification,
                analysis: None,
            };
        }

        match self.analyzer.analyze(question).await {
            Ok(analysis) => ClassifiedQuestion {
                classification: classify_analyzed(&analysis),
                analysis: Some(analysis),
            },
            Err(e) => {
                warn!(error = %e, "Question analysis failed, falling back to general lookup");
                ClassifiedQuestion {
                    classification: Classification::GeneralLookup,
                    analysis: None,
                }
            }
        }
    }
}
