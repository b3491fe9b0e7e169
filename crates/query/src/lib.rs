pub mod classifier;
pub mod engine;
pub mod formatter;
pub mod translator;

pub use classifier::{Classification, ClassifiedQuestion, QueryIntent, QuestionClassifier, match_patterns, patterns};
pub use engine::{QueryAnswer, QueryEngine, QueryError};
pub use formatter::{Record, display_value, format_results};
pub use translator::{
    AttributeQuery, FindEntityQuery, QueryTranslator, RelatedEntitiesQuery, RelationBetweenQuery,
    Resolution, SparqlQuery, TranslateError, TranslatedQuery,
};
