pub mod builder;
pub mod model;
pub mod results;
pub mod retry;
pub mod store;
pub mod turtle;

pub use builder::{GraphBuilder, entity_uri, relation_uri, statement_uri};
pub use model::{KnowledgeGraph, Literal, Term, Triple};
pub use results::{Binding, BindingValue, SparqlResults};
pub use retry::RetryPolicy;
pub use store::{FusekiStore, SparqlEndpoint, StoreConfig, StoreError, UploadOutcome};
pub use turtle::{load_turtle, parse_turtle, save_turtle, to_turtle};

use anyhow::Result;
use extract::ExtractedKnowledge;
use std::path::Path;

/// Build the graph for `knowledge` and write it as Turtle
pub fn build_and_save(knowledge: &ExtractedKnowledge, path: &Path) -> Result<KnowledgeGraph> {
    let graph = GraphBuilder::build(knowledge);
    save_turtle(&graph, path)?;
    Ok(graph)
}
