use extract::{Entity, ExtractedKnowledge, sanitize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use tracing::{debug, info, warn};

use crate::model::*;

/// Entity URI: `ex:<slug>/<sanitized id without its tag prefix>`.
///
/// `None` when nothing word-like is left of the id.
pub fn entity_uri(id: &str, entity: &Entity) -> Option<String> {
    let prefix = format!("{}_", entity.entity_type.tag());
    let local = sanitize(id.strip_prefix(&prefix).unwrap_or(id));
    if local.is_empty() {
        return None;
    }
    Some(format!("{}{}/{}", EX, entity.entity_type.slug(), local))
}

pub fn relation_uri(name: &str) -> Option<String> {
    let local = sanitize(name);
    if local.is_empty() {
        return None;
    }
    Some(format!("{}{}", EX, local))
}

pub fn class_uri(entity: &Entity) -> String {
    format!("{}{}", EX, entity.entity_type.class_name())
}

/// Named provenance node derived from the triple and its sentence
pub fn statement_uri(subject: &str, predicate: &str, object: &str, sentence: &str) -> String {
    let mut hasher = Sha256::new();
    for part in [subject, predicate, object, sentence] {
        hasher.update(part.as_bytes());
        hasher.update([0u8]);
    }
    let digest = hasher.finalize();
    format!("{}statement/{}", EX, hex::encode(&digest[..16]))
}

pub struct GraphBuilder;

impl GraphBuilder {
    /// Convert extracted knowledge into triples.
    ///
    /// Relations whose endpoints are not known entities are skipped.
    pub fn build(knowledge: &ExtractedKnowledge) -> KnowledgeGraph {
        let mut graph = KnowledgeGraph::new();
        let mut uris: BTreeMap<&str, String> = BTreeMap::new();

        for (id, entity) in &knowledge.entities {
            let Some(uri) = entity_uri(id, entity) else {
                warn!(id = %id, "Skipping entity with no usable identifier");
                continue;
            };
            let subject = Term::iri(uri.clone());
            graph.add(subject.clone(), RDF_TYPE, Term::iri(class_uri(entity)));
            graph.add(subject, RDFS_LABEL, Term::literal(entity.text.clone()));
            uris.insert(id.as_str(), uri);
        }

        let mut skipped = 0usize;
        let mut provenance = 0usize;

        for relation in &knowledge.relations {
            let (Some(subject), Some(predicate), Some(object)) = (
                uris.get(relation.source.as_str()).cloned(),
                relation_uri(&relation.relation),
                uris.get(relation.target.as_str()).cloned(),
            ) else {
                skipped += 1;
                continue;
            };

            graph.add(Term::iri(subject.clone()), &predicate, Term::iri(object.clone()));

            let Some(sentence) = relation.sentence.as_deref().filter(|s| !s.is_empty()) else {
                continue;
            };

            let statement = Term::iri(statement_uri(&subject, &predicate, &object, sentence));
            graph.add(statement.clone(), RDF_TYPE, Term::iri(RDF_STATEMENT));
            graph.add(statement.clone(), RDF_SUBJECT, Term::iri(subject));
            graph.add(statement.clone(), RDF_PREDICATE, Term::iri(predicate));
            graph.add(statement.clone(), RDF_OBJECT, Term::iri(object));
            graph.add(statement, RDFS_COMMENT, Term::literal(sentence));
            provenance += 1;
        }

        if skipped > 0 {
            debug!(skipped, "Skipped relations with unknown endpoints or unusable names");
        }

        info!(
            entities = knowledge.entities.len(),
            relations = knowledge.relations.len() - skipped,
            provenance,
            triples = graph.len(),
            "Built knowledge graph"
        );

        graph
    }
}
