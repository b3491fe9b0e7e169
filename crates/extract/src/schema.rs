use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::LazyLock;

static NON_WORD: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\W+").unwrap());

/// Entity categories kept by the extractor. Serialized by their NER tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EntityType {
    #[serde(rename = "ORG")]
    Organization,
    #[serde(rename = "GPE")]
    Place,
    #[serde(rename = "LOC")]
    Location,
    #[serde(rename = "PERSON")]
    Person,
    #[serde(rename = "PRODUCT")]
    Product,
    #[serde(rename = "FAC")]
    Facility,
    #[serde(rename = "EVENT")]
    Event,
    #[serde(rename = "WORK_OF_ART")]
    WorkOfArt,
    #[serde(rename = "LAW")]
    Law,
    #[serde(rename = "NORP")]
    Group,
}

impl EntityType {
    pub const ALL: [EntityType; 10] = [
        EntityType::Organization,
        EntityType::Place,
        EntityType::Location,
        EntityType::Person,
        EntityType::Product,
        EntityType::Facility,
        EntityType::Event,
        EntityType::WorkOfArt,
        EntityType::Law,
        EntityType::Group,
    ];

    /// Parse an NER label; labels outside the allow-list yield `None`.
    pub fn from_tag(tag: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.tag() == tag)
    }

    pub fn tag(self) -> &'static str {
        match self {
            EntityType::Organization => "ORG",
            EntityType::Place => "GPE",
            EntityType::Location => "LOC",
            EntityType::Person => "PERSON",
            EntityType::Product => "PRODUCT",
            EntityType::Facility => "FAC",
            EntityType::Event => "EVENT",
            EntityType::WorkOfArt => "WORK_OF_ART",
            EntityType::Law => "LAW",
            EntityType::Group => "NORP",
        }
    }

    /// URI path segment for entities of this type
    pub fn slug(self) -> &'static str {
        match self {
            EntityType::Organization => "organization",
            EntityType::Place => "place",
            EntityType::Location => "location",
            EntityType::Person => "person",
            EntityType::Product => "product",
            EntityType::Facility => "facility",
            EntityType::Event => "event",
            EntityType::WorkOfArt => "work_of_art",
            EntityType::Law => "law",
            EntityType::Group => "group",
        }
    }

    /// RDF class local name
    pub fn class_name(self) -> &'static str {
        match self {
            EntityType::Organization => "Organization",
            EntityType::Place => "Place",
            EntityType::Location => "Location",
            EntityType::Person => "Person",
            EntityType::Product => "Product",
            EntityType::Facility => "Facility",
            EntityType::Event => "Event",
            EntityType::WorkOfArt => "WorkOfArt",
            EntityType::Law => "Law",
            EntityType::Group => "Group",
        }
    }
}

/// Replace every run of non-word characters with `_` and trim the result.
pub fn sanitize(text: &str) -> String {
    NON_WORD
        .replace_all(text.trim(), "_")
        .trim_matches('_')
        .to_string()
}

/// `TAG_sanitized` identifier; `None` when nothing word-like remains.
pub fn entity_id(entity_type: EntityType, text: &str) -> Option<String> {
    let clean = sanitize(text);
    if clean.is_empty() {
        None
    } else {
        Some(format!("{}_{}", entity_type.tag(), clean))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entity {
    pub text: String,
    #[serde(rename = "type")]
    pub entity_type: EntityType,
    pub start: usize,
    pub end: usize,
}

/// A relation whose type is a vocabulary member
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Relation {
    pub source: String,
    pub target: String,
    #[serde(rename = "type")]
    pub relation: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sentence: Option<String>,
}

/// Entity pair plus the raw phrase found between them, before normalization
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateRelation {
    pub source: String,
    pub target: String,
    pub phrase: String,
    pub sentence: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExtractedKnowledge {
    pub entities: BTreeMap<String, Entity>,
    pub relations: Vec<Relation>,
}

impl ExtractedKnowledge {
    /// Union entities (existing ids win) and append relations.
    pub fn merge(&mut self, other: ExtractedKnowledge) {
        for (id, entity) in other.entities {
            self.entities.entry(id).or_insert(entity);
        }
        self.relations.extend(other.relations);
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty() && self.relations.is_empty()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractedDocument {
    pub doc_id: String,
    pub source: String,
    pub knowledge: ExtractedKnowledge,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize() {
        assert_eq!(sanitize("Acme Corp."), "Acme_Corp");
        assert_eq!(sanitize("  St. John's  Hospital "), "St_John_s_Hospital");
        assert_eq!(sanitize("???"), "");
    }

    #[test]
    fn test_entity_id() {
        assert_eq!(
            entity_id(EntityType::Organization, "Acme Corp").as_deref(),
            Some("ORG_Acme_Corp")
        );
        assert_eq!(entity_id(EntityType::Person, "--"), None);
    }

    #[test]
    fn test_tags_round_trip_and_unknown_tags_are_rejected() {
        for t in EntityType::ALL {
            assert_eq!(EntityType::from_tag(t.tag()), Some(t));
        }
        assert_eq!(EntityType::from_tag("DATE"), None);
        assert_eq!(EntityType::from_tag("CARDINAL"), None);
    }

    #[test]
    fn test_knowledge_file_format() {
        let json = r#"{
            "entities": {
                "PERSON_Alice": {"text": "Alice", "type": "PERSON", "start": 0, "end": 5}
            },
            "relations": [
                {"source": "PERSON_Alice", "target": "ORG_Acme", "type": "works_at", "sentence": "Alice works at Acme."}
            ]
        }"#;

        let knowledge: ExtractedKnowledge = serde_json::from_str(json).unwrap();

        assert_eq!(knowledge.entities["PERSON_Alice"].entity_type, EntityType::Person);
        assert_eq!(knowledge.relations[0].relation, "works_at");
        assert_eq!(knowledge.relations[0].sentence.as_deref(), Some("Alice works at Acme."));
    }

    #[test]
    fn test_merge_keeps_first_entity_and_appends_relations() {
        let mut a = ExtractedKnowledge::default();
        a.entities.insert(
            "GPE_Paris".to_string(),
            Entity { text: "Paris".to_string(), entity_type: EntityType::Place, start: 0, end: 5 },
        );
        let mut b = a.clone();
        b.entities.get_mut("GPE_Paris").unwrap().start = 99;
        b.relations.push(Relation {
            source: "GPE_Paris".to_string(),
            target: "GPE_Paris".to_string(),
            relation: "near".to_string(),
            sentence: None,
        });

        a.merge(b);

        assert_eq!(a.entities["GPE_Paris"].start, 0);
        assert_eq!(a.relations.len(), 1);
    }
}
