use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One bound value in a SPARQL JSON result row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BindingValue {
    /// `uri`, `literal`, `typed-literal` or `bnode`
    #[serde(rename = "type")]
    pub kind: String,
    pub value: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub datatype: Option<String>,
    #[serde(rename = "xml:lang", default, skip_serializing_if = "Option::is_none")]
    pub lang: Option<String>,
}

impl BindingValue {
    pub fn uri(value: impl Into<String>) -> Self {
        Self {
            kind: "uri".to_string(),
            value: value.into(),
            datatype: None,
            lang: None,
        }
    }

    pub fn literal(value: impl Into<String>) -> Self {
        Self {
            kind: "literal".to_string(),
            value: value.into(),
            datatype: None,
            lang: None,
        }
    }
}

pub type Binding = BTreeMap<String, BindingValue>;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Head {
    #[serde(default)]
    pub vars: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResultSet {
    #[serde(default)]
    pub bindings: Vec<Binding>,
}

/// `application/sparql-results+json` document for a SELECT query
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SparqlResults {
    #[serde(default)]
    pub head: Head,
    #[serde(default)]
    pub results: ResultSet,
}

impl SparqlResults {
    pub fn new(vars: Vec<String>, bindings: Vec<Binding>) -> Self {
        Self {
            head: Head { vars },
            results: ResultSet { bindings },
        }
    }

    pub fn vars(&self) -> &[String] {
        &self.head.vars
    }

    pub fn rows(&self) -> &[Binding] {
        &self.results.bindings
    }

    pub fn is_empty(&self) -> bool {
        self.results.bindings.is_empty()
    }

    /// Values of one variable across all rows, skipping rows where it is unbound
    pub fn column(&self, var: &str) -> Vec<String> {
        self.results.bindings.iter()
            .filter_map(|row| row.get(var))
            .map(|v| v.value.clone())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parses_fuseki_response() {
        let json = r#"{
            "head": {"vars": ["s", "label"]},
            "results": {"bindings": [
                {"s": {"type": "uri", "value": "http://example.org/person/Alice"},
                 "label": {"type": "literal", "value": "Alice", "xml:lang": "en"}},
                {"label": {"type": "literal", "value": "Acme Corp"}}
            ]}
        }"#;

        let results: SparqlResults = serde_json::from_str(json).unwrap();

        assert_eq!(results.vars(), ["s", "label"]);
        assert_eq!(results.rows().len(), 2);
        assert_eq!(results.rows()[0]["label"].lang.as_deref(), Some("en"));
        assert_eq!(results.column("label"), vec!["Alice", "Acme Corp"]);
        assert_eq!(results.column("s").len(), 1);
    }
}
