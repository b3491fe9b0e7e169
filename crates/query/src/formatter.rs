use graph::{Binding, SparqlResults};
use std::fmt;

use crate::classifier::QueryIntent;

/// A result row as an ordered list of named fields
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Record {
    fields: Vec<(String, String)>,
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.fields.push((name.into(), value.into()));
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.fields.iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn fields(&self) -> &[(String, String)] {
        &self.fields
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl fmt::Display for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.fields.iter()
            .map(|(name, value)| format!("{}: {}", name, display_value(value)))
            .collect();
        write!(f, "{}", parts.join(", "))
    }
}

/// Segment after the last `/`
pub fn local_name(iri: &str) -> &str {
    iri.rsplit('/').next().unwrap_or(iri)
}

/// Values that look like IRIs are shortened to their last path segment
pub fn display_value(value: &str) -> &str {
    if value.starts_with("http") {
        local_name(value)
    } else {
        value
    }
}

fn value<'a>(row: &'a Binding, var: &str) -> Option<&'a str> {
    row.get(var).map(|v| v.value.as_str())
}

fn label_or(row: &Binding, label: &str, fallback: &str) -> String {
    value(row, label)
        .or_else(|| value(row, fallback))
        .unwrap_or_default()
        .to_string()
}

fn generic_record(vars: &[String], row: &Binding) -> Record {
    let mut record = Record::new();

    for var in vars {
        let Some(v) = value(row, var) else {
            continue;
        };

        match var.strip_suffix("Label").filter(|base| !base.is_empty()) {
            Some(base) => record.push(base, v),
            None => {
                let labelled = row.keys()
                    .any(|k| k != var && k.starts_with(var.as_str()) && k.ends_with("Label"));
                if !labelled {
                    record.push(var.as_str(), v);
                }
            }
        }
    }

    record
}

/// Turn raw bindings into display records shaped for the intent
pub fn format_results(results: &SparqlResults, intent: QueryIntent) -> Vec<Record> {
    results.rows().iter()
        .map(|row| match intent {
            QueryIntent::RelationBetween => {
                let mut record = Record::new();
                record.push("source", label_or(row, "sLabel", "subject"));
                record.push("relation", local_name(value(row, "predicate").unwrap_or_default()));
                record.push("target", label_or(row, "oLabel", "object"));
                record
            }
            QueryIntent::AttributeOf => {
                let mut record = Record::new();
                record.push("attribute", local_name(value(row, "predicate").unwrap_or_default()));
                record.push("value", label_or(row, "objLabel", "object"));
                record
            }
            QueryIntent::EntitiesRelatedTo | QueryIntent::GeneralLookup => generic_record(results.vars(), row),
        })
        .collect()
}
