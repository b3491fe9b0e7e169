use anyhow::{Context, Result};
use sophia::api::source::TripleSource;
use sophia::api::term::Term as RdfTerm;
use sophia::api::triple::Triple as _;
use std::convert::Infallible;
use std::fmt::Write as _;
use std::path::Path;
use tracing::info;

use crate::model::*;

const PREFIXES: [(&str, &str); 3] = [("ex", EX), ("rdf", RDF), ("rdfs", RDFS)];

fn escape_literal(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c => out.push(c),
        }
    }
    out
}

fn write_term(out: &mut String, term: &Term) {
    match term {
        Term::Iri(iri) => {
            let _ = write!(out, "<{}>", iri);
        }
        Term::Blank(id) => {
            let _ = write!(out, "_:{}", id);
        }
        Term::Literal(lit) => {
            let _ = write!(out, "\"{}\"", escape_literal(&lit.lexical));
            if let Some(language) = &lit.language {
                let _ = write!(out, "@{}", language);
            } else if let Some(datatype) = &lit.datatype {
                let _ = write!(out, "^^<{}>", datatype);
            }
        }
    }
}

/// Serialize a graph as Turtle.
///
/// Output depends only on the triple set: subjects appear in sorted order,
/// each with its sorted predicate/object list.
pub fn to_turtle(graph: &KnowledgeGraph) -> String {
    let mut out = String::new();

    for (prefix, namespace) in PREFIXES {
        let _ = writeln!(out, "@prefix {}: <{}> .", prefix, namespace);
    }

    let mut current: Option<&Term> = None;

    for triple in graph {
        if current == Some(&triple.subject) {
            out.push_str(" ;\n    ");
        } else {
            if current.is_some() {
                out.push_str(" .\n");
            }
            out.push('\n');
            write_term(&mut out, &triple.subject);
            out.push(' ');
            current = Some(&triple.subject);
        }

        let _ = write!(out, "<{}> ", triple.predicate);
        write_term(&mut out, &triple.object);
    }

    if current.is_some() {
        out.push_str(" .\n");
    }

    out
}

fn convert_term<T: RdfTerm>(term: T) -> Option<Term> {
    if let Some(iri) = term.iri() {
        return Some(Term::Iri(iri.as_str().to_string()));
    }
    if let Some(id) = term.bnode_id() {
        return Some(Term::Blank(id.as_str().to_string()));
    }
    let lexical = term.lexical_form()?;
    let language = term.language_tag().map(|tag| tag.as_str().to_string());
    let datatype = term.datatype()
        .map(|dt| dt.as_str().to_string())
        .filter(|dt| language.is_none() && dt != XSD_STRING);

    Some(Term::Literal(Literal {
        lexical: lexical.to_string(),
        datatype,
        language,
    }))
}

/// Parse Turtle into a graph; triples that do not fit the model are ignored.
pub fn parse_turtle(text: &str) -> Result<KnowledgeGraph> {
    let mut graph = KnowledgeGraph::new();

    let mut parser = sophia::turtle::parser::turtle::parse_str(text);
    parser
        .try_for_each_triple(|t| -> Result<(), Infallible> {
            let p = t.p();
            let (Some(subject), Some(predicate), Some(object)) =
                (convert_term(t.s()), p.iri(), convert_term(t.o()))
            else {
                return Ok(());
            };
            if matches!(subject, Term::Literal(_)) {
                return Ok(());
            }
            graph.add(subject, predicate.as_str(), object);
            Ok(())
        })
        .map_err(|e| anyhow::anyhow!("Failed to parse Turtle: {}", e))?;

    Ok(graph)
}

pub fn save_turtle(graph: &KnowledgeGraph, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .context(format!("Failed to create directory: {:?}", parent))?;
    }

    std::fs::write(path, to_turtle(graph))
        .context(format!("Failed to write graph: {:?}", path))?;

    info!(path = %path.display(), triples = graph.len(), "Saved knowledge graph");
    Ok(())
}

pub fn load_turtle(path: &Path) -> Result<KnowledgeGraph> {
    let text = std::fs::read_to_string(path)
        .context(format!("Failed to read graph: {:?}", path))?;
    parse_turtle(&text).context(format!("Invalid Turtle in {:?}", path))
}
