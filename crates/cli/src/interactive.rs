use anyhow::Result;
use query::{QueryAnswer, QueryEngine, QueryError, TranslateError, display_value};
use std::fmt::Write as _;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::warn;

const EXIT_WORDS: [&str; 3] = ["exit", "quit", "q"];

fn capitalize(name: &str) -> String {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Human-readable rendering of an answer, SPARQL included for debugging
pub fn render_answer(answer: &QueryAnswer) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "\n{}", answer.explanation);

    if answer.results.is_empty() {
        let _ = writeln!(out, "\nNo results found. Try rephrasing your question.");
    } else {
        for (i, record) in answer.results.iter().enumerate() {
            let _ = writeln!(out, "\n--- Result {} ---", i + 1);
            for (name, value) in record.fields() {
                let _ = writeln!(out, "{}: {}", capitalize(name), display_value(value));
            }
        }
    }

    let _ = writeln!(out, "\n[SPARQL]\n{}", answer.sparql.trim());
    out
}

/// Answer one question, printing a message instead of failing on an empty graph
pub async fn answer_once(engine: &QueryEngine, question: &str) -> Result<()> {
    match engine.ask(question).await {
        Ok(answer) => println!("{}", render_answer(&answer)),
        Err(QueryError::GraphEmpty) => {
            println!("\nThe knowledge graph is empty. Run `kgraph pipeline` and try again.");
        }
        Err(QueryError::Translate(TranslateError::NoKeyword)) => {
            println!("\nNothing to look up in that question. Try naming a person, place or organization.");
        }
        Err(e) => {
            warn!(error = %e, "Question could not be answered");
            println!("\nCould not answer: {}", e);
        }
    }
    Ok(())
}

/// Read questions from stdin until an exit word or end of input
pub async fn run(engine: &QueryEngine) -> Result<()> {
    let mut stdout = tokio::io::stdout();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    println!("Ask a question about the knowledge graph (type 'exit' to quit).");

    loop {
        stdout.write_all(b"\n> ").await?;
        stdout.flush().await?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        let question = line.trim();

        if question.is_empty() {
            continue;
        }
        if EXIT_WORDS.contains(&question.to_lowercase().as_str()) {
            break;
        }

        answer_once(engine, question).await?;
    }

    Ok(())
}
