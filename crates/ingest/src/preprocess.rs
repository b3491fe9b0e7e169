use regex::Regex;
use std::sync::LazyLock;

static WHITESPACE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").unwrap());
static DISALLOWED: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"[^\w\s.,;:()\[\]{}"'\-]"#).unwrap());

/// Collapse whitespace runs and drop characters outside words and basic punctuation.
///
/// PDF extraction leaves hard line breaks and ligature debris in the text; this
/// flattens it so sentence segmentation sees one continuous paragraph.
pub fn preprocess_text(text: &str) -> String {
    let collapsed = WHITESPACE.replace_all(text, " ");
    let cleaned = DISALLOWED.replace_all(&collapsed, "");
    cleaned.trim().to_string()
}
