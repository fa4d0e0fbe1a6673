// src/extract.rs
use regex::Regex;
use std::sync::LazyLock;

static PYTHON_BLOCK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)```python\s*(.*?)```").expect("valid python fence regex"));

static GENERIC_BLOCK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)```\s*(.*?)```").expect("valid generic fence regex"));

/// Pulls runnable Python out of a free-form model reply.
///
/// Preference order: the first ```` ```python ```` block, then the first fenced
/// block of any kind, then the whole reply. The result is always trimmed, so
/// running it twice yields the same text.
pub fn extract_code(text: &str) -> String {
    if text.is_empty() {
        return String::new();
    }

    if let Some(caps) = PYTHON_BLOCK.captures(text) {
        return caps[1].trim().to_string();
    }

    if let Some(caps) = GENERIC_BLOCK.captures(text) {
        return caps[1].trim().to_string();
    }

    // No fences at all: hand the text to the interpreter and let it complain.
    text.trim().to_string()
}
