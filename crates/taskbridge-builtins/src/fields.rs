//! Payload field helpers shared by the built-in agents.

use serde_json::Value;

pub(crate) fn required_str<'a>(payload: &'a Value, field: &str) -> Result<&'a str, String> {
    match payload.get(field) {
        Some(Value::String(s)) if !s.trim().is_empty() => Ok(s),
        Some(Value::String(_)) => Err(format!("field '{field}' must not be empty")),
        Some(_) => Err(format!("field '{field}' must be a string")),
        None => Err(format!("missing field '{field}'")),
    }
}

pub(crate) fn optional_str<'a>(payload: &'a Value, field: &str) -> Option<&'a str> {
    payload
        .get(field)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

/// Lowercased words of at least four characters, deduplicated, in order.
pub(crate) fn keywords(text: &str) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for word in text
        .split(|c: char| !c.is_alphanumeric() && c != '+' && c != '#')
        .map(str::to_lowercase)
    {
        if word.chars().count() >= 4 && !STOPWORDS.contains(&word.as_str()) && !out.contains(&word)
        {
            out.push(word);
        }
    }
    out
}

const STOPWORDS: [&str; 12] = [
    "with", "that", "this", "will", "have", "from", "your", "their", "about", "team", "work",
    "experience",
];
