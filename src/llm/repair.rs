use std::sync::LazyLock;

use regex::Regex;
use serde_json::{Map, Value};

use crate::error::ParseFailure;
use crate::llm::relaxed::from_relaxed_str;

static PYTHON_LITERAL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(True|False|None)\b").expect("valid literal regex"));

static TRAILING_COMMA: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r",\s*([}\]])").expect("valid trailing comma regex"));

const MAX_REPORTED_ERRORS: usize = 3;

#[derive(Debug, Clone, Copy)]
enum Parser {
    Relaxed,
    Strict,
}

impl Parser {
    fn name(self) -> &'static str {
        match self {
            Parser::Relaxed => "relaxed",
            Parser::Strict => "strict",
        }
    }

    fn parse(self, text: &str) -> Result<Map<String, Value>, String> {
        let value = match self {
            Parser::Relaxed => from_relaxed_str(text).map_err(|e| e.to_string())?,
            Parser::Strict => serde_json::from_str(text).map_err(|e| e.to_string())?,
        };

        match value {
            Value::Object(map) => Ok(map),
            other => Err(format!("top-level value is not an object: {}", kind(&other))),
        }
    }
}

/// Parse model output into a JSON object, repairing common defects.
///
/// Candidates are the raw text, its normalized form, the first balanced
/// `{...}` span and that span normalized. All candidates are tried relaxed,
/// then strict, then again with trailing commas stripped.
pub fn parse_model_output(text: &str) -> Result<Map<String, Value>, ParseFailure> {
    let candidates = build_candidates(text);
    let mut errors = Vec::new();

    for parser in [Parser::Relaxed, Parser::Strict] {
        for candidate in &candidates {
            match parser.parse(candidate) {
                Ok(map) => return Ok(map),
                Err(e) => errors.push(format!("{}: {}", parser.name(), e)),
            }
        }
    }

    for candidate in &candidates {
        let fixed = TRAILING_COMMA.replace_all(candidate, "$1");
        for parser in [Parser::Strict, Parser::Relaxed] {
            match parser.parse(&fixed) {
                Ok(map) => return Ok(map),
                Err(e) => errors.push(format!("{}_trailing: {}", parser.name(), e)),
            }
        }
    }

    errors.truncate(MAX_REPORTED_ERRORS);
    Err(ParseFailure { errors })
}

/// Replace smart quotes and Python-style literals with their JSON forms
pub fn normalize_text(text: &str) -> String {
    let straightened: String = text
        .chars()
        .map(|c| match c {
            '\u{201C}' | '\u{201D}' => '"',
            '\u{2018}' | '\u{2019}' => '\'',
            c => c,
        })
        .collect();

    PYTHON_LITERAL
        .replace_all(&straightened, |caps: &regex::Captures<'_>| match &caps[1] {
            "True" => "true",
            "False" => "false",
            _ => "null",
        })
        .into_owned()
}

/// First `{...}` span whose braces balance, counting from the first `{`.
///
/// Braces inside string literals are counted like any other brace.
pub fn extract_first_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let mut depth = 0usize;
    for (offset, c) in text[start..].char_indices() {
        match c {
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..start + offset + 1]);
                }
            }
            _ => {}
        }
    }
    None
}

fn build_candidates(text: &str) -> Vec<String> {
    let mut candidates = vec![text.to_string()];
    push_unique(&mut candidates, normalize_text(text));
    if let Some(extracted) = extract_first_object(text) {
        push_unique(&mut candidates, extracted.to_string());
        push_unique(&mut candidates, normalize_text(extracted));
    }
    candidates
}

fn push_unique(candidates: &mut Vec<String>, candidate: String) {
    if !candidates.contains(&candidate) {
        candidates.push(candidate);
    }
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
