// src/generator/parse.rs
//! Lenient parsing of structured model output.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{Map, Value};

static JSON_BLOCK: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)\{.*\}").expect("json block regex"));
static SENTENCE_END: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[.!?。！？](\s+|$)").expect("sentence regex"));

const MAX_SENTENCES: usize = 4;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ParseError {
    #[error("model output was empty")]
    Empty,
    #[error("no JSON object in model output")]
    NoJson,
    #[error("JSON object has none of definition/impact/analogy")]
    MissingFields,
}

/// The three sections as returned by the model; any may be empty.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StructuredFields {
    pub definition: String,
    pub impact: String,
    pub analogy: String,
}

fn key_aliases(field: &str) -> &'static [&'static str] {
    match field {
        "definition" => &["definition", "정의", "summary", "detail", "뜻"],
        "impact" => &["impact", "영향"],
        _ => &["analogy", "비유"],
    }
}

fn value_text(v: &Value) -> Option<String> {
    let text = match v {
        Value::String(s) => s.trim().to_string(),
        Value::Array(items) => items
            .iter()
            .filter_map(|i| i.as_str())
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join(" "),
        Value::Number(n) => n.to_string(),
        _ => return None,
    };
    (!text.is_empty()).then_some(text)
}

fn pick(obj: &Map<String, Value>, field: &str) -> String {
    key_aliases(field)
        .iter()
        .find_map(|k| obj.get(*k).and_then(value_text))
        .unwrap_or_default()
}

fn strip_fences(raw: &str) -> &str {
    let t = raw.trim();
    let Some(rest) = t.strip_prefix("```") else {
        return t;
    };
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    rest.trim_end().trim_end_matches("```").trim()
}

fn object_from(raw: &str) -> Option<Map<String, Value>> {
    if let Ok(Value::Object(m)) = serde_json::from_str::<Value>(raw) {
        return Some(m);
    }
    let inner = strip_fences(raw);
    if let Ok(Value::Object(m)) = serde_json::from_str::<Value>(inner) {
        return Some(m);
    }
    let block = JSON_BLOCK.find(inner)?;
    match serde_json::from_str::<Value>(block.as_str()) {
        Ok(Value::Object(m)) => Some(m),
        _ => None,
    }
}

/// Strict JSON first, then the first `{...}` block (code fences tolerated).
pub fn parse_structured(raw: &str) -> Result<StructuredFields, ParseError> {
    if raw.trim().is_empty() {
        return Err(ParseError::Empty);
    }
    let obj = object_from(raw).ok_or(ParseError::NoJson)?;
    let fields = StructuredFields {
        definition: limit_sentences(&pick(&obj, "definition"), MAX_SENTENCES),
        impact: limit_sentences(&pick(&obj, "impact"), MAX_SENTENCES),
        analogy: limit_sentences(&pick(&obj, "analogy"), MAX_SENTENCES),
    };
    if fields.definition.is_empty() && fields.impact.is_empty() && fields.analogy.is_empty() {
        return Err(ParseError::MissingFields);
    }
    Ok(fields)
}

/// Keep at most `max` sentences. Text without sentence punctuation is one sentence.
pub fn limit_sentences(text: &str, max: usize) -> String {
    let text = text.trim();
    let cut = SENTENCE_END
        .find_iter(text)
        .nth(max.saturating_sub(1))
        .map(|m| m.end());
    match cut {
        Some(end) if end < text.len() => text[..end].trim_end().to_string(),
        _ => text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strict_json() {
        let f = parse_structured(r#"{"definition":"뜻.","impact":"영향.","analogy":"비유."}"#)
            .expect("parse");
        assert_eq!(f.definition, "뜻.");
        assert_eq!(f.analogy, "비유.");
    }

    #[test]
    fn fenced_and_chatty_output() {
        let fenced = "```json\n{\"definition\":\"a\",\"impact\":\"b\",\"analogy\":\"c\"}\n```";
        assert_eq!(parse_structured(fenced).expect("fenced").impact, "b");

        let chatty = "물론이야! {\"정의\": \"돈의 가격\", \"영향\": [\"대출 이자 상승\", \"저축 유리\"]} 도움이 됐길.";
        let f = parse_structured(chatty).expect("chatty");
        assert_eq!(f.definition, "돈의 가격");
        assert_eq!(f.impact, "대출 이자 상승 저축 유리");
        assert!(f.analogy.is_empty());
    }

    #[test]
    fn rejects_garbage() {
        assert_eq!(parse_structured("   "), Err(ParseError::Empty));
        assert_eq!(parse_structured("그냥 텍스트"), Err(ParseError::NoJson));
        assert_eq!(parse_structured(r#"{"x":1}"#), Err(ParseError::MissingFields));
    }

    #[test]
    fn sentence_limit() {
        let s = "하나. 둘. 셋. 넷. 다섯. 여섯.";
        assert_eq!(limit_sentences(s, 4), "하나. 둘. 셋. 넷.");
        assert_eq!(limit_sentences("마침표 없음", 4), "마침표 없음");
        assert_eq!(limit_sentences("하나. 둘.", 4), "하나. 둘.");
    }
}
