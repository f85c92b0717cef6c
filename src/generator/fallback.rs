// src/generator/fallback.rs
//! Deterministic local payloads used when generation fails.

use super::parse::StructuredFields;
use crate::glossary::GlossaryEntry;
use crate::payload::ExplanationPayload;

pub const IMPACT_UNAVAILABLE: &str =
    "지금은 생활 속 영향에 대한 자세한 설명을 준비하지 못했어. 잠시 후 다시 물어봐 줘.";
pub const ANALOGY_UNAVAILABLE: &str =
    "지금은 알맞은 비유를 준비하지 못했어. 잠시 후 다시 물어봐 줘.";
pub const CONVERSATIONAL_FALLBACK: &str = "미안, 지금은 답변을 만들지 못했어. \
     잠시 후 다시 질문해 주거나, 궁금한 금융 용어를 직접 물어봐 줘.";

fn first_text<'a>(candidates: &[Option<&'a str>]) -> Option<&'a str> {
    candidates
        .iter()
        .flatten()
        .map(|s| s.trim())
        .find(|s| !s.is_empty())
}

/// Fill empty sections from the entry's own metadata, then boilerplate.
/// Metadata is used as written; the sentence cap applies to model output only.
pub fn backfill(entry: &GlossaryEntry, fields: StructuredFields) -> ExplanationPayload {
    let definition = if fields.definition.trim().is_empty() {
        first_text(&[Some(entry.definition_metadata.as_str())])
            .map_or_else(
                || format!("{}에 대한 정의를 찾지 못했어.", entry.term),
                str::to_string,
            )
    } else {
        fields.definition
    };
    let impact = if fields.impact.trim().is_empty() {
        first_text(&[entry.importance.as_deref()])
            .map_or_else(|| IMPACT_UNAVAILABLE.to_string(), str::to_string)
    } else {
        fields.impact
    };
    let analogy = if fields.analogy.trim().is_empty() {
        first_text(&[entry.analogy.as_deref()])
            .map_or_else(|| ANALOGY_UNAVAILABLE.to_string(), str::to_string)
    } else {
        fields.analogy
    };
    ExplanationPayload::Structured {
        definition,
        impact,
        analogy,
    }
}

/// Whole-payload fallback for a resolved term.
pub fn structured_fallback(entry: &GlossaryEntry) -> ExplanationPayload {
    backfill(entry, StructuredFields::default())
}

pub fn conversational_fallback() -> ExplanationPayload {
    ExplanationPayload::Conversational {
        reply: CONVERSATIONAL_FALLBACK.to_string(),
    }
}
