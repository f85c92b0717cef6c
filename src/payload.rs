// src/payload.rs
//! Request and result types shared by the cache, generator and HTTP layer.

use serde::Serialize;
use std::sync::Arc;

use crate::fingerprint::Fingerprint;
use crate::glossary::GlossaryEntry;

/// Structured explanation, or a free-text reply when no term was resolved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ExplanationPayload {
    Structured {
        definition: String,
        impact: String,
        analogy: String,
    },
    Conversational {
        reply: String,
    },
}

impl ExplanationPayload {
    pub fn is_structured(&self) -> bool {
        matches!(self, ExplanationPayload::Structured { .. })
    }

    /// True when every field carries text.
    pub fn is_complete(&self) -> bool {
        match self {
            ExplanationPayload::Structured {
                definition,
                impact,
                analogy,
            } => [definition, impact, analogy]
                .iter()
                .all(|s| !s.trim().is_empty()),
            ExplanationPayload::Conversational { reply } => !reply.trim().is_empty(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ExplanationRequest {
    /// Canonical entry; `None` means general conversation.
    pub entry: Option<Arc<GlossaryEntry>>,
    pub raw_user_input: String,
    pub context_snippet: Option<String>,
}

impl ExplanationRequest {
    pub fn new(
        entry: Option<Arc<GlossaryEntry>>,
        raw_user_input: impl Into<String>,
        context_snippet: Option<String>,
    ) -> Self {
        Self {
            entry,
            raw_user_input: raw_user_input.into(),
            context_snippet: context_snippet.filter(|c| !c.trim().is_empty()),
        }
    }

    pub fn term(&self) -> Option<&str> {
        self.entry.as_deref().map(|e| e.term.as_str())
    }

    pub fn fingerprint(&self) -> Fingerprint {
        Fingerprint::of(
            self.term(),
            self.context_snippet.is_some(),
            &self.raw_user_input,
        )
    }
}
