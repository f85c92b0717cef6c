// src/disambiguate.rs
//! Context-window disambiguation and term highlighting.
//!
//! A textual match of a glossary term is only a financial usage when its
//! surroundings say so. The test is a keyword co-occurrence heuristic over a
//! character window around the match, with two overrides: self-sufficient terms
//! always pass when they stand on their own, and brand/company context blocks the
//! co-occurrence path unless strong market vocabulary is also present.

use regex::{Regex, RegexBuilder};
use serde::Serialize;
use std::collections::HashSet;
use std::fmt::Write as _;
use std::sync::Arc;
use tracing::info;

use crate::config::explainer::DisambiguationSection;
use crate::glossary::keywords::{
    contains_keyword, BRAND_BLOCKER_KEYWORDS, SELF_SUFFICIENT_KEYWORDS, STRONG_MARKET_KEYWORDS,
};
use crate::glossary::{GlossaryStore, Vocabulary};
use crate::logging::{anon_id, dev_logging_enabled};

/// Byte range of a candidate term occurrence. Offsets always sit on char boundaries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MatchSpan {
    pub start: usize,
    pub end: usize,
    pub surface_text: String,
}

impl MatchSpan {
    /// Validates the range against `text`; `None` if it is empty, out of bounds or splits a char.
    pub fn new(text: &str, start: usize, end: usize) -> Option<Self> {
        if start >= end {
            return None;
        }
        text.get(start..end).map(|s| Self {
            start,
            end,
            surface_text: s.to_string(),
        })
    }

    /// First occurrence of `needle` in `text`.
    pub fn find(text: &str, needle: &str) -> Option<Self> {
        let start = text.find(needle)?;
        Self::new(text, start, start + needle.len())
    }
}

/// The span plus up to `radius` characters on each side, clipped to the text.
#[derive(Debug, Clone, Copy)]
pub struct ContextWindow<'a> {
    text: &'a str,
    pub start: usize,
    pub end: usize,
    span_start: usize,
    span_end: usize,
}

impl<'a> ContextWindow<'a> {
    pub fn around(text: &'a str, span: &MatchSpan, radius: usize) -> Option<Self> {
        text.get(span.start..span.end)?;
        let start = text[..span.start]
            .char_indices()
            .rev()
            .take(radius)
            .last()
            .map(|(i, _)| i)
            .unwrap_or(span.start);
        let end = text[span.end..]
            .char_indices()
            .nth(radius)
            .map(|(i, _)| span.end + i)
            .unwrap_or(text.len());
        Some(Self {
            text,
            start,
            end,
            span_start: span.start,
            span_end: span.end,
        })
    }

    pub fn as_str(&self) -> &'a str {
        &self.text[self.start..self.end]
    }

    /// Lowercased window with the span itself blanked out.
    pub fn masked_lower(&self) -> String {
        let mut out = String::with_capacity(self.end - self.start);
        out.push_str(&self.text[self.start..self.span_start].to_lowercase());
        out.push(' ');
        out.push_str(&self.text[self.span_end..self.end].to_lowercase());
        out
    }
}

/// Keyword lists driving the two override rules. Stored lowercase.
#[derive(Debug, Clone)]
pub struct DisambiguationRules {
    pub window_radius: usize,
    pub self_sufficient: Vec<String>,
    pub brand_blockers: Vec<String>,
    pub strong_keywords: Vec<String>,
}

fn lower_all<S: AsRef<str>>(items: &[S]) -> Vec<String> {
    items
        .iter()
        .map(|s| s.as_ref().trim().to_lowercase())
        .filter(|s| !s.is_empty())
        .collect()
}

impl Default for DisambiguationRules {
    fn default() -> Self {
        Self {
            window_radius: crate::config::explainer::DEFAULT_WINDOW_RADIUS,
            self_sufficient: lower_all(SELF_SUFFICIENT_KEYWORDS),
            brand_blockers: lower_all(BRAND_BLOCKER_KEYWORDS),
            strong_keywords: lower_all(STRONG_MARKET_KEYWORDS),
        }
    }
}

impl From<&DisambiguationSection> for DisambiguationRules {
    fn from(cfg: &DisambiguationSection) -> Self {
        Self {
            window_radius: cfg.window_radius.max(1),
            self_sufficient: lower_all(&cfg.self_sufficient),
            brand_blockers: lower_all(&cfg.brand_blockers),
            strong_keywords: lower_all(&cfg.strong_keywords),
        }
    }
}

/// Why a span was (or was not) accepted; used for dev logging and tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    SelfSufficient,
    ContextKeyword,
    BrandBlocked,
    NoContext,
    InvalidSpan,
}

impl Verdict {
    pub fn is_financial(self) -> bool {
        matches!(self, Verdict::SelfSufficient | Verdict::ContextKeyword)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct HighlightDecision {
    pub span: MatchSpan,
    /// Canonical glossary term the surface text maps to.
    pub term: String,
    pub highlighted: bool,
}

pub struct Disambiguator {
    store: Arc<GlossaryStore>,
    vocabulary: Arc<Vocabulary>,
    rules: DisambiguationRules,
    scanner: Option<Regex>,
}

impl Disambiguator {
    pub fn new(store: Arc<GlossaryStore>, rules: DisambiguationRules) -> anyhow::Result<Self> {
        let scanner = build_scanner(&store)?;
        Ok(Self {
            vocabulary: store.vocabulary().clone(),
            store,
            rules,
            scanner,
        })
    }

    pub fn rules(&self) -> &DisambiguationRules {
        &self.rules
    }

    /// Uses the configured window radius.
    pub fn is_contextually_financial(&self, full_text: &str, span: &MatchSpan) -> bool {
        self.is_contextually_financial_within(full_text, span, self.rules.window_radius)
    }

    pub fn is_contextually_financial_within(
        &self,
        full_text: &str,
        span: &MatchSpan,
        radius: usize,
    ) -> bool {
        let verdict = self.judge(full_text, span, radius);
        dev_log_verdict(full_text, &span.surface_text, verdict);
        verdict.is_financial()
    }

    /// Pure decision procedure behind [`Self::is_contextually_financial`].
    pub fn judge(&self, full_text: &str, span: &MatchSpan, radius: usize) -> Verdict {
        let Some(surface) = full_text.get(span.start..span.end) else {
            return Verdict::InvalidSpan;
        };
        if span.start >= span.end || surface.trim().is_empty() {
            return Verdict::InvalidSpan;
        }
        let surface_lower = surface.to_lowercase();

        if self.rules.self_sufficient.contains(&surface_lower) && stands_alone(full_text, span) {
            return Verdict::SelfSufficient;
        }

        let Some(window) = ContextWindow::around(full_text, span, radius) else {
            return Verdict::InvalidSpan;
        };
        let context = window.masked_lower();

        let blocked = self
            .rules
            .brand_blockers
            .iter()
            .any(|b| *b != surface_lower && contains_keyword(&context, b));
        if blocked
            && !self
                .rules
                .strong_keywords
                .iter()
                .any(|k| *k != surface_lower && contains_keyword(&context, k))
        {
            return Verdict::BrandBlocked;
        }

        let hit = self
            .vocabulary
            .iter()
            .any(|kw| kw != surface_lower && contains_keyword(&context, kw));
        if hit {
            Verdict::ContextKeyword
        } else {
            Verdict::NoContext
        }
    }

    /// Scan `full_text` for every glossary term and synonym (longest match first,
    /// non-overlapping) and decide each occurrence.
    pub fn highlight(&self, full_text: &str) -> Vec<HighlightDecision> {
        let Some(scanner) = &self.scanner else {
            return Vec::new();
        };

        let mut out = Vec::new();
        for m in scanner.find_iter(full_text) {
            if embedded_in_ascii_word(full_text, m.start(), m.end()) {
                continue;
            }
            let Some(entry) = self.store.lookup(m.as_str()) else {
                continue;
            };
            let Some(span) = MatchSpan::new(full_text, m.start(), m.end()) else {
                continue;
            };
            let highlighted = self.is_contextually_financial(full_text, &span);
            out.push(HighlightDecision {
                span,
                term: entry.term.clone(),
                highlighted,
            });
        }
        out
    }
}

/// Escape `text` and wrap the first highlighted occurrence of each term in a `<mark>`.
pub fn render_marked_html(text: &str, decisions: &[HighlightDecision]) -> String {
    let mut out = String::with_capacity(text.len() + 64 * decisions.len());
    let mut cursor = 0usize;
    let mut marked: HashSet<&str> = HashSet::new();

    for d in decisions {
        if !d.highlighted || d.span.start < cursor || marked.contains(d.term.as_str()) {
            continue;
        }
        let (Some(before), Some(surface)) = (
            text.get(cursor..d.span.start),
            text.get(d.span.start..d.span.end),
        ) else {
            continue;
        };
        marked.insert(d.term.as_str());
        out.push_str(&html_escape::encode_text(before));
        let _ = write!(
            out,
            r#"<mark class="financial-term" data-term="{}">{}</mark>"#,
            html_escape::encode_double_quoted_attribute(&d.term),
            html_escape::encode_text(surface)
        );
        cursor = d.span.end;
    }
    out.push_str(&html_escape::encode_text(&text[cursor..]));
    out
}

/// The span is not glued to a preceding word ("김금리"), and an ASCII span is not
/// part of a longer ASCII word.
fn stands_alone(text: &str, span: &MatchSpan) -> bool {
    let before = text[..span.start].chars().next_back();
    if before.is_some_and(char::is_alphanumeric) {
        return false;
    }
    !embedded_in_ascii_word(text, span.start, span.end)
}

fn embedded_in_ascii_word(text: &str, start: usize, end: usize) -> bool {
    let surface = &text[start..end];
    if !surface.chars().all(|c| c.is_ascii_alphanumeric()) {
        return false;
    }
    let before = text[..start].chars().next_back();
    let after = text[end..].chars().next();
    before.is_some_and(|c| c.is_ascii_alphanumeric())
        || after.is_some_and(|c| c.is_ascii_alphanumeric())
}

fn build_scanner(store: &GlossaryStore) -> anyhow::Result<Option<Regex>> {
    let mut surfaces: Vec<&str> = Vec::new();
    let mut seen: HashSet<String> = HashSet::new();
    for (surface, _) in store.surface_forms() {
        let s = surface.trim();
        if !s.is_empty() && seen.insert(s.to_lowercase()) {
            surfaces.push(s);
        }
    }
    if surfaces.is_empty() {
        return Ok(None);
    }
    // Longest first so "기준금리" wins over "금리" at the same position.
    surfaces.sort_by(|a, b| {
        b.chars()
            .count()
            .cmp(&a.chars().count())
            .then_with(|| a.cmp(b))
    });
    let pattern = surfaces
        .iter()
        .map(|s| regex::escape(s))
        .collect::<Vec<_>>()
        .join("|");
    let re = RegexBuilder::new(&format!("(?:{pattern})"))
        .case_insensitive(true)
        .size_limit(64 * (1 << 20))
        .build()
        .map_err(|e| anyhow::anyhow!("term scanner regex error: {}", e))?;
    Ok(Some(re))
}

fn dev_log_verdict(text: &str, surface: &str, verdict: Verdict) {
    if !dev_logging_enabled() {
        return;
    }
    let id = anon_id(text);
    // Never log raw text. Only hashed id + the matched term.
    info!(target: "disambiguate", %id, term = surface, verdict = ?verdict);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::glossary::{GlossaryOptions, GlossaryStore};

    const CSV: &str = "\
term,category,definition,synonyms
금리,금리,돈을 빌린 대가로 내는 이자의 비율입니다.,
기준금리,통화정책,중앙은행이 정하는 대표 금리입니다.,
배당,주식,회사가 이익을 주주에게 나눠 주는 것입니다.,배당금
갤럭시,기타,스마트폰 제품군 이름입니다.,
";

    fn disambiguator() -> Disambiguator {
        let store = GlossaryStore::from_reader(
            CSV.as_bytes(),
            GlossaryOptions {
                include_builtin: false,
            },
        )
        .expect("load");
        Disambiguator::new(Arc::new(store), DisambiguationRules::default()).expect("build")
    }

    #[test]
    fn window_is_clipped_and_counted_in_chars() {
        let text = "가나다라마금리바사아자차";
        let span = MatchSpan::find(text, "금리").expect("span");
        let w = ContextWindow::around(text, &span, 2).expect("window");
        assert_eq!(w.as_str(), "라마금리바사");
        let wide = ContextWindow::around(text, &span, 1000).expect("window");
        assert_eq!(wide.as_str(), text);
    }

    #[test]
    fn invalid_spans_never_panic() {
        let d = disambiguator();
        let text = "금리";
        let bogus = MatchSpan {
            start: 1,
            end: 4,
            surface_text: "x".into(),
        };
        assert_eq!(d.judge(text, &bogus, 10), Verdict::InvalidSpan);
        assert!(MatchSpan::new(text, 0, 100).is_none());
        assert!(MatchSpan::new(text, 0, 1).is_none());
    }

    #[test]
    fn self_sufficient_needs_a_free_standing_span() {
        let d = disambiguator();
        let ok = "금리가 올랐대";
        let span = MatchSpan::find(ok, "금리").expect("span");
        assert_eq!(d.judge(ok, &span, 100), Verdict::SelfSufficient);

        let name = "김금리 씨가 왔다";
        let span = MatchSpan::find(name, "금리").expect("span");
        assert_eq!(d.judge(name, &span, 100), Verdict::NoContext);
    }

    #[test]
    fn context_keyword_outside_the_window_does_not_count() {
        let d = disambiguator();
        let filler = "가".repeat(30);
        let text = format!("배당 {filler} 주식");
        let span = MatchSpan::find(&text, "배당").expect("span");
        assert_eq!(d.judge(&text, &span, 5), Verdict::NoContext);
        assert_eq!(d.judge(&text, &span, 100), Verdict::ContextKeyword);
    }

    #[test]
    fn brand_context_blocks_unless_market_words_present() {
        let d = disambiguator();
        let brand = "삼성 갤럭시 신제품 출시 행사";
        let span = MatchSpan::find(brand, "갤럭시").expect("span");
        assert_eq!(d.judge(brand, &span, 100), Verdict::BrandBlocked);

        let market = "삼성 갤럭시 효과로 주가 상승";
        let span = MatchSpan::find(market, "갤럭시").expect("span");
        assert_eq!(d.judge(market, &span, 100), Verdict::ContextKeyword);
    }

    #[test]
    fn highlight_prefers_longest_match_and_maps_synonyms() {
        let d = disambiguator();
        let text = "기준금리 인하 뒤 배당금 기대가 커졌다";
        let out = d.highlight(text);
        let terms: Vec<&str> = out.iter().map(|h| h.term.as_str()).collect();
        assert_eq!(terms, vec!["기준금리", "배당"]);
        assert_eq!(out[1].span.surface_text, "배당금");
        assert!(out.iter().all(|h| h.highlighted));
    }

    #[test]
    fn rendered_html_marks_first_occurrence_only_and_escapes() {
        let d = disambiguator();
        let text = "<b>금리</b> 상승, 다시 금리 얘기";
        let decisions = d.highlight(text);
        assert_eq!(decisions.len(), 2);
        let html = render_marked_html(text, &decisions);
        assert_eq!(html.matches("<mark").count(), 1);
        assert!(html.starts_with("&lt;b&gt;<mark class=\"financial-term\" data-term=\"금리\">금리</mark>"));
        assert!(html.ends_with("다시 금리 얘기"));
    }
}
