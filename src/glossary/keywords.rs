// src/glossary/keywords.rs
//! Finance keyword lists and the vocabulary extraction rule.

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::BTreeSet;

/// Seed vocabulary merged into every derived keyword corpus.
pub const BASE_FINANCIAL_KEYWORDS: &[&str] = &[
    "금융", "경제", "투자", "주식", "시장", "은행", "대출", "이자", "환율", "통화",
    "정책", "중앙은행", "금리", "배당", "수익", "자산", "부채", "자본", "매출", "이익",
    "손실", "경기", "인플레이션", "디플레이션", "GDP", "CPI", "PER", "PBR", "코스피",
    "코스닥", "주가", "상승", "하락", "변동", "조정", "인상", "인하", "증가", "감소",
    "안정", "불안정", "유동성", "채권", "예금", "보험", "연금", "펀드", "금융자산",
    "원화", "달러",
];

/// Terms that denote finance on their own, whatever surrounds them.
pub const SELF_SUFFICIENT_KEYWORDS: &[&str] = &[
    "GDP", "CPI", "PER", "PBR", "ROE", "금리", "기준금리", "인플레이션", "디플레이션",
    "코스피", "코스닥", "환율", "양적완화",
];

/// Brand or company context that neutralizes an otherwise financial-looking match.
pub const BRAND_BLOCKER_KEYWORDS: &[&str] = &[
    "브랜드", "회사명", "기업명", "제품명", "상표", "삼성", "현대", "LG", "기아", "SK",
    "롯데", "신세계", "출시", "신제품",
];

/// Market vocabulary strong enough to outweigh a brand blocker.
pub const STRONG_MARKET_KEYWORDS: &[&str] = &[
    "코스피", "코스닥", "주가", "마감", "거래", "거래량", "시가", "종가", "시장", "투자",
    "금융", "경제", "상승", "하락", "매매", "체결", "증시",
];

/// Common words that never count as context keywords.
const STOPWORDS: &[&str] = &[
    "그것", "이것", "저것", "그런", "이런", "저런", "그때", "이때", "우리", "여러분",
    "것이", "것을", "것도", "것만", "때문", "경우", "정도", "하는", "있는", "없는",
    "된다", "한다", "있다", "없다", "회사", "기업", "브랜드",
];

/// Short nouns admitted despite being under three syllables.
const FINANCE_NOUNS: &[&str] = &[
    "마감", "거래", "주가", "시장", "투자", "금융", "경제", "은행", "대출", "이자",
    "환율", "통화", "정책", "금리", "배당", "수익", "자산", "부채", "자본", "매출",
    "이익", "손실", "경기", "상승", "하락", "변동", "조정", "인상", "인하", "증가",
    "감소", "안정", "채권", "예금", "보험", "연금", "펀드", "원화", "달러", "증시",
    "물가", "주식", "기업", "차트", "분석",
];

/// Chunks ending like a predicate carry no topical signal.
const PREDICATE_ENDINGS: &[&str] = &[
    "니", "니다", "어요", "아요", "해요", "세요", "는데",
    "지만", "하고", "하면", "해서", "되어", "려면",
];

static HANGUL_CHUNK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[가-힣]{2,4}").expect("hangul chunk regex"));
static ASCII_WORD: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[A-Za-z0-9]+").expect("ascii word regex"));

/// Extract candidate context keywords from free text.
///
/// Hangul text is chunked greedily into pieces of 2–4 syllables; a chunk qualifies
/// when it is not a stopword and is either a listed finance noun or at least three
/// syllables long. Upper-case acronyms of 2–5 letters always qualify, even with a
/// particle attached ("GDP가"). Output is lowercased.
pub fn extract_keywords(text: &str) -> BTreeSet<String> {
    let mut out = BTreeSet::new();
    if text.trim().is_empty() {
        return out;
    }

    for m in HANGUL_CHUNK.find_iter(text) {
        let word = m.as_str();
        if STOPWORDS.contains(&word) || PREDICATE_ENDINGS.iter().any(|e| word.ends_with(e)) {
            continue;
        }
        let syllables = word.chars().count();
        if FINANCE_NOUNS.contains(&word) || syllables >= 3 {
            out.insert(word.to_string());
        }
    }

    for m in ASCII_WORD.find_iter(text) {
        let word = m.as_str();
        if (2..=5).contains(&word.len()) && word.chars().all(|c| c.is_ascii_uppercase()) {
            out.insert(word.to_lowercase());
        }
    }
    out
}

/// Case-folded keyword membership test against an already-lowercased haystack.
///
/// ASCII keywords must sit on ASCII word boundaries ("per" is not found in "super");
/// Hangul keywords match as substrings so attached particles ("금리가") still count.
pub fn contains_keyword(haystack_lower: &str, keyword_lower: &str) -> bool {
    if keyword_lower.is_empty() {
        return false;
    }
    let ascii_word = keyword_lower.chars().all(|c| c.is_ascii_alphanumeric());
    if !ascii_word {
        return haystack_lower.contains(keyword_lower);
    }
    haystack_lower
        .match_indices(keyword_lower)
        .any(|(start, m)| {
            let before = haystack_lower[..start].chars().next_back();
            let after = haystack_lower[start + m.len()..].chars().next();
            !before.is_some_and(|c| c.is_ascii_alphanumeric())
                && !after.is_some_and(|c| c.is_ascii_alphanumeric())
        })
}
