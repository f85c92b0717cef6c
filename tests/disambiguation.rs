// tests/disambiguation.rs
//
// Context-window disambiguation and highlighting over a small in-memory glossary.
//
// Covered:
// - self-sufficient terms standing alone always pass ("금리가 올랐대")
// - surname-like attachment is not the term ("김금리 씨가 왔다")
// - co-occurrence path, brand blockers, window bound
// - highlight() + render_marked_html()

use std::sync::Arc;

use finance_term_explainer::disambiguate::{
    render_marked_html, DisambiguationRules, Disambiguator, MatchSpan, Verdict,
};
use finance_term_explainer::glossary::{GlossaryOptions, GlossaryStore};

fn disambiguator() -> Disambiguator {
    let store = GlossaryStore::from_reader(
        "term,category,definition,synonyms\n\
         금리,금리,돈을 빌린 대가로 내는 이자의 비율,\n\
         기준금리,금리,중앙은행이 정하는 대표 금리,\n\
         배당,주식,회사가 이익을 주주에게 나눠 주는 것,배당금\n\
         PER,주식,주가를 주당순이익으로 나눈 값,\n"
            .as_bytes(),
        GlossaryOptions {
            include_builtin: false,
        },
    )
    .expect("load glossary");
    Disambiguator::new(Arc::new(store), DisambiguationRules::default()).expect("scanner")
}

#[test]
fn standalone_self_sufficient_term_is_financial() {
    let d = disambiguator();
    let text = "금리가 올랐대";
    let span = MatchSpan::find(text, "금리").expect("span");
    assert_eq!(d.judge(text, &span, 100), Verdict::SelfSufficient);
    assert!(d.is_contextually_financial(text, &span));

    let decisions = d.highlight(text);
    assert_eq!(decisions.len(), 1);
    assert_eq!(decisions[0].term, "금리");
    assert!(decisions[0].highlighted);
}

#[test]
fn name_containing_the_term_is_not_financial() {
    let d = disambiguator();
    let text = "김금리 씨가 왔다";
    let span = MatchSpan::find(text, "금리").expect("span");
    assert!(!d.is_contextually_financial(text, &span));

    let decisions = d.highlight(text);
    assert!(decisions.iter().all(|h| !h.highlighted));
    assert_eq!(render_marked_html(text, &decisions), text);
}

#[test]
fn co_occurring_keyword_makes_a_plain_term_financial() {
    let d = disambiguator();
    let text = "배당 소식에 주가가 뛰었다";
    let span = MatchSpan::find(text, "배당").expect("span");
    assert_eq!(d.judge(text, &span, 100), Verdict::ContextKeyword);

    let bare = "배당 노래를 들었어";
    let span = MatchSpan::find(bare, "배당").expect("span");
    assert_eq!(d.judge(bare, &span, 100), Verdict::NoContext);
}

#[test]
fn brand_context_blocks_unless_market_words_present() {
    let d = disambiguator();
    let text = "삼성 배당 이벤트 신제품 출시";
    let span = MatchSpan::find(text, "배당").expect("span");
    assert_eq!(d.judge(text, &span, 100), Verdict::BrandBlocked);

    let market = "삼성 배당 발표 후 코스피 상승";
    let span = MatchSpan::find(market, "배당").expect("span");
    assert_eq!(d.judge(market, &span, 100), Verdict::ContextKeyword);

    // blockers never override a self-sufficient term
    let ss = "삼성 신제품 출시, 금리 얘기는 없음";
    let span = MatchSpan::find(ss, "금리").expect("span");
    assert_eq!(d.judge(ss, &span, 100), Verdict::SelfSufficient);
}

#[test]
fn window_is_bounded_by_radius() {
    let d = disambiguator();
    let filler = "ㅋ".repeat(150);
    let text = format!("배당 {filler} 주가");
    let span = MatchSpan::find(&text, "배당").expect("span");
    assert!(!d.is_contextually_financial_within(&text, &span, 100));
    assert!(d.is_contextually_financial_within(&text, &span, 200));
}

#[test]
fn clipping_and_bad_spans_never_panic() {
    let d = disambiguator();
    let text = "배당";
    let span = MatchSpan::find(text, "배당").expect("span");
    assert_eq!(d.judge(text, &span, 10_000), Verdict::NoContext);

    let bogus = MatchSpan {
        start: 1,
        end: 4,
        surface_text: "x".into(),
    };
    assert_eq!(d.judge(text, &bogus, 100), Verdict::InvalidSpan);
    assert!(MatchSpan::new(text, 1, 3).is_none(), "splits a char");
}

#[test]
fn longest_match_and_synonyms_map_to_canonical_terms() {
    let d = disambiguator();
    let text = "기준금리 동결로 배당금 기대가 커지고 주가도 올랐다";
    let decisions = d.highlight(text);
    let terms: Vec<&str> = decisions.iter().map(|h| h.term.as_str()).collect();
    assert_eq!(terms, vec!["기준금리", "배당"]);
    assert!(decisions.iter().all(|h| h.highlighted));
    assert_eq!(decisions[1].span.surface_text, "배당금");
}

#[test]
fn ascii_terms_inside_words_are_ignored() {
    let d = disambiguator();
    let decisions = d.highlight("super PER이 높다 PERIOD");
    assert_eq!(decisions.len(), 1);
    assert_eq!(decisions[0].span.surface_text, "PER");
    assert!(decisions[0].highlighted);
}

#[test]
fn rendering_escapes_and_marks_first_occurrence_only() {
    let d = disambiguator();
    let text = "<b>금리</b> 인상, 다시 금리 얘기";
    let html = render_marked_html(text, &d.highlight(text));
    assert_eq!(
        html,
        "&lt;b&gt;<mark class=\"financial-term\" data-term=\"금리\">금리</mark>&lt;/b&gt; 인상, 다시 금리 얘기"
    );
}
