// src/generator/prompt.rs
//! Chat message builders for structured and conversational explanations.

use chrono::{FixedOffset, Utc};

use crate::completion::ChatMessage;
use crate::glossary::GlossaryEntry;

const KST_OFFSET_SECS: i32 = 9 * 3600;

/// Today's date in Asia/Seoul, `YYYY-MM-DD`.
pub fn today_kst() -> String {
    match FixedOffset::east_opt(KST_OFFSET_SECS) {
        Some(kst) => Utc::now().with_timezone(&kst).format("%Y-%m-%d").to_string(),
        None => Utc::now().format("%Y-%m-%d").to_string(),
    }
}

fn persona(today: &str) -> String {
    format!(
        "너는 경제 초보자를 돕는 친근한 금융 튜터야. 반말로 차분하고 간결하게 설명해.\n\
         추상적인 표현 대신 생활 속 예시를 들고, 왜 중요한지까지 연결해.\n\
         과장하거나 단정하지 말고, 모르면 모른다고 말해.\n\
         금리, 가격, 정책처럼 바뀔 수 있는 주제는 '(기준일: {today}, Asia/Seoul)'을 표기해.\n\
         투자 조언은 하지 말고 필요하면 전문가 상담을 권해."
    )
}

const STRUCTURED_GUIDE: &str = "## 출력 포맷\n\
- JSON 객체 하나만 반환하고 definition, impact, analogy 세 개 키를 포함해.\n\
- definition: 용어의 뜻과 작동 방식을 1~4문장으로 설명해.\n\
- impact: 대출, 저축, 소비처럼 생활에서 체감할 영향을 1~4문장으로 설명해.\n\
- analogy: 일상 비유를 1~4문장으로 들고 왜 적절한지 덧붙여.\n\
- 값은 모두 문자열이고 JSON 밖에 다른 텍스트를 붙이지 마.";

/// Messages for the single consolidated structured request.
pub fn structured_messages(
    entry: &GlossaryEntry,
    raw_user_input: &str,
    context_snippet: Option<&str>,
) -> Vec<ChatMessage> {
    let today = today_kst();
    let mut user = vec![
        format!("[관심 용어]: {}", entry.term),
        format!("[분류]: {}", entry.category),
        format!("[정의]: {}", entry.definition_metadata),
    ];
    if let Some(importance) = entry.importance.as_deref() {
        user.push(format!("[왜 중요?]: {importance}"));
    }
    if let Some(correction) = entry.correction.as_deref() {
        user.push(format!("[오해 교정]: {correction}"));
    }
    if let Some(analogy) = entry.analogy.as_deref() {
        user.push(format!("[참고 비유]: {analogy}"));
    }
    if let Some(ctx) = context_snippet {
        user.push(format!("[문맥]: {ctx}"));
    }
    user.push(format!("[질문]: {}", raw_user_input.trim()));
    user.push("[지시] 위 조건을 지킨 JSON 하나만 반환해줘.".to_string());

    vec![
        ChatMessage::system(persona(&today)),
        ChatMessage::system(STRUCTURED_GUIDE),
        ChatMessage::user(user.join("\n")),
    ]
}

/// Messages for a general conversational reply, with fixed few-shot turns.
pub fn conversational_messages(raw_user_input: &str) -> Vec<ChatMessage> {
    let today = today_kst();
    vec![
        ChatMessage::system(persona(&today)),
        ChatMessage::user("인플레이션이 뭐야?"),
        ChatMessage::assistant(
            "인플레이션은 물가가 전반적으로 서서히 오르는 거야. \
             같은 돈으로 살 수 있는 게 줄어들지. 더 궁금한 거 있으면 편하게 물어봐!",
        ),
        ChatMessage::user("금리가 오르면 주식이 왜 떨어져?"),
        ChatMessage::assistant(
            "은행 이자가 오르면 위험한 주식 대신 예금으로 돈이 옮겨가서 그래. \
             그래서 주가가 눌리는 경우가 많아.",
        ),
        ChatMessage::user(format!(
            "[질문]: {}\n[기준일_KST]: {today}",
            raw_user_input.trim()
        )),
    ]
}
