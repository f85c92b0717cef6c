//! Demo that runs a few queries through the explainer (offline unless an API key is configured).

use finance_term_explainer::{logging, ExplainerConfig, Explainer, ExplanationPayload};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();
    logging::init_tracing();

    let cfg = ExplainerConfig::load()?;
    let explainer = Explainer::from_config(cfg).await?;

    let queries = ["금리가 올랐대", "금리 인상", "배당 수익", "오늘 점심 뭐 먹지"];
    for q in queries {
        let out = explainer.explain(q, None).await;
        println!(
            "[{}] {} -> {} ({})",
            out.cache.as_header(),
            q,
            out.resolution.entry().map(|e| e.term.as_str()).unwrap_or("-"),
            out.resolution.kind()
        );
        match out.payload {
            ExplanationPayload::Structured {
                definition,
                impact,
                analogy,
            } => {
                println!("  정의: {definition}");
                println!("  영향: {impact}");
                println!("  비유: {analogy}");
            }
            ExplanationPayload::Conversational { reply } => println!("  {reply}"),
        }
    }

    let text = "한국은행이 기준금리를 동결하자 코스피가 반등했다. 김금리 씨는 웃었다.";
    println!("{}", explainer.render_highlight(text));

    println!("explain-demo done");
    Ok(())
}
