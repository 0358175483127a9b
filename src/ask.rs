use anyhow::Result;

use note_vault_core::models::UserId;
use note_vault_core::rag::{AnswerSynthesizer, SynthesisParams};

use crate::chat::create_chat_backend;
use crate::config::Config;
use crate::search::open_engine;

pub async fn build_synthesizer(config: &Config) -> Result<AnswerSynthesizer> {
    let engine = open_engine(config).await?;
    let chat = create_chat_backend(&config.chat)?;
    let params = SynthesisParams {
        top_k: config.retrieval.top_k,
        max_tokens: config.chat.max_tokens,
        temperature: config.chat.temperature,
    };
    Ok(AnswerSynthesizer::new(engine, chat, params))
}

pub async fn run_ask(config: &Config, question: &str, owner: UserId, json: bool) -> Result<()> {
    let synthesizer = build_synthesizer(config).await?;
    let answer = synthesizer.answer(question, owner).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&answer)?);
        return Ok(());
    }

    println!("{}", answer.answer.trim());
    if !answer.citations.is_empty() {
        println!();
        println!("Sources:");
        for (i, citation) in answer.citations.iter().enumerate() {
            println!(
                "  [{}] {} (id: {}, similarity: {:.2})",
                i + 1,
                citation.title,
                citation.note_id,
                citation.similarity
            );
        }
    }
    Ok(())
}
