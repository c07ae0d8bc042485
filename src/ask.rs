//! One-shot questions (`vchat ask`) and the interactive `vchat chat` loop.
//!
//! Each question ranks the vault, assembles the context, and sends it with
//! the query through a [`ChatSession`]. The session keeps only completed
//! question/answer pairs between turns.

use anyhow::Result;
use std::io::Write;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::warn;

use vault_chat_core::llm::LlmService;
use vault_chat_core::session::ChatSession;

use crate::config::Config;
use crate::engine::{ContextRequest, Engine};
use crate::llm::service_from_config;

/// Per-question options.
#[derive(Debug, Clone, Default)]
pub struct AskOptions {
    pub context: ContextRequest,
    /// Selected prompt, sent as a `prompt: ...` marker.
    pub prompt: Option<String>,
    pub stream: bool,
}

/// Answer `query` against the vault.
///
/// `on_delta` receives the response text as it arrives: once with the full
/// text, or once per delta when streaming.
pub async fn answer(
    engine: &Engine,
    session: &mut ChatSession,
    llm: &dyn LlmService,
    query: &str,
    options: &AskOptions,
    mut on_delta: impl FnMut(&str),
) -> Result<String> {
    let context = engine.context(query, &options.context).await?;
    let prompt = options.prompt.as_deref();

    if !options.stream {
        let response = session.ask(llm, query, &context, prompt).await?;
        on_delta(&response);
        return Ok(response);
    }

    let mut stream = session.ask_stream(llm, query, &context, prompt).await?;
    while let Some(delta) = stream.next_delta().await {
        on_delta(&delta?);
    }
    Ok(stream.response().to_string())
}

fn print_delta(delta: &str) {
    print!("{}", delta);
    let _ = std::io::stdout().flush();
}

pub async fn run_ask(config: &Config, query: &str, options: &AskOptions) -> Result<()> {
    let engine = Engine::open(config).await?;
    let llm = service_from_config(&config.llm)?;
    let mut session = ChatSession::new(&config.llm.model);

    answer(&engine, &mut session, llm.as_ref(), query, options, print_delta).await?;
    println!();
    Ok(())
}

/// Interactive loop. `/clear` forgets the conversation, `/quit` exits.
pub async fn run_chat(config: &Config, stream: bool) -> Result<()> {
    let engine = Engine::open(config).await?;
    let llm = service_from_config(&config.llm)?;
    let mut session = ChatSession::new(&config.llm.model);
    let options = AskOptions {
        stream,
        ..AskOptions::default()
    };

    println!(
        "Chatting with {} documents using {} (/clear to reset, /quit to exit)",
        engine.cache().index().await.len(),
        session.model()
    );

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("> ");
        let _ = std::io::stdout().flush();

        let Some(line) = lines.next_line().await? else {
            break;
        };
        let query = line.trim();
        match query {
            "" => continue,
            "/quit" | "/exit" => break,
            "/clear" => {
                session.clear();
                println!("History cleared.");
                continue;
            }
            _ => {}
        }

        match answer(&engine, &mut session, llm.as_ref(), query, &options, print_delta).await {
            Ok(_) => println!("\n"),
            Err(e) => {
                warn!(error = %e, "request failed");
                println!("\nError: {:#}\n", e);
            }
        }
    }
    Ok(())
}
