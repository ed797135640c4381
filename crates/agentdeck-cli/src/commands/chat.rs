//! Chat and transcript commands.

use std::io::Write;

use agentdeck_client::{ChatRole, DeckConfig, StreamAccumulator, StreamRecord};
use tokio::io::{AsyncBufReadExt, BufReader};

use super::DeckSession;
use crate::session::ChatOutcome;

/// Chat with an agent: one message, or an interactive loop.
pub(crate) async fn run(
    config: &DeckConfig,
    agent: Option<&str>,
    message: Option<&str>,
    no_history: bool,
) -> miette::Result<()> {
    let mut session = super::connect(config).await?;
    if no_history {
        session.set_keep_history(false);
    }

    let selected = match agent {
        Some(name) => session
            .select_agent(name)
            .map_err(|e| miette::miette!("{}", e))?
            .clone(),
        None => session
            .restore_last_agent()
            .cloned()
            .ok_or_else(|| miette::miette!("No agent given and none used before"))?,
    };

    if let Some(message) = message {
        send(&mut session, &selected.display_name, message).await?;
        return session
            .close_agent()
            .map_err(|e| miette::miette!("Failed to save transcript: {}", e));
    }

    println!(
        "Chatting with {} [{}]. /clear empties the transcript, /exit quits.",
        selected.display_name, selected.base_model
    );
    if !session.history().is_empty() {
        println!("({} earlier messages)", session.history().len());
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("> ");
        std::io::stdout().flush().ok();

        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(e) => return Err(miette::miette!("Failed to read input: {}", e)),
        };

        match line.trim() {
            "" => continue,
            "/exit" | "/quit" => break,
            "/clear" => {
                session
                    .clear_history()
                    .map_err(|e| miette::miette!("Failed to clear transcript: {}", e))?;
                println!("Transcript cleared.");
            }
            text => send(&mut session, &selected.display_name, text).await?,
        }
    }

    session
        .close_agent()
        .map_err(|e| miette::miette!("Failed to save transcript: {}", e))
}

async fn send(session: &mut DeckSession, speaker: &str, message: &str) -> miette::Result<()> {
    print!("{}: ", speaker);
    std::io::stdout().flush().ok();

    let mut print_fragment = |record: &StreamRecord, _: &StreamAccumulator| {
        if let Some(text) = record.content() {
            print!("{}", text);
            std::io::stdout().flush().ok();
        }
    };

    let outcome = session
        .send(message, &mut print_fragment)
        .await
        .map_err(|e| miette::miette!("{}", e))?;

    match outcome {
        ChatOutcome::Completed(_) => println!(),
        ChatOutcome::Interrupted { partial, error } => {
            if !partial.is_empty() {
                println!();
            }
            println!("Error: {}", error);
        }
    }

    Ok(())
}

/// Print or clear the stored transcript of an agent. Works without the server.
pub(crate) fn history(config: &DeckConfig, name: &str, clear: bool) -> miette::Result<()> {
    let mut session = super::open(config);

    if clear {
        session
            .clear_stored_history(name)
            .map_err(|e| miette::miette!("Failed to clear transcript: {}", e))?;
        println!("Cleared transcript of '{}'.", name);
        return Ok(());
    }

    let history = session.stored_history(name);
    if history.is_empty() {
        println!("No transcript for '{}'.", name);
        return Ok(());
    }

    for message in history {
        let speaker = match message.role {
            ChatRole::User => "you",
            ChatRole::Assistant => name,
            ChatRole::System => "system",
        };
        println!("{}: {}", speaker, message.content);
        println!();
    }

    Ok(())
}
