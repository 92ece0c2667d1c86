
use anyhow::Result;
use console::style;
use dialoguer::Input;
use tracing::debug;

use crate::query::RagEngine;

/// Source snippets shown per answer before truncating the list
const SOURCES_SHOWN: usize = 2;

/// One completed question/answer exchange, including failed ones
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversationTurn {
    pub question: String,
    pub answer: String,
    pub sources: Vec<String>,
}

/// Append-only conversation history for one chat session.
///
/// Held only in memory; clearing discards every turn.
#[derive(Debug, Default)]
pub struct History {
    turns: Vec<ConversationTurn>,
}

impl History {
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn record(&mut self, turn: ConversationTurn) {
        self.turns.push(turn);
    }

    #[inline]
    pub fn clear(&mut self) {
        self.turns.clear();
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.turns.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    /// Turns in display order, most recent first
    #[inline]
    pub fn recent_first(&self) -> impl Iterator<Item = &ConversationTurn> {
        self.turns.iter().rev()
    }
}

/// Interactive chat session. One question is processed to completion
/// before the next can be submitted.
#[inline]
pub async fn run_chat(engine: &RagEngine) -> Result<()> {
    let mut history = History::new();

    eprintln!("{}", style("Complaint RAG Chatbot").bold().cyan());
    eprintln!("Ask a question about customer complaints. The answer is grounded in real complaint data.");
    eprintln!(
        "{}",
        style("Commands: :clear discards history, :quit exits").dim()
    );
    eprintln!();

    loop {
        let line: String = Input::new()
            .with_prompt("You")
            .allow_empty(true)
            .interact_text()?;
        let question = line.trim();

        match question {
            // Blank input is ignored
            "" => {}
            ":quit" | ":exit" => break,
            ":clear" => {
                history.clear();
                eprintln!("{}", style("History cleared.").yellow());
                eprintln!();
            }
            _ => {
                eprintln!("{}", style("Retrieving answer...").dim());
                let answer = engine.answer(question, None).await;
                debug!("Recorded turn {}", history.len() + 1);

                // Failed turns are recorded too, so the user can see what
                // was asked
                history.record(ConversationTurn {
                    question: question.to_string(),
                    answer: answer.text,
                    sources: answer.sources,
                });

                eprintln!();
                render_history(&history);
            }
        }
    }

    Ok(())
}

fn render_history(history: &History) {
    for turn in history.recent_first() {
        eprintln!("{} {}", style("You:").bold(), turn.question);
        eprintln!("{} {}", style("AI:").bold().green(), turn.answer);

        if !turn.sources.is_empty() {
            eprintln!("{}", style("Sources:").dim());
            for (i, source) in turn.sources.iter().take(SOURCES_SHOWN).enumerate() {
                eprintln!("  {} {}", style(format!("[{}]", i + 1)).dim(), source);
            }
        }
        eprintln!();
    }
}
