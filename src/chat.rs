//! Interactive chat over the knowledge base.
//!
//! The REPL reads questions from stdin and answers each independently; the
//! conversation so far is kept in a [`ChatSession`] owned by the loop and
//! shown with `/history`. Previous turns are not sent to the model.
//!
//! # Commands
//!
//! | Input | Effect |
//! |-------|--------|
//! | `/rebuild` | reload documents and rebuild the index |
//! | `/sources` | list indexed source files |
//! | `/history` | print the session so far |
//! | `/quit` | leave (EOF works too) |

use anyhow::Result;
use std::io::Write;
use std::time::Instant;
use tokio::io::{AsyncBufReadExt, BufReader};

use crate::ask;
use crate::config::Config;
use crate::embedding;
use crate::evaluate::Prediction;
use crate::llm::{ChatMessage, Role};
use crate::pipeline::AnsweringPipeline;
use crate::rebuild::{self, RebuildOutcome};

/// Append-only log of the turns in one chat.
#[derive(Debug, Clone, Default)]
pub struct ChatSession {
    turns: Vec<ChatMessage>,
}

impl ChatSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_user(&mut self, content: impl Into<String>) {
        self.turns.push(ChatMessage::user(content));
    }

    pub fn push_assistant(&mut self, content: impl Into<String>) {
        self.turns.push(ChatMessage::assistant(content));
    }

    pub fn turns(&self) -> &[ChatMessage] {
        &self.turns
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }
}

/// Render the session as plain text, one block per turn.
pub fn render_history(session: &ChatSession) -> String {
    if session.is_empty() {
        return "(no messages yet)".to_string();
    }
    session
        .turns()
        .iter()
        .map(|turn| {
            let speaker = match turn.role {
                Role::User => "You",
                Role::Assistant => "Assistant",
                Role::System => "System",
            };
            format!("{}: {}", speaker, turn.content)
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// One line of REPL input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatInput {
    Question(String),
    Rebuild,
    Sources,
    History,
    Quit,
    Empty,
    Unknown(String),
}

pub fn parse_input(line: &str) -> ChatInput {
    let line = line.trim();
    if line.is_empty() {
        return ChatInput::Empty;
    }
    if !line.starts_with('/') {
        return ChatInput::Question(line.to_string());
    }
    match line.to_ascii_lowercase().as_str() {
        "/rebuild" => ChatInput::Rebuild,
        "/sources" => ChatInput::Sources,
        "/history" => ChatInput::History,
        "/quit" | "/exit" => ChatInput::Quit,
        _ => ChatInput::Unknown(line.to_string()),
    }
}

pub async fn run_chat(config: &Config) -> Result<()> {
    println!("{}", config.system_name());
    println!("Ask a question about your documents. Commands: /rebuild /sources /history /quit");

    let mut pipeline = open_or_report(config).await?;
    let mut session = ChatSession::new();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        print!("\n> ");
        std::io::stdout().flush()?;

        let Some(line) = lines.next_line().await? else {
            break;
        };

        match parse_input(&line) {
            ChatInput::Empty => continue,
            ChatInput::Quit => break,
            ChatInput::Unknown(cmd) => {
                println!("Unknown command: {}", cmd);
            }
            ChatInput::History => {
                println!("{}", render_history(&session));
            }
            ChatInput::Sources => match &pipeline {
                Some(p) => {
                    for file in p.index().source_files() {
                        println!("  {}", file);
                    }
                }
                None => println!("Knowledge base not found. Use /rebuild to build it."),
            },
            ChatInput::Rebuild => {
                println!("Rebuilding knowledge base...");
                let outcome = match embedding::create_provider(&config.embedding) {
                    Ok(provider) => rebuild::rebuild_knowledge_base(config, provider.as_ref()).await,
                    Err(e) => Err(e),
                };
                match outcome {
                    Ok(RebuildOutcome::Built(index)) => {
                        println!(
                            "Indexed {} chunks from {} files.",
                            index.len(),
                            index.source_files().len()
                        );
                        pipeline = open_or_report(config).await?;
                    }
                    Ok(RebuildOutcome::NoDocuments) => {
                        println!("No files found in {}.", config.paths.data_dir.display());
                    }
                    Err(e) => println!("Rebuild failed: {:#}", e),
                }
            }
            ChatInput::Question(question) => {
                let Some(p) = &pipeline else {
                    println!("Knowledge base not found. Use /rebuild to build it.");
                    continue;
                };
                session.push_user(question.clone());
                let started = Instant::now();
                match p.answer(&question).await {
                    Ok(answer) => {
                        ask::print_answer(&answer, started.elapsed());
                        session.push_assistant(answer.text);
                    }
                    Err(e) => {
                        let failure = Prediction::Failed(e).display_text();
                        println!("{}", failure);
                        session.push_assistant(failure);
                    }
                }
            }
        }
    }

    println!("Bye.");
    Ok(())
}

async fn open_or_report(config: &Config) -> Result<Option<AnsweringPipeline>> {
    Ok(match ask::open_pipeline(config).await? {
        Ok(pipeline) => Some(pipeline),
        Err(unavailable) => {
            println!("{}", unavailable);
            None
        }
    })
}
