//! `versa chat` — Interactive or single-message chat mode.

use std::io::Write;
use std::path::PathBuf;

use tokio::io::{self, AsyncBufReadExt, BufReader};
use versa_agent::ChatSession;
use versa_config::AppConfig;
use versa_core::Persona;

use super::{build_engine, load_config, read_log, resolve_persona, resolve_policy};
use crate::PromptArgs;

/// One line typed at the `You >` prompt.
#[derive(Debug, PartialEq, Eq)]
enum Input {
    Message(String),
    Persona(String),
    Personas,
    Skip,
    Exit,
}

impl Input {
    fn parse(line: &str) -> Self {
        let line = line.trim();
        if line.is_empty() {
            return Self::Skip;
        }
        if matches!(line, "exit" | "quit" | "/exit" | "/quit" | ":q") {
            return Self::Exit;
        }
        if line == "/personas" {
            return Self::Personas;
        }
        match line.strip_prefix("/persona") {
            Some(rest) if rest.is_empty() || rest.starts_with(' ') => {
                Self::Persona(rest.trim().to_string())
            }
            _ => Self::Message(line.to_string()),
        }
    }
}

pub async fn run(
    message: Option<String>,
    log: Option<PathBuf>,
    stream: bool,
    args: PromptArgs,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config()?;
    let persona = resolve_persona(&config, &args)?;
    let policy = resolve_policy(&config, &args)?;
    let resumed = log.as_deref().map(read_log).transpose()?;

    let generator = match versa_providers::build_from_config(&config) {
        Ok(generator) => generator,
        Err(e) => {
            print_setup_help();
            return Err(e.into());
        }
    };
    let engine = build_engine(&config, generator, &args).await?;
    let mut session = ChatSession::new(engine.clone(), persona, policy)?;
    if let Some(log) = resumed {
        session = session.with_log(log);
    }

    if let Some(msg) = message {
        // Single message mode
        if stream {
            session
                .respond_streaming(&msg, |chunk| {
                    print!("{chunk}");
                    let _ = std::io::stdout().flush();
                })
                .await?;
            println!();
        } else {
            eprint!("  Thinking...");
            let reply = session.respond(&msg).await;
            eprint!("\r              \r");
            println!("{}", reply?.response);
        }
        return Ok(());
    }

    let passages = engine.knowledge_passages().await?;
    print_banner(&config, &session, passages);

    let mut lines = BufReader::new(io::stdin()).lines();
    prompt_line()?;

    while let Some(line) = lines.next_line().await? {
        match Input::parse(&line) {
            Input::Skip => {}
            Input::Exit => break,
            Input::Personas => {
                for p in Persona::selectable() {
                    println!("  {} {}", p.avatar(), p);
                }
                println!();
            }
            Input::Persona(name) => match name.parse::<Persona>() {
                Ok(persona) => match session.switch_persona(persona) {
                    Ok(()) => {
                        println!("  {} Now talking to {persona}.", persona.avatar());
                        println!();
                    }
                    Err(e) => eprintln!("  [Error] {e}"),
                },
                Err(e) => eprintln!("  [Error] {e}"),
            },
            Input::Message(query) => {
                let avatar = session.persona().avatar();
                let result = if stream {
                    print!("  {avatar} > ");
                    std::io::stdout().flush()?;
                    let result = session
                        .respond_streaming(&query, |chunk| {
                            print!("{chunk}");
                            let _ = std::io::stdout().flush();
                        })
                        .await;
                    println!();
                    result.map(|_| ())
                } else {
                    session.respond(&query).await.map(|reply| {
                        for line in reply.response.lines() {
                            println!("  {avatar} > {line}");
                        }
                    })
                };

                if let Err(e) = result {
                    eprintln!("  [Error] {e}");
                }
                println!();
            }
        }
        prompt_line()?;
    }

    println!();
    println!("  Goodbye! 👋");
    println!();
    Ok(())
}

fn prompt_line() -> std::io::Result<()> {
    print!("  You > ");
    std::io::stdout().flush()
}

fn print_banner(config: &AppConfig, session: &ChatSession, passages: Option<usize>) {
    let persona = session.persona();
    let policy = session.policy();
    println!();
    println!("  ╔══════════════════════════════════════════════╗");
    println!("  ║         Versa Chat — Interactive Mode        ║");
    println!("  ╚══════════════════════════════════════════════╝");
    println!();
    println!("  Model:     {}", config.model);
    println!("  Persona:   {} {persona}", persona.avatar());
    println!("  Memory:    {} (last {} turns verbatim)", policy.kind, policy.buffer_len);
    if !session.log().is_empty() {
        println!("  Resumed:   {} earlier turns", session.log().len());
    }
    match passages {
        Some(n) => println!("  Knowledge: {n} passages"),
        None => println!("  Knowledge: none"),
    }
    println!();
    println!("  Type your message and press Enter.");
    println!("  '/persona <name>' switches persona and starts a new conversation.");
    println!("  Type 'exit' or Ctrl+C to quit.");
    println!();
}

fn print_setup_help() {
    eprintln!();
    eprintln!("  ERROR: No API key configured!");
    eprintln!();
    eprintln!("  Set one of these environment variables:");
    eprintln!("    VERSA_API_KEY=sk-...");
    eprintln!("    OPENAI_API_KEY=sk-...");
    eprintln!();
    eprintln!("  Or add it to your config file:");
    eprintln!("    {}", AppConfig::config_dir().join("config.toml").display());
    eprintln!();
    eprintln!("  For a local completions server, set api_style = \"completions\".");
    eprintln!();
}
