//! Versa CLI — the main entry point.
//!
//! Commands:
//! - `chat`     — Interactive or single-message chat with a persona
//! - `prompt`   — Print the prompt that would be sent for a query (dry run)
//! - `personas` — List personas and where their templates come from
//! - `config`   — Show, locate, or validate the configuration

use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod commands;

#[derive(Parser)]
#[command(
    name = "versa",
    about = "Versa — personality-configurable conversational agent",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

/// Options shared by commands that build prompts.
#[derive(clap::Args, Debug, Clone, Default)]
pub struct PromptArgs {
    /// Persona to use (Therapist, Comedian, Child, Expert, Default, DocBot)
    #[arg(short, long)]
    pub persona: Option<String>,

    /// Memory policy: `buffer` or `summary_buffer`
    #[arg(long)]
    pub memory: Option<String>,

    /// Number of recent turns kept verbatim
    #[arg(long, allow_negative_numbers = true)]
    pub buffer_len: Option<i64>,

    /// Text file used as the knowledge source (paragraphs become passages)
    #[arg(short, long)]
    pub knowledge: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Chat with a persona
    Chat {
        /// Send a single message instead of entering interactive mode
        #[arg(short, long)]
        message: Option<String>,

        /// JSON file with prior turns to continue from
        #[arg(short, long)]
        log: Option<PathBuf>,

        /// Wait for the full response instead of streaming it
        #[arg(long)]
        no_stream: bool,

        #[command(flatten)]
        prompt: PromptArgs,
    },

    /// Print the assembled prompt for a query without generating a reply
    Prompt {
        /// The user query
        query: String,

        /// JSON file with prior turns: [{"role": "user", "text": "..."}, ...]
        #[arg(short, long)]
        log: Option<PathBuf>,

        /// Also print which sections were included and the token estimate
        #[arg(long)]
        stats: bool,

        #[command(flatten)]
        prompt: PromptArgs,
    },

    /// List available personas
    Personas,

    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Print the effective configuration as TOML
    Show,
    /// Print the configuration file path
    Path,
    /// Load and validate the configuration
    Validate,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize tracing
    let filter = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Chat {
            message,
            log,
            no_stream,
            prompt,
        } => commands::chat::run(message, log, !no_stream, prompt).await?,
        Commands::Prompt {
            query,
            log,
            stats,
            prompt,
        } => commands::prompt::run(query, log, stats, prompt).await?,
        Commands::Personas => commands::personas::run().await?,
        Commands::Config { action } => match action {
            ConfigAction::Show => commands::config_cmd::show().await?,
            ConfigAction::Path => commands::config_cmd::path().await?,
            ConfigAction::Validate => commands::config_cmd::validate().await?,
        },
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parse_chat_flags() {
        let cli = Cli::parse_from([
            "versa", "chat", "-m", "Hi", "--persona", "comedian", "--memory", "buffer",
            "--buffer-len", "-1", "--log", "earlier.json",
        ]);
        match cli.command {
            Commands::Chat {
                message, log, prompt, no_stream,
            } => {
                assert_eq!(message.as_deref(), Some("Hi"));
                assert_eq!(log, Some(PathBuf::from("earlier.json")));
                assert!(!no_stream);
                assert_eq!(prompt.persona.as_deref(), Some("comedian"));
                assert_eq!(prompt.memory.as_deref(), Some("buffer"));
                assert_eq!(prompt.buffer_len, Some(-1));
            }
            _ => panic!("expected chat"),
        }
    }

    #[test]
    fn parse_prompt_command() {
        let cli = Cli::parse_from(["versa", "-v", "prompt", "What is 2/2?", "--log", "turns.json"]);
        assert!(cli.verbose);
        match cli.command {
            Commands::Prompt { query, log, .. } => {
                assert_eq!(query, "What is 2/2?");
                assert_eq!(log, Some(PathBuf::from("turns.json")));
            }
            _ => panic!("expected prompt"),
        }
    }
}
