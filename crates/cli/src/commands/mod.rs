//! Subcommand implementations and the engine wiring they share.

pub mod chat;
pub mod config_cmd;
pub mod personas;
pub mod prompt;

use std::path::Path;
use std::sync::Arc;

use versa_agent::{ChatEngine, EngineSettings, MemoryKind, MemoryPolicy};
use versa_config::AppConfig;
use versa_core::{ConfigurationError, ConversationLog, Generator, Persona, Turn};
use versa_knowledge::InMemoryKnowledgeBase;

use crate::PromptArgs;

/// Load the configuration, with a readable error.
pub fn load_config() -> Result<AppConfig, Box<dyn std::error::Error>> {
    Ok(AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?)
}

/// Persona from the command line, falling back to the configured default.
pub fn resolve_persona(config: &AppConfig, args: &PromptArgs) -> Result<Persona, ConfigurationError> {
    match &args.persona {
        Some(name) => name.parse(),
        None => config.persona.parse(),
    }
}

/// Memory policy from the command line, falling back to `[memory]`.
pub fn resolve_policy(config: &AppConfig, args: &PromptArgs) -> Result<MemoryPolicy, ConfigurationError> {
    let configured = MemoryPolicy::from_config(&config.memory)?;
    let kind: MemoryKind = match &args.memory {
        Some(kind) => kind.parse()?,
        None => configured.kind,
    };
    match args.buffer_len {
        Some(buffer_len) => MemoryPolicy::new(kind, buffer_len),
        None => Ok(MemoryPolicy { kind, ..configured }),
    }
}

/// Read a JSON array of turns into a log.
pub fn read_log(path: &Path) -> Result<ConversationLog, Box<dyn std::error::Error>> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| format!("Failed to read {}: {e}", path.display()))?;
    let turns: Vec<Turn> = serde_json::from_str(&content)
        .map_err(|e| format!("Invalid turn file {}: {e}", path.display()))?;
    Ok(ConversationLog::from_turns(turns))
}

/// Wire registry, generator and optional knowledge base into an engine.
pub async fn build_engine(
    config: &AppConfig,
    generator: Arc<dyn Generator>,
    args: &PromptArgs,
) -> Result<Arc<ChatEngine>, Box<dyn std::error::Error>> {
    let registry = Arc::new(config.persona_registry()?);
    let mut engine =
        ChatEngine::new(registry, generator).with_settings(EngineSettings::from_config(config));

    if let Some(path) = &args.knowledge {
        let kb = InMemoryKnowledgeBase::from_text_file(path).await?;
        engine = engine.with_retriever(Arc::new(kb));
    }

    Ok(Arc::new(engine))
}
