//! `versa prompt` — Print the prompt a query would produce, without replying.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use versa_core::error::GeneratorError;
use versa_core::{ConversationLog, GenerationRequest, GenerationResponse, Generator};

use super::{build_engine, load_config, read_log, resolve_persona, resolve_policy};
use crate::PromptArgs;

/// Stand-in used when no backend is configured. Buffer memory never calls
/// it; summary memory with older turns reports the missing backend.
struct Unconfigured(String);

#[async_trait]
impl Generator for Unconfigured {
    fn name(&self) -> &str {
        "unconfigured"
    }

    async fn generate(&self, _request: GenerationRequest) -> Result<GenerationResponse, GeneratorError> {
        Err(GeneratorError::NotConfigured(self.0.clone()))
    }
}

pub async fn run(
    query: String,
    log: Option<PathBuf>,
    stats: bool,
    args: PromptArgs,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config()?;
    let persona = resolve_persona(&config, &args)?;
    let policy = resolve_policy(&config, &args)?;

    let generator: Arc<dyn Generator> = match versa_providers::build_from_config(&config) {
        Ok(generator) => generator,
        Err(e) => {
            tracing::debug!(error = %e, "No generator available for dry run");
            Arc::new(Unconfigured(e.to_string()))
        }
    };
    let engine = build_engine(&config, generator, &args).await?;
    engine.check_persona(persona)?;

    let log = match log {
        Some(path) => read_log(&path)?,
        None => ConversationLog::new(),
    };

    let assembled = engine.prepare(persona, &query, &log, policy).await?;
    println!("{}", assembled.prompt);

    if stats {
        let meta = &assembled.metadata;
        eprintln!();
        eprintln!("  Persona:  {} {}", meta.persona.avatar(), meta.persona);
        eprintln!("  Memory:   {} (buffer_len = {})", policy.kind, policy.buffer_len);
        eprintln!("  Turns:    {}", log.len());
        if let Some(n) = engine.knowledge_passages().await? {
            eprintln!("  Passages: {n} in knowledge source");
        }
        for section in &meta.sections {
            eprintln!("  Section:  {:<10} ~{} tokens", section.name, section.tokens);
        }
        eprintln!("  Total:    ~{} tokens", meta.total_tokens);
    }

    Ok(())
}
