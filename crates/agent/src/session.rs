//! Chat engine and sessions.
//!
//! [`ChatEngine`] holds everything shared between sessions (persona
//! registry, generator, optional knowledge source, sampling settings) and
//! turns a log plus a query into a prompt. [`ChatSession`] owns one
//! conversation log and runs full turns against an engine:
//!
//! 1. **Assemble** the prompt from the existing log (memory → retrieval → template)
//! 2. **Generate** raw text (complete or streamed)
//! 3. **Post-process** the raw text
//! 4. **Append** the user turn and the assistant turn to the log
//!
//! Nothing touches the log until generation succeeds, so a failed or
//! abandoned turn leaves the log exactly as it was.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio_stream::StreamExt;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, info, warn};
use versa_config::AppConfig;
use versa_core::error::{ConfigurationError, Result};
use versa_core::{
    ConversationLog, GenerationOptions, GenerationRequest, Generator, Persona, PersonaRegistry,
    Retriever, Role,
};

use crate::context::assembler::{AssembledPrompt, AssemblyInput, ContextAssembler};
use crate::context::memory::{
    BufferMemory, ConversationMemory, MemoryKind, MemoryPolicy, SummaryBufferMemory,
};
use crate::context::retrieval::{self, format_context};
use crate::postprocess::{StreamCleaner, postprocess};

/// Sampling and formatting settings shared by every session of an engine.
#[derive(Debug, Clone)]
pub struct EngineSettings {
    /// Options for free-form persona chat.
    pub chat_options: GenerationOptions,
    /// Options for grounded answers and summaries.
    pub grounded_options: GenerationOptions,
    /// Marker stripped from every generated text.
    pub stop_marker: String,
    /// Separator written after each rendered turn and retrieval label.
    pub separator: String,
    /// Passages retrieved per grounded query.
    pub top_k: usize,
}

impl EngineSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            chat_options: config.generation.creative(),
            grounded_options: config.generation.deterministic(),
            stop_marker: config.generation.stop_marker.clone(),
            separator: config.memory.separator.clone(),
            top_k: config.retrieval.top_k,
        }
    }

    fn options_for(&self, persona: Persona) -> GenerationOptions {
        if persona.is_grounded() {
            self.grounded_options
        } else {
            self.chat_options
        }
    }
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self::from_config(&AppConfig::default())
    }
}

/// The result of one conversation turn.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponseMessage {
    pub query: String,
    pub response: String,
}

/// Shared, read-only prompt machinery.
pub struct ChatEngine {
    registry: Arc<PersonaRegistry>,
    generator: Arc<dyn Generator>,
    retriever: Option<Arc<dyn Retriever>>,
    assembler: ContextAssembler,
    settings: EngineSettings,
}

impl ChatEngine {
    pub fn new(registry: Arc<PersonaRegistry>, generator: Arc<dyn Generator>) -> Self {
        Self {
            registry,
            generator,
            retriever: None,
            assembler: ContextAssembler::default(),
            settings: EngineSettings::default(),
        }
    }

    /// Attach a knowledge source for document-grounded personas.
    pub fn with_retriever(mut self, retriever: Arc<dyn Retriever>) -> Self {
        self.retriever = Some(retriever);
        self
    }

    pub fn with_settings(mut self, settings: EngineSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Passages in the attached knowledge source, if there is one.
    pub async fn knowledge_passages(&self) -> Result<Option<usize>> {
        match &self.retriever {
            Some(retriever) => Ok(Some(retriever.count().await?)),
            None => Ok(None),
        }
    }

    /// Check that `persona` can run on this engine.
    ///
    /// A grounded persona without a knowledge source is an error. A
    /// knowledge source on an ungrounded persona is ignored.
    pub fn check_persona(&self, persona: Persona) -> std::result::Result<(), ConfigurationError> {
        self.registry.template(persona)?;
        match (persona.is_grounded(), self.retriever.is_some()) {
            (true, false) => Err(ConfigurationError::KnowledgeSourceRequired(persona.to_string())),
            (false, true) => {
                warn!(persona = %persona, "Knowledge source attached but persona is not document-grounded, ignoring it");
                Ok(())
            }
            _ => Ok(()),
        }
    }

    /// Build the memory implementation for a policy.
    pub fn memory(&self, policy: MemoryPolicy) -> Box<dyn ConversationMemory> {
        match policy.kind {
            MemoryKind::Buffer => Box::new(BufferMemory::new(
                policy.buffer_len,
                self.settings.separator.clone(),
            )),
            MemoryKind::SummaryBuffer => Box::new(
                SummaryBufferMemory::new(
                    self.generator.clone(),
                    self.registry.summarization_template(),
                    policy.buffer_len,
                    self.settings.separator.clone(),
                )
                .with_options(self.settings.grounded_options)
                .with_stop_marker(self.settings.stop_marker.clone()),
            ),
        }
    }

    /// Assemble the prompt for `query` and return it with its metadata.
    ///
    /// Configuration problems surface before any generator or retriever call.
    pub async fn prepare(
        &self,
        persona: Persona,
        query: &str,
        log: &ConversationLog,
        policy: MemoryPolicy,
    ) -> Result<AssembledPrompt> {
        let template = self.registry.template(persona)?;
        let retriever = match (persona.is_grounded(), &self.retriever) {
            (true, Some(retriever)) => Some(retriever),
            (true, None) => {
                return Err(ConfigurationError::KnowledgeSourceRequired(persona.to_string()).into());
            }
            (false, _) => None,
        };

        let view = self.memory(policy).view(log).await?;

        let context = match retriever {
            Some(retriever) => {
                let passages = retriever.retrieve(query, self.settings.top_k).await?;
                debug!(
                    retriever = retriever.name(),
                    passages = passages.len(),
                    preview = %retrieval::preview(&passages, 120),
                    "Retrieved passages"
                );
                Some(format_context(&passages, &self.settings.separator))
            }
            None => None,
        };

        Ok(self.assembler.assemble(&AssemblyInput {
            template,
            view: &view,
            context: context.as_deref(),
            query,
        })?)
    }

    /// Assemble the full prompt text for `query` against `log`.
    pub async fn assemble_prompt(
        &self,
        persona: Persona,
        query: &str,
        log: &ConversationLog,
        policy: MemoryPolicy,
    ) -> Result<String> {
        Ok(self.prepare(persona, query, log, policy).await?.prompt)
    }

    fn request(&self, persona: Persona, prompt: String) -> GenerationRequest {
        let request = GenerationRequest::new(prompt, self.settings.options_for(persona));
        if self.settings.stop_marker.is_empty() {
            request
        } else {
            request.with_stop(self.settings.stop_marker.clone())
        }
    }
}

/// One conversation: a persona, a memory policy, and its log.
pub struct ChatSession {
    engine: Arc<ChatEngine>,
    persona: Persona,
    policy: MemoryPolicy,
    log: ConversationLog,
}

impl ChatSession {
    /// Start a session. Fails fast if the persona cannot run on `engine`.
    pub fn new(
        engine: Arc<ChatEngine>,
        persona: Persona,
        policy: MemoryPolicy,
    ) -> std::result::Result<Self, ConfigurationError> {
        engine.check_persona(persona)?;
        let log = ConversationLog::new();
        info!(
            conversation = %log.id,
            persona = %persona,
            memory = %policy.kind,
            buffer_len = policy.buffer_len,
            "Session started"
        );
        Ok(Self {
            engine,
            persona,
            policy,
            log,
        })
    }

    /// Resume a session from an existing log.
    pub fn with_log(mut self, log: ConversationLog) -> Self {
        self.log = log;
        self
    }

    pub fn persona(&self) -> Persona {
        self.persona
    }

    pub fn policy(&self) -> MemoryPolicy {
        self.policy
    }

    pub fn log(&self) -> &ConversationLog {
        &self.log
    }

    /// Switch persona. Switching to a different persona discards the log;
    /// re-selecting the current one keeps it.
    pub fn switch_persona(&mut self, persona: Persona) -> std::result::Result<(), ConfigurationError> {
        if persona == self.persona {
            return Ok(());
        }
        self.engine.check_persona(persona)?;

        info!(
            conversation = %self.log.id,
            from = %self.persona,
            to = %persona,
            discarded_turns = self.log.len(),
            "Persona switched, conversation reset"
        );
        self.persona = persona;
        self.log.reset();
        Ok(())
    }

    /// Run one full turn and return the cleaned response.
    pub async fn respond(&mut self, query: &str) -> Result<ResponseMessage> {
        let prompt = self.prompt_for(query).await?;
        let request = self.engine.request(self.persona, prompt);

        let raw = self.engine.generator.generate(request).await?;
        debug!(model = %raw.model, usage = ?raw.usage, "Generation complete");

        Ok(self.commit(query, &raw.text))
    }

    /// Run one full turn, passing cleaned text to `on_chunk` as it arrives.
    ///
    /// A possible trailing stop marker is held back, so the pieces passed to
    /// `on_chunk` add up to exactly the response stored in the log.
    pub async fn respond_streaming<F>(&mut self, query: &str, mut on_chunk: F) -> Result<ResponseMessage>
    where
        F: FnMut(&str) + Send,
    {
        let prompt = self.prompt_for(query).await?;
        let request = self.engine.request(self.persona, prompt);

        let rx = self.engine.generator.stream(request).await?;
        let mut stream = ReceiverStream::new(rx);
        let mut cleaner = StreamCleaner::new(self.engine.settings.stop_marker.as_str());

        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            if let Some(content) = chunk.content.as_deref() {
                let visible = cleaner.push(content);
                if !visible.is_empty() {
                    on_chunk(visible);
                }
            }
            if chunk.done {
                if let Some(usage) = chunk.usage {
                    debug!(?usage, "Stream complete");
                }
                break;
            }
        }

        let rest = cleaner.finish();
        if !rest.is_empty() {
            on_chunk(rest);
        }
        let raw = cleaner.into_raw();
        Ok(self.commit(query, &raw))
    }

    async fn prompt_for(&self, query: &str) -> Result<String> {
        self.engine
            .assemble_prompt(self.persona, query, &self.log, self.policy)
            .await
    }

    fn commit(&mut self, query: &str, raw: &str) -> ResponseMessage {
        let response = postprocess(raw, &self.engine.settings.stop_marker);
        let log = std::mem::take(&mut self.log);
        self.log = log
            .append_turn(Role::User, query)
            .append_turn(Role::Assistant, response.clone());

        debug!(
            conversation = %self.log.id,
            turns = self.log.len(),
            response_chars = response.len(),
            "Turn committed"
        );

        ResponseMessage {
            query: query.to_string(),
            response,
        }
    }
}
